//! Per-stream sequence cursors for idempotent projections.

use std::collections::HashMap;
use std::sync::RwLock;

use emporium_core::AggregateId;

use super::ProjectionError;

/// Whether an envelope should be applied or silently dropped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CursorDecision {
    Apply,
    /// Duplicate or replay at or below the cursor; safe to ignore.
    Duplicate,
}

/// Tracks the last applied sequence number per aggregate stream.
///
/// At-least-once delivery means duplicates happen; gaps must not. A replayed
/// envelope is reported as [`CursorDecision::Duplicate`], a skipped sequence
/// number is an error.
#[derive(Debug, Default)]
pub struct StreamCursors {
    last_applied: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `sequence_number` against the stream's cursor and advance it.
    ///
    /// The first event of a stream may carry any positive sequence number
    /// (stores start at 1); after that, strictly monotonic increments are
    /// enforced.
    pub fn advance(
        &self,
        aggregate_id: AggregateId,
        sequence_number: u64,
    ) -> Result<CursorDecision, ProjectionError> {
        let mut cursors = self
            .last_applied
            .write()
            .map_err(|_| ProjectionError::Storage("cursor lock poisoned".to_string()))?;

        let last = *cursors.get(&aggregate_id).unwrap_or(&0);

        if sequence_number == 0 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence_number,
            });
        }

        if sequence_number <= last {
            return Ok(CursorDecision::Duplicate);
        }

        if last != 0 && sequence_number != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence_number,
            });
        }

        cursors.insert(aggregate_id, sequence_number);
        Ok(CursorDecision::Apply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_event_applies_then_duplicates_are_dropped() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();

        assert_eq!(cursors.advance(id, 1).unwrap(), CursorDecision::Apply);
        assert_eq!(cursors.advance(id, 1).unwrap(), CursorDecision::Duplicate);
        assert_eq!(cursors.advance(id, 2).unwrap(), CursorDecision::Apply);
    }

    #[test]
    fn gaps_are_errors() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();

        cursors.advance(id, 1).unwrap();
        assert!(matches!(
            cursors.advance(id, 3),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 3 })
        ));
    }

    #[test]
    fn streams_are_independent() {
        let cursors = StreamCursors::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        cursors.advance(a, 1).unwrap();
        assert_eq!(cursors.advance(b, 1).unwrap(), CursorDecision::Apply);
    }
}
