use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use emporium_catalog::ProductId;
use emporium_events::{Event, EventEnvelope};
use emporium_inventory::StockEvent;
use emporium_pricing::DiscountEvent;

use super::cursor::{CursorDecision, StreamCursors};
use super::ProjectionError;

/// A fact the notification collaborator cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The product's on-hand count moved from zero to positive.
    BackInStock {
        product_id: ProductId,
        at: DateTime<Utc>,
    },
    /// A discount became active on the product.
    DiscountActivated {
        product_id: ProductId,
        at: DateTime<Utc>,
    },
}

impl Notice {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Notice::BackInStock { at, .. } => *at,
            Notice::DiscountActivated { at, .. } => *at,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct TouchRecord {
    stock_touched_at: Option<DateTime<Utc>>,
    discount_touched_at: Option<DateTime<Utc>>,
    on_hand: i64,
}

/// Change feed for the notification collaborator.
///
/// Answers "was this product's stock or discount touched since T?" and keeps
/// an ordered list of restock / discount-activation notices. Delivery to
/// watchers is the collaborator's concern; this projection only records.
#[derive(Debug, Default)]
pub struct ChangeFeedProjection {
    touches: RwLock<HashMap<ProductId, TouchRecord>>,
    notices: RwLock<Vec<Notice>>,
    stock_cursors: StreamCursors,
    discount_cursors: StreamCursors,
}

impl ChangeFeedProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the product's stock or discount changed since `since`.
    pub fn touched_since(&self, product_id: &ProductId, since: DateTime<Utc>) -> bool {
        let touches = match self.touches.read() {
            Ok(t) => t,
            Err(_) => return false,
        };
        touches.get(product_id).is_some_and(|record| {
            record.stock_touched_at.is_some_and(|at| at > since)
                || record.discount_touched_at.is_some_and(|at| at > since)
        })
    }

    /// Notices recorded strictly after `since`, oldest first.
    pub fn notices_since(&self, since: DateTime<Utc>) -> Vec<Notice> {
        match self.notices.read() {
            Ok(notices) => notices
                .iter()
                .filter(|n| n.at() > since)
                .cloned()
                .collect(),
            Err(_) => vec![],
        }
    }

    /// Apply a published stock envelope into the feed.
    pub fn apply_stock_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let decision = self
            .stock_cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number())?;
        if decision == CursorDecision::Duplicate {
            return Ok(());
        }

        let event: StockEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let product_id = event.product_id();
        let at = event.occurred_at();
        let delta = event.delta();

        let mut touches = self
            .touches
            .write()
            .map_err(|_| ProjectionError::Storage("feed lock poisoned".to_string()))?;
        let record = touches.entry(product_id).or_default();

        let was_out_of_stock = record.on_hand == 0;
        record.on_hand += delta;
        record.stock_touched_at = Some(at);

        if was_out_of_stock && record.on_hand > 0 {
            drop(touches);
            self.push_notice(Notice::BackInStock { product_id, at })?;
        }

        Ok(())
    }

    /// Apply a published discount envelope into the feed.
    pub fn apply_discount_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let decision = self
            .discount_cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number())?;
        if decision == CursorDecision::Duplicate {
            return Ok(());
        }

        let event: DiscountEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (product_id, at, activated) = match &event {
            DiscountEvent::DiscountAssigned(e) => (e.product_id, e.occurred_at, true),
            DiscountEvent::DiscountEnded(e) => (e.product_id, e.occurred_at, false),
        };

        {
            let mut touches = self
                .touches
                .write()
                .map_err(|_| ProjectionError::Storage("feed lock poisoned".to_string()))?;
            touches.entry(product_id).or_default().discount_touched_at = Some(at);
        }

        if activated {
            self.push_notice(Notice::DiscountActivated { product_id, at })?;
        }

        Ok(())
    }

    fn push_notice(&self, notice: Notice) -> Result<(), ProjectionError> {
        self.notices
            .write()
            .map_err(|_| ProjectionError::Storage("feed lock poisoned".to_string()))?
            .push(notice);
        Ok(())
    }
}
