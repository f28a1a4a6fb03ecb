use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_catalog::ProductId;
use emporium_core::{ActorId, Aggregate, AggregateRoot, DomainError, Percent};
use emporium_events::Event;

use crate::rule::DiscountRuleId;

/// Provenance of a rule-created discount: which rule wrote it and at what
/// priority. Manually assigned discounts have no provenance and compete at
/// priority 0.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRef {
    pub rule_id: DiscountRuleId,
    pub priority: i32,
}

/// The discount currently occupying a product's slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountState {
    pub percent: Percent,
    pub starts_at: DateTime<Utc>,
    /// `None` means indefinite.
    pub ends_at: Option<DateTime<Utc>>,
    pub source: Option<RuleRef>,
}

impl DiscountState {
    /// A discount is active while its end date is absent or in the future.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.is_none_or(|ends_at| ends_at > now)
    }

    /// Priority this discount defends its slot with: the owning rule's
    /// priority, or 0 for a manual discount.
    pub fn priority(&self) -> i32 {
        self.source.map_or(0, |source| source.priority)
    }
}

/// Aggregate root: ProductDiscount, the single-valued active-discount slot
/// of one product.
///
/// The slot is a singleton per product and comes into existence with its
/// first assignment; there is no creation command. At most one discount is
/// active at a time by construction: every assignment overwrites the slot,
/// and the overwritten discount survives only in the event history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDiscount {
    id: ProductId,
    current: Option<DiscountState>,
    version: u64,
}

impl ProductDiscount {
    /// Create an empty aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            current: None,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    /// The discount occupying the slot, active or not.
    pub fn current(&self) -> Option<&DiscountState> {
        self.current.as_ref()
    }

    /// The discount occupying the slot, if it is active at `now`.
    pub fn active_at(&self, now: DateTime<Utc>) -> Option<&DiscountState> {
        self.current.as_ref().filter(|d| d.is_active_at(now))
    }

    /// The priority an incoming rule has to beat at `now`.
    pub fn defending_priority(&self, now: DateTime<Utc>) -> i32 {
        self.active_at(now).map_or(0, DiscountState::priority)
    }
}

impl AggregateRoot for ProductDiscount {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ApplyRuleDiscount. A rule application attempt on one product.
///
/// The overwrite/refresh/skip decision happens in `handle`, against the same
/// rehydrated state the append is version-checked on, so a racing manual edit
/// or competing rule cannot be lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyRuleDiscount {
    pub product_id: ProductId,
    pub rule_id: DiscountRuleId,
    pub priority: i32,
    pub percent: Percent,
    pub ends_at: Option<DateTime<Utc>>,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignManualDiscount. Operator assignment; always wins the slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignManualDiscount {
    pub product_id: ProductId,
    pub percent: Percent,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EndDiscount. Soft removal; stamps the end date to now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndDiscount {
    pub product_id: ProductId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountCommand {
    ApplyRuleDiscount(ApplyRuleDiscount),
    AssignManualDiscount(AssignManualDiscount),
    EndDiscount(EndDiscount),
}

/// Event: DiscountAssigned. The slot was overwritten (rule or manual).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountAssigned {
    pub product_id: ProductId,
    pub percent: Percent,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub source: Option<RuleRef>,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DiscountEnded. The active discount's end date was stamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountEnded {
    pub product_id: ProductId,
    pub ended_at: DateTime<Utc>,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountEvent {
    DiscountAssigned(DiscountAssigned),
    DiscountEnded(DiscountEnded),
}

impl Event for DiscountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DiscountEvent::DiscountAssigned(_) => "pricing.discount.assigned",
            DiscountEvent::DiscountEnded(_) => "pricing.discount.ended",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DiscountEvent::DiscountAssigned(e) => e.occurred_at,
            DiscountEvent::DiscountEnded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProductDiscount {
    type Command = DiscountCommand;
    type Event = DiscountEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DiscountEvent::DiscountAssigned(e) => {
                self.current = Some(DiscountState {
                    percent: e.percent,
                    starts_at: e.starts_at,
                    ends_at: e.ends_at,
                    source: e.source,
                });
            }
            DiscountEvent::DiscountEnded(e) => {
                if let Some(current) = &mut self.current {
                    current.ends_at = Some(e.ended_at);
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DiscountCommand::ApplyRuleDiscount(cmd) => self.handle_apply_rule(cmd),
            DiscountCommand::AssignManualDiscount(cmd) => self.handle_assign_manual(cmd),
            DiscountCommand::EndDiscount(cmd) => self.handle_end(cmd),
        }
    }
}

impl ProductDiscount {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    /// Overwrite, refresh, or skip per priority:
    ///
    /// - incoming priority strictly higher than the defending one → overwrite
    /// - equal priority and the slot is already owned by this rule → refresh
    /// - otherwise → skip (empty event list; the caller counts it as skipped)
    ///
    /// A higher-priority discount is never lowered.
    fn handle_apply_rule(&self, cmd: &ApplyRuleDiscount) -> Result<Vec<DiscountEvent>, DomainError> {
        self.ensure_product_id(cmd.product_id)?;

        let defending = self.defending_priority(cmd.occurred_at);
        let same_rule = self
            .active_at(cmd.occurred_at)
            .and_then(|d| d.source)
            .is_some_and(|source| source.rule_id == cmd.rule_id);

        let wins = cmd.priority > defending || (cmd.priority == defending && same_rule);
        if !wins {
            return Ok(vec![]);
        }

        Ok(vec![DiscountEvent::DiscountAssigned(DiscountAssigned {
            product_id: cmd.product_id,
            percent: cmd.percent,
            starts_at: cmd.occurred_at,
            ends_at: cmd.ends_at,
            source: Some(RuleRef {
                rule_id: cmd.rule_id,
                priority: cmd.priority,
            }),
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_manual(
        &self,
        cmd: &AssignManualDiscount,
    ) -> Result<Vec<DiscountEvent>, DomainError> {
        self.ensure_product_id(cmd.product_id)?;

        if let Some(ends_at) = cmd.ends_at
            && ends_at <= cmd.starts_at
        {
            return Err(DomainError::validation("ends_at must be after starts_at"));
        }

        Ok(vec![DiscountEvent::DiscountAssigned(DiscountAssigned {
            product_id: cmd.product_id,
            percent: cmd.percent,
            starts_at: cmd.starts_at,
            ends_at: cmd.ends_at,
            source: None,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_end(&self, cmd: &EndDiscount) -> Result<Vec<DiscountEvent>, DomainError> {
        self.ensure_product_id(cmd.product_id)?;

        if self.active_at(cmd.occurred_at).is_none() {
            return Ok(vec![]);
        }

        Ok(vec![DiscountEvent::DiscountEnded(DiscountEnded {
            product_id: cmd.product_id,
            ended_at: cmd.occurred_at,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use emporium_core::AggregateId;

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_rule_id() -> DiscountRuleId {
        DiscountRuleId::new(AggregateId::new())
    }

    fn pct(value: u8) -> Percent {
        Percent::new(value).unwrap()
    }

    fn apply_rule(
        slot: &mut ProductDiscount,
        rule_id: DiscountRuleId,
        priority: i32,
        percent: u8,
        now: DateTime<Utc>,
    ) -> usize {
        let events = slot
            .handle(&DiscountCommand::ApplyRuleDiscount(ApplyRuleDiscount {
                product_id: slot.id_typed(),
                rule_id,
                priority,
                percent: pct(percent),
                ends_at: None,
                actor_id: ActorId::new(),
                occurred_at: now,
            }))
            .unwrap();
        for event in &events {
            slot.apply(event);
        }
        events.len()
    }

    #[test]
    fn higher_priority_rule_overwrites_lower() {
        let now = Utc::now();
        let mut slot = ProductDiscount::empty(test_product_id());

        assert_eq!(apply_rule(&mut slot, test_rule_id(), 2, 10, now), 1);
        assert_eq!(slot.active_at(now).unwrap().percent, pct(10));

        assert_eq!(apply_rule(&mut slot, test_rule_id(), 5, 20, now), 1);
        assert_eq!(slot.active_at(now).unwrap().percent, pct(20));
    }

    #[test]
    fn lower_priority_rule_is_skipped() {
        let now = Utc::now();
        let mut slot = ProductDiscount::empty(test_product_id());

        apply_rule(&mut slot, test_rule_id(), 5, 20, now);
        assert_eq!(apply_rule(&mut slot, test_rule_id(), 2, 10, now), 0);
        assert_eq!(slot.active_at(now).unwrap().percent, pct(20));
    }

    #[test]
    fn same_rule_at_equal_priority_refreshes() {
        let now = Utc::now();
        let later = now + Duration::minutes(5);
        let rule_id = test_rule_id();
        let mut slot = ProductDiscount::empty(test_product_id());

        apply_rule(&mut slot, rule_id, 3, 15, now);
        // Re-application by the owning rule is an overwrite, not a skip.
        assert_eq!(apply_rule(&mut slot, rule_id, 3, 15, later), 1);
        assert_eq!(slot.active_at(later).unwrap().starts_at, later);
    }

    #[test]
    fn different_rule_at_equal_priority_is_skipped() {
        let now = Utc::now();
        let mut slot = ProductDiscount::empty(test_product_id());

        apply_rule(&mut slot, test_rule_id(), 3, 15, now);
        assert_eq!(apply_rule(&mut slot, test_rule_id(), 3, 25, now), 0);
        assert_eq!(slot.active_at(now).unwrap().percent, pct(15));
    }

    #[test]
    fn zero_priority_rule_does_not_claim_an_empty_slot() {
        let now = Utc::now();
        let mut slot = ProductDiscount::empty(test_product_id());

        // An empty slot defends at priority 0; an incoming 0 neither beats it
        // nor owns it.
        assert_eq!(apply_rule(&mut slot, test_rule_id(), 0, 10, now), 0);
        assert!(slot.active_at(now).is_none());
    }

    #[test]
    fn manual_assignment_defends_at_priority_zero() {
        let now = Utc::now();
        let product_id = test_product_id();
        let mut slot = ProductDiscount::empty(product_id);

        let events = slot
            .handle(&DiscountCommand::AssignManualDiscount(
                AssignManualDiscount {
                    product_id,
                    percent: pct(30),
                    starts_at: now,
                    ends_at: None,
                    actor_id: ActorId::new(),
                    occurred_at: now,
                },
            ))
            .unwrap();
        slot.apply(&events[0]);
        assert_eq!(slot.defending_priority(now), 0);

        // Any positive-priority rule may overwrite a manual discount.
        assert_eq!(apply_rule(&mut slot, test_rule_id(), 1, 10, now), 1);
        assert_eq!(slot.active_at(now).unwrap().percent, pct(10));
    }

    #[test]
    fn end_discount_is_a_soft_removal() {
        let now = Utc::now();
        let later = now + Duration::seconds(1);
        let product_id = test_product_id();
        let mut slot = ProductDiscount::empty(product_id);

        apply_rule(&mut slot, test_rule_id(), 2, 10, now);

        let events = slot
            .handle(&DiscountCommand::EndDiscount(EndDiscount {
                product_id,
                actor_id: ActorId::new(),
                occurred_at: later,
            }))
            .unwrap();
        slot.apply(&events[0]);

        // The slot still remembers the discount; it just is not active.
        assert!(slot.current().is_some());
        assert!(slot.active_at(later + Duration::seconds(1)).is_none());
    }

    #[test]
    fn ending_an_empty_slot_is_a_no_op() {
        let product_id = test_product_id();
        let slot = ProductDiscount::empty(product_id);

        let events = slot
            .handle(&DiscountCommand::EndDiscount(EndDiscount {
                product_id,
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn expired_discount_no_longer_defends_its_priority() {
        let now = Utc::now();
        let product_id = test_product_id();
        let mut slot = ProductDiscount::empty(product_id);

        let events = slot
            .handle(&DiscountCommand::ApplyRuleDiscount(ApplyRuleDiscount {
                product_id,
                rule_id: test_rule_id(),
                priority: 9,
                percent: pct(40),
                ends_at: Some(now + Duration::hours(1)),
                actor_id: ActorId::new(),
                occurred_at: now,
            }))
            .unwrap();
        slot.apply(&events[0]);

        let after_expiry = now + Duration::hours(2);
        assert_eq!(slot.defending_priority(after_expiry), 0);
        assert_eq!(apply_rule(&mut slot, test_rule_id(), 1, 10, after_expiry), 1);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: no sequence of rule applications ever lowers the
            /// defending priority of an indefinitely active discount.
            #[test]
            fn defending_priority_never_decreases(
                priorities in prop::collection::vec(0i32..10, 1..30)
            ) {
                let now = Utc::now();
                let mut slot = ProductDiscount::empty(test_product_id());
                let mut defending = 0;

                for priority in priorities {
                    apply_rule(&mut slot, test_rule_id(), priority, 10, now);
                    prop_assert!(slot.defending_priority(now) >= defending);
                    defending = slot.defending_priority(now);
                }
            }
        }
    }
}
