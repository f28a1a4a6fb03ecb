use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use emporium_core::{ActorId, Aggregate, AggregateId, AggregateRoot, DomainError, Percent};
use emporium_events::Event;

use crate::condition::RuleCondition;

/// Discount rule identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscountRuleId(pub AggregateId);

impl DiscountRuleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DiscountRuleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: DiscountRule.
///
/// The condition payload is stored in wire format on the creation event and
/// parsed exactly once during rehydration. A payload that fails to parse is
/// kept (the rule still exists, can be toggled and deleted) but matches no
/// products.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountRule {
    id: DiscountRuleId,
    name: String,
    rule_type: String,
    condition: Option<RuleCondition>,
    discount_percent: Percent,
    priority: i32,
    active: bool,
    valid_until: Option<DateTime<Utc>>,
    last_applied_at: Option<DateTime<Utc>>,
    deleted: bool,
    version: u64,
    created: bool,
}

impl DiscountRule {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DiscountRuleId) -> Self {
        Self {
            id,
            name: String::new(),
            rule_type: String::new(),
            condition: None,
            discount_percent: Percent::ZERO,
            priority: 0,
            active: false,
            valid_until: None,
            last_applied_at: None,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> DiscountRuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule_type(&self) -> &str {
        &self.rule_type
    }

    /// The parsed condition, or `None` when the stored payload is malformed.
    pub fn condition(&self) -> Option<&RuleCondition> {
        self.condition.as_ref()
    }

    pub fn discount_percent(&self) -> Percent {
        self.discount_percent
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn is_active(&self) -> bool {
        self.created && !self.deleted && self.active
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn exists(&self) -> bool {
        self.created && !self.deleted
    }

    pub fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.valid_until
    }

    pub fn last_applied_at(&self) -> Option<DateTime<Utc>> {
        self.last_applied_at
    }
}

impl AggregateRoot for DiscountRule {
    type Id = DiscountRuleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateRule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRule {
    pub rule_id: DiscountRuleId,
    pub name: String,
    pub rule_type: String,
    /// Wire-format condition parameters; parsed on rehydration.
    pub params: JsonValue,
    pub discount_percent: Percent,
    pub priority: i32,
    /// Copied onto discounts this rule creates as their end date.
    pub valid_until: Option<DateTime<Utc>>,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ActivateRule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateRule {
    pub rule_id: DiscountRuleId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeactivateRule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateRule {
    pub rule_id: DiscountRuleId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteRule.
///
/// Deletion does not retroactively remove discounts the rule already created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRule {
    pub rule_id: DiscountRuleId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkRuleApplied. Stamps `last_applied_at` after a resolver run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkRuleApplied {
    pub rule_id: DiscountRuleId,
    pub applied_at: DateTime<Utc>,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleCommand {
    CreateRule(CreateRule),
    ActivateRule(ActivateRule),
    DeactivateRule(DeactivateRule),
    DeleteRule(DeleteRule),
    MarkRuleApplied(MarkRuleApplied),
}

/// Event: RuleCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCreated {
    pub rule_id: DiscountRuleId,
    pub name: String,
    pub rule_type: String,
    pub params: JsonValue,
    pub discount_percent: Percent,
    pub priority: i32,
    pub valid_until: Option<DateTime<Utc>>,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RuleActivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleActivated {
    pub rule_id: DiscountRuleId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RuleDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDeactivated {
    pub rule_id: DiscountRuleId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RuleDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDeleted {
    pub rule_id: DiscountRuleId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RuleApplicationRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleApplicationRecorded {
    pub rule_id: DiscountRuleId,
    pub applied_at: DateTime<Utc>,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleEvent {
    RuleCreated(RuleCreated),
    RuleActivated(RuleActivated),
    RuleDeactivated(RuleDeactivated),
    RuleDeleted(RuleDeleted),
    RuleApplicationRecorded(RuleApplicationRecorded),
}

impl Event for RuleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RuleEvent::RuleCreated(_) => "pricing.rule.created",
            RuleEvent::RuleActivated(_) => "pricing.rule.activated",
            RuleEvent::RuleDeactivated(_) => "pricing.rule.deactivated",
            RuleEvent::RuleDeleted(_) => "pricing.rule.deleted",
            RuleEvent::RuleApplicationRecorded(_) => "pricing.rule.application_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RuleEvent::RuleCreated(e) => e.occurred_at,
            RuleEvent::RuleActivated(e) => e.occurred_at,
            RuleEvent::RuleDeactivated(e) => e.occurred_at,
            RuleEvent::RuleDeleted(e) => e.occurred_at,
            RuleEvent::RuleApplicationRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for DiscountRule {
    type Command = RuleCommand;
    type Event = RuleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RuleEvent::RuleCreated(e) => {
                self.id = e.rule_id;
                self.name = e.name.clone();
                self.rule_type = e.rule_type.clone();
                // Parse once here, not per evaluation. Malformed payloads stay
                // `None` and match nothing.
                self.condition = RuleCondition::parse(&e.rule_type, &e.params).ok();
                self.discount_percent = e.discount_percent;
                self.priority = e.priority;
                self.valid_until = e.valid_until;
                self.active = true;
                self.created = true;
            }
            RuleEvent::RuleActivated(_) => {
                self.active = true;
            }
            RuleEvent::RuleDeactivated(_) => {
                self.active = false;
            }
            RuleEvent::RuleDeleted(_) => {
                self.deleted = true;
            }
            RuleEvent::RuleApplicationRecorded(e) => {
                self.last_applied_at = Some(e.applied_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RuleCommand::CreateRule(cmd) => self.handle_create(cmd),
            RuleCommand::ActivateRule(cmd) => self.handle_activate(cmd),
            RuleCommand::DeactivateRule(cmd) => self.handle_deactivate(cmd),
            RuleCommand::DeleteRule(cmd) => self.handle_delete(cmd),
            RuleCommand::MarkRuleApplied(cmd) => self.handle_mark_applied(cmd),
        }
    }
}

impl DiscountRule {
    fn ensure_rule_id(&self, rule_id: DiscountRuleId) -> Result<(), DomainError> {
        if self.id != rule_id {
            return Err(DomainError::invariant("rule_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateRule) -> Result<Vec<RuleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("rule already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.rule_type.trim().is_empty() {
            return Err(DomainError::validation("rule_type cannot be empty"));
        }

        // The condition payload is deliberately not validated here: a rule
        // with an unparseable payload is stored and matches zero candidates.
        Ok(vec![RuleEvent::RuleCreated(RuleCreated {
            rule_id: cmd.rule_id,
            name: cmd.name.clone(),
            rule_type: cmd.rule_type.clone(),
            params: cmd.params.clone(),
            discount_percent: cmd.discount_percent,
            priority: cmd.priority,
            valid_until: cmd.valid_until,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(&self, cmd: &ActivateRule) -> Result<Vec<RuleEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_rule_id(cmd.rule_id)?;

        if self.active {
            return Ok(vec![]);
        }

        Ok(vec![RuleEvent::RuleActivated(RuleActivated {
            rule_id: cmd.rule_id,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &DeactivateRule) -> Result<Vec<RuleEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_rule_id(cmd.rule_id)?;

        if !self.active {
            return Ok(vec![]);
        }

        Ok(vec![RuleEvent::RuleDeactivated(RuleDeactivated {
            rule_id: cmd.rule_id,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteRule) -> Result<Vec<RuleEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_rule_id(cmd.rule_id)?;

        Ok(vec![RuleEvent::RuleDeleted(RuleDeleted {
            rule_id: cmd.rule_id,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_applied(&self, cmd: &MarkRuleApplied) -> Result<Vec<RuleEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_rule_id(cmd.rule_id)?;

        Ok(vec![RuleEvent::RuleApplicationRecorded(
            RuleApplicationRecorded {
                rule_id: cmd.rule_id,
                applied_at: cmd.applied_at,
                actor_id: cmd.actor_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emporium_core::AggregateId;
    use serde_json::json;

    fn test_rule_id() -> DiscountRuleId {
        DiscountRuleId::new(AggregateId::new())
    }

    fn create_cmd(rule_id: DiscountRuleId, rule_type: &str, params: JsonValue) -> CreateRule {
        CreateRule {
            rule_id,
            name: "Autumn apparel".to_string(),
            rule_type: rule_type.to_string(),
            params,
            discount_percent: Percent::new(10).unwrap(),
            priority: 2,
            valid_until: None,
            actor_id: ActorId::new(),
            occurred_at: Utc::now(),
        }
    }

    fn created_rule(rule_id: DiscountRuleId, rule_type: &str, params: JsonValue) -> DiscountRule {
        let mut rule = DiscountRule::empty(rule_id);
        let events = rule
            .handle(&RuleCommand::CreateRule(create_cmd(
                rule_id, rule_type, params,
            )))
            .unwrap();
        rule.apply(&events[0]);
        rule
    }

    #[test]
    fn created_rule_is_active_with_parsed_condition() {
        let rule = created_rule(
            test_rule_id(),
            "category",
            json!({"category": "apparel"}),
        );
        assert!(rule.is_active());
        assert!(rule.condition().is_some());
        assert_eq!(rule.priority(), 2);
    }

    #[test]
    fn malformed_condition_is_stored_but_unparsed() {
        let rule = created_rule(test_rule_id(), "stock-range", json!({"min": "three"}));
        assert!(rule.is_active());
        assert!(rule.condition().is_none());
    }

    #[test]
    fn deactivate_and_activate_toggle() {
        let rule_id = test_rule_id();
        let mut rule = created_rule(rule_id, "new-arrivals", json!({}));

        let events = rule
            .handle(&RuleCommand::DeactivateRule(DeactivateRule {
                rule_id,
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        rule.apply(&events[0]);
        assert!(!rule.is_active());

        // Deactivating again is a no-op.
        let events = rule
            .handle(&RuleCommand::DeactivateRule(DeactivateRule {
                rule_id,
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert!(events.is_empty());

        let events = rule
            .handle(&RuleCommand::ActivateRule(ActivateRule {
                rule_id,
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        rule.apply(&events[0]);
        assert!(rule.is_active());
    }

    #[test]
    fn deleted_rule_rejects_further_commands() {
        let rule_id = test_rule_id();
        let mut rule = created_rule(rule_id, "new-arrivals", json!({}));

        let events = rule
            .handle(&RuleCommand::DeleteRule(DeleteRule {
                rule_id,
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        rule.apply(&events[0]);
        assert!(rule.is_deleted());

        let err = rule
            .handle(&RuleCommand::ActivateRule(ActivateRule {
                rule_id,
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[test]
    fn mark_applied_stamps_last_applied_at() {
        let rule_id = test_rule_id();
        let mut rule = created_rule(rule_id, "new-arrivals", json!({}));
        assert!(rule.last_applied_at().is_none());

        let applied_at = Utc::now();
        let events = rule
            .handle(&RuleCommand::MarkRuleApplied(MarkRuleApplied {
                rule_id,
                applied_at,
                actor_id: ActorId::new(),
                occurred_at: applied_at,
            }))
            .unwrap();
        rule.apply(&events[0]);
        assert_eq!(rule.last_applied_at(), Some(applied_at));
    }
}
