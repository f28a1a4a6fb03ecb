//! The discount rule resolver: apply and preview.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use emporium_catalog::ProductId;
use emporium_core::{ActorId, discounted_unit_price};
use emporium_events::{EventBus, EventEnvelope};
use emporium_pricing::{
    ApplyRuleDiscount, DiscountCommand, DiscountRule, DiscountRuleId, MarkRuleApplied,
    ProductDiscount, ProductFacts, RuleCommand, RuleCondition, effective_unit_price,
};

use crate::dispatcher::CommandDispatcher;
use crate::error::EngineError;
use crate::event_store::EventStore;
use crate::projections::ProjectionHub;
use crate::streams;

/// Counts reported back to the operator after a rule run.
///
/// `applied` includes refreshes by the owning rule; `skipped` counts
/// candidates whose current discount outranked the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleApplication {
    pub applied: u32,
    pub skipped: u32,
}

/// One candidate row of a rule preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewLine {
    pub product_id: ProductId,
    pub current_price_cents: u64,
    pub projected_price_cents: u64,
    /// Whether an actual application would overwrite (or refresh) the
    /// product's current discount rather than being skipped.
    pub would_apply: bool,
}

/// The effect a rule would have, computed without mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulePreview {
    pub rule_id: DiscountRuleId,
    pub lines: Vec<PreviewLine>,
}

/// Evaluates rule conditions against the catalog and writes the winning
/// discounts into the per-product slots.
#[derive(Debug)]
pub struct RuleResolver<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    hub: Arc<ProjectionHub>,
}

impl<S, B> RuleResolver<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>, hub: Arc<ProjectionHub>) -> Self {
        Self { dispatcher, hub }
    }

    /// Apply a rule to every candidate product.
    ///
    /// The overwrite/refresh/skip decision runs inside each product's
    /// discount slot aggregate, so a racing manual edit or competing rule on
    /// the same product is serialized, not lost. Re-running a rule with no
    /// intervening changes converges: refreshes count as applied, outranked
    /// candidates as skipped.
    ///
    /// A rule whose stored condition payload is malformed matches zero
    /// candidates and reports `{applied: 0, skipped: 0}` instead of failing.
    pub fn apply_rule(
        &self,
        rule_id: DiscountRuleId,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<RuleApplication, EngineError> {
        let rule = self.load_rule(rule_id)?;
        if !rule.is_active() {
            return Err(EngineError::Validation("rule is not active".to_string()));
        }

        let outcome = match rule.condition() {
            None => {
                warn!(rule_id = %rule_id, "rule condition payload is malformed; matching zero candidates");
                RuleApplication {
                    applied: 0,
                    skipped: 0,
                }
            }
            Some(condition) => {
                let mut applied = 0u32;
                let mut skipped = 0u32;

                for facts in self.candidates(condition, now) {
                    let committed = self.dispatcher.dispatch_with_retry(
                        actor_id,
                        facts.product_id.0,
                        streams::DISCOUNT,
                        DiscountCommand::ApplyRuleDiscount(ApplyRuleDiscount {
                            product_id: facts.product_id,
                            rule_id,
                            priority: rule.priority(),
                            percent: rule.discount_percent(),
                            ends_at: rule.valid_until(),
                            actor_id,
                            occurred_at: now,
                        }),
                        |id| ProductDiscount::empty(ProductId::new(id)),
                    )?;

                    if committed.is_empty() {
                        skipped += 1;
                    } else {
                        applied += 1;
                    }
                }

                RuleApplication { applied, skipped }
            }
        };

        self.dispatcher.dispatch_with_retry(
            actor_id,
            rule_id.0,
            streams::RULE,
            RuleCommand::MarkRuleApplied(MarkRuleApplied {
                rule_id,
                applied_at: now,
                actor_id,
                occurred_at: now,
            }),
            |id| DiscountRule::empty(DiscountRuleId::new(id)),
        )?;

        info!(
            rule_id = %rule_id,
            applied = outcome.applied,
            skipped = outcome.skipped,
            "discount rule applied"
        );

        Ok(outcome)
    }

    /// Compute the effect of a rule without mutating anything.
    ///
    /// Works on inactive rules too; this is what an operator looks at
    /// before switching a rule on.
    pub fn preview_rule(
        &self,
        rule_id: DiscountRuleId,
        now: DateTime<Utc>,
    ) -> Result<RulePreview, EngineError> {
        let rule = self.load_rule(rule_id)?;

        let lines = match rule.condition() {
            None => {
                warn!(rule_id = %rule_id, "rule condition payload is malformed; previewing zero candidates");
                vec![]
            }
            Some(condition) => self
                .candidates(condition, now)
                .into_iter()
                .map(|facts| {
                    let current = self.hub.discounts().active(&facts.product_id, now);
                    let current_price_cents =
                        effective_unit_price(facts.base_price_cents, current.as_ref(), now);
                    let projected_price_cents =
                        discounted_unit_price(facts.base_price_cents, rule.discount_percent());

                    let defending = current.as_ref().map_or(0, |d| d.priority());
                    let same_rule = current
                        .as_ref()
                        .and_then(|d| d.source)
                        .is_some_and(|source| source.rule_id == rule_id);
                    let would_apply = rule.priority() > defending
                        || (rule.priority() == defending && same_rule);

                    PreviewLine {
                        product_id: facts.product_id,
                        current_price_cents,
                        projected_price_cents,
                        would_apply,
                    }
                })
                .collect(),
        };

        Ok(RulePreview { rule_id, lines })
    }

    /// Rehydrate a rule for operator display (name, priority, last applied).
    pub fn rule(&self, rule_id: DiscountRuleId) -> Result<DiscountRule, EngineError> {
        self.load_rule(rule_id)
    }

    fn load_rule(&self, rule_id: DiscountRuleId) -> Result<DiscountRule, EngineError> {
        let rule: DiscountRule = self.dispatcher.load(streams::RULE, rule_id.0, |id| {
            DiscountRule::empty(DiscountRuleId::new(id))
        })?;
        if !rule.exists() {
            return Err(EngineError::NotFound);
        }
        Ok(rule)
    }

    /// Candidate selection: active products whose facts satisfy the rule's
    /// condition at `now`.
    fn candidates(&self, condition: &RuleCondition, now: DateTime<Utc>) -> Vec<ProductFacts> {
        self.hub
            .products()
            .list()
            .into_iter()
            .filter(|product| product.active)
            .map(|product| ProductFacts {
                on_hand: self.hub.stock().on_hand(&product.product_id),
                product_id: product.product_id,
                category: product.category,
                base_price_cents: product.base_price_cents,
                active: product.active,
                created_at: product.created_at,
            })
            .filter(|facts| condition.matches(facts, now))
            .collect()
    }
}
