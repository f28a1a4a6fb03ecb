//! `emporium-pricing`: discounts, discount rules, and effective prices.
//!
//! Three pieces live here:
//!
//! - [`condition`]: the typed rule conditions (one variant per rule type,
//!   parsed once from the wire payload) and the product facts they match
//!   against.
//! - [`rule`]: the `DiscountRule` aggregate: operator-managed lifecycle,
//!   priority, and application bookkeeping.
//! - [`discount`]: the `ProductDiscount` slot aggregate holding the single
//!   active discount a product may carry, with the priority comparison
//!   executed inside the slot's own critical section.
//! - [`price`]: effective unit price computation (base price × discount,
//!   rounded half-up to the minor unit).

pub mod condition;
pub mod discount;
pub mod price;
pub mod rule;

pub use condition::{
    NEW_ARRIVAL_WINDOW_DAYS, ProductFacts, RuleCondition, RuleConditionError,
};
pub use discount::{
    AssignManualDiscount, ApplyRuleDiscount, DiscountAssigned, DiscountCommand, DiscountEnded,
    DiscountEvent, DiscountState, EndDiscount, ProductDiscount, RuleRef,
};
pub use price::effective_unit_price;
pub use rule::{
    ActivateRule, CreateRule, DeactivateRule, DeleteRule, DiscountRule, DiscountRuleId,
    MarkRuleApplied, RuleActivated, RuleApplicationRecorded, RuleCommand, RuleCreated,
    RuleDeactivated, RuleDeleted, RuleEvent,
};
