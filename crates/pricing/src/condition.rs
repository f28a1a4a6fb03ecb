//! Typed discount rule conditions.
//!
//! Conditions arrive from operators as loosely-typed JSON payloads; they are
//! parsed into [`RuleCondition`] exactly once, at the boundary. Evaluation is
//! pure: a condition plus a [`ProductFacts`] row plus a point in time.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use emporium_catalog::ProductId;

/// Products created within this many days count as new arrivals.
pub const NEW_ARRIVAL_WINDOW_DAYS: i64 = 7;

/// A rule condition payload that could not be understood.
///
/// Rules carrying such payloads are not an error at application time: they
/// simply match zero candidates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleConditionError {
    #[error("unknown rule type: {0}")]
    UnknownRuleType(String),

    #[error("malformed condition payload: {0}")]
    Malformed(String),

    #[error("empty range: min must not exceed max")]
    EmptyRange,

    #[error("seasonal months must be within 1..=12 and non-empty")]
    InvalidMonths,
}

/// Read-side facts about one product, as supplied by the catalog and the
/// stock ledger. The resolver evaluates rule conditions against these rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFacts {
    pub product_id: ProductId,
    pub category: String,
    pub base_price_cents: u64,
    pub on_hand: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CategoryParams {
    category: String,
}

#[derive(Debug, Deserialize)]
struct StockRangeParams {
    min: i64,
    max: i64,
}

#[derive(Debug, Deserialize)]
struct AgeInStockParams {
    min_days: i64,
}

#[derive(Debug, Deserialize)]
struct PriceRangeParams {
    min_cents: u64,
    max_cents: u64,
}

#[derive(Debug, Deserialize)]
struct SeasonalParams {
    categories: Vec<String>,
    months: Vec<u32>,
}

/// Tagged condition union: one variant per rule type, each carrying its own
/// strongly-typed parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RuleCondition {
    /// Product belongs to a category.
    Category { category: String },
    /// On-hand stock count lies in an inclusive range.
    StockRange { min: i64, max: i64 },
    /// Product was created at least `min_days` ago.
    AgeInStock { min_days: i64 },
    /// Base price lies in an inclusive minor-unit range.
    PriceRange { min_cents: u64, max_cents: u64 },
    /// Product belongs to a seasonal category set, active only during the
    /// designated calendar months.
    Seasonal {
        categories: Vec<String>,
        months: Vec<u32>,
    },
    /// Product was created within the last [`NEW_ARRIVAL_WINDOW_DAYS`] days.
    NewArrivals,
}

impl RuleCondition {
    /// Parse a wire-format condition: a rule type tag plus its parameters.
    pub fn parse(rule_type: &str, params: &JsonValue) -> Result<Self, RuleConditionError> {
        match rule_type {
            "category" => {
                let p: CategoryParams = decode(params)?;
                if p.category.trim().is_empty() {
                    return Err(RuleConditionError::Malformed(
                        "category cannot be empty".to_string(),
                    ));
                }
                Ok(Self::Category {
                    category: p.category,
                })
            }
            "stock-range" => {
                let p: StockRangeParams = decode(params)?;
                if p.min > p.max || p.min < 0 {
                    return Err(RuleConditionError::EmptyRange);
                }
                Ok(Self::StockRange {
                    min: p.min,
                    max: p.max,
                })
            }
            "age-in-stock" => {
                let p: AgeInStockParams = decode(params)?;
                if p.min_days < 0 {
                    return Err(RuleConditionError::Malformed(
                        "min_days cannot be negative".to_string(),
                    ));
                }
                Ok(Self::AgeInStock {
                    min_days: p.min_days,
                })
            }
            "price-range" => {
                let p: PriceRangeParams = decode(params)?;
                if p.min_cents > p.max_cents {
                    return Err(RuleConditionError::EmptyRange);
                }
                Ok(Self::PriceRange {
                    min_cents: p.min_cents,
                    max_cents: p.max_cents,
                })
            }
            "seasonal" => {
                let p: SeasonalParams = decode(params)?;
                if p.months.is_empty() || p.months.iter().any(|m| !(1..=12).contains(m)) {
                    return Err(RuleConditionError::InvalidMonths);
                }
                if p.categories.is_empty() {
                    return Err(RuleConditionError::Malformed(
                        "seasonal categories cannot be empty".to_string(),
                    ));
                }
                Ok(Self::Seasonal {
                    categories: p.categories,
                    months: p.months,
                })
            }
            "new-arrivals" => Ok(Self::NewArrivals),
            other => Err(RuleConditionError::UnknownRuleType(other.to_string())),
        }
    }

    /// The wire-format tag this condition parses from.
    pub fn rule_type(&self) -> &'static str {
        match self {
            Self::Category { .. } => "category",
            Self::StockRange { .. } => "stock-range",
            Self::AgeInStock { .. } => "age-in-stock",
            Self::PriceRange { .. } => "price-range",
            Self::Seasonal { .. } => "seasonal",
            Self::NewArrivals => "new-arrivals",
        }
    }

    /// Evaluate this condition against one product at `now`.
    pub fn matches(&self, facts: &ProductFacts, now: DateTime<Utc>) -> bool {
        match self {
            Self::Category { category } => facts.category == *category,
            Self::StockRange { min, max } => (*min..=*max).contains(&facts.on_hand),
            Self::AgeInStock { min_days } => {
                now.signed_duration_since(facts.created_at) >= Duration::days(*min_days)
            }
            Self::PriceRange {
                min_cents,
                max_cents,
            } => (*min_cents..=*max_cents).contains(&facts.base_price_cents),
            Self::Seasonal { categories, months } => {
                months.contains(&now.month()) && categories.contains(&facts.category)
            }
            Self::NewArrivals => {
                now.signed_duration_since(facts.created_at)
                    <= Duration::days(NEW_ARRIVAL_WINDOW_DAYS)
            }
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(params: &JsonValue) -> Result<T, RuleConditionError> {
    serde_json::from_value(params.clone())
        .map_err(|e| RuleConditionError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use emporium_core::AggregateId;
    use serde_json::json;

    fn facts(category: &str, price: u64, on_hand: i64, age_days: i64) -> ProductFacts {
        ProductFacts {
            product_id: ProductId::new(AggregateId::new()),
            category: category.to_string(),
            base_price_cents: price,
            on_hand,
            active: true,
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[test]
    fn parses_each_rule_type() {
        let cases = [
            ("category", json!({"category": "apparel"})),
            ("stock-range", json!({"min": 0, "max": 10})),
            ("age-in-stock", json!({"min_days": 30})),
            ("price-range", json!({"min_cents": 100, "max_cents": 5000})),
            (
                "seasonal",
                json!({"categories": ["decor"], "months": [11, 12]}),
            ),
            ("new-arrivals", json!({})),
        ];

        for (rule_type, params) in cases {
            let condition = RuleCondition::parse(rule_type, &params).unwrap();
            assert_eq!(condition.rule_type(), rule_type);
        }
    }

    #[test]
    fn malformed_payloads_are_rejected_at_parse_time() {
        assert!(matches!(
            RuleCondition::parse("category", &json!({"wrong_key": 1})),
            Err(RuleConditionError::Malformed(_))
        ));
        assert!(matches!(
            RuleCondition::parse("stock-range", &json!({"min": 10, "max": 2})),
            Err(RuleConditionError::EmptyRange)
        ));
        assert!(matches!(
            RuleCondition::parse("seasonal", &json!({"categories": ["decor"], "months": [13]})),
            Err(RuleConditionError::InvalidMonths)
        ));
        assert!(matches!(
            RuleCondition::parse("bogus", &json!({})),
            Err(RuleConditionError::UnknownRuleType(_))
        ));
    }

    #[test]
    fn category_condition_matches_exact_category() {
        let condition = RuleCondition::parse("category", &json!({"category": "apparel"})).unwrap();
        assert!(condition.matches(&facts("apparel", 10_00, 5, 1), Utc::now()));
        assert!(!condition.matches(&facts("decor", 10_00, 5, 1), Utc::now()));
    }

    #[test]
    fn stock_range_is_inclusive() {
        let condition =
            RuleCondition::parse("stock-range", &json!({"min": 2, "max": 4})).unwrap();
        assert!(!condition.matches(&facts("apparel", 10_00, 1, 1), Utc::now()));
        assert!(condition.matches(&facts("apparel", 10_00, 2, 1), Utc::now()));
        assert!(condition.matches(&facts("apparel", 10_00, 4, 1), Utc::now()));
        assert!(!condition.matches(&facts("apparel", 10_00, 5, 1), Utc::now()));
    }

    #[test]
    fn age_in_stock_requires_minimum_days() {
        let condition =
            RuleCondition::parse("age-in-stock", &json!({"min_days": 30})).unwrap();
        assert!(!condition.matches(&facts("apparel", 10_00, 5, 29), Utc::now()));
        assert!(condition.matches(&facts("apparel", 10_00, 5, 31), Utc::now()));
    }

    #[test]
    fn seasonal_requires_month_and_category() {
        let condition = RuleCondition::parse(
            "seasonal",
            &json!({"categories": ["decor"], "months": [12]}),
        )
        .unwrap();

        let december = Utc.with_ymd_and_hms(2025, 12, 10, 12, 0, 0).unwrap();
        let june = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();

        assert!(condition.matches(&facts("decor", 10_00, 5, 1), december));
        assert!(!condition.matches(&facts("decor", 10_00, 5, 1), june));
        assert!(!condition.matches(&facts("apparel", 10_00, 5, 1), december));
    }

    #[test]
    fn new_arrivals_window_is_seven_days() {
        let condition = RuleCondition::parse("new-arrivals", &json!({})).unwrap();
        assert!(condition.matches(&facts("apparel", 10_00, 5, 6), Utc::now()));
        assert!(!condition.matches(&facts("apparel", 10_00, 5, 8), Utc::now()));
    }
}
