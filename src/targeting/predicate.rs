use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{RequestContext, Str};

/// Result of evaluating a single targeting predicate.
///
/// Three-valued: a predicate that cannot decide (missing data, malformed configuration)
/// reports [`Indeterminate`](TargetingPredicateResult::Indeterminate) instead of
/// rejecting outright. Every evaluation produces exactly one of the three values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum TargetingPredicateResult {
    True,
    False,
    Indeterminate,
}

impl TargetingPredicateResult {
    /// Returns `true` only for [`TargetingPredicateResult::True`].
    pub fn is_true(self) -> bool {
        self == TargetingPredicateResult::True
    }

    /// Flip `True`/`False`. `Indeterminate` stays indeterminate: a predicate that could
    /// not decide cannot decide the inverse either.
    pub fn invert(self) -> TargetingPredicateResult {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Indeterminate => Self::Indeterminate,
        }
    }
}

impl From<bool> for TargetingPredicateResult {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

/// Contract for externally-implemented targeting predicates.
///
/// Implementations must be side-effect-free and order-independent: they may run on any
/// worker thread, in any order relative to their siblings, and their result may be
/// discarded if a group verdict is already known.
pub trait EvaluatePredicate: std::fmt::Debug + Send + Sync {
    /// Evaluate this predicate against a request context.
    fn evaluate(&self, context: &RequestContext) -> TargetingPredicateResult;
}

/// A single eligibility rule evaluated against a [`RequestContext`].
///
/// Built-in variants carry an `inverse` flag that flips a definite result (an
/// indeterminate one stays indeterminate).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TargetingPredicate {
    /// The request originates from one of the listed marketplaces.
    Marketplace {
        #[allow(missing_docs)]
        marketplace_ids: Vec<Str>,
        #[serde(default)]
        #[allow(missing_docs)]
        inverse: bool,
    },
    /// The request carries a non-blank customer id.
    RecognizedCustomer {
        #[serde(default)]
        #[allow(missing_docs)]
        inverse: bool,
    },
    /// The customer id matches a regular expression.
    CustomerPattern {
        #[allow(missing_docs)]
        pattern: String,
        #[serde(default)]
        #[allow(missing_docs)]
        inverse: bool,
    },
    /// An externally-implemented predicate. Not part of the wire model.
    #[serde(skip)]
    Custom(Arc<dyn EvaluatePredicate>),
}

impl TargetingPredicate {
    /// Evaluate this predicate against the request context.
    pub fn evaluate(&self, context: &RequestContext) -> TargetingPredicateResult {
        match self {
            TargetingPredicate::Marketplace {
                marketplace_ids,
                inverse,
            } => {
                let matched = marketplace_ids
                    .iter()
                    .any(|id| *id == context.marketplace_id);
                apply_inverse(matched.into(), *inverse)
            }

            TargetingPredicate::RecognizedCustomer { inverse } => {
                apply_inverse(context.is_recognized().into(), *inverse)
            }

            TargetingPredicate::CustomerPattern { pattern, inverse } => {
                // A pattern that does not compile cannot decide either way.
                let Ok(regex) = Regex::new(pattern) else {
                    return TargetingPredicateResult::Indeterminate;
                };
                apply_inverse(regex.is_match(&context.customer_id).into(), *inverse)
            }

            TargetingPredicate::Custom(predicate) => predicate.evaluate(context),
        }
    }
}

fn apply_inverse(result: TargetingPredicateResult, inverse: bool) -> TargetingPredicateResult {
    if inverse {
        result.invert()
    } else {
        result
    }
}

#[cfg(test)]
mod tests {
    use super::{TargetingPredicate, TargetingPredicateResult};
    use crate::RequestContext;

    fn context() -> RequestContext {
        RequestContext::new("amzn1.account.AEZI3A", "ATVPDKIKX0DER")
    }

    fn marketplace(ids: &[&str], inverse: bool) -> TargetingPredicate {
        TargetingPredicate::Marketplace {
            marketplace_ids: ids.iter().map(|id| (*id).into()).collect(),
            inverse,
        }
    }

    #[test]
    fn marketplace_one_of() {
        let predicate = marketplace(&["ATVPDKIKX0DER", "A2EUQ1WTGCTBG2"], false);
        assert_eq!(predicate.evaluate(&context()), TargetingPredicateResult::True);

        let predicate = marketplace(&["A2EUQ1WTGCTBG2"], false);
        assert_eq!(
            predicate.evaluate(&context()),
            TargetingPredicateResult::False
        );
    }

    #[test]
    fn marketplace_inverse() {
        let predicate = marketplace(&["ATVPDKIKX0DER"], true);
        assert_eq!(
            predicate.evaluate(&context()),
            TargetingPredicateResult::False
        );

        let predicate = marketplace(&["A2EUQ1WTGCTBG2"], true);
        assert_eq!(predicate.evaluate(&context()), TargetingPredicateResult::True);
    }

    #[test]
    fn recognized_customer() {
        let predicate = TargetingPredicate::RecognizedCustomer { inverse: false };
        assert_eq!(predicate.evaluate(&context()), TargetingPredicateResult::True);

        let anonymous = RequestContext::new("", "ATVPDKIKX0DER");
        assert_eq!(
            predicate.evaluate(&anonymous),
            TargetingPredicateResult::False
        );

        let inverse = TargetingPredicate::RecognizedCustomer { inverse: true };
        assert_eq!(inverse.evaluate(&anonymous), TargetingPredicateResult::True);
    }

    #[test]
    fn customer_pattern() {
        let predicate = TargetingPredicate::CustomerPattern {
            pattern: "^amzn1\\.account\\.".to_owned(),
            inverse: false,
        };
        assert_eq!(predicate.evaluate(&context()), TargetingPredicateResult::True);

        let other = RequestContext::new("legacy-id-17", "ATVPDKIKX0DER");
        assert_eq!(predicate.evaluate(&other), TargetingPredicateResult::False);
    }

    #[test]
    fn invalid_pattern_is_indeterminate() {
        let predicate = TargetingPredicate::CustomerPattern {
            pattern: "(unclosed".to_owned(),
            inverse: false,
        };
        assert_eq!(
            predicate.evaluate(&context()),
            TargetingPredicateResult::Indeterminate
        );

        // Inversion must not turn "cannot decide" into a definite answer.
        let inverse = TargetingPredicate::CustomerPattern {
            pattern: "(unclosed".to_owned(),
            inverse: true,
        };
        assert_eq!(
            inverse.evaluate(&context()),
            TargetingPredicateResult::Indeterminate
        );
    }

    #[test]
    fn invert_is_three_valued() {
        assert_eq!(
            TargetingPredicateResult::True.invert(),
            TargetingPredicateResult::False
        );
        assert_eq!(
            TargetingPredicateResult::False.invert(),
            TargetingPredicateResult::True
        );
        assert_eq!(
            TargetingPredicateResult::Indeterminate.invert(),
            TargetingPredicateResult::Indeterminate
        );
    }

    #[test]
    fn wire_shape() {
        let predicate: TargetingPredicate = serde_json::from_str(
            r#"{"type":"marketplace","marketplaceIds":["ATVPDKIKX0DER"]}"#,
        )
        .unwrap();
        assert_eq!(predicate.evaluate(&context()), TargetingPredicateResult::True);

        let predicate: TargetingPredicate =
            serde_json::from_str(r#"{"type":"recognizedCustomer","inverse":true}"#).unwrap();
        assert_eq!(
            predicate.evaluate(&context()),
            TargetingPredicateResult::False
        );
    }
}
