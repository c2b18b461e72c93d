//! Declarative validation rules.
//!
//! A [`Rule`] is runtime data attached to a contract field declaration:
//! the rule shape plus an optional message override. Rules check one
//! `serde_json::Value` at a time and report a [`ValidationError`] on
//! failure. Ordering matters: the contract applies rules in declaration
//! order and collects every failure.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::error::ValidationError;
use crate::value::{ValueKind, is_blank, kind_of};

/// Predicate signature for [`Rule::predicate`] checks.
pub type PredicateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// One validation rule for one contract field.
#[derive(Clone)]
pub struct Rule {
    kind: RuleKind,
    message: Option<Cow<'static, str>>,
}

/// The shape of a rule, without its message override.
#[derive(Clone)]
pub enum RuleKind {
    /// Value must not be blank.
    Presence,
    /// Value must have the given JSON shape.
    Kind(ValueKind),
    /// String must be at least this many characters.
    MinLength(usize),
    /// String must be at most this many characters.
    MaxLength(usize),
    /// String must match the regex.
    Pattern(Regex),
    /// Number must be strictly greater than the bound.
    GreaterThan(f64),
    /// Number must be greater than or equal to the bound.
    GreaterThanOrEqual(f64),
    /// Number must be strictly less than the bound.
    LessThan(f64),
    /// Number must be less than or equal to the bound.
    LessThanOrEqual(f64),
    /// Value must be one of the listed values.
    OneOf(Vec<Value>),
    /// Value must not be any of the listed values.
    NoneOf(Vec<Value>),
    /// Value must satisfy a caller-supplied predicate.
    Predicate {
        /// Name used as the error code and in the default message.
        name: Cow<'static, str>,
        /// The predicate itself.
        check: PredicateFn,
    },
}

impl Rule {
    fn from_kind(kind: RuleKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Require the value to be non-blank.
    #[must_use]
    pub fn presence() -> Self {
        Self::from_kind(RuleKind::Presence)
    }

    /// Require the value to have the given JSON shape.
    #[must_use]
    pub fn kind(expected: ValueKind) -> Self {
        Self::from_kind(RuleKind::Kind(expected))
    }

    /// Require a string of at least `length` characters.
    #[must_use]
    pub fn min_length(length: usize) -> Self {
        Self::from_kind(RuleKind::MinLength(length))
    }

    /// Require a string of at most `length` characters.
    #[must_use]
    pub fn max_length(length: usize) -> Self {
        Self::from_kind(RuleKind::MaxLength(length))
    }

    /// Require a string matching `regex`.
    #[must_use]
    pub fn pattern(regex: Regex) -> Self {
        Self::from_kind(RuleKind::Pattern(regex))
    }

    /// Require a number strictly greater than `bound`.
    #[must_use]
    pub fn greater_than(bound: f64) -> Self {
        Self::from_kind(RuleKind::GreaterThan(bound))
    }

    /// Require a number greater than or equal to `bound`.
    #[must_use]
    pub fn at_least(bound: f64) -> Self {
        Self::from_kind(RuleKind::GreaterThanOrEqual(bound))
    }

    /// Require a number strictly less than `bound`.
    #[must_use]
    pub fn less_than(bound: f64) -> Self {
        Self::from_kind(RuleKind::LessThan(bound))
    }

    /// Require a number less than or equal to `bound`.
    #[must_use]
    pub fn at_most(bound: f64) -> Self {
        Self::from_kind(RuleKind::LessThanOrEqual(bound))
    }

    /// Require the value to be one of `values`.
    #[must_use]
    pub fn one_of(values: Vec<Value>) -> Self {
        Self::from_kind(RuleKind::OneOf(values))
    }

    /// Forbid the value from being any of `values`.
    #[must_use]
    pub fn none_of(values: Vec<Value>) -> Self {
        Self::from_kind(RuleKind::NoneOf(values))
    }

    /// Require the value to satisfy `check`. `name` becomes the error code.
    #[must_use]
    pub fn predicate(
        name: impl Into<Cow<'static, str>>,
        check: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::from_kind(RuleKind::Predicate {
            name: name.into(),
            check: Arc::new(check),
        })
    }

    /// Override the error message produced when this rule fails.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Whether this is a presence rule.
    ///
    /// The contract uses this to decide whether to add its own presence
    /// rule for a field.
    #[must_use]
    pub fn is_presence(&self) -> bool {
        matches!(self.kind, RuleKind::Presence)
    }

    /// The rule shape.
    #[must_use]
    pub fn shape(&self) -> &RuleKind {
        &self.kind
    }

    /// Check one value, reporting a [`ValidationError`] on failure.
    ///
    /// Blank-value skipping is the caller's concern; the engine decides
    /// per field whether nil or blank values bypass non-presence rules.
    pub fn check(&self, value: &Value) -> Result<(), ValidationError> {
        match self.kind.check(value) {
            Ok(()) => Ok(()),
            Err(error) => match &self.message {
                Some(message) => Err(error.with_message(message.clone())),
                None => Err(error),
            },
        }
    }
}

impl RuleKind {
    fn check(&self, value: &Value) -> Result<(), ValidationError> {
        match self {
            Self::Presence => {
                if is_blank(value) {
                    Err(ValidationError::new("required", "This field is required"))
                } else {
                    Ok(())
                }
            }
            Self::Kind(expected) => {
                if expected.matches(value) {
                    Ok(())
                } else {
                    Err(ValidationError::new(
                        "type_mismatch",
                        format!("Value is not a valid {expected}"),
                    )
                    .with_param("expected", expected.name())
                    .with_param("actual", kind_of(value)))
                }
            }
            Self::MinLength(length) => {
                let text = expect_string(value)?;
                let actual = text.chars().count();
                if actual >= *length {
                    Ok(())
                } else {
                    Err(ValidationError::new(
                        "min_length",
                        format!("Value must be at least {length} characters"),
                    )
                    .with_param("min", length.to_string())
                    .with_param("actual", actual.to_string()))
                }
            }
            Self::MaxLength(length) => {
                let text = expect_string(value)?;
                let actual = text.chars().count();
                if actual <= *length {
                    Ok(())
                } else {
                    Err(ValidationError::new(
                        "max_length",
                        format!("Value must be at most {length} characters"),
                    )
                    .with_param("max", length.to_string())
                    .with_param("actual", actual.to_string()))
                }
            }
            Self::Pattern(regex) => {
                let text = expect_string(value)?;
                if regex.is_match(text) {
                    Ok(())
                } else {
                    Err(ValidationError::new("pattern", "Value has an invalid format")
                        .with_param("pattern", regex.as_str().to_owned()))
                }
            }
            Self::GreaterThan(bound) => {
                let actual = expect_number(value)?;
                if actual > *bound {
                    Ok(())
                } else {
                    Err(numeric_error("greater_than", "greater than", *bound, actual))
                }
            }
            Self::GreaterThanOrEqual(bound) => {
                let actual = expect_number(value)?;
                if actual >= *bound {
                    Ok(())
                } else {
                    Err(numeric_error(
                        "greater_than_or_equal",
                        "greater than or equal to",
                        *bound,
                        actual,
                    ))
                }
            }
            Self::LessThan(bound) => {
                let actual = expect_number(value)?;
                if actual < *bound {
                    Ok(())
                } else {
                    Err(numeric_error("less_than", "less than", *bound, actual))
                }
            }
            Self::LessThanOrEqual(bound) => {
                let actual = expect_number(value)?;
                if actual <= *bound {
                    Ok(())
                } else {
                    Err(numeric_error(
                        "less_than_or_equal",
                        "less than or equal to",
                        *bound,
                        actual,
                    ))
                }
            }
            Self::OneOf(values) => {
                if values.contains(value) {
                    Ok(())
                } else {
                    Err(
                        ValidationError::new("inclusion", "Value is not in the allowed set")
                            .with_param("actual", value.to_string()),
                    )
                }
            }
            Self::NoneOf(values) => {
                if values.contains(value) {
                    Err(ValidationError::new("exclusion", "Value is reserved")
                        .with_param("actual", value.to_string()))
                } else {
                    Ok(())
                }
            }
            Self::Predicate { name, check } => {
                if check(value) {
                    Ok(())
                } else {
                    Err(ValidationError::new(
                        name.clone(),
                        format!("Value failed the {name} check"),
                    ))
                }
            }
        }
    }
}

fn expect_string(value: &Value) -> Result<&str, ValidationError> {
    value.as_str().ok_or_else(|| {
        ValidationError::new("type_mismatch", "Value must be a string")
            .with_param("expected", "string")
            .with_param("actual", kind_of(value))
    })
}

fn expect_number(value: &Value) -> Result<f64, ValidationError> {
    value.as_f64().ok_or_else(|| {
        ValidationError::new("type_mismatch", "Value must be a number")
            .with_param("expected", "number")
            .with_param("actual", kind_of(value))
    })
}

fn numeric_error(code: &'static str, relation: &str, bound: f64, actual: f64) -> ValidationError {
    ValidationError::new(code, format!("Value must be {relation} {bound}"))
        .with_param("bound", bound.to_string())
        .with_param("actual", actual.to_string())
}

impl fmt::Debug for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Presence => f.write_str("Presence"),
            Self::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Self::MinLength(n) => f.debug_tuple("MinLength").field(n).finish(),
            Self::MaxLength(n) => f.debug_tuple("MaxLength").field(n).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::GreaterThan(b) => f.debug_tuple("GreaterThan").field(b).finish(),
            Self::GreaterThanOrEqual(b) => f.debug_tuple("GreaterThanOrEqual").field(b).finish(),
            Self::LessThan(b) => f.debug_tuple("LessThan").field(b).finish(),
            Self::LessThanOrEqual(b) => f.debug_tuple("LessThanOrEqual").field(b).finish(),
            Self::OneOf(values) => f.debug_tuple("OneOf").field(values).finish(),
            Self::NoneOf(values) => f.debug_tuple("NoneOf").field(values).finish(),
            Self::Predicate { name, .. } => f.debug_struct("Predicate").field("name", name).finish(),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn presence_rejects_blank() {
        let rule = Rule::presence();
        assert!(rule.check(&json!(null)).is_err());
        assert!(rule.check(&json!("  ")).is_err());
        assert!(rule.check(&json!("x")).is_ok());
        assert!(rule.check(&json!(false)).is_ok());
    }

    #[test]
    fn kind_mismatch_names_both_sides() {
        let rule = Rule::kind(ValueKind::Number);
        let error = rule.check(&json!("nope")).unwrap_err();
        assert_eq!(error.code, "type_mismatch");
        assert_eq!(error.param("expected"), Some("number"));
        assert_eq!(error.param("actual"), Some("string"));
    }

    #[test]
    fn length_bounds_count_chars() {
        assert!(Rule::min_length(3).check(&json!("héé")).is_ok());
        assert!(Rule::min_length(4).check(&json!("héé")).is_err());
        assert!(Rule::max_length(2).check(&json!("abc")).is_err());
    }

    #[test]
    fn length_on_non_string_is_type_error() {
        let error = Rule::min_length(1).check(&json!(5)).unwrap_err();
        assert_eq!(error.code, "type_mismatch");
    }

    #[test]
    fn greater_than_message_names_bound() {
        let rule = Rule::greater_than(10.0);
        let error = rule.check(&json!(9)).unwrap_err();
        assert!(error.message.contains("greater than 10"));
        assert_eq!(error.param("actual"), Some("9"));
        assert!(rule.check(&json!(11)).is_ok());
        assert!(rule.check(&json!(10)).is_err());
    }

    #[test]
    fn numeric_bound_variants() {
        assert!(Rule::at_least(2.0).check(&json!(2)).is_ok());
        assert!(Rule::at_least(2.0).check(&json!(1.5)).is_err());
        assert!(Rule::less_than(2.0).check(&json!(2)).is_err());
        assert!(Rule::at_most(2.0).check(&json!(2)).is_ok());
    }

    #[test]
    fn pattern_matches_strings() {
        let rule = Rule::pattern(Regex::new(r"^[a-z]+$").unwrap());
        assert!(rule.check(&json!("abc")).is_ok());
        let error = rule.check(&json!("abc1")).unwrap_err();
        assert_eq!(error.code, "pattern");
        assert_eq!(error.param("pattern"), Some("^[a-z]+$"));
    }

    #[test]
    fn inclusion_and_exclusion() {
        let allowed = vec![json!("red"), json!("blue")];
        assert!(Rule::one_of(allowed.clone()).check(&json!("red")).is_ok());
        assert!(Rule::one_of(allowed.clone()).check(&json!("green")).is_err());
        assert!(Rule::none_of(allowed.clone()).check(&json!("green")).is_ok());
        assert!(Rule::none_of(allowed).check(&json!("blue")).is_err());
    }

    #[test]
    fn predicate_uses_name_as_code() {
        let rule = Rule::predicate("even", |v| v.as_i64().is_some_and(|n| n % 2 == 0));
        assert!(rule.check(&json!(4)).is_ok());
        let error = rule.check(&json!(3)).unwrap_err();
        assert_eq!(error.code, "even");
        assert!(error.message.contains("even"));
    }

    #[test]
    fn message_override_applies_on_failure() {
        let rule = Rule::presence().with_message("give us something");
        let error = rule.check(&json!(null)).unwrap_err();
        assert_eq!(error.message, "give us something");
        assert_eq!(error.code, "required");
    }

    #[test]
    fn is_presence_flags_only_presence() {
        assert!(Rule::presence().is_presence());
        assert!(!Rule::min_length(1).is_presence());
    }
}
