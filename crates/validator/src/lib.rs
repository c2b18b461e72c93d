//! # operon-validator
//!
//! Field-level validation rules for the Operon action framework.
//!
//! Contract fields carry an ordered list of [`Rule`]s built at definition
//! time. Each rule checks one `serde_json::Value` and reports a structured
//! [`ValidationError`]; a validation pass collects every failure into a
//! [`ValidationErrors`] aggregate.
//!
//! ```
//! use operon_validator::{Rule, ValueKind};
//! use serde_json::json;
//!
//! let rules = vec![
//!     Rule::kind(ValueKind::Number),
//!     Rule::greater_than(10.0),
//! ];
//!
//! assert!(rules.iter().all(|r| r.check(&json!(11)).is_ok()));
//! assert!(rules.iter().any(|r| r.check(&json!(9)).is_err()));
//! ```

// ValidationError is the fundamental error type of every check; boxing it
// would add indirection to each validation call for no practical benefit.
#![allow(clippy::result_large_err)]

pub mod error;
pub mod rule;
pub mod value;

pub use error::{ValidationError, ValidationErrors};
pub use rule::{PredicateFn, Rule, RuleKind};
pub use value::{ValueKind, is_blank, is_present, kind_of};
