//! Error taxonomy and control-flow signals.
//!
//! Two families live here. [`ContractViolation`] covers broken declaration
//! or data contracts: programming problems, always classified as the
//! `Exception` outcome. [`Interrupt`] is the signal a running action
//! propagates to stop early: explicit failure, early completion, a contract
//! violation, or any other unhandled error. Early completion is a control
//! signal, not an error — it finalizes as success.

use std::fmt;
use std::sync::Arc;

use operon_validator::ValidationErrors;

use crate::contract::Direction;
use crate::result::Outcome;

/// Plain boxed error, for fallible user-supplied closures (matchers,
/// producers, handlers, lookups).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared boxed error, cloneable so a captured signal can be both recorded
/// on the context store and propagated to outer hooks.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// A broken input/output/declaration contract.
///
/// Contract violations are a distinguished hierarchy: they always classify
/// as the `Exception` outcome, never `Failure`, even though they are
/// "expected" errors — they represent a programming contract problem, not a
/// business-rule rejection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContractViolation {
    /// One or more inbound field rules failed.
    #[error("inbound contract violated: {0}")]
    InboundValidation(ValidationErrors),

    /// One or more outbound field rules failed.
    #[error("outbound contract violated: {0}")]
    OutboundValidation(ValidationErrors),

    /// A field's preprocess step returned an error.
    #[error("preprocessing `{field}` failed: {source}")]
    Preprocessing {
        /// The field whose preprocess step failed.
        field: String,
        /// The underlying error.
        source: SharedError,
    },

    /// A field's default closure returned an error.
    #[error("default for `{field}` failed: {source}")]
    DefaultAssignment {
        /// The field whose default failed.
        field: String,
        /// The underlying error.
        source: SharedError,
    },

    /// The same field name was declared twice in one direction.
    #[error("duplicate {direction} field `{field}`")]
    DuplicateField {
        /// The offending field name.
        field: String,
        /// The direction it was declared in.
        direction: Direction,
    },

    /// A field was declared with a name the result surface reserves.
    #[error("`{field}` is a reserved name and cannot be declared as a field")]
    ReservedAttribute {
        /// The offending field name.
        field: String,
    },

    /// `expose` was called for a field the contract does not declare.
    #[error("`{field}` is not a declared output of `{action}`")]
    UnknownExposure {
        /// The undeclared field name.
        field: String,
        /// The action whose contract was consulted.
        action: String,
    },

    /// A field was read through a facade that does not expose it.
    #[error("`{field}` is not readable here: {reason}")]
    MethodNotAllowed {
        /// The field name that was requested.
        field: String,
        /// Why the read is not allowed.
        reason: String,
    },

    /// Misuse of the declaration API itself (undeclared subfield parent,
    /// dotted parent path, conflicting matchers, ...). Surfaced eagerly
    /// from `ActionBuilder::build`, never at call time.
    #[error("invalid declaration: {0}")]
    Declaration(String),
}

/// The signal a running action propagates to stop early.
///
/// User logic, hooks, preprocess steps, and default closures all return
/// [`Flow`]; any `Err` halts the remaining pipeline at the current nesting
/// level and is recorded on the context store. Classification reads only
/// the variant, never message content.
#[derive(Debug, Clone)]
pub enum Interrupt {
    /// Explicit "halt now and fail" with an optional user-facing message.
    Failure {
        /// Message later surfaced as `ActionResult::error`.
        message: Option<String>,
    },

    /// Explicit "halt now and succeed" with an optional user-facing
    /// message. Not an error outcome.
    Completed {
        /// Message later surfaced as `ActionResult::success`.
        message: Option<String>,
    },

    /// A contract violation raised by validation, preprocessing, or a
    /// facade read.
    Violation(ContractViolation),

    /// Any other unhandled error that escaped user logic or a hook.
    Unhandled(SharedError),
}

/// Result type threaded through hooks, user logic, preprocess steps, and
/// default closures.
pub type Flow<T = ()> = Result<T, Interrupt>;

impl Interrupt {
    /// Explicit failure with a message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: Some(message.into()),
        }
    }

    /// Explicit failure without a message.
    #[must_use]
    pub fn failure_silent() -> Self {
        Self::Failure { message: None }
    }

    /// Early completion with a message.
    pub fn done(message: impl Into<String>) -> Self {
        Self::Completed {
            message: Some(message.into()),
        }
    }

    /// Early completion without a message.
    #[must_use]
    pub fn done_silent() -> Self {
        Self::Completed { message: None }
    }

    /// Wrap any error as an unhandled interrupt.
    pub fn error(error: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Unhandled(Arc::from(error.into()))
    }

    /// Whether this is an explicit failure signal.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Whether this is the early-completion signal.
    #[must_use]
    pub fn is_early_completion(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Whether this is a contract violation.
    #[must_use]
    pub fn is_violation(&self) -> bool {
        matches!(self, Self::Violation(_))
    }

    /// The explicit user message, when one was given.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Failure { message } | Self::Completed { message } => message.as_deref(),
            _ => None,
        }
    }

    /// The captured error, for the variants that carry one.
    #[must_use]
    pub fn as_error(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Violation(violation) => Some(violation),
            Self::Unhandled(error) => Some(&**error),
            Self::Failure { .. } | Self::Completed { .. } => None,
        }
    }
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failure { message: Some(m) } => write!(f, "failed: {m}"),
            Self::Failure { message: None } => f.write_str("failed"),
            Self::Completed { message: Some(m) } => write!(f, "completed early: {m}"),
            Self::Completed { message: None } => f.write_str("completed early"),
            Self::Violation(violation) => violation.fmt(f),
            Self::Unhandled(error) => error.fmt(f),
        }
    }
}

impl std::error::Error for Interrupt {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.as_error()
    }
}

impl From<ContractViolation> for Interrupt {
    fn from(violation: ContractViolation) -> Self {
        Self::Violation(violation)
    }
}

/// Error representing a nested action's non-success result, raised when a
/// strict nested invocation propagates.
///
/// `from`-scoped error message rules match on the `action` name and read
/// `message` — the nested action's already-resolved error message — for
/// prefixing/composition.
#[derive(Debug, Clone, thiserror::Error)]
#[error("nested action `{action}` failed: {message}")]
pub struct NestedFailure {
    /// Name of the nested action that did not succeed.
    pub action: String,
    /// The nested action's resolved error message.
    pub message: String,
    /// The nested action's terminal outcome.
    pub outcome: Outcome,
}
