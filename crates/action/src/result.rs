//! Terminal outcomes and the caller-facing result facade.
//!
//! [`Outcome`] is derived once, deterministically, from the captured
//! interrupt's variant, never from message content, and is immutable on
//! the result. [`ActionResult`] exposes the control surface (`ok`,
//! `error`, `success`, `message`, `outcome`, `exception`, `elapsed_time`)
//! plus one read per declared output field.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::{ContextSnapshot, ContextStore, read_path};
use crate::contract::Contract;
use crate::error::{ContractViolation, Interrupt};

static NULL: Value = Value::Null;

/// The three mutually exclusive terminal states of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The pipeline completed (or completed early) with no failure signal.
    Success,
    /// User logic or a hook explicitly signaled failure.
    Failure,
    /// Any other unhandled error escaped, including every contract
    /// violation.
    Exception,
}

impl Outcome {
    /// Classify a captured interrupt.
    ///
    /// Reads only the variant: no interrupt and early completion are
    /// success; an explicit failure signal is failure; contract violations
    /// and unhandled errors are exceptions.
    #[must_use]
    pub fn classify(interrupt: Option<&Interrupt>) -> Self {
        match interrupt {
            None | Some(Interrupt::Completed { .. }) => Self::Success,
            Some(Interrupt::Failure { .. }) => Self::Failure,
            Some(Interrupt::Violation(_) | Interrupt::Unhandled(_)) => Self::Exception,
        }
    }

    /// Whether this is the success state.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether this is the explicit-failure state.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failure)
    }

    /// Whether this is the exception state.
    #[must_use]
    pub fn is_exception(self) -> bool {
        matches!(self, Self::Exception)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Exception => "exception",
        })
    }
}

/// The outbound facade returned to callers.
///
/// Owns the invocation's store; reads resolve declared output fields only.
/// Sensitive values are redacted from Debug output.
pub struct ActionResult {
    pub(crate) action: String,
    pub(crate) contract: Arc<Contract>,
    pub(crate) store: ContextStore,
    pub(crate) outcome: Outcome,
    pub(crate) success_message: Option<String>,
    pub(crate) error_message: Option<String>,
}

impl ActionResult {
    /// Name of the action that produced this result.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Whether the invocation succeeded.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.outcome.is_success()
    }

    /// The terminal outcome. Idempotent: computed once at finalization.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// The resolved success message, present only on success.
    #[must_use]
    pub fn success(&self) -> Option<&str> {
        self.success_message.as_deref()
    }

    /// The resolved error message, present on failure and exception.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// The resolved user-facing message: success or error, always
    /// present.
    #[must_use]
    pub fn message(&self) -> &str {
        self.success_message
            .as_deref()
            .or(self.error_message.as_deref())
            .unwrap_or_default()
    }

    /// The captured error, for exception (and wrapped-failure) results.
    #[must_use]
    pub fn exception(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.store.interrupt.as_ref().and_then(Interrupt::as_error)
    }

    /// Wall time of the invocation, in milliseconds, from the injected
    /// monotonic clock.
    #[must_use]
    pub fn elapsed_time(&self) -> f64 {
        self.store.elapsed_ms
    }

    /// Read a declared output field. Unexposed declared outputs read as
    /// JSON null.
    ///
    /// Inbound fields are not readable here; asking for one (or for an
    /// undeclared name) is a [`ContractViolation::MethodNotAllowed`].
    pub fn value(&self, name: &str) -> Result<&Value, ContractViolation> {
        if let Some(spec) = self.contract.find_outbound(name) {
            return Ok(self.store.exposed.get(spec.name()).unwrap_or(&NULL));
        }
        let reason = if self.contract.find_inbound(name).is_some() {
            format!("inbound fields are not exposed on the result of `{}`", self.action)
        } else {
            format!("not declared by `{}`", self.action)
        };
        Err(ContractViolation::MethodNotAllowed {
            field: name.to_owned(),
            reason,
        })
    }

    /// Read and deserialize a declared output field.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, ContractViolation> {
        let value = self.value(name)?;
        serde_json::from_value(value.clone()).map_err(|error| {
            ContractViolation::MethodNotAllowed {
                field: name.to_owned(),
                reason: format!("declared value does not deserialize: {error}"),
            }
        })
    }

    /// A redacted snapshot of the final context.
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        let cx = crate::context::ActionContext {
            action: self.action.clone(),
            contract: Arc::clone(&self.contract),
            store: ContextStore {
                provided: self.store.provided.clone(),
                exposed: self.store.exposed.clone(),
                interrupt: None,
                elapsed_ms: self.store.elapsed_ms,
                finalized: self.store.finalized,
            },
            depth: 0,
        };
        cx.snapshot()
    }

    pub(crate) fn interrupt(&self) -> Option<&Interrupt> {
        self.store.interrupt.as_ref()
    }

    /// Whether a sensitive outbound path holds a value (used by Debug).
    fn exposed_fields(&self) -> serde_json::Map<String, Value> {
        let mut fields = self.store.exposed.clone();
        for path in self.contract.sensitive_paths() {
            if read_path(&fields, path).is_some() {
                crate::context::write_path(
                    &mut fields,
                    path,
                    Value::String(crate::context::FILTERED.to_owned()),
                );
            }
        }
        fields
    }
}

impl fmt::Debug for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionResult")
            .field("action", &self.action)
            .field("outcome", &self.outcome)
            .field("message", &self.message())
            .field("exposed", &self.exposed_fields())
            .field("elapsed_ms", &self.store.elapsed_ms)
            .field("finalized", &self.store.finalized)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Contract, Direction, Field};
    use serde_json::json;

    fn result_with(outcome: Outcome, interrupt: Option<Interrupt>) -> ActionResult {
        let mut contract = Contract::default();
        contract
            .declare(Direction::Inbound, Field::new("input"))
            .unwrap();
        contract
            .declare(Direction::Outbound, Field::new("output"))
            .unwrap();
        contract
            .declare(Direction::Outbound, Field::new("secret").sensitive())
            .unwrap();

        let mut store = ContextStore::default();
        store.exposed.insert("output".into(), json!(42));
        store.exposed.insert("secret".into(), json!("s3cret"));
        store.interrupt = interrupt;

        ActionResult {
            action: "sample".into(),
            contract: Arc::new(contract),
            store,
            outcome,
            success_message: outcome.is_success().then(|| "done".to_owned()),
            error_message: (!outcome.is_success()).then(|| "broke".to_owned()),
        }
    }

    #[test]
    fn classify_reads_variant_only() {
        assert_eq!(Outcome::classify(None), Outcome::Success);
        assert_eq!(
            Outcome::classify(Some(&Interrupt::done("early"))),
            Outcome::Success
        );
        assert_eq!(
            Outcome::classify(Some(&Interrupt::failure("no"))),
            Outcome::Failure
        );
        assert_eq!(
            Outcome::classify(Some(&Interrupt::error("boom"))),
            Outcome::Exception
        );
        assert_eq!(
            Outcome::classify(Some(&Interrupt::Violation(
                ContractViolation::Declaration("bad".into())
            ))),
            Outcome::Exception
        );
    }

    #[test]
    fn outcome_is_idempotent() {
        let result = result_with(Outcome::Failure, Some(Interrupt::failure("no")));
        assert_eq!(result.outcome(), result.outcome());
        assert_eq!(result.outcome(), Outcome::Failure);
    }

    #[test]
    fn messages_split_by_state() {
        let success = result_with(Outcome::Success, None);
        assert_eq!(success.success(), Some("done"));
        assert_eq!(success.error(), None);
        assert_eq!(success.message(), "done");

        let failure = result_with(Outcome::Failure, Some(Interrupt::failure_silent()));
        assert_eq!(failure.success(), None);
        assert_eq!(failure.error(), Some("broke"));
        assert_eq!(failure.message(), "broke");
    }

    #[test]
    fn exception_accessor_exposes_captured_error() {
        let result = result_with(Outcome::Exception, Some(Interrupt::error("boom")));
        assert_eq!(result.exception().unwrap().to_string(), "boom");

        let silent = result_with(Outcome::Failure, Some(Interrupt::failure_silent()));
        assert!(silent.exception().is_none());
    }

    #[test]
    fn output_reads_are_scoped() {
        let result = result_with(Outcome::Success, None);
        assert_eq!(result.value("output").unwrap(), &json!(42));
        assert_eq!(result.get::<i64>("output").unwrap(), 42);

        let inbound = result.value("input").unwrap_err();
        assert!(inbound.to_string().contains("not exposed"));

        let unknown = result.value("ghost").unwrap_err();
        assert!(unknown.to_string().contains("not declared"));
    }

    #[test]
    fn debug_redacts_sensitive_outputs() {
        let result = result_with(Outcome::Success, None);
        let rendered = format!("{result:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("42"));
    }

    #[test]
    fn outcome_display() {
        assert_eq!(Outcome::Success.to_string(), "success");
        assert_eq!(Outcome::Failure.to_string(), "failure");
        assert_eq!(Outcome::Exception.to_string(), "exception");
    }
}
