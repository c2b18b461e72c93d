//! # Operon Action Engine
//!
//! A declarative, in-process execution framework for **actions**:
//! self-contained units of business logic with a typed inbound/outbound
//! data contract, lifecycle hooks, and rule-based outcome and message
//! resolution.
//!
//! Callers invoke an action with loosely-typed named inputs. The engine
//! validates and transforms them against the declared contract, runs the
//! user logic, validates the declared outputs, and returns a uniform
//! [`ActionResult`] exposing success/failure state, a resolved
//! user-facing message, and the declared output values. `call` never
//! raises for business or validation failures; every path comes back as
//! a result.
//!
//! ## Core types
//!
//! - [`ActionDefinition`] / [`ActionBuilder`] — one declared action:
//!   contract, hooks, message rules, event rules, and the `call` entry
//!   point. Definitions can extend one another by structural copy.
//! - [`Field`] — one contract field: validation rules, default,
//!   preprocess, sensitivity, nesting.
//! - [`ActionContext`] — the inbound facade handed to hooks and user
//!   logic; reads resolve declared fields only.
//! - [`ActionResult`] — the outbound facade returned to callers.
//! - [`Interrupt`] / [`Flow`] — the stop signals: explicit failure, early
//!   completion, contract violation, unhandled error.
//! - [`Matcher`] / [`MessageRule`] / [`EventRule`] — the conditional
//!   message-resolution and lifecycle-callback registries.
//!
//! ## Quick start
//!
//! ```
//! use operon_action::prelude::*;
//! use serde_json::json;
//!
//! let greet = ActionDefinition::builder("greet")
//!     .expects(Field::new("name").kind(ValueKind::String))
//!     .exposes(Field::new("greeting"))
//!     .body(|cx| {
//!         let name: String = cx.get("name")?;
//!         cx.expose("greeting", format!("Hello, {name}!"))
//!     })
//!     .success("Greeted.")
//!     .build()
//!     .unwrap();
//!
//! let result = greet.call([("name", json!("world"))]);
//! assert!(result.ok());
//! assert_eq!(result.get::<String>("greeting").unwrap(), "Hello, world!");
//!
//! let missing = greet.call(());
//! assert!(!missing.ok());
//! assert_eq!(missing.outcome(), Outcome::Exception);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Per-invocation context store, inbound facade, and redacted snapshots.
pub mod context;
/// Field contract declarations and frozen per-field configuration.
pub mod contract;
/// Action definitions, the builder, and the execution pipeline.
pub mod definition;
/// Error taxonomy and control-flow signals.
pub mod error;
/// Lifecycle event handlers, interceptors, and the global reporter.
pub mod events;
/// Around/before/after hooks and their ordering.
pub mod hooks;
mod macros;
/// Message rules and the resolution engine.
pub mod messages;
/// Dependency-injection port traits (logging, lookup, reporting, clock).
pub mod provider;
/// Convenience re-exports for action authors.
pub mod prelude;
/// Name-keyed registry of action definitions.
pub mod registry;
/// Terminal outcomes and the caller-facing result facade.
pub mod result;
mod validate;

// ── Public re-exports ───────────────────────────────────────────────────────

pub use context::{ActionContext, ContextSnapshot, FILTERED};
pub use contract::{Direction, Field, FieldSpec, FieldSummary, RESERVED_NAMES};
pub use definition::{ActionBuilder, ActionDefinition, IntoInputs};
pub use error::{BoxError, ContractViolation, Flow, Interrupt, NestedFailure, SharedError};
pub use events::{EventRule, Interceptor, set_exception_reporter};
pub use hooks::{AroundFn, HookFn};
pub use messages::{
    DEFAULT_ERROR_MESSAGE, DEFAULT_SUCCESS_MESSAGE, EventContext, Matcher, MessageBody, MessageRule,
};
pub use provider::{
    ActionLogger, Clock, ExceptionReporter, ManualClock, ModelLookup, SystemClock, TracingLogger,
};
pub use registry::ActionRegistry;
pub use result::{ActionResult, Outcome};
