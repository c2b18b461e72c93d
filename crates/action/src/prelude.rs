//! Convenience re-exports for action authors.
//!
//! ```
//! use operon_action::prelude::*;
//! ```

pub use crate::context::{ActionContext, ContextSnapshot};
pub use crate::contract::Field;
pub use crate::definition::{ActionBuilder, ActionDefinition, IntoInputs};
pub use crate::error::{ContractViolation, Flow, Interrupt};
pub use crate::events::{EventRule, Interceptor};
pub use crate::messages::{EventContext, Matcher, MessageBody, MessageRule};
pub use crate::provider::{ActionLogger, Clock, ExceptionReporter, ModelLookup};
pub use crate::registry::ActionRegistry;
pub use crate::result::{ActionResult, Outcome};
pub use crate::{done, fail};

pub use operon_validator::{Rule, ValueKind};
