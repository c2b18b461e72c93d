//! Message rules and the resolution engine.
//!
//! Each definition keeps two registries of [`MessageRule`]s (`success`
//! and `error`) in registration order. Extension copies parent rules
//! first, so child rules sit later in the list and win under the
//! newest-registered-first scan.
//!
//! Resolution is total: an explicit `fail!`/`done!` message
//! short-circuits; otherwise conditional rules are scanned newest-first,
//! then static rules newest-first, ending at a hard-coded fallback. A
//! matcher that errors is non-matching; a producer that errors falls
//! through to the next candidate. Neither can crash resolution.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::{ActionContext, ContextSnapshot};
use crate::error::{BoxError, ContractViolation, NestedFailure};
use crate::result::Outcome;

/// Fallback when no error rule resolves.
pub const DEFAULT_ERROR_MESSAGE: &str = "Something went wrong";

/// Fallback when no success rule resolves.
pub const DEFAULT_SUCCESS_MESSAGE: &str = "Action completed successfully";

/// Read-only view handed to matchers, message producers, and event
/// handlers.
pub struct EventContext<'a> {
    context: &'a ActionContext,
    outcome: Outcome,
    error: Option<&'a (dyn std::error::Error + 'static)>,
    delegated: Option<&'a str>,
    resolved: Option<&'a str>,
}

impl<'a> EventContext<'a> {
    pub(crate) fn new(
        context: &'a ActionContext,
        outcome: Outcome,
        error: Option<&'a (dyn std::error::Error + 'static)>,
        delegated: Option<&'a str>,
        resolved: Option<&'a str>,
    ) -> Self {
        Self {
            context,
            outcome,
            error,
            delegated,
            resolved,
        }
    }

    /// Name of the action being finalized.
    #[must_use]
    pub fn action(&self) -> &str {
        self.context.action()
    }

    /// The terminal outcome.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Read a declared field by name or dotted subfield path.
    pub fn value(&self, name: &str) -> Result<&Value, ContractViolation> {
        self.context.value(name)
    }

    /// Read and deserialize a declared field.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, ContractViolation> {
        self.context.get(name)
    }

    /// The captured error, when the event has one.
    #[must_use]
    pub fn error(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error
    }

    /// The error's user-facing text: a nested action's already-resolved
    /// message when the error is a delegated [`NestedFailure`], otherwise
    /// the error's own rendering.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.delegated
            .map(str::to_owned)
            .or_else(|| self.error.map(ToString::to_string))
    }

    /// The resolved user-facing message. Present for event handlers,
    /// absent while message resolution itself is running.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.resolved
    }

    /// A redacted snapshot of the current context.
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        self.context.snapshot()
    }
}

impl fmt::Debug for EventContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContext")
            .field("action", &self.action())
            .field("outcome", &self.outcome)
            .field("has_error", &self.error.is_some())
            .finish_non_exhaustive()
    }
}

/// Predicate signature for [`Matcher::try_when`].
pub type MatcherFn = Arc<dyn Fn(&EventContext<'_>) -> Result<bool, BoxError> + Send + Sync>;

/// Condition attached to a message or event rule.
///
/// A tagged variant rather than duck-typed probing: a predicate over the
/// event context, or an error-type test via downcast.
#[derive(Clone)]
pub enum Matcher {
    /// A predicate evaluated against the event context.
    Predicate(MatcherFn),
    /// Matches when the captured error downcasts to a given type.
    ErrorType {
        /// Type name, for Debug output.
        name: &'static str,
        /// The downcast test.
        test: Arc<dyn Fn(&(dyn std::error::Error + 'static)) -> bool + Send + Sync>,
    },
}

impl Matcher {
    /// An infallible predicate.
    pub fn when(check: impl Fn(&EventContext<'_>) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(move |cx| Ok(check(cx))))
    }

    /// A fallible predicate; an `Err` counts as non-matching and is
    /// logged.
    pub fn try_when(
        check: impl Fn(&EventContext<'_>) -> Result<bool, BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self::Predicate(Arc::new(check))
    }

    /// Matches when the captured error is an `E`.
    #[must_use]
    pub fn error_is<E: std::error::Error + 'static>() -> Self {
        Self::ErrorType {
            name: std::any::type_name::<E>(),
            test: Arc::new(|error| error.is::<E>()),
        }
    }

    /// Evaluate against an event context.
    pub(crate) fn evaluate(&self, cx: &EventContext<'_>) -> Result<bool, BoxError> {
        match self {
            Self::Predicate(check) => check(cx),
            Self::ErrorType { test, .. } => Ok(cx.error().is_some_and(|error| test(error))),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::ErrorType { name, .. } => f.debug_tuple("ErrorType").field(name).finish(),
        }
    }
}

/// What a message rule produces: a literal or a fallible producer.
#[derive(Clone)]
pub enum MessageBody {
    /// A literal message.
    Static(Cow<'static, str>),
    /// A producer closure; an `Err` falls through to the next candidate.
    Producer(Arc<dyn Fn(&EventContext<'_>) -> Result<String, BoxError> + Send + Sync>),
}

impl MessageBody {
    /// A literal message body.
    pub fn text(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Static(message.into())
    }

    /// An infallible producer.
    pub fn produce(produce: impl Fn(&EventContext<'_>) -> String + Send + Sync + 'static) -> Self {
        Self::Producer(Arc::new(move |cx| Ok(produce(cx))))
    }

    /// A fallible producer.
    pub fn try_produce(
        produce: impl Fn(&EventContext<'_>) -> Result<String, BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self::Producer(Arc::new(produce))
    }

    pub(crate) fn render(&self, cx: &EventContext<'_>) -> Result<String, BoxError> {
        match self {
            Self::Static(message) => Ok(message.clone().into_owned()),
            Self::Producer(produce) => produce(cx),
        }
    }
}

impl From<&'static str> for MessageBody {
    fn from(message: &'static str) -> Self {
        Self::Static(Cow::Borrowed(message))
    }
}

impl From<String> for MessageBody {
    fn from(message: String) -> Self {
        Self::Static(Cow::Owned(message))
    }
}

impl fmt::Debug for MessageBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(message) => f.debug_tuple("Static").field(message).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// One registered success or error message rule.
#[derive(Debug, Clone)]
pub struct MessageRule {
    when: Option<Matcher>,
    unless: Option<Matcher>,
    from: Option<String>,
    body: MessageBody,
}

impl MessageRule {
    /// A rule producing the given body, unconditional until scoped.
    pub fn new(body: impl Into<MessageBody>) -> Self {
        Self {
            when: None,
            unless: None,
            from: None,
            body: body.into(),
        }
    }

    /// Fire only when the matcher holds.
    #[must_use]
    pub fn when(mut self, matcher: Matcher) -> Self {
        self.when = Some(matcher);
        self
    }

    /// Fire only when the matcher does **not** hold. Sugar for an
    /// inverted `when`; declaring both on one rule is a declaration-time
    /// error.
    #[must_use]
    pub fn unless(mut self, matcher: Matcher) -> Self {
        self.unless = Some(matcher);
        self
    }

    /// Fire only for errors delegated from the named nested action. The
    /// producer then reads the nested action's resolved message via
    /// [`EventContext::error_message`].
    #[must_use]
    pub fn from_action(mut self, action: impl Into<String>) -> Self {
        self.from = Some(action.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ContractViolation> {
        if self.when.is_some() && self.unless.is_some() {
            return Err(ContractViolation::Declaration(
                "a message rule cannot declare both `when` and `unless`".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn is_conditional(&self) -> bool {
        self.when.is_some() || self.unless.is_some() || self.from.is_some()
    }

    pub(crate) fn matches(&self, cx: &EventContext<'_>) -> Result<bool, BoxError> {
        if let Some(from) = &self.from {
            let delegated = cx
                .error()
                .and_then(|error| error.downcast_ref::<NestedFailure>())
                .is_some_and(|nested| &nested.action == from);
            if !delegated {
                return Ok(false);
            }
        }
        if let Some(matcher) = &self.when {
            if !matcher.evaluate(cx)? {
                return Ok(false);
            }
        }
        if let Some(matcher) = &self.unless {
            if matcher.evaluate(cx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub(crate) fn render(&self, cx: &EventContext<'_>) -> Result<String, BoxError> {
        self.body.render(cx)
    }
}

/// The success and error registries of one definition.
#[derive(Debug, Clone, Default)]
pub(crate) struct Messages {
    pub(crate) success: Vec<MessageRule>,
    pub(crate) error: Vec<MessageRule>,
}

/// Resolve one event's message.
///
/// `explicit` is the `fail!`/`done!` message and wins outright. Otherwise:
/// conditionals newest-registered-first, then statics
/// newest-registered-first, then the fallback.
pub(crate) fn resolve(
    rules: &[MessageRule],
    cx: &EventContext<'_>,
    explicit: Option<&str>,
    fallback: &'static str,
    warn: &mut dyn FnMut(String),
) -> String {
    if let Some(message) = explicit {
        return message.to_owned();
    }
    for conditional_pass in [true, false] {
        for rule in rules.iter().rev() {
            if rule.is_conditional() != conditional_pass {
                continue;
            }
            if conditional_pass {
                match rule.matches(cx) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(error) => {
                        warn(format!("message matcher failed, skipping rule: {error}"));
                        continue;
                    }
                }
            }
            match rule.render(cx) {
                Ok(message) => return message,
                Err(error) => {
                    warn(format!("message producer failed, trying next rule: {error}"));
                }
            }
        }
    }
    fallback.to_owned()
}
