//! Action definitions: the builder, the execution loop, and finalization.
//!
//! An [`ActionDefinition`] is built once, is immutable afterwards, and can
//! be called concurrently: all mutable per-call state lives in a fresh
//! context store per invocation. A definition can extend another: the
//! builder takes a structural copy of the parent's contract, hooks,
//! message rules, and event rules, so later parent changes never leak into
//! built children and child registrations win under newest-first scans.
//!
//! Declaration misuse (duplicate or reserved fields, conflicting
//! matchers) surfaces eagerly from [`ActionBuilder::build`], never at call
//! time.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::context::ActionContext;
use crate::contract::{Contract, Direction, Field, FieldSummary};
use crate::error::{ContractViolation, Flow, Interrupt, NestedFailure};
use crate::events::{self, EventRule, Events, Interceptor, dispatch};
use crate::hooks::{HookFn, Hooks};
use crate::messages::{
    DEFAULT_ERROR_MESSAGE, DEFAULT_SUCCESS_MESSAGE, EventContext, Matcher, MessageBody,
    MessageRule, Messages, resolve,
};
use crate::provider::{ActionLogger, Clock, SystemClock, TracingLogger};
use crate::result::{ActionResult, Outcome};
use crate::validate;

/// Conversion into the named-inputs map accepted by `call`.
pub trait IntoInputs {
    /// Convert into the inputs map.
    fn into_inputs(self) -> Map<String, Value>;
}

impl IntoInputs for Map<String, Value> {
    fn into_inputs(self) -> Map<String, Value> {
        self
    }
}

impl IntoInputs for Value {
    /// JSON objects convert key-by-key; any other value (including null)
    /// converts to no inputs.
    fn into_inputs(self) -> Map<String, Value> {
        match self {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl IntoInputs for () {
    fn into_inputs(self) -> Map<String, Value> {
        Map::new()
    }
}

impl<K: Into<String>, const N: usize> IntoInputs for [(K, Value); N] {
    fn into_inputs(self) -> Map<String, Value> {
        self.into_iter().map(|(k, v)| (k.into(), v)).collect()
    }
}

impl<K: Into<String>> IntoInputs for Vec<(K, Value)> {
    fn into_inputs(self) -> Map<String, Value> {
        self.into_iter().map(|(k, v)| (k.into(), v)).collect()
    }
}

/// One declared unit of business logic: contract, hooks, message rules,
/// event rules, and the `call` entry point.
pub struct ActionDefinition {
    name: String,
    contract: Arc<Contract>,
    hooks: Hooks,
    messages: Messages,
    events: Events,
    body: Option<HookFn>,
    logger: Arc<dyn ActionLogger>,
    clock: Arc<dyn Clock>,
}

impl ActionDefinition {
    /// Start building a definition with the given name.
    pub fn builder(name: impl Into<String>) -> ActionBuilder {
        ActionBuilder::new(name)
    }

    /// The action's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke with the given inputs, returning a result in every case.
    /// Business failures, validation errors, and unhandled errors all come
    /// back as a non-ok [`ActionResult`], never as a panic or `Err`.
    pub fn call(&self, inputs: impl IntoInputs) -> ActionResult {
        self.call_at_depth(inputs.into_inputs(), 0)
    }

    /// Invoke, surfacing the captured signal as `Err` instead of a non-ok
    /// result.
    pub fn call_strict(&self, inputs: impl IntoInputs) -> Result<ActionResult, Interrupt> {
        let result = self.call_at_depth(inputs.into_inputs(), 0);
        match result.interrupt() {
            Some(interrupt) if !result.ok() => Err(interrupt.clone()),
            _ => Ok(result),
        }
    }

    /// A serializable description of the declared contract.
    #[must_use]
    pub fn summary(&self) -> Vec<FieldSummary> {
        self.contract
            .inbound
            .iter()
            .chain(self.contract.subfields.iter())
            .chain(self.contract.outbound.iter())
            .map(FieldSummary::from)
            .collect()
    }

    pub(crate) fn call_at_depth(&self, inputs: Map<String, Value>, depth: usize) -> ActionResult {
        let started = self.clock.monotonic();
        let mut cx = ActionContext::new(
            self.name.clone(),
            Arc::clone(&self.contract),
            inputs,
            depth,
        );
        let pad = "  ".repeat(depth);
        self.logger
            .info(&format!("{pad}{} started", self.name), &cx.snapshot());

        let flow = self.execute(&mut cx);
        if let Err(interrupt) = flow {
            cx.record(&interrupt);
        }
        cx.store.elapsed_ms = (self.clock.monotonic() - started).as_secs_f64() * 1000.0;

        self.finalize(cx, depth)
    }

    /// The hook pipeline: around-enter → before → inbound validation →
    /// body → outbound validation → after → around-exit.
    fn execute(&self, cx: &mut ActionContext) -> Flow {
        let logger = &*self.logger;
        let hooks = &self.hooks;
        let body = self.body.as_ref();
        let mut innermost = |cx: &mut ActionContext| -> Flow {
            let flow = (|| {
                hooks.run_before(cx)?;
                validate::run_inbound(cx, logger)?;
                if let Some(run) = body {
                    run(cx)?;
                }
                validate::run_outbound(cx, logger)?;
                cx.mark_finalized();
                hooks.run_after(cx)
            })();
            // Record before re-propagating so outer around hooks can
            // observe the signal on the store.
            cx.observe(flow)
        };
        hooks.run_around(cx, &mut innermost)
    }

    /// Classify, resolve the user-facing message, dispatch event
    /// handlers, and seal the result.
    fn finalize(&self, cx: ActionContext, depth: usize) -> ActionResult {
        let outcome = Outcome::classify(cx.interrupt());
        let error = cx.interrupt().and_then(Interrupt::as_error);
        let delegated: Option<String> = error
            .and_then(|e| e.downcast_ref::<NestedFailure>())
            .map(|nested| nested.message.clone());

        let snapshot = cx.snapshot();
        let logger = &*self.logger;
        let mut warn = |message: String| logger.warn(&message, &snapshot);

        let (success_message, error_message) = if outcome.is_success() {
            let explicit = match cx.interrupt() {
                Some(Interrupt::Completed { message }) => message.as_deref(),
                _ => None,
            };
            let ev = EventContext::new(&cx, outcome, None, None, None);
            let message = resolve(
                &self.messages.success,
                &ev,
                explicit,
                DEFAULT_SUCCESS_MESSAGE,
                &mut warn,
            );
            (Some(message), None)
        } else {
            let explicit = match cx.interrupt() {
                Some(Interrupt::Failure { message }) => message.as_deref(),
                _ => None,
            };
            let ev = EventContext::new(&cx, outcome, error, delegated.as_deref(), None);
            let message = resolve(
                &self.messages.error,
                &ev,
                explicit,
                DEFAULT_ERROR_MESSAGE,
                &mut warn,
            );
            (None, Some(message))
        };

        let resolved = success_message.as_deref().or(error_message.as_deref());
        match outcome {
            Outcome::Success => {
                let ev = EventContext::new(&cx, outcome, None, None, resolved);
                dispatch("on_success", &self.events.on_success, &ev, &mut warn);
            }
            Outcome::Failure => {
                let ev = EventContext::new(&cx, outcome, error, delegated.as_deref(), resolved);
                dispatch("on_failure", &self.events.on_failure, &ev, &mut warn);
                dispatch("on_error", &self.events.on_error, &ev, &mut warn);
            }
            Outcome::Exception => {
                let ev = EventContext::new(&cx, outcome, error, delegated.as_deref(), resolved);
                let silenced = self.events.suppresses_reporting(&ev, &mut warn);
                if !silenced {
                    dispatch("on_exception", &self.events.on_exception, &ev, &mut warn);
                }
                dispatch("on_error", &self.events.on_error, &ev, &mut warn);
                if !silenced {
                    if let (Some(reporter), Some(error)) = (events::global_reporter(), error) {
                        if let Err(report_error) = reporter.report(error, &self.name, &snapshot) {
                            warn(format!("exception reporter failed: {report_error}"));
                        }
                    }
                }
            }
        }

        let pad = "  ".repeat(depth);
        logger.info(
            &format!(
                "{pad}{} finished in {:.1}ms ({outcome})",
                self.name, cx.store.elapsed_ms
            ),
            &snapshot,
        );

        let ActionContext {
            action,
            contract,
            store,
            ..
        } = cx;
        ActionResult {
            action,
            contract,
            store,
            outcome,
            success_message,
            error_message,
        }
    }
}

impl fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("name", &self.name)
            .field("inbound", &self.contract.inbound.len())
            .field("outbound", &self.contract.outbound.len())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`ActionDefinition`].
///
/// Declaration errors accumulate and surface from [`build`](Self::build),
/// the Rust rendering of definition-time errors.
pub struct ActionBuilder {
    name: String,
    contract: Contract,
    hooks: Hooks,
    messages: Messages,
    events: Events,
    body: Option<HookFn>,
    logger: Arc<dyn ActionLogger>,
    clock: Arc<dyn Clock>,
    errors: Vec<ContractViolation>,
}

impl ActionBuilder {
    /// Start a fresh definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contract: Contract::default(),
            hooks: Hooks::default(),
            messages: Messages::default(),
            events: Events::default(),
            body: None,
            logger: Arc::new(TracingLogger),
            clock: Arc::new(SystemClock::new()),
            errors: Vec::new(),
        }
    }

    /// Start from a structural copy of `parent`: contract, hooks,
    /// message rules, event rules, body, and collaborators.
    pub fn extending(name: impl Into<String>, parent: &ActionDefinition) -> Self {
        Self {
            name: name.into(),
            contract: (*parent.contract).clone(),
            hooks: parent.hooks.clone(),
            messages: parent.messages.clone(),
            events: parent.events.clone(),
            body: parent.body.clone(),
            logger: Arc::clone(&parent.logger),
            clock: Arc::clone(&parent.clock),
            errors: Vec::new(),
        }
    }

    /// Declare an expected input field.
    #[must_use]
    pub fn expects(mut self, field: Field) -> Self {
        if let Err(error) = self.contract.declare(Direction::Inbound, field) {
            self.errors.push(error);
        }
        self
    }

    /// Declare an input field nested inside an already-declared field.
    #[must_use]
    pub fn expects_on(mut self, parent: &str, field: Field) -> Self {
        if let Err(error) = self.contract.declare_subfield(parent, field) {
            self.errors.push(error);
        }
        self
    }

    /// Declare an exposed output field.
    #[must_use]
    pub fn exposes(mut self, field: Field) -> Self {
        if let Err(error) = self.contract.declare(Direction::Outbound, field) {
            self.errors.push(error);
        }
        self
    }

    /// Register a before hook. Runs in registration order, parent-first.
    #[must_use]
    pub fn before(mut self, hook: impl Fn(&mut ActionContext) -> Flow + Send + Sync + 'static) -> Self {
        self.hooks.before.push(Arc::new(hook));
        self
    }

    /// Register an after hook. Prepended, so hooks run in reverse
    /// registration order, child-first.
    #[must_use]
    pub fn after(mut self, hook: impl Fn(&mut ActionContext) -> Flow + Send + Sync + 'static) -> Self {
        self.hooks.after.insert(0, Arc::new(hook));
        self
    }

    /// Register an around hook. Earlier registrations (and parents) wrap
    /// outside later ones; the hook must invoke its continuation to
    /// proceed.
    #[must_use]
    pub fn around(
        mut self,
        hook: impl Fn(&mut ActionContext, &mut dyn FnMut(&mut ActionContext) -> Flow) -> Flow
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.hooks.around.push(Arc::new(hook));
        self
    }

    /// Set the user-logic body. Replaces any inherited body.
    #[must_use]
    pub fn body(mut self, body: impl Fn(&mut ActionContext) -> Flow + Send + Sync + 'static) -> Self {
        self.body = Some(Arc::new(body));
        self
    }

    /// Register a static success message.
    #[must_use]
    pub fn success(self, message: impl Into<MessageBody>) -> Self {
        self.success_rule(MessageRule::new(message))
    }

    /// Register a conditional success message.
    #[must_use]
    pub fn success_when(self, matcher: Matcher, message: impl Into<MessageBody>) -> Self {
        self.success_rule(MessageRule::new(message).when(matcher))
    }

    /// Register a fully-specified success rule.
    #[must_use]
    pub fn success_rule(mut self, rule: MessageRule) -> Self {
        if let Err(error) = rule.validate() {
            self.errors.push(error);
        }
        self.messages.success.push(rule);
        self
    }

    /// Register a static error message.
    #[must_use]
    pub fn error(self, message: impl Into<MessageBody>) -> Self {
        self.error_rule(MessageRule::new(message))
    }

    /// Register a conditional error message.
    #[must_use]
    pub fn error_when(self, matcher: Matcher, message: impl Into<MessageBody>) -> Self {
        self.error_rule(MessageRule::new(message).when(matcher))
    }

    /// Register an error message that fires unless the matcher holds.
    #[must_use]
    pub fn error_unless(self, matcher: Matcher, message: impl Into<MessageBody>) -> Self {
        self.error_rule(MessageRule::new(message).unless(matcher))
    }

    /// Register an error message scoped to failures delegated from the
    /// named nested action.
    #[must_use]
    pub fn error_from(self, action: impl Into<String>, message: impl Into<MessageBody>) -> Self {
        self.error_rule(MessageRule::new(message).from_action(action))
    }

    /// Register a fully-specified error rule.
    #[must_use]
    pub fn error_rule(mut self, rule: MessageRule) -> Self {
        if let Err(error) = rule.validate() {
            self.errors.push(error);
        }
        self.messages.error.push(rule);
        self
    }

    /// Register an `on_success` handler.
    #[must_use]
    pub fn on_success(mut self, rule: EventRule) -> Self {
        if let Err(error) = rule.validate() {
            self.errors.push(error);
        }
        self.events.on_success.push(rule);
        self
    }

    /// Register an `on_failure` handler (explicit failures only).
    #[must_use]
    pub fn on_failure(mut self, rule: EventRule) -> Self {
        if let Err(error) = rule.validate() {
            self.errors.push(error);
        }
        self.events.on_failure.push(rule);
        self
    }

    /// Register an `on_error` handler (failures and exceptions).
    #[must_use]
    pub fn on_error(mut self, rule: EventRule) -> Self {
        if let Err(error) = rule.validate() {
            self.errors.push(error);
        }
        self.events.on_error.push(rule);
        self
    }

    /// Register an `on_exception` handler (unhandled errors only).
    #[must_use]
    pub fn on_exception(mut self, rule: EventRule) -> Self {
        if let Err(error) = rule.validate() {
            self.errors.push(error);
        }
        self.events.on_exception.push(rule);
        self
    }

    /// Mark matching exceptions as expected: converted to a non-ok
    /// result without alerting the exception handlers or the reporter.
    #[must_use]
    pub fn rescues(mut self, matcher: Matcher) -> Self {
        self.events.interceptors.push(Interceptor::rescues(matcher));
        self
    }

    /// Keep reporting matching exceptions, overriding later rescues.
    #[must_use]
    pub fn reports(mut self, matcher: Matcher) -> Self {
        self.events.interceptors.push(Interceptor::reports(matcher));
        self
    }

    /// Replace the logging collaborator.
    #[must_use]
    pub fn logger(mut self, logger: Arc<dyn ActionLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Replace the monotonic clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Freeze the definition, surfacing the first declaration error.
    pub fn build(mut self) -> Result<ActionDefinition, ContractViolation> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }
        Ok(ActionDefinition {
            name: self.name,
            contract: Arc::new(self.contract),
            hooks: self.hooks,
            messages: self.messages,
            events: self.events,
            body: self.body,
            logger: self.logger,
            clock: self.clock,
        })
    }
}

impl fmt::Debug for ActionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionBuilder")
            .field("name", &self.name)
            .field("pending_errors", &self.errors.len())
            .finish_non_exhaustive()
    }
}
