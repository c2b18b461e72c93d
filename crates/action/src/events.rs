//! Lifecycle event handlers, interceptors, and the global reporter.
//!
//! Four independently-dispatched families: `on_success` (success only),
//! `on_failure` (explicit failures only), `on_exception` (other unhandled
//! errors, unless a silent-rescue interceptor matched), and `on_error`
//! (failure or exception, unaffected by interceptors). Within a family
//! **all** matching handlers fire, child-before-parent; dispatch is
//! best-effort: a broken matcher or handler is logged and skipped, never
//! fatal, and never flips the outcome.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{BoxError, ContractViolation};
use crate::messages::{EventContext, Matcher};
use crate::provider::ExceptionReporter;

/// Handler signature for lifecycle callbacks.
pub type EventFn = Arc<dyn Fn(&EventContext<'_>) -> Result<(), BoxError> + Send + Sync>;

/// One registered lifecycle callback, optionally conditioned.
#[derive(Clone)]
pub struct EventRule {
    when: Option<Matcher>,
    unless: Option<Matcher>,
    handler: EventFn,
}

impl EventRule {
    /// An unconditional callback.
    pub fn new(handler: impl Fn(&EventContext<'_>) + Send + Sync + 'static) -> Self {
        Self {
            when: None,
            unless: None,
            handler: Arc::new(move |cx| {
                handler(cx);
                Ok(())
            }),
        }
    }

    /// A fallible callback; an `Err` is logged and does not affect the
    /// outcome or other handlers.
    pub fn try_new(
        handler: impl Fn(&EventContext<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            when: None,
            unless: None,
            handler: Arc::new(handler),
        }
    }

    /// Fire only when the matcher holds.
    #[must_use]
    pub fn when(mut self, matcher: Matcher) -> Self {
        self.when = Some(matcher);
        self
    }

    /// Fire only when the matcher does **not** hold. Declaring both
    /// `when` and `unless` on one rule is a declaration-time error.
    #[must_use]
    pub fn unless(mut self, matcher: Matcher) -> Self {
        self.unless = Some(matcher);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ContractViolation> {
        if self.when.is_some() && self.unless.is_some() {
            return Err(ContractViolation::Declaration(
                "an event rule cannot declare both `when` and `unless`".into(),
            ));
        }
        Ok(())
    }

    fn matches(&self, cx: &EventContext<'_>) -> Result<bool, BoxError> {
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
}

impl fmt::Debug for EventRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRule")
            .field("when", &self.when)
            .field("unless", &self.unless)
            .finish_non_exhaustive()
    }
}

/// A rule deciding whether a matched exception should be reported or
/// silently converted.
///
/// Silent (`rescues`) and reporting (`reports`) interceptors share one
/// ordered list; the first whose matcher matches decides, via its
/// `should_report` flag, whether the `on_exception` family and the global
/// reporter are suppressed. `on_error` handlers are unaffected.
#[derive(Debug, Clone)]
pub struct Interceptor {
    pub(crate) matcher: Matcher,
    pub(crate) should_report: bool,
}

impl Interceptor {
    /// Mark matching exceptions as expected: convert without alerting.
    #[must_use]
    pub fn rescues(matcher: Matcher) -> Self {
        Self {
            matcher,
            should_report: false,
        }
    }

    /// Keep reporting matching exceptions (useful to punch through an
    /// earlier, broader rescue).
    #[must_use]
    pub fn reports(matcher: Matcher) -> Self {
        Self {
            matcher,
            should_report: true,
        }
    }
}

/// The handler registries of one definition.
#[derive(Debug, Clone, Default)]
pub(crate) struct Events {
    pub(crate) on_success: Vec<EventRule>,
    pub(crate) on_failure: Vec<EventRule>,
    pub(crate) on_error: Vec<EventRule>,
    pub(crate) on_exception: Vec<EventRule>,
    pub(crate) interceptors: Vec<Interceptor>,
}

impl Events {
    /// Whether the first matching interceptor (if any) suppresses
    /// exception reporting.
    pub(crate) fn suppresses_reporting(
        &self,
        cx: &EventContext<'_>,
        warn: &mut dyn FnMut(String),
    ) -> bool {
        for interceptor in &self.interceptors {
            match interceptor.matcher.evaluate(cx) {
                Ok(true) => return !interceptor.should_report,
                Ok(false) => {}
                Err(error) => warn(format!("interceptor matcher failed, skipping: {error}")),
            }
        }
        false
    }
}

/// Fire every matching rule in a family, child-before-parent.
///
/// Extension copies parent rules first, so newest-registered-first
/// iteration yields child handlers before parent handlers.
pub(crate) fn dispatch(
    family: &str,
    rules: &[EventRule],
    cx: &EventContext<'_>,
    warn: &mut dyn FnMut(String),
) {
    for rule in rules.iter().rev() {
        match rule.matches(cx) {
            Ok(true) => {
                if let Err(error) = (rule.handler)(cx) {
                    warn(format!("{family} handler failed: {error}"));
                }
            }
            Ok(false) => {}
            Err(error) => warn(format!("{family} matcher failed, skipping handler: {error}")),
        }
    }
}

static REPORTER: OnceLock<Arc<dyn ExceptionReporter>> = OnceLock::new();

/// Install the process-wide exception reporter. Returns false if one was
/// already installed (the first installation wins).
pub fn set_exception_reporter(reporter: Arc<dyn ExceptionReporter>) -> bool {
    REPORTER.set(reporter).is_ok()
}

pub(crate) fn global_reporter() -> Option<&'static Arc<dyn ExceptionReporter>> {
    REPORTER.get()
}
