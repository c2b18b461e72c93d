//! Dependency-injection port traits.
//!
//! These traits decouple the engine from concrete runtime services
//! (logging transport, exception reporting, model lookup, and the
//! monotonic clock) so actions can be tested and executed in different
//! environments without modification. The engine never formats or
//! transports a log line itself; it hands `(level, message, redacted
//! context)` to whatever implementation is attached.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;

use crate::context::ContextSnapshot;
use crate::error::BoxError;

/// Port trait for engine-level logging.
///
/// Every call carries a redacted [`ContextSnapshot`]: sensitive field
/// values are already filtered before the logger sees them.
pub trait ActionLogger: Send + Sync {
    /// Log a debug message.
    fn debug(&self, message: &str, context: &ContextSnapshot);
    /// Log an info message.
    fn info(&self, message: &str, context: &ContextSnapshot);
    /// Log a warning.
    fn warn(&self, message: &str, context: &ContextSnapshot);
    /// Log an error.
    fn error(&self, message: &str, context: &ContextSnapshot);
}

/// Default logger forwarding to the `tracing` macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl ActionLogger for TracingLogger {
    fn debug(&self, message: &str, context: &ContextSnapshot) {
        tracing::debug!(action = context.action(), context = %context, "{message}");
    }

    fn info(&self, message: &str, context: &ContextSnapshot) {
        tracing::info!(action = context.action(), context = %context, "{message}");
    }

    fn warn(&self, message: &str, context: &ContextSnapshot) {
        tracing::warn!(action = context.action(), context = %context, "{message}");
    }

    fn error(&self, message: &str, context: &ContextSnapshot) {
        tracing::error!(action = context.action(), context = %context, "{message}");
    }
}

/// Port trait for resolving `model`-bound fields to records.
///
/// The engine treats `Ok(None)` as a validation failure ("not found") and
/// any `Err` as a validation failure with a generic message; a lookup
/// error is logged and never crashes the validation pass.
pub trait ModelLookup: Send + Sync {
    /// Find the record identified by `id`.
    fn find(&self, id: &Value) -> Result<Option<Value>, BoxError>;
}

/// Port trait for the process-wide exception reporter.
///
/// Configured once via [`set_exception_reporter`](crate::events::set_exception_reporter);
/// fires last, after every definition-level `on_exception` handler. Its own
/// errors are swallowed and logged, never propagated.
pub trait ExceptionReporter: Send + Sync {
    /// Report an exception together with the action name and a redacted
    /// context snapshot.
    fn report(
        &self,
        error: &(dyn std::error::Error + 'static),
        action: &str,
        context: &ContextSnapshot,
    ) -> Result<(), BoxError>;
}

/// Injected monotonic time source for `elapsed_time`.
///
/// Must not be wall-clock-adjustable mid-run; readings are durations since
/// an arbitrary per-clock origin.
pub trait Clock: Send + Sync {
    /// Current monotonic reading.
    fn monotonic(&self) -> Duration;
}

/// Default clock backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock anchored at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-advanced clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    /// Create a clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        *self.now.lock() += delta;
    }

    /// Set the clock to an absolute reading.
    pub fn set(&self, reading: Duration) {
        *self.now.lock() = reading;
    }
}

impl Clock for ManualClock {
    fn monotonic(&self) -> Duration {
        *self.now.lock()
    }
}
