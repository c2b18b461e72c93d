//! Lifecycle hooks and their execution order.
//!
//! One invocation moves through: around-enter → before → user logic →
//! after → around-exit. Ordering across an extension chain:
//!
//! - `around` — parent hooks wrap child hooks (parent outer, child
//!   inner); entry 0 runs outermost. Each hook receives a continuation it
//!   must invoke to proceed.
//! - `before` — registration order, parent-first: general setup before
//!   specific.
//! - `after` — reverse registration, child-first: specific cleanup before
//!   general teardown. Implemented by prepending each newly-registered
//!   hook.
//!
//! Any `Err` short-circuits the remaining hooks of the current nesting
//! level; the signal is recorded on the store before re-propagating so
//! outer around hooks can observe it.

use std::sync::Arc;

use crate::context::ActionContext;
use crate::error::Flow;

/// A before/after hook or the user-logic body.
pub type HookFn = Arc<dyn Fn(&mut ActionContext) -> Flow + Send + Sync>;

/// An around hook: receives the context and the continuation for the rest
/// of the pipeline.
pub type AroundFn = Arc<
    dyn Fn(&mut ActionContext, &mut dyn FnMut(&mut ActionContext) -> Flow) -> Flow + Send + Sync,
>;

/// The hook lists of one action definition. Structurally copied when a
/// definition extends another.
#[derive(Clone, Default)]
pub(crate) struct Hooks {
    /// Run in order; extension appends, so parent entries run first.
    pub(crate) before: Vec<HookFn>,
    /// Run in order; registration prepends, so child entries run first.
    pub(crate) after: Vec<HookFn>,
    /// Entry 0 wraps outermost; extension appends, so parents wrap
    /// children.
    pub(crate) around: Vec<AroundFn>,
}

impl Hooks {
    /// Run every before hook in order, stopping at the first signal.
    pub(crate) fn run_before(&self, cx: &mut ActionContext) -> Flow {
        for hook in &self.before {
            hook(cx)?;
        }
        Ok(())
    }

    /// Run every after hook in order, stopping at the first signal.
    pub(crate) fn run_after(&self, cx: &mut ActionContext) -> Flow {
        for hook in &self.after {
            hook(cx)?;
        }
        Ok(())
    }

    /// Run the around chain, innermost callback last.
    pub(crate) fn run_around(
        &self,
        cx: &mut ActionContext,
        innermost: &mut dyn FnMut(&mut ActionContext) -> Flow,
    ) -> Flow {
        self.run_around_from(0, cx, innermost)
    }

    fn run_around_from(
        &self,
        index: usize,
        cx: &mut ActionContext,
        innermost: &mut dyn FnMut(&mut ActionContext) -> Flow,
    ) -> Flow {
        match self.around.get(index) {
            None => innermost(cx),
            Some(hook) => {
                let flow = hook(cx, &mut |cx| {
                    self.run_around_from(index + 1, cx, &mut *innermost)
                });
                // An around hook's own signal is recorded here; inner
                // signals were recorded before they propagated up.
                cx.observe(flow)
            }
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .field("around", &self.around.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Contract;
    use crate::error::Interrupt;
    use parking_lot::Mutex;
    use serde_json::Map;

    fn test_context() -> ActionContext {
        ActionContext::new("hooked".into(), Arc::new(Contract::default()), Map::new(), 0)
    }

    fn tracer(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> HookFn {
        let log = Arc::clone(log);
        Arc::new(move |_cx| {
            log.lock().push(tag);
            Ok(())
        })
    }

    #[test]
    fn before_hooks_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::default();
        hooks.before.push(tracer(&log, "a"));
        hooks.before.push(tracer(&log, "b"));

        hooks.run_before(&mut test_context()).unwrap();
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[test]
    fn failing_before_hook_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::default();
        hooks.before.push(Arc::new(|_| Err(Interrupt::failure("stop"))));
        hooks.before.push(tracer(&log, "never"));

        let flow = hooks.run_before(&mut test_context());
        assert!(flow.is_err());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn around_hooks_wrap_outside_in() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::default();
        for tag in ["outer", "inner"] {
            let log = Arc::clone(&log);
            hooks.around.push(Arc::new(move |cx, next| {
                log.lock().push(format!("{tag}-enter"));
                let flow = next(cx);
                log.lock().push(format!("{tag}-exit"));
                flow
            }));
        }

        let body_log = Arc::clone(&log);
        hooks
            .run_around(&mut test_context(), &mut |_cx| {
                body_log.lock().push("body".into());
                Ok(())
            })
            .unwrap();

        assert_eq!(
            *log.lock(),
            vec!["outer-enter", "inner-enter", "body", "inner-exit", "outer-exit"]
        );
    }

    #[test]
    fn early_completion_is_recorded_and_observable_by_outer_hooks() {
        let observed = Arc::new(Mutex::new(false));
        let mut hooks = Hooks::default();
        let seen = Arc::clone(&observed);
        hooks.around.push(Arc::new(move |cx, next| {
            let flow = next(cx);
            if cx.interrupt().is_some_and(Interrupt::is_early_completion) {
                *seen.lock() = true;
            }
            flow
        }));

        let mut cx = test_context();
        let flow = hooks.run_around(&mut cx, &mut |cx| cx.observe(Err(Interrupt::done("early"))));

        assert!(flow.is_err());
        assert!(*observed.lock());
        assert!(cx.interrupt().unwrap().is_early_completion());
    }

    #[test]
    fn around_hook_failure_is_recorded() {
        let mut hooks = Hooks::default();
        hooks
            .around
            .push(Arc::new(|_cx, _next| Err(Interrupt::failure("refused"))));

        let mut cx = test_context();
        let flow = hooks.run_around(&mut cx, &mut |_cx| Ok(()));
        assert!(flow.is_err());
        assert_eq!(cx.interrupt().unwrap().message(), Some("refused"));
    }
}
