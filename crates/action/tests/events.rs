//! Event handler dispatch: family selection, interceptors, and the
//! process-wide exception reporter.

use std::sync::{Arc, OnceLock};

use operon_action::prelude::*;
use operon_action::{BoxError, set_exception_reporter};
use parking_lot::Mutex;
use serde_json::json;

type Trace = Arc<Mutex<Vec<&'static str>>>;

fn recorder(log: &Trace, tag: &'static str) -> EventRule {
    let log = Arc::clone(log);
    EventRule::new(move |_cx| log.lock().push(tag))
}

/// Actions reported to the global reporter, by name. Installed once per
/// test process; tests filter by their own action names.
fn reported_actions() -> Arc<Mutex<Vec<String>>> {
    static LOG: OnceLock<Arc<Mutex<Vec<String>>>> = OnceLock::new();
    let log = Arc::clone(LOG.get_or_init(|| Arc::new(Mutex::new(Vec::new()))));

    struct Recorder(Arc<Mutex<Vec<String>>>);
    impl ExceptionReporter for Recorder {
        fn report(
            &self,
            _error: &(dyn std::error::Error + 'static),
            action: &str,
            _context: &ContextSnapshot,
        ) -> Result<(), BoxError> {
            self.0.lock().push(action.to_owned());
            Ok(())
        }
    }
    let _ = set_exception_reporter(Arc::new(Recorder(Arc::clone(&log))));
    log
}

fn was_reported(action: &str) -> bool {
    reported_actions().lock().iter().any(|name| name == action)
}

#[test]
fn explicit_failure_fires_failure_and_error_families_only() {
    let log: Trace = Arc::new(Mutex::new(Vec::new()));
    let def = ActionDefinition::builder("failing")
        .expects(Field::new("value").default_with(|_| Err(Interrupt::failure("bad"))))
        .on_success(recorder(&log, "on_success"))
        .on_failure(recorder(&log, "on_failure"))
        .on_error(recorder(&log, "on_error"))
        .on_exception(recorder(&log, "on_exception"))
        .build()
        .unwrap();

    let result = def.call(());
    assert_eq!(result.outcome(), Outcome::Failure);
    assert_eq!(result.error(), Some("bad"));
    assert_eq!(*log.lock(), vec!["on_failure", "on_error"]);
}

#[test]
fn unhandled_errors_fire_exception_and_error_families() {
    let _ = reported_actions();
    let log: Trace = Arc::new(Mutex::new(Vec::new()));
    let def = ActionDefinition::builder("events_raiser")
        .on_success(recorder(&log, "on_success"))
        .on_failure(recorder(&log, "on_failure"))
        .on_error(recorder(&log, "on_error"))
        .on_exception(recorder(&log, "on_exception"))
        .body(|_cx| Err(Interrupt::error("boom")))
        .build()
        .unwrap();

    let result = def.call(());
    assert_eq!(result.outcome(), Outcome::Exception);
    assert_eq!(*log.lock(), vec!["on_exception", "on_error"]);
    assert!(was_reported("events_raiser"));
}

#[test]
fn success_fires_its_family_with_the_resolved_message() {
    let seen = Arc::new(Mutex::new(None::<String>));
    let sink = Arc::clone(&seen);
    let def = ActionDefinition::builder("succeeding")
        .success("all done")
        .on_success(EventRule::new(move |cx| {
            *sink.lock() = cx.message().map(str::to_owned);
        }))
        .build()
        .unwrap();

    assert!(def.call(()).ok());
    assert_eq!(seen.lock().as_deref(), Some("all done"));
}

#[test]
fn silent_rescue_suppresses_exception_dispatch_but_not_on_error() {
    let _ = reported_actions();
    let log: Trace = Arc::new(Mutex::new(Vec::new()));
    let def = ActionDefinition::builder("events_rescued")
        .rescues(Matcher::error_is::<std::io::Error>())
        .on_error(recorder(&log, "on_error"))
        .on_exception(recorder(&log, "on_exception"))
        .body(|_cx| Err(Interrupt::error(std::io::Error::other("expected outage"))))
        .build()
        .unwrap();

    let result = def.call(());
    // Still a non-ok exception result, just not alerted.
    assert_eq!(result.outcome(), Outcome::Exception);
    assert!(!result.ok());
    assert_eq!(*log.lock(), vec!["on_error"]);
    assert!(!was_reported("events_rescued"));
}

#[test]
fn reporting_interceptor_wins_when_listed_first() {
    let _ = reported_actions();
    let def = ActionDefinition::builder("events_reported_anyway")
        .reports(Matcher::error_is::<std::io::Error>())
        .rescues(Matcher::when(|_| true))
        .body(|_cx| Err(Interrupt::error(std::io::Error::other("serious"))))
        .build()
        .unwrap();

    def.call(());
    assert!(was_reported("events_reported_anyway"));
}

#[test]
fn conditional_handlers_fire_only_when_matching() {
    let log: Trace = Arc::new(Mutex::new(Vec::new()));
    let def = ActionDefinition::builder("conditional_events")
        .expects(Field::new("notify").kind(ValueKind::Boolean))
        .on_success(
            recorder(&log, "notified")
                .when(Matcher::when(|cx| cx.get("notify").unwrap_or(false))),
        )
        .build()
        .unwrap();

    def.call([("notify", json!(false))]);
    assert!(log.lock().is_empty());

    def.call([("notify", json!(true))]);
    assert_eq!(*log.lock(), vec!["notified"]);
}

#[test]
fn handler_errors_never_flip_the_outcome() {
    let log: Trace = Arc::new(Mutex::new(Vec::new()));
    let def = ActionDefinition::builder("sturdy_events")
        .on_success(EventRule::try_new(|_| Err("notifier down".into())))
        .on_success(recorder(&log, "still fires"))
        .build()
        .unwrap();

    let result = def.call(());
    assert!(result.ok());
    assert_eq!(*log.lock(), vec!["still fires"]);
}

#[test]
fn child_handlers_fire_before_parent_handlers() {
    let log: Trace = Arc::new(Mutex::new(Vec::new()));
    let parent = ActionDefinition::builder("parent")
        .on_success(recorder(&log, "parent"))
        .build()
        .unwrap();
    let child = ActionBuilder::extending("child", &parent)
        .on_success(recorder(&log, "child"))
        .build()
        .unwrap();

    child.call(());
    assert_eq!(*log.lock(), vec!["child", "parent"]);
}

#[test]
fn contract_violations_dispatch_as_exceptions() {
    let log: Trace = Arc::new(Mutex::new(Vec::new()));
    let def = ActionDefinition::builder("invalid_input_events")
        .expects(Field::new("must_exist"))
        .on_failure(recorder(&log, "on_failure"))
        .on_exception(recorder(&log, "on_exception"))
        .build()
        .unwrap();

    let result = def.call(());
    assert_eq!(result.outcome(), Outcome::Exception);
    assert_eq!(*log.lock(), vec!["on_exception"]);
}
