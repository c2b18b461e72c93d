//! Message resolution end-to-end: precedence, producers, delegation,
//! fallbacks.

use std::sync::Arc;

use operon_action::prelude::*;
use operon_action::{DEFAULT_ERROR_MESSAGE, DEFAULT_SUCCESS_MESSAGE};
use serde_json::json;

#[test]
fn conditional_beats_earlier_static_when_matching() {
    let def = ActionDefinition::builder("precedence")
        .expects(Field::new("code").kind(ValueKind::Integer))
        .error("X")
        .error_when(
            Matcher::when(|cx| cx.get::<i64>("code").is_ok_and(|c| c == 404)),
            "Y",
        )
        .body(|_cx| Err(Interrupt::failure_silent()))
        .build()
        .unwrap();

    assert_eq!(def.call([("code", json!(404))]).error(), Some("Y"));
    assert_eq!(def.call([("code", json!(500))]).error(), Some("X"));
}

#[test]
fn explicit_fail_message_wins_over_registered_rules() {
    let def = ActionDefinition::builder("explicit")
        .error("registered")
        .body(|_cx| Err(Interrupt::failure("explicit wins")))
        .build()
        .unwrap();

    assert_eq!(def.call(()).error(), Some("explicit wins"));
}

#[test]
fn producers_read_the_context() {
    let def = ActionDefinition::builder("producer")
        .expects(Field::new("name"))
        .success_rule(MessageRule::new(MessageBody::produce(|cx| {
            format!(
                "Welcome, {}",
                cx.get::<String>("name").unwrap_or_else(|_| "guest".into())
            )
        })))
        .build()
        .unwrap();

    assert_eq!(
        def.call([("name", json!("Ada"))]).success(),
        Some("Welcome, Ada")
    );
}

#[test]
fn error_type_matchers_pick_messages_by_exception_class() {
    let def = ActionDefinition::builder("typed")
        .error("generic problem")
        .error_when(Matcher::error_is::<std::io::Error>(), "storage problem")
        .body(|_cx| Err(Interrupt::error(std::io::Error::other("disk"))))
        .build()
        .unwrap();

    assert_eq!(def.call(()).error(), Some("storage problem"));

    let other = ActionDefinition::builder("typed2")
        .error("generic problem")
        .error_when(Matcher::error_is::<std::io::Error>(), "storage problem")
        .body(|_cx| Err(Interrupt::error("something else")))
        .build()
        .unwrap();

    assert_eq!(other.call(()).error(), Some("generic problem"));
}

#[test]
fn delegated_error_messages_compose() {
    let charge = ActionDefinition::builder("charge_card")
        .error("card declined")
        .body(|_cx| Err(Interrupt::failure_silent()))
        .build()
        .unwrap();

    let nested = Arc::new(charge);
    let inner = Arc::clone(&nested);
    let checkout = ActionDefinition::builder("checkout")
        .error("could not check out")
        .error_rule(
            MessageRule::new(MessageBody::produce(|cx| {
                format!("Payment failed: {}", cx.error_message().unwrap_or_default())
            }))
            .from_action("charge_card"),
        )
        .body(move |cx| {
            cx.invoke_strict(&inner, ())?;
            Ok(())
        })
        .build()
        .unwrap();

    let result = checkout.call(());
    assert_eq!(result.outcome(), Outcome::Exception);
    assert_eq!(result.error(), Some("Payment failed: card declined"));
}

#[test]
fn from_scope_does_not_fire_for_other_errors() {
    let def = ActionDefinition::builder("scoped")
        .error("plain message")
        .error_from("some_other_action", "delegated message")
        .body(|_cx| Err(Interrupt::error("unrelated")))
        .build()
        .unwrap();

    assert_eq!(def.call(()).error(), Some("plain message"));
}

#[test]
fn hardcoded_fallbacks_terminate_resolution() {
    let silent_failure = ActionDefinition::builder("no_rules")
        .body(|_cx| Err(Interrupt::failure_silent()))
        .build()
        .unwrap();
    assert_eq!(silent_failure.call(()).error(), Some(DEFAULT_ERROR_MESSAGE));

    let plain_success = ActionDefinition::builder("no_rules2").build().unwrap();
    assert_eq!(
        plain_success.call(()).success(),
        Some(DEFAULT_SUCCESS_MESSAGE)
    );
}

#[test]
fn broken_producer_falls_through_to_next_candidate() {
    let def = ActionDefinition::builder("brittle")
        .error("stable fallback")
        .error_rule(
            MessageRule::new(MessageBody::try_produce(|_| Err("template engine down".into())))
                .when(Matcher::when(|_| true)),
        )
        .body(|_cx| Err(Interrupt::failure_silent()))
        .build()
        .unwrap();

    assert_eq!(def.call(()).error(), Some("stable fallback"));
}

#[test]
fn broken_matcher_never_crashes_resolution() {
    let def = ActionDefinition::builder("sturdy")
        .error("still resolved")
        .error_rule(
            MessageRule::new("never chosen").when(Matcher::try_when(|_| Err("probe failed".into()))),
        )
        .body(|_cx| Err(Interrupt::failure_silent()))
        .build()
        .unwrap();

    assert_eq!(def.call(()).error(), Some("still resolved"));
}

#[test]
fn success_messages_resolve_conditionally_too() {
    let def = ActionDefinition::builder("bulk")
        .expects(Field::new("count").kind(ValueKind::Integer))
        .success("Processed.")
        .success_when(
            Matcher::when(|cx| cx.get::<i64>("count").is_ok_and(|c| c == 0)),
            "Nothing to process.",
        )
        .build()
        .unwrap();

    assert_eq!(
        def.call([("count", json!(0))]).success(),
        Some("Nothing to process.")
    );
    assert_eq!(
        def.call([("count", json!(3))]).success(),
        Some("Processed.")
    );
}
