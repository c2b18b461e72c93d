//! The validation engine: per-direction preprocessing, default
//! assignment, model lookups, and rule application.
//!
//! Each pass walks the frozen contract. Preprocessing rewrites raw values
//! in place before anything else sees them; defaults fill only absent
//! keys (never an explicit present value, even one equal to the default);
//! rule validation aggregates **every** violation for the direction into
//! one typed error. Subfields go through the same three passes via
//! dotted-path traversal, creating intermediate objects when a default
//! lands under a missing parent.

use std::sync::Arc;

use serde_json::Value;

use operon_validator::{ValidationError, ValidationErrors, is_blank};

use crate::context::{ActionContext, read_path, write_path};
use crate::contract::{DefaultValue, Direction, FieldSpec};
use crate::error::{ContractViolation, Flow, Interrupt};
use crate::provider::ActionLogger;

static NULL: Value = Value::Null;

/// Inbound pass: preprocess, defaults, lookups, rules.
pub(crate) fn run_inbound(cx: &mut ActionContext, logger: &dyn ActionLogger) -> Flow {
    apply_preprocessing(cx)?;
    apply_defaults(cx, Direction::Inbound)?;
    validate(cx, Direction::Inbound, logger)
}

/// Outbound pass: defaults, rules. Outbound fields declare no preprocess.
pub(crate) fn run_outbound(cx: &mut ActionContext, logger: &dyn ActionLogger) -> Flow {
    apply_defaults(cx, Direction::Outbound)?;
    validate(cx, Direction::Outbound, logger)
}

/// Run each field's preprocess closure over its current raw value and
/// write the result back before validation.
///
/// An explicit failure or early-completion signal passes through
/// unwrapped; any other error wraps into
/// [`ContractViolation::Preprocessing`].
fn apply_preprocessing(cx: &mut ActionContext) -> Flow {
    let contract = Arc::clone(&cx.contract);
    for spec in contract.inbound.iter().chain(contract.subfields.iter()) {
        let Some(preprocess) = &spec.preprocess else {
            continue;
        };
        let Some(raw) = read_path(&cx.store.provided, spec.path()).cloned() else {
            continue;
        };
        match preprocess(raw) {
            Ok(value) => {
                write_path(&mut cx.store.provided, spec.path(), value);
            }
            Err(signal @ (Interrupt::Failure { .. } | Interrupt::Completed { .. })) => {
                return Err(signal);
            }
            Err(Interrupt::Violation(violation)) => {
                return Err(Interrupt::Violation(ContractViolation::Preprocessing {
                    field: spec.path().to_owned(),
                    source: Arc::new(violation),
                }));
            }
            Err(Interrupt::Unhandled(error)) => {
                return Err(Interrupt::Violation(ContractViolation::Preprocessing {
                    field: spec.path().to_owned(),
                    source: error,
                }));
            }
        }
    }
    Ok(())
}

/// Assign defaults for fields whose key is absent, and, per-field
/// opt-in, for keys explicitly set to null.
fn apply_defaults(cx: &mut ActionContext, direction: Direction) -> Flow {
    let contract = Arc::clone(&cx.contract);
    let specs: Vec<&FieldSpec> = match direction {
        Direction::Inbound => contract
            .inbound
            .iter()
            .chain(contract.subfields.iter())
            .collect(),
        Direction::Outbound => contract.outbound.iter().collect(),
    };

    for spec in specs {
        let Some(default) = &spec.default else {
            continue;
        };
        let map = match direction {
            Direction::Inbound => &cx.store.provided,
            Direction::Outbound => &cx.store.exposed,
        };
        let assign = match read_path(map, spec.path()) {
            None => true,
            Some(Value::Null) => spec.default_on_nil,
            Some(_) => false,
        };
        if !assign {
            continue;
        }

        let value = match default {
            DefaultValue::Literal(value) => value.clone(),
            DefaultValue::Computed(compute) => match compute(cx) {
                Ok(value) => value,
                Err(signal @ (Interrupt::Failure { .. } | Interrupt::Completed { .. })) => {
                    return Err(signal);
                }
                Err(Interrupt::Violation(violation)) => {
                    return Err(Interrupt::Violation(ContractViolation::DefaultAssignment {
                        field: spec.path().to_owned(),
                        source: Arc::new(violation),
                    }));
                }
                Err(Interrupt::Unhandled(error)) => {
                    return Err(Interrupt::Violation(ContractViolation::DefaultAssignment {
                        field: spec.path().to_owned(),
                        source: error,
                    }));
                }
            },
        };

        let map = match direction {
            Direction::Inbound => &mut cx.store.provided,
            Direction::Outbound => &mut cx.store.exposed,
        };
        write_path(map, spec.path(), value);
    }
    Ok(())
}

/// Apply every rule of every field in the direction, aggregating all
/// violations. Inbound passes resolve model-bound fields first.
fn validate(cx: &mut ActionContext, direction: Direction, logger: &dyn ActionLogger) -> Flow {
    let contract = Arc::clone(&cx.contract);
    let mut errors = ValidationErrors::new();

    if direction == Direction::Inbound {
        resolve_lookups(cx, &mut errors, logger);
    }

    let specs: Vec<&FieldSpec> = match direction {
        Direction::Inbound => contract
            .inbound
            .iter()
            .chain(contract.subfields.iter())
            .collect(),
        Direction::Outbound => contract.outbound.iter().collect(),
    };

    for spec in specs {
        let map = match direction {
            Direction::Inbound => &cx.store.provided,
            Direction::Outbound => &cx.store.exposed,
        };
        let value = read_path(map, spec.path()).unwrap_or(&NULL);

        for rule in &spec.rules {
            if rule.is_presence() {
                if (value.is_null() && spec.allow_nil) || (is_blank(value) && spec.allow_blank) {
                    continue;
                }
            } else {
                // Absence is the presence rule's concern; blank values
                // bypass the rest when the field allows blanks.
                if value.is_null() || (is_blank(value) && spec.allow_blank) {
                    continue;
                }
            }
            if let Err(error) = rule.check(value) {
                errors.push(error.with_field(spec.path().to_owned()));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Interrupt::Violation(match direction {
            Direction::Inbound => ContractViolation::InboundValidation(errors),
            Direction::Outbound => ContractViolation::OutboundValidation(errors),
        }))
    }
}

/// Replace model-bound ids with their records.
///
/// `Ok(None)` is a "not found" violation; a raised lookup error is logged
/// and recorded as a generic violation; the pass never crashes.
fn resolve_lookups(
    cx: &mut ActionContext,
    errors: &mut ValidationErrors,
    logger: &dyn ActionLogger,
) {
    let contract = Arc::clone(&cx.contract);
    for spec in contract.inbound.iter().chain(contract.subfields.iter()) {
        let Some(binding) = &spec.lookup else {
            continue;
        };
        let Some(id) = read_path(&cx.store.provided, spec.path()) else {
            continue;
        };
        if is_blank(id) {
            continue;
        }
        match binding.finder.find(id) {
            Ok(Some(record)) => {
                write_path(&mut cx.store.provided, spec.path(), record);
            }
            Ok(None) => errors.push(
                ValidationError::new("not_found", format!("{} not found", binding.model))
                    .with_field(spec.path().to_owned()),
            ),
            Err(error) => {
                logger.warn(
                    &format!("model lookup for `{}` failed: {error}", spec.path()),
                    &cx.snapshot(),
                );
                errors.push(
                    ValidationError::new(
                        "lookup_failed",
                        format!("{} could not be validated", binding.model),
                    )
                    .with_field(spec.path().to_owned()),
                );
            }
        }
    }
}
