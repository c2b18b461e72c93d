//! Per-invocation context: the mutable store and its inbound facade.
//!
//! A [`ContextStore`] is created when an invocation begins and is owned
//! exclusively by that invocation, never shared across calls or threads.
//! User logic sees it through [`ActionContext`], a facade that only
//! resolves declared field names and redacts sensitive values from every
//! inspection path.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::contract::Contract;
use crate::definition::{ActionDefinition, IntoInputs};
use crate::error::{ContractViolation, Flow, Interrupt, NestedFailure};
use crate::result::ActionResult;

/// Replacement string for sensitive values in snapshots and Debug output.
pub const FILTERED: &str = "[FILTERED]";

static NULL: Value = Value::Null;

/// Mutable state of one invocation.
#[derive(Debug, Default)]
pub(crate) struct ContextStore {
    /// Inbound values as supplied, plus preprocessed/defaulted overrides.
    pub(crate) provided: Map<String, Value>,
    /// Outbound values set via expose.
    pub(crate) exposed: Map<String, Value>,
    /// First captured stop signal, if any.
    pub(crate) interrupt: Option<Interrupt>,
    /// Wall time of the invocation, in milliseconds.
    pub(crate) elapsed_ms: f64,
    /// Set once outbound validation completes.
    pub(crate) finalized: bool,
}

/// The inbound facade handed to hooks, user logic, and message/event
/// closures.
///
/// Reads resolve declared inbound fields (including dotted subfield
/// paths) and already-exposed outbound fields; anything else is a
/// descriptive contract violation rather than a silent miss.
pub struct ActionContext {
    pub(crate) action: String,
    pub(crate) contract: Arc<Contract>,
    pub(crate) store: ContextStore,
    pub(crate) depth: usize,
}

impl ActionContext {
    pub(crate) fn new(
        action: String,
        contract: Arc<Contract>,
        provided: Map<String, Value>,
        depth: usize,
    ) -> Self {
        Self {
            action,
            contract,
            store: ContextStore {
                provided,
                ..ContextStore::default()
            },
            depth,
        }
    }

    /// Name of the action being executed.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Nesting depth of this invocation (0 for a root call).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Read a declared field by name or dotted subfield path.
    ///
    /// Declared-but-absent fields read as JSON null. Undeclared names are
    /// a [`ContractViolation::MethodNotAllowed`].
    pub fn value(&self, name: &str) -> Result<&Value, ContractViolation> {
        if let Some(spec) = self.contract.find_inbound(name) {
            return Ok(read_path(&self.store.provided, spec.path()).unwrap_or(&NULL));
        }
        if let Some(spec) = self.contract.find_outbound(name) {
            return Ok(self.store.exposed.get(spec.name()).unwrap_or(&NULL));
        }
        Err(self.unknown_field(name))
    }

    /// Read and deserialize a declared field.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, ContractViolation> {
        let value = self.value(name)?;
        serde_json::from_value(value.clone()).map_err(|error| {
            ContractViolation::MethodNotAllowed {
                field: name.to_owned(),
                reason: format!("declared value does not deserialize: {error}"),
            }
        })
    }

    /// Whether a declared field currently holds a value.
    pub fn provided(&self, name: &str) -> Result<bool, ContractViolation> {
        if let Some(spec) = self.contract.find_inbound(name) {
            return Ok(read_path(&self.store.provided, spec.path()).is_some());
        }
        if let Some(spec) = self.contract.find_outbound(name) {
            return Ok(self.store.exposed.contains_key(spec.name()));
        }
        Err(self.unknown_field(name))
    }

    /// Expose a declared output value.
    pub fn expose(&mut self, name: &str, value: impl Serialize) -> Flow {
        let value = serde_json::to_value(value).map_err(Interrupt::error)?;
        self.expose_value(name, value).map_err(Interrupt::from)
    }

    /// Expose an already-built JSON value.
    pub fn expose_value(&mut self, name: &str, value: Value) -> Result<(), ContractViolation> {
        match self.contract.find_outbound(name) {
            Some(spec) => {
                self.store.exposed.insert(spec.name().to_owned(), value);
                Ok(())
            }
            None => Err(ContractViolation::UnknownExposure {
                field: name.to_owned(),
                action: self.action.clone(),
            }),
        }
    }

    /// Invoke another action as a sub-step, one nesting level down.
    ///
    /// The nested result is returned as-is; inspect `ok()` to branch.
    pub fn invoke(&self, definition: &ActionDefinition, inputs: impl IntoInputs) -> ActionResult {
        definition.call_at_depth(inputs.into_inputs(), self.depth + 1)
    }

    /// Invoke another action and propagate its non-success as a
    /// [`NestedFailure`] interrupt.
    ///
    /// `from`-scoped error message rules on the calling action match that
    /// failure by the nested action's name.
    pub fn invoke_strict(
        &self,
        definition: &ActionDefinition,
        inputs: impl IntoInputs,
    ) -> Flow<ActionResult> {
        let result = self.invoke(definition, inputs);
        if result.ok() {
            Ok(result)
        } else {
            Err(Interrupt::Unhandled(Arc::new(NestedFailure {
                action: definition.name().to_owned(),
                message: result.message().to_owned(),
                outcome: result.outcome(),
            })))
        }
    }

    /// A redacted copy of every field currently in the store.
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        let mut fields = self.store.provided.clone();
        for (key, value) in &self.store.exposed {
            fields.insert(key.clone(), value.clone());
        }
        for path in self.contract.sensitive_paths() {
            if read_path(&fields, path).is_some() {
                write_path(&mut fields, path, Value::String(FILTERED.to_owned()));
            }
        }
        ContextSnapshot {
            action: self.action.clone(),
            depth: self.depth,
            fields,
        }
    }

    /// Record the first stop signal observed by this invocation.
    pub(crate) fn record(&mut self, interrupt: &Interrupt) {
        if self.store.interrupt.is_none() {
            self.store.interrupt = Some(interrupt.clone());
        }
    }

    /// Pass a flow result through, recording any signal on the store so
    /// outer wrapping hooks can observe it.
    pub(crate) fn observe(&mut self, flow: Flow) -> Flow {
        if let Err(interrupt) = &flow {
            self.record(interrupt);
        }
        flow
    }

    pub(crate) fn interrupt(&self) -> Option<&Interrupt> {
        self.store.interrupt.as_ref()
    }

    pub(crate) fn mark_finalized(&mut self) {
        self.store.finalized = true;
    }

    fn unknown_field(&self, name: &str) -> ContractViolation {
        ContractViolation::MethodNotAllowed {
            field: name.to_owned(),
            reason: format!("not declared by `{}`", self.action),
        }
    }
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("action", &self.action)
            .field("depth", &self.depth)
            .field("fields", &self.snapshot().fields)
            .finish_non_exhaustive()
    }
}

/// Redacted, serializable view of a context, handed to loggers and the
/// exception reporter.
#[derive(Debug, Clone, Serialize)]
pub struct ContextSnapshot {
    action: String,
    depth: usize,
    fields: Map<String, Value>,
}

impl ContextSnapshot {
    /// Name of the action the snapshot was taken from.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Nesting depth at snapshot time.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The redacted field values.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl fmt::Display for ContextSnapshot {
    // Compact JSON of the redacted fields; Value's own Display is infallible.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.fields.clone()))
    }
}

/// Read a value at a dotted path.
pub(crate) fn read_path<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = map.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Write a value at a dotted path, creating intermediate objects.
///
/// Returns false (and writes nothing) when a non-object value blocks the
/// path.
pub(crate) fn write_path(map: &mut Map<String, Value>, path: &str, value: Value) -> bool {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else {
        return false;
    };
    let Some(target) = descend(map, &segments) else {
        return false;
    };
    target.insert(last.to_owned(), value);
    true
}

fn descend<'a>(
    map: &'a mut Map<String, Value>,
    segments: &[&str],
) -> Option<&'a mut Map<String, Value>> {
    let mut current = map;
    for segment in segments {
        current = current
            .entry((*segment).to_owned())
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()?;
    }
    Some(current)
}
