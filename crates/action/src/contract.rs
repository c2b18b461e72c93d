//! The field contract: declared inputs, outputs, and nested subfields.
//!
//! Declarations happen through the [`Field`] builder and are frozen into
//! immutable [`FieldSpec`] records when the action definition is built.
//! Extending definitions take a structural copy of the parent's contract,
//! so later changes to a parent never leak into already-built children.
//!
//! The key safety default: a field is **required unless explicitly
//! relaxed**. Absent an explicit presence rule, one is prepended, unless
//! the declared kind is boolean (where absence would shadow `false`) or
//! the field is marked optional.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use operon_validator::{Rule, ValueKind};

use crate::context::ActionContext;
use crate::error::{ContractViolation, Flow};
use crate::provider::ModelLookup;

/// Which half of the contract a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Declared input, read by user logic.
    Inbound,
    /// Declared output, exposed to callers on the result.
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        })
    }
}

/// Names the result surface reserves for its control interface.
///
/// Declaring a field with one of these would shadow a control method, so
/// the contract rejects them with a distinguishable error.
pub const RESERVED_NAMES: &[&str] = &[
    "ok",
    "error",
    "success",
    "message",
    "outcome",
    "exception",
    "elapsed_time",
    "fail",
    "done",
    "expose",
    "inspect",
];

/// Closure computing a field default, evaluated against the in-flight
/// context. May signal explicit failure or early completion.
pub type DefaultFn = Arc<dyn Fn(&ActionContext) -> Flow<Value> + Send + Sync>;

/// Closure rewriting a field's raw value before validation.
pub type PreprocessFn = Arc<dyn Fn(Value) -> Flow<Value> + Send + Sync>;

/// A field default: either a literal or a computed closure.
#[derive(Clone)]
pub enum DefaultValue {
    /// A literal JSON value, cloned on assignment.
    Literal(Value),
    /// A closure evaluated when the default is needed.
    Computed(DefaultFn),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Binding of a field to a model lookup collaborator.
#[derive(Clone)]
pub struct ModelBinding {
    /// Model name used in "not found" messages.
    pub model: String,
    /// The lookup collaborator.
    pub finder: Arc<dyn ModelLookup>,
}

impl fmt::Debug for ModelBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBinding")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Builder for one field declaration.
///
/// ```
/// use operon_action::Field;
/// use operon_validator::{Rule, ValueKind};
///
/// let field = Field::new("age")
///     .kind(ValueKind::Integer)
///     .rule(Rule::at_least(0.0))
///     .allow_nil();
/// ```
#[derive(Clone)]
pub struct Field {
    name: String,
    kind: Option<ValueKind>,
    rules: Vec<Rule>,
    default: Option<DefaultValue>,
    default_on_nil: bool,
    preprocess: Option<PreprocessFn>,
    sensitive: bool,
    allow_nil: bool,
    allow_blank: bool,
    optional: bool,
    lookup: Option<ModelBinding>,
}

impl Field {
    /// Start declaring a field with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            rules: Vec::new(),
            default: None,
            default_on_nil: false,
            preprocess: None,
            sensitive: false,
            allow_nil: false,
            allow_blank: false,
            optional: false,
            lookup: None,
        }
    }

    /// Expect the value to have the given JSON shape.
    #[must_use]
    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Attach a validation rule. Rules run in declaration order.
    #[must_use]
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Attach a named predicate rule, shorthand for
    /// `rule(Rule::predicate(name, check))`.
    #[must_use]
    pub fn validate(
        mut self,
        name: &'static str,
        check: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.rules.push(Rule::predicate(name, check));
        self
    }

    /// Assign a literal default when the field is absent.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    /// Assign a computed default when the field is absent. The closure may
    /// read other fields through the context and may signal failure or
    /// early completion.
    #[must_use]
    pub fn default_with(
        mut self,
        compute: impl Fn(&ActionContext) -> Flow<Value> + Send + Sync + 'static,
    ) -> Self {
        self.default = Some(DefaultValue::Computed(Arc::new(compute)));
        self
    }

    /// Also assign the default when the field was explicitly provided as
    /// null, not only when absent.
    #[must_use]
    pub fn default_on_nil(mut self) -> Self {
        self.default_on_nil = true;
        self
    }

    /// Rewrite the raw value before validation.
    #[must_use]
    pub fn preprocess(
        mut self,
        rewrite: impl Fn(Value) -> Flow<Value> + Send + Sync + 'static,
    ) -> Self {
        self.preprocess = Some(Arc::new(rewrite));
        self
    }

    /// Redact this field's value from snapshots, logs, and Debug output.
    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Accept an explicit null value.
    #[must_use]
    pub fn allow_nil(mut self) -> Self {
        self.allow_nil = true;
        self
    }

    /// Accept blank values (null, empty/whitespace strings, empty
    /// collections).
    #[must_use]
    pub fn allow_blank(mut self) -> Self {
        self.allow_blank = true;
        self
    }

    /// Do not require the field at all; no presence rule is added.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Resolve the provided value through a model lookup, replacing the id
    /// with the found record before further validation.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>, finder: Arc<dyn ModelLookup>) -> Self {
        self.lookup = Some(ModelBinding {
            model: model.into(),
            finder,
        });
        self
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn has_preprocess(&self) -> bool {
        self.preprocess.is_some()
    }

    pub(crate) fn has_lookup(&self) -> bool {
        self.lookup.is_some()
    }

    /// Freeze into a [`FieldSpec`], normalizing the rule list.
    pub(crate) fn freeze(self, direction: Direction, parent: Option<&FieldSpec>) -> FieldSpec {
        let mut rules = Vec::with_capacity(self.rules.len() + 2);
        if let Some(kind) = self.kind {
            rules.push(Rule::kind(kind));
        }
        rules.extend(self.rules);

        let boolean_like = self.kind == Some(ValueKind::Boolean);
        let has_presence = rules.iter().any(Rule::is_presence);
        if !has_presence && !boolean_like && !self.optional {
            rules.insert(0, Rule::presence());
        }

        let path = match parent {
            Some(parent) => format!("{}.{}", parent.path, self.name),
            None => self.name.clone(),
        };

        FieldSpec {
            name: self.name,
            path,
            direction,
            rules,
            default: self.default,
            default_on_nil: self.default_on_nil,
            preprocess: self.preprocess,
            sensitive: self.sensitive,
            parent: parent.map(|p| p.path.clone()),
            allow_nil: self.allow_nil,
            allow_blank: self.allow_blank,
            optional: self.optional,
            lookup: self.lookup,
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Frozen per-field configuration, immutable after the definition builds.
#[derive(Clone)]
pub struct FieldSpec {
    name: String,
    path: String,
    direction: Direction,
    pub(crate) rules: Vec<Rule>,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) default_on_nil: bool,
    pub(crate) preprocess: Option<PreprocessFn>,
    sensitive: bool,
    parent: Option<String>,
    pub(crate) allow_nil: bool,
    pub(crate) allow_blank: bool,
    pub(crate) optional: bool,
    pub(crate) lookup: Option<ModelBinding>,
}

impl FieldSpec {
    /// The simple field name ("city").
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The full dotted path ("address.city"); equals the name for
    /// top-level fields.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Which direction this field belongs to.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether the value is redacted from snapshots and logs.
    #[must_use]
    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    /// The parent path, for subfields.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Whether the field must be present.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.rules.iter().any(Rule::is_presence)
    }

    /// Whether the field was declared optional.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("path", &self.path)
            .field("direction", &self.direction)
            .field("required", &self.is_required())
            .field("sensitive", &self.sensitive)
            .finish_non_exhaustive()
    }
}

/// Serializable description of one declared field, for contract
/// introspection.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FieldSummary {
    /// Dotted path of the field.
    pub name: String,
    /// `"inbound"` or `"outbound"`.
    pub direction: String,
    /// Whether a presence rule applies.
    pub required: bool,
    /// Whether the value is redacted from snapshots and logs.
    pub sensitive: bool,
}

impl From<&FieldSpec> for FieldSummary {
    fn from(spec: &FieldSpec) -> Self {
        Self {
            name: spec.path.clone(),
            direction: spec.direction.to_string(),
            required: spec.is_required(),
            sensitive: spec.sensitive,
        }
    }
}

/// The whole declared contract of one action definition.
#[derive(Debug, Clone, Default)]
pub(crate) struct Contract {
    pub(crate) inbound: Vec<FieldSpec>,
    pub(crate) outbound: Vec<FieldSpec>,
    pub(crate) subfields: Vec<FieldSpec>,
}

impl Contract {
    /// Declare a top-level field in the given direction.
    pub(crate) fn declare(
        &mut self,
        direction: Direction,
        field: Field,
    ) -> Result<(), ContractViolation> {
        let name = field.name().to_owned();
        Self::check_name(&name)?;
        let list = match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        };
        if list.iter().any(|spec| spec.name == name) {
            return Err(ContractViolation::DuplicateField {
                field: name,
                direction,
            });
        }
        if direction == Direction::Outbound {
            if field.has_preprocess() {
                return Err(ContractViolation::Declaration(format!(
                    "outbound field `{name}` cannot declare a preprocess step"
                )));
            }
            if field.has_lookup() {
                return Err(ContractViolation::Declaration(format!(
                    "outbound field `{name}` cannot declare a model lookup"
                )));
            }
        }
        let spec = field.freeze(direction, None);
        match direction {
            Direction::Inbound => self.inbound.push(spec),
            Direction::Outbound => self.outbound.push(spec),
        }
        Ok(())
    }

    /// Declare a field nested inside an already-declared inbound field.
    ///
    /// `parent` must name a declared inbound field or subfield and must not
    /// itself be a dotted path.
    pub(crate) fn declare_subfield(
        &mut self,
        parent: &str,
        field: Field,
    ) -> Result<(), ContractViolation> {
        let name = field.name().to_owned();
        Self::check_name(&name)?;
        if parent.contains('.') {
            return Err(ContractViolation::Declaration(format!(
                "subfield parent `{parent}` cannot be a nested path"
            )));
        }
        let parent_spec = self
            .inbound
            .iter()
            .chain(self.subfields.iter())
            .find(|spec| spec.name == parent)
            .cloned()
            .ok_or_else(|| {
                ContractViolation::Declaration(format!(
                    "subfield `{name}` declared on unknown parent `{parent}`"
                ))
            })?;

        let spec = field.freeze(Direction::Inbound, Some(&parent_spec));
        if self
            .subfields
            .iter()
            .any(|existing| existing.path == spec.path)
        {
            return Err(ContractViolation::DuplicateField {
                field: spec.path,
                direction: Direction::Inbound,
            });
        }
        self.subfields.push(spec);
        Ok(())
    }

    fn check_name(name: &str) -> Result<(), ContractViolation> {
        if RESERVED_NAMES.contains(&name) {
            return Err(ContractViolation::ReservedAttribute {
                field: name.to_owned(),
            });
        }
        if name.contains('.') {
            return Err(ContractViolation::Declaration(format!(
                "field name `{name}` cannot contain `.`; declare a subfield instead"
            )));
        }
        if name.is_empty() {
            return Err(ContractViolation::Declaration(
                "field name cannot be empty".into(),
            ));
        }
        Ok(())
    }

    /// Look up an inbound field or subfield by name or dotted path.
    pub(crate) fn find_inbound(&self, name: &str) -> Option<&FieldSpec> {
        self.inbound
            .iter()
            .find(|spec| spec.name == name)
            .or_else(|| self.subfields.iter().find(|spec| spec.path == name))
    }

    /// Look up an outbound field by name.
    pub(crate) fn find_outbound(&self, name: &str) -> Option<&FieldSpec> {
        self.outbound.iter().find(|spec| spec.name == name)
    }

    /// Every sensitive dotted path, both directions.
    pub(crate) fn sensitive_paths(&self) -> impl Iterator<Item = &str> {
        self.inbound
            .iter()
            .chain(self.subfields.iter())
            .chain(self.outbound.iter())
            .filter(|spec| spec.sensitive)
            .map(|spec| spec.path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_by_default() {
        let spec = Field::new("email").freeze(Direction::Inbound, None);
        assert!(spec.is_required());
        assert!(spec.rules[0].is_presence());
    }

    #[test]
    fn explicit_presence_not_duplicated() {
        let spec = Field::new("email")
            .rule(Rule::presence())
            .freeze(Direction::Inbound, None);
        let presence_count = spec.rules.iter().filter(|r| r.is_presence()).count();
        assert_eq!(presence_count, 1);
    }

    #[test]
    fn boolean_fields_are_not_required() {
        let spec = Field::new("active")
            .kind(ValueKind::Boolean)
            .freeze(Direction::Inbound, None);
        assert!(!spec.is_required());
    }

    #[test]
    fn optional_fields_are_not_required() {
        let spec = Field::new("nickname")
            .optional()
            .freeze(Direction::Inbound, None);
        assert!(!spec.is_required());
    }

    #[test]
    fn kind_rule_is_included() {
        let spec = Field::new("age")
            .kind(ValueKind::Integer)
            .freeze(Direction::Inbound, None);
        // presence + kind
        assert_eq!(spec.rules.len(), 2);
    }

    #[test]
    fn duplicate_field_rejected() {
        let mut contract = Contract::default();
        contract
            .declare(Direction::Inbound, Field::new("email"))
            .unwrap();
        let error = contract
            .declare(Direction::Inbound, Field::new("email"))
            .unwrap_err();
        assert!(matches!(
            error,
            ContractViolation::DuplicateField {
                direction: Direction::Inbound,
                ..
            }
        ));
    }

    #[test]
    fn same_name_across_directions_is_fine() {
        let mut contract = Contract::default();
        contract
            .declare(Direction::Inbound, Field::new("amount"))
            .unwrap();
        contract
            .declare(Direction::Outbound, Field::new("amount"))
            .unwrap();
    }

    #[test]
    fn reserved_names_rejected() {
        let mut contract = Contract::default();
        let error = contract
            .declare(Direction::Inbound, Field::new("outcome"))
            .unwrap_err();
        assert!(matches!(error, ContractViolation::ReservedAttribute { .. }));
    }

    #[test]
    fn dotted_top_level_name_rejected() {
        let mut contract = Contract::default();
        let error = contract
            .declare(Direction::Inbound, Field::new("address.city"))
            .unwrap_err();
        assert!(matches!(error, ContractViolation::Declaration(_)));
    }

    #[test]
    fn subfield_requires_declared_parent() {
        let mut contract = Contract::default();
        let error = contract
            .declare_subfield("address", Field::new("city"))
            .unwrap_err();
        assert!(matches!(error, ContractViolation::Declaration(_)));
    }

    #[test]
    fn subfield_parent_cannot_be_dotted() {
        let mut contract = Contract::default();
        contract
            .declare(Direction::Inbound, Field::new("address"))
            .unwrap();
        contract
            .declare_subfield("address", Field::new("city"))
            .unwrap();
        let error = contract
            .declare_subfield("address.city", Field::new("zip"))
            .unwrap_err();
        assert!(matches!(error, ContractViolation::Declaration(_)));
    }

    #[test]
    fn subfield_paths_chain_through_parents() {
        let mut contract = Contract::default();
        contract
            .declare(Direction::Inbound, Field::new("address"))
            .unwrap();
        contract
            .declare_subfield("address", Field::new("city"))
            .unwrap();
        contract
            .declare_subfield("city", Field::new("zip"))
            .unwrap();

        assert!(contract.find_inbound("address.city").is_some());
        assert!(contract.find_inbound("address.city.zip").is_some());
    }

    #[test]
    fn outbound_preprocess_rejected() {
        let mut contract = Contract::default();
        let error = contract
            .declare(
                Direction::Outbound,
                Field::new("total").preprocess(|v| Ok(v)),
            )
            .unwrap_err();
        assert!(matches!(error, ContractViolation::Declaration(_)));
    }

    #[test]
    fn sensitive_paths_cover_subfields() {
        let mut contract = Contract::default();
        contract
            .declare(Direction::Inbound, Field::new("credentials"))
            .unwrap();
        contract
            .declare_subfield("credentials", Field::new("password").sensitive())
            .unwrap();

        let paths: Vec<&str> = contract.sensitive_paths().collect();
        assert_eq!(paths, vec!["credentials.password"]);
    }

    #[test]
    fn literal_default_debug() {
        let default = DefaultValue::Literal(json!(5));
        assert!(format!("{default:?}").contains('5'));
    }
}
