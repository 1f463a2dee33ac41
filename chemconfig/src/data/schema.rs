use std::collections::BTreeSet;

use indexmap::IndexMap;
use jsonschema::JSONSchema;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::{
    data::{
        document::ConfigDocument,
        property::{TypeTag, check_value},
        registry::{PluggableImplementation, PluggableKind, PluggableRegistry},
    },
    error::ConfigError,
};

const BUILTIN_SCHEMA: &str = include_str!("../../resources/input_schema.json");

/// Property selecting the implementation of a pluggable section.
pub const NAME: &str = "name";
/// Section whose `name` constrains algorithms and operators.
pub const PROBLEM: &str = "problem";
/// Root keyword listing substitution properties.
pub const SUBSTITUTIONS: &str = "x-substitutions";

/// Errors raised when data does not conform to the schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Value of the wrong JSON type or outside an `enum`.
    #[error("type mismatch at {path}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// `section.property` path.
        path: String,
        /// Accepted types or values.
        expected: String,
        /// Offending value.
        actual: String,
    },

    /// Property not declared and additional properties not allowed.
    #[error("property {path} is not allowed by the schema")]
    UnknownProperty {
        /// `section.property` path.
        path: String,
    },

    /// Section not declared by the schema.
    #[error("section {0:?} is not declared by the schema")]
    UnknownSection(String),

    /// Property access on a text section.
    #[error("section {0:?} holds text, not properties")]
    NotStructured(String),

    /// Text access on a structured section.
    #[error("section {0:?} holds properties, not text")]
    NotText(String),

    /// Unregistered implementation name for a pluggable section.
    #[error("no {kind} implementation named {name:?}")]
    UnknownImplementation {
        /// Pluggable kind.
        kind: PluggableKind,
        /// Requested name.
        name: String,
    },

    /// Whole-document validation failures.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The schema itself is unusable.
    #[error("invalid schema: {0}")]
    Invalid(String),
}

/// Read-only view of the input schema combined with the pluggable registry.
///
/// Every query that depends on a pluggable implementation takes the current
/// `name` value explicitly; the catalog never caches per-document state.
#[derive(Debug)]
pub struct SchemaCatalog {
    schema: Value,
    registry: PluggableRegistry,
    substitutions: IndexMap<String, Option<String>>,
}

impl SchemaCatalog {
    /// Create a catalog from a schema document and a registry.
    pub fn new(schema: Value, registry: PluggableRegistry) -> Result<Self, SchemaError> {
        if !schema.get("properties").is_some_and(Value::is_object) {
            return Err(SchemaError::Invalid(
                "root schema must declare an object of section properties".into(),
            ));
        }

        let substitutions = match schema.get(SUBSTITUTIONS) {
            None | Some(Value::Null) => IndexMap::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.as_str().map(str::to_string)))
                .collect(),
            Some(Value::Array(keys)) => keys
                .iter()
                .filter_map(Value::as_str)
                .map(|k| (k.to_string(), None))
                .collect(),
            Some(other) => {
                return Err(SchemaError::Invalid(format!(
                    "{SUBSTITUTIONS} must be an object or array, got {other}"
                )));
            }
        };

        Ok(Self {
            schema,
            registry,
            substitutions,
        })
    }

    /// Catalog built from the bundled schema and implementations.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::builtin_with(PluggableRegistry::builtin()?)
    }

    /// Catalog built from the bundled schema and a custom registry.
    pub fn builtin_with(registry: PluggableRegistry) -> Result<Self, ConfigError> {
        Self::from_json_str(BUILTIN_SCHEMA, "input_schema.json", registry)
    }

    /// Parse `content` as the schema document.
    pub fn from_json_str(
        content: &str,
        source_name: &str,
        registry: PluggableRegistry,
    ) -> Result<Self, ConfigError> {
        let schema: Value = serde_json::from_str(content)
            .map_err(|e| ConfigError::parse(source_name, e.line(), e.to_string()))?;
        Ok(Self::new(schema, registry)?)
    }

    /// The raw schema document.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Registered pluggable implementations.
    pub fn registry(&self) -> &PluggableRegistry {
        &self.registry
    }

    fn sections(&self) -> Option<&Map<String, Value>> {
        self.schema.get("properties").and_then(Value::as_object)
    }

    fn section_schema(&self, section: &str) -> Option<&Value> {
        self.sections().and_then(|s| s.get(section))
    }

    /// Section names in schema declaration order.
    pub fn declared_section_names(&self) -> Vec<String> {
        self.sections()
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether the schema declares `section`.
    pub fn is_declared(&self, section: &str) -> bool {
        self.section_schema(section).is_some()
    }

    /// Whether sections not named by the schema are accepted.
    pub fn allows_additional_sections(&self) -> bool {
        allows_additional(&self.schema)
    }

    /// Whether `section` selects its contents through a `name` property.
    pub fn is_pluggable(section: &str) -> bool {
        PluggableKind::from_section(section).is_some()
    }

    /// Declared types of the section itself.
    pub fn section_types(&self, section: &str) -> BTreeSet<TypeTag> {
        self.section_schema(section)
            .map(TypeTag::set_from_schema)
            .unwrap_or_default()
    }

    /// Whether the section holds a data value rather than properties.
    ///
    /// Decided by the schema: a declared section whose types exclude `object`.
    pub fn section_is_text(&self, section: &str) -> bool {
        let types = self.section_types(section);
        !types.is_empty() && !types.contains(&TypeTag::Object)
    }

    /// The section-level `default` declared by the schema, if not `null`.
    pub fn section_default(&self, section: &str) -> Option<&Value> {
        self.section_schema(section)
            .and_then(|s| s.get("default"))
            .filter(|v| !v.is_null())
    }

    /// Default implementation name of a pluggable (or problem) section.
    pub fn default_name(&self, section: &str) -> Option<String> {
        let node = self.section_schema(section)?;
        node.get("properties")
            .and_then(|p| p.get(NAME))
            .and_then(|n| n.get("default"))
            .or_else(|| node.get("default").and_then(|d| d.get(NAME)))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn implementation(
        &self,
        section: &str,
        name: Option<&str>,
    ) -> Option<&dyn PluggableImplementation> {
        let kind = PluggableKind::from_section(section)?;
        match name {
            Some(name) => self.registry.get(kind, name),
            None => self.registry.get(kind, &self.default_name(section)?),
        }
    }

    /// Default contents of `section` when its `name` is `name`.
    ///
    /// Structured sections yield an object with one entry per declared property
    /// (`null` when the property has no default). For a pluggable section the
    /// object starts with `name` followed by the implementation's defaults; a
    /// `None` name falls back to the schema's default name. Data sections yield
    /// their `default` value and unknown sections yield `null`.
    pub fn default_properties(&self, section: &str, name: Option<&str>) -> Value {
        let Some(node) = self.section_schema(section) else {
            return Value::Null;
        };

        let Some(props) = node.get("properties").and_then(Value::as_object) else {
            return node.get("default").cloned().unwrap_or(Value::Null);
        };

        let mut defaults: Map<String, Value> = props
            .iter()
            .map(|(k, v)| (k.clone(), v.get("default").cloned().unwrap_or(Value::Null)))
            .collect();

        if Self::is_pluggable(section) {
            let resolved = name.map(str::to_string).or_else(|| self.default_name(section));
            if let Some(resolved) = &resolved {
                defaults.insert(NAME.to_string(), Value::String(resolved.clone()));
            }
            if let Some(imp) = self.implementation(section, resolved.as_deref()) {
                defaults.extend(imp.default_properties());
            }
        }

        Value::Object(defaults)
    }

    /// Schema node describing `section.property` under implementation `name`.
    pub fn property_schema(&self, section: &str, property: &str, name: Option<&str>) -> Option<&Value> {
        if property != NAME
            && let Some(imp) = self.implementation(section, name)
            && let Some(node) = imp.input_schema().get("properties").and_then(|p| p.get(property))
        {
            return Some(node);
        }
        self.section_schema(section)?
            .get("properties")?
            .get(property)
    }

    /// Allowed JSON types of `section.property`; empty means unconstrained.
    pub fn allowed_types(&self, section: &str, property: &str, name: Option<&str>) -> BTreeSet<TypeTag> {
        self.property_schema(section, property, name)
            .map(TypeTag::set_from_schema)
            .unwrap_or_default()
    }

    /// Declared default of `section.property`.
    pub fn property_default_value(
        &self,
        section: &str,
        property: &str,
        name: Option<&str>,
    ) -> Option<Value> {
        if property == NAME && Self::is_pluggable(section) {
            return name
                .map(str::to_string)
                .or_else(|| self.default_name(section))
                .map(Value::String);
        }
        self.property_schema(section, property, name)
            .and_then(|n| n.get("default"))
            .cloned()
    }

    /// Values a property may take: the registered implementations for a
    /// pluggable `name`, otherwise the property's `enum`.
    pub fn property_choices(
        &self,
        section: &str,
        property: &str,
        name: Option<&str>,
    ) -> Option<Vec<Value>> {
        if property == NAME
            && let Some(kind) = PluggableKind::from_section(section)
        {
            return Some(
                self.registry
                    .list_implementations(kind)
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            );
        }
        self.property_schema(section, property, name)
            .and_then(|n| n.get("enum"))
            .and_then(Value::as_array)
            .cloned()
    }

    /// Whether properties beyond the declared ones are accepted.
    ///
    /// Only an explicit `additionalProperties: true` (or a schema object) allows
    /// them. Sections unknown to the schema accept anything.
    pub fn allows_additional_properties(&self, section: &str, name: Option<&str>) -> bool {
        if let Some(imp) = self.implementation(section, name) {
            return allows_additional(imp.input_schema());
        }
        match self.section_schema(section) {
            Some(node) => allows_additional(node),
            None => true,
        }
    }

    /// Declared substitutions: target `section.property` to optional source path.
    pub fn substitutions(&self) -> &IndexMap<String, Option<String>> {
        &self.substitutions
    }

    /// Whether `section.property` is a declared substitution target.
    pub fn is_substitution_key(&self, section: &str, property: &str) -> bool {
        self.substitutions
            .contains_key(&format!("{section}.{property}"))
    }

    fn check_section_declared(&self, section: &str) -> Result<(), SchemaError> {
        if self.is_declared(section) || self.allows_additional_sections() {
            Ok(())
        } else {
            Err(SchemaError::UnknownSection(section.to_string()))
        }
    }

    /// Reject a section the schema does not admit.
    pub fn check_section(&self, section: &str) -> Result<(), SchemaError> {
        self.check_section_declared(section)
    }

    /// Check a property write against types, `enum` and additional-properties policy.
    pub fn check_property(
        &self,
        section: &str,
        property: &str,
        name: Option<&str>,
        value: &Value,
    ) -> Result<(), SchemaError> {
        self.check_section_declared(section)?;
        if !self.is_declared(section) {
            return Ok(());
        }
        if self.section_is_text(section) {
            return Err(SchemaError::NotStructured(section.to_string()));
        }

        let path = format!("{section}.{property}");
        if property == NAME
            && let Some(kind) = PluggableKind::from_section(section)
        {
            let Some(requested) = value.as_str() else {
                return Err(SchemaError::TypeMismatch {
                    path,
                    expected: "string".into(),
                    actual: value.to_string(),
                });
            };
            if self.registry.get(kind, requested).is_none() {
                return Err(SchemaError::UnknownImplementation {
                    kind,
                    name: requested.to_string(),
                });
            }
            return Ok(());
        }

        match self.property_schema(section, property, name) {
            Some(node) => check_value(
                &TypeTag::set_from_schema(node),
                node.get("enum").and_then(Value::as_array).map(Vec::as_slice),
                value,
                &path,
            ),
            None if self.allows_additional_properties(section, name) => Ok(()),
            None => Err(SchemaError::UnknownProperty { path }),
        }
    }

    /// Check a section data value against the section's declared types.
    ///
    /// Structured sections are rejected: their kind is fixed by the schema.
    pub fn check_section_data(&self, section: &str, value: &Value) -> Result<(), SchemaError> {
        self.check_section_declared(section)?;
        if self.is_declared(section) && !self.section_is_text(section) {
            return Err(SchemaError::NotText(section.to_string()));
        }
        check_value(&self.section_types(section), None, value, section)
    }

    /// Root schema specialised for the implementations `document` selects.
    ///
    /// Each pluggable section's properties are replaced by the selected
    /// implementation's input schema and its `name` is restricted to registered
    /// names. Object sections without an `additionalProperties` keyword are closed.
    pub fn document_schema(&self, document: &ConfigDocument) -> Value {
        let mut schema = self.schema.clone();
        if let Some(obj) = schema.as_object_mut() {
            obj.remove(SUBSTITUTIONS);
        }

        if let Some(sections) = schema.get_mut("properties").and_then(Value::as_object_mut) {
            for (section, node) in sections.iter_mut() {
                if let Some(kind) = PluggableKind::from_section(section) {
                    let name = document.section_name_property(section);
                    *node = self.pluggable_schema(kind, node, name.as_deref());
                } else if let Some(obj) = node.as_object_mut()
                    && obj.contains_key("properties")
                {
                    obj.entry("additionalProperties").or_insert(Value::Bool(false));
                }
            }
        }
        schema
    }

    fn pluggable_schema(&self, kind: PluggableKind, base: &Value, name: Option<&str>) -> Value {
        let mut properties = base
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        properties.insert(
            NAME.to_string(),
            json!({"type": "string", "enum": self.registry.list_implementations(kind)}),
        );

        let mut additional = base
            .get("additionalProperties")
            .cloned()
            .unwrap_or(Value::Bool(false));
        if let Some(imp) = name.and_then(|n| self.registry.get(kind, n)) {
            if let Some(props) = imp.input_schema().get("properties").and_then(Value::as_object) {
                properties.extend(props.clone());
            }
            additional = imp
                .input_schema()
                .get("additionalProperties")
                .cloned()
                .unwrap_or(Value::Bool(false));
        }

        json!({
            "type": "object",
            "properties": properties,
            "additionalProperties": additional,
        })
    }

    /// Validate the whole document against [`Self::document_schema`].
    pub fn validate(&self, document: &ConfigDocument) -> Result<(), SchemaError> {
        let schema = self.document_schema(document);
        let compiled =
            JSONSchema::compile(&schema).map_err(|e| SchemaError::Invalid(e.to_string()))?;

        let instance = document.to_dictionary();
        let result = compiled.validate(&instance);
        if let Err(errors) = result {
            let messages: Vec<String> = errors
                .map(|e| format!("{}: {}", e.instance_path, e))
                .collect();
            debug!("document validation failed: {messages:?}");
            return Err(SchemaError::Validation(messages));
        }
        Ok(())
    }
}

fn allows_additional(node: &Value) -> bool {
    match node.get("additionalProperties") {
        Some(Value::Bool(b)) => *b,
        Some(Value::Object(_)) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::builtin().unwrap()
    }

    #[test]
    fn test_declared_sections_keep_order() {
        let names = catalog().declared_section_names();
        assert_eq!(names.first().map(String::as_str), Some("name"));
        assert_eq!(names.get(1).map(String::as_str), Some("problem"));
    }

    #[test]
    fn test_text_sections_follow_schema() {
        let c = catalog();
        assert!(c.section_is_text("psi4"));
        assert!(c.section_is_text("name"));
        assert!(!c.section_is_text("problem"));
        assert!(!c.section_is_text("undeclared"));
    }

    #[test]
    fn test_pluggable_defaults_depend_on_name() {
        let c = catalog();
        let vqe = c.default_properties("algorithm", None);
        assert_eq!(vqe["name"], json!("VQE"));
        assert_eq!(vqe["operator_mode"], json!("matrix"));

        let exact = c.default_properties("algorithm", Some("ExactEigensolver"));
        assert_eq!(exact, json!({"name": "ExactEigensolver", "k": 1}));
    }

    #[test]
    fn test_data_section_default() {
        assert_eq!(catalog().default_properties("psi4", None), Value::Null);
        assert_eq!(
            catalog().default_properties("name", None),
            json!("Quantum chemistry experiment")
        );
    }

    #[test]
    fn test_allowed_types_use_implementation_schema() {
        let c = catalog();
        let types = c.allowed_types("algorithm", "initial_point", Some("VQE"));
        assert!(types.contains(&TypeTag::Array));
        assert!(types.contains(&TypeTag::Null));
        assert!(c.allowed_types("backend", "missing", None).is_empty());
    }

    #[test]
    fn test_check_property_rejects_unknown() {
        let c = catalog();
        assert!(matches!(
            c.check_property("backend", "color", None, &json!("red")),
            Err(SchemaError::UnknownProperty { .. })
        ));
        assert!(matches!(
            c.check_property("algorithm", "name", None, &json!("Grover")),
            Err(SchemaError::UnknownImplementation { .. })
        ));
        assert!(matches!(
            c.check_property("psi4", "basis", None, &json!("sto-3g")),
            Err(SchemaError::NotStructured(_))
        ));
        assert!(
            c.check_property("backend", "shots", None, &json!(2048))
                .is_ok()
        );
    }

    #[test]
    fn test_check_section_data_rejects_structured() {
        let c = catalog();
        assert!(matches!(
            c.check_section_data("backend", &json!({"shots": 5})),
            Err(SchemaError::NotText(_))
        ));
        assert!(c.check_section_data("psi4", &json!("molecule h2 {}")).is_ok());
    }

    #[test]
    fn test_substitution_keys() {
        let c = catalog();
        assert!(c.is_substitution_key("initial_state", "qubit_mapping"));
        assert!(!c.is_substitution_key("operator", "qubit_mapping"));
        assert_eq!(
            c.substitutions().get("initial_state.qubit_mapping"),
            Some(&Some("operator.qubit_mapping".to_string()))
        );
    }

    #[test]
    fn test_schema_without_sections_is_invalid() {
        let err = SchemaCatalog::new(json!({"type": "object"}), PluggableRegistry::new()).unwrap_err();
        assert!(matches!(err, SchemaError::Invalid(_)));
    }
}
