use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{data::schema::SchemaError, error::ConfigError};

const BUILTIN_PLUGGABLES: &str = include_str!("../../resources/pluggables.json");

/// Section kinds whose contents are selected by a `name` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluggableKind {
    /// Quantum algorithm (`algorithm` section).
    Algorithm,
    /// Chemistry operator (`operator` section).
    Operator,
    /// Classical optimizer (`optimizer` section).
    Optimizer,
    /// Variational form (`variational_form` section).
    VariationalForm,
    /// Initial state (`initial_state` section).
    InitialState,
}

impl PluggableKind {
    /// Every pluggable kind.
    pub const ALL: [PluggableKind; 5] = [
        PluggableKind::Algorithm,
        PluggableKind::Operator,
        PluggableKind::Optimizer,
        PluggableKind::VariationalForm,
        PluggableKind::InitialState,
    ];

    /// Section name this kind configures.
    pub fn as_str(&self) -> &'static str {
        match self {
            PluggableKind::Algorithm => "algorithm",
            PluggableKind::Operator => "operator",
            PluggableKind::Optimizer => "optimizer",
            PluggableKind::VariationalForm => "variational_form",
            PluggableKind::InitialState => "initial_state",
        }
    }

    /// Kind configured by `section`, if it is pluggable.
    pub fn from_section(section: &str) -> Option<Self> {
        section.parse().ok()
    }

    /// Whether compatible implementations depend on the selected problem.
    pub fn is_problem_constrained(&self) -> bool {
        matches!(self, PluggableKind::Algorithm | PluggableKind::Operator)
    }
}

impl fmt::Display for PluggableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluggableKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| SchemaError::UnknownSection(s.to_string()))
    }
}

/// A section an implementation needs, with the implementation to select by default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Dependency {
    /// Section name of the dependency.
    pub section: String,
    /// Initial properties, normally just `name`.
    #[serde(default)]
    pub default: Map<String, Value>,
}

/// One interchangeable implementation of a pluggable section.
pub trait PluggableImplementation: fmt::Debug + Send + Sync {
    /// Kind of section this implementation configures.
    fn kind(&self) -> PluggableKind;

    /// Registered name, the value of the section's `name` property.
    fn name(&self) -> &str;

    /// JSON schema describing the implementation's properties.
    fn input_schema(&self) -> &Value;

    /// Problem names this implementation can solve.
    fn compatible_problems(&self) -> &[String];

    /// Sections that must exist when this implementation is selected.
    fn depends(&self) -> &[Dependency] {
        &[]
    }

    /// Default property values taken from the input schema, in declaration order.
    ///
    /// A property without a `default` maps to `null`. The `name` property is not included.
    fn default_properties(&self) -> Map<String, Value> {
        let mut defaults = Map::new();
        if let Some(props) = self.input_schema().get("properties").and_then(Value::as_object) {
            for (key, node) in props {
                if key == "name" {
                    continue;
                }
                defaults.insert(
                    key.clone(),
                    node.get("default").cloned().unwrap_or(Value::Null),
                );
            }
        }
        defaults
    }
}

/// Implementation described by a JSON descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct DeclaredPluggable {
    /// Section kind.
    pub kind: PluggableKind,
    /// Implementation name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Compatible problem names.
    #[serde(default)]
    pub problems: Vec<String>,
    /// Required companion sections.
    #[serde(default)]
    pub depends: Vec<Dependency>,
    /// Property schema.
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl PluggableImplementation for DeclaredPluggable {
    fn kind(&self) -> PluggableKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    fn compatible_problems(&self) -> &[String] {
        &self.problems
    }

    fn depends(&self) -> &[Dependency] {
        &self.depends
    }
}

/// Implementations available per pluggable kind, in registration order.
#[derive(Debug, Default)]
pub struct PluggableRegistry {
    entries: IndexMap<PluggableKind, IndexMap<String, Box<dyn PluggableImplementation>>>,
}

impl PluggableRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with the bundled implementations.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json_str(BUILTIN_PLUGGABLES, "pluggables.json")
    }

    /// Build a registry from a JSON array of implementation descriptors.
    pub fn from_json_str(content: &str, source_name: &str) -> Result<Self, ConfigError> {
        let declared: Vec<DeclaredPluggable> = serde_json::from_str(content)
            .map_err(|e| ConfigError::parse(source_name, e.line(), e.to_string()))?;

        let mut registry = Self::new();
        for d in declared {
            registry.register(Box::new(d));
        }
        Ok(registry)
    }

    /// Register an implementation, replacing any previous one with the same kind and name.
    pub fn register(
        &mut self,
        implementation: Box<dyn PluggableImplementation>,
    ) -> Option<Box<dyn PluggableImplementation>> {
        let kind = implementation.kind();
        let name = implementation.name().to_string();
        debug!("register pluggable {kind}/{name}");
        let replaced = self
            .entries
            .entry(kind)
            .or_default()
            .insert(name.clone(), implementation);
        if replaced.is_some() {
            warn!("pluggable {kind}/{name} registered twice, keeping the last one");
        }
        replaced
    }

    /// Look up an implementation.
    pub fn get(&self, kind: PluggableKind, name: &str) -> Option<&dyn PluggableImplementation> {
        self.entries
            .get(&kind)
            .and_then(|m| m.get(name))
            .map(|b| &**b)
    }

    /// Names registered for `kind`, in registration order.
    pub fn list_implementations(&self, kind: PluggableKind) -> Vec<String> {
        self.entries
            .get(&kind)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Problems declared compatible by an implementation.
    pub fn compatible_problems(&self, kind: PluggableKind, name: &str) -> Option<&[String]> {
        self.get(kind, name).map(|p| p.compatible_problems())
    }

    /// Implementations of `kind` compatible with `problem`, or all of them when `problem` is `None`.
    pub fn compatible_with(&self, kind: PluggableKind, problem: Option<&str>) -> Vec<String> {
        let Some(problem) = problem else {
            return self.list_implementations(kind);
        };
        self.entries
            .get(&kind)
            .map(|m| {
                m.values()
                    .filter(|p| p.compatible_problems().iter().any(|c| c == problem))
                    .map(|p| p.name().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_registry_loads() {
        let registry = PluggableRegistry::builtin().unwrap();
        let algorithms = registry.list_implementations(PluggableKind::Algorithm);
        assert_eq!(algorithms.first().map(String::as_str), Some("VQE"));
        assert!(
            registry
                .list_implementations(PluggableKind::Operator)
                .contains(&"hamiltonian".to_string())
        );
    }

    #[test]
    fn test_kind_from_section() {
        assert_eq!(
            PluggableKind::from_section("variational_form"),
            Some(PluggableKind::VariationalForm)
        );
        assert_eq!(PluggableKind::from_section("problem"), None);
        assert!(PluggableKind::Operator.is_problem_constrained());
        assert!(!PluggableKind::Optimizer.is_problem_constrained());
    }

    #[test]
    fn test_default_properties_skip_name() {
        let p = DeclaredPluggable {
            kind: PluggableKind::Algorithm,
            name: "QAOA".into(),
            description: String::new(),
            problems: vec!["ising".into()],
            depends: vec![],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "default": "QAOA"},
                    "p": {"type": "integer", "default": 1},
                    "initial_point": {"type": ["array", "null"]}
                }
            }),
        };
        assert_eq!(
            Value::Object(p.default_properties()),
            json!({"p": 1, "initial_point": null})
        );
    }

    #[test]
    fn test_compatible_with_filters_by_problem() {
        let registry = PluggableRegistry::builtin().unwrap();
        let ising = registry.compatible_with(PluggableKind::Algorithm, Some("ising"));
        assert!(ising.contains(&"QAOA.Variational".to_string()));
        assert!(!ising.contains(&"QPE".to_string()));
        assert!(
            registry
                .compatible_with(PluggableKind::Algorithm, Some("unknown"))
                .is_empty()
        );
    }

    #[test]
    fn test_malformed_descriptor_is_parse_error() {
        let err = PluggableRegistry::from_json_str("[{\"kind\": \"algorithm\"", "bad.json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
