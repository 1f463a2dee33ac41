use std::{
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::{
    data::{
        format::{self, DocumentFormat},
        property::empty_value_for,
        registry::PluggableKind,
        schema::{NAME, SchemaCatalog, SchemaError},
    },
    error::{ConfigError, Result},
};

/// Contents of a section.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionBody {
    /// Ordered property mapping.
    Properties(Map<String, Value>),
    /// A single value, a string for text sections.
    Data(Value),
}

/// A named unit of configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Unique section name.
    pub name: String,
    /// Section contents.
    pub body: SectionBody,
}

impl Section {
    /// Property mapping of a structured section.
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        match &self.body {
            SectionBody::Properties(p) => Some(p),
            SectionBody::Data(_) => None,
        }
    }

    /// Data value of a data section.
    pub fn data(&self) -> Option<&Value> {
        match &self.body {
            SectionBody::Data(v) => Some(v),
            SectionBody::Properties(_) => None,
        }
    }

    /// Contents as a JSON value.
    pub fn to_value(&self) -> Value {
        match &self.body {
            SectionBody::Properties(p) => Value::Object(p.clone()),
            SectionBody::Data(v) => v.clone(),
        }
    }
}

/// In-memory input document: ordered sections plus file identity.
///
/// Modification is tracked against the last committed snapshot, so undoing an
/// edit by hand makes the document unmodified again.
#[derive(Debug, Clone, Default)]
pub struct ConfigDocument {
    path: Option<PathBuf>,
    sections: IndexMap<String, Section>,
    committed: IndexMap<String, Section>,
}

impl ConfigDocument {
    /// Create an empty, unsaved document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from the dictionary form.
    ///
    /// The schema decides each section's kind. A structured section given a
    /// non-object value is a parse error.
    pub fn from_dictionary(dict: &Value, catalog: &SchemaCatalog, source_name: &str) -> Result<Self> {
        let Some(entries) = dict.as_object() else {
            return Err(ConfigError::parse(
                source_name,
                0,
                "input must be an object of sections",
            ));
        };

        let mut doc = Self::new();
        for (name, value) in entries {
            let structured = catalog.is_declared(name) && !catalog.section_is_text(name);
            let body = match value {
                Value::Object(props) if !catalog.section_is_text(name) => {
                    SectionBody::Properties(props.clone())
                }
                other if structured => {
                    return Err(ConfigError::parse(
                        source_name,
                        0,
                        format!("section {name:?} expects properties, got {other}"),
                    ));
                }
                other => SectionBody::Data(other.clone()),
            };
            doc.insert(Section {
                name: name.clone(),
                body,
            });
        }
        Ok(doc)
    }

    /// Parse `content` in the given format.
    pub fn parse(
        content: &str,
        format: DocumentFormat,
        catalog: &SchemaCatalog,
        source_name: &str,
    ) -> Result<Self> {
        match format {
            DocumentFormat::Json => {
                let dict: Value = serde_json::from_str(content)
                    .map_err(|e| ConfigError::parse(source_name, e.line(), e.to_string()))?;
                Self::from_dictionary(&dict, catalog, source_name)
            }
            DocumentFormat::Native => {
                let mut doc = Self::new();
                for section in format::parse_native(content, catalog, source_name)? {
                    if doc.sections.contains_key(&section.name) {
                        warn!("{source_name}: section {:?} repeated, keeping the last one", section.name);
                    }
                    doc.insert(section);
                }
                Ok(doc)
            }
        }
    }

    /// Read and parse a file; the format follows the extension.
    pub fn load(path: &Path, catalog: &SchemaCatalog) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let source_name = path.display().to_string();
        let mut doc = Self::parse(&content, DocumentFormat::from_path(path), catalog, &source_name)?;
        doc.path = Some(path.to_path_buf());
        doc.commit();
        info!("loaded {} sections from {}", doc.sections.len(), path.display());
        Ok(doc)
    }

    /// Render the whole document in `format`.
    pub fn render(&self, format: DocumentFormat) -> Result<String> {
        match format {
            DocumentFormat::Json => Ok(serde_json::to_string_pretty(&self.to_dictionary())?),
            DocumentFormat::Native => Ok(format::write_native(self.sections.values())),
        }
    }

    /// Write the document to `path`, adopt it as the file identity and commit.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        let content = self.render(DocumentFormat::from_path(path))?;
        fs::write(path, content)?;
        self.path = Some(path.to_path_buf());
        self.commit();
        info!("saved input to {}", path.display());
        Ok(())
    }

    /// Write the dictionary form as JSON without touching identity or modified state.
    pub fn export(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render(DocumentFormat::Json)?)?;
        info!("exported input dictionary to {}", path.display());
        Ok(())
    }

    /// Dictionary form: section name to properties object or data value.
    pub fn to_dictionary(&self) -> Value {
        Value::Object(
            self.sections
                .iter()
                .map(|(name, s)| (name.clone(), s.to_value()))
                .collect(),
        )
    }

    /// Source or last saved path.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the sections differ from the last commit.
    pub fn is_modified(&self) -> bool {
        self.sections != self.committed
    }

    /// Accept the current sections as the unmodified baseline.
    pub fn commit(&mut self) {
        self.committed = self.sections.clone();
    }

    /// Whether there are no sections.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Section names in document order.
    pub fn section_names(&self) -> Vec<String> {
        self.sections.keys().cloned().collect()
    }

    /// Look up a section.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    /// Whether the section exists.
    pub fn contains(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    fn insert(&mut self, section: Section) {
        self.sections.insert(section.name.clone(), section);
    }

    /// Properties of a structured section.
    pub fn section_properties(&self, name: &str) -> Option<&Map<String, Value>> {
        self.section(name).and_then(Section::properties)
    }

    /// One property of a structured section.
    pub fn section_property(&self, name: &str, property: &str) -> Option<&Value> {
        self.section_properties(name).and_then(|p| p.get(property))
    }

    /// The section's `name` property when it is a string.
    pub fn section_name_property(&self, name: &str) -> Option<String> {
        self.section_property(name, NAME)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Data value of a data section.
    pub fn section_data(&self, name: &str) -> Option<&Value> {
        self.section(name).and_then(Section::data)
    }

    /// Text of a data section; non-string data is rendered as JSON.
    pub fn section_text(&self, name: &str) -> String {
        match self.section_data(name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    /// Create the section if missing, with an empty body of the schema's kind.
    pub fn ensure_section(&mut self, catalog: &SchemaCatalog, name: &str) -> Result<()> {
        catalog.check_section(name)?;
        if !self.sections.contains_key(name) {
            let body = if catalog.section_is_text(name) {
                SectionBody::Data(Value::Null)
            } else {
                SectionBody::Properties(Map::new())
            };
            debug!("create section {name:?}");
            self.insert(Section {
                name: name.to_string(),
                body,
            });
        }
        Ok(())
    }

    /// Set one property after checking it against the schema.
    ///
    /// The check uses the section's current implementation name, or the new
    /// one when `property` is `name`.
    pub fn set_section_property(
        &mut self,
        catalog: &SchemaCatalog,
        section: &str,
        property: &str,
        value: Value,
    ) -> Result<()> {
        let name = if property == NAME {
            value.as_str().map(str::to_string)
        } else {
            self.section_name_property(section)
        };
        catalog.check_property(section, property, name.as_deref(), &value)?;
        self.ensure_section(catalog, section)?;

        self.put_property(section, property, value);
        Ok(())
    }

    /// Write a property without schema checks, creating the section if needed.
    ///
    /// Used for values that come from the schema itself.
    pub(crate) fn put_property(&mut self, section: &str, property: &str, value: Value) {
        trace!("set {section}.{property} = {value}");
        let s = self
            .sections
            .entry(section.to_string())
            .or_insert_with(|| Section {
                name: section.to_string(),
                body: SectionBody::Properties(Map::new()),
            });
        if let SectionBody::Properties(props) = &mut s.body {
            props.insert(property.to_string(), value);
        } else {
            let mut props = Map::new();
            props.insert(property.to_string(), value);
            s.body = SectionBody::Properties(props);
        }
    }

    /// Remove one property; returns whether it existed.
    pub fn delete_section_property(&mut self, section: &str, property: &str) -> bool {
        match self.sections.get_mut(section).map(|s| &mut s.body) {
            Some(SectionBody::Properties(props)) => props.shift_remove(property).is_some(),
            _ => false,
        }
    }

    /// Remove every property of a section, keeping the section.
    pub fn delete_section_properties(&mut self, section: &str) {
        if let Some(SectionBody::Properties(props)) =
            self.sections.get_mut(section).map(|s| &mut s.body)
        {
            props.clear();
        }
    }

    /// Replace a section's body with a data value after checking its type.
    ///
    /// An existing structured section keeps its properties and is rejected.
    pub fn set_section_data(&mut self, catalog: &SchemaCatalog, section: &str, value: Value) -> Result<()> {
        catalog.check_section_data(section, &value)?;
        if self.section_properties(section).is_some() {
            return Err(SchemaError::NotText(section.to_string()).into());
        }
        self.put_data(section, value);
        Ok(())
    }

    /// Replace a section's body with a data value without schema checks.
    pub(crate) fn put_data(&mut self, section: &str, value: Value) {
        match self.sections.get_mut(section) {
            Some(s) => s.body = SectionBody::Data(value),
            None => self.insert(Section {
                name: section.to_string(),
                body: SectionBody::Data(value),
            }),
        }
    }

    /// Reset a section's data to the empty value its types allow.
    pub fn delete_section_text(&mut self, catalog: &SchemaCatalog, section: &str) {
        if let Some(s) = self.sections.get_mut(section)
            && let SectionBody::Data(v) = &mut s.body
        {
            *v = empty_value_for(&catalog.section_types(section)).unwrap_or(Value::Null);
        }
    }

    /// Remove a section; returns whether it existed.
    pub fn delete_section(&mut self, section: &str) -> bool {
        self.sections.shift_remove(section).is_some()
    }

    /// Add a section initialised from a schema default.
    ///
    /// An object default is laid over the full defaults of the implementation
    /// it names; anything else becomes the section's data.
    fn insert_default_section(&mut self, catalog: &SchemaCatalog, section: &str, default: Value) {
        let body = match default {
            Value::Object(overrides) => {
                let name = overrides.get(NAME).and_then(Value::as_str);
                let mut props = match catalog.default_properties(section, name) {
                    Value::Object(p) => p,
                    _ => Map::new(),
                };
                props.extend(overrides);
                SectionBody::Properties(props)
            }
            other => SectionBody::Data(other),
        };
        debug!("add default section {section:?}");
        self.insert(Section {
            name: section.to_string(),
            body,
        });
    }

    /// Add missing default sections, the sections selected implementations
    /// depend on, and missing default properties.
    pub fn merge_defaults(&mut self, catalog: &SchemaCatalog) {
        for section in catalog.declared_section_names() {
            if self.contains(&section) {
                continue;
            }
            if let Some(default) = catalog.section_default(&section) {
                self.insert_default_section(catalog, &section, default.clone());
            }
        }

        loop {
            let selected: Vec<(PluggableKind, String)> = self
                .sections
                .keys()
                .filter_map(|s| {
                    let kind = PluggableKind::from_section(s)?;
                    let name = self
                        .section_name_property(s)
                        .or_else(|| catalog.default_name(s))?;
                    Some((kind, name))
                })
                .collect();

            let mut missing = Vec::new();
            for (kind, name) in selected {
                let Some(imp) = catalog.registry().get(kind, &name) else {
                    continue;
                };
                for dep in imp.depends() {
                    if !self.contains(&dep.section)
                        && !missing.iter().any(|(s, _)| s == &dep.section)
                    {
                        missing.push((dep.section.clone(), Value::Object(dep.default.clone())));
                    }
                }
            }

            if missing.is_empty() {
                break;
            }
            for (section, default) in missing {
                self.insert_default_section(catalog, &section, default);
            }
        }

        for (section, s) in self.sections.iter_mut() {
            let SectionBody::Properties(props) = &mut s.body else {
                continue;
            };
            let name = props.get(NAME).and_then(Value::as_str).map(str::to_string);
            if let Value::Object(defaults) = catalog.default_properties(section, name.as_deref()) {
                for (key, value) in defaults {
                    props.entry(key).or_insert(value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::builtin().unwrap()
    }

    #[test]
    fn test_from_dictionary_uses_schema_kind() {
        let c = catalog();
        let doc = ConfigDocument::from_dictionary(
            &json!({"psi4": "molecule {}", "problem": {"name": "energy"}}),
            &c,
            "test",
        )
        .unwrap();
        assert_eq!(doc.section_names(), vec!["psi4", "problem"]);
        assert_eq!(doc.section_text("psi4"), "molecule {}");
        assert_eq!(doc.section_property("problem", "name"), Some(&json!("energy")));

        let err = ConfigDocument::from_dictionary(&json!({"problem": "energy"}), &c, "test");
        assert!(matches!(err, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_modified_tracks_committed_snapshot() {
        let c = catalog();
        let mut doc = ConfigDocument::new();
        assert!(!doc.is_modified());
        doc.set_section_property(&c, "backend", "shots", json!(10)).unwrap();
        assert!(doc.is_modified());
        doc.commit();
        assert!(!doc.is_modified());
        doc.delete_section_property("backend", "shots");
        assert!(doc.is_modified());
    }

    #[test]
    fn test_set_property_checks_schema() {
        let c = catalog();
        let mut doc = ConfigDocument::new();
        let err = doc.set_section_property(&c, "backend", "shots", json!("many"));
        assert!(matches!(err, Err(ConfigError::SchemaViolation(_))));
        assert!(!doc.contains("backend"));
    }

    #[test]
    fn test_delete_section_text_uses_empty_value() {
        let c = catalog();
        let mut doc = ConfigDocument::new();
        doc.set_section_data(&c, "name", json!("H2")).unwrap();
        doc.delete_section_text(&c, "name");
        assert_eq!(doc.section_data("name"), Some(&json!("")));
        doc.set_section_data(&c, "psi4", json!("x")).unwrap();
        doc.delete_section_text(&c, "psi4");
        assert_eq!(doc.section_data("psi4"), Some(&Value::Null));
    }

    #[test]
    fn test_merge_defaults_adds_dependencies() {
        let c = catalog();
        let mut doc = ConfigDocument::from_dictionary(
            &json!({"algorithm": {"name": "QAOA.Variational"}}),
            &c,
            "test",
        )
        .unwrap();
        doc.merge_defaults(&c);

        assert_eq!(doc.section_name_property("optimizer").as_deref(), Some("COBYLA"));
        assert_eq!(doc.section_property("optimizer", "maxiter"), Some(&json!(1000)));
        assert_eq!(doc.section_property("algorithm", "p"), Some(&json!(1)));
        assert!(doc.contains("driver"));
        assert!(!doc.contains("variational_form"));
        c.validate(&doc).unwrap();
    }

    #[test]
    fn test_render_native_round_trip() {
        let c = catalog();
        let mut doc = ConfigDocument::new();
        doc.set_section_data(&c, "psi4", json!("molecule h2 {\n  H 0 0 0\n}\n")).unwrap();
        doc.set_section_property(&c, "backend", "name", json!("local_qasm_simulator")).unwrap();
        doc.set_section_property(&c, "backend", "shots", json!(256)).unwrap();

        let text = doc.render(DocumentFormat::Native).unwrap();
        let parsed = ConfigDocument::parse(&text, DocumentFormat::Native, &c, "mem").unwrap();
        assert_eq!(parsed.section_names(), doc.section_names());
        assert_eq!(parsed.to_dictionary(), doc.to_dictionary());
    }
}
