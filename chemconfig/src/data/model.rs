use std::{collections::BTreeSet, path::Path};

use serde_json::{Map, Value};

use crate::{
    data::{
        document::{ConfigDocument, Section},
        property::{TypeTag, empty_value_for},
        registry::PluggableKind,
        schema::{NAME, PROBLEM, SchemaCatalog},
    },
    error::{ConfigError, Result},
    prefs::Preferences,
};

const INPUT_TEMPLATE: &str = include_str!("../../resources/input_template.json");
const TEMPLATE_NAME: &str = "input_template.json";

/// Façade over the current input document, the schema and the preferences.
///
/// Reads degrade to empty values when no document is loaded. Writes and
/// schema queries fail with [`ConfigError::NotInitialized`] instead.
#[derive(Debug)]
pub struct ConfigModel {
    catalog: SchemaCatalog,
    preferences: Preferences,
    template: String,
    document: Option<ConfigDocument>,
}

impl ConfigModel {
    /// Create a model with no document loaded.
    pub fn new(catalog: SchemaCatalog, preferences: Preferences) -> Self {
        Self {
            catalog,
            preferences,
            template: INPUT_TEMPLATE.to_string(),
            document: None,
        }
    }

    /// Model over the bundled schema with default preferences.
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(SchemaCatalog::builtin()?, Preferences::default()))
    }

    /// Replace the template used by [`Self::new_document`].
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// The schema catalog.
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Current preferences.
    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Mutable preferences.
    pub fn preferences_mut(&mut self) -> &mut Preferences {
        &mut self.preferences
    }

    /// Loaded document, if any.
    pub fn document(&self) -> Option<&ConfigDocument> {
        self.document.as_ref()
    }

    /// Whether a document is loaded.
    pub fn is_initialized(&self) -> bool {
        self.document.is_some()
    }

    fn initialized(&self) -> Result<&ConfigDocument> {
        self.document.as_ref().ok_or(ConfigError::NotInitialized)
    }

    fn initialized_mut(&mut self) -> Result<(&SchemaCatalog, &mut ConfigDocument)> {
        match self.document.as_mut() {
            Some(doc) => Ok((&self.catalog, doc)),
            None => Err(ConfigError::NotInitialized),
        }
    }

    /// True when no document is loaded or it has no sections.
    pub fn is_empty(&self) -> bool {
        self.document.as_ref().is_none_or(ConfigDocument::is_empty)
    }

    /// Replace the document with the built-in template.
    ///
    /// On failure the model is left empty.
    pub fn new_document(&mut self) -> Result<Vec<String>> {
        self.document = None;
        let dict: Value = serde_json::from_str(&self.template)
            .map_err(|e| ConfigError::parse(TEMPLATE_NAME, e.line(), e.to_string()))?;
        let doc = ConfigDocument::from_dictionary(&dict, &self.catalog, TEMPLATE_NAME)?;
        let names = self.install(doc)?;
        info!("created new input with {} sections", names.len());
        Ok(names)
    }

    /// Replace the document with the contents of `path`.
    ///
    /// A missing or empty path is a no-op returning no sections. Otherwise the
    /// previous document is dropped before reading, so a failure leaves the
    /// model empty.
    pub fn load(&mut self, path: Option<&Path>) -> Result<Vec<String>> {
        let Some(path) = path.filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(Vec::new());
        };
        self.document = None;
        let doc = ConfigDocument::load(path, &self.catalog)?;
        let names = self.install(doc)?;
        self.preferences.add_recent_file(path);
        Ok(names)
    }

    fn install(&mut self, mut doc: ConfigDocument) -> Result<Vec<String>> {
        doc.commit();
        if self.preferences.populate_defaults {
            doc.merge_defaults(&self.catalog);
            self.catalog.validate(&doc)?;
            // the merged defaults become the unmodified baseline
            doc.commit();
        }
        let names = doc.section_names();
        self.document = Some(doc);
        Ok(names)
    }

    /// Path of the loaded document.
    pub fn filename(&self) -> Option<&Path> {
        self.document.as_ref().and_then(ConfigDocument::path)
    }

    /// Whether the loaded document has unsaved changes.
    pub fn is_modified(&self) -> bool {
        self.document
            .as_ref()
            .is_some_and(ConfigDocument::is_modified)
    }

    /// Save the document to `path` and adopt `path` as its identity.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if self.is_empty() {
            return Err(ConfigError::EmptyDocument);
        }
        let (_, doc) = self.initialized_mut()?;
        doc.save(path)?;
        self.preferences.add_recent_file(path);
        Ok(())
    }

    /// Flattened dictionary of the document.
    pub fn dictionary(&self) -> Result<Value> {
        if self.is_empty() {
            return Err(ConfigError::EmptyDocument);
        }
        Ok(self.initialized()?.to_dictionary())
    }

    /// Write the flattened dictionary as JSON.
    pub fn export(&self, path: &Path) -> Result<()> {
        if self.is_empty() {
            return Err(ConfigError::EmptyDocument);
        }
        self.initialized()?.export(path)
    }

    /// Validate the whole document against the schema.
    pub fn validate(&self) -> Result<()> {
        Ok(self.catalog.validate(self.initialized()?)?)
    }

    /// Section names in document order.
    pub fn section_names(&self) -> Vec<String> {
        self.document
            .as_ref()
            .map(ConfigDocument::section_names)
            .unwrap_or_default()
    }

    /// Look up a section.
    pub fn section(&self, section: &str) -> Option<&Section> {
        self.document.as_ref()?.section(section)
    }

    /// Choices for a property: implementation names or the `enum` values.
    pub fn property_default_values(&self, section: &str, property: &str) -> Option<Vec<Value>> {
        let doc = self.document.as_ref()?;
        self.catalog
            .property_choices(section, property, doc.section_name_property(section).as_deref())
    }

    /// Whether the schema makes `section` a text section.
    pub fn section_is_text(&self, section: &str) -> bool {
        self.is_initialized() && self.catalog.section_is_text(section)
    }

    /// Text of a section, empty when absent.
    pub fn section_text(&self, section: &str) -> String {
        self.document
            .as_ref()
            .map(|d| d.section_text(section))
            .unwrap_or_default()
    }

    /// Data value of a data section.
    pub fn section_data(&self, section: &str) -> Option<&Value> {
        self.document.as_ref()?.section_data(section)
    }

    /// Properties of a structured section, empty when absent.
    pub fn section_properties(&self, section: &str) -> Map<String, Value> {
        self.document
            .as_ref()
            .and_then(|d| d.section_properties(section))
            .cloned()
            .unwrap_or_default()
    }

    /// One property value.
    pub fn section_property(&self, section: &str, property: &str) -> Option<&Value> {
        self.document.as_ref()?.section_property(section, property)
    }

    /// Whether each of `properties` is a substitution.
    ///
    /// A property is substituted when the schema declares it as a substitution
    /// target and its live value differs from the default for the section's
    /// current implementation.
    pub fn substitution_keys(&self, section: &str, properties: &[String]) -> Vec<(String, bool)> {
        let Some(doc) = self.document.as_ref() else {
            return properties.iter().map(|p| (p.clone(), false)).collect();
        };
        let name = doc.section_name_property(section);

        properties
            .iter()
            .map(|property| {
                let substituted = self.catalog.is_substitution_key(section, property)
                    && doc.section_property(section, property).is_some_and(|current| {
                        let default = self
                            .catalog
                            .property_default_value(section, property, name.as_deref())
                            .unwrap_or(Value::Null);
                        *current != default
                    });
                (property.clone(), substituted)
            })
            .collect()
    }

    /// Properties paired with their substitution flag, in section order.
    pub fn properties_with_substitution(&self, section: &str) -> Vec<(String, Value, bool)> {
        let properties = self.section_properties(section);
        let keys: Vec<String> = properties.keys().cloned().collect();
        self.substitution_keys(section, &keys)
            .into_iter()
            .filter_map(|(key, substituted)| {
                properties
                    .get(&key)
                    .map(|value| (key, value.clone(), substituted))
            })
            .collect()
    }

    /// Whether the section still matches its schema defaults.
    ///
    /// The live `name` never counts as a difference and substituted
    /// properties are exempt; every other property must equal its default.
    pub fn default_properties_equals_properties(&self, section: &str) -> Result<bool> {
        let doc = self.initialized()?;
        let defaults = self.section_default_properties(section)?;
        let live = doc
            .section(section)
            .map(Section::to_value)
            .unwrap_or_else(|| Value::Object(Map::new()));

        let (mut defaults, properties) = match (defaults, live) {
            (Value::Object(d), Value::Object(p)) => (d, p),
            (d, p) => return Ok(d == p),
        };

        if let Some(name) = properties.get(NAME) {
            defaults.insert(NAME.to_string(), name.clone());
        }
        if defaults.len() != properties.len() {
            return Ok(false);
        }

        let keys: Vec<String> = properties.keys().cloned().collect();
        for (property, substituted) in self.substitution_keys(section, &keys) {
            let Some(default) = defaults.get(&property) else {
                return Ok(false);
            };
            if !substituted && properties.get(&property) != Some(default) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Create the section, or write its schema defaults over it.
    ///
    /// Writing `name` can select a different default set, so the defaults are
    /// fetched again at the new name and applied a second time.
    pub fn set_section(&mut self, section: &str) -> Result<()> {
        let (catalog, doc) = self.initialized_mut()?;
        doc.ensure_section(catalog, section)?;

        let name = doc.section_name_property(section);
        match catalog.default_properties(section, name.as_deref()) {
            Value::Object(defaults) => {
                for (key, value) in defaults {
                    doc.put_property(section, &key, value);
                }
                let name = doc.section_name_property(section);
                if let Value::Object(defaults) = catalog.default_properties(section, name.as_deref()) {
                    for (key, value) in defaults {
                        doc.put_property(section, &key, value);
                    }
                }
            }
            value => {
                let value = data_or_empty(catalog, section, value);
                doc.put_data(section, value);
            }
        }
        debug!("section {section:?} set to defaults");
        Ok(())
    }

    /// Reset a pluggable section to the defaults of its current `name`.
    pub fn set_default_properties_for_name(&mut self, section: &str) -> Result<()> {
        let (catalog, doc) = self.initialized_mut()?;
        doc.ensure_section(catalog, section)?;

        let name = doc.section_property(section, NAME).cloned();
        doc.delete_section_properties(section);
        if let Some(name) = &name {
            doc.put_property(section, NAME, name.clone());
        }

        match catalog.default_properties(section, name.as_ref().and_then(Value::as_str)) {
            Value::Object(defaults) => {
                for (key, value) in defaults {
                    if key != NAME {
                        doc.put_property(section, &key, value);
                    }
                }
            }
            value => {
                let value = data_or_empty(catalog, section, value);
                doc.put_data(section, value);
            }
        }
        Ok(())
    }

    /// Whether `section` is selected by a `name` property.
    pub fn is_pluggable_section(section: &str) -> bool {
        SchemaCatalog::is_pluggable(section)
    }

    /// Problem name from the document, else the schema default.
    fn problem_name(&self) -> Option<String> {
        self.document
            .as_ref()
            .and_then(|d| d.section_name_property(PROBLEM))
            .or_else(|| self.catalog.default_name(PROBLEM))
    }

    /// Operators compatible with the current problem.
    pub fn operator_section_names(&self) -> Vec<String> {
        self.pluggable_section_names(PluggableKind::Operator.as_str())
    }

    /// Implementations a pluggable section may select.
    ///
    /// Algorithms and operators are filtered by the current problem; other
    /// kinds list every registered implementation. Non-pluggable sections
    /// have none.
    pub fn pluggable_section_names(&self, section: &str) -> Vec<String> {
        let Some(kind) = PluggableKind::from_section(section) else {
            return Vec::new();
        };
        let registry = self.catalog.registry();
        if kind.is_problem_constrained() {
            registry.compatible_with(kind, self.problem_name().as_deref())
        } else {
            registry.list_implementations(kind)
        }
    }

    /// Remove a section.
    pub fn delete_section(&mut self, section: &str) -> Result<()> {
        let (_, doc) = self.initialized_mut()?;
        if !doc.delete_section(section) {
            debug!("delete of absent section {section:?}");
        }
        Ok(())
    }

    /// Sections the schema declares with a default, and those defaults.
    pub fn default_sections(&self) -> Result<Map<String, Value>> {
        self.initialized()?;
        Ok(self
            .catalog
            .declared_section_names()
            .into_iter()
            .filter_map(|s| {
                let default = self.catalog.section_default(&s)?.clone();
                Some((s, default))
            })
            .collect())
    }

    /// Defaults of `section` at its current `name`.
    pub fn section_default_properties(&self, section: &str) -> Result<Value> {
        let doc = self.initialized()?;
        Ok(self
            .catalog
            .default_properties(section, doc.section_name_property(section).as_deref()))
    }

    /// Whether `section` accepts undeclared properties.
    pub fn allows_additional_properties(&self, section: &str) -> Result<bool> {
        let doc = self.initialized()?;
        Ok(self
            .catalog
            .allows_additional_properties(section, doc.section_name_property(section).as_deref()))
    }

    /// Declared default of one property.
    pub fn property_default_value(&self, section: &str, property: &str) -> Result<Option<Value>> {
        let doc = self.initialized()?;
        Ok(self.catalog.property_default_value(
            section,
            property,
            doc.section_name_property(section).as_deref(),
        ))
    }

    /// Allowed types of one property.
    pub fn property_types(&self, section: &str, property: &str) -> Result<BTreeSet<TypeTag>> {
        let doc = self.initialized()?;
        Ok(self.catalog.allowed_types(
            section,
            property,
            doc.section_name_property(section).as_deref(),
        ))
    }

    /// Set a property.
    ///
    /// Setting `name` on a pluggable section pivots it: every property is
    /// replaced by the defaults of the newly selected implementation.
    pub fn set_section_property(&mut self, section: &str, property: &str, value: Value) -> Result<()> {
        let (catalog, doc) = self.initialized_mut()?;
        doc.set_section_property(catalog, section, property, value.clone())?;

        if SchemaCatalog::is_pluggable(section) && property == NAME {
            if let Value::Object(mut defaults) = catalog.default_properties(section, value.as_str()) {
                defaults.insert(NAME.to_string(), value);
                doc.delete_section_properties(section);
                for (key, value) in defaults {
                    doc.put_property(section, &key, value);
                }
            }
            info!("{section} switched to {:?}", doc.section_name_property(section));
        }
        Ok(())
    }

    /// Delete a property; deleting a pluggable `name` clears the section.
    pub fn delete_section_property(&mut self, section: &str, property: &str) -> Result<()> {
        let (_, doc) = self.initialized_mut()?;
        doc.delete_section_property(section, property);
        if SchemaCatalog::is_pluggable(section) && property == NAME {
            doc.delete_section_properties(section);
        }
        Ok(())
    }

    /// Set the data of a text section.
    pub fn set_section_text(&mut self, section: &str, value: Value) -> Result<()> {
        let (catalog, doc) = self.initialized_mut()?;
        doc.set_section_data(catalog, section, value)
    }

    /// Clear the data of a text section.
    pub fn delete_section_text(&mut self, section: &str) -> Result<()> {
        let (catalog, doc) = self.initialized_mut()?;
        doc.delete_section_text(catalog, section);
        Ok(())
    }

    /// Copy every declared substitution whose source is a section property.
    ///
    /// Targets are written only when the target section exists and its
    /// current implementation declares the property. Returns the written keys.
    pub fn process_substitutions(&mut self) -> Result<Vec<String>> {
        let (catalog, doc) = self.initialized_mut()?;
        let mut applied = Vec::new();

        for (target, source) in catalog.substitutions() {
            let Some(source) = source else {
                continue;
            };
            let (Some((t_section, t_property)), Some((s_section, s_property))) =
                (target.split_once('.'), source.split_once('.'))
            else {
                warn!("malformed substitution {target} <- {source}");
                continue;
            };
            if !doc.contains(t_section) {
                continue;
            }
            let Some(value) = doc.section_property(s_section, s_property).cloned() else {
                continue;
            };
            let name = doc.section_name_property(t_section);
            if catalog
                .property_schema(t_section, t_property, name.as_deref())
                .is_none()
            {
                continue;
            }
            doc.put_property(t_section, t_property, value);
            applied.push(target.clone());
        }

        debug!("applied substitutions: {applied:?}");
        Ok(applied)
    }
}

/// Non-mapping default for a section, with `null` replaced by an empty value
/// unless `null` is allowed.
fn data_or_empty(catalog: &SchemaCatalog, section: &str, value: Value) -> Value {
    if value.is_null() {
        empty_value_for(&catalog.section_types(section)).unwrap_or(Value::Null)
    } else {
        value
    }
}
