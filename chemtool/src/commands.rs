//! Command handlers.
//!
//! Each command loads its input into a [`ConfigModel`], applies one
//! operation, and saves the input back when the operation changed it.
//! Preferences are written back only when they changed.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chemconfig::{
    Value,
    data::{ConfigModel, PluggableRegistry, SchemaCatalog, SectionBody, TypeTag},
    prefs::Preferences,
};
use colored::Colorize;

use crate::{
    cli::{
        ChoicesArgs, Cli, Command, EditArgs, ExportArgs, NewArgs, PrefsArgs, PropertyArgs,
        SectionArgs, SectionsArgs, SetArgs, ShowArgs, TextArgs,
    },
    utils::{choice_lines, property_line, section_header, value_for_types},
};

/// Runs chemtool commands against one schema and preferences file.
pub struct ConfigHandler {
    model: ConfigModel,
    prefs_path: PathBuf,
    loaded_prefs: Preferences,
}

impl ConfigHandler {
    /// Builds the model from the schema, pluggables and preferences named on
    /// the command line, falling back to the bundled resources.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the files cannot be read or parsed.
    pub fn new(cli: &Cli) -> Result<Self> {
        let registry = match &cli.pluggables {
            Some(path) => {
                let content = read(path, "pluggables")?;
                PluggableRegistry::from_json_str(&content, &path.display().to_string())?
            }
            None => PluggableRegistry::builtin()?,
        };
        let catalog = match &cli.schema {
            Some(path) => {
                let content = read(path, "schema")?;
                SchemaCatalog::from_json_str(&content, &path.display().to_string(), registry)?
            }
            None => SchemaCatalog::builtin_with(registry)?,
        };

        let preferences = Preferences::load(&cli.prefs)?;
        debug!("preferences: {preferences:?}");
        Ok(Self {
            model: ConfigModel::new(catalog, preferences.clone()),
            prefs_path: cli.prefs.clone(),
            loaded_prefs: preferences,
        })
    }

    /// Borrows the model.
    pub fn model(&self) -> &ConfigModel {
        &self.model
    }

    /// Runs one command.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read, the edit is rejected by
    /// the schema, or the result cannot be written.
    pub fn handle(&mut self, command: Command) -> Result<()> {
        match command {
            Command::New(args) => self.handle_new(args)?,
            Command::Show(args) => self.handle_show(args)?,
            Command::Sections(args) => self.handle_sections(args)?,
            Command::Set(args) => self.handle_set(args)?,
            Command::Unset(args) => self.handle_unset(args)?,
            Command::AddSection(args) => self.edit_section(args, ConfigModel::set_section)?,
            Command::RemoveSection(args) => self.edit_section(args, ConfigModel::delete_section)?,
            Command::Reset(args) => {
                self.edit_section(args, ConfigModel::set_default_properties_for_name)?
            }
            Command::Text(args) => self.handle_text(args)?,
            Command::Choices(args) => self.handle_choices(args)?,
            Command::Substitute(args) => self.handle_substitute(args)?,
            Command::Validate(args) => {
                self.open(&args.input)?;
                self.model.validate()?;
                println!("{} {}", args.input.display(), "is valid".green());
            }
            Command::Export(args) => self.handle_export(args)?,
            Command::Prefs(args) => self.handle_prefs(args)?,
        }
        self.store_preferences()
    }

    fn open(&mut self, input: &Path) -> Result<()> {
        self.model
            .load(Some(input))
            .with_context(|| format!("can not load input: {}", input.display()))?;
        Ok(())
    }

    fn finish(&mut self, edit: &EditArgs) -> Result<()> {
        let target = edit.output.as_deref().unwrap_or(&edit.input);
        if edit.output.is_none() && !self.model.is_modified() {
            println!("{}", "No changes".dimmed());
            return Ok(());
        }
        self.model
            .save(target)
            .with_context(|| format!("can not save input: {}", target.display()))?;
        println!("Saved {}", target.display().to_string().green());
        Ok(())
    }

    fn store_preferences(&self) -> Result<()> {
        if *self.model.preferences() == self.loaded_prefs {
            return Ok(());
        }
        self.model.preferences().save(&self.prefs_path)?;
        debug!("preferences saved to {}", self.prefs_path.display());
        Ok(())
    }

    fn handle_new(&mut self, args: NewArgs) -> Result<()> {
        if args.output.exists() && !args.force {
            bail!(
                "{} already exists, use --force to overwrite",
                args.output.display()
            );
        }
        let sections = self.model.new_document()?;
        info!("new input with sections {sections:?}");
        self.model.save(&args.output)?;
        println!("Created {}", args.output.display().to_string().green());
        Ok(())
    }

    fn handle_show(&mut self, args: ShowArgs) -> Result<()> {
        self.open(&args.input.input)?;
        let sections = match args.section {
            Some(section) => {
                if self.model.section(&section).is_none() {
                    bail!("no section {section:?} in {}", args.input.input.display());
                }
                vec![section]
            }
            None => self.model.section_names(),
        };
        for section in sections {
            self.print_section(&section);
            println!();
        }
        Ok(())
    }

    fn print_section(&self, section: &str) {
        let Some(s) = self.model.section(section) else {
            return;
        };
        match &s.body {
            SectionBody::Properties(_) => {
                let at_defaults = self
                    .model
                    .default_properties_equals_properties(section)
                    .ok();
                println!("{}", section_header(section, at_defaults));
                for (key, value, substituted) in self.model.properties_with_substitution(section) {
                    println!("{}", property_line(&key, &value, substituted));
                }
            }
            SectionBody::Data(Value::Null) => println!("{}", section_header(section, None)),
            SectionBody::Data(_) => {
                println!("{}", section_header(section, None));
                println!("{}", self.model.section_text(section));
            }
        }
        println!("{}", "&end".green().bold());
    }

    fn handle_sections(&mut self, args: SectionsArgs) -> Result<()> {
        self.open(&args.input.input)?;
        if args.defaults {
            for (section, default) in self.model.default_sections()? {
                println!("{} {}", section.green(), default.to_string().dimmed());
            }
            return Ok(());
        }
        for section in self.model.section_names() {
            let kind = if self.model.section_is_text(&section) {
                "text"
            } else if ConfigModel::is_pluggable_section(&section) {
                "pluggable"
            } else {
                "properties"
            };
            println!("{} {}", section.green(), format!("({kind})").dimmed());
        }
        Ok(())
    }

    fn handle_set(&mut self, args: SetArgs) -> Result<()> {
        let PropertyArgs {
            edit,
            section,
            property,
        } = args.target;
        self.open(&edit.input)?;

        let types = self.model.property_types(&section, &property)?;
        let value = value_for_types(&types, &args.value);
        self.model
            .set_section_property(&section, &property, value)
            .with_context(|| format!("can not set {section}.{property}"))?;
        self.finish(&edit)
    }

    fn handle_unset(&mut self, args: PropertyArgs) -> Result<()> {
        self.open(&args.edit.input)?;
        if self
            .model
            .section_property(&args.section, &args.property)
            .is_none()
        {
            warn!("{}.{} is not set", args.section, args.property);
        }
        self.model
            .delete_section_property(&args.section, &args.property)?;
        self.finish(&args.edit)
    }

    fn edit_section(
        &mut self,
        args: SectionArgs,
        op: fn(&mut ConfigModel, &str) -> chemconfig::Result<()>,
    ) -> Result<()> {
        self.open(&args.edit.input)?;
        op(&mut self.model, &args.section)
            .with_context(|| format!("can not update section {}", args.section))?;
        self.finish(&args.edit)
    }

    fn handle_text(&mut self, args: TextArgs) -> Result<()> {
        self.open(&args.edit.input)?;
        if !self.model.section_is_text(&args.section) {
            bail!("{} is not a text section", args.section);
        }

        let text = match (&args.set, &args.file) {
            (Some(text), _) => Some(text.clone()),
            (None, Some(path)) => Some(read(path, "text")?),
            (None, None) => None,
        };

        if let Some(text) = text {
            let types = self.model.catalog().section_types(&args.section);
            let text = text.trim_end_matches('\n');
            let value = if types.contains(&TypeTag::String) {
                Value::String(text.to_string())
            } else {
                value_for_types(&types, text)
            };
            self.model.set_section_text(&args.section, value)?;
        } else if args.clear {
            self.model.delete_section_text(&args.section)?;
        } else {
            println!("{}", self.model.section_text(&args.section));
            return Ok(());
        }
        self.finish(&args.edit)
    }

    fn handle_choices(&mut self, args: ChoicesArgs) -> Result<()> {
        self.open(&args.input.input)?;
        let section = &args.section;

        let (choices, current) = match &args.property {
            None if ConfigModel::is_pluggable_section(section) => {
                let names = self
                    .model
                    .pluggable_section_names(section)
                    .into_iter()
                    .map(Value::String)
                    .collect::<Vec<_>>();
                (names, self.model.section_property(section, "name"))
            }
            None => bail!("{section} does not select an implementation, name a property"),
            Some(property) => {
                let choices = self
                    .model
                    .property_default_values(section, property)
                    .unwrap_or_default();
                (choices, self.model.section_property(section, property))
            }
        };

        if choices.is_empty() {
            println!("{}", "No choices".dimmed());
        }
        for line in choice_lines(&choices, current) {
            println!("{line}");
        }
        Ok(())
    }

    fn handle_substitute(&mut self, args: EditArgs) -> Result<()> {
        self.open(&args.input)?;
        let applied = self.model.process_substitutions()?;
        for key in &applied {
            println!("{} {key}", "substituted".yellow());
        }
        self.finish(&args)
    }

    fn handle_export(&mut self, args: ExportArgs) -> Result<()> {
        self.open(&args.input.input)?;
        self.model
            .export(&args.output)
            .with_context(|| format!("can not export to {}", args.output.display()))?;
        println!("Exported {}", args.output.display().to_string().green());
        Ok(())
    }

    fn handle_prefs(&mut self, args: PrefsArgs) -> Result<()> {
        if args.print_schema {
            println!("{}", serde_json::to_string_pretty(&Preferences::json_schema())?);
            return Ok(());
        }

        let prefs = self.model.preferences_mut();
        if let Some(populate) = args.populate_defaults {
            prefs.populate_defaults = populate;
        }
        if args.clear_recent {
            prefs.recent_files.clear();
        }

        let prefs = self.model.preferences();
        println!("populate_defaults = {}", prefs.populate_defaults);
        println!("recent_files:");
        for file in &prefs.recent_files {
            println!("  {}", file.display());
        }
        Ok(())
    }
}

fn read(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("can not open {what}: {}", path.display()))
}
