//! CLI argument parsing for chemtool.
//!
//! Defines the command structure with clap derive macros; the handlers live
//! in [`crate::commands`].

use std::path::PathBuf;

use chemconfig::prefs::DEFAULT_PREFERENCES_FILE;
use clap::{Args, Parser, Subcommand};

/// Chemtool: edit quantum chemistry experiment inputs against their schema.
///
/// Inputs are ordered `&section ... &end` files, or `.json` dictionaries.
/// Every edit is checked against the input schema and the selected
/// algorithm, operator and optimizer implementations.
#[derive(Parser, Debug)]
#[command(name = "chemtool")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Input schema to use instead of the bundled one.
    #[arg(long, global = true)]
    pub schema: Option<PathBuf>,

    /// Pluggable implementation descriptors to use instead of the bundled ones.
    #[arg(long, global = true)]
    pub pluggables: Option<PathBuf>,

    /// Preferences file.
    #[arg(long, global = true, default_value = DEFAULT_PREFERENCES_FILE)]
    pub prefs: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an input from the built-in template.
    New(NewArgs),

    /// Print an input, or a single section of it.
    ///
    /// Substituted properties are highlighted.
    Show(ShowArgs),

    /// List the sections of an input.
    Sections(SectionsArgs),

    /// Set a property.
    ///
    /// Setting `name` on algorithm, operator, optimizer, variational_form or
    /// initial_state switches the implementation and resets its properties.
    Set(SetArgs),

    /// Delete a property.
    Unset(PropertyArgs),

    /// Add a section, or write its defaults over an existing one.
    AddSection(SectionArgs),

    /// Remove a section.
    RemoveSection(SectionArgs),

    /// Reset a section to the defaults of its current implementation.
    Reset(SectionArgs),

    /// Print, replace or clear the text of a text section.
    Text(TextArgs),

    /// List the values a section name or property may take.
    Choices(ChoicesArgs),

    /// Copy tracked properties between sections, e.g. `operator.qubit_mapping`
    /// into `initial_state`.
    Substitute(EditArgs),

    /// Validate an input against the schema.
    Validate(InputArgs),

    /// Write the dictionary form of an input as JSON.
    Export(ExportArgs),

    /// Show or change preferences.
    Prefs(PrefsArgs),
}

/// An input file to read.
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Input file; `.json` selects the dictionary format.
    pub input: PathBuf,
}

/// An input file to edit in place or save elsewhere.
#[derive(Args, Debug)]
pub struct EditArgs {
    /// Input file; `.json` selects the dictionary format.
    pub input: PathBuf,

    /// Save the result here instead of over the input.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the `new` command.
#[derive(Args, Debug)]
pub struct NewArgs {
    /// Where to save the new input.
    pub output: PathBuf,

    /// Overwrite an existing file.
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the `show` command.
#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Only this section.
    pub section: Option<String>,
}

/// Arguments for the `sections` command.
#[derive(Args, Debug)]
pub struct SectionsArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// List the sections the schema provides defaults for instead.
    #[arg(long)]
    pub defaults: bool,
}

/// A section of an input.
#[derive(Args, Debug)]
pub struct SectionArgs {
    #[command(flatten)]
    pub edit: EditArgs,

    /// Section name.
    pub section: String,
}

/// A property of an input section.
#[derive(Args, Debug)]
pub struct PropertyArgs {
    #[command(flatten)]
    pub edit: EditArgs,

    /// Section name.
    pub section: String,

    /// Property name.
    pub property: String,
}

/// Arguments for the `set` command.
#[derive(Args, Debug)]
pub struct SetArgs {
    #[command(flatten)]
    pub target: PropertyArgs,

    /// New value; JSON literals keep their type, anything else is a string.
    pub value: String,
}

/// Arguments for the `text` command.
#[derive(Args, Debug)]
pub struct TextArgs {
    #[command(flatten)]
    pub edit: EditArgs,

    /// Section name.
    pub section: String,

    /// Replace the text with this value.
    #[arg(long, conflicts_with_all = ["file", "clear"])]
    pub set: Option<String>,

    /// Replace the text with the contents of a file.
    #[arg(long, conflicts_with = "clear")]
    pub file: Option<PathBuf>,

    /// Clear the text.
    #[arg(long)]
    pub clear: bool,
}

/// Arguments for the `choices` command.
#[derive(Args, Debug)]
pub struct ChoicesArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Section name.
    pub section: String,

    /// Property name; without it, the implementations the section may select.
    pub property: Option<String>,
}

/// Arguments for the `export` command.
#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// JSON file to write.
    pub output: PathBuf,
}

/// Arguments for the `prefs` command.
#[derive(Args, Debug)]
pub struct PrefsArgs {
    /// Print the JSON schema of the preferences file.
    #[arg(long = "json-schema", id = "print_schema")]
    pub print_schema: bool,

    /// Merge schema defaults into inputs when they are created or loaded.
    #[arg(long)]
    pub populate_defaults: Option<bool>,

    /// Forget the recent files list.
    #[arg(long)]
    pub clear_recent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_set() {
        let cli = Cli::parse_from([
            "chemtool", "set", "h2.txt", "backend", "shots", "2048", "-o", "out.txt",
        ]);
        let Command::Set(args) = cli.command else {
            panic!("expected set");
        };
        assert_eq!(args.target.section, "backend");
        assert_eq!(args.target.property, "shots");
        assert_eq!(args.value, "2048");
        assert_eq!(args.target.edit.output, Some(PathBuf::from("out.txt")));
        assert_eq!(cli.prefs, PathBuf::from(DEFAULT_PREFERENCES_FILE));
    }

    #[test]
    fn test_prefs_flag_is_distinct_from_global_schema() {
        let cli = Cli::parse_from([
            "chemtool", "--schema", "in.json", "prefs", "--populate-defaults", "false",
        ]);
        assert_eq!(cli.schema, Some(PathBuf::from("in.json")));
        let Command::Prefs(args) = cli.command else {
            panic!("expected prefs");
        };
        assert!(!args.print_schema);
        assert_eq!(args.populate_defaults, Some(false));

        let cli = Cli::parse_from(["chemtool", "prefs", "--json-schema"]);
        assert!(cli.schema.is_none());
        let Command::Prefs(args) = cli.command else {
            panic!("expected prefs");
        };
        assert!(args.print_schema);
    }

    #[test]
    fn test_text_flags_conflict() {
        let res = Cli::try_parse_from([
            "chemtool", "text", "h2.txt", "psi4", "--set", "x", "--clear",
        ]);
        assert!(res.is_err());
    }
}
