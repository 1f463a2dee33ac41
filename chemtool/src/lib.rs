//! # chemtool
//!
//! Command-line editor for quantum chemistry experiment inputs.
//!
//! `chemtool` wraps the [`chemconfig`] model: every command loads an input
//! file, applies one schema-checked operation and writes the file back.
//!
//! ## Features
//!
//! - **New inputs** from the built-in template, with defaults filled in
//! - **Property edits** checked against the schema and the selected implementation
//! - **Implementation switching** that resets a section to the new defaults
//! - **Choices** for algorithms and operators filtered by the problem
//! - **Validation** and JSON **export**
//! - **Preferences** stored as TOML, with a printable JSON schema
//!
//! ## Modules
//!
//! - [`cli`] - Command-line arguments
//! - [`commands`] - Command handlers
//! - [`utils`] - Value parsing and output formatting
//!
//! ## Example
//!
//! ```text
//! chemtool new h2.txt
//! chemtool set h2.txt algorithm name ExactEigensolver
//! chemtool choices h2.txt algorithm
//! chemtool show h2.txt algorithm
//! ```

/// Command-line arguments.
pub mod cli;

/// Command handlers.
///
/// Load an input, apply one operation through the configuration model and
/// save the result.
pub mod commands;

/// Common utilities and helper functions.
pub mod utils;

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;
