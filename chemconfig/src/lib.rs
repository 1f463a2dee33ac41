//! # chemconfig
//!
//! Schema-driven configuration model for quantum chemistry experiment inputs.
//!
//! An input is an ordered list of named sections. Each section holds either
//! free text (a molecule specification, say) or typed properties checked
//! against a JSON schema. Pluggable sections such as `algorithm` pick an
//! implementation through their `name` property, and the implementation
//! decides which properties and defaults apply.
//!
//! ## Features
//!
//! - Default properties that follow the selected implementation
//! - Algorithm and operator choices filtered by the selected problem
//! - Type, `enum` and additional-property checks on every edit
//! - Whole-document validation with JSON Schema
//! - Native `&section ... &end` and JSON file formats
//! - Modified tracking against the last save
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chemconfig::data::ConfigModel;
//! use serde_json::json;
//!
//! let mut model = ConfigModel::builtin().unwrap();
//! model.new_document().unwrap();
//! model
//!     .set_section_property("algorithm", "name", json!("ExactEigensolver"))
//!     .unwrap();
//! model.save(std::path::Path::new("h2.txt")).unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`data`] - Schema, registry, document and model
//! - [`prefs`] - User preferences
//! - [`error`] - Error types

#[macro_use]
extern crate log;

/// Configuration data structures and schema handling.
pub mod data;

/// Error types.
pub mod error;

/// User preferences.
pub mod prefs;

pub use error::{ConfigError, Result};
pub use serde_json::Value;
