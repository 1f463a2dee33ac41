//! Configuration data structures and schema handling.
//!
//! This module provides the input document model for quantum chemistry
//! experiments:
//!
//! - Schema lookups parameterized by the selected pluggable implementation
//! - Registry of interchangeable algorithm/operator/optimizer implementations
//! - Ordered section storage with native and JSON serialization
//! - The [`ConfigModel`] façade used by front ends
//!
//! ## Architecture
//!
//! - [`schema`] - Schema catalog and schema errors
//! - [`registry`] - Pluggable implementations by kind
//! - [`property`] - JSON type tags and value checks
//! - [`document`] - Sections and the input document
//! - [`format`] - Native `&section` format and format selection
//! - [`model`] - High-level operations

/// Input document and its sections.
pub mod document;

/// On-disk formats.
pub mod format;

/// Configuration model façade.
pub mod model;

/// JSON type tags and value checks.
pub mod property;

/// Pluggable implementation registry.
pub mod registry;

/// Schema catalog.
pub mod schema;

pub use document::{ConfigDocument, Section, SectionBody};
pub use format::DocumentFormat;
pub use model::ConfigModel;
pub use property::TypeTag;
pub use registry::{DeclaredPluggable, Dependency, PluggableImplementation, PluggableKind, PluggableRegistry};
pub use schema::{SchemaCatalog, SchemaError};
