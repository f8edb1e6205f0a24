//! Core contracts and helpers for seedbed.
//!
//! This crate defines the record model, reference handles, and the two
//! collaborator interfaces the generation engine consumes: a schema provider
//! (required fields, defaults, validation) and a record store (upload).

pub mod catalog;
pub mod clinical;
pub mod error;
pub mod record;
pub mod schema;
pub mod store;

pub use catalog::{FieldSpec, FieldType, RecordSchema, SchemaCatalog};
pub use clinical::SUBJECT_KIND;
pub use error::{Error, Result};
pub use record::{FieldMap, Record, ReferenceHandle};
pub use schema::{SchemaProvider, SharedSchema};
pub use store::{InMemoryStore, RecordStore};

/// Current contract version for schema catalog artifacts.
pub const CATALOG_VERSION: &str = "0.1";
