use std::collections::BTreeSet;
use std::sync::Arc;

use rand::RngCore;
use serde_json::Value;

use crate::error::Result;
use crate::record::{FieldMap, Record};

/// Capability interface the generation engine uses to learn about record kinds.
///
/// Implementations must report an unknown kind as [`crate::Error::UnknownKind`]
/// so callers can tell lookup failures apart from validation failures.
pub trait SchemaProvider {
    /// All record kinds this provider can validate.
    fn kinds(&self) -> Vec<String>;

    fn has_kind(&self, kind: &str) -> bool {
        self.kinds().iter().any(|known| known == kind)
    }

    /// Mandatory fields for `kind`.
    fn required_fields(&self, kind: &str) -> Result<BTreeSet<String>>;

    /// Synthesize a type-appropriate value for `kind.field`.
    fn default_for(&self, kind: &str, field: &str, rng: &mut dyn RngCore) -> Result<Value>;

    /// Validate an assembled field map and turn it into a record.
    fn validate(&self, kind: &str, fields: FieldMap) -> Result<Record>;
}

/// Schema provider shared between generators.
pub type SharedSchema = Arc<dyn SchemaProvider + Send + Sync>;
