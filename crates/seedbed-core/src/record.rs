use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::Error;

/// Field name to value map assembled for a single record.
pub type FieldMap = Map<String, Value>;

/// A schema-validated output unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record kind (schema identifier).
    pub kind: String,
    /// Synthetic or store-assigned identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Validated field values.
    #[serde(flatten)]
    pub fields: FieldMap,
}

impl Record {
    pub fn new(kind: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Handle pointing at this record, when it carries an id.
    pub fn reference(&self) -> Option<ReferenceHandle> {
        self.id
            .as_ref()
            .map(|id| ReferenceHandle::new(self.kind.clone(), id.clone()))
    }
}

/// Lightweight pointer to a record, usable before or after persistence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceHandle {
    pub kind: String,
    pub id: String,
}

impl ReferenceHandle {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Render the handle as a field value (`{"reference": "Kind/id"}`).
    pub fn to_value(&self) -> Value {
        json!({ "reference": self.to_string() })
    }

    /// Parse a handle back out of a reference field value.
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .get("reference")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse().ok())
    }
}

impl fmt::Display for ReferenceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

impl FromStr for ReferenceHandle {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.split_once('/') {
            Some((kind, id)) if !kind.is_empty() && !id.is_empty() => Ok(Self::new(kind, id)),
            _ => Err(Error::InvalidSchema(format!(
                "reference '{raw}' must look like 'Kind/id'"
            ))),
        }
    }
}
