use std::path::Path;

use serde_json::Value;

use crate::errors::{PlanError, Result};

/// On-disk plan encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Json,
    Toml,
}

impl PlanFormat {
    /// Pick the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            _ => Err(PlanError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Parse a plan document into JSON, whatever its encoding.
pub fn parse_plan_str(raw: &str, format: PlanFormat) -> Result<Value> {
    match format {
        PlanFormat::Json => Ok(serde_json::from_str(raw)?),
        PlanFormat::Toml => Ok(toml::from_str(raw)?),
    }
}

pub fn load_plan_value(path: &Path) -> Result<Value> {
    let format = PlanFormat::from_path(path)?;
    let raw = std::fs::read_to_string(path)?;
    parse_plan_str(&raw, format)
}
