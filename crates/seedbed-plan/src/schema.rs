use schemars::schema::RootSchema;
use schemars::schema_for;
use serde_json::Value;

use crate::errors::Result;
use crate::model::DatasetPlan;

/// Emit the JSON Schema for dataset plans.
pub fn plan_json_schema() -> RootSchema {
    schema_for!(DatasetPlan)
}

pub fn plan_json_schema_value() -> Result<Value> {
    Ok(serde_json::to_value(plan_json_schema())?)
}
