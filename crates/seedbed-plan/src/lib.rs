//! Declarative dataset plans: serde model, JSON Schema emission, loading
//! from JSON or TOML, and structural plus catalog-aware validation.

pub mod errors;
pub mod load;
pub mod model;
pub mod schema;
pub mod validate;

pub use errors::{IssueSeverity, PlanError, Result, ValidationIssue, ValidationReport};
pub use load::{PlanFormat, load_plan_value, parse_plan_str};
pub use model::{
    BASE_NODE, DatasetPlan, FieldPlan, Frequency, NodePlan, PLAN_VERSION, SubjectPlan,
    TimeSeriesPlan, TimestampFormat,
};
pub use schema::{plan_json_schema, plan_json_schema_value};
pub use validate::{
    ValidatedPlan, parse_time_point, validate_plan, validate_plan_against_catalog,
    validate_plan_json,
};
