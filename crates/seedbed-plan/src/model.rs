use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Plan contract version understood by this crate.
pub const PLAN_VERSION: &str = "0.1";

/// Name of the implicit root node.
pub const BASE_NODE: &str = "base";

/// Declarative description of a dataset: a subject batch plus dependent
/// nodes, each linked to exactly one parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DatasetPlan {
    /// Plan contract version.
    pub plan_version: String,
    /// Seed for deterministic generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Root subject batch.
    pub subjects: SubjectPlan,
    /// Dependent nodes, in processing order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodePlan>,
}

/// Configuration of the subject batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SubjectPlan {
    /// Number of subjects.
    pub count: usize,
    /// Inclusive age bounds in years.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_range: Option<[Value; 2]>,
    /// Organisation reference (ex.: `Organization/acme`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organisation: Option<String>,
    /// Date ages are measured against (`YYYY-MM-DD`). Defaults to today.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_date: Option<String>,
    /// Extra field configuration.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldPlan>,
}

/// A node generating records of one kind below a parent node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NodePlan {
    /// Unique node name.
    pub name: String,
    /// Record kind produced by the node.
    pub kind: String,
    /// Parent node; `base` for the subject batch.
    #[serde(default = "default_parent")]
    pub depends_on: String,
    /// Probability that a parent record gets a linked record.
    #[serde(default = "default_likelihood")]
    pub likelihood: f64,
    /// Field bound to the parent's reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_field: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldPlan>,
    /// Repeat the node along a time axis for every linked parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_series: Option<TimeSeriesPlan>,
}

fn default_parent() -> String {
    BASE_NODE.to_string()
}

fn default_likelihood() -> f64 {
    1.0
}

/// How one field gets its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldPlan {
    /// Same value for every record.
    Value { value: Value },
    /// One value per record, in order.
    Sequence { values: Vec<Value> },
    /// Random choice, uniform unless probabilities are given.
    Choice {
        choices: Vec<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        probabilities: Option<Vec<f64>>,
    },
    /// Values handed out in order; fails when exhausted unless `cycle`.
    Pool {
        values: Vec<Value>,
        #[serde(default)]
        cycle: bool,
    },
}

/// Time axis of a time-series node. Exactly one of `count` and `end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TimeSeriesPlan {
    /// Field stamped with each point.
    pub time_field: String,
    /// First point (`YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS`).
    pub start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Last point, inclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    pub frequency: Frequency,
    #[serde(default)]
    pub format: TimestampFormat,
}

/// Step between two points of a time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// Rendering of time-axis points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// `YYYY-MM-DD`
    Date,
    /// `YYYY-MM-DDTHH:MM:SS`
    #[default]
    DateTime,
}
