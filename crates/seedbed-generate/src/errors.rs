use std::path::PathBuf;

use thiserror::Error;

/// Construction-time configuration errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("field '{0}' is targeted by both an override and a producer")]
    ConflictingField(String),
    #[error("field '{0}' is targeted more than once")]
    DuplicateField(String),
    #[error("field generator for '{0}' sets both choices and a producer")]
    BothModes(String),
    #[error("field generator for '{0}' needs either choices or a producer")]
    NoMode(String),
    #[error("field generator for '{0}' has no choices")]
    EmptyChoices(String),
    #[error("field generator for '{field}' has {probabilities} probabilities for {choices} choices")]
    ProbabilityLength {
        field: String,
        choices: usize,
        probabilities: usize,
    },
    #[error("field generator for '{0}' has a negative or non-finite probability")]
    InvalidProbability(String),
    #[error("probabilities for '{field}' sum to {sum}, expected 1.0")]
    ProbabilitySum { field: String, sum: f64 },
    #[error("likelihood {likelihood} for node '{node}' is outside [0, 1]")]
    InvalidLikelihood { node: String, likelihood: f64 },
    #[error("node '{0}' is already registered")]
    DuplicateNode(String),
    #[error("node name '{0}' is reserved for the root generator")]
    ReservedNodeName(String),
    #[error("node '{node}' depends on unknown node '{parent}'")]
    UnknownParent { node: String, parent: String },
    #[error("node '{0}' cannot depend on itself")]
    SelfDependency(String),
    #[error("invalid time axis: {0}")]
    InvalidTimeAxis(String),
}

/// Errors emitted while generating records.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("unknown record kind: {0}")]
    UnknownKind(String),
    #[error("override for '{field}' has {available} values but {requested} records were requested")]
    InsufficientValues {
        field: String,
        available: usize,
        requested: usize,
    },
    #[error("invalid age range: {0}")]
    InvalidAgeRange(String),
    #[error("producer for '{0}' is exhausted")]
    ProducerExhausted(String),
    #[error("schema error for '{kind}': {source}")]
    Schema {
        kind: String,
        #[source]
        source: seedbed_core::Error,
    },
    #[error("node '{node}' failed: {source}")]
    Node {
        node: String,
        #[source]
        source: Box<GenerationError>,
    },
    #[error("upload of node '{node}' failed: {source}")]
    Store {
        node: String,
        #[source]
        source: seedbed_core::Error,
    },
    #[error("{}:{line}: {reason}", path.display())]
    SequenceFile {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenerationError {
    pub(crate) fn schema(kind: &str, source: seedbed_core::Error) -> Self {
        match source {
            seedbed_core::Error::UnknownKind(kind) => Self::UnknownKind(kind),
            source => Self::Schema {
                kind: kind.to_string(),
                source,
            },
        }
    }

    pub(crate) fn in_node(self, node: &str) -> Self {
        Self::Node {
            node: node.to_string(),
            source: Box::new(self),
        }
    }
}
