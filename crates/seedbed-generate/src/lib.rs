//! Synthetic record generation engine.
//!
//! Field overrides and value producers configure a [`ResourceGenerator`];
//! [`PatientGenerator`] adds subject demographics, [`TimeSeriesGenerator`]
//! repeats a generator along a time axis, [`MolecularSequenceGenerator`]
//! reads sequence files, and [`DatasetGenerator`] wires them into one
//! cross-referenced [`Dataset`].

pub mod dataset;
pub mod errors;
pub mod field;
pub mod model;
pub mod molecular_sequence;
pub mod output;
pub mod params;
pub mod patient;
pub mod planner;
pub mod resource;
mod seed;
pub mod time_series;

pub use dataset::{BASE_NODE, Dataset, DatasetGenerator, NodeGenerator, NodeOptions};
pub use errors::{ConfigError, GenerationError};
pub use field::{
    FieldGenerator, FieldGeneratorBuilder, FieldValue, FnProducer, OverrideValue,
    PROBABILITY_TOLERANCE, PoolProducer, ProducerContext, RecyclePolicy, ValueProducer,
};
pub use model::{DatasetReport, NodeReport, NodeUpload, UploadReport};
pub use molecular_sequence::{MolecularSequenceGenerator, SequenceLine};
pub use output::{DirectoryStore, write_json_atomic};
pub use params::{GenerationParameters, GenerationParametersBuilder};
pub use patient::PatientGenerator;
pub use planner::build_dataset;
pub use resource::ResourceGenerator;
pub use time_series::{Frequency, TimeAxis, TimeSeriesGenerator, TimestampFormat};
