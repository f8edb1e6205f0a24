use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use seedbed_core::{FieldMap, Record, RecordStore, ReferenceHandle};

use crate::errors::{ConfigError, GenerationError};
use crate::model::{DatasetReport, NodeReport, NodeUpload, UploadReport};
use crate::patient::PatientGenerator;
use crate::resource::{ResourceGenerator, synthetic_id};
use crate::seed::derive_seed;
use crate::time_series::TimeSeriesGenerator;

pub use seedbed_plan::BASE_NODE;

/// Generator that can sit below another node in a dataset graph.
pub trait NodeGenerator: fmt::Debug + Send {
    fn kind(&self) -> &str;

    fn set_seed(&mut self, seed: u64);

    /// The record for the `ordinal`-th upstream handle that passed the
    /// likelihood draw. `forced` carries the reference binding, if any.
    fn generate_linked(
        &mut self,
        ordinal: usize,
        forced: FieldMap,
    ) -> Result<Record, GenerationError>;
}

impl NodeGenerator for ResourceGenerator {
    fn kind(&self) -> &str {
        ResourceGenerator::kind(self)
    }

    fn set_seed(&mut self, seed: u64) {
        ResourceGenerator::set_seed(self, seed);
    }

    fn generate_linked(
        &mut self,
        ordinal: usize,
        forced: FieldMap,
    ) -> Result<Record, GenerationError> {
        self.generate_one(ordinal, forced)
    }
}

/// The `ordinal`-th included handle gets axis point `ordinal`; a node whose
/// axis is shorter than its included handles fails.
impl NodeGenerator for TimeSeriesGenerator {
    fn kind(&self) -> &str {
        TimeSeriesGenerator::kind(self)
    }

    fn set_seed(&mut self, seed: u64) {
        self.generator_mut().set_seed(seed);
    }

    fn generate_linked(
        &mut self,
        ordinal: usize,
        forced: FieldMap,
    ) -> Result<Record, GenerationError> {
        self.generate_point(ordinal, forced)
    }
}

/// Placement of a node in the dataset graph.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOptions {
    pub depends_on: String,
    pub likelihood: f64,
    /// Field bound to the parent's handle. Without one, included handles
    /// only drive the record count.
    pub reference_field: Option<String>,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            depends_on: BASE_NODE.to_string(),
            likelihood: 1.0,
            reference_field: None,
        }
    }
}

impl NodeOptions {
    pub fn depends_on(mut self, parent: impl Into<String>) -> Self {
        self.depends_on = parent.into();
        self
    }

    pub fn likelihood(mut self, likelihood: f64) -> Self {
        self.likelihood = likelihood;
        self
    }

    pub fn reference_field(mut self, field: impl Into<String>) -> Self {
        self.reference_field = Some(field.into());
        self
    }
}

#[derive(Debug)]
struct GraphNode {
    name: String,
    generator: Box<dyn NodeGenerator>,
    options: NodeOptions,
}

/// Wires a subject batch and dependent generators into one dataset.
///
/// Every node has exactly one parent, which must be registered before it,
/// so registration order is a valid processing order.
#[derive(Debug)]
pub struct DatasetGenerator {
    base: PatientGenerator,
    nodes: Vec<GraphNode>,
    seed: Option<u64>,
}

impl DatasetGenerator {
    pub fn new(base: PatientGenerator) -> Self {
        Self {
            base,
            nodes: Vec::new(),
            seed: None,
        }
    }

    /// Seed the whole graph; each node gets a seed derived from its name.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        generator: impl NodeGenerator + 'static,
        options: NodeOptions,
    ) -> Result<(), ConfigError> {
        let name = name.into();
        if name == BASE_NODE {
            return Err(ConfigError::ReservedNodeName(name));
        }
        if self.has_node(&name) {
            return Err(ConfigError::DuplicateNode(name));
        }
        if options.depends_on == name {
            return Err(ConfigError::SelfDependency(name));
        }
        if options.depends_on != BASE_NODE && !self.has_node(&options.depends_on) {
            return Err(ConfigError::UnknownParent {
                node: name,
                parent: options.depends_on,
            });
        }
        if !(0.0..=1.0).contains(&options.likelihood) {
            return Err(ConfigError::InvalidLikelihood {
                node: name,
                likelihood: options.likelihood,
            });
        }

        debug!(
            node = %name,
            kind = %generator.kind(),
            parent = %options.depends_on,
            "node registered"
        );
        self.nodes.push(GraphNode {
            name,
            generator: Box::new(generator),
            options,
        });
        Ok(())
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(BASE_NODE).chain(self.nodes.iter().map(|node| node.name.as_str()))
    }

    fn has_node(&self, name: &str) -> bool {
        self.nodes.iter().any(|node| node.name == name)
    }

    /// Generate every node. Any node failure aborts the whole dataset.
    pub fn generate(&mut self) -> Result<Dataset, GenerationError> {
        let started = Instant::now();
        let mut rng = match self.seed {
            Some(seed) => {
                self.base.set_seed(derive_seed(seed, BASE_NODE));
                for node in &mut self.nodes {
                    node.generator.set_seed(derive_seed(seed, &node.name));
                }
                ChaCha8Rng::seed_from_u64(seed)
            }
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };

        info!(nodes = self.nodes.len() + 1, seed = ?self.seed, "dataset generation started");

        let base_started = Instant::now();
        let (base_records, base_handles) = self
            .base
            .generate_with_references()
            .map_err(|err| err.in_node(BASE_NODE))?;

        let mut reports = vec![NodeReport {
            node: BASE_NODE.to_string(),
            kind: self.base.kind().to_string(),
            depends_on: None,
            likelihood: 1.0,
            upstream: 0,
            included: base_records.len(),
            records: base_records.len(),
            duration_ms: base_started.elapsed().as_millis() as u64,
        }];
        let mut handles: BTreeMap<String, Vec<ReferenceHandle>> = BTreeMap::new();
        handles.insert(BASE_NODE.to_string(), base_handles);
        let mut batches = vec![(BASE_NODE.to_string(), base_records)];

        for node in &mut self.nodes {
            let node_started = Instant::now();
            let upstream =
                handles
                    .get(&node.options.depends_on)
                    .ok_or_else(|| ConfigError::UnknownParent {
                        node: node.name.clone(),
                        parent: node.options.depends_on.clone(),
                    })?;

            let mut records = Vec::new();
            let mut included = 0;
            for handle in upstream {
                if !rng.random_bool(node.options.likelihood) {
                    continue;
                }
                let mut forced = FieldMap::new();
                if let Some(field) = &node.options.reference_field {
                    forced.insert(field.clone(), handle.to_value());
                }
                let mut record = node
                    .generator
                    .generate_linked(included, forced)
                    .map_err(|err| err.in_node(&node.name))?;
                included += 1;
                if record.id.is_none() {
                    record.id = Some(synthetic_id(&mut rng));
                }
                records.push(record);
            }

            let report = NodeReport {
                node: node.name.clone(),
                kind: node.generator.kind().to_string(),
                depends_on: Some(node.options.depends_on.clone()),
                likelihood: node.options.likelihood,
                upstream: upstream.len(),
                included,
                records: records.len(),
                duration_ms: node_started.elapsed().as_millis() as u64,
            };
            info!(
                node = %report.node,
                kind = %report.kind,
                upstream = report.upstream,
                included = report.included,
                records = report.records,
                duration_ms = report.duration_ms,
                "node generated"
            );
            reports.push(report);

            handles.insert(
                node.name.clone(),
                records.iter().filter_map(Record::reference).collect(),
            );
            batches.push((node.name.clone(), records));
        }

        let report = DatasetReport {
            seed: self.seed,
            records_total: batches.iter().map(|(_, records)| records.len()).sum(),
            nodes: reports,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            nodes = report.nodes.len(),
            records = report.records_total,
            duration_ms = report.duration_ms,
            "dataset generated"
        );
        Ok(Dataset {
            nodes: batches,
            report,
        })
    }
}

/// Named record batches in generation order.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    nodes: Vec<(String, Vec<Record>)>,
    report: DatasetReport,
}

impl Dataset {
    pub fn node(&self, name: &str) -> Option<&[Record]> {
        self.nodes
            .iter()
            .find(|(node, _)| node == name)
            .map(|(_, records)| records.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Record])> {
        self.nodes
            .iter()
            .map(|(node, records)| (node.as_str(), records.as_slice()))
    }

    pub fn report(&self) -> &DatasetReport {
        &self.report
    }

    /// Total number of records across nodes.
    pub fn len(&self) -> usize {
        self.report.records_total
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Submit every node to `store` in dataset order. Store errors are
    /// returned unchanged, tagged with the node; nothing is retried.
    pub fn upload(&self, store: &mut dyn RecordStore) -> Result<UploadReport, GenerationError> {
        let mut uploads = Vec::with_capacity(self.nodes.len());
        for (node, records) in &self.nodes {
            let assigned = store
                .upload(node, records)
                .map_err(|source| GenerationError::Store {
                    node: node.clone(),
                    source,
                })?;
            if assigned.len() != records.len() {
                return Err(GenerationError::Store {
                    node: node.clone(),
                    source: seedbed_core::Error::Store(format!(
                        "store assigned {} ids for {} records",
                        assigned.len(),
                        records.len()
                    )),
                });
            }

            let ids = records
                .iter()
                .zip(&assigned)
                .filter_map(|(record, assigned)| {
                    record.id.clone().map(|synthetic| (synthetic, assigned.clone()))
                })
                .collect();
            info!(node = %node, records = records.len(), "node uploaded");
            uploads.push(NodeUpload {
                node: node.clone(),
                uploaded: records.len(),
                ids,
            });
        }

        Ok(UploadReport {
            nodes: uploads,
            references_rewritten: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use seedbed_core::{SchemaCatalog, SharedSchema};

    use super::*;
    use crate::params::GenerationParameters;

    fn schema() -> SharedSchema {
        Arc::new(SchemaCatalog::clinical().expect("clinical catalog"))
    }

    fn conditions() -> ResourceGenerator {
        ResourceGenerator::new(schema(), "Condition", GenerationParameters::with_count(0))
            .expect("condition kind")
    }

    fn dataset() -> DatasetGenerator {
        DatasetGenerator::new(PatientGenerator::new(schema(), 3).expect("patient kind"))
    }

    #[test]
    fn registration_rejects_bad_graph_shapes() {
        let mut generator = dataset();
        generator
            .add_node("conditions", conditions(), NodeOptions::default())
            .expect("first node");

        let err = generator
            .add_node("conditions", conditions(), NodeOptions::default())
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateNode("conditions".to_string()));

        let err = generator
            .add_node("base", conditions(), NodeOptions::default())
            .unwrap_err();
        assert_eq!(err, ConfigError::ReservedNodeName("base".to_string()));

        let err = generator
            .add_node("loop", conditions(), NodeOptions::default().depends_on("loop"))
            .unwrap_err();
        assert_eq!(err, ConfigError::SelfDependency("loop".to_string()));

        let err = generator
            .add_node("orphan", conditions(), NodeOptions::default().depends_on("missing"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownParent { parent, .. } if parent == "missing"));
    }

    #[test]
    fn likelihood_outside_unit_interval_is_rejected() {
        let mut generator = dataset();
        for likelihood in [-0.1, 1.5, f64::NAN] {
            let err = generator
                .add_node("conditions", conditions(), NodeOptions::default().likelihood(likelihood))
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidLikelihood { .. }));
        }
    }

    #[test]
    fn node_names_start_with_base() {
        let mut generator = dataset();
        generator
            .add_node("conditions", conditions(), NodeOptions::default())
            .expect("node");
        assert_eq!(generator.node_names().collect::<Vec<_>>(), vec!["base", "conditions"]);
    }
}
