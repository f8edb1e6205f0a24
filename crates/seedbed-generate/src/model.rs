use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Summary of one generated node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub node: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
    pub likelihood: f64,
    /// Handles offered by the parent node.
    pub upstream: usize,
    /// Handles that passed the likelihood draw.
    pub included: usize,
    pub records: usize,
    pub duration_ms: u64,
}

/// Report for a dataset generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub nodes: Vec<NodeReport>,
    pub records_total: usize,
    pub duration_ms: u64,
}

impl DatasetReport {
    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|report| report.node == name)
    }
}

/// Ids a store assigned to one node's records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUpload {
    pub node: String,
    pub uploaded: usize,
    /// Synthetic id -> store-assigned id.
    pub ids: BTreeMap<String, String>,
}

/// Outcome of handing a dataset to a store.
///
/// References inside uploaded records still carry synthetic ids;
/// `references_rewritten` stays false until a caller reconciles them using
/// `ids`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReport {
    pub nodes: Vec<NodeUpload>,
    pub references_rewritten: bool,
}

impl UploadReport {
    pub fn assigned_id(&self, node: &str, synthetic: &str) -> Option<&str> {
        self.nodes
            .iter()
            .find(|upload| upload.node == node)
            .and_then(|upload| upload.ids.get(synthetic))
            .map(String::as_str)
    }

    pub fn uploaded(&self) -> usize {
        self.nodes.iter().map(|upload| upload.uploaded).sum()
    }
}
