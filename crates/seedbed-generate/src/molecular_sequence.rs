use std::path::{Path, PathBuf};
use std::time::Instant;

use serde_json::{Value, json};
use tracing::{debug, info};

use seedbed_core::{FieldMap, Record, SharedSchema};

use crate::errors::GenerationError;
use crate::params::GenerationParameters;
use crate::resource::ResourceGenerator;

const SEQUENCE_KIND: &str = "MolecularSequence";

/// One line of a sequence file: `<label> <observed sequence> [<allele>...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceLine {
    pub label: String,
    pub observed: String,
    pub alleles: Vec<String>,
}

impl SequenceLine {
    fn fields(&self) -> FieldMap {
        let variants: Vec<Value> = self
            .alleles
            .iter()
            .map(|allele| json!({ "observedAllele": allele }))
            .collect();
        let mut fields = FieldMap::new();
        fields.insert("coordinateSystem".to_string(), json!(0));
        fields.insert("observedSeq".to_string(), json!(self.observed));
        fields.insert("variant".to_string(), Value::Array(variants));
        fields
    }
}

/// Builds one `MolecularSequence` record per line of whitespace-separated
/// sequence files. Blank lines are skipped.
#[derive(Debug)]
pub struct MolecularSequenceGenerator {
    resource: ResourceGenerator,
    sequences: Vec<SequenceLine>,
}

impl MolecularSequenceGenerator {
    pub fn from_files<P: AsRef<Path>>(
        schema: SharedSchema,
        paths: impl IntoIterator<Item = P>,
    ) -> Result<Self, GenerationError> {
        let mut sequences = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let raw = std::fs::read_to_string(path)?;
            let parsed = parse_sequences(path, &raw)?;
            debug!(path = %path.display(), sequences = parsed.len(), "sequence file loaded");
            sequences.extend(parsed);
        }
        Self::from_sequences(schema, sequences)
    }

    pub fn from_sequences(
        schema: SharedSchema,
        sequences: Vec<SequenceLine>,
    ) -> Result<Self, GenerationError> {
        let params = GenerationParameters::with_count(sequences.len());
        let resource = ResourceGenerator::new(schema, SEQUENCE_KIND, params)?;
        Ok(Self {
            resource,
            sequences,
        })
    }

    /// Extra overrides and producers, ex.: a `patient` reference per
    /// sequence. Sequence columns always win; the count stays one record
    /// per line.
    pub fn with_params(mut self, mut params: GenerationParameters) -> Self {
        params.set_count(self.sequences.len());
        *self.resource.params_mut() = params;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.resource.set_seed(seed);
        self
    }

    pub fn with_ids(mut self, generate_ids: bool) -> Self {
        self.resource = self.resource.with_ids(generate_ids);
        self
    }

    pub fn count(&self) -> usize {
        self.sequences.len()
    }

    pub fn sequences(&self) -> &[SequenceLine] {
        &self.sequences
    }

    pub fn generate(&mut self) -> Result<Vec<Record>, GenerationError> {
        let started = Instant::now();
        let count = self.sequences.len();
        self.resource
            .ensure_capacity_except(count, is_sequence_field)?;

        let mut records = Vec::with_capacity(count);
        for (index, line) in self.sequences.iter().enumerate() {
            records.push(self.resource.generate_one(index, line.fields())?);
        }

        info!(
            kind = SEQUENCE_KIND,
            records = records.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "sequences generated"
        );
        Ok(records)
    }
}

fn is_sequence_field(field: &str) -> bool {
    matches!(field, "coordinateSystem" | "observedSeq" | "variant")
}

fn parse_sequences(path: &Path, raw: &str) -> Result<Vec<SequenceLine>, GenerationError> {
    let mut sequences = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        let mut columns = line.split_whitespace();
        let Some(label) = columns.next() else {
            continue;
        };
        let Some(observed) = columns.next() else {
            return Err(GenerationError::SequenceFile {
                path: PathBuf::from(path),
                line: index + 1,
                reason: format!("'{label}' has no observed sequence"),
            });
        };
        sequences.push(SequenceLine {
            label: label.to_string(),
            observed: observed.to_string(),
            alleles: columns.map(str::to_string).collect(),
        });
    }
    Ok(sequences)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_split_into_label_sequence_and_alleles() {
        let raw = "seq1 ACGT A T\n\n  seq2\tGGCC  \n";
        let parsed = parse_sequences(Path::new("inline"), raw).expect("parse");
        assert_eq!(
            parsed,
            vec![
                SequenceLine {
                    label: "seq1".to_string(),
                    observed: "ACGT".to_string(),
                    alleles: vec!["A".to_string(), "T".to_string()],
                },
                SequenceLine {
                    label: "seq2".to_string(),
                    observed: "GGCC".to_string(),
                    alleles: Vec::new(),
                },
            ]
        );
    }

    #[test]
    fn line_without_sequence_is_rejected_with_its_position() {
        let err = parse_sequences(Path::new("inline"), "seq1 ACGT\nlonely\n").unwrap_err();
        assert!(matches!(err, GenerationError::SequenceFile { line: 2, .. }));
    }
}
