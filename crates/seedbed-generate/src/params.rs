use std::collections::BTreeSet;

use crate::errors::ConfigError;
use crate::field::{FieldGenerator, FieldValue};

/// Validated bundle of overrides and producers with a target record count.
///
/// Every field has at most one source: override names are unique, producer
/// names are unique, and no field appears in both sets.
#[derive(Debug, Default)]
pub struct GenerationParameters {
    count: usize,
    overrides: Vec<FieldValue>,
    producers: Vec<FieldGenerator>,
}

impl GenerationParameters {
    pub fn new(
        count: usize,
        overrides: Vec<FieldValue>,
        producers: Vec<FieldGenerator>,
    ) -> Result<Self, ConfigError> {
        let mut override_fields = BTreeSet::new();
        for value in &overrides {
            if !override_fields.insert(value.field.as_str()) {
                return Err(ConfigError::DuplicateField(value.field.clone()));
            }
        }

        let mut producer_fields = BTreeSet::new();
        for producer in &producers {
            if !producer_fields.insert(producer.field()) {
                return Err(ConfigError::DuplicateField(producer.field().to_string()));
            }
        }

        if let Some(field) = override_fields.intersection(&producer_fields).next() {
            return Err(ConfigError::ConflictingField(field.to_string()));
        }

        Ok(Self {
            count,
            overrides,
            producers,
        })
    }

    pub fn builder() -> GenerationParametersBuilder {
        GenerationParametersBuilder::default()
    }

    /// Parameters with a count and no field configuration.
    pub fn with_count(count: usize) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn set_count(&mut self, count: usize) {
        self.count = count;
    }

    pub fn overrides(&self) -> &[FieldValue] {
        &self.overrides
    }

    pub fn producers(&self) -> &[FieldGenerator] {
        &self.producers
    }

    pub(crate) fn producers_mut(&mut self) -> &mut [FieldGenerator] {
        &mut self.producers
    }

    /// True when an override or producer already targets `field`.
    pub fn targets(&self, field: &str) -> bool {
        self.overrides.iter().any(|value| value.field == field)
            || self.producers.iter().any(|producer| producer.field() == field)
    }

    /// All targeted field names.
    pub fn targeted_fields(&self) -> BTreeSet<&str> {
        self.overrides
            .iter()
            .map(|value| value.field.as_str())
            .chain(self.producers.iter().map(FieldGenerator::field))
            .collect()
    }

    /// Add a producer for a field nothing targets yet.
    pub fn push_producer(&mut self, producer: FieldGenerator) -> Result<(), ConfigError> {
        if self.targets(producer.field()) {
            return Err(self.conflict(producer.field()));
        }
        self.producers.push(producer);
        Ok(())
    }

    /// Add an override for a field nothing targets yet.
    pub fn push_override(&mut self, value: FieldValue) -> Result<(), ConfigError> {
        if self.targets(&value.field) {
            return Err(self.conflict(&value.field));
        }
        self.overrides.push(value);
        Ok(())
    }

    fn conflict(&self, field: &str) -> ConfigError {
        if self.overrides.iter().any(|value| value.field == field) {
            ConfigError::ConflictingField(field.to_string())
        } else {
            ConfigError::DuplicateField(field.to_string())
        }
    }
}

/// Incremental construction of [`GenerationParameters`]; validation happens
/// in `build`.
#[derive(Debug, Default)]
pub struct GenerationParametersBuilder {
    count: usize,
    overrides: Vec<FieldValue>,
    producers: Vec<FieldGenerator>,
}

impl GenerationParametersBuilder {
    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn value(mut self, value: FieldValue) -> Self {
        self.overrides.push(value);
        self
    }

    pub fn producer(mut self, producer: FieldGenerator) -> Self {
        self.producers.push(producer);
        self
    }

    pub fn build(self) -> Result<GenerationParameters, ConfigError> {
        GenerationParameters::new(self.count, self.overrides, self.producers)
    }
}
