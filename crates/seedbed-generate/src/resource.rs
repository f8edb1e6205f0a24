use std::collections::BTreeSet;
use std::fmt;
use std::time::Instant;

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use seedbed_core::{FieldMap, Record, SharedSchema};

use crate::errors::GenerationError;
use crate::params::GenerationParameters;

/// Produces batches of schema-valid records of one kind.
pub struct ResourceGenerator {
    schema: SharedSchema,
    kind: String,
    params: GenerationParameters,
    generate_ids: bool,
    rng: ChaCha8Rng,
}

impl fmt::Debug for ResourceGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGenerator")
            .field("kind", &self.kind)
            .field("params", &self.params)
            .field("generate_ids", &self.generate_ids)
            .finish()
    }
}

impl ResourceGenerator {
    /// Fails with [`GenerationError::UnknownKind`] when the schema does not
    /// know `kind`.
    pub fn new(
        schema: SharedSchema,
        kind: impl Into<String>,
        params: GenerationParameters,
    ) -> Result<Self, GenerationError> {
        let kind = kind.into();
        if !schema.has_kind(&kind) {
            return Err(GenerationError::UnknownKind(kind));
        }
        Ok(Self {
            schema,
            kind,
            params,
            generate_ids: false,
            rng: ChaCha8Rng::from_rng(&mut rand::rng()),
        })
    }

    /// Make generation reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.set_seed(seed);
        self
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Assign a synthetic id to every generated record.
    pub fn with_ids(mut self, generate_ids: bool) -> Self {
        self.generate_ids = generate_ids;
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn schema(&self) -> &SharedSchema {
        &self.schema
    }

    pub fn params(&self) -> &GenerationParameters {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut GenerationParameters {
        &mut self.params
    }

    /// Mandatory fields of this generator's kind.
    pub fn required_fields(&self) -> Result<BTreeSet<String>, GenerationError> {
        self.schema
            .required_fields(&self.kind)
            .map_err(|err| GenerationError::schema(&self.kind, err))
    }

    /// Generate exactly `params.count` records, or nothing.
    pub fn generate(&mut self) -> Result<Vec<Record>, GenerationError> {
        let count = self.params.count();
        let started = Instant::now();
        self.ensure_capacity(count)?;
        let required = self.required_fields()?;

        let mut records = Vec::with_capacity(count);
        for index in 0..count {
            records.push(self.build_record(index, FieldMap::new(), &required)?);
        }

        info!(
            kind = %self.kind,
            records = records.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "batch generated"
        );
        Ok(records)
    }

    /// Build record `index` with `forced` fields winning over any configured
    /// override or producer for the same field.
    pub fn generate_one(
        &mut self,
        index: usize,
        forced: FieldMap,
    ) -> Result<Record, GenerationError> {
        let required = self.required_fields()?;
        self.build_record(index, forced, &required)
    }

    /// Fail fast when a sequence override or a bounded producer cannot serve
    /// `count` records, before any producer state moves. Failures past this
    /// check (schema validation, defaults) still leave producers advanced.
    pub fn ensure_capacity(&self, count: usize) -> Result<(), GenerationError> {
        self.ensure_capacity_except(count, |_| false)
    }

    /// Like [`Self::ensure_capacity`], ignoring fields for which `forced`
    /// returns true since forced values bypass their producers.
    pub fn ensure_capacity_except(
        &self,
        count: usize,
        forced: impl Fn(&str) -> bool,
    ) -> Result<(), GenerationError> {
        let overrides = self
            .params
            .overrides()
            .iter()
            .map(|value| (value.field.as_str(), value.available()));
        let producers = self
            .params
            .producers()
            .iter()
            .map(|producer| (producer.field(), producer.capacity()));

        for (field, available) in overrides.chain(producers) {
            if forced(field) {
                continue;
            }
            if let Some(available) = available
                && available < count
            {
                return Err(GenerationError::InsufficientValues {
                    field: field.to_string(),
                    available,
                    requested: count,
                });
            }
        }
        Ok(())
    }

    fn build_record(
        &mut self,
        index: usize,
        forced: FieldMap,
        required: &BTreeSet<String>,
    ) -> Result<Record, GenerationError> {
        let mut fields = FieldMap::new();

        for value in self.params.overrides() {
            if forced.contains_key(&value.field) {
                continue;
            }
            fields.insert(value.field.clone(), value.value_at(index)?);
        }

        for producer in self.params.producers_mut() {
            if forced.contains_key(producer.field()) {
                continue;
            }
            let value = producer.generate(&mut self.rng)?;
            fields.insert(producer.field().to_string(), value);
        }

        fields.extend(forced);

        for field in required {
            if fields.contains_key(field) {
                continue;
            }
            let value = self
                .schema
                .default_for(&self.kind, field, &mut self.rng)
                .map_err(|err| GenerationError::schema(&self.kind, err))?;
            debug!(kind = %self.kind, field = %field, "schema default applied");
            fields.insert(field.clone(), value);
        }

        let mut record = self
            .schema
            .validate(&self.kind, fields)
            .map_err(|err| GenerationError::schema(&self.kind, err))?;
        if self.generate_ids {
            record.id = Some(synthetic_id(&mut self.rng));
        }
        Ok(record)
    }
}

/// Random UUID drawn from the generator's RNG, so seeded runs repeat.
pub(crate) fn synthetic_id(rng: &mut dyn RngCore) -> String {
    let bytes: [u8; 16] = rng.random();
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string()
}
