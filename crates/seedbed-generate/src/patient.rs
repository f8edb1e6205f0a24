use std::time::Instant;

use chrono::{Duration, Months, NaiveDate, Utc};
use fake::Fake;
use fake::faker::name::raw::{FirstName, LastName};
use fake::locales::EN;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{Value, json};
use tracing::info;

use seedbed_core::{FieldMap, Record, ReferenceHandle, SUBJECT_KIND, SharedSchema};

use crate::errors::GenerationError;
use crate::field::FieldGenerator;
use crate::params::GenerationParameters;
use crate::resource::{ResourceGenerator, synthetic_id};
use crate::seed::derive_seed;

const GENDERS: [&str; 4] = ["male", "female", "other", "unknown"];
const DEFAULT_MIN_AGE: u64 = 0;
const DEFAULT_MAX_AGE: u64 = 90;
const MAX_SUPPORTED_AGE: u64 = 150;

/// Generator for subject records (`Patient`) with demographic sampling.
///
/// The age range is checked when generating, not when configuring, so a
/// generator with malformed bounds can be built and only fails on use.
#[derive(Debug)]
pub struct PatientGenerator {
    resource: ResourceGenerator,
    count: usize,
    age_range: Option<(Value, Value)>,
    organisation: Option<ReferenceHandle>,
    generate_ids: bool,
    reference_date: NaiveDate,
    builtins: Vec<FieldGenerator>,
    rng: ChaCha8Rng,
}

impl PatientGenerator {
    pub fn new(schema: SharedSchema, count: usize) -> Result<Self, GenerationError> {
        let resource =
            ResourceGenerator::new(schema, SUBJECT_KIND, GenerationParameters::with_count(count))?;
        Ok(Self {
            resource,
            count,
            age_range: None,
            organisation: None,
            generate_ids: false,
            reference_date: Utc::now().date_naive(),
            builtins: vec![
                FieldGenerator::choices("gender", GENDERS)?,
                FieldGenerator::from_rng_fn("name", human_name),
                FieldGenerator::from_fn("active", || json!(true)),
            ],
            rng: ChaCha8Rng::from_rng(&mut rand::rng()),
        })
    }

    /// Inclusive age bounds in years. Bounds are checked by `generate`.
    pub fn with_age_range(mut self, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        self.age_range = Some((min.into(), max.into()));
        self
    }

    /// Link every subject to `organisation` through `managingOrganization`.
    pub fn with_organisation(mut self, organisation: ReferenceHandle) -> Self {
        self.organisation = Some(organisation);
        self
    }

    pub fn with_ids(mut self, generate_ids: bool) -> Self {
        self.generate_ids = generate_ids;
        self
    }

    /// Date ages are measured against; defaults to today (UTC).
    pub fn with_reference_date(mut self, reference_date: NaiveDate) -> Self {
        self.reference_date = reference_date;
        self
    }

    /// Extra overrides and producers. They win over the built-in
    /// demographic fields; the record count stays the generator's own.
    pub fn with_params(mut self, mut params: GenerationParameters) -> Self {
        params.set_count(self.count);
        *self.resource.params_mut() = params;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.set_seed(seed);
        self
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.resource.set_seed(derive_seed(seed, "fields"));
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn kind(&self) -> &str {
        self.resource.kind()
    }

    pub fn generate(&mut self) -> Result<Vec<Record>, GenerationError> {
        self.run(self.generate_ids)
    }

    /// Records plus one handle per record, in the same order. Ids are
    /// always assigned on this path.
    pub fn generate_with_references(
        &mut self,
    ) -> Result<(Vec<Record>, Vec<ReferenceHandle>), GenerationError> {
        let records = self.run(true)?;
        let handles = records.iter().filter_map(Record::reference).collect();
        Ok((records, handles))
    }

    fn run(&mut self, assign_ids: bool) -> Result<Vec<Record>, GenerationError> {
        let started = Instant::now();
        let (min_age, max_age) = self.age_bounds()?;
        let birth_window = birth_window(self.reference_date, min_age, max_age)?;
        self.resource.ensure_capacity(self.count)?;

        let mut records = Vec::with_capacity(self.count);
        for index in 0..self.count {
            let demographics = self.demographics(birth_window)?;
            let mut record = self.resource.generate_one(index, demographics)?;
            if assign_ids {
                record.id = Some(synthetic_id(&mut self.rng));
            }
            records.push(record);
        }

        info!(
            kind = SUBJECT_KIND,
            records = records.len(),
            min_age,
            max_age,
            duration_ms = started.elapsed().as_millis() as u64,
            "subjects generated"
        );
        Ok(records)
    }

    fn age_bounds(&self) -> Result<(u64, u64), GenerationError> {
        let Some((min, max)) = &self.age_range else {
            return Ok((DEFAULT_MIN_AGE, DEFAULT_MAX_AGE));
        };
        let (Some(min_age), Some(max_age)) = (min.as_u64(), max.as_u64()) else {
            return Err(GenerationError::InvalidAgeRange(format!(
                "bounds must be non-negative integers, got {min} and {max}"
            )));
        };
        if min_age > max_age {
            return Err(GenerationError::InvalidAgeRange(format!(
                "minimum {min_age} is greater than maximum {max_age}"
            )));
        }
        if max_age > MAX_SUPPORTED_AGE {
            return Err(GenerationError::InvalidAgeRange(format!(
                "maximum {max_age} exceeds {MAX_SUPPORTED_AGE}"
            )));
        }
        Ok((min_age, max_age))
    }

    /// Built-in fields for one record, minus anything the caller targets.
    fn demographics(
        &mut self,
        (earliest, latest): (NaiveDate, NaiveDate),
    ) -> Result<FieldMap, GenerationError> {
        let params = self.resource.params();
        let mut fields = FieldMap::new();

        for builtin in &mut self.builtins {
            if params.targets(builtin.field()) {
                continue;
            }
            let value = builtin.generate(&mut self.rng)?;
            fields.insert(builtin.field().to_string(), value);
        }

        if !params.targets("birthDate") {
            let span = (latest - earliest).num_days();
            let birth = earliest + Duration::days(self.rng.random_range(0..=span));
            fields.insert(
                "birthDate".to_string(),
                json!(birth.format("%Y-%m-%d").to_string()),
            );
        }

        if let Some(organisation) = &self.organisation
            && !params.targets("managingOrganization")
        {
            fields.insert("managingOrganization".to_string(), organisation.to_value());
        }

        Ok(fields)
    }
}

/// Inclusive birth date bounds giving an age in `[min_age, max_age]` at
/// `reference`.
fn birth_window(
    reference: NaiveDate,
    min_age: u64,
    max_age: u64,
) -> Result<(NaiveDate, NaiveDate), GenerationError> {
    let out_of_calendar =
        || GenerationError::InvalidAgeRange("range reaches outside the calendar".to_string());
    let latest = reference
        .checked_sub_months(Months::new(min_age as u32 * 12))
        .ok_or_else(out_of_calendar)?;
    let earliest = reference
        .checked_sub_months(Months::new((max_age as u32 + 1) * 12))
        .and_then(|date| date.succ_opt())
        .ok_or_else(out_of_calendar)?;
    Ok((earliest, latest))
}

fn human_name(mut rng: &mut dyn RngCore) -> Value {
    let given: String = FirstName(EN).fake_with_rng(&mut rng);
    let family: String = LastName(EN).fake_with_rng(&mut rng);
    json!([{
        "use": "official",
        "given": [given],
        "family": family,
    }])
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use seedbed_core::SchemaCatalog;

    use super::*;

    fn schema() -> SharedSchema {
        Arc::new(SchemaCatalog::clinical().expect("clinical catalog"))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn birth_window_covers_exact_age_bounds() {
        let reference = date(2024, 6, 15);
        let (earliest, latest) = birth_window(reference, 18, 60).expect("window");
        assert_eq!(reference.years_since(latest), Some(18));
        assert_eq!(reference.years_since(earliest), Some(60));
        assert_eq!(reference.years_since(earliest.pred_opt().expect("pred")), Some(61));
        assert_eq!(reference.years_since(latest.succ_opt().expect("succ")), Some(17));
    }

    #[test]
    fn reversed_age_range_fails_on_generate() {
        let mut generator = PatientGenerator::new(schema(), 3)
            .expect("patient kind")
            .with_age_range(60, 18);
        let err = generator.generate().unwrap_err();
        assert!(matches!(err, GenerationError::InvalidAgeRange(_)));
    }

    #[test]
    fn user_override_beats_builtin_gender() {
        let params = GenerationParameters::builder()
            .value(crate::field::FieldValue::new("gender", "female"))
            .build()
            .expect("params");
        let mut generator = PatientGenerator::new(schema(), 20)
            .expect("patient kind")
            .with_params(params)
            .with_seed(4);
        let records = generator.generate().expect("patients");
        assert_eq!(records.len(), 20);
        assert!(
            records
                .iter()
                .all(|record| record.get("gender") == Some(&json!("female")))
        );
    }

    #[test]
    fn organisation_is_linked_on_every_subject() {
        let organisation = ReferenceHandle::new("Organization", "org-1");
        let mut generator = PatientGenerator::new(schema(), 5)
            .expect("patient kind")
            .with_organisation(organisation.clone())
            .with_seed(1);
        let records = generator.generate().expect("patients");
        for record in &records {
            assert_eq!(
                record.get("managingOrganization"),
                Some(&organisation.to_value())
            );
            assert!(record.id.is_none());
        }
    }

    #[test]
    fn references_point_at_their_records() {
        let mut generator = PatientGenerator::new(schema(), 4)
            .expect("patient kind")
            .with_seed(2);
        let (records, handles) = generator.generate_with_references().expect("patients");
        assert_eq!(records.len(), handles.len());
        for (record, handle) in records.iter().zip(&handles) {
            assert_eq!(handle.kind, "Patient");
            assert_eq!(record.id.as_deref(), Some(handle.id.as_str()));
        }
    }
}
