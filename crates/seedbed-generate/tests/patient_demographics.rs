use std::sync::Arc;

use chrono::NaiveDate;
use seedbed_core::{ReferenceHandle, SchemaCatalog, SchemaProvider, SharedSchema};
use seedbed_generate::{GenerationError, PatientGenerator};

fn catalog() -> Arc<SchemaCatalog> {
    Arc::new(SchemaCatalog::clinical().expect("clinical catalog"))
}

fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 2, 29).expect("leap day")
}

#[test]
fn ages_stay_within_the_inclusive_range() {
    let catalog = catalog();
    let schema: SharedSchema = catalog.clone();
    let mut generator = PatientGenerator::new(schema, 200)
        .expect("patient kind")
        .with_age_range(18, 60)
        .with_reference_date(reference_date())
        .with_seed(12);

    let records = generator.generate().expect("patients");
    assert_eq!(records.len(), 200);
    for record in &records {
        let birth = record
            .get("birthDate")
            .and_then(|value| value.as_str())
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
            .expect("birth date");
        let age = reference_date().years_since(birth).expect("born before reference");
        assert!((18..=60).contains(&age), "age {age} out of range");
        assert!(record.get("gender").is_some());
        assert!(record.get("name").is_some());
        catalog
            .validate("Patient", record.fields.clone())
            .expect("schema-valid patient");
    }
}

#[test]
fn non_numeric_age_range_fails_at_generation_not_construction() {
    let mut generator = PatientGenerator::new(catalog(), 10)
        .expect("construction accepts any bounds")
        .with_age_range("a", "b");
    let err = generator.generate().unwrap_err();
    assert!(matches!(err, GenerationError::InvalidAgeRange(_)));
}

#[test]
fn references_are_unique_and_ordered() {
    let mut generator = PatientGenerator::new(catalog(), 50)
        .expect("patient kind")
        .with_organisation(ReferenceHandle::new("Organization", "clinic"))
        .with_seed(3);
    let (records, handles) = generator.generate_with_references().expect("patients");
    assert_eq!(handles.len(), 50);
    let distinct: std::collections::BTreeSet<_> = handles.iter().collect();
    assert_eq!(distinct.len(), 50);
    for (record, handle) in records.iter().zip(&handles) {
        assert_eq!(record.reference().as_ref(), Some(handle));
    }
}

#[test]
fn ids_are_opt_in_for_plain_generation() {
    let mut generator = PatientGenerator::new(catalog(), 2)
        .expect("patient kind")
        .with_ids(true)
        .with_seed(8);
    let records = generator.generate().expect("patients");
    assert!(records.iter().all(|record| record.id.is_some()));
}
