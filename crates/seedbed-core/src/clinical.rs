//! Built-in catalog of clinical record kinds.
//!
//! The field sets are a pragmatic subset of their FHIR R4 counterparts: enough
//! to exercise references, codes and time fields without modelling every
//! FHIR element.

use crate::catalog::{FieldSpec, FieldType, RecordSchema, SchemaCatalog};
use crate::error::Result;

/// Record kind used for subjects.
pub const SUBJECT_KIND: &str = "Patient";

impl SchemaCatalog {
    /// Catalog with Patient, Organization, Condition, Observation,
    /// Immunization, Encounter and MolecularSequence.
    pub fn clinical() -> Result<Self> {
        SchemaCatalog::new(vec![
            patient(),
            organization(),
            condition(),
            observation(),
            immunization(),
            encounter(),
            molecular_sequence(),
        ])
    }
}

fn code(values: &[&str]) -> FieldType {
    FieldType::Code {
        values: values.iter().map(|value| value.to_string()).collect(),
    }
}

fn reference(targets: &[&str]) -> FieldType {
    FieldType::Reference {
        targets: targets.iter().map(|value| value.to_string()).collect(),
    }
}

fn list(item: FieldType) -> FieldType {
    FieldType::List {
        item: Box::new(item),
    }
}

fn schema(kind: &str, description: &str, fields: Vec<FieldSpec>) -> RecordSchema {
    RecordSchema {
        kind: kind.to_string(),
        description: Some(description.to_string()),
        fields,
    }
}

fn patient() -> RecordSchema {
    schema(
        SUBJECT_KIND,
        "Demographics of a person receiving care",
        vec![
            FieldSpec::new("active", FieldType::Boolean),
            FieldSpec::new("name", list(FieldType::HumanName)),
            FieldSpec::new("gender", code(&["male", "female", "other", "unknown"])),
            FieldSpec::new("birthDate", FieldType::Date),
            FieldSpec::new("deceasedBoolean", FieldType::Boolean),
            FieldSpec::new("telecom", list(FieldType::Object)),
            FieldSpec::new("address", list(FieldType::Object)),
            FieldSpec::new("managingOrganization", reference(&["Organization"])),
        ],
    )
}

fn organization() -> RecordSchema {
    schema(
        "Organization",
        "A formally recognised grouping of people",
        vec![
            FieldSpec::new("active", FieldType::Boolean),
            FieldSpec::new("name", FieldType::String).required(),
            FieldSpec::new("type", list(FieldType::CodeableConcept)),
        ],
    )
}

fn condition() -> RecordSchema {
    schema(
        "Condition",
        "A clinical condition, problem or diagnosis",
        vec![
            FieldSpec::new("clinicalStatus", FieldType::CodeableConcept),
            FieldSpec::new("verificationStatus", FieldType::CodeableConcept),
            FieldSpec::new("code", FieldType::CodeableConcept),
            FieldSpec::new("subject", reference(&["Patient"])).required(),
            FieldSpec::new("encounter", reference(&["Encounter"])),
            FieldSpec::new("onsetDateTime", FieldType::DateTime),
            FieldSpec::new("recordedDate", FieldType::DateTime),
            FieldSpec::new("note", list(FieldType::Object)),
        ],
    )
}

fn observation() -> RecordSchema {
    schema(
        "Observation",
        "Measurements and simple assertions about a subject",
        vec![
            FieldSpec::new(
                "status",
                code(&[
                    "registered",
                    "preliminary",
                    "final",
                    "amended",
                    "corrected",
                    "cancelled",
                    "entered-in-error",
                    "unknown",
                ]),
            )
            .required(),
            FieldSpec::new("category", list(FieldType::CodeableConcept)),
            FieldSpec::new("code", FieldType::CodeableConcept).required(),
            FieldSpec::new("subject", reference(&["Patient"])),
            FieldSpec::new("encounter", reference(&["Encounter"])),
            FieldSpec::new("effectiveDateTime", FieldType::DateTime),
            FieldSpec::new("valueQuantity", FieldType::Quantity),
            FieldSpec::new("valueString", FieldType::String),
        ],
    )
}

fn immunization() -> RecordSchema {
    schema(
        "Immunization",
        "Administration of a vaccine to a patient",
        vec![
            FieldSpec::new("status", code(&["completed", "entered-in-error", "not-done"]))
                .required(),
            FieldSpec::new("vaccineCode", FieldType::CodeableConcept).required(),
            FieldSpec::new("patient", reference(&["Patient"])).required(),
            FieldSpec::new("occurrenceDateTime", FieldType::DateTime).required(),
            FieldSpec::new("lotNumber", FieldType::String),
            FieldSpec::new("primarySource", FieldType::Boolean),
        ],
    )
}

fn encounter() -> RecordSchema {
    schema(
        "Encounter",
        "An interaction between a patient and a provider",
        vec![
            FieldSpec::new(
                "status",
                code(&[
                    "planned",
                    "arrived",
                    "triaged",
                    "in-progress",
                    "onleave",
                    "finished",
                    "cancelled",
                    "entered-in-error",
                    "unknown",
                ]),
            )
            .required(),
            FieldSpec::new("class", FieldType::Object).required(),
            FieldSpec::new("subject", reference(&["Patient"])),
            FieldSpec::new("serviceProvider", reference(&["Organization"])),
            FieldSpec::new("period", FieldType::Object),
        ],
    )
}

fn molecular_sequence() -> RecordSchema {
    schema(
        "MolecularSequence",
        "Raw sequence data and its variants",
        vec![
            FieldSpec::new("coordinateSystem", FieldType::Integer).required(),
            FieldSpec::new("patient", reference(&["Patient"])),
            FieldSpec::new("observedSeq", FieldType::String),
            FieldSpec::new("variant", list(FieldType::Object)),
        ],
    )
}
