use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use fake::Fake;
use fake::faker::name::raw::{FirstName, LastName};
use fake::locales::EN;
use rand::{Rng, RngCore};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::record::{FieldMap, Record, ReferenceHandle};
use crate::schema::SchemaProvider;

const DEFAULT_INT_MAX: i64 = 1000;
const DEFAULT_DECIMAL_MAX: f64 = 1000.0;
const DEFAULT_DAY_SPAN: i64 = 365;

/// Declared type of a record field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    Boolean,
    Integer,
    Decimal,
    String,
    /// String restricted to a value set (empty set accepts any string).
    Code {
        #[serde(default)]
        values: Vec<String>,
    },
    /// `YYYY-MM-DD`.
    Date,
    /// RFC 3339, `YYYY-MM-DDTHH:MM:SS` or a plain date.
    DateTime,
    /// `{"reference": "Kind/id"}`; `targets` restricts the referenced kinds.
    Reference {
        #[serde(default)]
        targets: Vec<String>,
    },
    CodeableConcept,
    Quantity,
    HumanName,
    Object,
    List {
        item: Box<FieldType>,
    },
}

/// Field declaration inside a record schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Schema of one record kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RecordSchema {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<FieldSpec>,
}

impl RecordSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Serializable catalog of record schemas; the stock [`SchemaProvider`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SchemaCatalog {
    /// Contract version of this catalog format.
    pub catalog_version: String,
    pub kinds: Vec<RecordSchema>,
}

impl SchemaCatalog {
    /// Build a catalog, rejecting duplicate kinds and duplicate fields.
    pub fn new(kinds: Vec<RecordSchema>) -> Result<Self> {
        let catalog = Self {
            catalog_version: crate::CATALOG_VERSION.to_string(),
            kinds,
        };
        catalog.check()?;
        Ok(catalog)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let catalog: Self = serde_json::from_str(raw)?;
        catalog.check()?;
        Ok(catalog)
    }

    pub fn schema(&self, kind: &str) -> Result<&RecordSchema> {
        self.kinds
            .iter()
            .find(|schema| schema.kind == kind)
            .ok_or_else(|| Error::UnknownKind(kind.to_string()))
    }

    fn check(&self) -> Result<()> {
        let mut kinds = BTreeSet::new();
        for schema in &self.kinds {
            if !kinds.insert(schema.kind.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate kind: {}",
                    schema.kind
                )));
            }
            let mut fields = BTreeSet::new();
            for field in &schema.fields {
                if !fields.insert(field.name.as_str()) {
                    return Err(Error::InvalidSchema(format!(
                        "duplicate field: {}.{}",
                        schema.kind, field.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl SchemaProvider for SchemaCatalog {
    fn kinds(&self) -> Vec<String> {
        self.kinds.iter().map(|schema| schema.kind.clone()).collect()
    }

    fn has_kind(&self, kind: &str) -> bool {
        self.schema(kind).is_ok()
    }

    fn required_fields(&self, kind: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .schema(kind)?
            .fields
            .iter()
            .filter(|field| field.required)
            .map(|field| field.name.clone())
            .collect())
    }

    fn default_for(&self, kind: &str, field: &str, rng: &mut dyn RngCore) -> Result<Value> {
        let spec = self
            .schema(kind)?
            .field(field)
            .ok_or_else(|| Error::UnknownField {
                kind: kind.to_string(),
                field: field.to_string(),
            })?;
        default_value(kind, &spec.name, &spec.field_type, rng)
    }

    fn validate(&self, kind: &str, fields: FieldMap) -> Result<Record> {
        let schema = self.schema(kind)?;
        let mut validated = FieldMap::new();

        for (name, value) in fields {
            let spec = schema.field(&name).ok_or_else(|| Error::UnknownField {
                kind: kind.to_string(),
                field: name.clone(),
            })?;
            if value.is_null() {
                continue;
            }
            check_value(&spec.field_type, &value)
                .map_err(|reason| Error::invalid(kind, format!("field '{name}': {reason}")))?;
            validated.insert(name, value);
        }

        for spec in schema.fields.iter().filter(|spec| spec.required) {
            if !validated.contains_key(&spec.name) {
                return Err(Error::invalid(
                    kind,
                    format!("missing required field '{}'", spec.name),
                ));
            }
        }

        Ok(Record::new(kind, validated))
    }
}

fn check_value(field_type: &FieldType, value: &Value) -> std::result::Result<(), String> {
    let ok = match field_type {
        FieldType::Boolean => value.is_boolean(),
        FieldType::Integer => value.as_i64().is_some(),
        FieldType::Decimal => value.is_number(),
        FieldType::String => value.is_string(),
        FieldType::Code { values } => match value.as_str() {
            Some(code) if values.is_empty() || values.iter().any(|known| known == code) => true,
            Some(code) => return Err(format!("code '{code}' is not in the value set")),
            None => false,
        },
        FieldType::Date => value.as_str().and_then(parse_date).is_some(),
        FieldType::DateTime => value.as_str().and_then(parse_date_time).is_some(),
        FieldType::Reference { targets } => match ReferenceHandle::from_value(value) {
            Some(handle) if targets.is_empty() || targets.contains(&handle.kind) => true,
            Some(handle) => {
                return Err(format!(
                    "reference to '{}' not allowed (expected one of {})",
                    handle.kind,
                    targets.join(", ")
                ));
            }
            None => false,
        },
        FieldType::CodeableConcept => {
            value.get("coding").is_some_and(Value::is_array)
                || value.get("text").is_some_and(Value::is_string)
        }
        FieldType::Quantity => value.get("value").is_some_and(Value::is_number),
        FieldType::HumanName => {
            value.get("family").is_some_and(Value::is_string)
                || value.get("given").is_some_and(Value::is_array)
                || value.get("text").is_some_and(Value::is_string)
        }
        FieldType::Object => value.is_object(),
        FieldType::List { item } => match value.as_array() {
            Some(items) => {
                for entry in items {
                    check_value(item, entry)?;
                }
                true
            }
            None => false,
        },
    };

    if ok {
        Ok(())
    } else {
        Err(format!("expected {}", type_label(field_type)))
    }
}

fn type_label(field_type: &FieldType) -> &'static str {
    match field_type {
        FieldType::Boolean => "boolean",
        FieldType::Integer => "integer",
        FieldType::Decimal => "decimal",
        FieldType::String => "string",
        FieldType::Code { .. } => "code",
        FieldType::Date => "date",
        FieldType::DateTime => "date_time",
        FieldType::Reference { .. } => "reference",
        FieldType::CodeableConcept => "codeable_concept",
        FieldType::Quantity => "quantity",
        FieldType::HumanName => "human_name",
        FieldType::Object => "object",
        FieldType::List { .. } => "list",
    }
}

fn default_value(
    kind: &str,
    field: &str,
    field_type: &FieldType,
    rng: &mut dyn RngCore,
) -> Result<Value> {
    let base_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
    let value = match field_type {
        FieldType::Boolean => json!(rng.random_bool(0.5)),
        FieldType::Integer => json!(rng.random_range(0..=DEFAULT_INT_MAX)),
        FieldType::Decimal => {
            let raw: f64 = rng.random_range(0.0..DEFAULT_DECIMAL_MAX);
            json!((raw * 100.0).round() / 100.0)
        }
        FieldType::String => json!(format!("{field}_{:08x}", rng.random::<u32>())),
        FieldType::Code { values } => {
            if values.is_empty() {
                return Err(Error::NoDefault {
                    kind: kind.to_string(),
                    field: field.to_string(),
                });
            }
            let index = rng.random_range(0..values.len());
            json!(values[index])
        }
        FieldType::Date => {
            let offset = rng.random_range(0..=DEFAULT_DAY_SPAN);
            let date = base_date + chrono::Duration::days(offset);
            json!(date.format("%Y-%m-%d").to_string())
        }
        FieldType::DateTime => {
            let offset = rng.random_range(0..=DEFAULT_DAY_SPAN);
            let seconds = rng.random_range(0..86_400_u32);
            let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0).unwrap_or_default();
            let stamp = NaiveDateTime::new(base_date + chrono::Duration::days(offset), time);
            json!(stamp.format("%Y-%m-%dT%H:%M:%S").to_string())
        }
        FieldType::Reference { .. } => {
            return Err(Error::NoDefault {
                kind: kind.to_string(),
                field: field.to_string(),
            });
        }
        FieldType::CodeableConcept => json!({
            "coding": [{
                "system": "urn:seedbed:generated",
                "code": format!("{:06}", rng.random_range(0..1_000_000)),
            }],
            "text": field,
        }),
        FieldType::Quantity => {
            let raw: f64 = rng.random_range(0.0..DEFAULT_DECIMAL_MAX);
            json!({ "value": (raw * 100.0).round() / 100.0, "unit": "1" })
        }
        FieldType::HumanName => fake_name(rng),
        FieldType::Object => json!({}),
        FieldType::List { item } => json!([default_value(kind, field, item, rng)?]),
    };
    Ok(value)
}

fn fake_name(mut rng: &mut dyn RngCore) -> Value {
    let given: String = FirstName(EN).fake_with_rng(&mut rng);
    let family: String = LastName(EN).fake_with_rng(&mut rng);
    json!({ "family": family, "given": [given] })
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn parse_date_time(value: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.naive_utc())
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| parse_date(value).map(|date| date.and_time(NaiveTime::MIN)))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new(vec![RecordSchema {
            kind: "Observation".to_string(),
            description: None,
            fields: vec![
                FieldSpec::new(
                    "status",
                    FieldType::Code {
                        values: vec!["final".to_string(), "preliminary".to_string()],
                    },
                )
                .required(),
                FieldSpec::new("code", FieldType::CodeableConcept).required(),
                FieldSpec::new(
                    "subject",
                    FieldType::Reference {
                        targets: vec!["Patient".to_string()],
                    },
                ),
                FieldSpec::new("effectiveDateTime", FieldType::DateTime),
            ],
        }])
        .expect("valid catalog")
    }

    fn fields(value: Value) -> FieldMap {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn validate_accepts_well_typed_record() {
        let record = catalog()
            .validate(
                "Observation",
                fields(json!({
                    "status": "final",
                    "code": {"text": "Body temperature"},
                    "subject": {"reference": "Patient/1"},
                    "effectiveDateTime": "2021-01-01",
                })),
            )
            .expect("record should validate");
        assert_eq!(record.kind, "Observation");
        assert_eq!(record.get("status"), Some(&json!("final")));
    }

    #[test]
    fn validate_rejects_unknown_field() {
        let err = catalog()
            .validate(
                "Observation",
                fields(json!({"status": "final", "code": {"text": "x"}, "hello": 1})),
            )
            .unwrap_err();
        assert!(matches!(err, Error::UnknownField { .. }));
    }

    #[test]
    fn validate_rejects_missing_required_and_bad_types() {
        let catalog = catalog();
        let missing = catalog
            .validate("Observation", fields(json!({"status": "final"})))
            .unwrap_err();
        assert!(matches!(missing, Error::InvalidRecord { .. }));

        let wrong_code = catalog
            .validate(
                "Observation",
                fields(json!({"status": "done", "code": {"text": "x"}})),
            )
            .unwrap_err();
        assert!(wrong_code.to_string().contains("value set"));

        let wrong_target = catalog
            .validate(
                "Observation",
                fields(json!({
                    "status": "final",
                    "code": {"text": "x"},
                    "subject": {"reference": "Organization/1"},
                })),
            )
            .unwrap_err();
        assert!(wrong_target.to_string().contains("Organization"));
    }

    #[test]
    fn unknown_kind_is_a_lookup_error() {
        let err = catalog().required_fields("Nope").unwrap_err();
        assert!(matches!(err, Error::UnknownKind(kind) if kind == "Nope"));
    }

    #[test]
    fn defaults_satisfy_their_own_types() {
        let catalog = catalog();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut map = FieldMap::new();
        for field in catalog.required_fields("Observation").expect("kind exists") {
            let value = catalog
                .default_for("Observation", &field, &mut rng)
                .expect("default exists");
            map.insert(field, value);
        }
        catalog
            .validate("Observation", map)
            .expect("defaults should validate");
    }

    #[test]
    fn name_defaults_follow_the_seed() {
        let catalog = SchemaCatalog::new(vec![RecordSchema {
            kind: "Practitioner".to_string(),
            description: None,
            fields: vec![FieldSpec::new("name", FieldType::HumanName).required()],
        }])
        .expect("valid catalog");

        let draw = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            catalog
                .default_for("Practitioner", "name", &mut rng)
                .expect("default exists")
        };
        let name = draw(21);
        assert_eq!(name, draw(21));
        assert!(name["family"].as_str().is_some_and(|family| !family.is_empty()));
        assert_eq!(name["given"].as_array().map(Vec::len), Some(1));

        let mut map = FieldMap::new();
        map.insert("name".to_string(), name);
        catalog
            .validate("Practitioner", map)
            .expect("generated name should validate");
    }

    #[test]
    fn references_have_no_default() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = catalog()
            .default_for("Observation", "subject", &mut rng)
            .unwrap_err();
        assert!(matches!(err, Error::NoDefault { .. }));
    }

    #[test]
    fn duplicate_kinds_are_rejected() {
        let schema = RecordSchema {
            kind: "Patient".to_string(),
            description: None,
            fields: Vec::new(),
        };
        let err = SchemaCatalog::new(vec![schema.clone(), schema]).unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
    }

    #[test]
    fn catalog_loads_from_json() {
        let raw = r#"{
            "catalog_version": "0.1",
            "kinds": [{
                "kind": "Device",
                "fields": [
                    {"name": "serial", "type": "string", "required": true},
                    {"name": "tags", "type": "list", "item": {"type": "code", "values": ["a"]}}
                ]
            }]
        }"#;
        let catalog = SchemaCatalog::from_json(raw).expect("parse catalog");
        let tags = catalog
            .schema("Device")
            .ok()
            .and_then(|schema| schema.field("tags"))
            .expect("tags field");
        assert_eq!(
            tags.field_type,
            FieldType::List {
                item: Box::new(FieldType::Code {
                    values: vec!["a".to_string()]
                })
            }
        );
    }
}
