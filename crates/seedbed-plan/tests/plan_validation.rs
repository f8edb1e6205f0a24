use std::path::Path;

use seedbed_core::SchemaCatalog;
use seedbed_plan::{
    DatasetPlan, load_plan_value, plan_json_schema_value, validate_plan,
    validate_plan_against_catalog, validate_plan_json,
};
use serde_json::json;

fn catalog() -> SchemaCatalog {
    SchemaCatalog::clinical().expect("clinical catalog")
}

#[test]
fn example_plan_validates_against_schema_and_catalog() {
    let plan_path =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../plans/examples/covid.plan.json");
    let plan_json = load_plan_value(&plan_path).expect("load plan");
    let plan_schema = plan_json_schema_value().expect("plan schema");

    let structural = validate_plan_json(&plan_json, &plan_schema).expect("compile schema");
    assert!(structural.errors.is_empty(), "structural errors: {:?}", structural.errors);

    let validated =
        validate_plan(&plan_json, &plan_schema, &catalog()).expect("plan validation should succeed");
    assert!(validated.warnings.is_empty(), "unexpected warnings: {:?}", validated.warnings);
    assert_eq!(validated.plan.nodes.len(), 5);
    assert_eq!(validated.plan.seed, Some(42));
}

#[test]
fn structural_errors_stop_before_catalog_checks() {
    let plan_schema = plan_json_schema_value().expect("plan schema");
    let plan_json = json!({
        "plan_version": "0.1",
        "nodes": [],
        "surprise": true
    });
    let report = validate_plan(&plan_json, &plan_schema, &catalog()).unwrap_err();
    assert!(!report.is_ok());
    assert!(report.errors.iter().all(|issue| issue.code == "schema_violation"));
}

#[test]
fn graph_errors_are_reported_per_node() {
    let plan: DatasetPlan = serde_json::from_value(json!({
        "plan_version": "0.1",
        "subjects": {"count": 3},
        "nodes": [
            {"name": "conditions", "kind": "Condition", "reference_field": "subject"},
            {"name": "conditions", "kind": "Condition", "reference_field": "subject"},
            {"name": "orphans", "kind": "Observation", "depends_on": "nowhere", "reference_field": "subject"},
            {"name": "risky", "kind": "Observation", "likelihood": 1.5, "reference_field": "subject"},
            {"name": "mystery", "kind": "jsdkasdh"},
            {"name": "base", "kind": "Observation", "reference_field": "subject"}
        ]
    }))
    .expect("plan model");

    let report = validate_plan_against_catalog(&plan, &catalog());
    assert_eq!(
        report.error_codes(),
        vec![
            "node_duplicate",
            "node_unknown_parent",
            "likelihood_out_of_range",
            "kind_unknown",
            "node_name_reserved",
        ]
    );
}

#[test]
fn node_names_outside_the_file_safe_charset_are_rejected() {
    let plan: DatasetPlan = serde_json::from_value(json!({
        "plan_version": "0.1",
        "subjects": {"count": 2},
        "nodes": [
            {"name": "lab results", "kind": "Observation", "reference_field": "subject"},
            {"name": "../conditions", "kind": "Condition", "reference_field": "subject"},
            {"name": "vitals-2_a", "kind": "Observation", "reference_field": "subject"}
        ]
    }))
    .expect("plan model");

    let report = validate_plan_against_catalog(&plan, &catalog());
    assert_eq!(report.error_codes(), vec!["node_name_invalid", "node_name_invalid"]);
    assert_eq!(report.errors[0].path, "/nodes/0/name");
    assert_eq!(report.errors[1].path, "/nodes/1/name");
    assert!(report.errors[0].hint.is_some());
}

#[test]
fn field_and_time_series_errors_are_reported() {
    let plan: DatasetPlan = serde_json::from_value(json!({
        "plan_version": "0.1",
        "subjects": {
            "count": 3,
            "age_range": ["a", "b"],
            "fields": {
                "gender": {"type": "sequence", "values": ["male"]},
                "shoeSize": {"type": "value", "value": 42}
            }
        },
        "nodes": [
            {
                "name": "temperature",
                "kind": "Observation",
                "reference_field": "subject",
                "fields": {
                    "status": {"type": "choice", "choices": ["final", "amended"], "probabilities": [0.5, 0.6]}
                },
                "time_series": {
                    "time_field": "effectiveDateTime",
                    "start": "2021-01-05",
                    "end": "2021-01-01",
                    "frequency": "daily"
                }
            }
        ]
    }))
    .expect("plan model");

    let report = validate_plan_against_catalog(&plan, &catalog());
    assert_eq!(
        report.error_codes(),
        vec![
            "age_range_not_integer",
            "sequence_too_short",
            "field_unknown",
            "probability_sum",
            "time_range_reversed",
        ]
    );
}

#[test]
fn toml_example_plan_validates() {
    let plan_path =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../plans/examples/minimal.plan.toml");
    let plan_json = load_plan_value(&plan_path).expect("load plan");
    let plan_schema = plan_json_schema_value().expect("plan schema");

    let validated =
        validate_plan(&plan_json, &plan_schema, &catalog()).expect("plan validation should succeed");
    let plan: &DatasetPlan = &validated.plan;
    assert_eq!(plan.seed, Some(7));
    assert_eq!(plan.subjects.count, 10);
    assert_eq!(plan.nodes[0].depends_on, "base");
    let series = plan.nodes[0].time_series.as_ref().expect("time series");
    assert_eq!(series.count, Some(10));
}
