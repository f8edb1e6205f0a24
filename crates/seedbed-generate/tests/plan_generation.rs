use std::path::{Path, PathBuf};
use std::sync::Arc;

use seedbed_core::{Record, SchemaCatalog};
use seedbed_generate::{DirectoryStore, build_dataset};
use seedbed_plan::{load_plan_value, plan_json_schema_value, validate_plan};
use serde_json::json;

fn example_plan() -> seedbed_plan::DatasetPlan {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../plans/examples/covid.plan.json");
    let plan_json = load_plan_value(&path).expect("load plan");
    let plan_schema = plan_json_schema_value().expect("plan schema");
    let catalog = SchemaCatalog::clinical().expect("clinical catalog");
    validate_plan(&plan_json, &plan_schema, &catalog)
        .expect("valid plan")
        .plan
}

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("seedbed_plan_run_{}", uuid::Uuid::new_v4()))
}

#[test]
fn example_plan_generates_every_node() {
    let plan = example_plan();
    let schema = Arc::new(SchemaCatalog::clinical().expect("clinical catalog"));
    let mut generator = build_dataset(&plan, schema).expect("dataset generator");
    assert_eq!(
        generator.node_names().collect::<Vec<_>>(),
        vec![
            "base",
            "conditions",
            "vaccinations",
            "temperature",
            "encounters",
            "encounter_vitals"
        ]
    );

    let dataset = generator.generate().expect("dataset");
    let count = |node: &str| dataset.node(node).map(<[Record]>::len).expect("node batch");
    assert_eq!(count("base"), 25);
    assert!(count("conditions") <= 25);
    assert!(count("vaccinations") <= 25);
    assert!(count("temperature") <= 25);
    assert_eq!(count("encounters"), 25);
    assert!(count("encounter_vitals") <= 25);
    assert_eq!(dataset.report().records_total, dataset.len());
    assert_eq!(dataset.report().seed, Some(42));

    let organisation = json!({"reference": "Organization/seedbed-clinic"});
    for patient in dataset.node("base").expect("base") {
        assert_eq!(patient.get("managingOrganization"), Some(&organisation));
    }
    for vitals in dataset.node("encounter_vitals").expect("vitals") {
        assert!(vitals.get("encounter").is_some());
    }
}

#[test]
fn example_plan_is_reproducible() {
    let plan = example_plan();
    let run = || {
        let schema = Arc::new(SchemaCatalog::clinical().expect("clinical catalog"));
        build_dataset(&plan, schema)
            .expect("dataset generator")
            .generate()
            .expect("dataset")
    };
    let first = run();
    let second = run();
    assert_eq!(
        first.iter().collect::<Vec<_>>(),
        second.iter().collect::<Vec<_>>()
    );
}

#[test]
fn generated_dataset_uploads_to_a_directory() {
    let plan = example_plan();
    let schema = Arc::new(SchemaCatalog::clinical().expect("clinical catalog"));
    let dataset = build_dataset(&plan, schema)
        .expect("dataset generator")
        .generate()
        .expect("dataset");

    let root = temp_dir();
    let mut store = DirectoryStore::new(&root);
    let report = dataset.upload(&mut store).expect("upload");
    assert_eq!(report.uploaded(), dataset.len());
    assert!(store.bytes_written() > 0);

    for (node, records) in dataset.iter() {
        let raw = std::fs::read_to_string(store.node_path(node)).expect("node file");
        let written: Vec<Record> = serde_json::from_str(&raw).expect("records");
        assert_eq!(written.len(), records.len());
        for (original, stored) in records.iter().zip(&written) {
            let synthetic = original.id.as_deref().expect("synthetic id");
            assert_eq!(report.assigned_id(node, synthetic), stored.id.as_deref());
        }
    }

    let _ = std::fs::remove_dir_all(&root);
}
