use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use seedbed_core::{SchemaCatalog, SharedSchema};
use seedbed_generate::{
    FieldValue, Frequency, GenerationError, GenerationParameters, ResourceGenerator, TimeAxis,
    TimeSeriesGenerator, TimestampFormat,
};
use serde_json::json;

fn schema() -> SharedSchema {
    Arc::new(SchemaCatalog::clinical().expect("clinical catalog"))
}

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .expect("valid date")
        .and_time(NaiveTime::MIN)
}

fn observations(params: GenerationParameters) -> ResourceGenerator {
    ResourceGenerator::new(schema(), "Observation", params)
        .expect("observation kind")
        .with_seed(6)
}

#[test]
fn daily_range_stamps_each_day() {
    let axis = TimeAxis::range(at(2021, 1, 1), at(2021, 1, 5), Frequency::Daily).expect("axis");
    let mut generator = TimeSeriesGenerator::new(
        observations(GenerationParameters::default()),
        "effectiveDateTime",
        axis,
    )
    .with_format(TimestampFormat::Date);

    let records = generator.generate().expect("series");
    let stamps: Vec<_> = records
        .iter()
        .map(|record| record.get("effectiveDateTime").cloned())
        .collect();
    assert_eq!(
        stamps,
        ["2021-01-01", "2021-01-02", "2021-01-03", "2021-01-04", "2021-01-05"]
            .into_iter()
            .map(|date| Some(json!(date)))
            .collect::<Vec<_>>()
    );
}

#[test]
fn time_field_wins_over_configured_override() {
    let params = GenerationParameters::builder()
        .value(FieldValue::new("effectiveDateTime", "1999-12-31T00:00:00"))
        .build()
        .expect("params");
    let mut generator = TimeSeriesGenerator::new(
        observations(params),
        "effectiveDateTime",
        TimeAxis::count(at(2021, 3, 1), 2, Frequency::Monthly),
    );

    let records = generator.generate().expect("series");
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[1].get("effectiveDateTime"),
        Some(&json!("2021-04-01T00:00:00"))
    );
}

#[test]
fn sequence_overrides_pair_with_points() {
    let params = GenerationParameters::builder()
        .value(FieldValue::sequence("valueString", ["low", "mid", "high"]))
        .build()
        .expect("params");
    let axis = TimeAxis::count(at(2021, 1, 1), 3, Frequency::Yearly);
    let mut generator = TimeSeriesGenerator::new(observations(params), "effectiveDateTime", axis);

    let records = generator.generate().expect("series");
    let values: Vec<_> = records
        .iter()
        .map(|record| record.get("valueString").cloned())
        .collect();
    assert_eq!(
        values,
        vec![Some(json!("low")), Some(json!("mid")), Some(json!("high"))]
    );

    let axis = TimeAxis::count(at(2021, 1, 1), 4, Frequency::Yearly);
    let params = GenerationParameters::builder()
        .value(FieldValue::sequence("valueString", ["low", "mid", "high"]))
        .build()
        .expect("params");
    let mut generator = TimeSeriesGenerator::new(observations(params), "effectiveDateTime", axis);
    let err = generator.generate().unwrap_err();
    assert!(matches!(err, GenerationError::InsufficientValues { .. }));
}

#[test]
fn timestamps_render_in_the_chosen_format() {
    let generator = TimeSeriesGenerator::new(
        observations(GenerationParameters::default()),
        "effectiveDateTime",
        TimeAxis::count(at(2021, 1, 1), 2, Frequency::Hourly),
    );
    assert_eq!(
        generator.timestamps().expect("timestamps"),
        vec!["2021-01-01T00:00:00", "2021-01-01T01:00:00"]
    );
}
