use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use seedbed_core::{ReferenceHandle, SharedSchema};
use seedbed_plan::{DatasetPlan, FieldPlan, NodePlan, TimeSeriesPlan, parse_time_point};

use crate::dataset::{DatasetGenerator, NodeOptions};
use crate::errors::GenerationError;
use crate::field::{FieldGenerator, FieldValue, PoolProducer, RecyclePolicy};
use crate::params::GenerationParameters;
use crate::patient::PatientGenerator;
use crate::resource::ResourceGenerator;
use crate::time_series::{TimeAxis, TimeSeriesGenerator};

/// Turn a dataset plan into a ready-to-run dataset generator.
pub fn build_dataset(
    plan: &DatasetPlan,
    schema: SharedSchema,
) -> Result<DatasetGenerator, GenerationError> {
    let subjects = &plan.subjects;
    let mut base = PatientGenerator::new(schema.clone(), subjects.count)?
        .with_params(field_params(subjects.count, &subjects.fields, None)?);

    if let Some([min, max]) = &subjects.age_range {
        base = base.with_age_range(min.clone(), max.clone());
    }
    if let Some(organisation) = &subjects.organisation {
        let handle: ReferenceHandle = organisation
            .parse()
            .map_err(|err| GenerationError::InvalidPlan(format!("organisation: {err}")))?;
        base = base.with_organisation(handle);
    }
    if let Some(reference_date) = &subjects.reference_date {
        let date = NaiveDate::parse_from_str(reference_date, "%Y-%m-%d").map_err(|err| {
            GenerationError::InvalidPlan(format!("reference_date '{reference_date}': {err}"))
        })?;
        base = base.with_reference_date(date);
    }

    let mut dataset = DatasetGenerator::new(base);
    if let Some(seed) = plan.seed {
        dataset = dataset.with_seed(seed);
    }

    for node in &plan.nodes {
        let params = field_params(0, &node.fields, node.reference_field.as_deref())?;
        let resource = ResourceGenerator::new(schema.clone(), &node.kind, params)
            .map_err(|err| err.in_node(&node.name))?;
        let options = NodeOptions {
            depends_on: node.depends_on.clone(),
            likelihood: node.likelihood,
            reference_field: node.reference_field.clone(),
        };

        match &node.time_series {
            Some(series) => {
                let generator = time_series(node, series, resource)?;
                dataset.add_node(&node.name, generator, options)?;
            }
            None => dataset.add_node(&node.name, resource, options)?,
        }
        debug!(node = %node.name, kind = %node.kind, "node planned");
    }

    Ok(dataset)
}

fn time_series(
    node: &NodePlan,
    series: &TimeSeriesPlan,
    resource: ResourceGenerator,
) -> Result<TimeSeriesGenerator, GenerationError> {
    let point = |raw: &str| {
        parse_time_point(raw).ok_or_else(|| {
            GenerationError::InvalidPlan(format!(
                "node '{}': '{raw}' is not a date or date-time",
                node.name
            ))
        })
    };
    let start = point(series.start.as_str())?;
    let axis = match (series.count, &series.end) {
        (Some(count), None) => TimeAxis::count(start, count, series.frequency),
        (None, Some(end)) => TimeAxis::range(start, point(end.as_str())?, series.frequency)?,
        _ => {
            return Err(GenerationError::InvalidPlan(format!(
                "node '{}': time series needs exactly one of 'count' and 'end'",
                node.name
            )));
        }
    };
    Ok(TimeSeriesGenerator::new(resource, &series.time_field, axis).with_format(series.format))
}

/// Overrides and producers for the configured fields. `skip` is the field
/// bound to the parent reference, which always wins.
fn field_params(
    count: usize,
    fields: &BTreeMap<String, FieldPlan>,
    skip: Option<&str>,
) -> Result<GenerationParameters, GenerationError> {
    let mut overrides = Vec::new();
    let mut producers = Vec::new();

    for (name, field) in fields {
        if skip == Some(name.as_str()) {
            continue;
        }
        match field {
            FieldPlan::Value { value } => overrides.push(FieldValue::new(name, value.clone())),
            FieldPlan::Sequence { values } => {
                overrides.push(FieldValue::sequence(name, values.iter().cloned()))
            }
            FieldPlan::Choice {
                choices,
                probabilities,
            } => {
                let mut builder = FieldGenerator::builder(name).choices(choices.iter().cloned());
                if let Some(probabilities) = probabilities {
                    builder = builder.probabilities(probabilities.clone());
                }
                producers.push(builder.build()?);
            }
            FieldPlan::Pool { values, cycle } => {
                let policy = if *cycle {
                    RecyclePolicy::Cycle
                } else {
                    RecyclePolicy::Exhaust
                };
                producers.push(FieldGenerator::from_producer(
                    name,
                    PoolProducer::new(values.iter().cloned()).with_policy(policy),
                ));
            }
        }
    }

    Ok(GenerationParameters::new(count, overrides, producers)?)
}
