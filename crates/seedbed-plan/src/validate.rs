use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use jsonschema::JSONSchema;
use serde_json::Value;

use seedbed_core::{ReferenceHandle, SUBJECT_KIND, SchemaCatalog};

use crate::errors::{IssueSeverity, PlanError, ValidationIssue, ValidationReport};
use crate::model::{BASE_NODE, DatasetPlan, FieldPlan, NodePlan, PLAN_VERSION, TimeSeriesPlan};

const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Validated plan with accumulated warnings.
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    pub plan: DatasetPlan,
    pub warnings: Vec<ValidationIssue>,
}

/// Parse a time-axis point: `YYYY-MM-DDTHH:MM:SS` or a bare date at midnight.
pub fn parse_time_point(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// Validate a plan JSON document against the plan JSON Schema.
pub fn validate_plan_json(
    plan_json: &Value,
    plan_schema: &Value,
) -> Result<ValidationReport, PlanError> {
    let compiled =
        JSONSchema::compile(plan_schema).map_err(|err| PlanError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();

    if let Err(errors) = compiled.validate(plan_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "schema_violation",
                path,
                error.to_string(),
                None,
            ));
        }
    }

    Ok(report)
}

/// Check a parsed plan against a schema catalog.
pub fn validate_plan_against_catalog(plan: &DatasetPlan, catalog: &SchemaCatalog) -> ValidationReport {
    let mut report = ValidationReport::default();

    if plan.plan_version != PLAN_VERSION {
        report.push_error(
            ValidationIssue::error(
                "plan_version_unsupported",
                "/plan_version",
                format!(
                    "plan_version '{}' is not supported (expected '{PLAN_VERSION}')",
                    plan.plan_version
                ),
            )
            .with_hint(format!("set plan_version to '{PLAN_VERSION}'")),
        );
    }

    validate_subjects(plan, catalog, &mut report);
    validate_nodes(plan, catalog, &mut report);

    report
}

/// Validate the plan end-to-end, returning structured issues on failure.
pub fn validate_plan(
    plan_json: &Value,
    plan_schema: &Value,
    catalog: &SchemaCatalog,
) -> Result<ValidatedPlan, ValidationReport> {
    let structural = match validate_plan_json(plan_json, plan_schema) {
        Ok(report) => report,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push_error(ValidationIssue::error(
                "schema_validation_error",
                "/",
                err.to_string(),
            ));
            return Err(report);
        }
    };

    if !structural.is_ok() {
        return Err(structural);
    }

    let plan: DatasetPlan = match serde_json::from_value(plan_json.clone()) {
        Ok(plan) => plan,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push_error(ValidationIssue::error("invalid_plan_json", "/", err.to_string()));
            return Err(report);
        }
    };

    let semantic = validate_plan_against_catalog(&plan, catalog);
    if !semantic.is_ok() {
        return Err(semantic);
    }

    Ok(ValidatedPlan {
        plan,
        warnings: semantic.warnings,
    })
}

fn validate_subjects(plan: &DatasetPlan, catalog: &SchemaCatalog, report: &mut ValidationReport) {
    let subjects = &plan.subjects;

    if let Some([min, max]) = &subjects.age_range {
        match (min.as_u64(), max.as_u64()) {
            (Some(min_age), Some(max_age)) if min_age > max_age => {
                report.push_error(ValidationIssue::error(
                    "age_range_reversed",
                    "/subjects/age_range",
                    format!("minimum age {min_age} is greater than maximum {max_age}"),
                ));
            }
            (Some(_), Some(_)) => {}
            _ => {
                report.push_error(
                    ValidationIssue::error(
                        "age_range_not_integer",
                        "/subjects/age_range",
                        format!("age bounds must be non-negative integers, got {min} and {max}"),
                    )
                    .with_hint("use whole years, ex.: [18, 60]"),
                );
            }
        }
    }

    if let Some(organisation) = &subjects.organisation {
        match organisation.parse::<ReferenceHandle>() {
            Ok(handle) if handle.kind == "Organization" => {}
            Ok(handle) => report.push_error(ValidationIssue::error(
                "organisation_kind",
                "/subjects/organisation",
                format!("organisation must reference an Organization, not '{}'", handle.kind),
            )),
            Err(err) => report.push_error(ValidationIssue::error(
                "organisation_reference",
                "/subjects/organisation",
                err.to_string(),
            )),
        }
    }

    if let Some(reference_date) = &subjects.reference_date
        && NaiveDate::parse_from_str(reference_date, "%Y-%m-%d").is_err()
    {
        report.push_error(ValidationIssue::error(
            "reference_date_invalid",
            "/subjects/reference_date",
            format!("'{reference_date}' is not a YYYY-MM-DD date"),
        ));
    }

    validate_fields(
        SUBJECT_KIND,
        &subjects.fields,
        Some(subjects.count),
        "/subjects/fields",
        catalog,
        report,
    );
}

fn validate_nodes(plan: &DatasetPlan, catalog: &SchemaCatalog, report: &mut ValidationReport) {
    let mut seen: HashSet<&str> = HashSet::new();

    for (idx, node) in plan.nodes.iter().enumerate() {
        let base_path = format!("/nodes/{idx}");

        if node.name == BASE_NODE {
            report.push_error(
                ValidationIssue::error(
                    "node_name_reserved",
                    format!("{base_path}/name"),
                    format!("node name '{BASE_NODE}' is reserved for the subject batch"),
                )
                .with_hint("pick another node name"),
            );
        } else if !seen.insert(node.name.as_str()) {
            report.push_error(ValidationIssue::error(
                "node_duplicate",
                format!("{base_path}/name"),
                format!("node '{}' is declared more than once", node.name),
            ));
        }

        if !is_valid_node_name(&node.name) {
            report.push_error(
                ValidationIssue::error(
                    "node_name_invalid",
                    format!("{base_path}/name"),
                    format!("node name '{}' is not usable as a record file name", node.name),
                )
                .with_hint("use only ASCII letters, digits, '_' and '-'"),
            );
        }

        if node.name != BASE_NODE && node.depends_on == node.name {
            report.push_error(ValidationIssue::error(
                "node_self_dependency",
                format!("{base_path}/depends_on"),
                format!("node '{}' depends on itself", node.name),
            ));
        } else if node.depends_on != BASE_NODE && !seen.contains(node.depends_on.as_str()) {
            report.push_error(
                ValidationIssue::error(
                    "node_unknown_parent",
                    format!("{base_path}/depends_on"),
                    format!(
                        "node '{}' depends on '{}', which is not declared before it",
                        node.name, node.depends_on
                    ),
                )
                .with_hint("declare parent nodes before their children"),
            );
        }

        if !(0.0..=1.0).contains(&node.likelihood) {
            report.push_error(ValidationIssue::error(
                "likelihood_out_of_range",
                format!("{base_path}/likelihood"),
                format!("likelihood {} is outside [0, 1]", node.likelihood),
            ));
        }

        let Ok(schema) = catalog.schema(&node.kind) else {
            report.push_error(ValidationIssue::error(
                "kind_unknown",
                format!("{base_path}/kind"),
                format!("record kind '{}' is not in the catalog", node.kind),
            ));
            continue;
        };

        match &node.reference_field {
            Some(field) if schema.field(field).is_none() => {
                report.push_error(ValidationIssue::error(
                    "reference_field_unknown",
                    format!("{base_path}/reference_field"),
                    format!("'{}' has no field '{field}'", node.kind),
                ));
            }
            Some(field) if node.fields.contains_key(field) => {
                report.push_warning(ValidationIssue::warning(
                    "reference_field_configured",
                    format!("{base_path}/fields/{field}"),
                    format!("'{field}' is bound to the parent reference; its configuration is ignored"),
                ));
            }
            Some(_) => {}
            None => {
                report.push_warning(ValidationIssue::warning(
                    "reference_field_missing",
                    format!("{base_path}/reference_field"),
                    format!(
                        "records of '{}' will not reference their parent",
                        node.name
                    ),
                ));
            }
        }

        validate_fields(
            &node.kind,
            &node.fields,
            None,
            &format!("{base_path}/fields"),
            catalog,
            report,
        );

        if let Some(series) = &node.time_series {
            validate_time_series(node, series, schema.field(&series.time_field).is_some(), &base_path, report);
        }
    }
}

fn validate_time_series(
    node: &NodePlan,
    series: &TimeSeriesPlan,
    known_field: bool,
    base_path: &str,
    report: &mut ValidationReport,
) {
    let path = format!("{base_path}/time_series");

    if !known_field {
        report.push_error(ValidationIssue::error(
            "time_field_unknown",
            format!("{path}/time_field"),
            format!("'{}' has no field '{}'", node.kind, series.time_field),
        ));
    }

    let start = parse_time_point(&series.start);
    if start.is_none() {
        report.push_error(ValidationIssue::error(
            "time_point_invalid",
            format!("{path}/start"),
            format!("'{}' is not a date or date-time", series.start),
        ));
    }

    match (series.count, &series.end) {
        (Some(_), Some(_)) | (None, None) => {
            report.push_error(
                ValidationIssue::error(
                    "time_extent_ambiguous",
                    path.clone(),
                    "time series needs exactly one of 'count' and 'end'",
                )
                .with_hint("set either a point count or an inclusive end"),
            );
        }
        (None, Some(end)) => match (start, parse_time_point(end)) {
            (_, None) => report.push_error(ValidationIssue::error(
                "time_point_invalid",
                format!("{path}/end"),
                format!("'{end}' is not a date or date-time"),
            )),
            (Some(start), Some(end)) if end < start => {
                report.push_error(ValidationIssue::error(
                    "time_range_reversed",
                    format!("{path}/end"),
                    "end is before start",
                ));
            }
            _ => {}
        },
        (Some(_), None) => {}
    }
}

fn validate_fields(
    kind: &str,
    fields: &BTreeMap<String, FieldPlan>,
    count: Option<usize>,
    base_path: &str,
    catalog: &SchemaCatalog,
    report: &mut ValidationReport,
) {
    let schema = catalog.schema(kind).ok();

    for (name, field) in fields {
        let path = format!("{base_path}/{name}");

        if let Some(schema) = schema
            && schema.field(name).is_none()
        {
            report.push_error(ValidationIssue::error(
                "field_unknown",
                path.clone(),
                format!("'{kind}' has no field '{name}'"),
            ));
        }

        match field {
            FieldPlan::Value { .. } => {}
            FieldPlan::Sequence { values } => {
                if let Some(count) = count
                    && values.len() < count
                {
                    report.push_error(ValidationIssue::error(
                        "sequence_too_short",
                        path,
                        format!("{} values cannot serve {count} records", values.len()),
                    ));
                }
            }
            FieldPlan::Choice {
                choices,
                probabilities,
            } => {
                if choices.is_empty() {
                    report.push_error(ValidationIssue::error(
                        "choices_empty",
                        path.clone(),
                        "choice needs at least one value",
                    ));
                }
                if let Some(probabilities) = probabilities {
                    validate_probabilities(choices.len(), probabilities, &path, report);
                }
            }
            FieldPlan::Pool { values, cycle } => {
                if values.is_empty() {
                    report.push_error(ValidationIssue::error(
                        "pool_empty",
                        path,
                        "pool needs at least one value",
                    ));
                } else if let Some(count) = count
                    && !cycle
                    && values.len() < count
                {
                    report.push_warning(ValidationIssue::warning(
                        "pool_may_exhaust",
                        path,
                        format!("{} pooled values for {count} records", values.len()),
                    ));
                }
            }
        }
    }
}

fn validate_probabilities(
    choices: usize,
    probabilities: &[f64],
    path: &str,
    report: &mut ValidationReport,
) {
    if probabilities.len() != choices {
        report.push_error(ValidationIssue::error(
            "probability_length",
            format!("{path}/probabilities"),
            format!(
                "{} probabilities for {choices} choices",
                probabilities.len()
            ),
        ));
        return;
    }
    if probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
        report.push_error(ValidationIssue::error(
            "probability_invalid",
            format!("{path}/probabilities"),
            "probabilities must be finite and non-negative",
        ));
        return;
    }
    let sum: f64 = probabilities.iter().sum();
    if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
        report.push_error(ValidationIssue::error(
            "probability_sum",
            format!("{path}/probabilities"),
            format!("probabilities sum to {sum}, expected 1.0"),
        ));
    }
}

/// Node names double as record file stems.
fn is_valid_node_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_points_accept_dates_and_date_times() {
        assert_eq!(
            parse_time_point("2021-01-01"),
            NaiveDate::from_ymd_opt(2021, 1, 1).map(|date| date.and_time(NaiveTime::MIN))
        );
        assert!(parse_time_point("2021-01-01T08:30:00").is_some());
        assert!(parse_time_point("January").is_none());
    }

    #[test]
    fn probabilities_are_checked_like_field_generators() {
        let mut report = ValidationReport::default();
        validate_probabilities(2, &[0.5, 0.6], "/x", &mut report);
        validate_probabilities(2, &[1.0], "/y", &mut report);
        validate_probabilities(2, &[1.0, 0.0], "/z", &mut report);
        assert_eq!(report.error_codes(), vec!["probability_sum", "probability_length"]);
    }

    #[test]
    fn node_names_must_be_file_safe() {
        assert!(is_valid_node_name("covid-test_2"));
        assert!(!is_valid_node_name(""));
        assert!(!is_valid_node_name("lab results"));
        assert!(!is_valid_node_name("../escape"));
        assert!(!is_valid_node_name("bl\u{f6}d"));
    }
}
