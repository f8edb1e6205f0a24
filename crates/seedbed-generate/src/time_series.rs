use std::time::Instant;

use chrono::{Duration, Months, NaiveDateTime};
use serde_json::json;
use tracing::info;

use seedbed_core::{FieldMap, Record};
pub use seedbed_plan::{Frequency, TimestampFormat};

use crate::errors::{ConfigError, GenerationError};
use crate::resource::ResourceGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extent {
    Count(usize),
    Until(NaiveDateTime),
}

/// Finite, ordered sequence of instants: a start, a step and either a point
/// count or an inclusive end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeAxis {
    start: NaiveDateTime,
    frequency: Frequency,
    extent: Extent,
}

impl TimeAxis {
    /// Exactly `count` points starting at `start`.
    pub fn count(start: NaiveDateTime, count: usize, frequency: Frequency) -> Self {
        Self {
            start,
            frequency,
            extent: Extent::Count(count),
        }
    }

    /// Points from `start` up to and including `end`.
    pub fn range(
        start: NaiveDateTime,
        end: NaiveDateTime,
        frequency: Frequency,
    ) -> Result<Self, ConfigError> {
        if end < start {
            return Err(ConfigError::InvalidTimeAxis(format!(
                "end {end} is before start {start}"
            )));
        }
        Ok(Self {
            start,
            frequency,
            extent: Extent::Until(end),
        })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Point `index`, or `None` once the axis has run out.
    pub fn point(&self, index: usize) -> Result<Option<NaiveDateTime>, ConfigError> {
        match self.extent {
            Extent::Count(count) if index >= count => Ok(None),
            Extent::Count(_) => self.nth(index).map(Some),
            Extent::Until(end) => {
                let point = self.nth(index)?;
                Ok((point <= end).then_some(point))
            }
        }
    }

    pub fn points(&self) -> Result<Vec<NaiveDateTime>, ConfigError> {
        match self.extent {
            Extent::Count(count) => (0..count).map(|step| self.nth(step)).collect(),
            Extent::Until(end) => {
                let mut points = Vec::new();
                for step in 0.. {
                    let point = self.nth(step)?;
                    if point > end {
                        break;
                    }
                    points.push(point);
                }
                Ok(points)
            }
        }
    }

    /// Calendar steps (months, years) are taken from `start`, so the day of
    /// month is clamped per point rather than drifting.
    fn nth(&self, step: usize) -> Result<NaiveDateTime, ConfigError> {
        let overflow =
            || ConfigError::InvalidTimeAxis(format!("step {step} overflows the calendar"));
        let n = u32::try_from(step).map_err(|_| overflow())?;
        let point = match self.frequency {
            Frequency::Hourly => self.start.checked_add_signed(Duration::hours(n.into())),
            Frequency::Daily => self.start.checked_add_signed(Duration::days(n.into())),
            Frequency::Weekly => self.start.checked_add_signed(Duration::weeks(n.into())),
            Frequency::Monthly => self.start.checked_add_months(Months::new(n)),
            Frequency::Yearly => n
                .checked_mul(12)
                .and_then(|months| self.start.checked_add_months(Months::new(months))),
        };
        point.ok_or_else(overflow)
    }
}

/// Repeats a resource generator once per point of a time axis, stamping
/// `time_field` with the point.
#[derive(Debug)]
pub struct TimeSeriesGenerator {
    generator: ResourceGenerator,
    time_field: String,
    axis: TimeAxis,
    format: TimestampFormat,
}

impl TimeSeriesGenerator {
    pub fn new(generator: ResourceGenerator, time_field: impl Into<String>, axis: TimeAxis) -> Self {
        Self {
            generator,
            time_field: time_field.into(),
            axis,
            format: TimestampFormat::default(),
        }
    }

    pub fn with_format(mut self, format: TimestampFormat) -> Self {
        self.format = format;
        self
    }

    pub fn kind(&self) -> &str {
        self.generator.kind()
    }

    pub fn time_field(&self) -> &str {
        &self.time_field
    }

    pub fn generator_mut(&mut self) -> &mut ResourceGenerator {
        &mut self.generator
    }

    /// Rendered axis points.
    pub fn timestamps(&self) -> Result<Vec<String>, GenerationError> {
        Ok(self
            .axis
            .points()?
            .into_iter()
            .map(|point| self.render(point))
            .collect())
    }

    /// One record stamped with axis point `index`, for callers that pair
    /// records with points themselves. Fails with
    /// [`GenerationError::InsufficientValues`] past the end of the axis.
    pub fn generate_point(
        &mut self,
        index: usize,
        forced: FieldMap,
    ) -> Result<Record, GenerationError> {
        let Some(point) = self.axis.point(index)? else {
            return Err(GenerationError::InsufficientValues {
                field: self.time_field.clone(),
                available: self.axis.points()?.len(),
                requested: index + 1,
            });
        };
        let mut fields = forced;
        fields.insert(self.time_field.clone(), json!(self.render(point)));
        self.generator.generate_one(index, fields)
    }

    fn render(&self, point: NaiveDateTime) -> String {
        let pattern = match self.format {
            TimestampFormat::Date => "%Y-%m-%d",
            TimestampFormat::DateTime => "%Y-%m-%dT%H:%M:%S",
        };
        point.format(pattern).to_string()
    }

    pub fn generate(&mut self) -> Result<Vec<Record>, GenerationError> {
        self.generate_with(FieldMap::new())
    }

    /// One series where every point also carries `forced`. The time field
    /// always wins.
    pub fn generate_with(&mut self, forced: FieldMap) -> Result<Vec<Record>, GenerationError> {
        let started = Instant::now();
        let timestamps = self.timestamps()?;
        self.generator.ensure_capacity_except(timestamps.len(), |field| {
            field == self.time_field || forced.contains_key(field)
        })?;

        let mut records = Vec::with_capacity(timestamps.len());
        for (index, timestamp) in timestamps.into_iter().enumerate() {
            let mut fields = forced.clone();
            fields.insert(self.time_field.clone(), json!(timestamp));
            records.push(self.generator.generate_one(index, fields)?);
        }

        info!(
            kind = %self.generator.kind(),
            time_field = %self.time_field,
            points = records.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "time series generated"
        );
        Ok(records)
    }
}
