use std::fmt;

use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::{Rng, RngCore};
use serde_json::Value;

use seedbed_core::ReferenceHandle;

use crate::errors::{ConfigError, GenerationError};

/// Allowed drift of a probability vector from 1.0.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Static value bound to a field: one value for every record, or one value
/// per record consumed in order.
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideValue {
    Single(Value),
    Sequence(Vec<Value>),
}

/// Field override: `field` always takes the configured value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    pub field: String,
    pub value: OverrideValue,
}

impl FieldValue {
    /// Same value for every record. A JSON array is kept whole.
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: OverrideValue::Single(value.into()),
        }
    }

    /// Record `i` receives `values[i]`.
    pub fn sequence<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            field: field.into(),
            value: OverrideValue::Sequence(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Bind `field` to one reference per record.
    pub fn references(field: impl Into<String>, handles: &[ReferenceHandle]) -> Self {
        Self::sequence(field, handles.iter().map(ReferenceHandle::to_value))
    }

    /// Number of records this override can serve, `None` when unbounded.
    pub fn available(&self) -> Option<usize> {
        match &self.value {
            OverrideValue::Single(_) => None,
            OverrideValue::Sequence(values) => Some(values.len()),
        }
    }

    pub fn value_at(&self, index: usize) -> Result<Value, GenerationError> {
        match &self.value {
            OverrideValue::Single(value) => Ok(value.clone()),
            OverrideValue::Sequence(values) => {
                values
                    .get(index)
                    .cloned()
                    .ok_or_else(|| GenerationError::InsufficientValues {
                        field: self.field.clone(),
                        available: values.len(),
                        requested: index + 1,
                    })
            }
        }
    }
}

/// State handed to a producer on each invocation.
pub struct ProducerContext<'a> {
    pub field: &'a str,
    pub rng: &'a mut dyn RngCore,
}

/// Stateful source of field values. Implementations may keep a cursor;
/// each call to `produce` may advance it.
pub trait ValueProducer: Send {
    fn produce(&mut self, ctx: &mut ProducerContext<'_>) -> Result<Value, GenerationError>;

    /// Values still available before `produce` fails, `None` when unbounded.
    fn capacity(&self) -> Option<usize> {
        None
    }
}

/// Producer backed by a closure.
pub struct FnProducer<F> {
    producer: F,
}

impl<F> FnProducer<F>
where
    F: FnMut(&mut dyn RngCore) -> Value + Send,
{
    pub fn new(producer: F) -> Self {
        Self { producer }
    }
}

impl<F> ValueProducer for FnProducer<F>
where
    F: FnMut(&mut dyn RngCore) -> Value + Send,
{
    fn produce(&mut self, ctx: &mut ProducerContext<'_>) -> Result<Value, GenerationError> {
        Ok((self.producer)(&mut *ctx.rng))
    }
}

/// What a pool producer does once every value has been handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecyclePolicy {
    /// Fail with [`GenerationError::ProducerExhausted`].
    #[default]
    Exhaust,
    /// Start again from the first value.
    Cycle,
}

/// Hands out the values of a finite pool in order.
#[derive(Debug, Clone)]
pub struct PoolProducer {
    values: Vec<Value>,
    cursor: usize,
    policy: RecyclePolicy,
}

impl PoolProducer {
    pub fn new<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            cursor: 0,
            policy: RecyclePolicy::Exhaust,
        }
    }

    pub fn references(handles: &[ReferenceHandle]) -> Self {
        Self::new(handles.iter().map(ReferenceHandle::to_value))
    }

    pub fn with_policy(mut self, policy: RecyclePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn remaining(&self) -> usize {
        self.values.len().saturating_sub(self.cursor)
    }
}

impl ValueProducer for PoolProducer {
    fn produce(&mut self, ctx: &mut ProducerContext<'_>) -> Result<Value, GenerationError> {
        if self.cursor >= self.values.len() {
            match self.policy {
                RecyclePolicy::Cycle if !self.values.is_empty() => self.cursor = 0,
                _ => return Err(GenerationError::ProducerExhausted(ctx.field.to_string())),
            }
        }
        let value = self.values[self.cursor].clone();
        self.cursor += 1;
        Ok(value)
    }

    fn capacity(&self) -> Option<usize> {
        match self.policy {
            RecyclePolicy::Cycle if !self.values.is_empty() => None,
            _ => Some(self.remaining()),
        }
    }
}

enum ProducerMode {
    Choice {
        choices: Vec<Value>,
        weights: Option<WeightedIndex<f64>>,
    },
    Function(Box<dyn ValueProducer>),
}

/// Value producer for one field: weighted random choice or a custom producer.
pub struct FieldGenerator {
    field: String,
    mode: ProducerMode,
}

impl fmt::Debug for FieldGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match &self.mode {
            ProducerMode::Choice { choices, weights } => {
                if weights.is_some() {
                    format!("weighted choice of {}", choices.len())
                } else {
                    format!("uniform choice of {}", choices.len())
                }
            }
            ProducerMode::Function(_) => "function".to_string(),
        };
        f.debug_struct("FieldGenerator")
            .field("field", &self.field)
            .field("mode", &mode)
            .finish()
    }
}

impl FieldGenerator {
    pub fn builder(field: impl Into<String>) -> FieldGeneratorBuilder {
        FieldGeneratorBuilder {
            field: field.into(),
            choices: None,
            probabilities: None,
            producer: None,
        }
    }

    /// Uniform choice over `choices`.
    pub fn choices<V: Into<Value>>(
        field: impl Into<String>,
        choices: impl IntoIterator<Item = V>,
    ) -> Result<Self, ConfigError> {
        Self::builder(field).choices(choices).build()
    }

    /// Weighted choice; `probabilities` must match `choices` and sum to 1.
    pub fn weighted<V: Into<Value>>(
        field: impl Into<String>,
        choices: impl IntoIterator<Item = V>,
        probabilities: Vec<f64>,
    ) -> Result<Self, ConfigError> {
        Self::builder(field)
            .choices(choices)
            .probabilities(probabilities)
            .build()
    }

    /// Field generator calling a zero-argument closure.
    pub fn from_fn<F>(field: impl Into<String>, mut producer: F) -> Self
    where
        F: FnMut() -> Value + Send + 'static,
    {
        Self::from_producer(
            field,
            FnProducer::new(move |_rng: &mut dyn RngCore| producer()),
        )
    }

    /// Field generator calling a closure that draws from the engine RNG.
    pub fn from_rng_fn<F>(field: impl Into<String>, producer: F) -> Self
    where
        F: FnMut(&mut dyn RngCore) -> Value + Send + 'static,
    {
        Self::from_producer(field, FnProducer::new(producer))
    }

    pub fn from_producer(field: impl Into<String>, producer: impl ValueProducer + 'static) -> Self {
        Self {
            field: field.into(),
            mode: ProducerMode::Function(Box::new(producer)),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Draws left before this generator fails, `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        match &self.mode {
            ProducerMode::Choice { .. } => None,
            ProducerMode::Function(producer) => producer.capacity(),
        }
    }

    /// Draw the next value.
    pub fn generate(&mut self, rng: &mut dyn RngCore) -> Result<Value, GenerationError> {
        match &mut self.mode {
            ProducerMode::Choice { choices, weights } => {
                let index = match weights {
                    Some(weights) => weights.sample(rng),
                    None => rng.random_range(0..choices.len()),
                };
                Ok(choices[index].clone())
            }
            ProducerMode::Function(producer) => {
                let mut ctx = ProducerContext {
                    field: &self.field,
                    rng,
                };
                producer.produce(&mut ctx)
            }
        }
    }
}

/// Collects the parts of a field generator and validates them together.
pub struct FieldGeneratorBuilder {
    field: String,
    choices: Option<Vec<Value>>,
    probabilities: Option<Vec<f64>>,
    producer: Option<Box<dyn ValueProducer>>,
}

impl FieldGeneratorBuilder {
    pub fn choices<V: Into<Value>>(mut self, choices: impl IntoIterator<Item = V>) -> Self {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn probabilities(mut self, probabilities: Vec<f64>) -> Self {
        self.probabilities = Some(probabilities);
        self
    }

    pub fn producer(mut self, producer: impl ValueProducer + 'static) -> Self {
        self.producer = Some(Box::new(producer));
        self
    }

    pub fn build(self) -> Result<FieldGenerator, ConfigError> {
        let Self {
            field,
            choices,
            probabilities,
            producer,
        } = self;

        let choice_mode = choices.is_some() || probabilities.is_some();
        let mode = match (choice_mode, producer) {
            (true, Some(_)) => return Err(ConfigError::BothModes(field)),
            (false, None) => return Err(ConfigError::NoMode(field)),
            (false, Some(producer)) => ProducerMode::Function(producer),
            (true, None) => {
                let choices = choices.unwrap_or_default();
                if choices.is_empty() {
                    return Err(ConfigError::EmptyChoices(field));
                }
                let weights = match probabilities {
                    Some(probabilities) => Some(weights_for(&field, &choices, &probabilities)?),
                    None => None,
                };
                ProducerMode::Choice { choices, weights }
            }
        };

        Ok(FieldGenerator { field, mode })
    }
}

fn weights_for(
    field: &str,
    choices: &[Value],
    probabilities: &[f64],
) -> Result<WeightedIndex<f64>, ConfigError> {
    if probabilities.len() != choices.len() {
        return Err(ConfigError::ProbabilityLength {
            field: field.to_string(),
            choices: choices.len(),
            probabilities: probabilities.len(),
        });
    }
    if probabilities
        .iter()
        .any(|probability| !probability.is_finite() || *probability < 0.0)
    {
        return Err(ConfigError::InvalidProbability(field.to_string()));
    }
    let sum: f64 = probabilities.iter().sum();
    if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(ConfigError::ProbabilitySum {
            field: field.to_string(),
            sum,
        });
    }
    WeightedIndex::new(probabilities).map_err(|_| ConfigError::InvalidProbability(field.to_string()))
}
