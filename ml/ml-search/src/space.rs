//! Parameter domains, search spaces and assignments.

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

/// A concrete hyperparameter value.
///
/// Serialized untagged, so `32`, `0.001` and `"adam"` are all valid JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
}

impl ParameterValue {
    /// Returns the value as a float (integers convert).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    /// Returns the value if it is an integer.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value if it is a non-negative integer.
    #[must_use]
    pub fn as_usize(&self) -> Option<usize> {
        self.as_i64().and_then(|v| usize::try_from(v).ok())
    }

    /// Returns the value if it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// The set of values a parameter may take.
///
/// # Example
///
/// ```
/// use ml_search::{ParameterDomain, ParameterValue};
///
/// let units = ParameterDomain::choice([128, 256, 512]);
/// assert!(units.contains(&ParameterValue::Int(256)));
/// assert!(!units.contains(&ParameterValue::Int(64)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterDomain {
    /// One of a finite list of options.
    Choice {
        /// Candidate values, in declaration order.
        options: Vec<ParameterValue>,
    },
    /// Float drawn uniformly from `[low, high]`.
    Uniform {
        /// Lower bound.
        low: f64,
        /// Upper bound.
        high: f64,
    },
    /// Float whose logarithm is uniform on `[ln low, ln high]`.
    LogUniform {
        /// Lower bound (> 0).
        low: f64,
        /// Upper bound.
        high: f64,
    },
}

impl ParameterDomain {
    /// Creates a choice domain.
    #[must_use]
    pub fn choice<V: Into<ParameterValue>>(options: impl IntoIterator<Item = V>) -> Self {
        Self::Choice {
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a uniform domain.
    #[must_use]
    pub const fn uniform(low: f64, high: f64) -> Self {
        Self::Uniform { low, high }
    }

    /// Creates a log-uniform domain.
    #[must_use]
    pub const fn log_uniform(low: f64, high: f64) -> Self {
        Self::LogUniform { low, high }
    }

    /// Checks that the domain can be sampled.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::EmptyChoice`] for a choice without options and
    /// [`SearchError::InvalidDomain`] for non-finite, inverted or (for
    /// log-uniform) non-positive bounds.
    pub fn validate(&self, name: &str) -> Result<()> {
        match self {
            Self::Choice { options } => {
                if options.is_empty() {
                    return Err(SearchError::EmptyChoice(name.to_string()));
                }
            }
            Self::Uniform { low, high } => {
                if !low.is_finite() || !high.is_finite() || low >= high {
                    return Err(SearchError::invalid_domain(
                        name,
                        format!("need finite low < high, got [{low}, {high}]"),
                    ));
                }
            }
            Self::LogUniform { low, high } => {
                if !low.is_finite() || !high.is_finite() || *low <= 0.0 || low >= high {
                    return Err(SearchError::invalid_domain(
                        name,
                        format!("need finite 0 < low < high, got [{low}, {high}]"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Returns `true` if `value` belongs to the domain.
    #[must_use]
    pub fn contains(&self, value: &ParameterValue) -> bool {
        match self {
            Self::Choice { options } => options.contains(value),
            Self::Uniform { low, high } | Self::LogUniform { low, high } => value
                .as_f64()
                .is_some_and(|v| v >= *low && v <= *high),
        }
    }

    /// Position of `value` among the options of a choice domain.
    #[must_use]
    pub fn index_of(&self, value: &ParameterValue) -> Option<usize> {
        match self {
            Self::Choice { options } => options.iter().position(|o| o == value),
            _ => None,
        }
    }

    /// Draws a value from the domain's prior.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::EmptyChoice`] if a choice has no options.
    pub fn sample<R: Rng + ?Sized>(&self, name: &str, rng: &mut R) -> Result<ParameterValue> {
        match self {
            Self::Choice { options } => options
                .choose(rng)
                .cloned()
                .ok_or_else(|| SearchError::EmptyChoice(name.to_string())),
            Self::Uniform { low, high } => {
                let u: f64 = rng.r#gen();
                Ok(ParameterValue::Float((low + u * (high - low)).clamp(*low, *high)))
            }
            Self::LogUniform { low, high } => {
                let (log_low, log_high) = (low.ln(), high.ln());
                let u: f64 = rng.r#gen();
                let value = (log_low + u * (log_high - log_low)).exp();
                Ok(ParameterValue::Float(value.clamp(*low, *high)))
            }
        }
    }
}

/// Named parameter domains, iterated in name order.
///
/// # Example
///
/// ```
/// use ml_search::{ParameterDomain, SearchSpace};
///
/// let space = SearchSpace::new()
///     .with("batch_size", ParameterDomain::choice([16, 32, 64]))
///     .unwrap()
///     .with("learning_rate", ParameterDomain::choice([0.001, 0.01]))
///     .unwrap();
/// assert_eq!(space.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchSpace {
    params: BTreeMap<String, ParameterDomain>,
}

impl SearchSpace {
    /// Creates an empty search space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, replacing any previous domain with that name.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain is invalid.
    pub fn add(&mut self, name: impl Into<String>, domain: ParameterDomain) -> Result<()> {
        let name = name.into();
        domain.validate(&name)?;
        self.params.insert(name, domain);
        Ok(())
    }

    /// Builder form of [`SearchSpace::add`].
    ///
    /// # Errors
    ///
    /// Returns an error if the domain is invalid.
    pub fn with(mut self, name: impl Into<String>, domain: ParameterDomain) -> Result<Self> {
        self.add(name, domain)?;
        Ok(self)
    }

    /// Gets a parameter domain.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterDomain> {
        self.params.get(name)
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if no parameters are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterates over parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterDomain)> {
        self.params.iter()
    }

    /// Checks the space as a whole, e.g. after deserialization.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::EmptySpace`] or the first domain error.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(SearchError::EmptySpace);
        }
        self.params
            .iter()
            .try_for_each(|(name, domain)| domain.validate(name))
    }

    /// Draws every parameter independently from its prior.
    ///
    /// # Errors
    ///
    /// Returns an error if the space is empty or a domain is invalid.
    pub fn sample_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Assignment> {
        if self.is_empty() {
            return Err(SearchError::EmptySpace);
        }
        let mut assignment = Assignment::new();
        for (name, domain) in &self.params {
            assignment.insert(name.clone(), domain.sample(name, rng)?);
        }
        Ok(assignment)
    }

    /// Checks that `assignment` sets every parameter to a value in its domain.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::ParameterNotFound`] or
    /// [`SearchError::InvalidValue`].
    pub fn validate_assignment(&self, assignment: &Assignment) -> Result<()> {
        for (name, domain) in &self.params {
            match assignment.get(name) {
                Some(value) if domain.contains(value) => {}
                Some(value) => return Err(SearchError::invalid_value(name, value)),
                None => return Err(SearchError::ParameterNotFound(name.clone())),
            }
        }
        Ok(())
    }
}

/// One value per parameter, as proposed to the objective.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Assignment(BTreeMap<String, ParameterValue>);

impl Assignment {
    /// Creates an empty assignment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Gets a value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.0.get(name)
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no values are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over values in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.0.iter()
    }

    fn require(&self, name: &str) -> Result<&ParameterValue> {
        self.get(name)
            .ok_or_else(|| SearchError::ParameterNotFound(name.to_string()))
    }

    /// Reads a numeric value as `f64`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is missing or not numeric.
    pub fn get_f64(&self, name: &str) -> Result<f64> {
        let value = self.require(name)?;
        value
            .as_f64()
            .ok_or_else(|| SearchError::invalid_value(name, value))
    }

    /// Reads a non-negative integer value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is missing or not a non-negative integer.
    pub fn get_usize(&self, name: &str) -> Result<usize> {
        let value = self.require(name)?;
        value
            .as_usize()
            .ok_or_else(|| SearchError::invalid_value(name, value))
    }

    /// Reads a text value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is missing or not text.
    pub fn get_str(&self, name: &str) -> Result<&str> {
        let value = self.require(name)?;
        value
            .as_str()
            .ok_or_else(|| SearchError::invalid_value(name, value))
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

impl FromIterator<(String, ParameterValue)> for Assignment {
    fn from_iter<I: IntoIterator<Item = (String, ParameterValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
