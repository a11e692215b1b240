//! Tree-structured Parzen estimator.
//!
//! Completed trials are split into a small "below" group holding the best
//! losses and an "above" group holding the rest. Each parameter gets two
//! densities, `l(x)` fitted to the below group and `g(x)` fitted to the
//! above group. Candidates are drawn from `l` and the one maximizing
//! `log l(x) - log g(x)` is proposed.
//!
//! Parameters are modelled independently. Choice parameters use smoothed
//! category frequencies; range parameters use an adaptive Parzen mixture
//! (one Gaussian per observation plus a broad prior component), in log space
//! for log-uniform domains.

use std::f64::consts::PI;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SearchError};
use crate::space::{Assignment, ParameterDomain, ParameterValue, SearchSpace};
use crate::trial::Trials;

/// Rejection attempts before a mixture draw is clamped into bounds.
const MAX_REJECTIONS: usize = 64;

/// Largest ratio between the prior width and the narrowest kernel.
const MAX_KERNEL_SHRINK: f64 = 100.0;

/// TPE tuning knobs.
///
/// # Example
///
/// ```
/// use ml_search::TpeConfig;
///
/// let config = TpeConfig::default().with_startup_trials(5);
/// assert_eq!(config.n_startup_trials, 5);
/// assert!((config.gamma - 0.25).abs() < 1e-12);
/// assert!(config.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TpeConfig {
    /// Scales the size of the below group: `ceil(gamma * sqrt(n))`.
    pub gamma: f64,

    /// Completed trials required before the model is used; earlier
    /// suggestions are drawn from the priors.
    pub n_startup_trials: usize,

    /// Candidates drawn from `l(x)` per parameter.
    pub n_ei_candidates: usize,

    /// Weight of the prior component in every density.
    pub prior_weight: f64,

    /// Observations older than the newest `linear_forgetting` get linearly
    /// decreasing weight; also caps the size of the below group.
    pub linear_forgetting: usize,
}

impl Default for TpeConfig {
    fn default() -> Self {
        Self {
            gamma: 0.25,
            n_startup_trials: 20,
            n_ei_candidates: 24,
            prior_weight: 1.0,
            linear_forgetting: 25,
        }
    }
}

impl TpeConfig {
    /// Sets gamma.
    #[must_use]
    pub const fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Sets the number of startup trials.
    #[must_use]
    pub const fn with_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    /// Sets the number of EI candidates.
    #[must_use]
    pub const fn with_ei_candidates(mut self, n: usize) -> Self {
        self.n_ei_candidates = n;
        self
    }

    /// Sets the prior weight.
    #[must_use]
    pub const fn with_prior_weight(mut self, weight: f64) -> Self {
        self.prior_weight = weight;
        self
    }

    /// Sets the linear forgetting horizon.
    #[must_use]
    pub const fn with_linear_forgetting(mut self, n: usize) -> Self {
        self.linear_forgetting = n;
        self
    }

    /// Returns `true` if all values are valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(SearchError::invalid_config(format!(
                "gamma must be in (0, 1], got {}",
                self.gamma
            )));
        }
        if self.n_ei_candidates == 0 {
            return Err(SearchError::invalid_config("n_ei_candidates must be > 0"));
        }
        if !(self.prior_weight.is_finite() && self.prior_weight > 0.0) {
            return Err(SearchError::invalid_config(format!(
                "prior_weight must be positive, got {}",
                self.prior_weight
            )));
        }
        if self.linear_forgetting == 0 {
            return Err(SearchError::invalid_config("linear_forgetting must be > 0"));
        }
        Ok(())
    }
}

/// Proposes assignments from a trial history.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TpeSampler {
    config: TpeConfig,
}

impl TpeSampler {
    /// Creates a sampler.
    #[must_use]
    pub const fn new(config: TpeConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &TpeConfig {
        &self.config
    }

    /// Proposes the next assignment.
    ///
    /// Only successful trials inform the model. Until `n_startup_trials`
    /// of them exist the assignment is drawn from the priors.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or space is invalid.
    pub fn suggest<R: Rng + ?Sized>(
        &self,
        space: &SearchSpace,
        trials: &Trials,
        rng: &mut R,
    ) -> Result<Assignment> {
        self.config.validate()?;
        space.validate()?;

        let history: Vec<(f64, &Assignment)> = trials
            .completed()
            .filter_map(|r| r.ok_loss().map(|loss| (loss, &r.assignment)))
            .collect();
        if history.is_empty() || history.len() < self.config.n_startup_trials {
            return space.sample_random(rng);
        }

        let (below, above) = self.split(&history);
        debug!(
            completed = history.len(),
            below = below.len(),
            above = above.len(),
            "TPE split"
        );

        let mut assignment = Assignment::new();
        for (name, domain) in space.iter() {
            let observed = |group: &[usize]| -> Vec<&ParameterValue> {
                group
                    .iter()
                    .filter_map(|&i| history[i].1.get(name))
                    .collect()
            };
            let value =
                self.suggest_parameter(name, domain, &observed(&below), &observed(&above), rng)?;
            assignment.insert(name.clone(), value);
        }
        Ok(assignment)
    }

    /// Number of trials in the below group for `n` completed trials.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn below_count(&self, n: usize) -> usize {
        let raw = (self.config.gamma * (n as f64).sqrt()).ceil() as usize;
        raw.min(self.config.linear_forgetting).min(n)
    }

    /// Splits history indices into below and above groups, each kept in
    /// trial order. Equal losses keep their trial order.
    fn split(&self, history: &[(f64, &Assignment)]) -> (Vec<usize>, Vec<usize>) {
        let mut order: Vec<usize> = (0..history.len()).collect();
        order.sort_by(|&a, &b| history[a].0.total_cmp(&history[b].0));

        let n_below = self.below_count(history.len());
        let mut below = order[..n_below].to_vec();
        let mut above = order[n_below..].to_vec();
        below.sort_unstable();
        above.sort_unstable();
        (below, above)
    }

    fn suggest_parameter<R: Rng + ?Sized>(
        &self,
        name: &str,
        domain: &ParameterDomain,
        below: &[&ParameterValue],
        above: &[&ParameterValue],
        rng: &mut R,
    ) -> Result<ParameterValue> {
        match domain {
            ParameterDomain::Choice { options } => {
                let indices = |values: &[&ParameterValue]| -> Vec<usize> {
                    values.iter().filter_map(|v| domain.index_of(v)).collect()
                };
                let index = self.suggest_choice(options.len(), &indices(below), &indices(above), rng);
                options
                    .get(index)
                    .cloned()
                    .ok_or_else(|| SearchError::EmptyChoice(name.to_string()))
            }
            ParameterDomain::Uniform { low, high } => {
                let points = |values: &[&ParameterValue]| -> Vec<f64> {
                    values.iter().filter_map(|v| v.as_f64()).collect()
                };
                let x = self.suggest_continuous(*low, *high, &points(below), &points(above), rng);
                Ok(ParameterValue::Float(x.clamp(*low, *high)))
            }
            ParameterDomain::LogUniform { low, high } => {
                let points = |values: &[&ParameterValue]| -> Vec<f64> {
                    values
                        .iter()
                        .filter_map(|v| v.as_f64())
                        .filter(|v| *v > 0.0)
                        .map(f64::ln)
                        .collect()
                };
                let x = self.suggest_continuous(
                    low.ln(),
                    high.ln(),
                    &points(below),
                    &points(above),
                    rng,
                );
                Ok(ParameterValue::Float(x.exp().clamp(*low, *high)))
            }
        }
    }

    fn suggest_choice<R: Rng + ?Sized>(
        &self,
        n_options: usize,
        below: &[usize],
        above: &[usize],
        rng: &mut R,
    ) -> usize {
        let l = self.categorical_posterior(n_options, below);
        let g = self.categorical_posterior(n_options, above);

        let mut best = (f64::NEG_INFINITY, 0);
        for _ in 0..self.config.n_ei_candidates {
            let candidate = sample_weighted(&l, rng);
            let score = l[candidate].ln() - g[candidate].ln();
            if score > best.0 {
                best = (score, candidate);
            }
        }
        best.1
    }

    /// Category probabilities: forgetting-weighted counts plus
    /// `prior_weight` pseudo-counts per option.
    fn categorical_posterior(&self, n_options: usize, observed: &[usize]) -> Vec<f64> {
        let weights = linear_forgetting_weights(observed.len(), self.config.linear_forgetting);
        let mut counts = vec![self.config.prior_weight; n_options];
        for (&index, weight) in observed.iter().zip(weights) {
            if let Some(count) = counts.get_mut(index) {
                *count += weight;
            }
        }
        let total: f64 = counts.iter().sum();
        counts.iter().map(|c| c / total).collect()
    }

    fn suggest_continuous<R: Rng + ?Sized>(
        &self,
        low: f64,
        high: f64,
        below: &[f64],
        above: &[f64],
        rng: &mut R,
    ) -> f64 {
        let prior_mu = 0.5 * (low + high);
        let prior_sigma = high - low;
        let l = ParzenMixture::fit(below, prior_mu, prior_sigma, &self.config);
        let g = ParzenMixture::fit(above, prior_mu, prior_sigma, &self.config);

        // Truncation normalizers are constant per mixture and drop out of the argmax.
        let mut best = (f64::NEG_INFINITY, prior_mu);
        for _ in 0..self.config.n_ei_candidates {
            let candidate = l.sample(low, high, rng);
            let score = l.log_density(candidate) - g.log_density(candidate);
            if score > best.0 {
                best = (score, candidate);
            }
        }
        best.1
    }
}

/// Gaussian mixture built from observations and a prior component.
#[derive(Debug, Clone, PartialEq)]
struct ParzenMixture {
    weights: Vec<f64>,
    mus: Vec<f64>,
    sigmas: Vec<f64>,
}

impl ParzenMixture {
    /// Fits the adaptive Parzen estimator.
    ///
    /// Each kernel's width is the larger gap to its sorted neighbours,
    /// clipped to `[prior_sigma / min(100, 1 + k), prior_sigma]` for `k`
    /// components. The prior kernel always has width `prior_sigma`.
    #[allow(clippy::cast_precision_loss)]
    fn fit(observed: &[f64], prior_mu: f64, prior_sigma: f64, config: &TpeConfig) -> Self {
        let mut order: Vec<usize> = (0..observed.len()).collect();
        order.sort_by(|&a, &b| observed[a].total_cmp(&observed[b]));

        let mut mus: Vec<f64> = order.iter().map(|&i| observed[i]).collect();
        let prior_pos = mus.partition_point(|&m| m < prior_mu);
        mus.insert(prior_pos, prior_mu);

        let forgetting = linear_forgetting_weights(observed.len(), config.linear_forgetting);
        let mut weights: Vec<f64> = order.iter().map(|&i| forgetting[i]).collect();
        weights.insert(prior_pos, config.prior_weight);
        let total: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= total;
        }

        let k = mus.len();
        let mut sigmas: Vec<f64> = match observed.len() {
            0 => vec![prior_sigma],
            1 => vec![0.5 * prior_sigma; 2],
            _ => (0..k)
                .map(|i| {
                    let left = (i > 0).then(|| mus[i] - mus[i - 1]);
                    let right = (i + 1 < k).then(|| mus[i + 1] - mus[i]);
                    match (left, right) {
                        (Some(l), Some(r)) => l.max(r),
                        (Some(gap), None) | (None, Some(gap)) => gap,
                        (None, None) => prior_sigma,
                    }
                })
                .collect(),
        };
        let min_sigma = prior_sigma / MAX_KERNEL_SHRINK.min(1.0 + k as f64);
        for sigma in &mut sigmas {
            *sigma = sigma.clamp(min_sigma, prior_sigma);
        }
        sigmas[prior_pos] = prior_sigma;

        Self {
            weights,
            mus,
            sigmas,
        }
    }

    /// Log density of the untruncated mixture at `x`.
    fn log_density(&self, x: f64) -> f64 {
        let terms: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.mus)
            .zip(&self.sigmas)
            .map(|((w, mu), sigma)| {
                let z = (x - mu) / sigma;
                w.ln() - sigma.ln() - 0.5 * (2.0 * PI).ln() - 0.5 * z * z
            })
            .collect();
        log_sum_exp(&terms)
    }

    /// Draws from the mixture restricted to `[low, high]`.
    fn sample<R: Rng + ?Sized>(&self, low: f64, high: f64, rng: &mut R) -> f64 {
        let mut x = 0.5 * (low + high);
        for _ in 0..MAX_REJECTIONS {
            let component = sample_weighted(&self.weights, rng);
            x = self.mus[component] + self.sigmas[component] * standard_normal(rng);
            if (low..=high).contains(&x) {
                return x;
            }
        }
        x.clamp(low, high)
    }
}

/// Observation weights, oldest first: the newest `horizon` get weight 1 and
/// older ones ramp linearly from `1/n` up to 1.
#[allow(clippy::cast_precision_loss)]
fn linear_forgetting_weights(n: usize, horizon: usize) -> Vec<f64> {
    if n <= horizon {
        return vec![1.0; n];
    }
    let ramp_len = n - horizon;
    let start = 1.0 / n as f64;
    let mut weights: Vec<f64> = if ramp_len == 1 {
        vec![start]
    } else {
        (0..ramp_len)
            .map(|i| start + (1.0 - start) * i as f64 / (ramp_len - 1) as f64)
            .collect()
    };
    weights.resize(n, 1.0);
    weights
}

/// Index drawn proportionally to `weights`.
fn sample_weighted<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> usize {
    let total: f64 = weights.iter().sum();
    let target = rng.r#gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (i, w) in weights.iter().enumerate() {
        cumulative += w;
        if target < cumulative {
            return i;
        }
    }
    weights.len().saturating_sub(1)
}

/// Box-Muller standard normal draw.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1 = 1.0 - rng.r#gen::<f64>();
    let u2: f64 = rng.r#gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn log_sum_exp(terms: &[f64]) -> f64 {
    let max = terms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + terms.iter().map(|t| (t - max).exp()).sum::<f64>().ln()
}
