//! Suggestion algorithms.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::space::{Assignment, SearchSpace};
use crate::tpe::{TpeConfig, TpeSampler};
use crate::trial::Trials;

/// How the next assignment is chosen.
///
/// Serialized with a `type` tag: `{"type": "random"}` or
/// `{"type": "tpe", "n_startup_trials": 5}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Algorithm {
    /// Independent draws from the priors.
    Random,
    /// Tree-structured Parzen estimator.
    Tpe(TpeConfig),
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::Tpe(TpeConfig::default())
    }
}

impl Algorithm {
    /// Proposes the next assignment given the history so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the space or the algorithm configuration is
    /// invalid.
    pub fn suggest<R: Rng + ?Sized>(
        &self,
        space: &SearchSpace,
        trials: &Trials,
        rng: &mut R,
    ) -> Result<Assignment> {
        match self {
            Self::Random => {
                space.validate()?;
                space.sample_random(rng)
            }
            Self::Tpe(config) => TpeSampler::new(*config).suggest(space, trials, rng),
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Tpe(_) => "tpe",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::ParameterDomain;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn default_is_tpe() {
        assert_eq!(Algorithm::default(), Algorithm::Tpe(TpeConfig::default()));
        assert_eq!(Algorithm::default().name(), "tpe");
    }

    #[test]
    fn serde_is_tagged() {
        let json = serde_json::to_string(&Algorithm::Random).unwrap();
        assert_eq!(json, r#"{"type":"random"}"#);

        let parsed: Algorithm =
            serde_json::from_str(r#"{"type":"tpe","n_startup_trials":5}"#).unwrap();
        assert_eq!(
            parsed,
            Algorithm::Tpe(TpeConfig::default().with_startup_trials(5))
        );
    }

    #[test]
    fn random_suggestion_is_in_space() {
        let space = SearchSpace::new()
            .with("units", ParameterDomain::choice([128, 256, 512]))
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let a = Algorithm::Random
            .suggest(&space, &Trials::new(), &mut rng)
            .unwrap();
        assert!(space.validate_assignment(&a).is_ok());
    }

    #[test]
    fn empty_space_is_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for algorithm in [Algorithm::Random, Algorithm::default()] {
            assert!(
                algorithm
                    .suggest(&SearchSpace::new(), &Trials::new(), &mut rng)
                    .is_err()
            );
        }
    }
}
