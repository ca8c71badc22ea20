//! Uniform random sampler.

use crate::distribution::FieldRule;
use crate::error::Result;
use crate::param::ParamValue;
use crate::rng_util;
use crate::sampler::{Partial, Sampler};
use crate::trial::History;

/// Samples every field uniformly from its domain, ignoring history.
///
/// This is the search baseline and the startup phase of
/// [`TpeSampler`](crate::sampler::tpe::TpeSampler): with equal seeds both
/// produce identical draws until TPE leaves its startup phase.
///
/// # Examples
///
/// ```
/// use seqtune::sampler::RandomSampler;
///
/// let sampler = RandomSampler::with_seed(42);
/// assert_eq!(sampler.seed(), 42);
/// ```
#[derive(Clone, Debug)]
pub struct RandomSampler {
    seed: u64,
}

impl RandomSampler {
    /// Creates a sampler with a random seed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            seed: rng_util::base_seed(None),
        }
    }

    /// Creates a sampler with a fixed seed for reproducibility.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// The base seed of every draw.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for RandomSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for RandomSampler {
    fn suggest(
        &self,
        field: &FieldRule,
        trial_id: u64,
        partial: &Partial<'_>,
        _history: &History<'_>,
    ) -> Result<ParamValue> {
        let mut rng = rng_util::stream(self.seed, trial_id, partial.len());
        super::uniform(field, &mut rng)
    }
}
