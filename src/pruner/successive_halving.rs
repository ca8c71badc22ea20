//! Successive Halving (SHA) pruner: budget-aware pruning at exponential rungs.
//!
//! Trials are compared at exponentially spaced rungs. At each rung only the
//! top `1 / reduction_factor` of the trials that reached it survive.
//!
//! With `min_resource = 10`, `reduction_factor = 3`, `max_resource = 270`:
//!
//! | Rung | Step | Survivors |
//! |------|------|-----------|
//! | 0 | 10 | top 1/3 |
//! | 1 | 30 | top 1/3 |
//! | 2 | 90 | top 1/3 |
//! | 3 | 270 | all (full budget) |
//!
//! # Configuration
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `min_resource` | 1 | Step of the first rung |
//! | `reduction_factor` | 3 | Keep the top `1 / rf` at each rung |
//! | `min_early_stopping_rate` | 0 | Skip the first N rungs |
//! | `bootstrap_count` | 0 | Trials that must reach a rung before it prunes |
//! | `max_resource` | `Auto` | Full budget; no pruning at this rung |

use serde::{Deserialize, Serialize};

use super::{Pruner, Rungs};
use crate::trial::{History, TrialRecord};

/// The full training budget of a trial.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxResource {
    /// The last reported step of the earliest complete trial. Nothing is
    /// pruned until such a trial exists.
    #[default]
    Auto,
    /// A fixed step count.
    Fixed(u64),
}

impl MaxResource {
    /// Resolves the budget against the study history.
    #[must_use]
    pub fn resolve(self, history: &History<'_>) -> Option<u64> {
        match self {
            MaxResource::Fixed(v) => Some(v),
            MaxResource::Auto => history
                .completed()
                .min_by_key(|t| t.id)
                .and_then(TrialRecord::last_step),
        }
    }
}

/// Successive Halving pruner.
///
/// # Examples
///
/// ```
/// use seqtune::pruner::{MaxResource, SuccessiveHalvingPruner};
///
/// let pruner = SuccessiveHalvingPruner::new()
///     .min_resource(10)
///     .reduction_factor(3)
///     .max_resource(MaxResource::Fixed(270));
/// assert_eq!(pruner.rung_steps(270), [10, 30, 90, 270]);
/// ```
#[derive(Clone, Debug)]
pub struct SuccessiveHalvingPruner {
    min_resource: u64,
    reduction_factor: u64,
    min_early_stopping_rate: u32,
    bootstrap_count: usize,
    max_resource: MaxResource,
}

impl SuccessiveHalvingPruner {
    /// Create a pruner with `min_resource = 1`, `reduction_factor = 3` and
    /// an automatic `max_resource`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            min_resource: 1,
            reduction_factor: 3,
            min_early_stopping_rate: 0,
            bootstrap_count: 0,
            max_resource: MaxResource::Auto,
        }
    }

    /// Set the step of the first rung.
    ///
    /// # Panics
    ///
    /// Panics if `r` is 0.
    #[must_use]
    pub fn min_resource(mut self, r: u64) -> Self {
        assert!(r > 0, "min_resource must be > 0, got {r}");
        self.min_resource = r;
        self
    }

    /// Set the reduction factor (eta).
    ///
    /// # Panics
    ///
    /// Panics if `eta` is less than 2.
    #[must_use]
    pub fn reduction_factor(mut self, eta: u64) -> Self {
        assert!(eta >= 2, "reduction_factor must be >= 2, got {eta}");
        self.reduction_factor = eta;
        self
    }

    /// Skip the first `n` rungs.
    #[must_use]
    pub fn min_early_stopping_rate(mut self, n: u32) -> Self {
        self.min_early_stopping_rate = n;
        self
    }

    /// Require `n` trials at a rung before it prunes anyone.
    #[must_use]
    pub fn bootstrap_count(mut self, n: usize) -> Self {
        self.bootstrap_count = n;
        self
    }

    /// Set the full budget.
    ///
    /// # Panics
    ///
    /// Panics on `MaxResource::Fixed(0)`.
    #[must_use]
    pub fn max_resource(mut self, max: MaxResource) -> Self {
        assert!(max != MaxResource::Fixed(0), "max_resource must be > 0");
        self.max_resource = max;
        self
    }

    /// Rung steps for a resolved budget.
    #[must_use]
    pub fn rung_steps(&self, max_resource: u64) -> Vec<u64> {
        self.rungs().steps(max_resource)
    }

    fn rungs(&self) -> Rungs {
        Rungs {
            min_resource: self.min_resource,
            reduction_factor: self.reduction_factor,
            min_early_stopping_rate: self.min_early_stopping_rate,
            bootstrap_count: self.bootstrap_count,
        }
    }
}

impl Default for SuccessiveHalvingPruner {
    fn default() -> Self {
        Self::new()
    }
}

impl Pruner for SuccessiveHalvingPruner {
    fn should_prune(&self, trial: &TrialRecord, history: &History<'_>) -> bool {
        let Some(max_resource) = self.max_resource.resolve(history) else {
            return false;
        };
        self.rungs().should_prune(trial, history, max_resource, |_| true)
    }
}
