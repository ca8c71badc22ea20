//! Hyperband pruner: several Successive Halving brackets run side by side.
//!
//! A single SHA run bets on one `min_resource`. Hyperband hedges that bet
//! by splitting trials over `n_brackets = floor(log_rf(max / min)) + 1`
//! brackets. Bracket `b` starts pruning at `min_resource * rf^b`, so bracket
//! 0 is the most aggressive and the last bracket barely prunes.
//!
//! Trials are assigned to brackets deterministically from their id, in
//! proportion to each bracket's budget `ceil(n_brackets * rf^s / (s + 1))`
//! with `s = n_brackets - 1 - b`. A trial only competes with trials of its
//! own bracket.
//!
//! # Example
//!
//! ```
//! use seqtune::pruner::{HyperbandPruner, MaxResource};
//!
//! let pruner = HyperbandPruner::new()
//!     .min_resource(10)
//!     .reduction_factor(3)
//!     .max_resource(MaxResource::Fixed(270));
//! assert_eq!(pruner.n_brackets(270), 4);
//! ```

use super::{MaxResource, Pruner, Rungs};
use crate::trial::{History, TrialRecord};

/// Hyperband pruner.
#[derive(Clone, Debug)]
pub struct HyperbandPruner {
    min_resource: u64,
    reduction_factor: u64,
    bootstrap_count: usize,
    max_resource: MaxResource,
}

impl HyperbandPruner {
    /// Create a pruner with `min_resource = 1`, `reduction_factor = 3` and
    /// an automatic `max_resource`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            min_resource: 1,
            reduction_factor: 3,
            bootstrap_count: 0,
            max_resource: MaxResource::Auto,
        }
    }

    /// Set the minimum resource of the most aggressive bracket.
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

    /// Require `n` trials at a rung (within a bracket) before it prunes.
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

    /// Number of brackets for a resolved budget.
    #[must_use]
    pub fn n_brackets(&self, max_resource: u64) -> u32 {
        let mut n = 1;
        let mut step = self.min_resource;
        while let Some(next) = step.checked_mul(self.reduction_factor) {
            if next > max_resource {
                break;
            }
            step = next;
            n += 1;
        }
        n
    }

    fn budgets(&self, n_brackets: u32) -> Vec<u64> {
        (0..n_brackets)
            .map(|b| {
                let s = n_brackets - 1 - b;
                let power = self.reduction_factor.checked_pow(s).unwrap_or(u64::MAX);
                let weight = u64::from(n_brackets).saturating_mul(power);
                weight.div_ceil(u64::from(s) + 1)
            })
            .collect()
    }

    /// The bracket that `trial_id` belongs to.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn bracket_of(&self, trial_id: u64, max_resource: u64) -> u32 {
        let n_brackets = self.n_brackets(max_resource);
        let budgets = self.budgets(n_brackets);
        let total: u64 = budgets.iter().fold(0, |acc, b| acc.saturating_add(*b));
        let mut slot = trial_id % total.max(1);
        for (b, budget) in budgets.iter().enumerate() {
            if slot < *budget {
                return b as u32;
            }
            slot -= budget;
        }
        n_brackets - 1
    }

    fn rungs(&self, bracket: u32) -> Rungs {
        Rungs {
            min_resource: self.min_resource,
            reduction_factor: self.reduction_factor,
            min_early_stopping_rate: bracket,
            bootstrap_count: self.bootstrap_count,
        }
    }
}

impl Default for HyperbandPruner {
    fn default() -> Self {
        Self::new()
    }
}

impl Pruner for HyperbandPruner {
    fn should_prune(&self, trial: &TrialRecord, history: &History<'_>) -> bool {
        let Some(max_resource) = self.max_resource.resolve(history) else {
            return false;
        };
        let bracket = self.bracket_of(trial.id, max_resource);
        self.rungs(bracket)
            .should_prune(trial, history, max_resource, |peer| {
                self.bracket_of(peer.id, max_resource) == bracket
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::Configuration;
    use crate::types::{Direction, TrialState};

    fn pruner() -> HyperbandPruner {
        HyperbandPruner::new()
            .min_resource(10)
            .reduction_factor(3)
            .max_resource(MaxResource::Fixed(270))
    }

    #[test]
    fn bracket_budgets_favour_aggressive_brackets() {
        let p = pruner();
        assert_eq!(p.n_brackets(270), 4);
        // s = 3, 2, 1, 0
        assert_eq!(p.budgets(4), [27, 12, 6, 4]);
        assert_eq!(p.bracket_of(0, 270), 0);
        assert_eq!(p.bracket_of(26, 270), 0);
        assert_eq!(p.bracket_of(27, 270), 1);
        assert_eq!(p.bracket_of(44, 270), 2);
        assert_eq!(p.bracket_of(45, 270), 3);
        assert_eq!(p.bracket_of(49, 270), 0);
    }

    #[test]
    fn single_bracket_when_budget_equals_min_resource() {
        let p = pruner();
        assert_eq!(p.n_brackets(10), 1);
        assert_eq!(p.bracket_of(123, 10), 0);
    }

    #[test]
    fn compares_only_within_bracket() {
        let p = pruner();
        // Trial 27 is alone in bracket 1, whose first rung is step 30.
        let mut trials: Vec<TrialRecord> = (0..27)
            .map(|id| TrialRecord {
                id,
                config: Configuration::new(),
                state: TrialState::Pruned,
                trajectory: vec![(30, 9.0)],
                value: Some(9.0),
                fail_reason: None,
            })
            .collect();
        let current = TrialRecord {
            id: 27,
            config: Configuration::new(),
            state: TrialState::Running,
            trajectory: vec![(30, 1.0)],
            value: None,
            fail_reason: None,
        };
        trials.push(current.clone());
        let history = History::new(Direction::Maximize, &trials);
        assert!(!p.should_prune(&current, &history));

        // The same report from a bracket-0 trial loses to its bracket peers.
        let mut low = current.clone();
        low.id = 26;
        trials[26] = low.clone();
        let history = History::new(Direction::Maximize, &trials);
        assert!(p.should_prune(&low, &history));
    }
}
