//! Pruner trait and implementations for early stopping.
//!
//! Pruners are consulted after every intermediate report. They read the
//! trial's trajectory and a snapshot of the study, and hold no per-trial
//! state of their own: the same snapshot always yields the same decision.

mod hyperband;
mod median;
mod nop;
mod successive_halving;

pub use hyperband::HyperbandPruner;
pub use median::MedianPruner;
pub use nop::NopPruner;
pub use successive_halving::{MaxResource, SuccessiveHalvingPruner};

use crate::trial::{History, TrialRecord};
use crate::types::TrialState;

/// Trait for pluggable trial pruning strategies.
///
/// The trait requires `Send + Sync` so one pruner can serve concurrent workers.
///
/// # Implementing a custom pruner
///
/// ```
/// use seqtune::pruner::Pruner;
/// use seqtune::{History, TrialRecord};
///
/// struct Threshold(f64);
///
/// impl Pruner for Threshold {
///     fn should_prune(&self, trial: &TrialRecord, _history: &History<'_>) -> bool {
///         trial.last_value().is_some_and(|v| v > self.0)
///     }
/// }
/// ```
pub trait Pruner: Send + Sync {
    /// Whether `trial` should stop after its latest report.
    ///
    /// `history` includes `trial` itself as last persisted.
    fn should_prune(&self, trial: &TrialRecord, history: &History<'_>) -> bool;
}

impl<P: Pruner + ?Sized> Pruner for std::sync::Arc<P> {
    fn should_prune(&self, trial: &TrialRecord, history: &History<'_>) -> bool {
        (**self).should_prune(trial, history)
    }
}

/// Rung geometry shared by Successive Halving and each Hyperband bracket.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Rungs {
    pub(crate) min_resource: u64,
    pub(crate) reduction_factor: u64,
    pub(crate) min_early_stopping_rate: u32,
    pub(crate) bootstrap_count: usize,
}

impl Rungs {
    /// Rung steps `min_resource * rf^(rate + k)` up to and including `max_resource`.
    pub(crate) fn steps(&self, max_resource: u64) -> Vec<u64> {
        let mut steps = Vec::new();
        let mut k = self.min_early_stopping_rate;
        while let Some(power) = self.reduction_factor.checked_pow(k) {
            let step = self.min_resource.saturating_mul(power);
            if step > max_resource {
                break;
            }
            steps.push(step);
            if step == u64::MAX {
                break;
            }
            k += 1;
        }
        steps
    }

    /// The rung decision for `trial` against the peers accepted by `in_pool`.
    ///
    /// A trial is judged once per rung, on the report that first reaches it.
    /// `max(1, floor(n / rf))` trials survive, ranked by their value at the
    /// rung in the study direction, earlier ids first on ties.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn should_prune(
        &self,
        trial: &TrialRecord,
        history: &History<'_>,
        max_resource: u64,
        in_pool: impl Fn(&TrialRecord) -> bool,
    ) -> bool {
        let Some(step) = trial.last_step() else {
            return false;
        };
        let Some(&rung_step) = self.steps(max_resource).iter().rev().find(|&&r| r <= step) else {
            return false;
        };
        if rung_step >= max_resource {
            return false;
        }
        // Already judged at this rung by an earlier report.
        let first_past = trial.trajectory.iter().position(|&(s, _)| s >= rung_step);
        if first_past != Some(trial.trajectory.len() - 1) {
            return false;
        }
        let Some(current) = trial.value_at_rung(rung_step) else {
            return false;
        };

        let direction = history.direction();
        let mut pool: Vec<(f64, u64)> = history
            .trials()
            .iter()
            .filter(|t| t.id != trial.id && t.state != TrialState::Failed && in_pool(t))
            .filter_map(|t| t.value_at_rung(rung_step).map(|v| (v, t.id)))
            .collect();
        pool.push((current, trial.id));

        if pool.len() < self.bootstrap_count {
            return false;
        }

        pool.sort_by(|a, b| direction.compare(a.0, b.0).then(a.1.cmp(&b.1)));
        let n_survive = (pool.len() / self.reduction_factor as usize).max(1);
        !pool[..n_survive].iter().any(|&(_, id)| id == trial.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_stop_at_max_resource() {
        let rungs = Rungs {
            min_resource: 10,
            reduction_factor: 3,
            min_early_stopping_rate: 0,
            bootstrap_count: 0,
        };
        assert_eq!(rungs.steps(100), [10, 30, 90]);
        assert_eq!(rungs.steps(90), [10, 30, 90]);
        let later = Rungs {
            min_early_stopping_rate: 1,
            ..rungs
        };
        assert_eq!(later.steps(300), [30, 90, 270]);
    }
}
