//! Median pruner: stop a trial that is worse than the median of its peers
//! at the same step.

use super::Pruner;
use crate::trial::{History, TrialRecord};
use crate::types::Direction;

/// Prunes when the latest value is worse than the median of the values
/// complete trials reported at the same step.
///
/// # Examples
///
/// ```
/// use seqtune::pruner::MedianPruner;
///
/// let pruner = MedianPruner::new().n_warmup_steps(5).n_min_trials(3);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct MedianPruner {
    n_warmup_steps: u64,
    n_min_trials: usize,
}

impl MedianPruner {
    /// A pruner with no warmup that needs one peer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            n_warmup_steps: 0,
            n_min_trials: 1,
        }
    }

    /// Never prune before this step.
    #[must_use]
    pub fn n_warmup_steps(mut self, n: u64) -> Self {
        self.n_warmup_steps = n;
        self
    }

    /// Minimum number of complete peers at the step.
    #[must_use]
    pub fn n_min_trials(mut self, n: usize) -> Self {
        self.n_min_trials = n.max(1);
        self
    }
}

impl Default for MedianPruner {
    fn default() -> Self {
        Self::new()
    }
}

impl Pruner for MedianPruner {
    fn should_prune(&self, trial: &TrialRecord, history: &History<'_>) -> bool {
        let Some(&(step, current)) = trial.trajectory.last() else {
            return false;
        };
        if step < self.n_warmup_steps {
            return false;
        }

        let mut values: Vec<f64> = history
            .completed()
            .filter(|t| t.id != trial.id)
            .filter_map(|t| t.value_at(step))
            .collect();
        if values.len() < self.n_min_trials {
            return false;
        }

        let median = compute_median(&mut values);
        match history.direction() {
            Direction::Minimize => current > median,
            Direction::Maximize => current < median,
        }
    }
}

fn compute_median(values: &mut [f64]) -> f64 {
    values.sort_unstable_by(f64::total_cmp);
    let len = values.len();
    if len % 2 == 1 {
        values[len / 2]
    } else {
        f64::midpoint(values[len / 2 - 1], values[len / 2])
    }
}
