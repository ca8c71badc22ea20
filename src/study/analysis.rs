use core::fmt;

use serde::{Deserialize, Serialize};

use super::Study;
use crate::error::{Error, Result};
use crate::trial::{History, TrialRecord};
use crate::types::TrialState;

/// Number of trials in each lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    /// Trials still running (or abandoned by a crashed worker).
    pub running: usize,
    /// Trials that finished normally.
    pub complete: usize,
    /// Trials stopped by the pruner.
    pub pruned: usize,
    /// Trials whose objective failed.
    pub failed: usize,
}

impl StateCounts {
    /// Tallies the states of `trials`.
    #[must_use]
    pub fn from_trials<'a>(trials: impl IntoIterator<Item = &'a TrialRecord>) -> Self {
        let mut counts = Self::default();
        for trial in trials {
            match trial.state {
                TrialState::Running => counts.running += 1,
                TrialState::Complete => counts.complete += 1,
                TrialState::Pruned => counts.pruned += 1,
                TrialState::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// All trials.
    #[must_use]
    pub fn total(&self) -> usize {
        self.running + self.complete + self.pruned + self.failed
    }
}

impl fmt::Display for StateCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "complete={} pruned={} failed={} running={}",
            self.complete, self.pruned, self.failed, self.running
        )
    }
}

/// The best `COMPLETE` trial of a snapshot; ties go to the lower id.
pub(crate) fn best_of(history: &History<'_>) -> Option<TrialRecord> {
    let direction = history.direction();
    history
        .completed()
        .min_by(|a, b| {
            direction
                .compare(a.value.unwrap_or(f64::NAN), b.value.unwrap_or(f64::NAN))
                .then(a.id.cmp(&b.id))
        })
        .cloned()
}

impl Study {
    /// The `COMPLETE` trial with the best final value.
    ///
    /// Pruned, failed and running trials are never selected.
    ///
    /// # Errors
    ///
    /// [`Error::NoCompletedTrials`] if nothing has completed yet.
    pub fn best_trial(&self) -> Result<TrialRecord> {
        self.with_history(best_of)?
            .ok_or(Error::NoCompletedTrials)
    }

    /// The best final value.
    ///
    /// # Errors
    ///
    /// [`Error::NoCompletedTrials`] if nothing has completed yet.
    pub fn best_value(&self) -> Result<f64> {
        self.best_trial()?.value.ok_or(Error::NoCompletedTrials)
    }

    /// Up to `n` `COMPLETE` trials, best first.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] if the store cannot be read.
    pub fn top_trials(&self, n: usize) -> Result<Vec<TrialRecord>> {
        let direction = self.direction();
        let mut complete: Vec<TrialRecord> = self
            .trials()?
            .into_iter()
            .filter(|t| t.state == TrialState::Complete && t.value.is_some())
            .collect();
        complete.sort_by(|a, b| {
            direction
                .compare(a.value.unwrap_or(f64::NAN), b.value.unwrap_or(f64::NAN))
                .then(a.id.cmp(&b.id))
        });
        complete.truncate(n);
        Ok(complete)
    }

    /// `(trial id, value)` for every non-failed trial that reported exactly
    /// at `step`.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] if the store cannot be read.
    pub fn trials_at_step(&self, step: u64) -> Result<Vec<(u64, f64)>> {
        Ok(self
            .trials()?
            .iter()
            .filter(|t| t.state != TrialState::Failed)
            .filter_map(|t| t.value_at(step).map(|v| (t.id, v)))
            .collect())
    }

    /// Trial counts by state.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] if the store cannot be read.
    pub fn state_counts(&self) -> Result<StateCounts> {
        Ok(StateCounts::from_trials(&self.trials()?))
    }
}
