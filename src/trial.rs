//! Trial records, the reporting channel and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::param::Configuration;
use crate::pruner::Pruner;
use crate::study::Study;
use crate::types::{Direction, TrialState};

/// One evaluation attempt as persisted in a study.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Id unique within the study, contiguous from 0 in creation order.
    pub id: u64,
    /// The materialized configuration; empty until the trial's fields are drawn.
    pub config: Configuration,
    /// Lifecycle state.
    pub state: TrialState,
    /// Reported `(step, value)` points with strictly increasing steps.
    pub trajectory: Vec<(u64, f64)>,
    /// Final value, present iff the state is `Complete` or `Pruned`.
    pub value: Option<f64>,
    /// Why a `Failed` trial failed, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<String>,
}

impl TrialRecord {
    pub(crate) fn running(id: u64) -> Self {
        Self {
            id,
            config: Configuration::new(),
            state: TrialState::Running,
            trajectory: Vec::new(),
            value: None,
            fail_reason: None,
        }
    }

    /// The last reported step, if any.
    #[must_use]
    pub fn last_step(&self) -> Option<u64> {
        self.trajectory.last().map(|&(s, _)| s)
    }

    /// The last reported value, if any.
    #[must_use]
    pub fn last_value(&self) -> Option<f64> {
        self.trajectory.last().map(|&(_, v)| v)
    }

    /// The value the trial held when it first reached `step`: the value of
    /// the earliest report at or beyond it.
    #[must_use]
    pub fn value_at_rung(&self, step: u64) -> Option<f64> {
        self.trajectory
            .iter()
            .find(|&&(s, _)| s >= step)
            .map(|&(_, v)| v)
    }

    /// The value reported at exactly `step`.
    #[must_use]
    pub fn value_at(&self, step: u64) -> Option<f64> {
        self.trajectory
            .iter()
            .find(|&&(s, _)| s == step)
            .map(|&(_, v)| v)
    }

    /// Whether the trial has reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }
}

/// A read-only view of a study's trials together with its direction.
///
/// Samplers and pruners only ever see trials through this view.
#[derive(Clone, Copy, Debug)]
pub struct History<'a> {
    direction: Direction,
    trials: &'a [TrialRecord],
}

impl<'a> History<'a> {
    /// Wraps a snapshot of trials.
    #[must_use]
    pub fn new(direction: Direction, trials: &'a [TrialRecord]) -> Self {
        Self { direction, trials }
    }

    /// An empty minimization history.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Direction::Minimize, &[])
    }

    /// The optimization direction of the study.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Every trial in the snapshot, in id order.
    #[must_use]
    pub fn trials(&self) -> &'a [TrialRecord] {
        self.trials
    }

    /// `COMPLETE` trials with a finite final value.
    pub fn completed(&self) -> impl Iterator<Item = &'a TrialRecord> {
        self.trials.iter().filter(|t| {
            t.state == TrialState::Complete && t.value.is_some_and(f64::is_finite)
        })
    }

    /// `PRUNED` trials.
    pub fn pruned(&self) -> impl Iterator<Item = &'a TrialRecord> {
        self.trials
            .iter()
            .filter(|t| t.state == TrialState::Pruned)
    }

    /// Number of `COMPLETE` trials.
    #[must_use]
    pub fn n_completed(&self) -> usize {
        self.completed().count()
    }
}

/// A shared, idempotent stop flag polled by the objective between steps.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Returns `true` only for the call that set the flag.
    pub fn cancel(&self) -> bool {
        !self.flag.swap(true, Ordering::AcqRel)
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// The pruner's answer to one intermediate report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Keep training.
    Continue,
    /// Stop now; the trial has been marked for pruning and its token cancelled.
    Prune,
}

/// The reporting channel handed to an objective for one trial.
///
/// Each accepted report is persisted before the pruner is consulted, so
/// the pruner (and any concurrent worker) sees a consistent trajectory.
pub struct Reporter<'a> {
    study: &'a Study,
    pruner: &'a dyn Pruner,
    trial_id: u64,
    trajectory: Vec<(u64, f64)>,
    cancel: CancellationToken,
    pruned: bool,
    store_error: Option<String>,
}

impl core::fmt::Debug for Reporter<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Reporter")
            .field("study", &self.study.name())
            .field("trial_id", &self.trial_id)
            .field("trajectory", &self.trajectory)
            .field("pruned", &self.pruned)
            .finish_non_exhaustive()
    }
}

impl<'a> Reporter<'a> {
    pub(crate) fn new(
        study: &'a Study,
        pruner: &'a dyn Pruner,
        trial_id: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            study,
            pruner,
            trial_id,
            trajectory: Vec::new(),
            cancel,
            pruned: false,
            store_error: None,
        }
    }

    /// Records the metric reached at `step` and asks the pruner whether to go on.
    ///
    /// # Errors
    ///
    /// - [`Error::TrialCancelled`] once the trial's token is set (including
    ///   after a prune verdict).
    /// - [`Error::NonFiniteValue`] for NaN or infinite values.
    /// - [`Error::NonIncreasingStep`] when `step` does not exceed the last step.
    /// - [`Error::Persistence`] when the point cannot be stored.
    pub fn report(&mut self, step: u64, value: f64) -> Result<Verdict> {
        if self.cancel.is_cancelled() {
            return Err(Error::TrialCancelled {
                trial_id: self.trial_id,
            });
        }
        if !value.is_finite() {
            return Err(Error::NonFiniteValue {
                trial_id: self.trial_id,
            });
        }
        if let Some(&(last, _)) = self.trajectory.last()
            && step <= last
        {
            return Err(Error::NonIncreasingStep {
                trial_id: self.trial_id,
                step,
                last,
            });
        }

        let prune = match self.record(step, value) {
            Ok(prune) => prune,
            Err(e) => {
                self.store_error = Some(e.to_string());
                return Err(e);
            }
        };
        if prune {
            self.pruned = true;
            self.cancel.cancel();
            trace_info!(
                study = self.study.name(),
                trial_id = self.trial_id,
                step,
                value,
                "trial pruned"
            );
            return Ok(Verdict::Prune);
        }
        Ok(Verdict::Continue)
    }

    /// Persists the point, then asks the pruner about the fresh snapshot.
    fn record(&mut self, step: u64, value: f64) -> Result<bool> {
        self.study.append_intermediate(self.trial_id, step, value)?;
        self.trajectory.push((step, value));

        let snapshot = self.study.trials()?;
        let history = History::new(self.study.direction(), &snapshot);
        let current = snapshot
            .iter()
            .find(|t| t.id == self.trial_id)
            .ok_or(Error::UnknownTrial {
                trial_id: self.trial_id,
            })?;
        Ok(self.pruner.should_prune(current, &history))
    }

    /// The id of the trial being reported on.
    #[must_use]
    pub fn trial_id(&self) -> u64 {
        self.trial_id
    }

    /// Points accepted so far.
    #[must_use]
    pub fn trajectory(&self) -> &[(u64, f64)] {
        &self.trajectory
    }

    /// Whether a report was answered with [`Verdict::Prune`].
    #[must_use]
    pub fn is_pruned(&self) -> bool {
        self.pruned
    }

    /// The study store failure hit while reporting, if any. The history can
    /// no longer be trusted once this is set.
    pub(crate) fn take_store_error(&mut self) -> Option<Error> {
        self.store_error.take().map(Error::Persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_idempotent() {
        let token = CancellationToken::new();
        let shared = token.clone();
        assert!(!shared.is_cancelled());
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(shared.is_cancelled());
    }

    #[test]
    fn rung_value_uses_first_report_at_or_past_step() {
        let mut t = TrialRecord::running(0);
        t.trajectory = vec![(5, 0.1), (12, 0.4), (30, 0.9)];
        assert_eq!(t.value_at_rung(10), Some(0.4));
        assert_eq!(t.value_at_rung(30), Some(0.9));
        assert_eq!(t.value_at_rung(31), None);
        assert_eq!(t.value_at(12), Some(0.4));
        assert_eq!(t.value_at(10), None);
    }

    #[test]
    fn history_filters_by_state() {
        let mut done = TrialRecord::running(0);
        done.state = TrialState::Complete;
        done.value = Some(1.0);
        let mut failed = TrialRecord::running(1);
        failed.state = TrialState::Failed;
        let mut pruned = TrialRecord::running(2);
        pruned.state = TrialState::Pruned;
        pruned.value = Some(0.2);
        let running = TrialRecord::running(3);
        let trials = [done, failed, pruned, running];
        let history = History::new(Direction::Maximize, &trials);
        assert_eq!(history.n_completed(), 1);
        assert_eq!(history.pruned().map(|t| t.id).collect::<Vec<_>>(), [2]);
    }
}
