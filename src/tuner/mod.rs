//! The tune loop: draw, evaluate, prune, persist.

use core::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::objective::Objective;
use crate::param::Configuration;
use crate::pruner::Pruner;
use crate::sampler::Sampler;
use crate::space::SearchSpace;
use crate::study::{StateCounts, Study};
use crate::trial::{CancellationToken, History, Reporter, TrialRecord};
use crate::types::TrialState;

mod builder;
#[cfg(feature = "async")]
mod parallel;
mod xval;

pub use builder::TunerBuilder;
pub use xval::{FoldResult, XvalReport};

/// Drives a study: draws configurations, runs the objective, applies the
/// pruner and persists every outcome.
///
/// A tuner is cheap to clone; clones share the study, sampler and pruner.
///
/// # Examples
///
/// ```
/// use seqtune::prelude::*;
///
/// let space = SearchSpace::new(vec![
///     FieldGroup::new("optimizer").categorical("lr", [1e-4, 1e-3, 1e-2]),
/// ])
/// .unwrap();
/// let tuner = Tuner::builder().study_name("lr-sweep").space(space).build().unwrap();
///
/// let summary = tuner
///     .tune(6, &|config: &Configuration, _: &mut Reporter<'_>, _: &CancellationToken| {
///         config.get_float("lr").map(|lr| (lr.log10() + 3.0).abs())
///     })
///     .unwrap();
/// assert_eq!(summary.new.complete, 6);
/// ```
#[derive(Clone)]
pub struct Tuner {
    study: Study,
    space: Arc<SearchSpace>,
    sampler: Arc<dyn Sampler>,
    pruner: Arc<dyn Pruner>,
    timeout: Option<Duration>,
    xval_folds: usize,
    xval_seed: u64,
}

impl core::fmt::Debug for Tuner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tuner")
            .field("study", &self.study)
            .field("fields", &self.space.len())
            .field("timeout", &self.timeout)
            .field("xval_folds", &self.xval_folds)
            .finish_non_exhaustive()
    }
}

/// Outcome of one [`Tuner::tune`] call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TuneSummary {
    /// Study name.
    pub study: String,
    /// Trials started by this call.
    pub n_new_trials: usize,
    /// States of the trials started by this call.
    pub new: StateCounts,
    /// States of every trial in the study, including earlier runs.
    pub total: StateCounts,
    /// Best `COMPLETE` trial of the whole study.
    pub best: Option<TrialRecord>,
    /// Whether the wall-clock timeout stopped the loop early.
    pub timed_out: bool,
}

impl Tuner {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> TunerBuilder {
        TunerBuilder::new()
    }

    /// The study being tuned.
    #[must_use]
    pub fn study(&self) -> &Study {
        &self.study
    }

    /// The search space.
    #[must_use]
    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    /// Runs up to `n_trials` trials one after another.
    ///
    /// Objective errors and non-finite results mark a trial `FAILED` and the
    /// loop moves on. The loop stops early when the timeout elapses or when
    /// [`Objective::after_trial`] breaks.
    ///
    /// # Errors
    ///
    /// Store failures ([`Error::Persistence`]) and sampler failures
    /// ([`Error::DomainExhausted`]) abort the loop; the offending trial is
    /// marked `FAILED` first when the store still accepts writes.
    pub fn tune<O>(&self, n_trials: usize, objective: &O) -> Result<TuneSummary>
    where
        O: Objective + ?Sized,
    {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("tune", study = self.study.name(), n_trials).entered();

        let started = Instant::now();
        let mut finished = Vec::with_capacity(n_trials);
        let mut timed_out = false;
        for _ in 0..n_trials {
            if self.deadline_passed(started) {
                timed_out = true;
                break;
            }
            let record = self.run_trial(objective)?;
            let flow = objective.after_trial(&self.study, &record);
            finished.push(record);
            if let ControlFlow::Break(()) = flow {
                break;
            }
        }
        self.summarize(&finished, timed_out)
    }

    fn deadline_passed(&self, started: Instant) -> bool {
        self.timeout.is_some_and(|t| started.elapsed() >= t)
    }

    pub(crate) fn summarize(&self, finished: &[TrialRecord], timed_out: bool) -> Result<TuneSummary> {
        let trials = self.study.trials()?;
        let history = History::new(self.study.direction(), &trials);
        let summary = TuneSummary {
            study: self.study.name().to_string(),
            n_new_trials: finished.len(),
            new: StateCounts::from_trials(finished),
            total: StateCounts::from_trials(&trials),
            best: crate::study::best_of(&history),
            timed_out,
        };
        trace_info!(
            study = self.study.name(),
            new = %summary.new,
            total = %summary.total,
            best = summary.best.as_ref().and_then(|t| t.value),
            "tune finished"
        );
        Ok(summary)
    }

    /// One full trial lifecycle on the tuned study.
    pub(crate) fn run_trial<O>(&self, objective: &O) -> Result<TrialRecord>
    where
        O: Objective + ?Sized,
    {
        let trial_id = self.study.create_trial()?;
        let snapshot = self.study.trials()?;
        let history = History::new(self.study.direction(), &snapshot);
        let config = match self.space.materialize(&*self.sampler, trial_id, &history) {
            Ok(config) => config,
            Err(e) => {
                trace_warn!(trial_id, error = %e, "configuration could not be drawn");
                self.study.fail_trial(trial_id, &e.to_string())?;
                return Err(e);
            }
        };
        trace_debug!(trial_id, config = %config, "configuration materialized");

        let previous_best = crate::study::best_of(&history).and_then(|t| t.value);
        let record = execute(
            &self.study,
            &*self.pruner,
            trial_id,
            &config,
            |config, reporter, cancel| objective.evaluate(config, reporter, cancel),
        )?;

        if let Some(value) = record.value
            && record.state == TrialState::Complete
            && previous_best.is_none_or(|best| self.study.direction().is_better(value, best))
        {
            trace_info!(trial_id, value, "new best value");
        }
        Ok(record)
    }
}

/// Attaches `config` to `trial_id`, runs `evaluate` and records the
/// terminal state.
///
/// A pruned trial keeps its last reported value whatever `evaluate`
/// returns. Otherwise a finite `Ok` completes the trial and anything else
/// fails it.
pub(crate) fn execute<F, E>(
    study: &Study,
    pruner: &dyn Pruner,
    trial_id: u64,
    config: &Configuration,
    evaluate: F,
) -> Result<TrialRecord>
where
    F: FnOnce(&Configuration, &mut Reporter<'_>, &CancellationToken) -> core::result::Result<f64, E>,
    E: ToString,
{
    study.set_configuration(trial_id, config)?;

    let cancel = CancellationToken::new();
    let mut reporter = Reporter::new(study, pruner, trial_id, cancel.clone());
    let outcome = evaluate(config, &mut reporter, &cancel);

    if let Some(e) = reporter.take_store_error() {
        // Best effort: the store just failed, so this write may fail too.
        let _ = study.finish_trial(trial_id, TrialState::Failed, None);
        return Err(e);
    }

    if reporter.is_pruned() {
        let value = reporter.trajectory().last().map(|&(_, v)| v);
        study.finish_trial(trial_id, TrialState::Pruned, value)?;
    } else {
        match outcome {
            Ok(v) if v.is_finite() => {
                study.finish_trial(trial_id, TrialState::Complete, Some(v))?;
            }
            Ok(v) => {
                trace_warn!(trial_id, value = v, "objective returned a non-finite value");
                study.fail_trial(trial_id, &format!("objective returned non-finite value {v}"))?;
            }
            Err(e) => {
                let reason = Error::ObjectiveFailure(e.to_string()).to_string();
                trace_warn!(trial_id, error = %reason, "trial failed");
                study.fail_trial(trial_id, &reason)?;
            }
        }
    }
    let record = study.trial(trial_id)?;
    trace_info!(
        study = study.name(),
        trial_id,
        state = %record.state,
        value = record.value,
        "trial finished"
    );
    Ok(record)
}
