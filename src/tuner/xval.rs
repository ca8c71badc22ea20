//! Cross-validation replay of the best configuration.

use serde::{Deserialize, Serialize};

use super::{Tuner, execute};
use crate::error::Result;
use crate::objective::{Fold, Objective};
use crate::param::Configuration;
use crate::pruner::NopPruner;
use crate::space::FieldGroup;
use crate::study::Study;
use crate::types::TrialState;

/// The replay of one fold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    /// The fold that was evaluated.
    pub fold: Fold,
    /// Trial id in the cross-validation study.
    pub trial_id: u64,
    /// `Complete` or `Failed`.
    pub state: TrialState,
    /// Final metric of a complete fold.
    pub value: Option<f64>,
}

/// Per-fold results of [`Tuner::xval`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct XvalReport {
    /// Name of the study holding the fold trials.
    pub study: String,
    /// Id of the replayed trial in the tuned study.
    pub source_trial: u64,
    /// The replayed configuration.
    pub config: Configuration,
    /// One entry per fold, in fold order.
    pub folds: Vec<FoldResult>,
}

impl XvalReport {
    fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.folds
            .iter()
            .filter(|f| f.state == TrialState::Complete)
            .filter_map(|f| f.value)
    }

    /// Mean over complete folds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> Option<f64> {
        let (sum, n) = self.values().fold((0.0, 0_usize), |(s, n), v| (s + v, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    /// Population standard deviation over complete folds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn std(&self) -> Option<f64> {
        let mean = self.mean()?;
        let (sq, n) = self
            .values()
            .fold((0.0, 0_usize), |(s, n), v| (s + (v - mean).powi(2), n + 1));
        Some((sq / n as f64).sqrt())
    }
}

impl Tuner {
    /// Replays the best `COMPLETE` configuration once per fold, without
    /// pruning.
    ///
    /// Folds live in the sibling study [`Study::xval_name`] with the
    /// configuration extended by a `fold` field. A fold already completed
    /// for the same configuration is reused instead of rerun.
    ///
    /// # Errors
    ///
    /// - [`Error::NoCompletedTrials`](crate::Error::NoCompletedTrials) when
    ///   nothing has completed.
    /// - [`Error::StudyMismatch`](crate::Error::StudyMismatch) when the
    ///   sibling study was created with a different fold count.
    /// - [`Error::Persistence`](crate::Error::Persistence) on store failures.
    #[allow(clippy::cast_possible_wrap)]
    pub fn xval<O>(&self, objective: &O) -> Result<XvalReport>
    where
        O: Objective + ?Sized,
    {
        let best = self.study.best_trial()?;
        let max_fold = self.xval_folds as i64 - 1;
        let space = self
            .space
            .with_group(FieldGroup::new("xval").int_range("fold", 0, max_fold, 1))?;
        let xval_study = Study::open_or_create(
            self.study.storage().clone(),
            &self.study.xval_name(),
            self.study.direction(),
            &space,
        )?;
        let existing = xval_study.trials()?;

        let mut folds = Vec::with_capacity(self.xval_folds);
        for index in 0..self.xval_folds {
            let fold = Fold {
                index,
                seed: self.xval_seed.wrapping_add(index as u64),
            };
            let config = best.config.clone().with("fold", index as i64);

            let reused = existing
                .iter()
                .find(|t| t.state == TrialState::Complete && t.config == config);
            let record = match reused {
                Some(trial) => trial.clone(),
                None => {
                    let trial_id = xval_study.create_trial()?;
                    execute(
                        &xval_study,
                        &NopPruner,
                        trial_id,
                        &config,
                        |config, reporter, cancel| {
                            objective.evaluate_fold(config, fold, reporter, cancel)
                        },
                    )?
                }
            };
            trace_info!(
                study = xval_study.name(),
                fold = index,
                state = %record.state,
                value = record.value,
                "xval fold finished"
            );
            folds.push(FoldResult {
                fold,
                trial_id: record.id,
                state: record.state,
                value: record.value,
            });
        }

        Ok(XvalReport {
            study: xval_study.name().to_string(),
            source_trial: best.id,
            config: best.config,
            folds,
        })
    }
}
