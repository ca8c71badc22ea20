//! The [`Objective`] trait: the training run a trial evaluates.
//!
//! An objective receives the materialized [`Configuration`], a [`Reporter`]
//! for intermediate metrics and the trial's [`CancellationToken`]. It must
//! report with strictly increasing steps and poll the token between steps.
//! When the pruner stops the trial the token is set and further reports
//! fail, so the objective should return promptly; whatever it returns is
//! then ignored and the trial is recorded as pruned.
//!
//! Closures with the matching signature implement the trait directly:
//!
//! ```
//! use seqtune::prelude::*;
//!
//! let objective = |config: &Configuration, reporter: &mut Reporter<'_>, cancel: &CancellationToken| {
//!     let lr = config.get_float("lr")?;
//!     let mut loss = 1.0;
//!     for epoch in 1..=20 {
//!         if cancel.is_cancelled() {
//!             break;
//!         }
//!         loss *= 1.0 - lr;
//!         reporter.report(epoch, loss)?;
//!     }
//!     Ok::<_, Error>(loss)
//! };
//! # let _ = objective;
//! ```
//!
//! Implement the trait on a struct to use the fold seed during
//! cross-validation or to stop the tune loop from a hook:
//!
//! ```
//! use std::ops::ControlFlow;
//!
//! use seqtune::prelude::*;
//!
//! struct Trainer {
//!     target: f64,
//! }
//!
//! impl Objective for Trainer {
//!     type Error = Error;
//!
//!     fn evaluate(
//!         &self,
//!         config: &Configuration,
//!         reporter: &mut Reporter<'_>,
//!         _cancel: &CancellationToken,
//!     ) -> Result<f64> {
//!         let v = config.get_int("layers")? as f64;
//!         reporter.report(1, v)?;
//!         Ok(v)
//!     }
//!
//!     fn after_trial(&self, _study: &Study, trial: &TrialRecord) -> ControlFlow<()> {
//!         match trial.value {
//!             Some(v) if v >= self.target => ControlFlow::Break(()),
//!             _ => ControlFlow::Continue(()),
//!         }
//!     }
//! }
//! ```

use core::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use crate::param::Configuration;
use crate::study::Study;
use crate::trial::{CancellationToken, Reporter, TrialRecord};

/// One cross-validation fold of a replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    /// Zero-based fold index.
    pub index: usize,
    /// Seed the objective should use for data splits and initialization.
    pub seed: u64,
}

/// A trainable objective evaluated once per trial.
///
/// # Thread safety
///
/// [`Tuner::tune_parallel`](crate::Tuner::tune_parallel) additionally
/// requires `Send + Sync + 'static`. The sequential loop has no such bound.
pub trait Objective {
    /// The error type returned by [`evaluate`](Objective::evaluate). Its
    /// text becomes the failure reason of a `FAILED` trial.
    type Error: ToString + 'static;

    /// Train on `config`, reporting intermediate values, and return the
    /// final metric.
    ///
    /// # Errors
    ///
    /// Any error marks the trial `FAILED`, unless the trial was pruned first.
    fn evaluate(
        &self,
        config: &Configuration,
        reporter: &mut Reporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<f64, Self::Error>;

    /// Evaluate one cross-validation fold. `config` carries the replayed
    /// configuration plus a `fold` field.
    ///
    /// Default: [`evaluate`](Objective::evaluate).
    ///
    /// # Errors
    ///
    /// Any error marks the fold `FAILED`.
    fn evaluate_fold(
        &self,
        config: &Configuration,
        _fold: Fold,
        reporter: &mut Reporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<f64, Self::Error> {
        self.evaluate(config, reporter, cancel)
    }

    /// Called after every finished trial of a tune loop.
    ///
    /// Return `ControlFlow::Break(())` to stop launching new trials.
    ///
    /// Default: always continues.
    fn after_trial(&self, _study: &Study, _trial: &TrialRecord) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

impl<F, E> Objective for F
where
    F: Fn(&Configuration, &mut Reporter<'_>, &CancellationToken) -> Result<f64, E>,
    E: ToString + 'static,
{
    type Error = E;

    fn evaluate(
        &self,
        config: &Configuration,
        reporter: &mut Reporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<f64, E> {
        self(config, reporter, cancel)
    }
}
