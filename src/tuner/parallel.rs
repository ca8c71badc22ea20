use core::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;

use super::{TuneSummary, Tuner};
use crate::error::{Error, Result};
use crate::objective::Objective;
use crate::trial::TrialRecord;

impl Tuner {
    /// Runs up to `n_trials` trials with at most `n_workers` in flight.
    ///
    /// Each trial runs on tokio's blocking pool via
    /// [`spawn_blocking`](tokio::task::spawn_blocking); results are
    /// collected through a [`JoinSet`]. The study store is the only state
    /// workers share, so trials may finish in any order.
    ///
    /// A worker slot is only reused after its trial has been booked, so a
    /// fatal error, the timeout or a `Break` from [`Objective::after_trial`]
    /// is always seen before the next launch. Trials already in flight are
    /// drained before returning.
    ///
    /// # Errors
    ///
    /// The first fatal error of any worker (see [`Tuner::tune`]), or
    /// [`Error::TaskError`] if a worker panics.
    ///
    /// # Panics
    ///
    /// Panics if `n_workers` is 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use seqtune::prelude::*;
    ///
    /// # #[tokio::main(flavor = "multi_thread")]
    /// # async fn main() -> seqtune::Result<()> {
    /// let space = SearchSpace::new(vec![FieldGroup::new("m").int_range("layers", 1, 4, 1)])?;
    /// let tuner = Tuner::builder().space(space).build()?;
    ///
    /// let objective = |config: &Configuration, _: &mut Reporter<'_>, _: &CancellationToken| {
    ///     config.get_int("layers").map(|l| l as f64)
    /// };
    /// let summary = tuner.tune_parallel(8, 4, objective).await?;
    /// assert_eq!(summary.n_new_trials, 8);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn tune_parallel<O>(
        &self,
        n_trials: usize,
        n_workers: usize,
        objective: O,
    ) -> Result<TuneSummary>
    where
        O: Objective + Send + Sync + 'static,
    {
        assert!(n_workers > 0, "n_workers must be at least 1");

        let started = Instant::now();
        let objective = Arc::new(objective);
        let mut join_set: JoinSet<Result<TrialRecord>> = JoinSet::new();
        let mut finished = Vec::with_capacity(n_trials);
        let mut first_error: Option<Error> = None;
        let mut stop = false;
        let mut timed_out = false;
        let mut spawned = 0;

        while spawned < n_trials {
            while let Some(joined) = join_set.try_join_next() {
                stop |= self.collect(joined, &*objective, &mut finished, &mut first_error);
            }
            // Every worker busy: wait for one and book it before relaunching.
            while !stop && join_set.len() >= n_workers {
                let Some(joined) = join_set.join_next().await else {
                    break;
                };
                stop |= self.collect(joined, &*objective, &mut finished, &mut first_error);
            }
            if stop {
                break;
            }
            if self.deadline_passed(started) {
                timed_out = true;
                break;
            }

            let tuner = self.clone();
            let obj = Arc::clone(&objective);
            join_set.spawn(async move {
                tokio::task::spawn_blocking(move || tuner.run_trial(&*obj))
                    .await
                    .map_err(|e| Error::TaskError(e.to_string()))?
            });
            spawned += 1;
        }

        // Drain remaining in-flight tasks.
        while let Some(joined) = join_set.join_next().await {
            self.collect(joined, &*objective, &mut finished, &mut first_error);
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        finished.sort_by_key(|t| t.id);
        self.summarize(&finished, timed_out)
    }

    /// Books one joined task; returns `true` when launching should stop.
    fn collect<O>(
        &self,
        joined: core::result::Result<Result<TrialRecord>, tokio::task::JoinError>,
        objective: &O,
        finished: &mut Vec<TrialRecord>,
        first_error: &mut Option<Error>,
    ) -> bool
    where
        O: Objective + ?Sized,
    {
        let outcome = joined.map_err(|e| Error::TaskError(e.to_string())).and_then(|r| r);
        match outcome {
            Ok(record) => {
                let flow = objective.after_trial(&self.study, &record);
                finished.push(record);
                matches!(flow, ControlFlow::Break(()))
            }
            Err(e) => {
                trace_warn!(error = %e, "worker stopped the tune loop");
                first_error.get_or_insert(e);
                true
            }
        }
    }
}
