use std::sync::atomic::{AtomicUsize, Ordering};

use seqtune::prelude::*;

use crate::common::{curve, space};

/// Scores the configuration like [`curve`] and shifts each fold by its seed.
struct Folded {
    fold_runs: AtomicUsize,
}

impl Objective for Folded {
    type Error = Error;

    fn evaluate(
        &self,
        config: &Configuration,
        reporter: &mut Reporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<f64> {
        curve(config, reporter, cancel)
    }

    fn evaluate_fold(
        &self,
        config: &Configuration,
        fold: Fold,
        reporter: &mut Reporter<'_>,
        _cancel: &CancellationToken,
    ) -> Result<f64> {
        self.fold_runs.fetch_add(1, Ordering::SeqCst);
        assert_eq!(config.get_int("fold")?, fold.index as i64);
        let value = config.get_int("hidden")? as f64 + fold.seed as f64;
        reporter.report(1, value)?;
        Ok(value)
    }
}

fn tuner() -> Tuner {
    Tuner::builder()
        .study_name("cv")
        .maximize()
        .space(space())
        .sampler(RandomSampler::with_seed(2))
        .xval_folds(4)
        .xval_seed(10)
        .build()
        .unwrap()
}

#[test]
fn xval_replays_the_best_configuration_per_fold() {
    let tuner = tuner();
    let objective = Folded {
        fold_runs: AtomicUsize::new(0),
    };
    tuner.tune(5, &objective).unwrap();
    let best = tuner.study().best_trial().unwrap();

    let report = tuner.xval(&objective).unwrap();
    assert_eq!(report.study, "cv-xval");
    assert_eq!(report.source_trial, best.id);
    assert_eq!(report.config, best.config);
    let seeds: Vec<u64> = report.folds.iter().map(|f| f.fold.seed).collect();
    assert_eq!(seeds, [10, 11, 12, 13]);
    assert!(report.folds.iter().all(|f| f.state == TrialState::Complete));

    let hidden = best.config.get_int("hidden").unwrap() as f64;
    assert_eq!(report.mean(), Some(hidden + 11.5));
    let std = report.std().unwrap();
    assert!((std - 1.25_f64.sqrt()).abs() < 1e-12);

    // A second replay reuses the stored folds.
    let again = tuner.xval(&objective).unwrap();
    assert_eq!(again, report);
    assert_eq!(objective.fold_runs.load(Ordering::SeqCst), 4);

    let export = tuner.study().export().unwrap();
    assert_eq!(export.xval.len(), 4);
}

#[test]
fn xval_needs_a_complete_trial() {
    let tuner = tuner();
    let failing = |_: &Configuration, _: &mut Reporter<'_>, _: &CancellationToken| {
        Err::<f64, _>("diverged")
    };
    let summary = tuner.tune(2, &failing).unwrap();
    assert_eq!(summary.new.failed, 2);
    assert!(matches!(tuner.xval(&failing), Err(Error::NoCompletedTrials)));
}
