use seqtune::prelude::*;
use seqtune::storage;

use crate::common::{curve, space};

fn round_trip(location: &str) {
    let tuner = Tuner::builder()
        .study_name("durable")
        .maximize()
        .space(space())
        .sampler(RandomSampler::with_seed(11))
        .pruner(
            SuccessiveHalvingPruner::new()
                .min_resource(1)
                .reduction_factor(2)
                .max_resource(MaxResource::Fixed(4)),
        )
        .shared_storage(storage::open(location).unwrap())
        .build()
        .unwrap();
    tuner.tune(6, &curve).unwrap();
    let before = tuner.study().trials().unwrap();
    drop(tuner);

    let reopened = Study::open(storage::open(location).unwrap(), "durable").unwrap();
    assert_eq!(reopened.direction(), Direction::Maximize);
    assert_eq!(reopened.trials().unwrap(), before);
    assert_eq!(
        reopened.storage().study_names().unwrap(),
        vec!["durable".to_string()]
    );
    for trial in &before {
        assert!(trial.is_finished());
        assert_eq!(trial.value.is_some(), trial.state.has_value());
    }
}

#[test]
fn journal_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    round_trip(&format!("journal:{}", dir.path().join("study.jsonl").display()));
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    round_trip(&format!("sqlite:///{}", dir.path().join("study.db").display()));
}

/// Reports full-precision noise, the way real training losses look.
fn noisy(_: &Configuration, reporter: &mut Reporter<'_>, _: &CancellationToken) -> Result<f64> {
    let mut rng = fastrand::Rng::with_seed(reporter.trial_id());
    let mut value = 0.0;
    for step in 1..=100_u64 {
        value = rng.f64() * 2e3 - 1e3 + 1e-3;
        reporter.report(step, value)?;
    }
    Ok(value)
}

fn floats_survive_reopen(location: &str) {
    let tuner = Tuner::builder()
        .study_name("noisy")
        .space(space())
        .shared_storage(storage::open(location).unwrap())
        .build()
        .unwrap();
    tuner.tune(5, &noisy).unwrap();
    let before = tuner.study().trials().unwrap();
    drop(tuner);

    let reopened = Study::open(storage::open(location).unwrap(), "noisy").unwrap();
    let after = reopened.trials().unwrap();
    assert_eq!(after.len(), before.len());
    for (a, b) in after.iter().zip(&before) {
        assert_eq!(a.trajectory.len(), 100);
        for (&(sa, va), &(sb, vb)) in a.trajectory.iter().zip(&b.trajectory) {
            assert_eq!(sa, sb);
            assert_eq!(va.to_bits(), vb.to_bits(), "trial {} step {sa}", a.id);
        }
        assert_eq!(a.value.map(f64::to_bits), b.value.map(f64::to_bits));
    }
}

#[test]
fn journal_keeps_every_float_bit() {
    let dir = tempfile::tempdir().unwrap();
    floats_survive_reopen(&format!("journal:{}", dir.path().join("noisy.jsonl").display()));
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_keeps_every_float_bit() {
    let dir = tempfile::tempdir().unwrap();
    floats_survive_reopen(&format!("sqlite:///{}", dir.path().join("noisy.db").display()));
}

fn failure_reason_survives_reopen(location: &str) {
    let tuner = Tuner::builder()
        .study_name("unstable")
        .space(space())
        .shared_storage(storage::open(location).unwrap())
        .build()
        .unwrap();
    let objective = |config: &Configuration,
                     reporter: &mut Reporter<'_>,
                     _: &CancellationToken|
     -> Result<f64> {
        reporter.report(1, 0.5)?;
        if config.get_int("layers")? > 1 {
            return Err(Error::Config("gradient overflow".into()));
        }
        Ok(1.0)
    };
    tuner.tune(6, &objective).unwrap();
    drop(tuner);

    let reopened = Study::open(storage::open(location).unwrap(), "unstable").unwrap();
    let trials = reopened.trials().unwrap();
    assert!(trials.iter().any(|t| t.state == TrialState::Failed));
    for trial in trials {
        if trial.state == TrialState::Failed {
            assert_eq!(
                trial.fail_reason.as_deref(),
                Some("objective failed: invalid configuration: gradient overflow")
            );
            assert_eq!(trial.trajectory, [(1, 0.5)]);
        } else {
            assert_eq!(trial.fail_reason, None);
        }
    }
}

#[test]
fn journal_keeps_failure_reasons() {
    let dir = tempfile::tempdir().unwrap();
    failure_reason_survives_reopen(&format!("journal:{}", dir.path().join("f.jsonl").display()));
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_keeps_failure_reasons() {
    let dir = tempfile::tempdir().unwrap();
    failure_reason_survives_reopen(&format!("sqlite:///{}", dir.path().join("f.db").display()));
}

#[test]
fn unknown_study_is_reported() {
    let storage = storage::open("memory").unwrap();
    assert!(matches!(
        Study::open(storage, "missing"),
        Err(Error::UnknownStudy(name)) if name == "missing"
    ));
}
