use seqtune::prelude::*;
use seqtune::storage;

use crate::common::{curve, space};

fn tuner(location: &str) -> Tuner {
    Tuner::builder()
        .study_name("resume")
        .maximize()
        .space(space())
        .sampler(RandomSampler::with_seed(3))
        .shared_storage(storage::open(location).unwrap())
        .build()
        .unwrap()
}

#[test]
fn resumed_run_continues_trial_ids() {
    let dir = tempfile::tempdir().unwrap();
    let location = format!("journal:{}", dir.path().join("runs.jsonl").display());

    let first = tuner(&location).tune(4, &curve).unwrap();
    assert_eq!(first.n_new_trials, 4);

    let resumed = tuner(&location);
    let second = resumed.tune(3, &curve).unwrap();
    assert_eq!(second.n_new_trials, 3);
    assert_eq!(second.total.total(), 7);

    let ids: Vec<u64> = resumed.study().trials().unwrap().iter().map(|t| t.id).collect();
    assert_eq!(ids, (0..7).collect::<Vec<_>>());
}

#[test]
fn resume_matches_an_uninterrupted_run() {
    let dir = tempfile::tempdir().unwrap();
    let split = format!("journal:{}", dir.path().join("split.jsonl").display());
    let whole = format!("journal:{}", dir.path().join("whole.jsonl").display());

    tuner(&split).tune(2, &curve).unwrap();
    tuner(&split).tune(3, &curve).unwrap();
    tuner(&whole).tune(5, &curve).unwrap();

    let configs = |location: &str| -> Vec<Configuration> {
        tuner(location)
            .study()
            .trials()
            .unwrap()
            .into_iter()
            .map(|t| t.config)
            .collect()
    };
    assert_eq!(configs(&split), configs(&whole));
}

#[test]
fn reopening_with_another_space_is_rejected() {
    let storage = storage::open("memory").unwrap();
    Tuner::builder()
        .study_name("s")
        .space(space())
        .shared_storage(storage.clone())
        .build()
        .unwrap();

    let other = SearchSpace::new(vec![FieldGroup::new("model").int_range("layers", 1, 4, 1)]).unwrap();
    let err = Tuner::builder()
        .study_name("s")
        .space(other)
        .shared_storage(storage.clone())
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::StudyMismatch { what: "search space", .. }));

    let err = Tuner::builder()
        .study_name("s")
        .maximize()
        .space(space())
        .shared_storage(storage)
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::StudyMismatch { what: "direction", .. }));
}

#[test]
fn load_if_exists_false_refuses_existing_study() {
    let storage = storage::open("memory").unwrap();
    let build = |load| {
        Tuner::builder()
            .study_name("once")
            .space(space())
            .shared_storage(storage.clone())
            .load_if_exists(load)
            .build()
    };
    build(false).unwrap();
    assert!(matches!(build(false), Err(Error::StudyExists(_))));
    assert!(build(true).is_ok());
}
