use seqtune::prelude::*;

use crate::record;

fn sha() -> SuccessiveHalvingPruner {
    SuccessiveHalvingPruner::new()
        .min_resource(10)
        .reduction_factor(3)
        .max_resource(MaxResource::Fixed(270))
}

#[test]
fn laggard_at_first_rung_is_pruned() {
    let mut trials: Vec<TrialRecord> = (0..9)
        .map(|id| record(id, TrialState::Complete, &[(10, 1.0), (270, 1.0)]))
        .collect();
    let current = record(9, TrialState::Running, &[(10, 0.5)]);
    trials.push(current.clone());
    let history = History::new(Direction::Maximize, &trials);

    let pruner = sha();
    assert!(pruner.should_prune(&current, &history));
    // Same snapshot, same answer.
    assert!(pruner.should_prune(&current, &history));
}

#[test]
fn leader_at_first_rung_survives() {
    let mut trials: Vec<TrialRecord> = (0..9)
        .map(|id| record(id, TrialState::Complete, &[(10, 1.0), (270, 1.0)]))
        .collect();
    let current = record(9, TrialState::Running, &[(10, 2.0)]);
    trials.push(current.clone());
    let history = History::new(Direction::Maximize, &trials);
    assert!(!sha().should_prune(&current, &history));

    let history = History::new(Direction::Minimize, &trials);
    assert!(sha().should_prune(&current, &history));
}

#[test]
fn between_rungs_nothing_is_decided() {
    let mut trials: Vec<TrialRecord> = (0..9)
        .map(|id| record(id, TrialState::Complete, &[(10, 1.0), (20, 1.0)]))
        .collect();
    // Judged and kept at step 10 while it was alone; step 20 is not a rung.
    let current = record(9, TrialState::Running, &[(10, 5.0), (20, 0.0)]);
    trials.push(current.clone());
    let history = History::new(Direction::Maximize, &trials);
    assert!(!sha().should_prune(&current, &history));
}

#[test]
fn bootstrap_count_delays_pruning() {
    let mut trials: Vec<TrialRecord> = (0..3)
        .map(|id| record(id, TrialState::Pruned, &[(10, 1.0)]))
        .collect();
    let current = record(3, TrialState::Running, &[(10, 0.0)]);
    trials.push(current.clone());
    let history = History::new(Direction::Maximize, &trials);
    assert!(sha().should_prune(&current, &history));
    assert!(!sha().bootstrap_count(5).should_prune(&current, &history));
}

#[test]
fn tune_loop_prunes_slow_learners() {
    let tuner = Tuner::builder()
        .maximize()
        .space(
            SearchSpace::new(vec![FieldGroup::new("model").int_range("width", 1, 9, 1)]).unwrap(),
        )
        .sampler(RandomSampler::with_seed(4))
        .pruner(
            SuccessiveHalvingPruner::new()
                .min_resource(2)
                .reduction_factor(3)
                .max_resource(MaxResource::Fixed(18)),
        )
        .build()
        .unwrap();
    let objective = |config: &Configuration, reporter: &mut Reporter<'_>, cancel: &CancellationToken| {
        let width = config.get_int("width")? as f64;
        let mut value = 0.0;
        for step in 1..=18 {
            if cancel.is_cancelled() {
                break;
            }
            value = width * step as f64;
            if reporter.report(step, value)? == Verdict::Prune {
                break;
            }
        }
        Ok::<_, Error>(value)
    };
    let summary = tuner.tune(20, &objective).unwrap();
    assert_eq!(summary.n_new_trials, 20);
    assert!(summary.new.pruned > 0);

    for trial in tuner.study().trials().unwrap() {
        match trial.state {
            TrialState::Pruned => {
                assert_eq!(trial.value, trial.last_value());
                assert!(trial.last_step().unwrap() < 18);
            }
            TrialState::Complete => assert_eq!(trial.last_step(), Some(18)),
            other => panic!("unexpected state {other}"),
        }
    }
}
