use seqtune::prelude::*;

use crate::record;

fn peers() -> Vec<TrialRecord> {
    vec![
        record(0, TrialState::Complete, &[(1, 0.5), (2, 1.0)]),
        record(1, TrialState::Complete, &[(1, 0.6), (2, 2.0)]),
        record(2, TrialState::Complete, &[(1, 0.7), (2, 3.0)]),
    ]
}

#[test]
fn worse_than_median_is_pruned() {
    let mut trials = peers();
    let current = record(3, TrialState::Running, &[(1, 0.5), (2, 2.5)]);
    trials.push(current.clone());
    let history = History::new(Direction::Minimize, &trials);
    assert!(MedianPruner::new().should_prune(&current, &history));

    let history = History::new(Direction::Maximize, &trials);
    assert!(!MedianPruner::new().should_prune(&current, &history));
}

#[test]
fn warmup_and_minimum_peers_hold_back_pruning() {
    let mut trials = peers();
    let current = record(3, TrialState::Running, &[(1, 0.5), (2, 2.5)]);
    trials.push(current.clone());
    let history = History::new(Direction::Minimize, &trials);
    assert!(!MedianPruner::new().n_warmup_steps(3).should_prune(&current, &history));
    assert!(!MedianPruner::new().n_min_trials(4).should_prune(&current, &history));
}

#[test]
fn running_and_failed_peers_are_ignored() {
    let trials = vec![
        record(0, TrialState::Failed, &[(1, 0.0)]),
        record(1, TrialState::Running, &[(1, 0.0)]),
        record(2, TrialState::Running, &[(1, 9.0)]),
    ];
    let history = History::new(Direction::Minimize, &trials);
    assert!(!MedianPruner::new().should_prune(&trials[2], &history));
}
