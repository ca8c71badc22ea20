use seqtune::prelude::*;

use crate::record;

fn hyperband() -> HyperbandPruner {
    HyperbandPruner::new()
        .min_resource(10)
        .reduction_factor(3)
        .max_resource(MaxResource::Fixed(270))
}

#[test]
fn bracket_count_follows_the_budget() {
    let pruner = hyperband();
    assert_eq!(pruner.n_brackets(270), 4);
    assert_eq!(pruner.n_brackets(90), 3);
    assert_eq!(pruner.n_brackets(10), 1);
}

#[test]
fn brackets_are_stable_per_trial() {
    let pruner = hyperband();
    for id in 0..100 {
        assert_eq!(pruner.bracket_of(id, 270), pruner.bracket_of(id, 270));
        assert!(pruner.bracket_of(id, 270) < 4);
    }
}

#[test]
fn most_aggressive_bracket_prunes_at_first_rung() {
    let pruner = hyperband();
    // Ids 0..=9 all land in bracket 0, whose first rung is step 10.
    let mut trials: Vec<TrialRecord> = (0..9)
        .map(|id| record(id, TrialState::Complete, &[(10, 1.0), (270, 1.0)]))
        .collect();
    let current = record(9, TrialState::Running, &[(10, 0.5)]);
    trials.push(current.clone());
    let history = History::new(Direction::Maximize, &trials);
    assert_eq!(pruner.bracket_of(9, 270), 0);
    assert!(pruner.should_prune(&current, &history));
}

#[test]
fn auto_budget_waits_for_a_finished_trial() {
    let pruner = HyperbandPruner::new().min_resource(10).reduction_factor(3);
    let mut trials: Vec<TrialRecord> = (0..9)
        .map(|id| record(id, TrialState::Pruned, &[(10, 1.0)]))
        .collect();
    let current = record(9, TrialState::Running, &[(10, 0.5)]);
    trials.push(current.clone());
    let history = History::new(Direction::Maximize, &trials);
    assert!(!pruner.should_prune(&current, &history));
}
