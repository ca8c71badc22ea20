mod hyperband;
mod median;
mod successive_halving;

use seqtune::{Configuration, TrialRecord, TrialState};

pub fn record(id: u64, state: TrialState, trajectory: &[(u64, f64)]) -> TrialRecord {
    TrialRecord {
        id,
        config: Configuration::new(),
        state,
        trajectory: trajectory.to_vec(),
        value: state
            .has_value()
            .then(|| trajectory.last().map_or(0.0, |&(_, v)| v)),
        fail_reason: None,
    }
}
