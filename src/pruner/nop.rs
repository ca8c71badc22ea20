use super::Pruner;
use crate::trial::{History, TrialRecord};

/// A pruner that never prunes. Used for cross-validation replays and when
/// no pruner is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NopPruner;

impl Pruner for NopPruner {
    fn should_prune(&self, _trial: &TrialRecord, _history: &History<'_>) -> bool {
        false
    }
}
