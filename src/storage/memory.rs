use parking_lot::RwLock;

use super::{Model, Op, Storage, StudyMeta};
use crate::error::Result;
use crate::param::Configuration;
use crate::trial::TrialRecord;
use crate::types::TrialState;

/// In-memory study store.
///
/// Studies live in a model behind a read-write lock: writers validate and
/// apply under the write lock, readers clone a snapshot under the read lock.
/// Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    model: RwLock<Model>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn apply(&self, op: Op) -> Result<()> {
        self.model.write().apply(op)
    }
}

impl Storage for MemoryStorage {
    fn create_study(&self, meta: &StudyMeta) -> Result<()> {
        self.apply(Op::CreateStudy { meta: meta.clone() })
    }

    fn study_meta(&self, study: &str) -> Result<Option<StudyMeta>> {
        Ok(self.model.read().meta(study).cloned())
    }

    fn study_names(&self) -> Result<Vec<String>> {
        Ok(self.model.read().study_names())
    }

    fn create_trial(&self, study: &str) -> Result<u64> {
        let mut model = self.model.write();
        let trial_id = model.next_trial_id(study)?;
        model.apply(Op::CreateTrial {
            study: study.to_string(),
            trial_id,
        })?;
        Ok(trial_id)
    }

    fn set_configuration(
        &self,
        study: &str,
        trial_id: u64,
        config: &Configuration,
    ) -> Result<()> {
        self.apply(Op::SetConfiguration {
            study: study.to_string(),
            trial_id,
            config: config.clone(),
        })
    }

    fn append_intermediate(
        &self,
        study: &str,
        trial_id: u64,
        step: u64,
        value: f64,
    ) -> Result<()> {
        self.apply(Op::Report {
            study: study.to_string(),
            trial_id,
            step,
            value,
        })
    }

    fn finish_trial(
        &self,
        study: &str,
        trial_id: u64,
        state: TrialState,
        value: Option<f64>,
    ) -> Result<()> {
        self.apply(Op::Finish {
            study: study.to_string(),
            trial_id,
            state,
            value,
            reason: None,
        })
    }

    fn fail_trial(&self, study: &str, trial_id: u64, reason: &str) -> Result<()> {
        self.apply(Op::Finish {
            study: study.to_string(),
            trial_id,
            state: TrialState::Failed,
            value: None,
            reason: Some(reason.to_string()),
        })
    }

    fn trials(&self, study: &str) -> Result<Vec<TrialRecord>> {
        self.model.read().trials(study)
    }

    fn trial(&self, study: &str, trial_id: u64) -> Result<TrialRecord> {
        self.model.read().trial(study, trial_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::Direction;

    #[test]
    fn ids_start_at_zero_per_study() {
        let store = MemoryStorage::new();
        store
            .create_study(&StudyMeta::new("a", Direction::Minimize, "[]"))
            .unwrap();
        store
            .create_study(&StudyMeta::new("b", Direction::Maximize, "[]"))
            .unwrap();
        assert_eq!(store.create_trial("a").unwrap(), 0);
        assert_eq!(store.create_trial("a").unwrap(), 1);
        assert_eq!(store.create_trial("b").unwrap(), 0);
        assert_eq!(store.study_names().unwrap(), ["a", "b"]);
        assert!(matches!(
            store.create_study(&StudyMeta::new("a", Direction::Minimize, "[]")),
            Err(Error::StudyExists(_))
        ));
        assert!(matches!(
            store.create_trial("c"),
            Err(Error::UnknownStudy(_))
        ));
    }
}
