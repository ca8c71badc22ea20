//! The in-memory study model shared by every backend.
//!
//! Each mutation is an [`Op`]. Backends validate an op against the current
//! model before making it durable, and the journal replays the same ops to
//! rebuild the model, so every backend enforces identical trial rules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::StudyMeta;
use crate::error::{Error, Result};
use crate::param::Configuration;
use crate::trial::TrialRecord;
use crate::types::TrialState;

/// One durable mutation of a study store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum Op {
    CreateStudy {
        meta: StudyMeta,
    },
    CreateTrial {
        study: String,
        trial_id: u64,
    },
    SetConfiguration {
        study: String,
        trial_id: u64,
        config: Configuration,
    },
    Report {
        study: String,
        trial_id: u64,
        step: u64,
        value: f64,
    },
    Finish {
        study: String,
        trial_id: u64,
        state: TrialState,
        value: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

#[derive(Clone, Debug)]
struct StudyData {
    meta: StudyMeta,
    trials: Vec<TrialRecord>,
}

/// Every study of one store, keyed by name.
#[derive(Clone, Debug, Default)]
pub(crate) struct Model {
    studies: BTreeMap<String, StudyData>,
}

impl Model {
    pub(crate) fn meta(&self, study: &str) -> Option<&StudyMeta> {
        self.studies.get(study).map(|s| &s.meta)
    }

    pub(crate) fn study_names(&self) -> Vec<String> {
        self.studies.keys().cloned().collect()
    }

    pub(crate) fn trials(&self, study: &str) -> Result<Vec<TrialRecord>> {
        Ok(self.study(study)?.trials.clone())
    }

    pub(crate) fn trial(&self, study: &str, trial_id: u64) -> Result<TrialRecord> {
        self.study(study)?
            .trials
            .iter()
            .find(|t| t.id == trial_id)
            .cloned()
            .ok_or(Error::UnknownTrial { trial_id })
    }

    /// The id the next `CreateTrial` on `study` must carry.
    pub(crate) fn next_trial_id(&self, study: &str) -> Result<u64> {
        Ok(self.study(study)?.trials.len() as u64)
    }

    /// Checks `op` without applying it.
    pub(crate) fn validate(&self, op: &Op) -> Result<()> {
        match op {
            Op::CreateStudy { meta } => {
                if self.studies.contains_key(&meta.name) {
                    return Err(Error::StudyExists(meta.name.clone()));
                }
            }
            Op::CreateTrial { study, trial_id } => {
                let expected = self.next_trial_id(study)?;
                if *trial_id != expected {
                    return Err(Error::Persistence(format!(
                        "study '{study}': trial id {trial_id} out of sequence, expected {expected}"
                    )));
                }
            }
            Op::SetConfiguration {
                study, trial_id, ..
            }
            | Op::Report {
                study, trial_id, ..
            }
            | Op::Finish {
                study, trial_id, ..
            } => {
                let trial = self.trial_ref(study, *trial_id)?;
                check_trial_op(trial, op)?;
            }
        }
        Ok(())
    }

    /// Validates and applies `op`.
    pub(crate) fn apply(&mut self, op: Op) -> Result<()> {
        self.validate(&op)?;
        match op {
            Op::CreateStudy { meta } => {
                self.studies.insert(
                    meta.name.clone(),
                    StudyData {
                        meta,
                        trials: Vec::new(),
                    },
                );
            }
            Op::CreateTrial { study, trial_id } => {
                self.study_mut(&study)?
                    .trials
                    .push(TrialRecord::running(trial_id));
            }
            Op::SetConfiguration {
                study,
                trial_id,
                config,
            } => self.trial_mut(&study, trial_id)?.config = config,
            Op::Report {
                study,
                trial_id,
                step,
                value,
            } => self
                .trial_mut(&study, trial_id)?
                .trajectory
                .push((step, value)),
            Op::Finish {
                study,
                trial_id,
                state,
                value,
                reason,
            } => {
                let trial = self.trial_mut(&study, trial_id)?;
                trial.state = state;
                trial.value = value;
                trial.fail_reason = reason;
            }
        }
        Ok(())
    }

    fn study(&self, study: &str) -> Result<&StudyData> {
        self.studies
            .get(study)
            .ok_or_else(|| Error::UnknownStudy(study.to_string()))
    }

    fn study_mut(&mut self, study: &str) -> Result<&mut StudyData> {
        self.studies
            .get_mut(study)
            .ok_or_else(|| Error::UnknownStudy(study.to_string()))
    }

    fn trial_ref(&self, study: &str, trial_id: u64) -> Result<&TrialRecord> {
        self.study(study)?
            .trials
            .get(usize::try_from(trial_id).unwrap_or(usize::MAX))
            .ok_or(Error::UnknownTrial { trial_id })
    }

    fn trial_mut(&mut self, study: &str, trial_id: u64) -> Result<&mut TrialRecord> {
        self.study_mut(study)?
            .trials
            .get_mut(usize::try_from(trial_id).unwrap_or(usize::MAX))
            .ok_or(Error::UnknownTrial { trial_id })
    }
}

/// Checks a trial-level op against the current record of its trial.
pub(crate) fn check_trial_op(trial: &TrialRecord, op: &Op) -> Result<()> {
    let trial_id = trial.id;
    if trial.is_finished() {
        return Err(Error::TrialFinished {
            trial_id,
            state: trial.state,
        });
    }
    match op {
        Op::SetConfiguration { .. } => {
            if !trial.config.is_empty() {
                return Err(Error::ConfigurationAlreadySet { trial_id });
            }
        }
        Op::Report { step, value, .. } => {
            if !value.is_finite() {
                return Err(Error::NonFiniteValue { trial_id });
            }
            if let Some(last) = trial.last_step()
                && *step <= last
            {
                return Err(Error::NonIncreasingStep {
                    trial_id,
                    step: *step,
                    last,
                });
            }
        }
        Op::Finish {
            state,
            value,
            reason,
            ..
        } => {
            let accepted = match value {
                Some(v) => state.has_value() && v.is_finite(),
                None => !state.has_value(),
            };
            let reason_ok = reason.is_none() || *state == TrialState::Failed;
            if !state.is_finished() || !accepted || !reason_ok {
                return Err(Error::InvalidTerminalValue {
                    trial_id,
                    state: *state,
                    value: *value,
                });
            }
        }
        Op::CreateStudy { .. } | Op::CreateTrial { .. } => {}
    }
    Ok(())
}
