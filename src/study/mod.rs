//! Studies: the durable, append-only trial history of one experiment.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::param::Configuration;
use crate::space::SearchSpace;
use crate::storage::{Storage, StudyMeta};
use crate::trial::{History, TrialRecord};
use crate::types::{Direction, TrialState};

mod analysis;
mod export;

pub(crate) use analysis::best_of;
pub use analysis::StateCounts;
pub use export::StudyExport;

/// A handle on one named study inside a [`Storage`].
///
/// The handle itself holds no trials: every read goes to the store, so
/// several handles (in one process or many) observe the same history.
/// Cloning is cheap.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use seqtune::prelude::*;
///
/// let space = SearchSpace::new(vec![FieldGroup::new("m").categorical("a", [1_i64, 2])]).unwrap();
/// let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
/// let study = Study::create(storage.clone(), "exp", Direction::Minimize, &space).unwrap();
/// assert_eq!(study.name(), "exp");
///
/// let reopened = Study::open(storage, "exp").unwrap();
/// assert_eq!(reopened.direction(), Direction::Minimize);
/// ```
#[derive(Clone)]
pub struct Study {
    meta: StudyMeta,
    storage: Arc<dyn Storage>,
}

impl core::fmt::Debug for Study {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Study")
            .field("name", &self.meta.name)
            .field("direction", &self.meta.direction)
            .finish_non_exhaustive()
    }
}

impl Study {
    /// Registers a new study for `space` in `storage`.
    ///
    /// # Errors
    ///
    /// [`Error::StudyExists`] if the name is taken, [`Error::Persistence`]
    /// if the store fails.
    pub fn create(
        storage: Arc<dyn Storage>,
        name: &str,
        direction: Direction,
        space: &SearchSpace,
    ) -> Result<Self> {
        let meta = StudyMeta::new(name, direction, space.signature()?);
        storage.create_study(&meta)?;
        trace_info!(study = name, %direction, "study created");
        Ok(Self { meta, storage })
    }

    /// Reopens an existing study by name.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownStudy`] if the store has no such study.
    pub fn open(storage: Arc<dyn Storage>, name: &str) -> Result<Self> {
        let meta = storage
            .study_meta(name)?
            .ok_or_else(|| Error::UnknownStudy(name.to_string()))?;
        Ok(Self { meta, storage })
    }

    /// Reopens `name` if it exists, after checking that it was created with
    /// the same direction and search space; creates it otherwise.
    ///
    /// # Errors
    ///
    /// [`Error::StudyMismatch`] when the stored study disagrees on direction
    /// or search space.
    pub fn open_or_create(
        storage: Arc<dyn Storage>,
        name: &str,
        direction: Direction,
        space: &SearchSpace,
    ) -> Result<Self> {
        let Some(meta) = storage.study_meta(name)? else {
            return match Self::create(storage.clone(), name, direction, space) {
                // Another process created it between the two calls.
                Err(Error::StudyExists(_)) => Self::open_or_create(storage, name, direction, space),
                other => other,
            };
        };
        if meta.direction != direction {
            return Err(Error::StudyMismatch {
                study: name.to_string(),
                what: "direction",
            });
        }
        if meta.signature != space.signature()? {
            return Err(Error::StudyMismatch {
                study: name.to_string(),
                what: "search space",
            });
        }
        let study = Self { meta, storage };
        trace_info!(study = name, "study resumed");
        Ok(study)
    }

    /// The study name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// The optimization direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.meta.direction
    }

    /// The store backing this study.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Snapshot of every trial, in id order.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] if the store cannot be read.
    pub fn trials(&self) -> Result<Vec<TrialRecord>> {
        self.storage.trials(self.name())
    }

    /// One trial by id.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownTrial`] or [`Error::Persistence`].
    pub fn trial(&self, trial_id: u64) -> Result<TrialRecord> {
        self.storage.trial(self.name(), trial_id)
    }

    /// Number of trials in any state.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] if the store cannot be read.
    pub fn n_trials(&self) -> Result<usize> {
        Ok(self.trials()?.len())
    }

    /// Runs `f` over a consistent snapshot of the study.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] if the store cannot be read.
    pub fn with_history<T>(&self, f: impl FnOnce(&History<'_>) -> T) -> Result<T> {
        let trials = self.trials()?;
        Ok(f(&History::new(self.direction(), &trials)))
    }

    pub(crate) fn create_trial(&self) -> Result<u64> {
        let trial_id = self.storage.create_trial(self.name())?;
        trace_debug!(study = self.name(), trial_id, "trial created");
        Ok(trial_id)
    }

    pub(crate) fn set_configuration(&self, trial_id: u64, config: &Configuration) -> Result<()> {
        self.storage.set_configuration(self.name(), trial_id, config)
    }

    pub(crate) fn append_intermediate(&self, trial_id: u64, step: u64, value: f64) -> Result<()> {
        self.storage
            .append_intermediate(self.name(), trial_id, step, value)
    }

    pub(crate) fn finish_trial(
        &self,
        trial_id: u64,
        state: TrialState,
        value: Option<f64>,
    ) -> Result<()> {
        self.storage
            .finish_trial(self.name(), trial_id, state, value)
    }

    pub(crate) fn fail_trial(&self, trial_id: u64, reason: &str) -> Result<()> {
        self.storage.fail_trial(self.name(), trial_id, reason)
    }
}
