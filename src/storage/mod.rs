//! Durable study stores.
//!
//! A [`Storage`] holds any number of studies addressed by name. Every
//! mutation is validated against the trial state machine and made durable
//! before the call returns, and every read returns a consistent snapshot.
//!
//! # Available backends
//!
//! | Backend | Description | Feature flag |
//! |---------|-------------|-------------|
//! | [`MemoryStorage`] | Studies behind a read-write lock; lost on exit | none |
//! | [`JournalStorage`] | JSON-lines op log with `fs2` file locking, shareable across processes | none |
//! | `SqliteStorage` | Transactional `SQLite` database in WAL mode | `sqlite` |
//!
//! # Choosing a backend from a URL
//!
//! ```
//! use seqtune::storage;
//!
//! let store = storage::open("memory").unwrap();
//! assert!(store.study_names().unwrap().is_empty());
//! ```

mod journal;
mod memory;
mod model;
#[cfg(feature = "sqlite")]
mod sqlite;

use std::sync::Arc;

pub use journal::JournalStorage;
pub use memory::MemoryStorage;
pub(crate) use model::{Model, Op};
use serde::{Deserialize, Serialize};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;

use crate::error::{Error, Result};
use crate::param::Configuration;
use crate::trial::TrialRecord;
use crate::types::{Direction, TrialState};

/// What a store remembers about a study besides its trials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyMeta {
    /// Unique study name within the store.
    pub name: String,
    /// Optimization direction fixed at creation.
    pub direction: Direction,
    /// Canonical description of the search space the study was created with.
    pub signature: String,
}

impl StudyMeta {
    /// Bundles study metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, direction: Direction, signature: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction,
            signature: signature.into(),
        }
    }
}

/// A durable store of studies keyed by name.
///
/// Implementations must be `Send + Sync`: one store is shared by every
/// worker of a tune run. Each method is atomic with respect to concurrent
/// callers, including callers in other processes for file-backed stores.
///
/// Trial ids are allocated by the store, start at 0 and are contiguous
/// within a study.
pub trait Storage: Send + Sync {
    /// Registers a new study.
    ///
    /// # Errors
    ///
    /// [`Error::StudyExists`] when the name is taken.
    fn create_study(&self, meta: &StudyMeta) -> Result<()>;

    /// Metadata of `study`, or `None` if the store does not know it.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] when the store cannot be read.
    fn study_meta(&self, study: &str) -> Result<Option<StudyMeta>>;

    /// Names of all studies, sorted.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] when the store cannot be read.
    fn study_names(&self) -> Result<Vec<String>>;

    /// Appends a `Running` trial with an empty configuration and returns its id.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownStudy`] or [`Error::Persistence`].
    fn create_trial(&self, study: &str) -> Result<u64>;

    /// Assigns the materialized configuration of a running trial, once.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigurationAlreadySet`], [`Error::TrialFinished`],
    /// [`Error::UnknownTrial`] or [`Error::Persistence`].
    fn set_configuration(&self, study: &str, trial_id: u64, config: &Configuration)
    -> Result<()>;

    /// Appends one `(step, value)` point to a running trial.
    ///
    /// # Errors
    ///
    /// [`Error::NonIncreasingStep`], [`Error::NonFiniteValue`],
    /// [`Error::TrialFinished`], [`Error::UnknownTrial`] or [`Error::Persistence`].
    fn append_intermediate(&self, study: &str, trial_id: u64, step: u64, value: f64)
    -> Result<()>;

    /// Moves a running trial to a terminal state. `value` must be a finite
    /// number for `Complete` and `Pruned` and absent for `Failed`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTerminalValue`], [`Error::TrialFinished`],
    /// [`Error::UnknownTrial`] or [`Error::Persistence`].
    fn finish_trial(
        &self,
        study: &str,
        trial_id: u64,
        state: TrialState,
        value: Option<f64>,
    ) -> Result<()>;

    /// Moves a running trial to `Failed` and records why.
    ///
    /// # Errors
    ///
    /// [`Error::TrialFinished`], [`Error::UnknownTrial`] or [`Error::Persistence`].
    fn fail_trial(&self, study: &str, trial_id: u64, reason: &str) -> Result<()>;

    /// A consistent snapshot of every trial of `study`, in id order.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownStudy`] or [`Error::Persistence`].
    fn trials(&self, study: &str) -> Result<Vec<TrialRecord>>;

    /// One trial of `study`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownTrial`], [`Error::UnknownStudy`] or [`Error::Persistence`].
    fn trial(&self, study: &str, trial_id: u64) -> Result<TrialRecord> {
        self.trials(study)?
            .into_iter()
            .find(|t| t.id == trial_id)
            .ok_or(Error::UnknownTrial { trial_id })
    }
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn create_study(&self, meta: &StudyMeta) -> Result<()> {
        (**self).create_study(meta)
    }

    fn study_meta(&self, study: &str) -> Result<Option<StudyMeta>> {
        (**self).study_meta(study)
    }

    fn study_names(&self) -> Result<Vec<String>> {
        (**self).study_names()
    }

    fn create_trial(&self, study: &str) -> Result<u64> {
        (**self).create_trial(study)
    }

    fn set_configuration(
        &self,
        study: &str,
        trial_id: u64,
        config: &Configuration,
    ) -> Result<()> {
        (**self).set_configuration(study, trial_id, config)
    }

    fn append_intermediate(
        &self,
        study: &str,
        trial_id: u64,
        step: u64,
        value: f64,
    ) -> Result<()> {
        (**self).append_intermediate(study, trial_id, step, value)
    }

    fn finish_trial(
        &self,
        study: &str,
        trial_id: u64,
        state: TrialState,
        value: Option<f64>,
    ) -> Result<()> {
        (**self).finish_trial(study, trial_id, state, value)
    }

    fn fail_trial(&self, study: &str, trial_id: u64, reason: &str) -> Result<()> {
        (**self).fail_trial(study, trial_id, reason)
    }

    fn trials(&self, study: &str) -> Result<Vec<TrialRecord>> {
        (**self).trials(study)
    }

    fn trial(&self, study: &str, trial_id: u64) -> Result<TrialRecord> {
        (**self).trial(study, trial_id)
    }
}

/// Opens a store from a location URL.
///
/// | URL | Backend |
/// |-----|---------|
/// | `memory` | [`MemoryStorage`] |
/// | `journal:<path>` or `<path>.jsonl` | [`JournalStorage`] |
/// | `sqlite:///<path>`, `sqlite:<path>`, `<path>.db` | `SqliteStorage` |
///
/// # Errors
///
/// [`Error::Config`] for an unrecognised URL, [`Error::Persistence`] when
/// the backing file cannot be opened.
pub fn open(url: &str) -> Result<Arc<dyn Storage>> {
    let url = url.trim();
    if url == "memory" || url == "memory:" {
        return Ok(Arc::new(MemoryStorage::new()));
    }
    if let Some(path) = url.strip_prefix("journal:") {
        return Ok(Arc::new(JournalStorage::open(path)?));
    }
    if let Some(path) = sqlite_path(url) {
        return open_sqlite(path);
    }
    if url.ends_with(".jsonl") {
        return Ok(Arc::new(JournalStorage::open(url)?));
    }
    Err(Error::Config(format!("unrecognised storage location '{url}'")))
}

fn sqlite_path(url: &str) -> Option<&str> {
    url.strip_prefix("sqlite:///")
        .or_else(|| url.strip_prefix("sqlite:"))
        .or_else(|| {
            std::path::Path::new(url)
                .extension()
                .is_some_and(|ext| ext == "db" || ext == "sqlite")
                .then_some(url)
        })
}

#[cfg(feature = "sqlite")]
fn open_sqlite(path: &str) -> Result<Arc<dyn Storage>> {
    Ok(Arc::new(SqliteStorage::open(path)?))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(path: &str) -> Result<Arc<dyn Storage>> {
    Err(Error::Config(format!(
        "'{path}' needs the `sqlite` feature"
    )))
}
