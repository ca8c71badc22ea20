use std::sync::Arc;
use std::time::Duration;

use super::Tuner;
use crate::error::{Error, Result};
use crate::pruner::{NopPruner, Pruner};
use crate::sampler::{RandomSampler, Sampler};
use crate::space::SearchSpace;
use crate::storage::{MemoryStorage, Storage};
use crate::study::Study;
use crate::types::Direction;

/// A builder for [`Tuner`] instances.
///
/// Created via [`Tuner::builder()`].
///
/// # Defaults
///
/// - Study name: `"study"`
/// - Direction: [`Minimize`](Direction::Minimize)
/// - Sampler: [`RandomSampler`]
/// - Pruner: [`NopPruner`]
/// - Storage: [`MemoryStorage`]
/// - Cross-validation: 5 folds, seed 1
/// - Existing studies of the same name are resumed
///
/// # Examples
///
/// ```
/// use seqtune::prelude::*;
///
/// let tuner = Tuner::builder()
///     .study_name("lstm")
///     .maximize()
///     .space(SearchSpacePreset::Lstm.space().unwrap())
///     .sampler(TpeSampler::builder().n_startup_trials(15).multivariate(true).seed(1).build().unwrap())
///     .pruner(HyperbandPruner::new().min_resource(10).reduction_factor(3))
///     .build()
///     .unwrap();
/// assert_eq!(tuner.study().direction(), Direction::Maximize);
/// ```
pub struct TunerBuilder {
    study_name: String,
    direction: Direction,
    space: Option<SearchSpace>,
    sampler: Option<Arc<dyn Sampler>>,
    pruner: Option<Arc<dyn Pruner>>,
    storage: Option<Arc<dyn Storage>>,
    timeout: Option<Duration>,
    xval_folds: usize,
    xval_seed: u64,
    load_if_exists: bool,
}

impl TunerBuilder {
    /// Create a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            study_name: "study".to_string(),
            direction: Direction::Minimize,
            space: None,
            sampler: None,
            pruner: None,
            storage: None,
            timeout: None,
            xval_folds: 5,
            xval_seed: 1,
            load_if_exists: true,
        }
    }

    /// Name of the study in the store.
    #[must_use]
    pub fn study_name(mut self, name: impl Into<String>) -> Self {
        self.study_name = name.into();
        self
    }

    /// Set the optimization direction to minimize (the default).
    #[must_use]
    pub fn minimize(mut self) -> Self {
        self.direction = Direction::Minimize;
        self
    }

    /// Set the optimization direction to maximize.
    #[must_use]
    pub fn maximize(mut self) -> Self {
        self.direction = Direction::Maximize;
        self
    }

    /// Set the optimization direction explicitly.
    #[must_use]
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// The search space. Required.
    #[must_use]
    pub fn space(mut self, space: SearchSpace) -> Self {
        self.space = Some(space);
        self
    }

    /// Set the sampler used for configuration draws.
    #[must_use]
    pub fn sampler(mut self, sampler: impl Sampler + 'static) -> Self {
        self.sampler = Some(Arc::new(sampler));
        self
    }

    /// Set a shared sampler.
    #[must_use]
    pub fn shared_sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Set the pruner used for early stopping of trials.
    #[must_use]
    pub fn pruner(mut self, pruner: impl Pruner + 'static) -> Self {
        self.pruner = Some(Arc::new(pruner));
        self
    }

    /// Set a shared pruner.
    #[must_use]
    pub fn shared_pruner(mut self, pruner: Arc<dyn Pruner>) -> Self {
        self.pruner = Some(pruner);
        self
    }

    /// Set the storage backend.
    #[must_use]
    pub fn storage(mut self, storage: impl Storage + 'static) -> Self {
        self.storage = Some(Arc::new(storage));
        self
    }

    /// Set a storage backend shared with other tuners or studies.
    #[must_use]
    pub fn shared_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Stop launching new trials once `timeout` has elapsed. Running trials
    /// are never interrupted.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Number of cross-validation folds replayed by [`Tuner::xval`].
    ///
    /// # Panics
    ///
    /// Panics if `folds` is 0.
    #[must_use]
    pub fn xval_folds(mut self, folds: usize) -> Self {
        assert!(folds > 0, "xval_folds must be > 0");
        self.xval_folds = folds;
        self
    }

    /// Base seed of the cross-validation folds; fold `i` uses `seed + i`.
    #[must_use]
    pub fn xval_seed(mut self, seed: u64) -> Self {
        self.xval_seed = seed;
        self
    }

    /// Whether an existing study of the same name is resumed (the default)
    /// or reported as [`Error::StudyExists`].
    #[must_use]
    pub fn load_if_exists(mut self, load: bool) -> Self {
        self.load_if_exists = load;
        self
    }

    /// Opens or creates the study and builds the tuner.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when no search space was given.
    /// - [`Error::StudyMismatch`] when resuming a study created with a
    ///   different direction or search space.
    /// - [`Error::StudyExists`] when the study exists and resuming is off.
    /// - [`Error::Persistence`] when the store cannot be read.
    pub fn build(self) -> Result<Tuner> {
        let space = self
            .space
            .ok_or_else(|| Error::Config("a search space is required".to_string()))?;
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let study = if self.load_if_exists {
            Study::open_or_create(storage, &self.study_name, self.direction, &space)?
        } else {
            Study::create(storage, &self.study_name, self.direction, &space)?
        };

        Ok(Tuner {
            study,
            space: Arc::new(space),
            sampler: self
                .sampler
                .unwrap_or_else(|| Arc::new(RandomSampler::new())),
            pruner: self.pruner.unwrap_or_else(|| Arc::new(NopPruner)),
            timeout: self.timeout,
            xval_folds: self.xval_folds,
            xval_seed: self.xval_seed,
        })
    }
}

impl Default for TunerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
