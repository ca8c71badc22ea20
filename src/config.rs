//! File-based tuner configuration.
//!
//! A [`TunerConfig`] gathers everything an experiment entry point needs:
//! the study name and store location, the search-space preset, the trial
//! budget and the sampler, pruner and cross-validation settings. It is
//! usually read from TOML; every key is optional and defaults to the
//! values below.
//!
//! ```
//! use seqtune::TunerConfig;
//!
//! let config = TunerConfig::from_toml_str(
//!     r#"
//!     study_name = "tcn-basins"
//!     search_space = "tcn"
//!     n_trials = 30
//!
//!     [sampler]
//!     seed = 7
//!
//!     [pruner]
//!     kind = "successive-halving"
//!     max_resource = 270
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.sampler.n_startup_trials, 15);
//! assert_eq!(config.pruner.min_resource, 10);
//! ```
//!
//! | Key | Default |
//! |-----|---------|
//! | `study_name` | `"study"` |
//! | `direction` | `"minimize"` |
//! | `storage` | `"memory"` |
//! | `search_space` | `"lstm"` |
//! | `n_trials` | 60 |
//! | `n_workers` | 1 |
//! | `timeout_secs` | none |
//! | `sampler.kind` | `"tpe"` |
//! | `sampler.seed` | 1 |
//! | `sampler.n_startup_trials` | 15 |
//! | `sampler.n_ei_candidates` | 24 |
//! | `sampler.multivariate` | `true` |
//! | `sampler.consider_prior` | `false` |
//! | `pruner.kind` | `"hyperband"` |
//! | `pruner.min_resource` | 10 |
//! | `pruner.reduction_factor` | 3 |
//! | `pruner.max_resource` | auto |
//! | `xval.folds` | 5 |
//! | `xval.seed` | 1 |

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::objective::Objective;
use crate::presets::SearchSpacePreset;
use crate::pruner::{
    HyperbandPruner, MaxResource, MedianPruner, NopPruner, Pruner, SuccessiveHalvingPruner,
};
use crate::sampler::tpe::TpeSampler;
use crate::sampler::{RandomSampler, Sampler};
use crate::space::SearchSpace;
use crate::storage::{self, Storage};
use crate::tuner::{TuneSummary, Tuner};
use crate::types::Direction;

/// Top-level experiment configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TunerConfig {
    /// Study name in the store.
    pub study_name: String,
    /// Optimization direction.
    pub direction: Direction,
    /// Store location, see [`storage::open`].
    pub storage: String,
    /// Search-space preset.
    pub search_space: SearchSpacePreset,
    /// Trial budget of one tune run.
    pub n_trials: usize,
    /// Concurrent workers for the parallel driver.
    pub n_workers: usize,
    /// Stop launching trials after this many seconds.
    pub timeout_secs: Option<u64>,
    /// Sampler settings.
    pub sampler: SamplerConfig,
    /// Pruner settings.
    pub pruner: PrunerConfig,
    /// Cross-validation settings.
    pub xval: XvalConfig,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            study_name: "study".to_string(),
            direction: Direction::Minimize,
            storage: "memory".to_string(),
            search_space: SearchSpacePreset::Lstm,
            n_trials: 60,
            n_workers: 1,
            timeout_secs: None,
            sampler: SamplerConfig::default(),
            pruner: PrunerConfig::default(),
            xval: XvalConfig::default(),
        }
    }
}

/// Which sampler to build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplerKind {
    /// Uniform draws.
    Random,
    /// Tree-structured Parzen estimator.
    #[default]
    Tpe,
}

/// Sampler settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerConfig {
    /// Sampler family.
    pub kind: SamplerKind,
    /// Seed of every random draw.
    pub seed: Option<u64>,
    /// Complete trials needed before TPE models the history.
    pub n_startup_trials: usize,
    /// Candidates scored per TPE draw.
    pub n_ei_candidates: usize,
    /// Condition each field on the fields drawn before it.
    pub multivariate: bool,
    /// Mix a flat prior into the TPE densities.
    pub consider_prior: bool,
    /// Fixed gamma; the default is `min(0.1, 25 / n)`.
    pub gamma: Option<f64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            kind: SamplerKind::Tpe,
            seed: Some(1),
            n_startup_trials: 15,
            n_ei_candidates: 24,
            multivariate: true,
            consider_prior: false,
            gamma: None,
        }
    }
}

/// Which pruner to build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrunerKind {
    /// Never prune.
    None,
    /// Median of complete trials at the same step.
    Median,
    /// A single Successive Halving bracket.
    SuccessiveHalving,
    /// Several Successive Halving brackets.
    #[default]
    Hyperband,
}

/// Pruner settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrunerConfig {
    /// Pruner family.
    pub kind: PrunerKind,
    /// Step of the first rung.
    pub min_resource: u64,
    /// Keep the top `1 / reduction_factor` at each rung.
    pub reduction_factor: u64,
    /// Full budget; resolved from the first complete trial when absent.
    pub max_resource: Option<u64>,
    /// Skip the first rungs (Successive Halving only).
    pub min_early_stopping_rate: u32,
    /// Trials that must reach a rung before it prunes.
    pub bootstrap_count: usize,
    /// Warmup steps (median only).
    pub n_warmup_steps: u64,
}

impl Default for PrunerConfig {
    fn default() -> Self {
        Self {
            kind: PrunerKind::Hyperband,
            min_resource: 10,
            reduction_factor: 3,
            max_resource: None,
            min_early_stopping_rate: 0,
            bootstrap_count: 0,
            n_warmup_steps: 0,
        }
    }
}

/// Cross-validation settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct XvalConfig {
    /// Number of folds.
    pub folds: usize,
    /// Seed of fold 0; fold `i` uses `seed + i`.
    pub seed: u64,
}

impl Default for XvalConfig {
    fn default() -> Self {
        Self { folds: 5, seed: 1 }
    }
}

impl TunerConfig {
    /// Parses TOML.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for malformed TOML, unknown keys or invalid values.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Serializes back to TOML.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Checks value ranges the types cannot express.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, reason: &str| -> Result<()> {
            Err(Error::Config(format!("{key}: {reason}")))
        };
        if self.study_name.trim().is_empty() {
            return invalid("study_name", "must not be empty");
        }
        if self.n_workers == 0 {
            return invalid("n_workers", "must be at least 1");
        }
        if self.xval.folds == 0 {
            return invalid("xval.folds", "must be at least 1");
        }
        if self.pruner.min_resource == 0 {
            return invalid("pruner.min_resource", "must be at least 1");
        }
        if self.pruner.reduction_factor < 2 {
            return invalid("pruner.reduction_factor", "must be at least 2");
        }
        if self.pruner.max_resource == Some(0) {
            return invalid("pruner.max_resource", "must be at least 1");
        }
        if let Some(gamma) = self.sampler.gamma
            && !(gamma > 0.0 && gamma < 1.0)
        {
            return invalid("sampler.gamma", "must be in (0, 1)");
        }
        Ok(())
    }

    /// The search space of the configured preset.
    ///
    /// # Errors
    ///
    /// Propagates [`SearchSpace::new`] errors.
    pub fn build_space(&self) -> Result<SearchSpace> {
        self.search_space.space()
    }

    /// The configured sampler.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidGamma`] for an out-of-range gamma.
    pub fn build_sampler(&self) -> Result<Arc<dyn Sampler>> {
        let s = &self.sampler;
        Ok(match s.kind {
            SamplerKind::Random => Arc::new(match s.seed {
                Some(seed) => RandomSampler::with_seed(seed),
                None => RandomSampler::new(),
            }),
            SamplerKind::Tpe => {
                let mut builder = TpeSampler::builder()
                    .n_startup_trials(s.n_startup_trials)
                    .n_ei_candidates(s.n_ei_candidates)
                    .multivariate(s.multivariate)
                    .consider_prior(s.consider_prior);
                if let Some(seed) = s.seed {
                    builder = builder.seed(seed);
                }
                if let Some(gamma) = s.gamma {
                    builder = builder.gamma(gamma);
                }
                Arc::new(builder.build()?)
            }
        })
    }

    /// The configured pruner.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when [`validate`](Self::validate) would fail.
    pub fn build_pruner(&self) -> Result<Arc<dyn Pruner>> {
        self.validate()?;
        let p = &self.pruner;
        let max_resource = p.max_resource.map_or(MaxResource::Auto, MaxResource::Fixed);
        Ok(match p.kind {
            PrunerKind::None => Arc::new(NopPruner),
            PrunerKind::Median => Arc::new(
                MedianPruner::new()
                    .n_warmup_steps(p.n_warmup_steps)
                    .n_min_trials(p.bootstrap_count.max(1)),
            ),
            PrunerKind::SuccessiveHalving => Arc::new(
                SuccessiveHalvingPruner::new()
                    .min_resource(p.min_resource)
                    .reduction_factor(p.reduction_factor)
                    .min_early_stopping_rate(p.min_early_stopping_rate)
                    .bootstrap_count(p.bootstrap_count)
                    .max_resource(max_resource),
            ),
            PrunerKind::Hyperband => Arc::new(
                HyperbandPruner::new()
                    .min_resource(p.min_resource)
                    .reduction_factor(p.reduction_factor)
                    .bootstrap_count(p.bootstrap_count)
                    .max_resource(max_resource),
            ),
        })
    }

    /// Opens the configured store.
    ///
    /// # Errors
    ///
    /// See [`storage::open`].
    pub fn open_storage(&self) -> Result<Arc<dyn Storage>> {
        storage::open(&self.storage)
    }

    /// Opens the store and builds a tuner resuming the configured study.
    ///
    /// # Errors
    ///
    /// Any error of the individual builders or of [`TunerBuilder::build`](crate::TunerBuilder::build).
    pub fn build_tuner(&self) -> Result<Tuner> {
        self.validate()?;
        let mut builder = Tuner::builder()
            .study_name(self.study_name.clone())
            .direction(self.direction)
            .space(self.build_space()?)
            .shared_sampler(self.build_sampler()?)
            .shared_pruner(self.build_pruner()?)
            .shared_storage(self.open_storage()?)
            .xval_folds(self.xval.folds)
            .xval_seed(self.xval.seed);
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder.build()
    }

    /// Builds the tuner and spends the configured budget of `n_trials`.
    ///
    /// One worker runs the trials on the calling thread with
    /// [`Tuner::tune`]. More workers go through [`Tuner::tune_parallel`] on
    /// a runtime owned by this call. The tuner is returned for follow-up
    /// work such as [`Tuner::xval`].
    ///
    /// # Errors
    ///
    /// Any error of [`build_tuner`](Self::build_tuner) or of the tune loop.
    /// [`Error::Config`] when `n_workers > 1` and the crate was built
    /// without the `async` feature, or when called from inside a tokio
    /// runtime (await [`Tuner::tune_parallel`] there instead).
    pub fn run<O>(&self, objective: O) -> Result<(Tuner, TuneSummary)>
    where
        O: Objective + Send + Sync + 'static,
    {
        let tuner = self.build_tuner()?;
        let summary = if self.n_workers == 1 {
            tuner.tune(self.n_trials, &objective)?
        } else {
            self.run_parallel(&tuner, objective)?
        };
        Ok((tuner, summary))
    }

    #[cfg(feature = "async")]
    fn run_parallel<O>(&self, tuner: &Tuner, objective: O) -> Result<TuneSummary>
    where
        O: Objective + Send + Sync + 'static,
    {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(Error::Config(
                "n_workers: run() cannot start a runtime inside another; await Tuner::tune_parallel"
                    .to_string(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .build()
            .map_err(|e| Error::TaskError(e.to_string()))?;
        runtime.block_on(tuner.tune_parallel(self.n_trials, self.n_workers, objective))
    }

    #[cfg(not(feature = "async"))]
    fn run_parallel<O>(&self, _tuner: &Tuner, _objective: O) -> Result<TuneSummary>
    where
        O: Objective + Send + Sync + 'static,
    {
        Err(Error::Config(format!(
            "n_workers: {} workers need the `async` feature",
            self.n_workers
        )))
    }
}
