#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]

//! Resumable hyperparameter search for families of sequence models.
//!
//! A [`Tuner`] draws configurations from a declarative [`SearchSpace`] with a
//! [`Sampler`](sampler::Sampler) (uniform or Tree-Parzen), runs a user
//! [`Objective`] that reports intermediate metrics through a [`Reporter`],
//! stops unpromising trials early with a rung-based
//! [`Pruner`](pruner::Pruner) (Successive Halving / Hyperband), and persists
//! every trial into a [`Study`] held by a durable [`Storage`](storage::Storage)
//! backend so the search can be resumed and audited. After tuning,
//! [`Tuner::xval`] replays the best configuration across cross-validation folds.
//!
//! # Getting Started
//!
//! ```
//! use seqtune::prelude::*;
//!
//! let space = SearchSpace::new(vec![
//!     FieldGroup::new("model")
//!         .categorical("hidden", [16_i64, 32, 64])
//!         .int_range("layers", 1, 3, 1),
//! ])
//! .unwrap();
//!
//! let tuner = Tuner::builder()
//!     .study_name("demo")
//!     .maximize()
//!     .space(space)
//!     .sampler(RandomSampler::with_seed(7))
//!     .build()
//!     .unwrap();
//!
//! let objective = |config: &Configuration, reporter: &mut Reporter<'_>, cancel: &CancellationToken| {
//!     let hidden = config.get_int("hidden")? as f64;
//!     let mut score = 0.0;
//!     for step in 0..5_u32 {
//!         if cancel.is_cancelled() {
//!             break;
//!         }
//!         score = hidden.ln() * f64::from(step + 1);
//!         reporter.report(u64::from(step), score)?;
//!     }
//!     Ok::<_, Error>(score)
//! };
//!
//! let summary = tuner.tune(10, &objective).unwrap();
//! assert_eq!(summary.n_new_trials, 10);
//! assert!(tuner.study().best_trial().is_ok());
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`SearchSpace`] | Static, validated set of field rules grouped into flat-namespaced groups. |
//! | [`Sampler`](sampler::Sampler) | Proposes one value per field, optionally conditioned on earlier fields. |
//! | [`Pruner`](pruner::Pruner) | Decides after each report whether a running trial is stopped. |
//! | [`Study`] | Append-only trial history for one experiment, addressed by name. |
//! | [`Tuner`] | The tune loop and the cross-validation replay of the winner. |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) | on |
//! | `sqlite` | [`SqliteStorage`](storage::SqliteStorage) transactional backend | on |
//! | `async` | [`Tuner::tune_parallel`] on the tokio blocking pool | on |
//! | `cli` | The `seqtune` inspection binary | on |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

pub mod config;
mod distribution;
mod error;
pub mod objective;
mod param;
pub mod presets;
pub mod pruner;
mod rng_util;
pub mod sampler;
mod space;
pub mod storage;
mod study;
mod trial;
mod tuner;
mod types;

pub use config::TunerConfig;
pub use distribution::{Domain, FieldRule};
pub use error::{Error, Result};
pub use objective::{Fold, Objective};
pub use param::{Configuration, ParamValue};
pub use presets::SearchSpacePreset;
pub use space::{FieldGroup, SearchSpace};
pub use study::{StateCounts, Study, StudyExport};
pub use trial::{CancellationToken, History, Reporter, TrialRecord, Verdict};
pub use tuner::{FoldResult, TuneSummary, Tuner, TunerBuilder, XvalReport};
pub use types::{Direction, TrialState};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use seqtune::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::TunerConfig;
    pub use crate::distribution::{Domain, FieldRule};
    pub use crate::error::{Error, Result};
    pub use crate::objective::{Fold, Objective};
    pub use crate::param::{Configuration, ParamValue};
    pub use crate::presets::SearchSpacePreset;
    pub use crate::pruner::{
        HyperbandPruner, MaxResource, MedianPruner, NopPruner, Pruner, SuccessiveHalvingPruner,
    };
    pub use crate::sampler::tpe::{FixedGamma, LinearCappedGamma, SqrtGamma, TpeSampler};
    pub use crate::sampler::{RandomSampler, Sampler};
    #[cfg(feature = "sqlite")]
    pub use crate::storage::SqliteStorage;
    pub use crate::storage::{JournalStorage, MemoryStorage, Storage};
    pub use crate::space::{FieldGroup, SearchSpace};
    pub use crate::study::{StateCounts, Study, StudyExport};
    pub use crate::trial::{CancellationToken, History, Reporter, TrialRecord, Verdict};
    pub use crate::tuner::{FoldResult, TuneSummary, Tuner, TunerBuilder, XvalReport};
    pub use crate::types::{Direction, TrialState};
}
