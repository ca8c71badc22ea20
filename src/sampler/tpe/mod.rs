//! Tree-Parzen Estimator (TPE) sampler over finite field domains.
//!
//! TPE models `P(x | y)` instead of `P(y | x)`. It splits completed trials
//! into a "good" group (the best gamma fraction in the study direction) and
//! a "bad" group, fits a Parzen estimator to each, and proposes the value
//! maximizing `l(x) / g(x)`, an approximation of Expected Improvement.
//!
//! # Gamma strategies
//!
//! | Strategy | Formula | Default |
//! |----------|---------|---------|
//! | [`LinearCappedGamma`] | `min(fraction, cap / n)` | fraction = 0.1, cap = 25 |
//! | [`FixedGamma`] | Constant value | gamma = 0.25 |
//! | [`SqrtGamma`] | `factor / sqrt(n)` capped | factor = 1.0, max = 0.25 |
//!
//! # Kernels
//!
//! Categorical fields use a label kernel that keeps most mass on the
//! observed choice and spreads the rest evenly. Range fields use a Gaussian
//! discretized on the index grid, with a Scott's-rule bandwidth floored by
//! the domain size and truncated at four bandwidths. Estimators are sparse,
//! so a range of millions of values costs no more than a short one.
//!
//! # Examples
//!
//! ```
//! use seqtune::sampler::tpe::{SqrtGamma, TpeSampler};
//!
//! let sampler = TpeSampler::builder()
//!     .gamma_strategy(SqrtGamma::default())
//!     .n_startup_trials(20)
//!     .seed(42)
//!     .build()
//!     .unwrap();
//! assert!(!sampler.is_multivariate());
//! ```

mod gamma;
mod parzen;
mod sampler;

pub use gamma::{FixedGamma, GammaStrategy, LinearCappedGamma, SqrtGamma};
pub use sampler::{TpeSampler, TpeSamplerBuilder};
