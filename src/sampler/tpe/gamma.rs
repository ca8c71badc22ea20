use core::fmt::Debug;

use crate::Error;

fn open_unit(x: f64) -> bool {
    x > 0.0 && x < 1.0
}

/// A strategy for computing the gamma quantile in TPE.
///
/// Gamma is the fraction of completed trials treated as "good". The sampler
/// turns it into a count with `ceil(gamma * n)`, then clamps the count to
/// `1..=n`.
///
/// # Examples
///
/// ```
/// use seqtune::sampler::tpe::GammaStrategy;
///
/// #[derive(Debug, Clone)]
/// struct Quarter;
///
/// impl GammaStrategy for Quarter {
///     fn gamma(&self, _n_trials: usize) -> f64 {
///         0.25
///     }
///
///     fn clone_box(&self) -> Box<dyn GammaStrategy> {
///         Box::new(self.clone())
///     }
/// }
/// ```
pub trait GammaStrategy: Send + Sync + Debug {
    /// Gamma for a history of `n_trials` completed trials, in `(0.0, 1.0)`.
    fn gamma(&self, n_trials: usize) -> f64;

    /// Creates a boxed clone of this strategy.
    fn clone_box(&self) -> Box<dyn GammaStrategy>;
}

impl Clone for Box<dyn GammaStrategy> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A constant gamma.
#[derive(Debug, Clone, Copy)]
pub struct FixedGamma {
    gamma: f64,
}

impl FixedGamma {
    /// Creates a fixed gamma strategy.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidGamma` if gamma is not in (0.0, 1.0).
    pub fn new(gamma: f64) -> crate::Result<Self> {
        if !open_unit(gamma) {
            return Err(Error::InvalidGamma(gamma));
        }
        Ok(Self { gamma })
    }

    /// Returns the fixed gamma value.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.gamma
    }
}

impl Default for FixedGamma {
    fn default() -> Self {
        Self { gamma: 0.25 }
    }
}

impl GammaStrategy for FixedGamma {
    fn gamma(&self, _n_trials: usize) -> f64 {
        self.gamma
    }

    fn clone_box(&self) -> Box<dyn GammaStrategy> {
        Box::new(*self)
    }
}

/// Shrinks the good fraction as `factor / sqrt(n)`, capped at `gamma_max`.
#[derive(Debug, Clone, Copy)]
pub struct SqrtGamma {
    gamma_factor: f64,
    gamma_max: f64,
}

impl SqrtGamma {
    /// Creates a square-root gamma strategy.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidGamma` if `gamma_factor` is not positive or
    /// `gamma_max` is not in (0.0, 1.0).
    pub fn new(gamma_factor: f64, gamma_max: f64) -> crate::Result<Self> {
        if gamma_factor.is_nan() || gamma_factor <= 0.0 {
            return Err(Error::InvalidGamma(gamma_factor));
        }
        if !open_unit(gamma_max) {
            return Err(Error::InvalidGamma(gamma_max));
        }
        Ok(Self {
            gamma_factor,
            gamma_max,
        })
    }
}

impl Default for SqrtGamma {
    fn default() -> Self {
        Self {
            gamma_factor: 1.0,
            gamma_max: 0.25,
        }
    }
}

impl GammaStrategy for SqrtGamma {
    #[allow(clippy::cast_precision_loss)]
    fn gamma(&self, n_trials: usize) -> f64 {
        if n_trials == 0 {
            return self.gamma_max;
        }
        (self.gamma_factor / (n_trials as f64).sqrt()).min(self.gamma_max)
    }

    fn clone_box(&self) -> Box<dyn GammaStrategy> {
        Box::new(*self)
    }
}

/// `min(fraction, cap / n)`: a fixed fraction of the history until the good
/// group reaches `cap` trials, then a constant-size good group.
///
/// The default (`fraction = 0.1`, `cap = 25`) is the usual TPE split.
#[derive(Debug, Clone, Copy)]
pub struct LinearCappedGamma {
    fraction: f64,
    cap: usize,
}

impl LinearCappedGamma {
    /// Creates a capped linear strategy.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidGamma` if `fraction` is not in (0.0, 1.0) or
    /// `cap` is zero.
    pub fn new(fraction: f64, cap: usize) -> crate::Result<Self> {
        if !open_unit(fraction) {
            return Err(Error::InvalidGamma(fraction));
        }
        if cap == 0 {
            return Err(Error::InvalidGamma(0.0));
        }
        Ok(Self { fraction, cap })
    }
}

impl Default for LinearCappedGamma {
    fn default() -> Self {
        Self {
            fraction: 0.1,
            cap: 25,
        }
    }
}

impl GammaStrategy for LinearCappedGamma {
    #[allow(clippy::cast_precision_loss)]
    fn gamma(&self, n_trials: usize) -> f64 {
        if n_trials == 0 {
            return self.fraction;
        }
        self.fraction.min(self.cap as f64 / n_trials as f64)
    }

    fn clone_box(&self) -> Box<dyn GammaStrategy> {
        Box::new(*self)
    }
}
