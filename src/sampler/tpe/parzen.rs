//! Parzen estimators over index-addressed finite domains.
//!
//! A mixture is kept as its components and evaluated point by point, so
//! fitting, scoring and drawing cost grows with the number of observations,
//! never with the size of the domain.

use crate::distribution::Domain;
use crate::rng_util;

/// Ordinal kernels put no mass further than this many bandwidths from their centre.
const TRUNCATION: f64 = 4.0;

/// Windows narrower than this are normalized and drawn from exactly.
const EXACT_WIDTH: usize = 64;

/// Gaussian draws that land outside the domain before falling back to the centre.
const MAX_REJECTIONS: usize = 64;

/// Per-observation kernel for one field.
///
/// Values are probability masses over `0..len`; every kernel row sums to one.
#[derive(Clone, Debug)]
pub(crate) struct Kernel {
    len: usize,
    shape: Shape,
}

#[derive(Clone, Debug)]
enum Shape {
    /// Mass `1 - smoothing` on the observed label, the rest spread evenly.
    Categorical { smoothing: f64 },
    /// Discretized Gaussian over indices within `radius` of the centre.
    Ordinal { sigma: f64, radius: usize },
}

impl Kernel {
    /// Fits the bandwidth to the observed indices of one group.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub(crate) fn fit(domain: &Domain, centers: &[usize]) -> Self {
        let len = domain.len().max(1);
        let m = centers.len();
        let shape = if domain.is_ordinal() {
            // Scott's rule on index scale, floored so a handful of identical
            // observations still leave mass on their neighbours.
            let n = m.max(1) as f64;
            let mean = centers.iter().map(|&c| c as f64).sum::<f64>() / n;
            let var = centers
                .iter()
                .map(|&c| (c as f64 - mean).powi(2))
                .sum::<f64>()
                / n;
            let scott = var.sqrt() * n.powf(-0.2);
            let floor = (len as f64 / (1.0 + m as f64).min(100.0)).max(0.5);
            let sigma = scott.clamp(floor, (len as f64).max(floor));
            Shape::Ordinal {
                sigma,
                radius: (TRUNCATION * sigma).ceil() as usize,
            }
        } else {
            Shape::Categorical {
                smoothing: 1.0 / (1.0 + m as f64),
            }
        };
        Self { len, shape }
    }

    /// Probability mass that the kernel centred at `center` puts on `x`.
    pub(crate) fn eval(&self, center: usize, x: usize) -> f64 {
        self.eval_normed(center, x, self.norm(center))
    }

    /// Inclusive index window that carries the mass of `center`.
    fn window(&self, center: usize, radius: usize) -> (usize, usize) {
        let hi = center.saturating_add(radius).min(self.len - 1);
        (center.saturating_sub(radius).min(hi), hi)
    }

    /// Unnormalized mass of the ordinal kernel at `center` summed over its window.
    #[allow(clippy::cast_precision_loss)]
    fn norm(&self, center: usize) -> f64 {
        let Shape::Ordinal { sigma, radius } = self.shape else {
            return 1.0;
        };
        let (lo, hi) = self.window(center, radius);
        if hi - lo < EXACT_WIDTH {
            return (lo..=hi).map(|k| bump(sigma, center, k)).sum();
        }
        // Wide windows imply a wide bandwidth, where the integral of the
        // Gaussian over the half-open cells matches the discrete sum.
        let c = center as f64;
        let upper = norm_cdf((hi as f64 + 0.5 - c) / sigma);
        let lower = norm_cdf((lo as f64 - 0.5 - c) / sigma);
        sigma * (2.0 * core::f64::consts::PI).sqrt() * (upper - lower)
    }

    #[allow(clippy::cast_precision_loss)]
    fn eval_normed(&self, center: usize, x: usize, norm: f64) -> f64 {
        if x >= self.len {
            return 0.0;
        }
        match self.shape {
            Shape::Categorical { smoothing } => {
                let base = smoothing / self.len as f64;
                if center == x { 1.0 - smoothing + base } else { base }
            }
            Shape::Ordinal { sigma, radius } => {
                if x.abs_diff(center) > radius || norm <= 0.0 {
                    0.0
                } else {
                    bump(sigma, center, x) / norm
                }
            }
        }
    }

    /// Draws one index from the kernel centred at `center`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn sample(&self, center: usize, rng: &mut fastrand::Rng) -> usize {
        match self.shape {
            Shape::Categorical { smoothing } => {
                if rng.f64() < smoothing {
                    rng.usize(0..self.len)
                } else {
                    center
                }
            }
            Shape::Ordinal { sigma, radius } => {
                let (lo, hi) = self.window(center, radius);
                if hi - lo < EXACT_WIDTH {
                    let masses: Vec<f64> = (lo..=hi).map(|k| bump(sigma, center, k)).collect();
                    return lo + rng_util::weighted_index(rng, &masses);
                }
                for _ in 0..MAX_REJECTIONS {
                    let x = (center as f64 + sigma * rng_util::standard_normal(rng)).round();
                    if x >= lo as f64 && x <= hi as f64 {
                        return (x as usize).clamp(lo, hi);
                    }
                }
                center
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

#[allow(clippy::cast_precision_loss)]
fn bump(sigma: f64, center: usize, x: usize) -> f64 {
    let z = (x as f64 - center as f64) / sigma;
    (-0.5 * z * z).exp()
}

/// Standard normal CDF (Hart's rational approximation).
fn norm_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }
    let t = 1.0 / (1.0 + 0.231_641_9 * x.abs());
    let poly = t
        * (0.319_381_530
            + t * (-0.356_563_782 + t * (1.781_477_937 + t * (-1.821_255_978 + t * 1.330_274_429))));
    let pdf = (-0.5 * x * x).exp() / (2.0 * core::f64::consts::PI).sqrt();
    let upper = 1.0 - pdf * poly;
    if x >= 0.0 { upper } else { 1.0 - upper }
}

#[derive(Clone, Debug)]
struct Component {
    center: usize,
    norm: f64,
}

/// A weighted mixture of kernels plus an optional flat prior.
#[derive(Clone, Debug)]
pub(crate) struct Parzen {
    kernel: Kernel,
    components: Vec<Component>,
    /// Normalized component weights; the last entry is the flat prior.
    mixture: Vec<f64>,
}

impl Parzen {
    /// Builds the mixture `sum_i w_i K(c_i, .)`, plus a flat prior component
    /// of weight `prior_weight` when given.
    ///
    /// With no usable mass the estimator is flat.
    pub(crate) fn new(
        kernel: &Kernel,
        centers: &[usize],
        weights: &[f64],
        prior_weight: Option<f64>,
    ) -> Self {
        let mut components = Vec::new();
        let mut mixture = Vec::new();
        for (&c, &w) in centers.iter().zip(weights) {
            if w <= 0.0 || !w.is_finite() || c >= kernel.len() {
                continue;
            }
            components.push(Component {
                center: c,
                norm: kernel.norm(c),
            });
            mixture.push(w);
        }
        mixture.push(prior_weight.filter(|pw| *pw > 0.0 && pw.is_finite()).unwrap_or(0.0));

        let total: f64 = mixture.iter().sum();
        if total > 0.0 && total.is_finite() {
            for w in &mut mixture {
                *w /= total;
            }
        } else {
            components.clear();
            mixture = vec![1.0];
        }
        Self {
            kernel: kernel.clone(),
            components,
            mixture,
        }
    }

    /// Probability mass at index `x`.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn pmf_at(&self, x: usize) -> f64 {
        let len = self.kernel.len();
        if x >= len {
            return 0.0;
        }
        let prior = self.mixture.last().copied().unwrap_or(0.0);
        let observed: f64 = self
            .components
            .iter()
            .zip(&self.mixture)
            .map(|(comp, w)| w * self.kernel.eval_normed(comp.center, x, comp.norm))
            .sum();
        observed + prior / len as f64
    }

    pub(crate) fn log_pmf(&self, x: usize) -> f64 {
        self.pmf_at(x).max(f64::MIN_POSITIVE).ln()
    }

    /// Draws an index: picks a component by weight, then draws from it.
    pub(crate) fn sample(&self, rng: &mut fastrand::Rng) -> usize {
        let pick = rng_util::weighted_index(rng, &self.mixture);
        match self.components.get(pick) {
            Some(comp) => self.kernel.sample(comp.center, rng),
            None => rng.usize(0..self.kernel.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn int_domain(high: i64) -> Domain {
        Domain::IntRange {
            low: 0,
            high,
            step: 1,
        }
    }

    fn total_mass(parzen: &Parzen, len: usize) -> f64 {
        (0..len).map(|x| parzen.pmf_at(x)).sum()
    }

    #[test]
    fn categorical_kernel_prefers_observed_label() {
        let domain = Domain::Categorical {
            values: vec![1_i64.into(), 2_i64.into(), 3_i64.into()],
        };
        let kernel = Kernel::fit(&domain, &[0, 0, 2]);
        let parzen = Parzen::new(&kernel, &[0, 0, 2], &[1.0, 1.0, 1.0], None);
        assert!((total_mass(&parzen, 3) - 1.0).abs() < 1e-9);
        assert!(parzen.pmf_at(0) > parzen.pmf_at(2));
        assert!(parzen.pmf_at(2) > parzen.pmf_at(1));
        assert!(parzen.pmf_at(1) > 0.0);
    }

    #[test]
    fn ordinal_kernel_spreads_to_neighbours() {
        let kernel = Kernel::fit(&int_domain(9), &[5]);
        let parzen = Parzen::new(&kernel, &[5], &[1.0], None);
        assert!((total_mass(&parzen, 10) - 1.0).abs() < 1e-9);
        assert!(parzen.pmf_at(5) > parzen.pmf_at(4) && parzen.pmf_at(4) > parzen.pmf_at(2));
        assert!((parzen.pmf_at(4) - parzen.pmf_at(6)).abs() < 1e-12);
    }

    #[test]
    fn empty_mixture_is_flat() {
        let kernel = Kernel::fit(&int_domain(3), &[]);
        let parzen = Parzen::new(&kernel, &[], &[], None);
        assert!((0..4).all(|x| (parzen.pmf_at(x) - 0.25).abs() < 1e-12));
        assert_eq!(parzen.pmf_at(4), 0.0);
    }

    #[test]
    fn wide_window_mass_still_sums_to_one() {
        let centers = [0, 1200, 4999];
        let kernel = Kernel::fit(&int_domain(4999), &centers);
        let parzen = Parzen::new(&kernel, &centers, &[1.0, 2.0, 1.0], Some(1.0));
        let mass = total_mass(&parzen, 5000);
        assert!((mass - 1.0).abs() < 1e-4, "mass {mass}");
    }

    #[test]
    fn truncated_kernel_has_no_far_tail() {
        let centers = [100, 100, 100, 100, 101, 99, 100, 100];
        let kernel = Kernel::fit(&int_domain(999), &centers);
        let Shape::Ordinal { radius, .. } = kernel.shape else {
            panic!("expected an ordinal kernel");
        };
        assert!(kernel.eval(100, 100 + radius) > 0.0);
        assert_eq!(kernel.eval(100, 101 + radius), 0.0);
    }

    #[test]
    fn draws_follow_the_heavier_component() {
        let domain = Domain::Categorical {
            values: vec![1_i64.into(), 2_i64.into(), 3_i64.into()],
        };
        let kernel = Kernel::fit(&domain, &[0, 2]);
        let parzen = Parzen::new(&kernel, &[0, 2], &[9.0, 1.0], None);
        let mut rng = fastrand::Rng::with_seed(4);
        let zeros = (0..1000).filter(|_| parzen.sample(&mut rng) == 0).count();
        assert!(zeros > 600, "only {zeros} of 1000 draws on the heavy label");
    }

    #[test]
    fn huge_domain_costs_per_observation() {
        let len = 4_000_000_000_usize;
        let domain = int_domain(i64::try_from(len).unwrap() - 1);
        let centers = [7, 1_000_000, 3_999_999_999];
        let started = Instant::now();
        let kernel = Kernel::fit(&domain, &centers);
        let parzen = Parzen::new(&kernel, &centers, &[1.0, 1.0, 1.0], Some(1.0));
        let mut rng = fastrand::Rng::with_seed(1);
        for _ in 0..1000 {
            let x = parzen.sample(&mut rng);
            assert!(x < len);
            assert!(parzen.log_pmf(x).is_finite());
        }
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
