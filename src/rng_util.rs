//! Deterministic random streams shared by the samplers.

/// Resolves an optional user seed into a concrete base seed.
pub(crate) fn base_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| fastrand::u64(..))
}

fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// A generator for one `(trial, field)` draw.
///
/// The stream depends only on its key, never on how many draws other
/// trials made before it, so concurrent workers reproduce a sequential run.
pub(crate) fn stream(seed: u64, trial_id: u64, position: usize) -> fastrand::Rng {
    let key = mix(mix(seed) ^ trial_id) ^ (position as u64).wrapping_mul(0xD6E8_FEB8_6659_FD93);
    fastrand::Rng::with_seed(mix(key))
}

/// Generate a random `f64` in the range `[low, high)`.
#[inline]
pub(crate) fn f64_range(rng: &mut fastrand::Rng, low: f64, high: f64) -> f64 {
    low + rng.f64() * (high - low)
}

/// A standard normal draw (Box-Muller).
pub(crate) fn standard_normal(rng: &mut fastrand::Rng) -> f64 {
    // 1 - [0, 1) keeps `ln` away from zero.
    let u1 = 1.0 - rng.f64();
    let u2 = rng.f64();
    (-2.0 * u1.ln()).sqrt() * (2.0 * core::f64::consts::PI * u2).cos()
}

/// Picks an index with probability proportional to `weights`.
///
/// Falls back to a uniform pick when the weights carry no mass.
pub(crate) fn weighted_index(rng: &mut fastrand::Rng, weights: &[f64]) -> usize {
    let total: f64 = weights.iter().filter(|w| w.is_finite()).sum();
    if weights.is_empty() || total <= 0.0 || !total.is_finite() {
        return rng.usize(0..weights.len().max(1));
    }
    let mut target = f64_range(rng, 0.0, total);
    for (i, &w) in weights.iter().enumerate() {
        if !w.is_finite() {
            continue;
        }
        if target < w {
            return i;
        }
        target -= w;
    }
    weights.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streams_are_keyed() {
        let a: Vec<u64> = (0..4).map(|_| stream(1, 7, 0).u64(..)).collect();
        assert!(a.windows(2).all(|w| w[0] == w[1]));
        assert_ne!(stream(1, 7, 0).u64(..), stream(1, 7, 1).u64(..));
        assert_ne!(stream(1, 7, 0).u64(..), stream(1, 8, 0).u64(..));
        assert_ne!(stream(1, 7, 0).u64(..), stream(2, 7, 0).u64(..));
    }

    #[test]
    fn standard_normal_is_centred() {
        let mut rng = fastrand::Rng::with_seed(9);
        let draws: Vec<f64> = (0..4000).map(|_| standard_normal(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / 4000.0;
        let var = draws.iter().map(|z| (z - mean).powi(2)).sum::<f64>() / 4000.0;
        assert!(draws.iter().all(|z| z.is_finite()));
        assert!(mean.abs() < 0.1, "mean {mean}");
        assert!((var - 1.0).abs() < 0.1, "variance {var}");
    }

    #[test]
    fn weighted_index_skips_zero_mass() {
        let mut rng = fastrand::Rng::with_seed(5);
        for _ in 0..100 {
            assert_eq!(weighted_index(&mut rng, &[0.0, 1.0, 0.0]), 1);
        }
        let i = weighted_index(&mut rng, &[0.0, 0.0]);
        assert!(i < 2);
    }
}
