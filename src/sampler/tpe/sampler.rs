use std::sync::Arc;

use super::gamma::{GammaStrategy, LinearCappedGamma};
use super::parzen::{Kernel, Parzen};
use crate::distribution::FieldRule;
use crate::error::{Error, Result};
use crate::param::ParamValue;
use crate::rng_util;
use crate::sampler::{Partial, Sampler, uniform};
use crate::trial::{History, TrialRecord};

/// A Tree-structured Parzen Estimator sampler over finite domains.
///
/// Completed trials are ranked in the study direction and split into a
/// "good" group (the best `ceil(gamma * n)`) and a "bad" group (the rest,
/// plus every pruned trial). For each field a Parzen estimator is fitted to
/// each group; candidates are drawn from the good density `l(x)` and the one
/// maximizing `l(x) / g(x)` wins.
///
/// In multivariate mode each observation's kernel is weighted by how well it
/// agrees with the values already chosen for earlier fields of the same
/// trial, which turns the per-field draws into a draw from the joint density.
///
/// Until `n_startup_trials` trials are complete every field is drawn
/// uniformly, exactly as [`RandomSampler`](crate::sampler::RandomSampler)
/// with the same seed would.
///
/// # Examples
///
/// ```
/// use seqtune::sampler::tpe::TpeSampler;
///
/// let sampler = TpeSampler::builder()
///     .n_startup_trials(15)
///     .multivariate(true)
///     .consider_prior(false)
///     .seed(1)
///     .build()
///     .unwrap();
/// assert_eq!(sampler.n_startup_trials(), 15);
/// ```
#[derive(Clone, Debug)]
pub struct TpeSampler {
    gamma_strategy: Arc<dyn GammaStrategy>,
    n_startup_trials: usize,
    n_ei_candidates: usize,
    multivariate: bool,
    prior_weight: Option<f64>,
    seed: u64,
}

impl TpeSampler {
    /// A sampler with default settings: 10 startup trials, 24 candidates,
    /// independent mode, prior weight 1.0, [`LinearCappedGamma`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            gamma_strategy: Arc::new(LinearCappedGamma::default()),
            n_startup_trials: 10,
            n_ei_candidates: 24,
            multivariate: false,
            prior_weight: Some(1.0),
            seed: rng_util::base_seed(None),
        }
    }

    /// Creates a builder.
    #[must_use]
    pub fn builder() -> TpeSamplerBuilder {
        TpeSamplerBuilder::new()
    }

    /// Number of complete trials before the density model is used.
    #[must_use]
    pub fn n_startup_trials(&self) -> usize {
        self.n_startup_trials
    }

    /// Whether fields are modelled jointly.
    #[must_use]
    pub fn is_multivariate(&self) -> bool {
        self.multivariate
    }

    /// The gamma strategy.
    #[must_use]
    pub fn gamma_strategy(&self) -> &dyn GammaStrategy {
        self.gamma_strategy.as_ref()
    }

    /// Splits complete trials into good and bad groups; pruned trials are bad.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn split<'h>(
        &self,
        history: &History<'h>,
        trial_id: u64,
    ) -> (Vec<&'h TrialRecord>, Vec<&'h TrialRecord>) {
        let direction = history.direction();
        let mut ranked: Vec<&TrialRecord> =
            history.completed().filter(|t| t.id != trial_id).collect();
        ranked.sort_by(|a, b| {
            direction
                .compare(a.value.unwrap_or(f64::NAN), b.value.unwrap_or(f64::NAN))
                .then(a.id.cmp(&b.id))
        });

        let n = ranked.len();
        if n == 0 {
            return (Vec::new(), Vec::new());
        }
        let gamma = self.gamma_strategy.gamma(n).clamp(f64::MIN_POSITIVE, 1.0);
        let n_good = ((gamma * n as f64).ceil() as usize).clamp(1, n);

        let mut bad = ranked.split_off(n_good);
        bad.extend(history.pruned().filter(|t| t.id != trial_id));
        (ranked, bad)
    }

    /// Kernel centres and mixture weights of `field` within one group.
    fn observations(
        &self,
        field: &FieldRule,
        partial: &Partial<'_>,
        group: &[&TrialRecord],
    ) -> (Vec<usize>, Vec<f64>) {
        let own: Vec<Option<usize>> = group
            .iter()
            .map(|t| t.config.get(&field.name).and_then(|v| field.domain.index_of(v)))
            .collect();
        let mut weights: Vec<f64> = own
            .iter()
            .map(|c| if c.is_some() { 1.0 } else { 0.0 })
            .collect();

        if self.multivariate {
            for (rule, chosen) in partial.fields() {
                let Some(x) = rule.domain.index_of(chosen) else {
                    continue;
                };
                let centers: Vec<Option<usize>> = group
                    .iter()
                    .map(|t| t.config.get(&rule.name).and_then(|v| rule.domain.index_of(v)))
                    .collect();
                let present: Vec<usize> = centers.iter().flatten().copied().collect();
                let kernel = Kernel::fit(&rule.domain, &present);
                for (w, c) in weights.iter_mut().zip(&centers) {
                    *w *= c.map_or(0.0, |c| kernel.eval(c, x));
                }
            }
        }

        own.into_iter()
            .zip(weights)
            .filter_map(|(c, w)| c.map(|c| (c, w)))
            .unzip()
    }
}

impl Default for TpeSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for TpeSampler {
    fn suggest(
        &self,
        field: &FieldRule,
        trial_id: u64,
        partial: &Partial<'_>,
        history: &History<'_>,
    ) -> Result<ParamValue> {
        let mut rng = rng_util::stream(self.seed, trial_id, partial.len());

        let n_complete = history.completed().filter(|t| t.id != trial_id).count();
        if n_complete == 0 || n_complete < self.n_startup_trials {
            return uniform(field, &mut rng);
        }

        let (good, bad) = self.split(history, trial_id);
        let (good_centers, good_weights) = self.observations(field, partial, &good);
        if good_centers.is_empty() || good_weights.iter().all(|w| *w <= 0.0) {
            return uniform(field, &mut rng);
        }
        let (bad_centers, bad_weights) = self.observations(field, partial, &bad);

        let l = Parzen::new(
            &Kernel::fit(&field.domain, &good_centers),
            &good_centers,
            &good_weights,
            self.prior_weight,
        );
        let g = Parzen::new(
            &Kernel::fit(&field.domain, &bad_centers),
            &bad_centers,
            &bad_weights,
            self.prior_weight,
        );

        let mut best: Option<(usize, f64)> = None;
        for _ in 0..self.n_ei_candidates {
            let candidate = l.sample(&mut rng);
            let score = l.log_pmf(candidate) - g.log_pmf(candidate);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((candidate, score));
            }
        }

        let Some((index, _)) = best else {
            return uniform(field, &mut rng);
        };
        trace_debug!(
            field = field.name.as_str(),
            trial_id,
            n_good = good.len(),
            n_bad = bad.len(),
            "tpe suggestion"
        );
        field
            .domain
            .value_at(index)
            .ok_or_else(|| Error::DomainExhausted {
                field: field.name.clone(),
            })
    }
}

/// Builder for [`TpeSampler`].
#[derive(Debug)]
pub struct TpeSamplerBuilder {
    gamma_strategy: Box<dyn GammaStrategy>,
    raw_gamma: Option<f64>,
    n_startup_trials: usize,
    n_ei_candidates: usize,
    multivariate: bool,
    consider_prior: bool,
    prior_weight: f64,
    seed: Option<u64>,
}

impl TpeSamplerBuilder {
    /// A builder with the defaults of [`TpeSampler::new`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            gamma_strategy: Box::new(LinearCappedGamma::default()),
            raw_gamma: None,
            n_startup_trials: 10,
            n_ei_candidates: 24,
            multivariate: false,
            consider_prior: true,
            prior_weight: 1.0,
            seed: None,
        }
    }

    /// Uses a fixed gamma. Validated in [`build`](Self::build).
    #[must_use]
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.raw_gamma = Some(gamma);
        self
    }

    /// Uses a custom gamma strategy.
    #[must_use]
    pub fn gamma_strategy<G: GammaStrategy + 'static>(mut self, strategy: G) -> Self {
        self.gamma_strategy = Box::new(strategy);
        self.raw_gamma = None;
        self
    }

    /// Number of complete trials drawn uniformly before modelling starts.
    #[must_use]
    pub fn n_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    /// Number of candidates drawn from `l(x)` per suggestion. Zero is treated as one.
    #[must_use]
    pub fn n_ei_candidates(mut self, n: usize) -> Self {
        self.n_ei_candidates = n.max(1);
        self
    }

    /// Models fields jointly instead of independently.
    #[must_use]
    pub fn multivariate(mut self, multivariate: bool) -> Self {
        self.multivariate = multivariate;
        self
    }

    /// Adds a flat prior component to both densities.
    #[must_use]
    pub fn consider_prior(mut self, consider: bool) -> Self {
        self.consider_prior = consider;
        self
    }

    /// Weight of the prior component relative to one observation.
    #[must_use]
    pub fn prior_weight(mut self, weight: f64) -> Self {
        self.prior_weight = weight;
        self
    }

    /// Fixes the seed for reproducible draws.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the sampler.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidGamma` for a fixed gamma outside (0.0, 1.0) and
    /// `Error::Config` for a non-positive prior weight.
    pub fn build(self) -> Result<TpeSampler> {
        let gamma_strategy: Arc<dyn GammaStrategy> = match self.raw_gamma {
            Some(raw) => Arc::new(super::FixedGamma::new(raw)?),
            None => Arc::from(self.gamma_strategy),
        };
        if self.consider_prior && (self.prior_weight <= 0.0 || !self.prior_weight.is_finite()) {
            return Err(Error::Config(format!(
                "prior_weight must be positive, got {}",
                self.prior_weight
            )));
        }
        Ok(TpeSampler {
            gamma_strategy,
            n_startup_trials: self.n_startup_trials,
            n_ei_candidates: self.n_ei_candidates,
            multivariate: self.multivariate,
            prior_weight: self.consider_prior.then_some(self.prior_weight),
            seed: rng_util::base_seed(self.seed),
        })
    }
}

impl Default for TpeSamplerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
