//! Sampler trait and implementations for proposing field values.
//!
//! A sampler is asked for one field at a time, in the declaration order of
//! the [`SearchSpace`](crate::SearchSpace). It sees the values already chosen
//! for the current trial (so joint models can condition on them) and a
//! snapshot of the study history.

mod random;
pub mod tpe;

pub use random::RandomSampler;

use crate::distribution::FieldRule;
use crate::error::{Error, Result};
use crate::param::{Configuration, ParamValue};
use crate::trial::History;

/// The fields already decided for the trial being materialized.
#[derive(Clone, Debug, Default)]
pub struct Partial<'a> {
    rules: Vec<&'a FieldRule>,
    config: Configuration,
}

impl<'a> Partial<'a> {
    /// An empty partial configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, rule: &'a FieldRule, value: ParamValue) {
        self.rules.push(rule);
        self.config.insert(rule.name.clone(), value);
    }

    /// Position of the next field in declaration order.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no field has been decided yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Decided fields with their rules, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&'a FieldRule, &ParamValue)> + '_ {
        self.rules
            .iter()
            .copied()
            .zip(self.config.iter().map(|(_, v)| v))
    }

    /// The values decided so far.
    #[must_use]
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub(crate) fn into_config(self) -> Configuration {
        self.config
    }
}

/// Trait for strategies that propose the next value of a field.
///
/// Implementations must be thread-safe: several workers may materialize
/// configurations for different trials at the same time. Randomness should
/// depend only on the trial id and field position so a concurrent run
/// reproduces a sequential one.
pub trait Sampler: Send + Sync {
    /// Proposes a value for `field` in trial `trial_id`.
    ///
    /// `history` is a consistent snapshot of the study; it may contain
    /// running and failed trials, which implementations must not learn from.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DomainExhausted`] when no value can be produced.
    fn suggest(
        &self,
        field: &FieldRule,
        trial_id: u64,
        partial: &Partial<'_>,
        history: &History<'_>,
    ) -> Result<ParamValue>;
}

impl<S: Sampler + ?Sized> Sampler for std::sync::Arc<S> {
    fn suggest(
        &self,
        field: &FieldRule,
        trial_id: u64,
        partial: &Partial<'_>,
        history: &History<'_>,
    ) -> Result<ParamValue> {
        (**self).suggest(field, trial_id, partial, history)
    }
}

/// Draws a value uniformly from the field's domain.
pub(crate) fn uniform(field: &FieldRule, rng: &mut fastrand::Rng) -> Result<ParamValue> {
    let len = field.domain.len();
    if len == 0 {
        return Err(Error::DomainExhausted {
            field: field.name.clone(),
        });
    }
    field
        .domain
        .value_at(rng.usize(0..len))
        .ok_or_else(|| Error::DomainExhausted {
            field: field.name.clone(),
        })
}
