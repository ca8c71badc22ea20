//! Field domains and the rules that bind them to names.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::param::ParamValue;

/// Relative tolerance used when mapping a float back onto its step grid.
const GRID_TOLERANCE: f64 = 1e-9;

/// The finite set of values a field may take.
///
/// Every domain is index-addressable: values are numbered `0..len()` in
/// declaration order (categorical) or ascending order (ranges). Samplers
/// work on those indices and never see raw values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Domain {
    /// An explicit list of choices.
    Categorical {
        /// The choices in declaration order.
        values: Vec<ParamValue>,
    },
    /// Integers `low, low + step, ..., <= high`.
    IntRange {
        /// Lower bound (inclusive).
        low: i64,
        /// Upper bound (inclusive when on the grid).
        high: i64,
        /// Grid spacing.
        step: i64,
    },
    /// Floats `low, low + step, ..., <= high`.
    FloatRange {
        /// Lower bound (inclusive).
        low: f64,
        /// Upper bound (inclusive when on the grid).
        high: f64,
        /// Grid spacing.
        step: f64,
    },
}

impl Domain {
    /// Number of values in the domain; zero for a range too wide to index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.checked_len().unwrap_or(0)
    }

    /// Number of values in the domain, or `None` when a range holds more
    /// values than a `usize` index can address.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn checked_len(&self) -> Option<usize> {
        match self {
            Domain::Categorical { values } => Some(values.len()),
            Domain::IntRange { low, high, step } => {
                if high < low || *step <= 0 {
                    return Some(0);
                }
                let count = (i128::from(*high) - i128::from(*low)) / i128::from(*step) + 1;
                usize::try_from(count).ok()
            }
            Domain::FloatRange { low, high, step } => {
                let finite = low.is_finite() && high.is_finite() && step.is_finite();
                if !finite || high < low || *step <= 0.0 {
                    return Some(0);
                }
                let span = (high - low) / step;
                let last = (span + GRID_TOLERANCE * span.max(1.0)).floor();
                // `usize::MAX as f64` rounds up, so `<` leaves room for the `+ 1`.
                (last.is_finite() && last < usize::MAX as f64).then(|| last as usize + 1)
            }
        }
    }

    /// Whether the domain has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether neighbouring indices are related (ranges) rather than
    /// unrelated labels (categorical).
    #[must_use]
    pub fn is_ordinal(&self) -> bool {
        !matches!(self, Domain::Categorical { .. })
    }

    /// The value at `index`, or `None` when out of range.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn value_at(&self, index: usize) -> Option<ParamValue> {
        if index >= self.len() {
            return None;
        }
        match self {
            Domain::Categorical { values } => values.get(index).cloned(),
            Domain::IntRange { low, step, .. } => {
                let v = i128::from(*low) + i128::from(*step) * i128::try_from(index).ok()?;
                i64::try_from(v).ok().map(ParamValue::Int)
            }
            Domain::FloatRange { low, step, .. } => {
                Some(ParamValue::Float(low + step * index as f64))
            }
        }
    }

    /// The index of `value`, or `None` when it is not in the domain.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn index_of(&self, value: &ParamValue) -> Option<usize> {
        match self {
            Domain::Categorical { values } => values.iter().position(|v| v == value),
            Domain::IntRange { low, high, step } => {
                let ParamValue::Int(v) = value else {
                    return None;
                };
                if v < low || v > high || *step <= 0 {
                    return None;
                }
                let offset = i128::from(*v) - i128::from(*low);
                if offset % i128::from(*step) != 0 {
                    return None;
                }
                usize::try_from(offset / i128::from(*step)).ok()
            }
            Domain::FloatRange { low, step, .. } => {
                let v = value.as_f64()?;
                let pos = (v - low) / step;
                let idx = pos.round();
                if idx < 0.0 || (pos - idx).abs() > GRID_TOLERANCE * pos.abs().max(1.0) {
                    return None;
                }
                let idx = idx as usize;
                (idx < self.len()).then_some(idx)
            }
        }
    }

    /// Whether `value` belongs to the domain.
    #[must_use]
    pub fn contains(&self, value: &ParamValue) -> bool {
        self.index_of(value).is_some()
    }
}

/// A named field and its domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Field name, unique across the whole search space.
    pub name: String,
    /// The values the field may take.
    pub domain: Domain,
}

impl FieldRule {
    /// A categorical field over `values`.
    pub fn categorical<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        Self {
            name: name.into(),
            domain: Domain::Categorical {
                values: values.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// An integer range field.
    pub fn int_range(name: impl Into<String>, low: i64, high: i64, step: i64) -> Self {
        Self {
            name: name.into(),
            domain: Domain::IntRange { low, high, step },
        }
    }

    /// A float range field on a fixed grid.
    pub fn float_range(name: impl Into<String>, low: f64, high: f64, step: f64) -> Self {
        Self {
            name: name.into(),
            domain: Domain::FloatRange { low, high, step },
        }
    }

    /// Checks that the domain is well formed and non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`], [`Error::InvalidStep`],
    /// [`Error::EmptyDomain`], or [`Error::Config`] when a range holds more
    /// values than can be indexed.
    #[allow(clippy::cast_precision_loss)]
    pub fn validate(&self) -> Result<()> {
        match &self.domain {
            Domain::Categorical { values } => {
                if values.is_empty() {
                    return Err(Error::EmptyDomain(self.name.clone()));
                }
                if values.iter().any(|v| matches!(v, ParamValue::Float(f) if !f.is_finite())) {
                    return Err(Error::Config(format!(
                        "field '{}' lists a non-finite choice",
                        self.name
                    )));
                }
            }
            Domain::IntRange { low, high, step } => {
                if low > high {
                    return Err(Error::InvalidBounds {
                        name: self.name.clone(),
                        low: *low as f64,
                        high: *high as f64,
                    });
                }
                if *step <= 0 {
                    return Err(Error::InvalidStep(self.name.clone()));
                }
            }
            Domain::FloatRange { low, high, step } => {
                if !low.is_finite() || !high.is_finite() || low > high {
                    return Err(Error::InvalidBounds {
                        name: self.name.clone(),
                        low: *low,
                        high: *high,
                    });
                }
                if !step.is_finite() || *step <= 0.0 {
                    return Err(Error::InvalidStep(self.name.clone()));
                }
            }
        }
        match self.domain.checked_len() {
            None => Err(Error::Config(format!(
                "field '{}' spans more values than can be indexed",
                self.name
            ))),
            Some(0) => Err(Error::EmptyDomain(self.name.clone())),
            Some(_) => Ok(()),
        }
    }
}
