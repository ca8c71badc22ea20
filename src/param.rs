//! Parameter values and materialized configurations.

use core::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A concrete value chosen for one search-space field.
///
/// Serialized without a tag so stored configurations read naturally
/// (`{"model_dim": 64, "lr": 0.001, "fusion_method": "pre_encoded"}`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A boolean value.
    Bool(bool),
    /// An integer value.
    Int(i64),
    /// A floating-point value.
    Float(f64),
    /// A string value.
    Str(String),
}

impl ParamValue {
    /// The value as `f64`, widening integers.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Bool(_) | ParamValue::Str(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

/// An ordered mapping from field name to chosen value.
///
/// Entries keep the declaration order of the search space that produced
/// them. Once a configuration is attached to a trial it is never mutated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Configuration {
    entries: Vec<(String, ParamValue)>,
}

impl Configuration {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the configuration extended with one more entry.
    ///
    /// An existing entry with the same name is replaced in place.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name.into(), value.into());
        self
    }

    pub(crate) fn insert(&mut self, name: String, value: ParamValue) {
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Looks up a value by field name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    fn require(&self, name: &str) -> Result<&ParamValue> {
        self.get(name).ok_or_else(|| Error::FieldAccess {
            name: name.to_owned(),
            reason: "no such field",
        })
    }

    /// Returns an integer field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldAccess`] if the field is missing or not an integer.
    pub fn get_int(&self, name: &str) -> Result<i64> {
        match self.require(name)? {
            ParamValue::Int(v) => Ok(*v),
            _ => Err(Error::FieldAccess {
                name: name.to_owned(),
                reason: "not an integer",
            }),
        }
    }

    /// Returns a numeric field as `f64` (integers are widened).
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldAccess`] if the field is missing or not numeric.
    pub fn get_float(&self, name: &str) -> Result<f64> {
        self.require(name)?
            .as_f64()
            .ok_or_else(|| Error::FieldAccess {
                name: name.to_owned(),
                reason: "not numeric",
            })
    }

    /// Returns a string field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldAccess`] if the field is missing or not a string.
    pub fn get_str(&self, name: &str) -> Result<&str> {
        match self.require(name)? {
            ParamValue::Str(v) => Ok(v),
            _ => Err(Error::FieldAccess {
                name: name.to_owned(),
                reason: "not a string",
            }),
        }
    }

    /// Returns a boolean field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldAccess`] if the field is missing or not a boolean.
    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.require(name)? {
            ParamValue::Bool(v) => Ok(*v),
            _ => Err(Error::FieldAccess {
                name: name.to_owned(),
                reason: "not a boolean",
            }),
        }
    }

    /// Whether the configuration has an entry for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates over `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the configuration has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str("}")
    }
}

impl Serialize for Configuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Configuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        struct ConfigurationVisitor;

        impl<'de> Visitor<'de> for ConfigurationVisitor {
            type Value = Configuration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from field name to value")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> core::result::Result<Configuration, A::Error> {
                let mut config = Configuration::new();
                while let Some((name, value)) = access.next_entry::<String, ParamValue>()? {
                    config.insert(name, value);
                }
                Ok(config)
            }
        }

        deserializer.deserialize_map(ConfigurationVisitor)
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut config = Configuration::new();
        for (k, v) in iter {
            config.insert(k.into(), v.into());
        }
        config
    }
}
