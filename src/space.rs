//! Declarative search spaces built from named field groups.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::distribution::FieldRule;
use crate::error::{Error, Result};
use crate::param::{Configuration, ParamValue};
use crate::sampler::{Partial, Sampler};
use crate::trial::History;

/// A named group of fields, e.g. the `model` or `optimizer` part of a
/// configuration.
///
/// Groups only exist at declaration time. Their fields share one flat
/// namespace inside a [`Configuration`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldGroup {
    name: String,
    fields: Vec<FieldRule>,
}

impl FieldGroup {
    /// Starts an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a categorical field.
    #[must_use]
    pub fn categorical<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        self.fields.push(FieldRule::categorical(name, values));
        self
    }

    /// Adds an integer range field.
    #[must_use]
    pub fn int_range(mut self, name: impl Into<String>, low: i64, high: i64, step: i64) -> Self {
        self.fields.push(FieldRule::int_range(name, low, high, step));
        self
    }

    /// Adds a float range field.
    #[must_use]
    pub fn float_range(mut self, name: impl Into<String>, low: f64, high: f64, step: f64) -> Self {
        self.fields.push(FieldRule::float_range(name, low, high, step));
        self
    }

    /// Adds an already-built rule.
    #[must_use]
    pub fn field(mut self, rule: FieldRule) -> Self {
        self.fields.push(rule);
        self
    }

    /// The group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The group's fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }
}

/// A validated, immutable set of field rules.
///
/// Construction checks every domain and rejects name collisions across
/// groups, so a `SearchSpace` value is always usable.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchSpace {
    groups: Vec<FieldGroup>,
}

impl SearchSpace {
    /// Builds a search space from its groups.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateField`] when two fields share a name,
    /// [`Error::EmptySearchSpace`] when no field is declared, or the
    /// validation error of the first malformed domain.
    pub fn new(groups: Vec<FieldGroup>) -> Result<Self> {
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for group in &groups {
            for rule in &group.fields {
                rule.validate()?;
                if let Some(first) = owners.insert(&rule.name, &group.name) {
                    return Err(Error::DuplicateField {
                        name: rule.name.clone(),
                        first: first.to_owned(),
                        second: group.name.clone(),
                    });
                }
            }
        }
        if owners.is_empty() {
            return Err(Error::EmptySearchSpace);
        }
        Ok(Self { groups })
    }

    /// The declared groups.
    #[must_use]
    pub fn groups(&self) -> &[FieldGroup] {
        &self.groups
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldRule> {
        self.groups.iter().flat_map(|g| g.fields.iter())
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.fields.len()).sum()
    }

    /// Always `false`; kept for API symmetry with [`len`](Self::len).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields().find(|f| f.name == name)
    }

    /// Returns a copy extended with one more group.
    ///
    /// # Errors
    ///
    /// Same as [`SearchSpace::new`].
    pub fn with_group(&self, group: FieldGroup) -> Result<Self> {
        let mut groups = self.groups.clone();
        groups.push(group);
        Self::new(groups)
    }

    /// Draws one configuration by asking `sampler` for each field in order.
    ///
    /// Every proposed value is checked against its field's domain before it
    /// is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DomainExhausted`] if the sampler proposes a value
    /// outside a domain, or the sampler's own error.
    pub fn materialize(
        &self,
        sampler: &dyn Sampler,
        trial_id: u64,
        history: &History<'_>,
    ) -> Result<Configuration> {
        let mut partial = Partial::new();
        for rule in self.fields() {
            let value = sampler.suggest(rule, trial_id, &partial, history)?;
            if !rule.domain.contains(&value) {
                return Err(Error::DomainExhausted {
                    field: rule.name.clone(),
                });
            }
            partial.push(rule, value);
        }
        Ok(partial.into_config())
    }

    /// Whether `config` has exactly the declared fields, in order, with
    /// in-domain values.
    #[must_use]
    pub fn admits(&self, config: &Configuration) -> bool {
        config.len() == self.len()
            && self
                .fields()
                .zip(config.iter())
                .all(|(rule, (name, value))| rule.name == name && rule.domain.contains(value))
    }

    /// The sub-configuration belonging to `group`, or `None` for an unknown group.
    #[must_use]
    pub fn group_values(&self, config: &Configuration, group: &str) -> Option<Configuration> {
        let group = self.groups.iter().find(|g| g.name == group)?;
        Some(
            group
                .fields
                .iter()
                .filter_map(|rule| {
                    config
                        .get(&rule.name)
                        .map(|v| (rule.name.clone(), v.clone()))
                })
                .collect(),
        )
    }

    /// A stable fingerprint of the field rules, stored with a study so a
    /// resumed run can detect that the space changed underneath it.
    ///
    /// Group names are not part of the fingerprint; only field names and
    /// domains matter to stored configurations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the rules cannot be serialized.
    pub fn signature(&self) -> Result<String> {
        let fields: Vec<&FieldRule> = self.fields().collect();
        Ok(serde_json::to_string(&fields)?)
    }
}
