use crate::types::TrialState;

/// Errors produced while declaring a search space, running a study, or
/// talking to a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when two field groups of a search space declare the same name.
    #[error("duplicate field '{name}' in search space (declared by groups '{first}' and '{second}')")]
    DuplicateField {
        /// The colliding field name.
        name: String,
        /// The group that declared the field first.
        first: String,
        /// The group that declared it again.
        second: String,
    },

    /// Returned when a search space declares no fields at all.
    #[error("search space must declare at least one field")]
    EmptySearchSpace,

    /// Returned when a field is declared with an empty categorical domain or
    /// a range that contains no values.
    #[error("field '{0}' has an empty domain")]
    EmptyDomain(String),

    /// Returned when a range is declared with `low > high`.
    #[error("invalid bounds for '{name}': low ({low}) must be less than or equal to high ({high})")]
    InvalidBounds {
        /// The field name.
        name: String,
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when a range step is not positive.
    #[error("invalid step for '{0}': step must be positive")]
    InvalidStep(String),

    /// Returned when a sampler cannot produce a value inside a field's domain.
    #[error("sampler could not produce a value for field '{field}'")]
    DomainExhausted {
        /// The field that could not be sampled.
        field: String,
    },

    /// Returned when gamma is not in the valid range (0.0, 1.0).
    #[error("invalid gamma: {0} must be in (0.0, 1.0)")]
    InvalidGamma(f64),

    /// Returned when a configuration lookup names an unknown field or asks
    /// for the wrong value type.
    #[error("configuration field '{name}': {reason}")]
    FieldAccess {
        /// The requested field name.
        name: String,
        /// What went wrong.
        reason: &'static str,
    },

    /// Returned when the storage backend is unavailable or its contents are corrupt.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Recorded as the failure reason of a trial whose objective returned an error.
    #[error("objective failed: {0}")]
    ObjectiveFailure(String),

    /// Returned when a study name is not present in the store.
    #[error("study '{0}' does not exist")]
    UnknownStudy(String),

    /// Returned when creating a study whose name is already taken.
    #[error("study '{0}' already exists")]
    StudyExists(String),

    /// Returned when a study is reopened with a different direction or search space.
    #[error("study '{study}' was created with a different {what}")]
    StudyMismatch {
        /// The study name.
        study: String,
        /// Which part of the study metadata differs.
        what: &'static str,
    },

    /// Returned when a trial id is not present in a study.
    #[error("trial {trial_id} does not exist")]
    UnknownTrial {
        /// The requested trial id.
        trial_id: u64,
    },

    /// Returned when mutating a trial that already reached a terminal state.
    #[error("trial {trial_id} is already finished ({state:?})")]
    TrialFinished {
        /// The trial id.
        trial_id: u64,
        /// The terminal state of the trial.
        state: TrialState,
    },

    /// Returned when a configuration is assigned twice to the same trial.
    #[error("trial {trial_id} already has a configuration")]
    ConfigurationAlreadySet {
        /// The trial id.
        trial_id: u64,
    },

    /// Returned when an intermediate report does not advance the step counter.
    #[error("trial {trial_id}: step {step} must be greater than the last reported step {last}")]
    NonIncreasingStep {
        /// The trial id.
        trial_id: u64,
        /// The rejected step.
        step: u64,
        /// The last accepted step.
        last: u64,
    },

    /// Returned when a reported value is NaN or infinite.
    #[error("trial {trial_id}: reported value must be finite")]
    NonFiniteValue {
        /// The trial id.
        trial_id: u64,
    },

    /// Returned when reporting to a trial whose cancellation token is set.
    #[error("trial {trial_id} was cancelled; no further reports are accepted")]
    TrialCancelled {
        /// The trial id.
        trial_id: u64,
    },

    /// Returned when finishing a trial with a value that does not match its state.
    #[error("trial {trial_id}: state {state:?} does not accept value {value:?}")]
    InvalidTerminalValue {
        /// The trial id.
        trial_id: u64,
        /// The requested state.
        state: TrialState,
        /// The supplied value.
        value: Option<f64>,
    },

    /// Returned when requesting the best trial but no trials have completed.
    #[error("no completed trials available")]
    NoCompletedTrials,

    /// Returned when a configuration file or value cannot be interpreted.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Returned when an async task fails.
    #[cfg(feature = "async")]
    #[error("async task error: {0}")]
    TaskError(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

pub type Result<T> = core::result::Result<T, Error>;
