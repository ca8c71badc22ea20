//! Core types for the tuner.

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// The direction of optimization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Minimize the objective value.
    Minimize,
    /// Maximize the objective value.
    Maximize,
}

impl Direction {
    /// Order two objective values so that the better one compares `Less`.
    ///
    /// Incomparable values (NaN) compare `Equal`; callers break such ties by trial id.
    #[must_use]
    pub fn compare(self, a: f64, b: f64) -> Ordering {
        let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        match self {
            Direction::Minimize => ord,
            Direction::Maximize => ord.reverse(),
        }
    }

    /// Lowercase name used in exports and the sqlite schema.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Minimize => "minimize",
            Direction::Maximize => "maximize",
        }
    }

    /// Whether `candidate` is strictly better than `incumbent`.
    #[must_use]
    pub fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        self.compare(candidate, incumbent) == Ordering::Less
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Direction {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "minimize" | "min" => Ok(Direction::Minimize),
            "maximize" | "max" => Ok(Direction::Maximize),
            other => Err(crate::Error::Config(format!(
                "direction must be 'minimize' or 'maximize', got '{other}'"
            ))),
        }
    }
}

/// The state of a trial in its lifecycle.
///
/// `Running` is the only non-terminal state; every other state is final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialState {
    /// The trial is currently running.
    Running,
    /// The trial completed successfully.
    Complete,
    /// The trial was stopped early by the pruner.
    Pruned,
    /// The trial failed with an error.
    Failed,
}

impl TrialState {
    /// Whether the state is terminal.
    #[must_use]
    pub fn is_finished(self) -> bool {
        !matches!(self, TrialState::Running)
    }

    /// Whether trials in this state carry a final value.
    #[must_use]
    pub fn has_value(self) -> bool {
        matches!(self, TrialState::Complete | TrialState::Pruned)
    }

    /// Lowercase name used in exports and the sqlite schema.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TrialState::Running => "running",
            TrialState::Complete => "complete",
            TrialState::Pruned => "pruned",
            TrialState::Failed => "failed",
        }
    }
}

impl core::fmt::Display for TrialState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TrialState {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "running" => Ok(TrialState::Running),
            "complete" => Ok(TrialState::Complete),
            "pruned" => Ok(TrialState::Pruned),
            "failed" => Ok(TrialState::Failed),
            other => Err(crate::Error::Persistence(format!(
                "unknown trial state '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_respects_direction() {
        assert_eq!(Direction::Minimize.compare(1.0, 2.0), Ordering::Less);
        assert_eq!(Direction::Maximize.compare(1.0, 2.0), Ordering::Greater);
        assert!(Direction::Maximize.is_better(3.0, 2.0));
        assert!(!Direction::Minimize.is_better(2.0, 2.0));
    }

    #[test]
    fn terminal_states() {
        assert!(!TrialState::Running.is_finished());
        assert!(TrialState::Failed.is_finished());
        assert!(TrialState::Pruned.has_value());
        assert!(!TrialState::Failed.has_value());
    }

    #[test]
    fn state_names_round_trip_through_from_str() {
        for state in [
            TrialState::Running,
            TrialState::Complete,
            TrialState::Pruned,
            TrialState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<TrialState>().unwrap(), state);
        }
        assert!("done".parse::<TrialState>().is_err());
    }
}
