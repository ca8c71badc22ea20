use core::fmt;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{StateCounts, Study};
use crate::error::{Error, Result};
use crate::trial::TrialRecord;
use crate::types::{Direction, TrialState};

/// A serializable snapshot of a study for downstream reporting.
///
/// # Schema versioning
///
/// The `version` field enables future schema evolution without breaking
/// existing files. The current version is `1`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudyExport {
    /// Schema version.
    pub version: u32,
    /// Study name.
    pub name: String,
    /// Optimization direction.
    pub direction: Direction,
    /// Trial counts by state.
    pub counts: StateCounts,
    /// The best `COMPLETE` trial, if any.
    pub best: Option<TrialRecord>,
    /// Every trial, in id order.
    pub trials: Vec<TrialRecord>,
    /// Cross-validation replays of the best configuration, one per fold.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub xval: Vec<TrialRecord>,
}

impl StudyExport {
    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Study {
    /// Name of the sibling study that holds cross-validation replays.
    #[must_use]
    pub fn xval_name(&self) -> String {
        format!("{}-xval", self.name())
    }

    /// Snapshot of the study and of its cross-validation folds, if any.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] if the store cannot be read.
    pub fn export(&self) -> Result<StudyExport> {
        let trials = self.trials()?;
        let best = match self.best_trial() {
            Ok(best) => Some(best),
            Err(Error::NoCompletedTrials) => None,
            Err(e) => return Err(e),
        };
        let xval = match self.storage.study_meta(&self.xval_name())? {
            Some(_) => self.storage.trials(&self.xval_name())?,
            None => Vec::new(),
        };
        Ok(StudyExport {
            version: 1,
            name: self.name().to_string(),
            direction: self.direction(),
            counts: StateCounts::from_trials(&trials),
            best,
            trials,
            xval,
        })
    }

    /// Write every trial to `writer` in CSV format.
    ///
    /// Columns: `trial_id`, `state`, `value`, `last_step`, `fail_reason`, then one column
    /// per configuration field in the order the fields were drawn. Cells
    /// without a value are empty.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] if the store cannot be read or writing fails.
    pub fn to_csv(&self, mut writer: impl Write) -> Result<()> {
        let trials = self.trials()?;

        let mut columns: Vec<&str> = Vec::new();
        for trial in &trials {
            for (name, _) in trial.config.iter() {
                if !columns.contains(&name) {
                    columns.push(name);
                }
            }
        }

        write!(writer, "trial_id,state,value,last_step,fail_reason")?;
        for name in &columns {
            write!(writer, ",{}", csv_escape(name))?;
        }
        writeln!(writer)?;

        for trial in &trials {
            write!(writer, "{},{}", trial.id, trial.state)?;
            match trial.value {
                Some(v) if trial.state.has_value() => write!(writer, ",{v}")?,
                _ => write!(writer, ",")?,
            }
            match trial.last_step() {
                Some(step) => write!(writer, ",{step}")?,
                None => write!(writer, ",")?,
            }
            match &trial.fail_reason {
                Some(reason) => write!(writer, ",{}", csv_escape(reason))?,
                None => write!(writer, ",")?,
            }
            for name in &columns {
                match trial.config.get(name) {
                    Some(v) => write!(writer, ",{}", csv_escape(&v.to_string()))?,
                    None => write!(writer, ",")?,
                }
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Export trials to a CSV file at `path`.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] if the file cannot be created or written.
    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.to_csv(std::io::BufWriter::new(file))
    }

    /// A human-readable summary: direction, counts and the best trial.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] if the store cannot be read.
    pub fn summary(&self) -> Result<String> {
        use fmt::Write;

        let counts = self.state_counts()?;
        let mut s = format!(
            "Study '{}': {} | {} trials ({counts})",
            self.name(),
            self.direction(),
            counts.total()
        );
        match self.best_trial() {
            Ok(best) => {
                let value = best.value.unwrap_or(f64::NAN);
                let _ = write!(s, "\nBest value: {value} (trial #{})", best.id);
                for (name, v) in best.config.iter() {
                    let _ = write!(s, "\n  {name} = {v}");
                }
            }
            Err(Error::NoCompletedTrials) => {}
            Err(e) => return Err(e),
        }
        Ok(s)
    }
}

impl fmt::Display for TrialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.state)?;
        if let Some(v) = self.value
            && self.state != TrialState::Failed
        {
            write!(f, " value={v}")?;
        }
        if let Some(reason) = &self.fail_reason {
            write!(f, " reason={reason:?}")?;
        }
        write!(f, " {}", self.config)
    }
}

/// Escape a string for CSV output. If the value contains a comma, quote, or
/// newline, wrap it in double-quotes and double any embedded quotes.
fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::param::Configuration;
    use crate::space::{FieldGroup, SearchSpace};
    use crate::storage::MemoryStorage;

    #[test]
    fn csv_lists_fields_in_draw_order() {
        let space = SearchSpace::new(vec![
            FieldGroup::new("m")
                .categorical("method", ["pre,encoded", "post"])
                .float_range("lr", 0.001, 0.01, 0.001),
        ])
        .unwrap();
        let study = Study::create(
            Arc::new(MemoryStorage::new()),
            "s",
            Direction::Minimize,
            &space,
        )
        .unwrap();
        let id = study.create_trial().unwrap();
        let config = Configuration::new()
            .with("method", "pre,encoded")
            .with("lr", 0.002);
        study.set_configuration(id, &config).unwrap();
        study.append_intermediate(id, 3, 0.25).unwrap();
        study
            .finish_trial(id, TrialState::Complete, Some(0.25))
            .unwrap();
        study.create_trial().unwrap();
        let failed = study.create_trial().unwrap();
        study.fail_trial(failed, "loss exploded, step 4").unwrap();

        let mut buf = Vec::new();
        study.to_csv(&mut buf).unwrap();
        let csv = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "trial_id,state,value,last_step,fail_reason,method,lr");
        assert_eq!(lines[1], "0,complete,0.25,3,,\"pre,encoded\",0.002");
        assert_eq!(lines[2], "1,running,,,,,");
        assert_eq!(lines[3], "2,failed,,,\"loss exploded, step 4\",,");

        let export = study.export().unwrap();
        assert_eq!(export.counts.total(), 3);
        assert_eq!(
            export.trials[2].fail_reason.as_deref(),
            Some("loss exploded, step 4")
        );
        assert_eq!(export.best.as_ref().map(|t| t.id), Some(0));
        assert!(export.xval.is_empty());
        assert!(export.to_json().unwrap().contains("\"version\": 1"));
    }
}
