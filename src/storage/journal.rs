//! JSON-lines journal storage backend.
//!
//! The file is an append-only log of [`Op`]s, one JSON object per line.
//! Every call takes an `fs2` file lock (exclusive for writes, shared for
//! reads), replays whatever other processes appended since this handle last
//! looked, and only then validates and appends its own op. Trial ids are
//! therefore allocated consistently across processes sharing one file.
//!
//! A final line without a newline is the trace of a writer that crashed
//! mid-append. Readers ignore it; the next writer truncates it away.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;

use super::{Model, Op, Storage, StudyMeta};
use crate::error::{Error, Result};
use crate::param::Configuration;
use crate::trial::TrialRecord;
use crate::types::TrialState;

/// A study store persisted as a JSONL op log.
///
/// # Examples
///
/// ```no_run
/// use seqtune::storage::{JournalStorage, Storage};
///
/// let storage = JournalStorage::open("runs/studies.jsonl").unwrap();
/// println!("{:?}", storage.study_names().unwrap());
/// ```
#[derive(Debug)]
pub struct JournalStorage {
    path: PathBuf,
    state: Mutex<Replayed>,
}

/// The model rebuilt from the first `offset` bytes of the journal.
#[derive(Debug, Default)]
struct Replayed {
    model: Model,
    offset: u64,
}

/// Releases the file lock when dropped, on error paths too.
struct FileLock<'a>(&'a File);

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(self.0);
    }
}

impl JournalStorage {
    /// Opens (or creates) the journal at `path` and replays it.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] when the file cannot be opened or holds a
    /// corrupt entry.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let storage = Self {
            path: path.as_ref().to_path_buf(),
            state: Mutex::new(Replayed::default()),
        };
        storage.read(|_| Ok(()))?;
        Ok(storage)
    }

    /// The journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_file(&self) -> Result<File> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| Error::Persistence(format!("{}: {e}", self.path.display())))?;
        Ok(file)
    }

    fn read<T>(&self, f: impl FnOnce(&Model) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock();
        let file = self.open_file()?;
        FileExt::lock_shared(&file)?;
        let _lock = FileLock(&file);
        catch_up(&mut state, &file, false)?;
        f(&state.model)
    }

    /// Replays under an exclusive lock, then validates, appends and applies
    /// the op built by `make`.
    fn write<T>(&self, make: impl FnOnce(&Model) -> Result<(Op, T)>) -> Result<T> {
        let mut state = self.state.lock();
        let file = self.open_file()?;
        FileExt::lock_exclusive(&file)?;
        let _lock = FileLock(&file);
        catch_up(&mut state, &file, true)?;

        let (op, out) = make(&state.model)?;
        state.model.validate(&op)?;
        let mut line = serde_json::to_vec(&op)?;
        line.push(b'\n');
        (&file).write_all(&line)?;
        file.sync_data()?;
        state.offset += line.len() as u64;
        state.model.apply(op)?;
        Ok(out)
    }
}

/// Applies the ops appended since `state.offset`.
fn catch_up(state: &mut Replayed, file: &File, repair: bool) -> Result<()> {
    let len = file.metadata()?.len();
    if len < state.offset {
        return Err(Error::Persistence(format!(
            "journal shrank from {} to {len} bytes",
            state.offset
        )));
    }
    if len == state.offset {
        return Ok(());
    }

    let mut reader = file;
    reader.seek(SeekFrom::Start(state.offset))?;
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;

    let mut rest = buf.as_slice();
    while !rest.is_empty() {
        let Some(end) = rest.iter().position(|&b| b == b'\n') else {
            if repair {
                trace_warn!(
                    offset = state.offset,
                    bytes = rest.len(),
                    "truncating torn journal entry"
                );
                file.set_len(state.offset)?;
            }
            break;
        };
        let line = &rest[..end];
        if !line.iter().all(u8::is_ascii_whitespace) {
            let op: Op = serde_json::from_slice(line).map_err(|e| {
                Error::Persistence(format!(
                    "corrupt journal entry at byte {}: {e}",
                    state.offset
                ))
            })?;
            state.model.apply(op).map_err(|e| {
                Error::Persistence(format!(
                    "journal entry at byte {} cannot be replayed: {e}",
                    state.offset
                ))
            })?;
        }
        state.offset += end as u64 + 1;
        rest = &rest[end + 1..];
    }
    Ok(())
}

impl Storage for JournalStorage {
    fn create_study(&self, meta: &StudyMeta) -> Result<()> {
        self.write(|_| Ok((Op::CreateStudy { meta: meta.clone() }, ())))
    }

    fn study_meta(&self, study: &str) -> Result<Option<StudyMeta>> {
        self.read(|model| Ok(model.meta(study).cloned()))
    }

    fn study_names(&self) -> Result<Vec<String>> {
        self.read(|model| Ok(model.study_names()))
    }

    fn create_trial(&self, study: &str) -> Result<u64> {
        self.write(|model| {
            let trial_id = model.next_trial_id(study)?;
            let op = Op::CreateTrial {
                study: study.to_string(),
                trial_id,
            };
            Ok((op, trial_id))
        })
    }

    fn set_configuration(
        &self,
        study: &str,
        trial_id: u64,
        config: &Configuration,
    ) -> Result<()> {
        self.write(|_| {
            let op = Op::SetConfiguration {
                study: study.to_string(),
                trial_id,
                config: config.clone(),
            };
            Ok((op, ()))
        })
    }

    fn append_intermediate(
        &self,
        study: &str,
        trial_id: u64,
        step: u64,
        value: f64,
    ) -> Result<()> {
        self.write(|_| {
            let op = Op::Report {
                study: study.to_string(),
                trial_id,
                step,
                value,
            };
            Ok((op, ()))
        })
    }

    fn finish_trial(
        &self,
        study: &str,
        trial_id: u64,
        state: TrialState,
        value: Option<f64>,
    ) -> Result<()> {
        self.write(|_| {
            let op = Op::Finish {
                study: study.to_string(),
                trial_id,
                state,
                value,
                reason: None,
            };
            Ok((op, ()))
        })
    }

    fn fail_trial(&self, study: &str, trial_id: u64, reason: &str) -> Result<()> {
        self.write(|_| {
            let op = Op::Finish {
                study: study.to_string(),
                trial_id,
                state: TrialState::Failed,
                value: None,
                reason: Some(reason.to_string()),
            };
            Ok((op, ()))
        })
    }

    fn trials(&self, study: &str) -> Result<Vec<TrialRecord>> {
        self.read(|model| model.trials(study))
    }

    fn trial(&self, study: &str, trial_id: u64) -> Result<TrialRecord> {
        self.read(|model| model.trial(study, trial_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    fn meta() -> StudyMeta {
        StudyMeta::new("s", Direction::Maximize, "[]")
    }

    #[test]
    fn two_handles_share_one_id_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j.jsonl");
        let a = JournalStorage::open(&path).unwrap();
        let b = JournalStorage::open(&path).unwrap();
        a.create_study(&meta()).unwrap();
        assert_eq!(a.create_trial("s").unwrap(), 0);
        assert_eq!(b.create_trial("s").unwrap(), 1);
        assert_eq!(a.create_trial("s").unwrap(), 2);
        b.append_intermediate("s", 0, 1, 0.5).unwrap();
        assert_eq!(a.trial("s", 0).unwrap().trajectory, [(1, 0.5)]);
    }

    #[test]
    fn reports_reopen_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j.jsonl");
        let mut rng = fastrand::Rng::with_seed(7);
        let values: Vec<f64> = (0..500).map(|_| rng.f64() + 1e-3).collect();
        {
            let store = JournalStorage::open(&path).unwrap();
            store.create_study(&meta()).unwrap();
            store.create_trial("s").unwrap();
            for (step, v) in values.iter().enumerate() {
                store.append_intermediate("s", 0, step as u64, *v).unwrap();
            }
        }
        let reopened = JournalStorage::open(&path).unwrap();
        let trajectory = reopened.trial("s", 0).unwrap().trajectory;
        assert_eq!(trajectory.len(), values.len());
        for ((_, got), want) in trajectory.iter().zip(&values) {
            assert_eq!(got.to_bits(), want.to_bits());
        }
    }

    #[test]
    fn torn_tail_is_ignored_then_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j.jsonl");
        {
            let store = JournalStorage::open(&path).unwrap();
            store.create_study(&meta()).unwrap();
            store.create_trial("s").unwrap();
        }
        let intact = std::fs::metadata(&path).unwrap().len();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"op":"create_trial","stu"#).unwrap();
        drop(file);

        let store = JournalStorage::open(&path).unwrap();
        assert_eq!(store.trials("s").unwrap().len(), 1);
        assert_eq!(store.create_trial("s").unwrap(), 1);
        let reopened = JournalStorage::open(&path).unwrap();
        assert_eq!(reopened.trials("s").unwrap().len(), 2);
        assert!(std::fs::metadata(&path).unwrap().len() > intact);
    }

    #[test]
    fn corrupt_line_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j.jsonl");
        std::fs::write(&path, "not json\n").unwrap();
        assert!(matches!(
            JournalStorage::open(&path),
            Err(Error::Persistence(_))
        ));
    }
}
