//! `SQLite`-backed storage backend for multi-process studies.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};

use super::model::check_trial_op;
use super::{Op, Storage, StudyMeta};
use crate::error::{Error, Result};
use crate::param::Configuration;
use crate::trial::TrialRecord;
use crate::types::{Direction, TrialState};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS studies (
    name      TEXT PRIMARY KEY,
    direction TEXT NOT NULL,
    signature TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS trials (
    study    TEXT    NOT NULL REFERENCES studies(name),
    trial_id INTEGER NOT NULL,
    state    TEXT    NOT NULL,
    config   TEXT,
    value    REAL,
    fail_reason TEXT,
    PRIMARY KEY (study, trial_id)
);
CREATE TABLE IF NOT EXISTS trial_values (
    study    TEXT    NOT NULL,
    trial_id INTEGER NOT NULL,
    step     INTEGER NOT NULL,
    value    REAL    NOT NULL,
    PRIMARY KEY (study, trial_id, step)
);
";

/// A study store in a `SQLite` database.
///
/// Uses WAL mode for concurrent readers and a single writer. Every mutation
/// runs in a `BEGIN IMMEDIATE` transaction that re-reads the affected trial,
/// so concurrent processes allocate ids and finish trials without races.
///
/// # Examples
///
/// ```no_run
/// use seqtune::storage::{SqliteStorage, Storage};
///
/// let storage = SqliteStorage::open("runs/studies.db").unwrap();
/// println!("{:?}", storage.study_names().unwrap());
/// ```
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path`.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] if the database cannot be opened or the schema
    /// cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// A private in-memory database.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // WAL mode: concurrent readers, single writer.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch(SCHEMA)?;
        add_fail_reason_column(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs `f` inside an immediate transaction and commits on success.
    fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

/// Databases created before failure reasons were stored lack the column.
fn add_fail_reason_column(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('trials')")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    if !columns.iter().any(|c| c == "fail_reason") {
        conn.execute_batch("ALTER TABLE trials ADD COLUMN fail_reason TEXT")?;
    }
    Ok(())
}

fn to_sql_int(v: u64) -> Result<i64> {
    i64::try_from(v).map_err(|_| Error::Persistence(format!("{v} does not fit in an SQLite integer")))
}

fn from_sql_int(v: i64) -> Result<u64> {
    u64::try_from(v).map_err(|_| Error::Persistence(format!("negative id or step {v} in database")))
}

/// Validates a trial-level op against the stored trial.
fn check(tx: &Connection, study: &str, trial_id: u64, op: &Op) -> Result<()> {
    if load_meta(tx, study)?.is_none() {
        return Err(Error::UnknownStudy(study.to_string()));
    }
    check_trial_op(&load_trial(tx, study, trial_id)?, op)
}

fn load_meta(conn: &Connection, study: &str) -> Result<Option<StudyMeta>> {
    let row = conn
        .query_row(
            "SELECT direction, signature FROM studies WHERE name = ?1",
            params![study],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;
    row.map(|(direction, signature)| {
        let direction: Direction = direction.parse()?;
        Ok(StudyMeta::new(study, direction, signature))
    })
    .transpose()
}

fn trial_from_row(
    id: i64,
    state: &str,
    config: Option<String>,
    value: Option<f64>,
    fail_reason: Option<String>,
) -> Result<TrialRecord> {
    let mut trial = TrialRecord::running(from_sql_int(id)?);
    trial.state = state
        .parse()
        .map_err(|_| Error::Persistence(format!("unknown trial state '{state}'")))?;
    if let Some(config) = config {
        trial.config = serde_json::from_str(&config)?;
    }
    trial.value = value;
    trial.fail_reason = fail_reason;
    Ok(trial)
}

fn load_trial(conn: &Connection, study: &str, trial_id: u64) -> Result<TrialRecord> {
    let row = conn
        .query_row(
            "SELECT state, config, value, fail_reason FROM trials WHERE study = ?1 AND trial_id = ?2",
            params![study, to_sql_int(trial_id)?],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )
        .optional()?;
    let Some((state, config, value, reason)) = row else {
        return Err(Error::UnknownTrial { trial_id });
    };
    let mut trial = trial_from_row(to_sql_int(trial_id)?, &state, config, value, reason)?;

    let mut stmt = conn.prepare(
        "SELECT step, value FROM trial_values WHERE study = ?1 AND trial_id = ?2 ORDER BY step",
    )?;
    let points = stmt.query_map(params![study, to_sql_int(trial_id)?], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
    })?;
    for point in points {
        let (step, value) = point?;
        trial.trajectory.push((from_sql_int(step)?, value));
    }
    Ok(trial)
}

fn load_trials(conn: &Connection, study: &str) -> Result<Vec<TrialRecord>> {
    let mut stmt = conn.prepare(
        "SELECT trial_id, state, config, value, fail_reason FROM trials WHERE study = ?1 ORDER BY trial_id",
    )?;
    let rows = stmt.query_map(params![study], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<f64>>(3)?,
            row.get::<_, Option<String>>(4)?,
        ))
    })?;
    let mut trials = Vec::new();
    for row in rows {
        let (id, state, config, value, reason) = row?;
        trials.push(trial_from_row(id, &state, config, value, reason)?);
    }

    let mut stmt = conn.prepare(
        "SELECT trial_id, step, value FROM trial_values WHERE study = ?1 ORDER BY trial_id, step",
    )?;
    let points = stmt.query_map(params![study], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, f64>(2)?,
        ))
    })?;
    for point in points {
        let (id, step, value) = point?;
        let id = usize::try_from(from_sql_int(id)?).unwrap_or(usize::MAX);
        let trial = trials
            .get_mut(id)
            .ok_or_else(|| Error::Persistence(format!("orphan intermediate value for trial {id}")))?;
        trial.trajectory.push((from_sql_int(step)?, value));
    }
    Ok(trials)
}

impl Storage for SqliteStorage {
    fn create_study(&self, meta: &StudyMeta) -> Result<()> {
        self.write(|tx| {
            if load_meta(tx, &meta.name)?.is_some() {
                return Err(Error::StudyExists(meta.name.clone()));
            }
            tx.execute(
                "INSERT INTO studies (name, direction, signature) VALUES (?1, ?2, ?3)",
                params![meta.name, meta.direction.as_str(), meta.signature],
            )?;
            Ok(())
        })
    }

    fn study_meta(&self, study: &str) -> Result<Option<StudyMeta>> {
        load_meta(&self.conn.lock(), study)
    }

    fn study_names(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT name FROM studies ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn create_trial(&self, study: &str) -> Result<u64> {
        self.write(|tx| {
            if load_meta(tx, study)?.is_none() {
                return Err(Error::UnknownStudy(study.to_string()));
            }
            let count: i64 = tx.query_row(
                "SELECT COUNT(*) FROM trials WHERE study = ?1",
                params![study],
                |row| row.get(0),
            )?;
            let trial_id = from_sql_int(count)?;
            tx.execute(
                "INSERT INTO trials (study, trial_id, state) VALUES (?1, ?2, ?3)",
                params![study, count, TrialState::Running.as_str()],
            )?;
            Ok(trial_id)
        })
    }

    fn set_configuration(
        &self,
        study: &str,
        trial_id: u64,
        config: &Configuration,
    ) -> Result<()> {
        let op = Op::SetConfiguration {
            study: study.to_string(),
            trial_id,
            config: config.clone(),
        };
        self.write(|tx| {
            check(tx, study, trial_id, &op)?;
            tx.execute(
                "UPDATE trials SET config = ?3 WHERE study = ?1 AND trial_id = ?2",
                params![study, to_sql_int(trial_id)?, serde_json::to_string(config)?],
            )?;
            Ok(())
        })
    }

    fn append_intermediate(
        &self,
        study: &str,
        trial_id: u64,
        step: u64,
        value: f64,
    ) -> Result<()> {
        let op = Op::Report {
            study: study.to_string(),
            trial_id,
            step,
            value,
        };
        self.write(|tx| {
            check(tx, study, trial_id, &op)?;
            tx.execute(
                "INSERT INTO trial_values (study, trial_id, step, value) VALUES (?1, ?2, ?3, ?4)",
                params![study, to_sql_int(trial_id)?, to_sql_int(step)?, value],
            )?;
            Ok(())
        })
    }

    fn finish_trial(
        &self,
        study: &str,
        trial_id: u64,
        state: TrialState,
        value: Option<f64>,
    ) -> Result<()> {
        let op = Op::Finish {
            study: study.to_string(),
            trial_id,
            state,
            value,
            reason: None,
        };
        self.write(|tx| {
            check(tx, study, trial_id, &op)?;
            tx.execute(
                "UPDATE trials SET state = ?3, value = ?4 WHERE study = ?1 AND trial_id = ?2",
                params![study, to_sql_int(trial_id)?, state.as_str(), value],
            )?;
            Ok(())
        })
    }

    fn fail_trial(&self, study: &str, trial_id: u64, reason: &str) -> Result<()> {
        let op = Op::Finish {
            study: study.to_string(),
            trial_id,
            state: TrialState::Failed,
            value: None,
            reason: Some(reason.to_string()),
        };
        self.write(|tx| {
            check(tx, study, trial_id, &op)?;
            tx.execute(
                "UPDATE trials SET state = ?3, fail_reason = ?4 WHERE study = ?1 AND trial_id = ?2",
                params![study, to_sql_int(trial_id)?, TrialState::Failed.as_str(), reason],
            )?;
            Ok(())
        })
    }

    fn trials(&self, study: &str) -> Result<Vec<TrialRecord>> {
        let mut conn = self.conn.lock();
        // A deferred read transaction gives one snapshot across both queries.
        let tx = conn.transaction()?;
        if load_meta(&tx, study)?.is_none() {
            return Err(Error::UnknownStudy(study.to_string()));
        }
        let trials = load_trials(&tx, study)?;
        tx.commit()?;
        Ok(trials)
    }

    fn trial(&self, study: &str, trial_id: u64) -> Result<TrialRecord> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        if load_meta(&tx, study)?.is_none() {
            return Err(Error::UnknownStudy(study.to_string()));
        }
        let trial = load_trial(&tx, study, trial_id)?;
        tx.commit()?;
        Ok(trial)
    }
}
