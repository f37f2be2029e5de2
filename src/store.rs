//! SQLite-backed merge store. Each collection is one table whose key fields
//! carry a unique index; writes are whole-record replaces keyed on those
//! fields.

use std::path::Path;

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::error::StorageError;
use crate::model::{MatchRecord, StandingsRow};

/// A record type stored as one row of a collection table.
pub trait Document: Sized {
    const COLLECTION: &'static str;
    const KEY_FIELDS: &'static [&'static str];
    /// Column name and SQLite type, in the order of [`Document::values`].
    const COLUMNS: &'static [(&'static str, &'static str)];

    fn values(&self) -> Vec<Value>;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub inserted: usize,
    pub replaced: usize,
}

impl BatchReport {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Replaced => self.replaced += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.replaced
    }
}

pub struct MergeStore {
    conn: Connection,
}

impl MergeStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.create_collection::<StandingsRow>()?;
        self.create_collection::<MatchRecord>()?;
        self.conn.execute_batch(
            r#"
            CREATE INDEX IF NOT EXISTS idx_league_tables_team ON league_tables(team);
            CREATE INDEX IF NOT EXISTS idx_matches_season ON matches(season, matchday);

            CREATE TABLE IF NOT EXISTS ingest_runs (
                run_id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL,
                finished_at TEXT NULL,
                seasons TEXT NOT NULL,
                matchdays_total INTEGER NOT NULL,
                matchdays_succeeded INTEGER NOT NULL,
                records_inserted INTEGER NOT NULL,
                records_replaced INTEGER NOT NULL,
                errors_json TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn create_collection<D: Document>(&self) -> Result<(), StorageError> {
        let columns = D::COLUMNS
            .iter()
            .map(|(name, ty)| format!("{name} {ty} NOT NULL"))
            .collect::<Vec<_>>()
            .join(",\n    ");
        let table = D::COLLECTION;
        let keys = D::KEY_FIELDS.join(", ");
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (\n    id INTEGER PRIMARY KEY,\n    {columns},\n    updated_at TEXT NOT NULL\n);\n\
             CREATE UNIQUE INDEX IF NOT EXISTS ux_{table}_key ON {table}({keys});"
        ))?;
        Ok(())
    }

    /// Upsert on the collection's own key fields.
    pub fn upsert<D: Document>(&mut self, doc: &D) -> Result<UpsertOutcome, StorageError> {
        self.upsert_with_keys(doc, D::KEY_FIELDS)
    }

    /// Replaces the document matching `key_fields` wholesale, or inserts it.
    /// Runs in its own transaction.
    ///
    /// `key_fields` may name the collection's unique key in any order; any
    /// other set is rejected, since the unique index only covers that key.
    pub fn upsert_with_keys<D: Document>(
        &mut self,
        doc: &D,
        key_fields: &[&str],
    ) -> Result<UpsertOutcome, StorageError> {
        let values = doc.values();
        let mut key_values = Vec::with_capacity(key_fields.len());
        for field in key_fields {
            let idx = column_index::<D>(field).ok_or_else(|| StorageError::UnknownKeyField {
                collection: D::COLLECTION,
                field: field.to_string(),
            })?;
            key_values.push(values[idx].clone());
        }
        if !same_key_set(key_fields, D::KEY_FIELDS) {
            return Err(StorageError::KeyMismatch {
                collection: D::COLLECTION,
                expected: D::KEY_FIELDS,
                given: key_fields.iter().map(|f| f.to_string()).collect(),
            });
        }

        let table = D::COLLECTION;
        let filter = key_fields
            .iter()
            .enumerate()
            .map(|(i, field)| format!("{field} IS ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(" AND ");
        let updated_at = Value::Text(Utc::now().to_rfc3339());

        let tx = self.conn.transaction()?;
        let existing: Option<i64> = tx
            .query_row(
                &format!("SELECT id FROM {table} WHERE {filter} LIMIT 1"),
                params_from_iter(key_values.iter()),
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match existing {
            Some(id) => {
                let assignments = D::COLUMNS
                    .iter()
                    .enumerate()
                    .map(|(i, (name, _))| format!("{name} = ?{}", i + 1))
                    .collect::<Vec<_>>()
                    .join(", ");
                let n = D::COLUMNS.len();
                let mut bound = values;
                bound.push(updated_at);
                bound.push(Value::Integer(id));
                tx.execute(
                    &format!(
                        "UPDATE {table} SET {assignments}, updated_at = ?{} WHERE id = ?{}",
                        n + 1,
                        n + 2
                    ),
                    params_from_iter(bound.iter()),
                )?;
                UpsertOutcome::Replaced
            }
            None => {
                let names = D::COLUMNS
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>()
                    .join(", ");
                let placeholders = (1..=D::COLUMNS.len() + 1)
                    .map(|i| format!("?{i}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut bound = values;
                bound.push(updated_at);
                tx.execute(
                    &format!("INSERT INTO {table} ({names}, updated_at) VALUES ({placeholders})"),
                    params_from_iter(bound.iter()),
                )?;
                UpsertOutcome::Inserted
            }
        };
        tx.commit()?;
        Ok(outcome)
    }

    /// Upserts one record at a time into `report`. Stops at the first
    /// failure; records already written stay written and stay counted.
    pub fn upsert_all<D: Document>(
        &mut self,
        docs: &[D],
        report: &mut BatchReport,
    ) -> Result<(), StorageError> {
        for doc in docs {
            report.record(self.upsert(doc)?);
        }
        Ok(())
    }

    pub fn count<D: Document>(&self) -> Result<usize, StorageError> {
        let n: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", D::COLLECTION),
            [],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    pub fn load_all<D: Document>(&self) -> Result<Vec<D>, StorageError> {
        self.load_where("1 = 1", [])
    }

    /// Loads documents matching a SQL `WHERE` clause, ordered by key.
    pub fn load_where<D: Document, P: rusqlite::Params>(
        &self,
        clause: &str,
        params: P,
    ) -> Result<Vec<D>, StorageError> {
        let names = D::COLUMNS
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ");
        let order = D::KEY_FIELDS.join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {names} FROM {} WHERE {clause} ORDER BY {order}",
            D::COLLECTION
        ))?;
        let rows = stmt.query_map(params, |row| D::from_row(row))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn begin_run(&self, seasons: &[u32], matchdays_total: usize) -> Result<i64, StorageError> {
        let seasons = seasons
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.conn.execute(
            "INSERT INTO ingest_runs(started_at, finished_at, seasons, matchdays_total, matchdays_succeeded, records_inserted, records_replaced, errors_json)
             VALUES (?1, NULL, ?2, ?3, 0, 0, 0, '[]')",
            params![Utc::now().to_rfc3339(), seasons, matchdays_total as i64],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn finish_run(
        &self,
        run_id: i64,
        matchdays_succeeded: usize,
        report: BatchReport,
        errors: &[String],
    ) -> Result<(), StorageError> {
        let errors_json = serde_json::to_string(errors).unwrap_or_else(|_| "[]".to_string());
        self.conn.execute(
            "UPDATE ingest_runs
             SET finished_at = ?1, matchdays_succeeded = ?2, records_inserted = ?3, records_replaced = ?4, errors_json = ?5
             WHERE run_id = ?6",
            params![
                Utc::now().to_rfc3339(),
                matchdays_succeeded as i64,
                report.inserted as i64,
                report.replaced as i64,
                errors_json,
                run_id
            ],
        )?;
        Ok(())
    }
}

fn same_key_set(given: &[&str], unique: &[&str]) -> bool {
    let mut given = given.to_vec();
    let mut unique = unique.to_vec();
    given.sort_unstable();
    given.dedup();
    unique.sort_unstable();
    given == unique
}

fn column_index<D: Document>(field: &str) -> Option<usize> {
    D::COLUMNS.iter().position(|(name, _)| *name == field)
}

fn int(v: impl Into<i64>) -> Value {
    Value::Integer(v.into())
}

fn bool_value(v: bool) -> Value {
    Value::Integer(if v { 1 } else { 0 })
}

impl Document for StandingsRow {
    const COLLECTION: &'static str = "league_tables";
    const KEY_FIELDS: &'static [&'static str] = &["season", "matchday", "team"];
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("season", "INTEGER"),
        ("matchday", "INTEGER"),
        ("rank", "INTEGER"),
        ("team", "TEXT"),
        ("played", "INTEGER"),
        ("wins", "INTEGER"),
        ("draws", "INTEGER"),
        ("losses", "INTEGER"),
        ("goals_for", "INTEGER"),
        ("goals_against", "INTEGER"),
        ("goal_diff", "INTEGER"),
        ("points", "INTEGER"),
        ("is_future", "INTEGER"),
        ("remaining_matches", "INTEGER"),
        ("estimated_extra_points", "REAL"),
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            int(self.season),
            int(self.matchday),
            int(self.rank),
            Value::Text(self.team.clone()),
            int(self.played),
            int(self.wins),
            int(self.draws),
            int(self.losses),
            int(self.goals_for),
            int(self.goals_against),
            int(self.goal_diff),
            int(self.points),
            bool_value(self.is_future),
            int(self.remaining_matches),
            Value::Real(self.estimated_extra_points),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            season: row.get("season")?,
            matchday: row.get("matchday")?,
            rank: row.get("rank")?,
            team: row.get("team")?,
            played: row.get("played")?,
            wins: row.get("wins")?,
            draws: row.get("draws")?,
            losses: row.get("losses")?,
            goals_for: row.get("goals_for")?,
            goals_against: row.get("goals_against")?,
            goal_diff: row.get("goal_diff")?,
            points: row.get("points")?,
            is_future: row.get::<_, i64>("is_future")? != 0,
            remaining_matches: row.get("remaining_matches")?,
            estimated_extra_points: row.get("estimated_extra_points")?,
        })
    }
}

impl Document for MatchRecord {
    const COLLECTION: &'static str = "matches";
    const KEY_FIELDS: &'static [&'static str] = &[
        "season",
        "matchday",
        "date",
        "time",
        "home_team",
        "away_team",
    ];
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("season", "INTEGER"),
        ("matchday", "INTEGER"),
        ("date", "TEXT"),
        ("time", "TEXT"),
        ("home_team", "TEXT"),
        ("away_team", "TEXT"),
        ("home_rank", "INTEGER"),
        ("away_rank", "INTEGER"),
        ("home_goals", "INTEGER"),
        ("away_goals", "INTEGER"),
        ("result_available", "INTEGER"),
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            int(self.season),
            int(self.matchday),
            Value::Text(self.date.clone()),
            Value::Text(self.time.clone()),
            Value::Text(self.home_team.clone()),
            Value::Text(self.away_team.clone()),
            int(self.home_rank),
            int(self.away_rank),
            int(self.home_goals),
            int(self.away_goals),
            bool_value(self.result_available),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            season: row.get("season")?,
            matchday: row.get("matchday")?,
            date: row.get("date")?,
            time: row.get("time")?,
            home_team: row.get("home_team")?,
            away_team: row.get("away_team")?,
            home_rank: row.get("home_rank")?,
            away_rank: row.get("away_rank")?,
            home_goals: row.get("home_goals")?,
            away_goals: row.get("away_goals")?,
            result_available: row.get::<_, i64>("result_available")? != 0,
        })
    }
}
