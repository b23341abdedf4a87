//! SQLite run journal
//!
//! This module provides a SQLite-based implementation of the RunJournal trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RunJournal, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus, UrlOutcome, UrlRecord};
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::path::Path;

/// SQLite journal backend
pub struct SqliteJournal {
    conn: Connection,
}

impl SqliteJournal {
    /// Opens (or creates) the journal database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory journal
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        partition: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Running),
        items: row.get::<_, i64>(6)? as usize,
    })
}

const RUN_COLUMNS: &str =
    "id, started_at, finished_at, partition_key, config_hash, status, items";

impl RunJournal for SqliteJournal {
    // ===== Run Management =====

    fn start_run(&mut self, partition: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, partition_key, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, partition, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus, items: usize) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, items = ?3 WHERE id = ?4",
            params![status.to_db_string(), now, items as i64, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .map_err(|_| StorageError::RunNotFound(run_id))
    }

    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM runs ORDER BY id DESC LIMIT ?1",
            RUN_COLUMNS
        ))?;
        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    // ===== Base URL outcomes =====

    fn record_url(&mut self, run_id: i64, record: &UrlRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO url_outcomes
                (run_id, base_url, target_url, outcome, pages, new_items, duplicates,
                 captchas, filtered, error_message, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                run_id,
                record.base_url,
                record.target_url,
                record.outcome.to_db_string(),
                record.pages,
                record.new_items as i64,
                record.duplicates as i64,
                record.captchas as i64,
                record.filtered as i64,
                record.error,
                now,
            ],
        )?;
        Ok(())
    }

    fn url_records(&self, run_id: i64) -> StorageResult<Vec<UrlRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT base_url, target_url, outcome, pages, new_items, duplicates, captchas,
                    filtered, error_message
             FROM url_outcomes WHERE run_id = ?1 ORDER BY id",
        )?;

        let records = stmt
            .query_map(params![run_id], |row| {
                Ok(UrlRecord {
                    base_url: row.get(0)?,
                    target_url: row.get(1)?,
                    outcome: UrlOutcome::from_db_string(&row.get::<_, String>(2)?)
                        .unwrap_or(UrlOutcome::Failed),
                    pages: row.get(3)?,
                    new_items: row.get::<_, i64>(4)? as usize,
                    duplicates: row.get::<_, i64>(5)? as usize,
                    captchas: row.get::<_, i64>(6)? as usize,
                    filtered: row.get::<_, i64>(7)? as usize,
                    error: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}
