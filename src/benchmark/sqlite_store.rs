//! SQLite 压测记录存储

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::error::StoreError;
use super::model::{BenchmarkRecord, BenchmarkResults, NewBenchmarkRecord, RecordPatch};
use super::store::BenchmarkStore;

const SELECT_COLUMNS: &str = "id, url, users, spawnrate, duration, model, tokenizer, dataset, notes, favorite, status, results, created_at";

/// 基于 SQLite 的存储
///
/// `AUTOINCREMENT` 保证删除后的 id 不会被复用
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// 打开（或创建）数据库，`:memory:` 表示内存数据库
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS benchmark_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                users INTEGER NOT NULL,
                spawnrate INTEGER NOT NULL,
                duration INTEGER NOT NULL,
                model TEXT,
                tokenizer TEXT,
                dataset TEXT NOT NULL,
                notes TEXT,
                favorite INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                results TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_benchmark_model ON benchmark_records(model);
            CREATE INDEX IF NOT EXISTS idx_benchmark_created_at ON benchmark_records(created_at);",
        )?;
        tracing::info!(db_path, "SQLite 压测记录存储已打开");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn insert(&self, new: NewBenchmarkRecord) -> Result<BenchmarkRecord> {
        let conn = self.conn.lock();
        let created_at = Utc::now();
        let results_json = serde_json::to_string(&new.results)?;

        conn.execute(
            "INSERT INTO benchmark_records (url, users, spawnrate, duration, model, tokenizer, dataset, notes, favorite, status, results, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10, ?11)",
            params![
                new.url,
                new.user,
                new.spawnrate,
                new.duration,
                new.model,
                new.tokenizer,
                new.dataset,
                new.notes,
                new.status,
                results_json,
                created_at.to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid() as u64;
        Ok(new.into_record(id, created_at))
    }

    fn select(conn: &Connection, id: u64) -> Result<Option<BenchmarkRecord>> {
        let sql = format!("SELECT {} FROM benchmark_records WHERE id = ?1", SELECT_COLUMNS);
        Ok(conn
            .query_row(&sql, [id as i64], map_row)
            .optional()?)
    }

    fn find(&self, id: u64) -> Result<Option<BenchmarkRecord>> {
        let conn = self.conn.lock();
        Self::select(&conn, id)
    }

    fn all(&self) -> Result<Vec<BenchmarkRecord>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM benchmark_records ORDER BY id", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn patch(&self, id: u64, patch: &RecordPatch) -> Result<Option<BenchmarkRecord>> {
        let conn = self.conn.lock();
        let Some(mut record) = Self::select(&conn, id)? else {
            return Ok(None);
        };
        patch.apply(&mut record);
        conn.execute(
            "UPDATE benchmark_records SET notes = ?1, favorite = ?2 WHERE id = ?3",
            params![record.notes, record.favorite as i32, id as i64],
        )?;
        Ok(Some(record))
    }

    fn remove(&self, id: u64) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn.execute("DELETE FROM benchmark_records WHERE id = ?1", [id as i64])?;
        Ok(count > 0)
    }

    fn total(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let total: i64 =
            conn.query_row("SELECT COUNT(*) FROM benchmark_records", [], |row| row.get(0))?;
        Ok(total as usize)
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<BenchmarkRecord> {
    let results_json: String = row.get(11)?;
    let results: BenchmarkResults = serde_json::from_str(&results_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at_raw: String = row.get(12)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(12, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(BenchmarkRecord {
        id: row.get::<_, i64>(0)? as u64,
        url: row.get(1)?,
        user: row.get(2)?,
        spawnrate: row.get(3)?,
        duration: row.get(4)?,
        model: row.get(5)?,
        tokenizer: row.get(6)?,
        dataset: row.get(7)?,
        notes: row.get(8)?,
        favorite: row.get::<_, i32>(9)? != 0,
        status: row.get(10)?,
        results,
        created_at,
    })
}

impl BenchmarkStore for SqliteStore {
    fn create(&self, new: NewBenchmarkRecord) -> Result<BenchmarkRecord, StoreError> {
        Ok(self.insert(new)?)
    }

    fn get(&self, id: u64) -> Result<BenchmarkRecord, StoreError> {
        self.find(id)?.ok_or(StoreError::NotFound(id))
    }

    fn list(&self) -> Result<Vec<BenchmarkRecord>, StoreError> {
        Ok(self.all()?)
    }

    fn update(&self, id: u64, patch: RecordPatch) -> Result<BenchmarkRecord, StoreError> {
        self.patch(id, &patch)?.ok_or(StoreError::NotFound(id))
    }

    fn delete(&self, id: u64) -> Result<(), StoreError> {
        if self.remove(id)? {
            Ok(())
        } else {
            Err(StoreError::NotFound(id))
        }
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.total()?)
    }
}
