use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vinted_common::{Error, Result};

/// Key holding the migration watermark.
pub const VERSION_KEY: &str = "version";

/// Persistent key/value settings read by the notification application.
pub struct ParameterStore {
    conn: Mutex<Connection>,
}

/// A single row of the `parameters` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub key: String,
    pub value: String,
}

/// Handle passed to [`ParameterStore::transaction`] closures. Every write
/// goes through the enclosing SQLite transaction.
pub struct ParameterTx<'a> {
    conn: &'a Connection,
}

impl ParameterStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening parameter store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("parameter store lock poisoned".into()))
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS parameters (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .map_err(|e| Error::Database(format!("failed to create parameters table: {e}")))?;

        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.connection()?;
        get_value(&conn, key)
    }

    /// Overwrite `key` with `value`, inserting it if missing.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.connection()?;
        set_value(&conn, key, value)
    }

    /// Insert `key` with `default` unless it already exists. Returns whether
    /// a row was written.
    pub fn upsert_if_absent(&self, key: &str, default: &str) -> Result<bool> {
        let conn = self.connection()?;
        insert_if_absent(&conn, key, default)
    }

    pub fn version(&self) -> Result<Option<String>> {
        self.get(VERSION_KEY)
    }

    pub fn list(&self) -> Result<Vec<Parameter>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare("SELECT key, value FROM parameters ORDER BY key ASC")
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(Parameter {
                    key: row.get(0)?,
                    value: row.get(1)?,
                })
            })
            .map_err(|e| Error::Database(format!("failed to query parameters: {e}")))?;

        let mut parameters = Vec::new();
        for row in rows {
            parameters.push(
                row.map_err(|e| Error::Database(format!("failed to read parameter row: {e}")))?,
            );
        }
        Ok(parameters)
    }

    /// Read a flag stored in the `True`/`False` spelling.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.get(key)?
            .map(|value| parse_flag(key, &value))
            .transpose()
    }

    pub fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        self.get(key)?
            .map(|value| {
                value.trim().parse::<i64>().map_err(|_| {
                    Error::Config(format!("parameter {key} is not an integer: {value:?}"))
                })
            })
            .transpose()
    }

    /// Run `f` inside a single SQLite transaction. Commits when `f` returns
    /// `Ok`; any error rolls back every write made through the handle.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&ParameterTx<'_>) -> Result<T>,
    {
        let mut conn = self.connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))?;

        let outcome = f(&ParameterTx { conn: &tx });

        match outcome {
            Ok(value) => {
                tx.commit()
                    .map_err(|e| Error::Database(format!("failed to commit transaction: {e}")))?;
                Ok(value)
            }
            Err(e) => {
                debug!("rolling back parameter transaction: {e}");
                tx.rollback()
                    .map_err(|e| Error::Database(format!("failed to roll back transaction: {e}")))?;
                Err(e)
            }
        }
    }
}

impl ParameterTx<'_> {
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        get_value(self.conn, key)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        set_value(self.conn, key, value)
    }

    pub fn upsert_if_absent(&self, key: &str, default: &str) -> Result<bool> {
        insert_if_absent(self.conn, key, default)
    }
}

fn get_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM parameters WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| Error::Database(format!("failed to read parameter {key}: {e}")))
}

fn set_value(conn: &Connection, key: &str, value: &str) -> Result<()> {
    let updated = conn
        .execute(
            "UPDATE parameters SET value = ?2 WHERE key = ?1",
            params![key, value],
        )
        .map_err(|e| Error::Database(format!("failed to update parameter {key}: {e}")))?;

    if updated == 0 {
        conn.execute(
            "INSERT INTO parameters (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(|e| Error::Database(format!("failed to insert parameter {key}: {e}")))?;
    }
    Ok(())
}

fn insert_if_absent(conn: &Connection, key: &str, default: &str) -> Result<bool> {
    if get_value(conn, key)?.is_some() {
        return Ok(false);
    }

    conn.execute(
        "INSERT INTO parameters (key, value) VALUES (?1, ?2)",
        params![key, default],
    )
    .map_err(|e| Error::Database(format!("failed to insert parameter {key}: {e}")))?;
    Ok(true)
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim() {
        v if v.eq_ignore_ascii_case("true") => Ok(true),
        v if v.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(Error::Config(format!(
            "parameter {key} is not a boolean: {value:?}"
        ))),
    }
}
