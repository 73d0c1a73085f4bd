//! SQLite-backed [`DbDriver`] over a `rusqlite` connection.
//!
//! The connection is wrapped in a mutex because `rusqlite::Connection` is
//! not `Sync`; the engine itself is single-threaded per script, so the lock
//! is uncontended in practice.

use std::path::Path;
use std::time::Duration;

use eyre::WrapErr;
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::Connection;

use super::{DbDriver, SqlValue};

pub struct SqliteDriver {
    conn: Mutex<Connection>,
}

impl SqliteDriver {
    pub fn open(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let conn = Connection::open(path.as_ref())
            .wrap_err_with(|| format!("opening database '{}'", path.as_ref().display()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> eyre::Result<Self> {
        let conn = Connection::open_in_memory().wrap_err("opening in-memory database")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn value_from(value: ValueRef<'_>) -> eyre::Result<SqlValue> {
    Ok(match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Int(i),
        ValueRef::Real(f) => SqlValue::Float(f),
        ValueRef::Text(bytes) => SqlValue::Text(
            std::str::from_utf8(bytes)
                .wrap_err("non-UTF-8 text value")?
                .to_string(),
        ),
        ValueRef::Blob(bytes) => SqlValue::Blob(bytes.to_vec()),
    })
}

impl DbDriver for SqliteDriver {
    fn execute(&self, sql: &str) -> eyre::Result<u64> {
        let conn = self.conn.lock();
        let affected = conn
            .execute(sql, [])
            .wrap_err_with(|| format!("executing: {sql}"))?;
        Ok(affected as u64)
    }

    fn query(&self, sql: &str) -> eyre::Result<Vec<Vec<SqlValue>>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(sql)
            .wrap_err_with(|| format!("preparing: {sql}"))?;
        let column_count = stmt.column_count();

        let mut out = Vec::new();
        let mut rows = stmt.query([]).wrap_err_with(|| format!("querying: {sql}"))?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(value_from(row.get_ref(i)?)?);
            }
            out.push(values);
        }
        Ok(out)
    }

    fn execute_with_timeout(&self, sql: &str, timeout: Option<Duration>) -> eyre::Result<u64> {
        if let Some(timeout) = timeout {
            self.conn.lock().busy_timeout(timeout)?;
        }
        self.execute(sql)
    }
}
