//! # Database Access Layer
//!
//! The engine never talks to a database directly; statement execution goes
//! through the [`DbDriver`] trait supplied by the caller (or the bundled
//! [`SqliteDriver`]). The trait is intentionally small: non-query
//! execution, querying into [`SqlValue`] rows, and an optional per-command
//! timeout.
//!
//! [`insert_batch`] is the bulk-load helper used by the load-table
//! directive: it renders rows into multi-row INSERT statements in chunks,
//! escaping text values by quote doubling.

pub mod sqlite;

use std::time::Duration;

use eyre::ensure;

pub use sqlite::SqliteDriver;

/// A value read from or written to the database.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Renders the value as a SQL literal. Text is escaped by doubling
    /// single quotes; blobs use the `X'..'` hex form.
    pub fn to_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => {
                if f.is_finite() {
                    f.to_string()
                } else {
                    "NULL".to_string()
                }
            }
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            SqlValue::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02x}")).collect();
                format!("X'{hex}'")
            }
        }
    }
}

/// Database access used by the execution layer. Implementations must be
/// shareable across handlers; serialize internally where the underlying
/// connection requires it.
pub trait DbDriver: Send + Sync {
    /// Executes a non-query statement, returning the affected row count.
    fn execute(&self, sql: &str) -> eyre::Result<u64>;

    /// Executes a query, materializing all rows.
    fn query(&self, sql: &str) -> eyre::Result<Vec<Vec<SqlValue>>>;

    /// Non-query execution with a per-command timeout. The default ignores
    /// the timeout; drivers that can enforce one override this.
    fn execute_with_timeout(&self, sql: &str, timeout: Option<Duration>) -> eyre::Result<u64> {
        let _ = timeout;
        self.execute(sql)
    }
}

/// Target column of a bulk load: name, declared type, optional length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub ty: String,
    pub len: Option<u32>,
}

impl ColumnSpec {
    /// Parses a `"name, Type[, length]"` spec as it appears in load-table
    /// directive arguments.
    pub fn parse(spec: &str) -> eyre::Result<Self> {
        let mut parts = spec.split(',').map(str::trim);
        let name = match parts.next() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => eyre::bail!("column spec '{spec}' is missing a name"),
        };
        let ty = match parts.next() {
            Some(ty) if !ty.is_empty() => ty.to_string(),
            _ => eyre::bail!("column spec '{spec}' is missing a type"),
        };
        let len = match parts.next() {
            Some(len) => Some(
                len.parse::<u32>()
                    .map_err(|_| eyre::eyre!("column spec '{spec}' has a non-numeric length"))?,
            ),
            None => None,
        };
        ensure!(
            parts.next().is_none(),
            "column spec '{spec}' has trailing fields"
        );
        Ok(Self { name, ty, len })
    }
}

/// Bulk-inserts `rows` into `table` in chunks of `chunk_size` rows per
/// INSERT statement. Returns the number of rows written.
pub fn insert_batch(
    driver: &dyn DbDriver,
    table: &str,
    columns: &[ColumnSpec],
    rows: &[Vec<SqlValue>],
    chunk_size: usize,
) -> eyre::Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    ensure!(chunk_size > 0, "chunk size must be positive");
    ensure!(!columns.is_empty(), "bulk insert requires target columns");

    let column_list = columns
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut written = 0;
    for chunk in rows.chunks(chunk_size) {
        let mut sql = format!("INSERT INTO {table} ({column_list}) VALUES ");
        for (i, row) in chunk.iter().enumerate() {
            ensure!(
                row.len() == columns.len(),
                "row has {} values but {} columns are declared",
                row.len(),
                columns.len()
            );
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            for (j, value) in row.iter().enumerate() {
                if j > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(&value.to_literal());
            }
            sql.push(')');
        }
        driver.execute(&sql)?;
        written += chunk.len();
    }

    tracing::debug!(table, rows = written, "bulk insert finished");
    Ok(written)
}
