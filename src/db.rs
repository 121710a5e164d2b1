//! # Local Store
//!
//! A SQLite file (or in-memory database) used in two places: as the offline
//! stand-in for the remote backend, and as the persistence layer of the
//! document store. Connections run in WAL mode with foreign keys enabled.

use crate::error::{BazaarError, BazaarResult};
use rusqlite::TransactionBehavior;
use serde_json::Value;
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

/// A row as (column name, JSON value) pairs, in column order
pub type Row = Vec<(String, Value)>;

/// Local SQLite store
pub struct BazaarStore {
    conn: Connection,
    path: String,
}

impl BazaarStore {
    /// Opens (or creates) the database file at `path`
    pub async fn open<P: AsRef<Path>>(path: P) -> BazaarResult<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        info!("Opening local store at: {}", path_str);

        let conn = Connection::open(&path_str)
            .await
            .map_err(|e| BazaarError::Database(format!("Failed to open database: {}", e)))?;

        Self::initialize_pragmas(&conn, true).await?;

        Ok(Self {
            conn,
            path: path_str,
        })
    }

    /// Creates an in-memory database (useful for testing)
    pub async fn in_memory() -> BazaarResult<Self> {
        debug!("Opening in-memory local store");

        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| BazaarError::Database(format!("Failed to create database: {}", e)))?;

        Self::initialize_pragmas(&conn, false).await?;

        Ok(Self {
            conn,
            path: ":memory:".to_string(),
        })
    }

    async fn initialize_pragmas(conn: &Connection, wal: bool) -> BazaarResult<()> {
        conn.call(move |conn| {
            if wal {
                conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
            }
            conn.execute_batch("PRAGMA foreign_keys=ON;")?;
            Ok(())
        })
        .await?;

        debug!("Database pragmas configured");
        Ok(())
    }

    /// Get the database file path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Execute a single write statement with positional parameters
    pub async fn execute(&self, sql: String, params: Vec<SqlValue>) -> BazaarResult<u64> {
        debug!("execute: {}", sql);
        let affected = self
            .conn
            .call(move |conn| {
                let affected = conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;
                Ok(affected as u64)
            })
            .await?;
        Ok(affected)
    }

    /// Execute one or more statements separated by semicolons
    pub async fn execute_batch(&self, sql: String) -> BazaarResult<()> {
        debug!("execute_batch: {}", sql);
        self.conn
            .call(move |conn| {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Query and return rows as (column, JSON value) pairs
    pub async fn query(&self, sql: String, params: Vec<SqlValue>) -> BazaarResult<Vec<Row>> {
        debug!("query: {}", sql);
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let column_names: Vec<String> =
                    stmt.column_names().iter().map(|s| s.to_string()).collect();

                let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    let mut values = Vec::with_capacity(column_names.len());
                    for (i, name) in column_names.iter().enumerate() {
                        values.push((name.clone(), value_at(row, i)?));
                    }
                    out.push(values);
                }
                Ok(out)
            })
            .await?;
        Ok(rows)
    }

    /// Query without parameters
    pub async fn query_simple(&self, sql: impl Into<String>) -> BazaarResult<Vec<Row>> {
        self.query(sql.into(), vec![]).await
    }

    /// Counts the rows of a table. The name must already be validated.
    pub async fn count_rows(&self, table: &str) -> BazaarResult<u64> {
        let rows = self
            .query_simple(format!("SELECT COUNT(*) AS count FROM {}", table))
            .await?;
        Ok(rows
            .first()
            .and_then(|r| r.first())
            .and_then(|(_, v)| v.as_u64())
            .unwrap_or(0))
    }

    /// Runs `f` inside an immediate transaction; any error rolls it back
    pub async fn with_transaction<F, T>(&self, f: F) -> BazaarResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        let result = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let result = f(&tx)?;
                tx.commit()?;
                Ok(result)
            })
            .await?;
        Ok(result)
    }
}

/// Reads a column using its storage class rather than guessing types
fn value_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Value> {
    use rusqlite::types::ValueRef;

    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<blob:{} bytes>", b.len())),
    })
}

/// SQL Value wrapper for parameters
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl rusqlite::ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, ValueRef};

        Ok(match self {
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlValue::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

/// Convert JSON value to SqlValue. Nested values are stored as JSON text.
pub fn json_to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                SqlValue::Text(n.to_string())
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}
