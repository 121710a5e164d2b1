use super::{Backend, Dialect};
use crate::db::{json_to_sql_value, BazaarStore, SqlValue};
use crate::error::{BazaarError, BazaarResult};
use crate::guard::{validate_identifier, SchemaGuard};
use crate::inference::infer_columns;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Backend over a local SQLite store.
///
/// Tables are schema-later: a missing table counts as empty and is created,
/// with whatever columns the rows carry, on the first insert.
pub struct LocalBackend {
    store: Arc<BazaarStore>,
    guard: SchemaGuard,
}

impl LocalBackend {
    pub fn new(store: Arc<BazaarStore>) -> Self {
        let guard = SchemaGuard::new(Arc::clone(&store));
        Self { store, guard }
    }

    /// Opens a backend on the SQLite file at `path`
    pub async fn open<P: AsRef<Path>>(path: P) -> BazaarResult<Self> {
        Ok(Self::new(Arc::new(BazaarStore::open(path).await?)))
    }

    pub fn store(&self) -> &Arc<BazaarStore> {
        &self.store
    }
}

impl Backend for LocalBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn describe(&self) -> String {
        format!("local store {}", self.store.path())
    }

    async fn count_rows(&self, table: &str) -> BazaarResult<u64> {
        if !self.guard.table_exists(table).await? {
            debug!("Local table {} does not exist yet, counting as empty", table);
            return Ok(0);
        }
        self.store.count_rows(table).await
    }

    async fn insert_rows(&self, table: &str, rows: &[Value]) -> BazaarResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        self.guard.ensure_table(table).await?;
        let columns = infer_columns(rows)?;
        self.guard.ensure_columns(table, &columns).await?;

        let mut statements: Vec<(String, Vec<SqlValue>)> = Vec::with_capacity(rows.len());
        for row in rows {
            let obj = row.as_object().ok_or_else(|| {
                BazaarError::InvalidPayload("Each row must be a JSON object".to_string())
            })?;
            let present: Vec<(&String, &Value)> = obj.iter().filter(|(_, v)| !v.is_null()).collect();

            let sql = if present.is_empty() {
                format!("INSERT INTO {} DEFAULT VALUES", table)
            } else {
                let names: Vec<&str> = present.iter().map(|(k, _)| k.as_str()).collect();
                let placeholders = vec!["?"; names.len()].join(", ");
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    table,
                    names.join(", "),
                    placeholders
                )
            };
            let params = present.iter().map(|(_, v)| json_to_sql_value(v)).collect();
            statements.push((sql, params));
        }

        let inserted = self
            .store
            .with_transaction(move |conn| {
                let mut inserted = 0u64;
                for (sql, params) in &statements {
                    conn.execute(sql, rusqlite::params_from_iter(params.iter()))?;
                    inserted += 1;
                }
                Ok(inserted)
            })
            .await?;

        info!("Inserted {} rows into local table {}", inserted, table);
        Ok(inserted)
    }

    async fn exec_sql(&self, sql: &str) -> BazaarResult<()> {
        let result = self.store.execute_batch(sql.to_string()).await;
        self.guard.invalidate();
        result
    }

    async fn probe_column(&self, table: &str, column: &str) -> BazaarResult<()> {
        validate_identifier(table)?;
        validate_identifier(column)?;

        match self
            .store
            .query_simple(format!("SELECT {} FROM {} LIMIT 1", column, table))
            .await
        {
            Ok(_) => Ok(()),
            Err(BazaarError::Database(msg)) if msg.contains("no such column") => {
                Err(BazaarError::UndefinedColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn backend() -> LocalBackend {
        LocalBackend::new(Arc::new(BazaarStore::in_memory().await.unwrap()))
    }

    #[tokio::test]
    async fn test_missing_table_counts_as_empty() {
        let backend = backend().await;
        assert_eq!(backend.count_rows("tips").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_creates_table_and_columns() {
        let backend = backend().await;
        let rows = vec![
            json!({"title": "Passport", "is_active": true}),
            json!({"title": "Voter ID", "is_active": false, "sort_order": 2}),
        ];

        assert_eq!(backend.insert_rows("id_proofs", &rows).await.unwrap(), 2);
        assert_eq!(backend.count_rows("id_proofs").await.unwrap(), 2);

        let stored = backend
            .store()
            .query_simple("SELECT title, is_active, sort_order FROM id_proofs ORDER BY id")
            .await
            .unwrap();
        assert_eq!(stored[0][0].1, json!("Passport"));
        assert_eq!(stored[0][1].1, json!(1));
        assert_eq!(stored[0][2].1, json!(null));
        assert_eq!(stored[1][2].1, json!(2));
    }

    #[tokio::test]
    async fn test_insert_rejects_bad_identifiers() {
        let backend = backend().await;
        let err = backend
            .insert_rows("tips", &[json!({"bad-key": 1})])
            .await
            .unwrap_err();
        assert!(matches!(err, BazaarError::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn test_probe_column() {
        let backend = backend().await;
        backend
            .exec_sql("CREATE TABLE staff (id INTEGER PRIMARY KEY, email TEXT)")
            .await
            .unwrap();

        backend.probe_column("staff", "email").await.unwrap();
        let err = backend.probe_column("staff", "auth_id").await.unwrap_err();
        assert!(matches!(err, BazaarError::UndefinedColumn { .. }), "got {err:?}");
    }
}
