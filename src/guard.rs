//! # Schema Guard
//!
//! Keeps identifiers that end up inside SQL text or REST paths safe, and
//! evolves local seed tables to fit incoming rows:
//! 1. **Validation**: table and column names must be plain SQL identifiers
//! 2. **Cache Check**: known column sets live in a DashMap
//! 3. **Live Verify**: on a cache miss, run `PRAGMA table_info`
//! 4. **Auto-Migration**: add the columns a batch needs, in one transaction

use crate::db::BazaarStore;
use crate::error::{BazaarError, BazaarResult};
use crate::inference::{ColumnType, InferredColumn};
use dashmap::DashMap;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Columns every local seed table starts with
const BASE_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

lazy_static! {
    static ref IDENTIFIER_REGEX: Regex = Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap();

    static ref RESERVED_KEYWORDS: HashSet<&'static str> = [
        "ALL", "ALTER", "AND", "AS", "BETWEEN", "BY", "CASE", "CHECK", "CREATE", "DEFAULT",
        "DELETE", "DISTINCT", "DROP", "ELSE", "END", "EXCEPT", "EXISTS", "FALSE", "FOREIGN",
        "FROM", "GROUP", "HAVING", "IN", "INDEX", "INNER", "INSERT", "INTERSECT", "IS", "JOIN",
        "LIKE", "LIMIT", "NOT", "NULL", "OFFSET", "ON", "OR", "ORDER", "PRIMARY", "REFERENCES",
        "SELECT", "TABLE", "THEN", "TRUE", "UNION", "UNIQUE", "UPDATE", "VALUES", "WHEN",
        "WHERE",
    ]
    .into_iter()
    .collect();
}

/// Validates that an identifier is safe for use as a table or column name
///
/// # Rules
/// - Must match: `^[a-zA-Z_][a-zA-Z0-9_]*$`
/// - Must not be a SQL reserved keyword
/// - Maximum length: 63 characters (the Postgres limit)
pub fn validate_identifier(name: &str) -> BazaarResult<()> {
    if name.is_empty() || name.len() > 63 {
        return Err(BazaarError::InvalidIdentifier(format!(
            "Identifier '{}' must be 1-63 characters",
            name
        )));
    }

    if !IDENTIFIER_REGEX.is_match(name) {
        return Err(BazaarError::InvalidIdentifier(format!(
            "Identifier '{}' contains invalid characters",
            name
        )));
    }

    if RESERVED_KEYWORDS.contains(name.to_uppercase().as_str()) {
        return Err(BazaarError::InvalidIdentifier(format!(
            "Identifier '{}' is a SQL reserved keyword",
            name
        )));
    }

    Ok(())
}

/// Schema Guard over a local store
pub struct SchemaGuard {
    /// table name -> known column names
    columns: DashMap<String, Vec<String>>,
    store: Arc<BazaarStore>,
}

impl SchemaGuard {
    pub fn new(store: Arc<BazaarStore>) -> Self {
        Self {
            columns: DashMap::new(),
            store,
        }
    }

    /// Column names of `table`; empty when the table does not exist
    pub async fn table_columns(&self, table: &str) -> BazaarResult<Vec<String>> {
        validate_identifier(table)?;

        if let Some(cached) = self.columns.get(table) {
            debug!("Schema cache hit for table: {}", table);
            return Ok(cached.clone());
        }

        debug!("Schema cache miss for table: {}, querying PRAGMA", table);
        let rows = self
            .store
            .query_simple(format!("PRAGMA table_info({})", table))
            .await?;

        let names: Vec<String> = rows
            .iter()
            .filter_map(|row| {
                row.iter()
                    .find(|(k, _)| k == "name")
                    .and_then(|(_, v)| v.as_str())
                    .map(String::from)
            })
            .collect();

        if !names.is_empty() {
            self.columns.insert(table.to_string(), names.clone());
        }
        Ok(names)
    }

    /// Whether `table` exists in the local store
    pub async fn table_exists(&self, table: &str) -> BazaarResult<bool> {
        Ok(!self.table_columns(table).await?.is_empty())
    }

    /// Creates `table` with the base columns if it is missing
    pub async fn ensure_table(&self, table: &str) -> BazaarResult<()> {
        if self.table_exists(table).await? {
            return Ok(());
        }

        self.store
            .execute_batch(format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
                )",
                table
            ))
            .await?;
        info!("Created local table: {}", table);

        self.columns.remove(table);
        Ok(())
    }

    /// Adds every column in `wanted` that `table` lacks.
    ///
    /// Returns the names that were added.
    pub async fn ensure_columns(
        &self,
        table: &str,
        wanted: &[InferredColumn],
    ) -> BazaarResult<Vec<String>> {
        for column in wanted {
            validate_identifier(&column.name)?;
        }

        let existing: HashSet<String> = self.table_columns(table).await?.into_iter().collect();
        let missing: Vec<(String, &'static str)> = wanted
            .iter()
            .filter(|c| !existing.contains(&c.name) && !BASE_COLUMNS.contains(&c.name.as_str()))
            .map(|c| {
                let ty = match c.column_type {
                    ColumnType::Null => ColumnType::Text,
                    other => other,
                };
                (c.name.clone(), ty.as_sql())
            })
            .collect();

        if missing.is_empty() {
            return Ok(vec![]);
        }

        let added: Vec<String> = missing.iter().map(|(n, _)| n.clone()).collect();
        let table_name = table.to_string();
        self.store
            .with_transaction(move |conn| {
                for (name, ty) in &missing {
                    conn.execute(
                        &format!("ALTER TABLE {} ADD COLUMN {} {}", table_name, name, ty),
                        [],
                    )?;
                    info!("Added column {}.{} ({})", table_name, name, ty);
                }
                Ok(())
            })
            .await?;

        self.columns.remove(table);
        Ok(added)
    }

    /// Forgets cached columns, e.g. after raw SQL touched the schema
    pub fn invalidate(&self) {
        self.columns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::infer_columns;
    use serde_json::json;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("id_proofs").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("report_reasons").is_ok());

        assert!(validate_identifier("123abc").is_err());
        assert!(validate_identifier("id-proofs").is_err());
        assert!(validate_identifier("tips; DROP TABLE staff").is_err());
        assert!(validate_identifier("select").is_err());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }

    #[tokio::test]
    async fn test_ensure_table_and_columns() {
        let store = Arc::new(BazaarStore::in_memory().await.unwrap());
        let guard = SchemaGuard::new(store.clone());

        assert!(!guard.table_exists("id_proofs").await.unwrap());
        guard.ensure_table("id_proofs").await.unwrap();
        assert_eq!(guard.table_columns("id_proofs").await.unwrap().len(), 3);

        let wanted = infer_columns(&[json!({"title": "Passport", "is_active": true})]).unwrap();
        let added = guard.ensure_columns("id_proofs", &wanted).await.unwrap();
        assert_eq!(added, vec!["is_active".to_string(), "title".to_string()]);
        assert_eq!(guard.table_columns("id_proofs").await.unwrap().len(), 5);

        // A second pass has nothing to add
        assert!(guard.ensure_columns("id_proofs", &wanted).await.unwrap().is_empty());
    }
}
