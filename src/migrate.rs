//! # Migration Runner
//!
//! One-shot, supervised schema change: add a column and an index through the
//! backend's raw SQL entry point. When that entry point fails (on the hosted
//! backend it is an optional RPC that may not be installed), the column is
//! probed to tell "already applied" apart from "needs a human".
//!
//! No transaction and no rollback; the statements are idempotent on Postgres.

use crate::backend::{Backend, Dialect};
use crate::error::{BazaarError, BazaarResult};
use crate::guard::validate_identifier;
use tracing::{error, info, warn};

/// Adds `column` to `table` and indexes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMigration {
    pub table: String,
    pub column: String,
    pub column_type: String,
    pub index_name: String,
}

/// Links staff records to their auth-service user
pub fn staff_auth_id() -> ColumnMigration {
    ColumnMigration::new("staff", "auth_id", "UUID")
}

impl ColumnMigration {
    /// Builds a migration with the conventional `idx_<table>_<column>` index name
    pub fn new(table: &str, column: &str, column_type: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            column_type: column_type.to_string(),
            index_name: format!("idx_{}_{}", table, column),
        }
    }

    fn validate(&self) -> BazaarResult<()> {
        validate_identifier(&self.table)?;
        validate_identifier(&self.column)?;
        validate_identifier(&self.index_name)?;
        if !self
            .column_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '(' || c == ')')
        {
            return Err(BazaarError::InvalidIdentifier(format!(
                "Column type '{}' is not a plain type name",
                self.column_type
            )));
        }
        Ok(())
    }

    /// SQL for `dialect`. SQLite has no `ADD COLUMN IF NOT EXISTS`.
    pub fn sql(&self, dialect: Dialect) -> String {
        let guard = match dialect {
            Dialect::Postgres => "IF NOT EXISTS ",
            Dialect::Sqlite => "",
        };
        format!(
            "ALTER TABLE {table} ADD COLUMN {guard}{column} {ty};\nCREATE INDEX IF NOT EXISTS {index} ON {table} ({column});",
            table = self.table,
            column = self.column,
            ty = self.column_type,
            index = self.index_name,
            guard = guard,
        )
    }
}

/// How a migration run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The statements ran
    Applied,
    /// The statements failed but the column is there
    AlreadyApplied,
    /// The column is missing and must be added by hand with `sql`
    ManualActionRequired { sql: String },
    /// The statements failed and the probe could not decide either way
    Unverified { reason: String },
}

impl MigrationOutcome {
    /// Process exit status for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            MigrationOutcome::ManualActionRequired { .. } => 1,
            _ => 0,
        }
    }
}

/// Runs `migration` against `backend`.
///
/// Only invalid identifiers are returned as errors; backend failures are
/// folded into the outcome.
pub async fn run<B: Backend>(backend: &B, migration: &ColumnMigration) -> BazaarResult<MigrationOutcome> {
    migration.validate()?;
    let sql = migration.sql(backend.dialect());
    info!(
        "Adding {}.{} on {}",
        migration.table,
        migration.column,
        backend.describe()
    );

    let exec_err = match backend.exec_sql(&sql).await {
        Ok(()) => {
            info!("Migration applied: {}.{} with index {}", migration.table, migration.column, migration.index_name);
            return Ok(MigrationOutcome::Applied);
        }
        Err(e) => e,
    };
    warn!("[{}] SQL execution failed: {}", exec_err.error_code(), exec_err);
    info!("Checking whether {}.{} already exists", migration.table, migration.column);

    match backend.probe_column(&migration.table, &migration.column).await {
        Ok(()) => {
            info!("Column {}.{} already exists, nothing to do", migration.table, migration.column);
            Ok(MigrationOutcome::AlreadyApplied)
        }
        Err(BazaarError::UndefinedColumn { .. }) => {
            error!(
                "Column {}.{} is missing and could not be added automatically",
                migration.table, migration.column
            );
            Ok(MigrationOutcome::ManualActionRequired {
                sql: migration.sql(Dialect::Postgres),
            })
        }
        Err(e) => {
            warn!("[{}] Could not verify column: {}", e.error_code(), e);
            Ok(MigrationOutcome::Unverified {
                reason: e.to_string(),
            })
        }
    }
}
