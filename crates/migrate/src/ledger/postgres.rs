//! PostgreSQL ledger backend

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::{LedgerEntry, LedgerStore};
use crate::config::validate_identifier;
use crate::error::{MigrateError, MigrateResult};

/// Ledger stored in a PostgreSQL table
#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
    table: String,
}

impl PgLedger {
    /// Create a ledger over `table`; the name must be a plain identifier
    pub fn new(pool: PgPool, table: impl Into<String>) -> MigrateResult<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        Ok(Self { pool, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// SQL to create the ledger table
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                name VARCHAR(255) PRIMARY KEY,\n    \
                applied_at BIGSERIAL NOT NULL,\n    \
                recorded_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP\n\
            )",
            self.table
        )
    }

    /// SQL to list entries in application order
    pub fn select_entries_sql(&self) -> String {
        format!(
            "SELECT name, applied_at, recorded_at FROM {} ORDER BY applied_at ASC",
            self.table
        )
    }

    /// SQL to record an entry; inserts nothing when the name already exists
    pub fn insert_entry_sql(&self) -> String {
        format!(
            "INSERT INTO {} (name) VALUES ($1) ON CONFLICT (name) DO NOTHING",
            self.table
        )
    }

    /// SQL to erase an entry
    pub fn delete_entry_sql(&self) -> String {
        format!("DELETE FROM {} WHERE name = $1", self.table)
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn ensure_storage(&self) -> MigrateResult<()> {
        sqlx::query(&self.create_table_sql())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn storage_exists(&self) -> MigrateResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(&self.table)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn entries(&self) -> MigrateResult<Vec<LedgerEntry>> {
        let rows = sqlx::query(&self.select_entries_sql())
            .fetch_all(&self.pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(LedgerEntry {
                name: row.try_get("name")?,
                applied_at: row.try_get("applied_at")?,
                recorded_at: Some(row.try_get("recorded_at")?),
            });
        }

        tracing::debug!("Read {} ledger entries from {}", entries.len(), self.table);
        Ok(entries)
    }

    async fn record(&self, name: &str) -> MigrateResult<()> {
        let result = sqlx::query(&self.insert_entry_sql())
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MigrateError::DuplicateRecord {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    async fn erase(&self, name: &str) -> MigrateResult<()> {
        let result = sqlx::query(&self.delete_entry_sql())
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MigrateError::NotRecorded {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn ledger(table: &str) -> MigrateResult<PgLedger> {
        // connect_lazy never opens a connection until a query runs
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/rung_test")
            .expect("valid database url");
        PgLedger::new(pool, table)
    }

    #[tokio::test]
    async fn test_ledger_sql_generation() {
        let ledger = ledger("schema_ledger").unwrap();

        let create = ledger.create_table_sql();
        assert!(create.contains("CREATE TABLE IF NOT EXISTS schema_ledger"));
        assert!(create.contains("name VARCHAR(255) PRIMARY KEY"));
        assert!(create.contains("applied_at BIGSERIAL NOT NULL"));

        assert!(ledger.select_entries_sql().ends_with("ORDER BY applied_at ASC"));
        assert!(ledger.insert_entry_sql().contains("ON CONFLICT (name) DO NOTHING"));
        assert_eq!(
            ledger.delete_entry_sql(),
            "DELETE FROM schema_ledger WHERE name = $1"
        );
    }

    #[tokio::test]
    async fn test_ledger_rejects_unsafe_table_name() {
        assert!(matches!(
            ledger("ledger; DROP TABLE users"),
            Err(MigrateError::Config(_))
        ));
    }
}
