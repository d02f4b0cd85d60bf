//! Ledger - the persistent record of which migrations have been applied
//!
//! One entry per applied unit. `applied_at` is an insertion counter, so
//! ordering by it reconstructs the order units were actually applied in,
//! which may differ from name order once out-of-order applies happened.

pub mod memory;
pub mod postgres;

pub use memory::*;
pub use postgres::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::MigrateResult;

/// One applied migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unit name
    pub name: String,
    /// Monotonically increasing insertion order
    pub applied_at: i64,
    /// Wall-clock time the entry was written, when the store keeps it
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Snapshot of the ledger taken before planning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedState {
    in_order: Vec<String>,
    names: BTreeSet<String>,
}

impl AppliedState {
    /// Build from names ordered by `applied_at`
    pub fn from_ordered<I, S>(in_order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let in_order: Vec<String> = in_order.into_iter().map(Into::into).collect();
        let names = in_order.iter().cloned().collect();
        Self { in_order, names }
    }

    /// Applied names in application order
    pub fn in_order(&self) -> &[String] {
        &self.in_order
    }

    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Greatest applied name by sort order
    pub fn highest(&self) -> Option<&str> {
        self.names.iter().next_back().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.in_order.is_empty()
    }
}

/// Storage behind the ledger
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create the backing storage if it does not exist yet
    async fn ensure_storage(&self) -> MigrateResult<()>;

    /// Whether the backing storage exists
    async fn storage_exists(&self) -> MigrateResult<bool>;

    /// All entries ordered by `applied_at`
    async fn entries(&self) -> MigrateResult<Vec<LedgerEntry>>;

    /// Insert an entry; fails with `DuplicateRecord` if present
    async fn record(&self, name: &str) -> MigrateResult<()>;

    /// Delete an entry; fails with `NotRecorded` if absent
    async fn erase(&self, name: &str) -> MigrateResult<()>;

    async fn applied_in_order(&self) -> MigrateResult<Vec<String>> {
        Ok(self.entries().await?.into_iter().map(|e| e.name).collect())
    }

    async fn applied_names(&self) -> MigrateResult<BTreeSet<String>> {
        Ok(self.entries().await?.into_iter().map(|e| e.name).collect())
    }

    async fn snapshot(&self) -> MigrateResult<AppliedState> {
        Ok(AppliedState::from_ordered(self.applied_in_order().await?))
    }
}
