//! In-memory ledger backend

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::{LedgerEntry, LedgerStore};
use crate::error::{MigrateError, MigrateResult};

#[derive(Debug, Default)]
struct MemoryState {
    entries: Vec<LedgerEntry>,
    next_applied_at: i64,
}

/// Ledger kept in process memory
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<MemoryState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger pre-populated with names, applied in the given order
    pub fn with_applied<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ledger = Self::new();
        {
            let mut state = ledger.state.lock();
            for name in names {
                state.push(name.into());
            }
        }
        ledger
    }
}

impl MemoryState {
    fn push(&mut self, name: String) {
        self.next_applied_at += 1;
        self.entries.push(LedgerEntry {
            name,
            applied_at: self.next_applied_at,
            recorded_at: Some(Utc::now()),
        });
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn ensure_storage(&self) -> MigrateResult<()> {
        Ok(())
    }

    async fn storage_exists(&self) -> MigrateResult<bool> {
        Ok(true)
    }

    async fn entries(&self) -> MigrateResult<Vec<LedgerEntry>> {
        Ok(self.state.lock().entries.clone())
    }

    async fn record(&self, name: &str) -> MigrateResult<()> {
        let mut state = self.state.lock();
        if state.entries.iter().any(|e| e.name == name) {
            return Err(MigrateError::DuplicateRecord {
                name: name.to_string(),
            });
        }
        state.push(name.to_string());
        Ok(())
    }

    async fn erase(&self, name: &str) -> MigrateResult<()> {
        let mut state = self.state.lock();
        let position = state
            .entries
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| MigrateError::NotRecorded {
                name: name.to_string(),
            })?;
        state.entries.remove(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_erase() {
        let ledger = MemoryLedger::new();
        ledger.record("001_init").await.unwrap();
        ledger.record("002_users").await.unwrap();

        assert_eq!(
            ledger.applied_in_order().await.unwrap(),
            vec!["001_init", "002_users"]
        );

        ledger.erase("001_init").await.unwrap();
        let names = ledger.applied_names().await.unwrap();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["002_users"]);
    }

    #[tokio::test]
    async fn test_record_twice_is_rejected() {
        let ledger = MemoryLedger::with_applied(["001_init"]);

        let err = ledger.record("001_init").await.unwrap_err();
        assert!(matches!(err, MigrateError::DuplicateRecord { name } if name == "001_init"));
    }

    #[tokio::test]
    async fn test_erase_unknown_is_rejected() {
        let ledger = MemoryLedger::new();

        let err = ledger.erase("001_init").await.unwrap_err();
        assert!(matches!(err, MigrateError::NotRecorded { name } if name == "001_init"));
    }

    #[tokio::test]
    async fn test_applied_at_keeps_increasing_after_erase() {
        let ledger = MemoryLedger::with_applied(["001", "003"]);
        ledger.erase("003").await.unwrap();
        ledger.record("002").await.unwrap();

        let entries = ledger.entries().await.unwrap();
        assert_eq!(entries[0].applied_at, 1);
        assert_eq!(entries[1].name, "002");
        assert_eq!(entries[1].applied_at, 3);
    }
}
