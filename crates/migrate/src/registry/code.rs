//! Code registry - migrations compiled into the binary as a name table

use std::sync::Arc;

use super::{sorted_unique, UnitRegistry};
use crate::error::MigrateResult;
use crate::unit::{MigrationAction, MigrationUnit};

/// Registry backed by a table of actions registered in code
pub struct CodeRegistry<C> {
    entries: Vec<(String, Arc<dyn MigrationAction<C>>)>,
}

impl<C> CodeRegistry<C> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a unit under `name`
    pub fn register<A>(mut self, name: impl Into<String>, action: A) -> Self
    where
        A: MigrationAction<C> + 'static,
    {
        self.entries.push((name.into(), Arc::new(action)));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C> Default for CodeRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> UnitRegistry<C> for CodeRegistry<C> {
    fn discover(&self) -> MigrateResult<Vec<MigrationUnit<C>>> {
        let units = self
            .entries
            .iter()
            .map(|(name, action)| MigrationUnit::new(name.clone(), Arc::clone(action)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sorted_unique(units)?)
    }
}
