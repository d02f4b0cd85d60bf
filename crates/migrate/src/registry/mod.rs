//! Unit registries - where migration units are discovered from
//!
//! A registry yields the complete set of units for one planning pass,
//! sorted ascending by name. Duplicate or unparsable names are rejected here
//! so the planner only ever sees a well-formed, ordered set.

pub mod code;
pub mod directory;

pub use code::*;
pub use directory::*;

use crate::error::{DiscoveryError, MigrateResult};
use crate::unit::MigrationUnit;

/// Source of migration units
pub trait UnitRegistry<C>: Send + Sync {
    /// Load every unit, sorted ascending by name
    fn discover(&self) -> MigrateResult<Vec<MigrationUnit<C>>>;
}

/// Sort units by name and reject duplicates
pub(crate) fn sorted_unique<C>(
    mut units: Vec<MigrationUnit<C>>,
) -> Result<Vec<MigrationUnit<C>>, DiscoveryError> {
    units.sort_by(|a, b| a.name().cmp(b.name()));

    if let Some(pair) = units.windows(2).find(|pair| pair[0].name() == pair[1].name()) {
        return Err(DiscoveryError::DuplicateName(pair[0].name().to_string()));
    }

    tracing::debug!(
        "Discovered {} migration unit(s): {:?}",
        units.len(),
        units.iter().map(|u| u.name()).collect::<Vec<_>>()
    );
    Ok(units)
}
