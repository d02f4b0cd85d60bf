//! Migration units - named steps bundling an apply and a revert action
//!
//! A unit never reaches for an ambient connection: whatever it needs to touch
//! the schema is handed to it as the context `C` on every call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::DiscoveryError;

/// Direction a migration step runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Run the forward action and record the unit
    Apply,
    /// Run the backward action and erase the unit
    Revert,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Apply => write!(f, "apply"),
            Direction::Revert => write!(f, "revert"),
        }
    }
}

/// The two executable halves of a migration
#[async_trait]
pub trait MigrationAction<C>: Send + Sync {
    /// Forward schema change
    async fn apply(&self, ctx: &C) -> anyhow::Result<()>;

    /// Backward schema change
    async fn revert(&self, ctx: &C) -> anyhow::Result<()>;
}

type SyncFn<C> = Box<dyn Fn(&C) -> anyhow::Result<()> + Send + Sync>;

/// Migration action built from two plain closures
pub struct FnMigration<C> {
    apply: SyncFn<C>,
    revert: SyncFn<C>,
}

impl<C> FnMigration<C> {
    pub fn new<A, R>(apply: A, revert: R) -> Self
    where
        A: Fn(&C) -> anyhow::Result<()> + Send + Sync + 'static,
        R: Fn(&C) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            apply: Box::new(apply),
            revert: Box::new(revert),
        }
    }
}

#[async_trait]
impl<C> MigrationAction<C> for FnMigration<C>
where
    C: Sync + 'static,
{
    async fn apply(&self, ctx: &C) -> anyhow::Result<()> {
        (self.apply)(ctx)
    }

    async fn revert(&self, ctx: &C) -> anyhow::Result<()> {
        (self.revert)(ctx)
    }
}

/// A discovered, immutable migration unit
pub struct MigrationUnit<C> {
    name: String,
    sequence: u64,
    action: Arc<dyn MigrationAction<C>>,
}

impl<C> MigrationUnit<C> {
    /// Build a unit, parsing its sequence prefix from the name
    pub fn new(
        name: impl Into<String>,
        action: Arc<dyn MigrationAction<C>>,
    ) -> Result<Self, DiscoveryError> {
        let name = name.into();
        let sequence = parse_sequence(&name)?;
        Ok(Self {
            name,
            sequence,
            action,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Numeric prefix of the name (`7` for `007_add_users`)
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Run this unit's action in the given direction
    pub async fn run(&self, direction: Direction, ctx: &C) -> anyhow::Result<()> {
        match direction {
            Direction::Apply => self.action.apply(ctx).await,
            Direction::Revert => self.action.revert(ctx).await,
        }
    }
}

impl<C> Clone for MigrationUnit<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            sequence: self.sequence,
            action: Arc::clone(&self.action),
        }
    }
}

impl<C> fmt::Debug for MigrationUnit<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationUnit")
            .field("name", &self.name)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

/// Parse the leading digits of a migration name
pub fn parse_sequence(name: &str) -> Result<u64, DiscoveryError> {
    let digits: &str = {
        let end = name
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map_or(name.len(), |(idx, _)| idx);
        &name[..end]
    };

    if digits.is_empty() {
        return Err(DiscoveryError::InvalidName(name.to_string()));
    }

    digits
        .parse()
        .map_err(|_| DiscoveryError::InvalidName(name.to_string()))
}
