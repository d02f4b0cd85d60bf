//! Migrator - ties a registry, a ledger and a context together
//!
//! This is the entry point most callers want: one call discovers units,
//! snapshots the ledger, plans and executes.

use serde::Serialize;
use std::collections::HashMap;

use crate::error::MigrateResult;
use crate::executor::Executor;
use crate::ledger::{AppliedState, LedgerEntry, LedgerStore};
use crate::planner::{self, MigrationRequest, Plan};
use crate::registry::UnitRegistry;
use crate::unit::{Direction, MigrationUnit};

/// Outcome of one migrator run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub direction: Direction,
    /// Units acted on, in execution order
    pub executed: Vec<String>,
    /// Pending units skipped as out of order
    pub skipped_out_of_order: Vec<String>,
    /// Ledger entries with no discoverable unit
    pub missing: Vec<String>,
    pub fake: bool,
}

impl RunReport {
    /// Whether at least one step ran
    pub fn did_work(&self) -> bool {
        !self.executed.is_empty()
    }
}

/// State of a single migration as seen by `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UnitState {
    Applied { applied_at: i64 },
    Pending,
    /// Pending, but sorts below the highest applied name
    OutOfOrder,
    /// Recorded in the ledger but no longer discoverable
    Missing { applied_at: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitStatus {
    pub name: String,
    #[serde(flatten)]
    pub state: UnitState,
}

/// Migration entry point over a context `C` and a ledger `L`
pub struct Migrator<C, L> {
    context: C,
    registry: Box<dyn UnitRegistry<C>>,
    ledger: L,
}

impl<C, L> Migrator<C, L>
where
    C: Sync + 'static,
    L: LedgerStore,
{
    pub fn new<R>(context: C, registry: R, ledger: L) -> Self
    where
        R: UnitRegistry<C> + 'static,
    {
        Self {
            context,
            registry: Box::new(registry),
            ledger,
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Discover units and snapshot the ledger
    async fn load(&self) -> MigrateResult<(Vec<MigrationUnit<C>>, AppliedState)> {
        let units = self.registry.discover()?;
        self.ledger.ensure_storage().await?;
        let applied = self.ledger.snapshot().await?;
        Ok((units, applied))
    }

    /// Compute the plan for `request` without executing it
    pub async fn plan(&self, request: &MigrationRequest) -> MigrateResult<Plan<C>> {
        let (units, applied) = self.load().await?;
        let plan = planner::plan(&units, &applied, request)?;

        for name in plan.skipped_out_of_order() {
            tracing::warn!(unit = name.as_str(), "Skipping out-of-order migration");
        }
        for name in plan.missing() {
            tracing::warn!(unit = name.as_str(), "Applied migration is missing from the registry");
        }
        Ok(plan)
    }

    /// Plan and execute `request`, reporting what ran
    pub async fn execute(&self, request: &MigrationRequest) -> MigrateResult<RunReport> {
        let plan = self.plan(request).await?;

        let report = RunReport {
            direction: request.direction,
            executed: plan.names().into_iter().map(String::from).collect(),
            skipped_out_of_order: plan.skipped_out_of_order().to_vec(),
            missing: plan.missing().to_vec(),
            fake: request.fake,
        };

        Executor::new(&self.context, &self.ledger)
            .run(plan, request.fake)
            .await?;

        tracing::info!(
            "{} {} migration(s){}",
            match request.direction {
                Direction::Apply => "Applied",
                Direction::Revert => "Reverted",
            },
            report.executed.len(),
            if request.fake { " (fake)" } else { "" }
        );
        Ok(report)
    }

    /// Plan and execute `request`; `Ok(false)` means there was nothing to do
    pub async fn run(&self, request: &MigrationRequest) -> MigrateResult<bool> {
        Ok(self.execute(request).await?.did_work())
    }

    /// Status of every discoverable or recorded migration, sorted by name
    pub async fn status(&self) -> MigrateResult<Vec<UnitStatus>> {
        let units = self.registry.discover()?;
        let entries = if self.ledger.storage_exists().await? {
            self.ledger.entries().await?
        } else {
            Vec::new()
        };
        Ok(unit_statuses(&units, &entries))
    }
}

/// Classify every unit and ledger entry
pub fn unit_statuses<C>(units: &[MigrationUnit<C>], entries: &[LedgerEntry]) -> Vec<UnitStatus> {
    let recorded: HashMap<&str, i64> = entries
        .iter()
        .map(|e| (e.name.as_str(), e.applied_at))
        .collect();
    let highest = entries.iter().map(|e| e.name.as_str()).max();

    let mut statuses: Vec<UnitStatus> = units
        .iter()
        .map(|unit| {
            let state = match recorded.get(unit.name()) {
                Some(&applied_at) => UnitState::Applied { applied_at },
                None if highest.map_or(false, |h| unit.name() < h) => UnitState::OutOfOrder,
                None => UnitState::Pending,
            };
            UnitStatus {
                name: unit.name().to_string(),
                state,
            }
        })
        .collect();

    statuses.extend(
        entries
            .iter()
            .filter(|e| units.iter().all(|u| u.name() != e.name))
            .map(|e| UnitStatus {
                name: e.name.clone(),
                state: UnitState::Missing {
                    applied_at: e.applied_at,
                },
            }),
    );

    statuses.sort_by(|a, b| a.name.cmp(&b.name));
    statuses
}
