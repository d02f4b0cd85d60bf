//! Plan executor - runs plan steps one at a time and keeps the ledger in step
//!
//! A step's ledger mutation happens only after its action succeeded, so a
//! failed run leaves the ledger describing exactly the steps that completed.

use crate::error::{MigrateError, MigrateResult};
use crate::ledger::LedgerStore;
use crate::planner::Plan;
use crate::unit::Direction;

/// Executes plans against a context and a ledger
pub struct Executor<'a, C, L: ?Sized> {
    context: &'a C,
    ledger: &'a L,
}

impl<'a, C, L> Executor<'a, C, L>
where
    C: Sync,
    L: LedgerStore + ?Sized,
{
    pub fn new(context: &'a C, ledger: &'a L) -> Self {
        Self { context, ledger }
    }

    /// Run every step of `plan` in order
    ///
    /// Returns `Ok(false)` for an empty plan and `Ok(true)` once all steps
    /// completed. In fake mode the ledger is updated but no action runs.
    pub async fn run(&self, plan: Plan<C>, fake: bool) -> MigrateResult<bool> {
        if plan.is_empty() {
            tracing::info!("Nothing to {}", plan.direction());
            return Ok(false);
        }

        for step in plan.into_steps() {
            let name = step.unit.name();

            if fake {
                tracing::info!(unit = name, direction = %step.direction, fake = true, "Faking migration");
            } else {
                tracing::info!(unit = name, direction = %step.direction, "Running migration");
                step.unit
                    .run(step.direction, self.context)
                    .await
                    .map_err(|source| MigrateError::Action {
                        name: name.to_string(),
                        direction: step.direction,
                        source,
                    })?;
            }

            match step.direction {
                Direction::Apply => self.ledger.record(name).await?,
                Direction::Revert => self.ledger.erase(name).await?,
            }
        }

        Ok(true)
    }
}
