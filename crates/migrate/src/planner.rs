//! Migration planner - decides exactly which units run, and in which order
//!
//! Planning is pure: it reads a sorted unit set and a ledger snapshot and
//! returns a [`Plan`] or an error, touching nothing. Every planning error is
//! therefore raised before the ledger could have been mutated.
//!
//! Apply takes pending units in ascending name order. A pending unit whose
//! name sorts below the highest applied name is *out of order*; unless the
//! request allows it, such a unit is skipped (reported, not an error).
//!
//! Revert walks the ledger's application history backwards, so units are
//! undone in the reverse of the order they actually ran, not the reverse of
//! name order. Reverting while out-of-order applies are allowed is refused.

use std::collections::HashSet;

use crate::error::{MigrateError, MigrateResult};
use crate::ledger::AppliedState;
use crate::unit::{Direction, MigrationUnit};

/// What the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationRequest {
    pub direction: Direction,
    /// Maximum number of units to act on; `0` means all eligible units
    pub limit: usize,
    /// Update the ledger without running unit actions
    pub fake: bool,
    /// Permit applying pending units that sort below the highest applied one
    pub allow_out_of_order: bool,
}

impl MigrationRequest {
    pub fn apply(limit: usize) -> Self {
        Self {
            direction: Direction::Apply,
            limit,
            fake: false,
            allow_out_of_order: false,
        }
    }

    pub fn revert(limit: usize) -> Self {
        Self {
            direction: Direction::Revert,
            ..Self::apply(limit)
        }
    }

    pub fn fake(mut self, fake: bool) -> Self {
        self.fake = fake;
        self
    }

    pub fn allow_out_of_order(mut self, allow: bool) -> Self {
        self.allow_out_of_order = allow;
        self
    }
}

/// One step of a plan
#[derive(Debug, Clone)]
pub struct PlanStep<C> {
    pub unit: MigrationUnit<C>,
    pub direction: Direction,
}

/// Ordered steps for a single invocation
#[derive(Debug, Clone)]
pub struct Plan<C> {
    direction: Direction,
    steps: Vec<PlanStep<C>>,
    skipped_out_of_order: Vec<String>,
    missing: Vec<String>,
}

impl<C> Plan<C> {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            steps: Vec::new(),
            skipped_out_of_order: Vec::new(),
            missing: Vec::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn steps(&self) -> &[PlanStep<C>] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<PlanStep<C>> {
        self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Unit names in execution order
    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.unit.name()).collect()
    }

    /// Pending units left out because they are out of order
    pub fn skipped_out_of_order(&self) -> &[String] {
        &self.skipped_out_of_order
    }

    /// Applied names that no discoverable unit matches
    pub fn missing(&self) -> &[String] {
        &self.missing
    }
}

/// Compute the plan for `request`
///
/// `units` must be sorted ascending by name, as every registry returns them.
pub fn plan<C>(
    units: &[MigrationUnit<C>],
    applied: &AppliedState,
    request: &MigrationRequest,
) -> MigrateResult<Plan<C>> {
    match request.direction {
        Direction::Apply => Ok(plan_apply(units, applied, request)),
        Direction::Revert => plan_revert(units, applied, request),
    }
}

fn plan_apply<C>(
    units: &[MigrationUnit<C>],
    applied: &AppliedState,
    request: &MigrationRequest,
) -> Plan<C> {
    let mut plan = Plan::new(Direction::Apply);

    let known: HashSet<&str> = units.iter().map(|u| u.name()).collect();
    plan.missing = applied
        .in_order()
        .iter()
        .filter(|name| !known.contains(name.as_str()))
        .cloned()
        .collect();

    let highest = applied.highest();
    let mut eligible = Vec::new();

    for unit in units.iter().filter(|u| !applied.contains(u.name())) {
        let out_of_order = highest.map_or(false, |highest| unit.name() < highest);
        if out_of_order && !request.allow_out_of_order {
            plan.skipped_out_of_order.push(unit.name().to_string());
            continue;
        }
        eligible.push(unit);
    }

    let take = if request.limit == 0 {
        eligible.len()
    } else {
        request.limit
    };

    plan.steps = eligible
        .into_iter()
        .take(take)
        .map(|unit| PlanStep {
            unit: unit.clone(),
            direction: Direction::Apply,
        })
        .collect();
    plan
}

fn plan_revert<C>(
    units: &[MigrationUnit<C>],
    applied: &AppliedState,
    request: &MigrationRequest,
) -> MigrateResult<Plan<C>> {
    if request.allow_out_of_order {
        return Err(MigrateError::OutOfOrderRevert);
    }

    let history = applied.in_order();
    let take = if request.limit == 0 {
        history.len()
    } else {
        request.limit.min(history.len())
    };

    let mut plan = Plan::new(Direction::Revert);
    for name in history.iter().rev().take(take) {
        let unit = units
            .binary_search_by(|unit| unit.name().cmp(name.as_str()))
            .map(|index| &units[index])
            .map_err(|_| MigrateError::UnresolvedUnit { name: name.clone() })?;

        plan.steps.push(PlanStep {
            unit: unit.clone(),
            direction: Direction::Revert,
        });
    }

    Ok(plan)
}
