//! # rung-migrate: ordered, ledger-tracked schema migrations
//!
//! Migration units are discovered from a [`UnitRegistry`], the units already
//! applied are read from a [`LedgerStore`], and the [`planner`] computes the
//! exact steps to run for an apply or revert request. The [`Executor`] then
//! runs those steps one by one, recording each in the ledger as it completes.
//!
//! ```rust,no_run
//! use rung_migrate::{DirectoryRegistry, MigrationRequest, Migrator, PgLedger};
//!
//! # async fn example() -> rung_migrate::MigrateResult<()> {
//! let pool = sqlx::PgPool::connect("postgres://localhost/app").await?;
//! let ledger = PgLedger::new(pool.clone(), "rung_migrations")?;
//! let migrator = Migrator::new(pool, DirectoryRegistry::new("migrations"), ledger);
//!
//! if !migrator.run(&MigrationRequest::apply(0)).await? {
//!     println!("Nothing to do");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod migrator;
pub mod planner;
pub mod registry;
pub mod scaffold;
pub mod unit;

pub use config::*;
pub use error::*;
pub use executor::*;
pub use ledger::*;
pub use migrator::*;
pub use planner::{MigrationRequest, Plan, PlanStep};
pub use registry::*;
pub use scaffold::*;
pub use unit::*;
