use anyhow::Context;
use rung_migrate::{
    create_migration, init_project, DirectoryRegistry, Direction, MigrationRequest, Migrator,
    PgLedger, ProjectConfig, RunReport, UnitState,
};
use sqlx::postgres::PgPoolOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolved settings shared by every command
pub struct Settings {
    pub root: PathBuf,
    pub config: ProjectConfig,
    pub database_url: Option<String>,
}

impl Settings {
    pub fn load(config_path: &Path, database_url: Option<String>) -> anyhow::Result<Self> {
        let config = ProjectConfig::load(config_path)
            .with_context(|| format!("failed to load {}", config_path.display()))?;
        let root = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        debug!(
            config = %config_path.display(),
            root = %root.display(),
            migrations_dir = %config.migrations_dir.display(),
            ledger_table = %config.ledger_table,
            "Loaded project configuration"
        );

        Ok(Self {
            root,
            config,
            database_url,
        })
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.root.join(&self.config.migrations_dir)
    }

    async fn migrator(&self) -> anyhow::Result<Migrator<sqlx::PgPool, PgLedger>> {
        let url = self.config.database_url(self.database_url.as_deref())?;

        // a single connection keeps every step and ledger write on one session
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .context("failed to connect to database")?;
        debug!("Connected to database");

        let ledger = PgLedger::new(pool.clone(), self.config.ledger_table.clone())?;
        Ok(Migrator::new(
            pool,
            DirectoryRegistry::new(self.migrations_dir()),
            ledger,
        ))
    }
}

pub async fn init(root: &Path) -> anyhow::Result<()> {
    let created = init_project(root)?;

    if created.is_empty() {
        println!("Project already initialized");
    }
    for path in created {
        println!("Created {}", path.display());
    }
    Ok(())
}

pub async fn create(settings: &Settings, name: &str) -> anyhow::Result<()> {
    let path = create_migration(&settings.migrations_dir(), name)?;
    println!("Created migration: {}", path.display());
    Ok(())
}

/// Apply or revert migrations; returns whether anything ran
pub async fn run(settings: &Settings, request: MigrationRequest) -> anyhow::Result<bool> {
    let migrator = settings.migrator().await?;
    let report = migrator.execute(&request).await?;
    print_report(&report);
    Ok(report.did_work())
}

fn print_report(report: &RunReport) {
    for name in &report.skipped_out_of_order {
        println!("  skipped  {} (out of order, use --allow-out-of-order)", name);
    }
    for name in &report.missing {
        println!("  missing  {} (recorded but not found on disk)", name);
    }

    if !report.did_work() {
        println!("Nothing to do");
        return;
    }

    let verb = match report.direction {
        Direction::Apply => "applied",
        Direction::Revert => "reverted",
    };
    for name in &report.executed {
        println!("  {:<8} {}", verb, name);
    }
    println!(
        "{} migration(s) {}{}",
        report.executed.len(),
        verb,
        if report.fake { " (fake)" } else { "" }
    );
}

pub async fn status(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let migrator = settings.migrator().await?;
    let statuses = migrator.status().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    println!("Migration Status:");
    println!("================");
    if statuses.is_empty() {
        println!("No migrations found");
        return Ok(());
    }

    for status in &statuses {
        let label = match status.state {
            UnitState::Applied { .. } => "applied",
            UnitState::Pending => "pending",
            UnitState::OutOfOrder => "out-of-order",
            UnitState::Missing { .. } => "missing",
        };
        println!("  {:<12} {}", label, status.name);
    }
    Ok(())
}
