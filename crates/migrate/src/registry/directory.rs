//! Directory registry - SQL migration files loaded from disk
//!
//! Each `*.sql` file in the migrations directory is one unit named after its
//! file stem (`001_create_users.sql` becomes `001_create_users`). A file holds
//! an `-- up` section and a `-- down` section; both markers are required.

use async_trait::async_trait;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use sqlx::PgPool;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{sorted_unique, UnitRegistry};
use crate::error::{DiscoveryError, MigrateResult};
use crate::unit::{Direction, MigrationAction, MigrationUnit};

/// Connection seam for running SQL migration bodies
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute the statements of one migration body as a single unit of work
    async fn execute_script(&self, statements: &[String]) -> anyhow::Result<()>;
}

#[async_trait]
impl SqlExecutor for PgPool {
    async fn execute_script(&self, statements: &[String]) -> anyhow::Result<()> {
        let mut transaction = self.begin().await?;

        for statement in statements {
            sqlx::query(statement).execute(&mut *transaction).await?;
        }

        transaction.commit().await?;
        Ok(())
    }
}

/// Action backed by the two SQL sections of a migration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    up: Vec<String>,
    down: Vec<String>,
}

impl SqlMigration {
    pub fn new(up: Vec<String>, down: Vec<String>) -> Self {
        Self { up, down }
    }

    pub fn up_statements(&self) -> &[String] {
        &self.up
    }

    pub fn down_statements(&self) -> &[String] {
        &self.down
    }
}

#[async_trait]
impl<C> MigrationAction<C> for SqlMigration
where
    C: SqlExecutor,
{
    async fn apply(&self, ctx: &C) -> anyhow::Result<()> {
        if self.up.is_empty() {
            return Ok(());
        }
        ctx.execute_script(&self.up).await
    }

    async fn revert(&self, ctx: &C) -> anyhow::Result<()> {
        if self.down.is_empty() {
            return Ok(());
        }
        ctx.execute_script(&self.down).await
    }
}

/// Registry that scans a directory of SQL migration files
#[derive(Debug, Clone)]
pub struct DirectoryRegistry {
    dir: PathBuf,
}

impl DirectoryRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Collect `(name, path)` for every SQL file, unsorted
    fn migration_files(&self) -> Result<Vec<(String, PathBuf)>, DiscoveryError> {
        if !self.dir.exists() {
            tracing::debug!("Migrations directory {} does not exist", self.dir.display());
            return Ok(Vec::new());
        }

        let io_error = |source| DiscoveryError::Io {
            path: self.dir.clone(),
            source,
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if !path.is_file() || path.extension().map_or(true, |ext| ext != "sql") {
                continue;
            }

            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .ok_or_else(|| DiscoveryError::Malformed {
                    path: path.clone(),
                    reason: "file name is not valid UTF-8".to_string(),
                })?
                .to_string();
            files.push((name, path));
        }

        Ok(files)
    }
}

impl<C> UnitRegistry<C> for DirectoryRegistry
where
    C: SqlExecutor + 'static,
{
    fn discover(&self) -> MigrateResult<Vec<MigrationUnit<C>>> {
        let mut units = Vec::new();

        for (name, path) in self.migration_files()? {
            let content = fs::read_to_string(&path).map_err(|source| DiscoveryError::Io {
                path: path.clone(),
                source,
            })?;
            let migration = parse_migration_file(&name, &path, &content)?;
            units.push(MigrationUnit::new(name, Arc::new(migration))?);
        }

        Ok(sorted_unique(units)?)
    }
}

/// Recognize `-- up` / `-- down` section markers
fn section_marker(line: &str) -> Option<Direction> {
    let comment = line.trim().strip_prefix("--")?;
    let normalized = comment.trim().trim_end_matches(':').to_lowercase();

    match normalized.as_str() {
        "up" | "up migration" => Some(Direction::Apply),
        "down" | "down migration" => Some(Direction::Revert),
        _ => None,
    }
}

/// Split a migration file into its up and down statements
pub fn parse_migration_file(
    name: &str,
    path: &Path,
    content: &str,
) -> Result<SqlMigration, DiscoveryError> {
    let malformed = |reason: String| DiscoveryError::Malformed {
        path: path.to_path_buf(),
        reason,
    };

    let mut up: Option<Vec<&str>> = None;
    let mut down: Option<Vec<&str>> = None;
    let mut current: Option<Direction> = None;

    for (index, line) in content.lines().enumerate() {
        if let Some(direction) = section_marker(line) {
            let section = match direction {
                Direction::Apply => &mut up,
                Direction::Revert => &mut down,
            };
            if section.is_some() {
                return Err(malformed(format!(
                    "{} section declared twice (line {})",
                    direction,
                    index + 1
                )));
            }
            *section = Some(Vec::new());
            current = Some(direction);
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }

        let section = match current {
            Some(Direction::Apply) => up.as_mut(),
            Some(Direction::Revert) => down.as_mut(),
            None => None,
        };
        match section {
            Some(lines) => lines.push(line),
            None => {
                return Err(malformed(format!(
                    "statement outside of an up/down section (line {})",
                    index + 1
                )))
            }
        }
    }

    let up = up.ok_or_else(|| DiscoveryError::MissingAction {
        name: name.to_string(),
        direction: Direction::Apply,
    })?;
    let down = down.ok_or_else(|| DiscoveryError::MissingAction {
        name: name.to_string(),
        direction: Direction::Revert,
    })?;

    Ok(SqlMigration::new(
        split_sql_statements(&up.join("\n")),
        split_sql_statements(&down.join("\n")),
    ))
}

/// Split SQL into individual statements using a real SQL parser
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    if sql.trim().is_empty() {
        return Vec::new();
    }

    match Parser::parse_sql(&PostgreSqlDialect {}, sql) {
        Ok(statements) => statements
            .into_iter()
            .map(|stmt| format!("{};", stmt))
            .collect(),
        Err(e) => {
            tracing::warn!("SQL parsing failed, using naive semicolon splitting: {}", e);
            sql.split(';')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| format!("{};", s))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingExecutor {
        scripts: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl SqlExecutor for RecordingExecutor {
        async fn execute_script(&self, statements: &[String]) -> anyhow::Result<()> {
            self.scripts.lock().push(statements.to_vec());
            Ok(())
        }
    }

    fn discover(dir: &TempDir) -> MigrateResult<Vec<MigrationUnit<RecordingExecutor>>> {
        DirectoryRegistry::new(dir.path()).discover()
    }

    #[test]
    fn test_parse_migration_sections() {
        let content = "-- Migration: users\n\
                       -- up\n\
                       CREATE TABLE users (id INT);\n\
                       CREATE INDEX users_id ON users (id);\n\
                       \n\
                       -- down\n\
                       DROP TABLE users;\n";

        let migration = parse_migration_file("001_users", Path::new("001_users.sql"), content).unwrap();
        assert_eq!(migration.up_statements().len(), 2);
        assert!(migration.up_statements()[0].starts_with("CREATE TABLE users"));
        assert_eq!(migration.down_statements().len(), 1);
        assert!(migration.down_statements()[0].starts_with("DROP TABLE users"));
    }

    #[test]
    fn test_parse_rejects_missing_down_section() {
        let content = "-- up\nCREATE TABLE users (id INT);\n";

        let err = parse_migration_file("001_users", Path::new("001_users.sql"), content).unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::MissingAction { direction: Direction::Revert, .. }
        ));
    }

    #[test]
    fn test_parse_rejects_statement_before_any_section() {
        let content = "CREATE TABLE users (id INT);\n-- up\n-- down\n";

        let err = parse_migration_file("001_users", Path::new("001_users.sql"), content).unwrap_err();
        assert!(matches!(err, DiscoveryError::Malformed { .. }));
    }

    #[test]
    fn test_update_comment_is_not_a_section_marker() {
        assert_eq!(section_marker("-- update the users table"), None);
        assert_eq!(section_marker("  -- Up migration"), Some(Direction::Apply));
        assert_eq!(section_marker("--down:"), Some(Direction::Revert));
    }

    #[test]
    fn test_split_falls_back_on_unparsable_sql() {
        let statements = split_sql_statements("THIS IS NOT SQL; NOR THIS");
        assert_eq!(statements, vec!["THIS IS NOT SQL;", "NOR THIS;"]);
    }

    #[test]
    fn test_missing_directory_discovers_nothing() {
        let registry = DirectoryRegistry::new("/nonexistent/rung/migrations");
        let units: Vec<MigrationUnit<RecordingExecutor>> = registry.discover().unwrap();
        assert!(units.is_empty());
    }

    #[test]
    fn test_discover_sorts_files_and_ignores_other_extensions() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("002_posts.sql"), "-- up\nCREATE TABLE posts (id INT);\n-- down\nDROP TABLE posts;\n").unwrap();
        fs::write(dir.path().join("001_users.sql"), "-- up\nCREATE TABLE users (id INT);\n-- down\nDROP TABLE users;\n").unwrap();
        fs::write(dir.path().join("README.md"), "not a migration").unwrap();

        let units = discover(&dir).unwrap();
        let names: Vec<_> = units.iter().map(|u| u.name()).collect();
        assert_eq!(names, vec!["001_users", "002_posts"]);
    }

    #[test]
    fn test_discover_rejects_file_without_sequence() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("users.sql"), "-- up\n-- down\n").unwrap();

        assert!(matches!(
            discover(&dir),
            Err(MigrateError::Discovery(DiscoveryError::InvalidName(name))) if name == "users"
        ));
    }

    #[tokio::test]
    async fn test_sql_unit_runs_statements_against_context() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("001_users.sql"), "-- up\nCREATE TABLE users (id INT);\n-- down\n").unwrap();

        let units = discover(&dir).unwrap();
        let executor = RecordingExecutor::default();

        units[0].run(Direction::Apply, &executor).await.unwrap();
        units[0].run(Direction::Revert, &executor).await.unwrap();

        let scripts = executor.scripts.lock();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0][0].starts_with("CREATE TABLE users"));
    }
}
