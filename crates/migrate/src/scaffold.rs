//! Project scaffolding - `init` and new migration files

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{ProjectConfig, CONFIG_FILE};
use crate::error::{MigrateError, MigrateResult};
use crate::unit::parse_sequence;

const MIN_PREFIX_WIDTH: usize = 3;

/// Create the config file and migrations directory under `root`
///
/// Existing files are left alone, so running this twice is harmless.
/// Returns the paths that were created.
pub fn init_project(root: &Path) -> MigrateResult<Vec<PathBuf>> {
    let mut created = Vec::new();

    let config_path = root.join(CONFIG_FILE);
    let config = if config_path.exists() {
        ProjectConfig::load(&config_path)?
    } else {
        let config = ProjectConfig::default();
        fs::write(&config_path, config.to_yaml()?)?;
        created.push(config_path);
        config
    };

    let migrations_dir = root.join(&config.migrations_dir);
    if !migrations_dir.exists() {
        fs::create_dir_all(&migrations_dir)?;
        created.push(migrations_dir);
    }

    Ok(created)
}

/// Write a new migration file named after the next free sequence number
pub fn create_migration(dir: &Path, name: &str) -> MigrateResult<PathBuf> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(MigrateError::Config(format!(
            "'{}' cannot be used as a migration name",
            name
        )));
    }

    fs::create_dir_all(dir)?;

    let (sequence, width) = next_sequence(dir)?;
    let migration_name = format!("{:0width$}_{}", sequence, slug, width = width);
    if sequence.to_string().len() > width {
        return Err(MigrateError::Config(format!(
            "sequence {} does not fit the existing {}-digit prefixes; \
             '{}' would sort before older migrations",
            sequence, width, migration_name
        )));
    }
    let path = dir.join(format!("{}.sql", migration_name));

    fs::write(&path, migration_template(name, &migration_name))?;
    tracing::debug!("Created migration file {}", path.display());
    Ok(path)
}

/// One past the highest sequence among existing migration files, plus the
/// prefix width new names must be padded to
///
/// Units sort by full name, so every prefix has to share one width.
fn next_sequence(dir: &Path) -> MigrateResult<(u64, usize)> {
    let mut highest = 0;
    let mut width = MIN_PREFIX_WIDTH;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map_or(true, |ext| ext != "sql") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if let Ok(sequence) = parse_sequence(stem) {
            highest = highest.max(sequence);
            let digits = stem.chars().take_while(|c| c.is_ascii_digit()).count();
            width = width.max(digits);
        }
    }
    Ok((highest + 1, width))
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

fn migration_template(name: &str, migration_name: &str) -> String {
    format!(
        "-- Migration: {}\n\
         -- Name: {}\n\
         -- Created: {}\n\n\
         -- up\n\n\n\
         -- down\n\n",
        name,
        migration_name,
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}
