//! Project configuration loaded from `rung.yaml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MigrateError, MigrateResult};

/// Default configuration file name
pub const CONFIG_FILE: &str = "rung.yaml";

/// Migration project configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Directory holding the migration files
    pub migrations_dir: PathBuf,
    /// Table used as the ledger
    pub ledger_table: String,
    /// Environment variable holding the database URL
    pub database_url_env: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            ledger_table: "rung_migrations".to_string(),
            database_url_env: "DATABASE_URL".to_string(),
        }
    }
}

impl ProjectConfig {
    /// Load from a YAML file; a missing file yields the defaults
    pub fn load(path: &Path) -> MigrateResult<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MigrateResult<()> {
        validate_identifier(&self.ledger_table)?;
        if self.database_url_env.trim().is_empty() {
            return Err(MigrateError::Config(
                "database_url_env must name an environment variable".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the database URL, preferring an explicit override
    pub fn database_url(&self, explicit: Option<&str>) -> MigrateResult<String> {
        if let Some(url) = explicit {
            return Ok(url.to_string());
        }
        std::env::var(&self.database_url_env).map_err(|_| {
            MigrateError::Config(format!(
                "no database URL given and {} is not set",
                self.database_url_env
            ))
        })
    }

    pub fn to_yaml(&self) -> MigrateResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Ensure a table name is a plain SQL identifier
pub fn validate_identifier(name: &str) -> MigrateResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid && name.len() <= 63 {
        Ok(())
    } else {
        Err(MigrateError::Config(format!(
            "'{}' is not a valid table name",
            name
        )))
    }
}
