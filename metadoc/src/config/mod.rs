use crate::bootstrap::SeedOptions;
use crate::error::{MetadocError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_DATABASE: &str = "METADOC_DATABASE";
pub const ENV_SEED: &str = "METADOC_SEED";
pub const ENV_CONFIG: &str = "METADOC_CONFIG";

/// Store settings, read from `metadoc.yaml` and overridden by environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    pub database: PathBuf,
    /// Create the built-in Role/User doctypes and default records on open
    pub seed: bool,
    /// bcrypt cost for seeded passwords
    pub password_cost: u32,
    pub admin_password: String,
    pub guest_password: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            database: PathBuf::from("metadoc.db"),
            seed: true,
            password_cost: bcrypt::DEFAULT_COST,
            admin_password: "admin123".to_string(),
            guest_password: "guest123".to_string(),
        }
    }
}

impl StoreConfig {
    /// Load with priority: env vars > config file > defaults.
    ///
    /// The file is `config_path` if given, else `$METADOC_CONFIG`, else
    /// `metadoc.yaml` in the working directory. A missing file is not an
    /// error.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(ENV_CONFIG).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("metadoc.yaml"));

        let mut config = if path.exists() {
            log::debug!("Reading config from {}", path.display());
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        // An empty file deserializes to null rather than an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply `METADOC_DATABASE` and `METADOC_SEED` from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(database) = lookup(ENV_DATABASE) {
            self.database = PathBuf::from(database);
        }
        if let Some(seed) = lookup(ENV_SEED) {
            self.seed = parse_flag(ENV_SEED, &seed)?;
        }
        Ok(())
    }

    pub fn seed_options(&self) -> SeedOptions {
        SeedOptions {
            password_cost: self.password_cost,
            admin_password: self.admin_password.clone(),
            guest_password: self.guest_password.clone(),
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(MetadocError::Validation(format!(
            "{key} must be a boolean flag, got '{other}'"
        ))),
    }
}
