//! Configuration file handling
//!
//! Settings live in `config.toml` under the platform config directory
//! (`$XDG_CONFIG_HOME/wealthindex` on Linux), or wherever
//! `WEALTHINDEX_CONFIG` points. A missing file means defaults.
//!
//! ```toml
//! database = "/home/me/finance/wealth.db"
//!
//! [index]
//! missing_price_policy = "report-daily"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::reports::{IndexSettings, MissingPricePolicy};

pub const CONFIG_ENV: &str = "WEALTHINDEX_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// SQLite database; `~/.wealthindex/data.db` when unset
    pub database: Option<PathBuf>,
    pub index: IndexConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    pub missing_price_policy: MissingPricePolicy,
}

impl Config {
    /// Location of the configuration file
    pub fn path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let config_dir = dir_spec::config_home()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("wealthindex").join("config.toml"))
    }

    /// Load the configuration file, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid config file {:?}", path))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Database path from the config, or the default location
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => crate::db::get_default_db_path(),
        }
    }

    pub fn index_settings(&self) -> IndexSettings {
        IndexSettings {
            missing_price_policy: self.index.missing_price_policy,
            reference_date: None,
        }
    }
}
