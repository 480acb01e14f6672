//! Typed application configuration.
//!
//! The configuration is loaded from TOML into [`AppConfig`]. The report does
//! not walk the typed struct directly: [`AppConfig::to_tree`] serializes it
//! into a string-keyed tree, which the configuration section flattens to two
//! levels. Secrets (`database.password`) never reach the tree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ConfigError;
use crate::gate::DEFAULT_ADMIN_PREFIX;
use crate::memory::parse_memory_limit;

/// Whole-application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Whether the installer has completed. Most services are skipped otherwise.
    pub installed: bool,
    pub application: ApplicationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<LoggerConfig>,
    /// Sections this crate does not know about, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Enables diagnostics reporting and the store-backed translator.
    pub debug: bool,
    pub base_url: String,
    /// Absolute application root; stripped from paths in the report.
    pub root_path: String,
    /// Memory ceiling as an integer count of megabytes, e.g. `"128M"`.
    pub memory_limit: String,
    /// Directory holding `<locale>.json` language files.
    pub languages_dir: PathBuf,
    /// Controllers whose name starts with this prefix belong to the admin area.
    pub admin_prefix: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            debug: false,
            base_url: "/".to_string(),
            root_path: String::new(),
            memory_limit: "128M".to_string(),
            languages_dir: PathBuf::from("var/languages"),
            admin_prefix: DEFAULT_ADMIN_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub adapter: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub dbname: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            adapter: "mysql".to_string(),
            host: "localhost".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: String::new(),
            dbname: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub adapter: String,
    /// Default entry lifetime in seconds.
    pub lifetime: u64,
    pub prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            adapter: "memory".to_string(),
            lifetime: 86_400,
            prefix: "eye_".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggerConfig {
    pub enabled: bool,
    pub path: String,
    pub format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            installed: true,
            application: ApplicationConfig::default(),
            database: None,
            cache: None,
            logger: None,
            extra: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Memory ceiling in bytes, derived from `application.memory_limit`.
    ///
    /// Malformed values yield 0; negative values are passed through.
    pub fn memory_limit_bytes(&self) -> i64 {
        parse_memory_limit(&self.application.memory_limit)
    }

    /// Serializes the configuration into a string-keyed tree.
    pub fn to_tree(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => {
                warn!(error = %e, "failed to serialize configuration tree");
                Map::new()
            }
        }
    }
}
