//! Configuration file loading.
//!
//! One TOML file describes the global tuning knobs and every vault with
//! its routing tables. Route tables deserialize into ordered `Vec`s so
//! first-match-wins semantics survive the round trip.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use taskbridge_core::domain::constants::{DEFAULT_DAYS_TOLERANCE, DEFAULT_MIN_SCORE};
use taskbridge_core::{ListId, ListRoute, TagRoute, VaultRoutes};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },

    #[error("no vault named '{0}' in configuration")]
    UnknownVault(String),

    #[error("configuration defines no vaults")]
    NoVaults,

    #[error("--vault is required when more than one vault is configured")]
    AmbiguousVault,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Global tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub min_score: f64,
    pub days_tolerance: i64,
    pub include_completed: bool,
    pub enable_deduplication: bool,
    pub dedup_auto_apply: bool,
    /// Seconds a single gateway invocation may take.
    pub gateway_timeout_secs: u64,
    /// Where link files live; defaults to the platform data directory.
    pub state_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            days_tolerance: DEFAULT_DAYS_TOLERANCE,
            include_completed: false,
            enable_deduplication: true,
            dedup_auto_apply: false,
            gateway_timeout_secs: 300,
            state_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagRouteConfig {
    pub tag: String,
    pub list_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListRouteConfig {
    pub list_name: String,
    pub target_file: String,
    #[serde(default)]
    pub heading: Option<String>,
}

/// One configured vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub path: PathBuf,
    #[serde(default)]
    pub default_list_id: Option<String>,
    #[serde(default = "default_inbox_file")]
    pub inbox_file: String,
    #[serde(default)]
    pub tag_routes: Vec<TagRouteConfig>,
    #[serde(default)]
    pub list_routes: Vec<ListRouteConfig>,
}

fn default_inbox_file() -> String {
    "Inbox.md".to_string()
}

impl VaultConfig {
    /// The routing table handed to the engine.
    pub fn routes(&self) -> VaultRoutes {
        VaultRoutes {
            default_list_id: self.default_list_id.as_deref().map(ListId::from),
            inbox_file: self.inbox_file.clone(),
            tag_routes: self
                .tag_routes
                .iter()
                .map(|r| TagRoute {
                    tag: r.tag.clone(),
                    list_id: ListId::from(r.list_id.as_str()),
                })
                .collect(),
            list_routes: self
                .list_routes
                .iter()
                .map(|r| ListRoute {
                    list_name: r.list_name.clone(),
                    target_file: r.target_file.clone(),
                    heading: r.heading.clone(),
                })
                .collect(),
        }
    }

    /// The link file for this vault under `state_dir`.
    pub fn links_path(&self, state_dir: &Path) -> PathBuf {
        state_dir.join(format!("links-{}.json", self.id))
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub settings: Settings,
    pub vaults: Vec<VaultConfig>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }

    /// The default config location: `<config dir>/taskbridge/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("taskbridge")
            .join("config.toml")
    }

    /// The directory link files live in.
    pub fn state_dir(&self) -> PathBuf {
        self.settings.state_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("taskbridge")
        })
    }

    /// Selects a vault by id or display name; `None` is accepted when
    /// exactly one vault is configured.
    pub fn select_vault(&self, name: Option<&str>) -> Result<&VaultConfig> {
        match name {
            Some(name) => self
                .vaults
                .iter()
                .find(|v| v.id == name || v.name.as_deref() == Some(name))
                .ok_or_else(|| ConfigError::UnknownVault(name.to_string())),
            None => match self.vaults.as_slice() {
                [] => Err(ConfigError::NoVaults),
                [only] => Ok(only),
                _ => Err(ConfigError::AmbiguousVault),
            },
        }
    }
}
