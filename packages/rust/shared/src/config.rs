//! Application configuration for Folio.
//!
//! User config lives at `~/.folio/folio.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FolioError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "folio.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".folio";

// ---------------------------------------------------------------------------
// Config structs (matching folio.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database location.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Service tuning knobs.
    #[serde(default)]
    pub service: ServiceSettings,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Origins allowed by the CORS layer. `"*"` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_allowed_origins: default_cors_origins(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".into()
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the libSQL database file. `~` expands to the home directory.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.folio/folio.db".into()
}

/// `[service]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Page size for article listings when the client sends none.
    #[serde(default = "default_article_page_size")]
    pub article_page_size: u32,

    /// Page size for category listings when the client sends none.
    #[serde(default = "default_category_page_size")]
    pub category_page_size: u32,

    /// Upper bound on numbered slug candidates tried before giving up.
    #[serde(default = "default_max_slug_attempts")]
    pub max_slug_attempts: u32,

    /// Maximum concurrent author lookups per listing.
    #[serde(default = "default_author_lookup_concurrency")]
    pub author_lookup_concurrency: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            article_page_size: default_article_page_size(),
            category_page_size: default_category_page_size(),
            max_slug_attempts: default_max_slug_attempts(),
            author_lookup_concurrency: default_author_lookup_concurrency(),
        }
    }
}

fn default_article_page_size() -> u32 {
    100
}
fn default_category_page_size() -> u32 {
    10
}
fn default_max_slug_attempts() -> u32 {
    100
}
fn default_author_lookup_concurrency() -> usize {
    8
}

// ---------------------------------------------------------------------------
// Service config (runtime, derived from the file config)
// ---------------------------------------------------------------------------

/// Runtime service configuration handed to the article and category services.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub article_page_size: u32,
    pub category_page_size: u32,
    pub max_slug_attempts: u32,
    /// Always at least 1.
    pub author_lookup_concurrency: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ServiceConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            article_page_size: config.service.article_page_size.max(1),
            category_page_size: config.service.category_page_size.max(1),
            max_slug_attempts: config.service.max_slug_attempts,
            author_lookup_concurrency: config.service.author_lookup_concurrency.max(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.folio/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| FolioError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.folio/folio.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FolioError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| FolioError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| FolioError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content = toml::to_string_pretty(&config).map_err(|e| FolioError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| FolioError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` in a configured path to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| FolioError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}
