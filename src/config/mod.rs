use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_PAGE_SIZE: u32 = 10;
const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── ServerConfig ─────────────────────────────────────────────────────────────

/// HTTP listener configuration (`[server]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address. Default: 127.0.0.1 — local only unless overridden.
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: DEFAULT_PORT,
        }
    }
}

// ─── LoggingConfig ────────────────────────────────────────────────────────────

/// Log output configuration (`[logging]` in config.toml).
///
/// `level` takes a tracing filter string (`info`, `taskd=debug`, ...);
/// `format` is `compact` or `json`. RUST_LOG overrides `level` when set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

// ─── PaginationConfig ─────────────────────────────────────────────────────────

/// Listing page sizes (`[pagination]` in config.toml). Clients may override
/// `page_size` per request up to `max_page_size`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub page_size: u32,
    pub max_page_size: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

// ─── TaskdConfig ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TaskdConfig {
    /// Where the SQLite database lives. Default: ~/.taskd
    pub data_dir: Option<PathBuf>,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub pagination: PaginationConfig,
}

impl TaskdConfig {
    /// Load from a TOML file, or defaults when no file is given. Unknown keys
    /// are ignored; missing sections take their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("failed to parse config file {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

fn default_data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".taskd"),
        None => PathBuf::from(".taskd"),
    }
}
