//! Optional config file loading. Search order: ./wtscrape.toml, then
//! $XDG_CONFIG_HOME/wtscrape/config.toml (or ~/.config/wtscrape/config.toml).

use serde::Deserialize;
use std::path::PathBuf;

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Default save root when --save-root is not set. Paths are relative to CWD.
    pub save_root: Option<PathBuf>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Fixed delay in seconds between listing-page fetches (default 5).
    pub page_delay_secs: Option<u64>,
    /// Politeness delay in seconds between any two HTTP requests (default 0).
    pub request_delay_secs: Option<u64>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Cooldown in seconds between series in a batch (default 120).
    pub series_cooldown_secs: Option<u64>,
    /// Cap on listing pages fetched per series.
    pub max_pages: Option<u32>,
    /// Default output format: "cbz" or "pdf".
    pub format: Option<String>,
}

/// Search order: (1) ./wtscrape.toml, (2) $XDG_CONFIG_HOME/wtscrape/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("wtscrape.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("wtscrape").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            let config: Config = toml::from_str(&s)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
            return Ok(Some(config));
        }
    }
    Ok(None)
}
