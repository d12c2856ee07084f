use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CardError, Result};

/// Tuning constants for the incremental card list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    /// Rows revealed on first load.
    pub initial_window: usize,
    /// Rows revealed per load-more trigger.
    pub growth_step: usize,
    /// Distance from the bottom of the content (host units, pixels on a
    /// graphical host) at which scrolling triggers load-more.
    pub load_more_threshold: f64,
    /// Trailing rows revealed past a freshly saved card.
    pub reveal_margin: usize,
    /// Upper bound on the best-effort payee load at mount.
    pub payee_timeout_ms: u64,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            initial_window: 100,
            growth_step: 50,
            load_more_threshold: 750.0,
            reveal_margin: 75,
            payee_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default)]
    pub list: ListConfig,
    #[serde(default = "default_tui_load_more_rows")]
    pub tui_load_more_rows: usize,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_tui_load_more_rows() -> usize {
    10
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            list: ListConfig::default(),
            tui_load_more_rows: default_tui_load_more_rows(),
            log_filter: default_log_filter(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("cardbook")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("cardbook")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| CardError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

pub fn db_path() -> PathBuf {
    get_data_dir().join("cardbook.db")
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
