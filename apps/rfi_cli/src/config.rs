use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "rfi.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    /// Base for artifact downloads; `api_url` when unset.
    pub download_url: Option<String>,
    pub database_url: String,
    pub user: String,
    pub reviewer: String,
    pub upload_user: String,
    pub upload_timeout_secs: u64,
    pub demo_fallback: bool,
    pub download_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".into(),
            download_url: None,
            database_url: default_database_url(),
            user: "Alice".into(),
            reviewer: "Bob".into(),
            upload_user: "RFP_Coordinator".into(),
            upload_timeout_secs: 3600,
            demo_fallback: false,
            download_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

impl Settings {
    pub fn download_url(&self) -> &str {
        self.download_url.as_deref().unwrap_or(&self.api_url)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

/// Keys accepted in `rfi.toml`. Everything is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    api_url: Option<String>,
    download_url: Option<String>,
    database_url: Option<String>,
    user: Option<String>,
    reviewer: Option<String>,
    upload_user: Option<String>,
    upload_timeout_secs: Option<u64>,
    demo_fallback: Option<bool>,
    download_dir: Option<PathBuf>,
}

/// Defaults, then the config file, then the environment. A missing default
/// file is fine; an explicitly named one must exist.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match config_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            apply_file(&mut settings, &raw)
                .with_context(|| format!("invalid config file '{}'", path.display()))?;
        }
        None => {
            if let Ok(raw) = fs::read_to_string(DEFAULT_CONFIG_FILE) {
                apply_file(&mut settings, &raw)
                    .with_context(|| format!("invalid config file '{DEFAULT_CONFIG_FILE}'"))?;
            }
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings.database_url = normalize_database_url(&settings.database_url);
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;

    if let Some(v) = file_cfg.api_url {
        settings.api_url = v;
    }
    if let Some(v) = file_cfg.download_url {
        settings.download_url = Some(v);
    }
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.user {
        settings.user = v;
    }
    if let Some(v) = file_cfg.reviewer {
        settings.reviewer = v;
    }
    if let Some(v) = file_cfg.upload_user {
        settings.upload_user = v;
    }
    if let Some(v) = file_cfg.upload_timeout_secs {
        settings.upload_timeout_secs = v;
    }
    if let Some(v) = file_cfg.demo_fallback {
        settings.demo_fallback = v;
    }
    if let Some(v) = file_cfg.download_dir {
        settings.download_dir = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("RFI_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = var("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = var("RFI_DOWNLOAD_URL") {
        settings.download_url = Some(v);
    }

    if let Some(v) = var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = var("RFI_DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = var("RFI_USER") {
        settings.user = v;
    }
    if let Some(v) = var("RFI_REVIEWER") {
        settings.reviewer = v;
    }
    if let Some(v) = var("RFI_UPLOAD_USER") {
        settings.upload_user = v;
    }

    if let Some(v) = var("RFI_UPLOAD_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.upload_timeout_secs = parsed;
        }
    }
    if let Some(v) = var("RFI_DEMO_FALLBACK") {
        if let Some(flag) = parse_flag(&v) {
            settings.demo_fallback = flag;
        }
    }
    if let Some(v) = var("RFI_DOWNLOAD_DIR") {
        settings.download_dir = PathBuf::from(v);
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_database_url() -> String {
    let path = dirs::data_dir()
        .map(|dir| dir.join("rfi-client").join("cache.db"))
        .unwrap_or_else(|| PathBuf::from("./data/rfi-cache.db"));
    normalize_database_url(&path.to_string_lossy())
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return default_database_url();
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
