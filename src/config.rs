use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api;

const DEFAULT_ENV_PREFIX: &str = "POSTS_MANAGER";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    api::DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("posts-manager/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// Default filter for env_logger; `RUST_LOG` still wins.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, load_env(prefix));

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Layers `other` over `base`; fields left at their default in `other`
/// do not override.
fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.api.base_url.is_empty() && other.api.base_url != default_base_url() {
        base.api.base_url = other.api.base_url;
    }
    if !other.api.user_agent.is_empty() && other.api.user_agent != default_user_agent() {
        base.api.user_agent = other.api.user_agent;
    }
    if other.api.timeout != default_timeout() && !other.api.timeout.is_zero() {
        base.api.timeout = other.api.timeout;
    }

    if !other.log.level.is_empty() && other.log.level != default_log_level() {
        base.log.level = other.log.level;
    }

    base
}

fn load_env(prefix: &str) -> Config {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    let mut cfg = Config::default();
    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }
    cfg
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.base_url" => cfg.api.base_url = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = duration;
            }
        }
        "log.level" => cfg.log.level = value,
        _ => {}
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("posts-manager").join("config.yaml"))
}
