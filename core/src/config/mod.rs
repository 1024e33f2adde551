use crate::agent::LoopLimits;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const BASEBONE_DIR: &str = ".basebone";
const SEARCH_API_KEY_VARS: &[&str] = &["SERPAPI_API_KEY", "BASEBONE_SERPAPI_API_KEY"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    pub enabled: bool,
    pub api_key: String,
    pub base_url: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            base_url: None,
        }
    }
}

impl SearchConfig {
    /// Environment first, then the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        SEARCH_API_KEY_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|key| !key.trim().is_empty())
            .or_else(|| (!self.api_key.is_empty()).then(|| self.api_key.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub max_iterations: usize,
    pub model_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    pub loop_timeout_secs: u64,
    /// Replaces the built-in prompt template at startup.
    pub prompt_template: Option<String>,
    /// Slack user ids allowed to use `+prompt`. Empty means everyone.
    pub allowed_prompt_editors: Vec<String>,
    pub search: SearchConfig,
}

impl Default for Config {
    fn default() -> Self {
        let limits = LoopLimits::default();
        Config {
            provider: None,
            api_key: String::new(),
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 256,
            max_iterations: limits.max_iterations,
            model_timeout_secs: limits.model_timeout.as_secs(),
            tool_timeout_secs: limits.tool_timeout.as_secs(),
            loop_timeout_secs: limits.total_timeout.as_secs(),
            prompt_template: None,
            allowed_prompt_editors: Vec::new(),
            search: SearchConfig::default(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        if config_exists() {
            load_config()
        } else {
            Ok(Config::default())
        }
    }

    pub fn limits(&self) -> LoopLimits {
        LoopLimits {
            max_iterations: self.max_iterations.max(1),
            model_timeout: Duration::from_secs(self.model_timeout_secs.max(1)),
            tool_timeout: Duration::from_secs(self.tool_timeout_secs.max(1)),
            total_timeout: Duration::from_secs(self.loop_timeout_secs.max(1)),
        }
    }
}

pub fn get_basebone_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(BASEBONE_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_basebone_dir().join("config.toml")
}

pub fn ensure_basebone_dir() -> Result<PathBuf> {
    let dir = get_basebone_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory at {}", dir.display()))?;
    }

    Ok(dir)
}

pub fn load_config() -> Result<Config> {
    load_from(&get_config_path())
}

pub fn load_from(config_path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(config_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!(
                "Config file not found at {}. Run 'basebone onboard' to set up your configuration.",
                config_path.display()
            )
        } else {
            anyhow::anyhow!("Failed to read config from {}: {}", config_path.display(), e)
        }
    })?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", config_path.display()))
}

pub fn save_config(config: &Config) -> Result<()> {
    ensure_basebone_dir()?;
    save_to(config, &get_config_path())
}

pub fn save_to(config: &Config, config_path: &Path) -> Result<()> {
    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(config_path, content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    Ok(())
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}
