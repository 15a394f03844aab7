//! Configuration loading

use super::schema::Config;
use super::validate::validate_config;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

const CONFIG_FILE: &str = "config.json";
const ENV_PREFIX: &str = "NOTION_AGENT__";

/// Reads `config.json` from a directory and layers the environment on top
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Loader for `~/.notion-agent`
    pub fn new() -> Self {
        let config_dir = dirs::home_dir()
            .map(|h| h.join(".notion-agent"))
            .unwrap_or_else(|| PathBuf::from(".notion-agent"));
        Self { config_dir }
    }

    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            config_dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Load, apply environment overrides and validate.
    ///
    /// Missing sections and fields take their serde defaults, so a partial
    /// file (or no file at all) is valid.
    pub fn load(&self) -> Result<Config> {
        let path = self.config_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
        } else {
            Config::default()
        };

        apply_env(&mut config, std::env::vars())?;
        validate_config(&config)?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Apply credential aliases, then `NOTION_AGENT__SECTION__KEY` overrides.
fn apply_env(config: &mut Config, vars: impl Iterator<Item = (String, String)>) -> Result<()> {
    let mut overrides = Vec::new();
    for (key, value) in vars {
        match key.as_str() {
            "GOOGLE_API_KEY" => config.provider.api_key = value,
            "NOTION_TOKEN" => config.notion.token = value,
            _ => {
                if let Some(path) = key.strip_prefix(ENV_PREFIX) {
                    overrides.push((path.to_ascii_lowercase(), value));
                }
            }
        }
    }
    for (path, value) in overrides {
        set_field(config, &path, value)?;
    }
    Ok(())
}

fn set_field(config: &mut Config, path: &str, value: String) -> Result<()> {
    match path {
        "agent__app_name" => config.agent.app_name = value,
        "agent__user_id" => config.agent.user_id = value,
        "agent__name" => config.agent.name = value,
        "agent__model" => config.agent.model = value,
        "agent__max_tokens" => config.agent.max_tokens = parse(path, &value)?,
        "agent__temperature" => config.agent.temperature = parse(path, &value)?,
        "agent__max_tool_iterations" => config.agent.max_tool_iterations = parse(path, &value)?,
        "agent__streaming" => config.agent.streaming = parse(path, &value.to_ascii_lowercase())?,
        "agent__instruction" => config.agent.instruction = Some(value),
        "provider__api_base" => config.provider.api_base = value,
        "provider__api_key" => config.provider.api_key = value,
        "notion__url" => config.notion.url = value,
        "notion__token" => config.notion.token = value,
        "notion__timeout_secs" => config.notion.timeout_secs = parse(path, &value)?,
        "logging__level" => config.logging.level = value,
        "logging__format" => config.logging.format = value,
        "logging__dir" => config.logging.dir = value,
        _ => {
            if let Some(module) = path.strip_prefix("logging__overrides__") {
                config.logging.overrides.insert(module.to_string(), value);
            } else {
                warn!("Ignoring unknown override {}{}", ENV_PREFIX, path.to_ascii_uppercase());
            }
        }
    }
    Ok(())
}

fn parse<T>(path: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| {
        Error::Config(format!(
            "{}{}={}: {}",
            ENV_PREFIX,
            path.to_ascii_uppercase(),
            raw,
            e
        ))
    })
}
