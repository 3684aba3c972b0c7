use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

use crate::chain::provider::Provider;

/// One `[profiles.<name>]` table.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub system: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<u64>,
    pub retries: Option<u32>,
    pub retry_delay: Option<u64>,
    pub output: Option<String>,
    pub show_usage: Option<bool>,
    /// Server for the Ollama provider.
    pub host: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    profiles: Option<HashMap<String, ProfileConfig>>,
}

fn read_config() -> Result<(PathBuf, ConfigFile), String> {
    let path = config_path()?;
    let raw = fs::read_to_string(&path)
        .map_err(|err| format!("Failed to read config file '{}': {err}", path.display()))?;

    let config: ConfigFile = toml::from_str(&raw)
        .map_err(|err| format!("Failed to parse config file '{}': {err}", path.display()))?;
    debug!(path = %path.display(), "config file loaded");
    Ok((path, config))
}

pub fn load_profile(name: &str) -> Result<ProfileConfig, String> {
    let (path, config) = read_config()?;

    let profiles = config.profiles.ok_or_else(|| {
        format!(
            "Config file '{}' does not contain a [profiles] section.",
            path.display()
        )
    })?;

    profiles.get(name).cloned().ok_or_else(|| {
        format!(
            "Profile '{}' not found in config file '{}'.",
            name,
            path.display()
        )
    })
}

/// Checks that the config file parses and, when `profile` is given, that the
/// profile exists and holds usable values. Returns the file's path.
pub fn validate_config(profile: Option<&str>) -> Result<PathBuf, String> {
    let (path, config) = read_config()?;
    let profiles = config.profiles.unwrap_or_default();

    let checked: Vec<(&String, &ProfileConfig)> = match profile {
        Some(name) => {
            let found = profiles.get_key_value(name).ok_or_else(|| {
                format!(
                    "Profile '{}' not found in config file '{}'.",
                    name,
                    path.display()
                )
            })?;
            vec![found]
        }
        None => profiles.iter().collect(),
    };

    for (name, values) in checked {
        validate_profile(values).map_err(|err| format!("Profile '{name}': {err}"))?;
    }
    Ok(path)
}

pub fn validate_profile(profile: &ProfileConfig) -> Result<(), String> {
    if let Some(provider) = &profile.provider {
        provider
            .parse::<Provider>()
            .map_err(|_| format!("Invalid profile provider '{provider}'."))?;
    }
    if let Some(temperature) = profile.temperature
        && !(0.0..=2.0).contains(&temperature)
    {
        return Err(format!(
            "Invalid profile temperature '{temperature}'. Expected a value between 0 and 2."
        ));
    }
    if let Some(output) = &profile.output
        && output != "text"
        && output != "json"
    {
        return Err(format!(
            "Invalid profile output '{output}'. Supported values: text, json."
        ));
    }
    Ok(())
}

pub fn config_path() -> Result<PathBuf, String> {
    if let Ok(path) = env::var("AXE_CONFIG") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed).join("llm-axe").join("config.toml"));
        }
    }

    let home = env::var("HOME").map_err(|_| {
        "Cannot resolve config path: set AXE_CONFIG or HOME/XDG_CONFIG_HOME.".to_string()
    })?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("llm-axe")
        .join("config.toml"))
}
