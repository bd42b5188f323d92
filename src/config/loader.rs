use std::path::{Path, PathBuf};

use crate::config::types::AgentpadConfig;
use crate::error::{AgentpadError, Result};

pub const ENV_ACCOUNT_ID: &str = "AGENTPAD_ACCOUNT_ID";
pub const ENV_PRIVATE_KEY: &str = "AGENTPAD_PRIVATE_KEY";
pub const ENV_API_KEY: &str = "AGENTPAD_API_KEY";

/// Get the default configuration file path
pub fn get_config_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "agentpad", "agentpad") {
        proj_dirs.config_dir().join("config.toml")
    } else {
        // Fallback to home directory
        dirs_fallback().join(".agentpad").join("config.toml")
    }
}

fn dirs_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(config_path: Option<&Path>) -> Result<AgentpadConfig> {
    let path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(get_config_path);

    if !path.exists() {
        // Return defaults if no config file exists
        return Ok(AgentpadConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config: AgentpadConfig =
        toml::from_str(&content).map_err(|e| AgentpadError::TomlParse(e.to_string()))?;

    Ok(config)
}

/// Get the data directory for output tab history
pub fn get_data_dir() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "agentpad", "agentpad") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs_fallback().join(".local").join("share").join("agentpad")
    }
}

/// The three credential values scripts see through `getConfig()`.
///
/// Resolved once at startup and injected everywhere they are needed;
/// nothing reads the process environment after this point and nothing
/// writes the resolution back to the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub account_id: String,
    pub private_key: String,
    pub api_key: String,
}

impl ResolvedCredentials {
    /// Precedence per field: config file value, then process environment,
    /// then empty string.
    pub fn resolve(config: &AgentpadConfig) -> Self {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    /// Same as [`resolve`](Self::resolve) with an injectable environment
    /// lookup, so tests never mutate the real process environment.
    pub fn resolve_with<F>(config: &AgentpadConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |file_value: &str, env_name: &str| -> String {
            if !file_value.is_empty() {
                return file_value.to_string();
            }
            lookup(env_name).unwrap_or_default()
        };

        Self {
            account_id: pick(&config.credentials.account_id, ENV_ACCOUNT_ID),
            private_key: pick(&config.credentials.private_key, ENV_PRIVATE_KEY),
            api_key: pick(&config.credentials.api_key, ENV_API_KEY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::AgentpadConfig;

    fn env_of<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn file_value_wins_over_environment() {
        let mut config = AgentpadConfig::default();
        config.credentials.account_id = "0.0.42".to_string();

        let resolved = ResolvedCredentials::resolve_with(
            &config,
            env_of(&[(ENV_ACCOUNT_ID, "0.0.99"), (ENV_API_KEY, "sk-env")]),
        );

        assert_eq!(resolved.account_id, "0.0.42");
        // empty file value falls through to the environment
        assert_eq!(resolved.api_key, "sk-env");
        // nothing set anywhere resolves to empty, not an error
        assert_eq!(resolved.private_key, "");
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.output.max_tabs, 10);
    }

    #[test]
    fn malformed_config_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "credentials = 3").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, AgentpadError::TomlParse(_)));
    }
}
