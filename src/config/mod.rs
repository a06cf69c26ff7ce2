pub mod schema;

pub use schema::ScoutConfig;

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "vulnscout.toml";

/// Per-user config location (~/.config/vulnscout/vulnscout.toml on Linux).
pub fn user_config_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.config_dir().join("vulnscout").join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Pick the config path: explicit flag, then `./vulnscout.toml`, then the user config.
pub fn locate_config(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    user_config_path()
}

/// Load config from the given path, or return defaults.
pub fn load_config(path: &Path) -> Result<ScoutConfig> {
    if path.exists() {
        let contents =
            std::fs::read_to_string(path).context("Failed to read vulnscout config file")?;
        let config: ScoutConfig =
            toml::from_str(&contents).context("Failed to parse vulnscout config (TOML)")?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    } else {
        debug!("No config at {}, using defaults", path.display());
        Ok(ScoutConfig::default())
    }
}

/// Load `.env`, then the config file, then apply environment overrides.
pub fn load_with_env(path: &Path) -> Result<ScoutConfig> {
    if let Ok(env_path) = dotenvy::dotenv() {
        debug!("Loaded environment from {}", env_path.display());
    }
    let mut config = load_config(path)?;
    config.apply_env_overrides();
    Ok(config)
}

/// Reject configurations the loop cannot run with.
pub fn validate(config: &ScoutConfig) -> Result<()> {
    if config.api_key.trim().is_empty() {
        bail!("No API key configured: set `api_key` in the config or VULNSCOUT_API_KEY");
    }
    if config.max_iterations == 0 {
        bail!("`max_iterations` must be at least 1");
    }
    if config.chunk_overlap >= config.chunk_lines {
        bail!("`chunk_overlap` must be smaller than `chunk_lines`");
    }
    Ok(())
}

/// Save config to the given path (TOML format).
pub fn save_config(config: &ScoutConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, contents).context("Failed to write config file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.max_iterations, 15);
        assert_eq!(config.target_dir, "./repo");
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "model = \"local-llm\"\nmax_iterations = 4\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.model, "local-llm");
        assert_eq!(config.max_iterations, 4);
        assert_eq!(config.search_top_k, 4);
    }

    #[test]
    fn save_then_load_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut config = ScoutConfig::default();
        config.deny_hosts = vec!["169.254.169.254".into()];
        config.max_parse_failures = Some(3);

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.deny_hosts, config.deny_hosts);
        assert_eq!(loaded.max_parse_failures, Some(3));
    }

    #[test]
    fn env_overrides_replace_non_empty_values_only() {
        let mut config = ScoutConfig::default();
        config.apply_overrides(|key| match key {
            "VULNSCOUT_API_KEY" => Some("sk-test".into()),
            "VULNSCOUT_MODEL" => Some("   ".into()),
            _ => None,
        });
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.model, ScoutConfig::default().model);
    }

    #[test]
    fn validate_requires_api_key() {
        let config = ScoutConfig::default();
        assert!(validate(&config).is_err());

        let config = ScoutConfig {
            api_key: "sk-test".into(),
            ..ScoutConfig::default()
        };
        assert!(validate(&config).is_ok());
    }
}
