//! Configuration loader for TaskFixer.
//!
//! Reads `config.toml` from the data directory (`~/.taskfixer/` in
//! production) into [`AppConfig`], then applies environment overrides.
//! Falls back to defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use taskfixer_types::config::AppConfig;

/// Resolve the data directory.
///
/// Priority:
/// 1. `TASKFIXER_DATA_DIR` environment variable
/// 2. `~/.taskfixer`
/// 3. `.taskfixer` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TASKFIXER_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".taskfixer");
    }

    PathBuf::from(".taskfixer")
}

/// Load `{data_dir}/config.toml` and apply environment overrides.
pub async fn load_config(data_dir: &Path) -> AppConfig {
    let mut config = load_config_file(data_dir).await;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

async fn load_config_file(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        }
    }
}

/// Apply `OPENAI_ASSISTANT_ID` and `TASKFIXER_FREE_TRIAL_LIMIT`.
pub fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(assistant_id) = lookup("OPENAI_ASSISTANT_ID").filter(|v| !v.trim().is_empty()) {
        config.openai.assistant_id = Some(assistant_id);
    }

    if let Some(raw) = lookup("TASKFIXER_FREE_TRIAL_LIMIT") {
        match raw.trim().parse::<u64>() {
            Ok(limit) => config.quota.free_trial_max_documents = limit,
            Err(err) => {
                tracing::warn!("Ignoring TASKFIXER_FREE_TRIAL_LIMIT={raw:?}: {err}");
            }
        }
    }
}

/// The Assistants API key from `OPENAI_API_KEY`, if set.
pub fn openai_api_key() -> Option<SecretString> {
    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
        .map(SecretString::from)
}
