//! Configuration types for TaskFixer.
//!
//! `AppConfig` represents `config.toml` in the data directory. Every field
//! has a default, so an empty or missing file yields a working setup.

use serde::{Deserialize, Serialize};

use crate::usage::QuotaLimits;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Relay timing and buffering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Deadline in seconds, measured from request start.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Capacity of the per-relay event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_event_buffer() -> usize {
    64
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Limits of the metered free-trial tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_max_words")]
    pub free_trial_max_words: u64,
    #[serde(default = "default_max_documents")]
    pub free_trial_max_documents: u64,
}

fn default_max_words() -> u64 {
    800
}

fn default_max_documents() -> u64 {
    1
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free_trial_max_words: default_max_words(),
            free_trial_max_documents: default_max_documents(),
        }
    }
}

impl QuotaConfig {
    pub fn free_trial_limits(&self) -> QuotaLimits {
        QuotaLimits {
            max_words: self.free_trial_max_words,
            max_documents: self.free_trial_max_documents,
            max_files: None,
        }
    }
}

/// Assistants API settings. The API key is read from the environment only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub assistant_id: Option<String>,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            assistant_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_base_url")]
    pub base_url: String,
    #[serde(default = "default_results")]
    pub default_results: usize,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_search_base_url() -> String {
    "https://api.duckduckgo.com".to_string()
}

fn default_results() -> usize {
    5
}

fn default_search_timeout_secs() -> u64 {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            default_results: default_results(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}
