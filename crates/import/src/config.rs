// Import settings. The classifier API key is never stored in the file; it
// is read from the environment variable named by `api_key_env`.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dedup::DEFAULT_DESCRIPTION_CHARS;

pub const DEFAULT_API_KEY_ENV: &str = "TAXLENS_AI_API_KEY";
pub const DEFAULT_BATCH_SIZE: usize = 25;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub classifier: ClassifierConfig,
    pub dedup: DedupConfig,
}

impl ImportConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        tracing::info!("Loaded import config from {}", path.display());
        Ok(config)
    }
}

/// Settings for the OpenAI-compatible chat-completions endpoint used by
/// the AI fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: 60,
            temperature: 0.1,
            max_tokens: 4096,
        }
    }
}

impl ClassifierConfig {
    /// The credential from the environment. Unset or blank means the
    /// classifier is not configured.
    pub fn api_key(&self) -> Option<String> {
        env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Characters of normalized description that take part in the dedup key.
    pub description_chars: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            description_chars: DEFAULT_DESCRIPTION_CHARS,
        }
    }
}
