//! Settings
//!
//! Explicit configuration for one run of the tool. Layered from defaults,
//! an optional JSON config file, environment variables, and CLI flags.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::documents::retriever::DEFAULT_TOP_K;

/// Config directory name under the platform config dir
const APP_DIR_NAME: &str = "pensionbot";

/// Config file name inside the app config dir
const CONFIG_FILE_NAME: &str = "config.json";

pub const ENV_CATALOG_ROOT: &str = "PENSIONBOT_CATALOG_ROOT";
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_CHAT_MODEL: &str = "PENSIONBOT_CHAT_MODEL";
pub const ENV_EMBEDDING_MODEL: &str = "PENSIONBOT_EMBEDDING_MODEL";
pub const ENV_EMBEDDING_BACKEND: &str = "PENSIONBOT_EMBEDDING_BACKEND";
pub const ENV_TOP_K: &str = "PENSIONBOT_TOP_K";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Short banner shown to the user
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::Io(e) => format!("Het configuratiebestand kon niet worden gelezen: {}", e),
            ConfigError::Json(e) => format!("Het configuratiebestand is geen geldige JSON: {}", e),
            ConfigError::Invalid(msg) => format!("Ongeldige instelling: {}", msg),
        }
    }
}

/// Which embedding provider builds the per-question index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// Remote OpenAI-compatible `/embeddings` endpoint
    #[default]
    Openai,
    /// Local feature hashing, no network
    Hashing,
}

impl std::str::FromStr for EmbeddingBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(EmbeddingBackend::Openai),
            "hashing" => Ok(EmbeddingBackend::Hashing),
            other => Err(ConfigError::Invalid(format!("unknown embedding backend: {}", other))),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Folder holding one subfolder per client category
    pub catalog_root: PathBuf,
    pub api_base_url: String,
    pub openai_api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_backend: EmbeddingBackend,
    pub temperature: f32,
    /// Passages retrieved per question
    pub top_k: usize,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_root: PathBuf::from("preloaded_docs"),
            api_base_url: "https://api.openai.com/v1".to_string(),
            openai_api_key: None,
            chat_model: "gpt-4-turbo-preview".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            embedding_backend: EmbeddingBackend::Openai,
            temperature: 0.0,
            top_k: DEFAULT_TOP_K,
            request_timeout_secs: 120,
        }
    }
}

// Hand-written so the API key never reaches a log line.
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("catalog_root", &self.catalog_root)
            .field("api_base_url", &self.api_base_url)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_backend", &self.embedding_backend)
            .field("temperature", &self.temperature)
            .field("top_k", &self.top_k)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Settings {
    /// Load settings: defaults, then the config file, then the process environment.
    ///
    /// An explicit `config_path` must exist. Without one, the default
    /// location is used only if a file is present there.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match config_path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(settings)
    }

    /// Overlay values from an environment lookup. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(root) = get(ENV_CATALOG_ROOT) {
            self.catalog_root = PathBuf::from(root);
        }
        if let Some(key) = get(ENV_API_KEY) {
            self.openai_api_key = Some(key);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.api_base_url = url;
        }
        if let Some(model) = get(ENV_CHAT_MODEL) {
            self.chat_model = model;
        }
        if let Some(model) = get(ENV_EMBEDDING_MODEL) {
            self.embedding_model = model;
        }
        if let Some(backend) = get(ENV_EMBEDDING_BACKEND) {
            self.embedding_backend = backend.trim().parse()?;
        }
        if let Some(k) = get(ENV_TOP_K) {
            self.top_k = k.trim().parse()
                .map_err(|_| ConfigError::Invalid(format!("{} must be a positive integer", ENV_TOP_K)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be at least 1".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api_base_url is empty".to_string()));
        }
        Ok(())
    }
}

/// `<config_dir>/pensionbot/config.json`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}
