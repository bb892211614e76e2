use crate::core::error::ChatError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:8080/v1/chat/completions";
pub const DEFAULT_LOCAL_MODEL: &str = "local-model";
pub const DEFAULT_ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-20241022";
pub const DEFAULT_EXECUTOR_ENDPOINT: &str = "http://127.0.0.1:8081/execute";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 512;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

pub const MIN_TEMPERATURE: f64 = 0.0;
pub const MAX_TEMPERATURE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Backend {
    #[default]
    #[serde(rename = "openai-compatible")]
    OpenAICompatible,
    #[serde(rename = "anthropic")]
    Anthropic,
}

impl Backend {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai-compatible" | "openai" | "local" => Some(Backend::OpenAICompatible),
            "anthropic" | "claude" => Some(Backend::Anthropic),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::OpenAICompatible => "openai-compatible",
            Backend::Anthropic => "anthropic",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Backend::OpenAICompatible => DEFAULT_LOCAL_MODEL,
            Backend::Anthropic => DEFAULT_ANTHROPIC_MODEL,
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Backend::OpenAICompatible => DEFAULT_LOCAL_ENDPOINT,
            Backend::Anthropic => DEFAULT_ANTHROPIC_ENDPOINT,
        }
    }

    /// Highest temperature the protocol accepts, when it is tighter than the
    /// configurable range.
    pub fn temperature_ceiling(&self) -> Option<f64> {
        match self {
            Backend::OpenAICompatible => None,
            Backend::Anthropic => Some(1.0),
        }
    }

    /// Bounds `temperature` to what this backend accepts.
    pub fn clamp_temperature(&self, temperature: f64) -> f64 {
        match self.temperature_ceiling() {
            Some(ceiling) => temperature.min(ceiling),
            None => temperature,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The persisted client configuration.
///
/// `temperature` is kept exactly as entered; backend ceilings are applied
/// only when a request is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub backend: Backend,
    pub endpoint: Option<String>,
    pub credential: Option<String>,
    pub model: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub request_timeout_secs: u64,
    pub executor_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            endpoint: None,
            credential: None,
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            executor_endpoint: None,
        }
    }
}

impl Config {
    pub fn effective_model(&self) -> String {
        non_empty(&self.model)
            .unwrap_or(self.backend.default_model())
            .to_string()
    }

    /// The anthropic endpoint is fixed; only openai-compatible backends read
    /// the configured URL.
    pub fn effective_endpoint(&self) -> String {
        match self.backend {
            Backend::OpenAICompatible => non_empty(&self.endpoint)
                .unwrap_or(self.backend.default_endpoint())
                .to_string(),
            Backend::Anthropic => self.backend.default_endpoint().to_string(),
        }
    }

    pub fn effective_credential(&self) -> Option<&str> {
        non_empty(&self.credential)
    }

    pub fn effective_executor_endpoint(&self) -> String {
        non_empty(&self.executor_endpoint)
            .unwrap_or(DEFAULT_EXECUTOR_ENDPOINT)
            .to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Temperature actually sent to the selected backend.
    pub fn effective_temperature(&self) -> f64 {
        self.backend.clamp_temperature(self.temperature)
    }

    /// Resets fields a hand-edited file may hold outside their valid range.
    fn sanitized(mut self) -> Self {
        if !self.temperature.is_finite()
            || !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&self.temperature)
        {
            warn!(temperature = self.temperature, "stored temperature out of range, using default");
            self.temperature = DEFAULT_TEMPERATURE;
        }
        if self.max_tokens == 0 {
            warn!("stored max tokens is zero, using default");
            self.max_tokens = DEFAULT_MAX_TOKENS;
        }
        self
    }
}

/// Command-line adjustments that last for one session and are never saved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub backend: Option<Backend>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
}

impl ConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.backend.is_none() && self.model.is_none() && self.endpoint.is_none()
    }

    pub fn apply(&self, config: &mut Config) {
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(model) = &self.model {
            config.model = Some(model.clone());
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = Some(endpoint.clone());
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parses a user-entered temperature, accepting only finite values in `[0, 2]`.
pub fn parse_temperature(input: &str) -> Result<f64, ChatError> {
    let value: f64 = input
        .trim()
        .parse()
        .map_err(|_| ChatError::Validation(format!("'{}' is not a number", input.trim())))?;
    if !value.is_finite() || !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&value) {
        return Err(ChatError::Validation(format!(
            "temperature must be between {} and {}",
            MIN_TEMPERATURE, MAX_TEMPERATURE
        )));
    }
    Ok(value)
}

pub fn parse_max_tokens(input: &str) -> Result<u32, ChatError> {
    match input.trim().parse::<u32>() {
        Ok(0) | Err(_) => Err(ChatError::Validation(format!(
            "'{}' is not a positive integer",
            input.trim()
        ))),
        Ok(value) => Ok(value),
    }
}

/// Owns the single persisted configuration record.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".xchat")
    }

    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored record. Missing, partial or corrupted data degrades
    /// to defaults; this never fails.
    pub fn load(&self) -> Config {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored configuration, writing defaults");
                let config = Config::default();
                if let Err(e) = self.save(&config) {
                    debug!(error = %e, "could not write default configuration");
                }
                return config;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read configuration");
                return Config::default();
            }
        };

        match serde_yml::from_str::<Option<Config>>(&contents) {
            Ok(config) => config.unwrap_or_default().sanitized(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "stored configuration is unreadable, using defaults");
                Config::default()
            }
        }
    }

    /// Replaces the stored record. The write goes through a temporary file
    /// so readers only ever see a complete record.
    pub fn save(&self, config: &Config) -> Result<(), ChatError> {
        let parent = self.path.parent().filter(|dir| !dir.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir)?;
        }

        let yaml_content = serde_yml::to_string(config)?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };
        temp_file.write_all(yaml_content.as_bytes())?;
        temp_file.as_file_mut().sync_all()?;
        temp_file
            .persist(&self.path)
            .map_err(|e| ChatError::Io { source: e.error })?;

        debug!(path = %self.path.display(), backend = %config.backend, "configuration saved");
        Ok(())
    }
}
