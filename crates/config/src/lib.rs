//! Configuration loading, validation, and backend selection for Stepwise.
//!
//! Loads configuration from `~/.stepwise/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! Backend selection is a pure function of the loaded config
//! ([`select_backend`]), resolved once per process so evaluation runs are
//! reproducible.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.stepwise/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which decoding backend to use: "auto", "openai", or "google"
    #[serde(default)]
    pub provider: ProviderPreference,

    /// Model override (default depends on the selected backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// OpenAI-style backend settings
    #[serde(default)]
    pub openai: BackendConfig,

    /// Gemini-style backend settings
    #[serde(default)]
    pub google: BackendConfig,

    /// Reasoning loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Business API settings
    #[serde(default)]
    pub business: BusinessConfig,

    /// Usage telemetry settings
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Requested decoding backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderPreference {
    /// Pick whichever backend has credentials; OpenAI-style wins a tie.
    #[default]
    Auto,
    #[serde(alias = "openai")]
    OpenAi,
    #[serde(alias = "gemini")]
    Google,
}

impl std::str::FromStr for ProviderPreference {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "openai" => Ok(Self::OpenAi),
            "google" | "gemini" => Ok(Self::Google),
            other => Err(ConfigError::ValidationError(format!(
                "unknown provider '{other}' (expected auto, openai, or google)"
            ))),
        }
    }
}

/// The backend actually chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Native schema-constrained decoding.
    OpenAi,
    /// Schema embedded in instructions plus JSON extraction.
    Gemini,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::Gemini => "gemini-2.0-flash-exp",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Pick a backend from the preference and which credentials are present.
///
/// An explicit preference always wins. In auto mode the only viable backend
/// is chosen, and OpenAI-style is preferred when both are viable.
pub fn select_backend(
    preference: ProviderPreference,
    has_openai: bool,
    has_google: bool,
) -> Result<BackendKind, ConfigError> {
    match preference {
        ProviderPreference::OpenAi => Ok(BackendKind::OpenAi),
        ProviderPreference::Google => Ok(BackendKind::Gemini),
        ProviderPreference::Auto => match (has_openai, has_google) {
            (true, _) => Ok(BackendKind::OpenAi),
            (false, true) => Ok(BackendKind::Gemini),
            (false, false) => Err(ConfigError::NoBackend),
        },
    }
}

/// Everything a provider needs, resolved from config.
#[derive(Clone)]
pub struct ResolvedBackend {
    pub kind: BackendKind,
    pub model: String,
    pub api_key: String,
    pub base_url: String,
}

impl std::fmt::Debug for ResolvedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedBackend")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("openai", &self.openai)
            .field("google", &self.google)
            .field("agent", &self.agent)
            .field("business", &self.business)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl BackendConfig {
    /// Whether this backend has usable credentials.
    pub fn is_viable(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// How access-control rules are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    /// Rules exist only as instruction text the model is asked to follow.
    #[default]
    Advisory,
    /// The dispatcher also refuses actions the caller's tier cannot perform.
    Enforced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum decide/dispatch cycles per task
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Maximum tokens per decoding call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature sent to the backend
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Wall-clock bound on one decoding call (unbounded if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decode_timeout_secs: Option<u64>,

    /// Wall-clock bound on one dispatch call (unbounded if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_timeout_secs: Option<u64>,

    #[serde(default)]
    pub policy_mode: PolicyMode,
}

fn default_max_steps() -> u32 {
    25
}
fn default_max_tokens() -> u32 {
    16384
}
fn default_temperature() -> f32 {
    1.0
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            decode_timeout_secs: None,
            dispatch_timeout_secs: None,
            policy_mode: PolicyMode::default(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BusinessConfig {
    /// Base URL of the business platform; task routes live under `{api_url}/tasks/{task_id}`
    #[serde(default = "default_business_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// HTTP timeout for business API calls
    #[serde(default = "default_business_timeout")]
    pub timeout_secs: u64,
}

fn default_business_url() -> String {
    "https://erc.timetoact-group.at".into()
}
fn default_business_timeout() -> u64 {
    60
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            api_url: default_business_url(),
            api_key: None,
            timeout_secs: default_business_timeout(),
        }
    }
}

impl std::fmt::Debug for BusinessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusinessConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether usage is recorded at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Also post each usage record to the business platform
    #[serde(default = "default_true")]
    pub log_to_platform: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_to_platform: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.stepwise/config.toml).
    ///
    /// Environment variables override file values:
    /// - `OPENAI_API_KEY`, `GOOGLE_API_KEY`
    /// - `LLM_PROVIDER` (auto / openai / google)
    /// - `MODEL_ID`
    /// - `STEPWISE_API_URL`, `STEPWISE_API_KEY`
    /// - `STEPWISE_MAX_STEPS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(key) = non_empty("GOOGLE_API_KEY") {
            self.google.api_key = Some(key);
        }
        if let Some(provider) = non_empty("LLM_PROVIDER") {
            self.provider = provider.parse()?;
        }
        if let Some(model) = non_empty("MODEL_ID") {
            self.model = Some(model);
        }
        if let Some(url) = non_empty("STEPWISE_API_URL") {
            self.business.api_url = url;
        }
        if let Some(key) = non_empty("STEPWISE_API_KEY") {
            self.business.api_key = Some(key);
        }
        if let Some(steps) = non_empty("STEPWISE_MAX_STEPS") {
            self.agent.max_steps = steps.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("STEPWISE_MAX_STEPS is not a number: {steps}"))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".stepwise")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_steps == 0 || self.agent.max_steps > 100 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be between 1 and 100".into(),
            ));
        }

        if self.agent.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tokens must be > 0".into(),
            ));
        }

        if self.agent.temperature < 0.0 || self.agent.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "agent.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.business.api_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "business.api_url must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Which backend this config selects.
    pub fn backend_kind(&self) -> Result<BackendKind, ConfigError> {
        select_backend(
            self.provider,
            self.openai.is_viable(),
            self.google.is_viable(),
        )
    }

    /// Resolve the selected backend into concrete connection settings.
    pub fn resolve_backend(&self) -> Result<ResolvedBackend, ConfigError> {
        let kind = self.backend_kind()?;
        let backend = match kind {
            BackendKind::OpenAi => &self.openai,
            BackendKind::Gemini => &self.google,
        };

        let api_key = backend
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::ValidationError(format!("no API key configured for {kind}"))
            })?;

        Ok(ResolvedBackend {
            kind,
            model: self
                .model
                .clone()
                .unwrap_or_else(|| kind.default_model().to_string()),
            api_key,
            base_url: backend
                .api_url
                .clone()
                .unwrap_or_else(|| kind.default_base_url().to_string()),
        })
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderPreference::default(),
            model: None,
            openai: BackendConfig::default(),
            google: BackendConfig::default(),
            agent: AgentConfig::default(),
            business: BusinessConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("No API key found. Please set either OPENAI_API_KEY or GOOGLE_API_KEY")]
    NoBackend,
}
