//! TOML-based configuration system for depwatch.
//!
//! The file is optional: a project without `depwatch.toml` runs with
//! defaults. API keys are never stored in the file; `api_key_env` names
//! the environment variable resolved at runtime via
//! [`DepwatchConfig::resolve_env_vars`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::manager::PackageManager;

/// Config file name looked up in the project root.
pub const DEFAULT_CONFIG_FILE: &str = "depwatch.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepwatchConfig {
    /// Logging settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Which cascade stages run and how.
    #[serde(default)]
    pub probes: ProbeConfig,

    /// Language-model advisory settings.
    #[serde(default)]
    pub advisory: AdvisoryConfig,
}

// ---------------------------------------------------------------------------
// General
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Probes
// ---------------------------------------------------------------------------

/// Cascade stage toggles and subprocess limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Inspect the manager's dependency listing.
    #[serde(default = "default_true")]
    pub tree: bool,

    /// Run the manager's install in dry-run mode.
    #[serde(default = "default_true")]
    pub dry_run: bool,

    /// Cross-reference versions across manifest sections.
    #[serde(default = "default_true")]
    pub manifest: bool,

    /// Run a dedupe dry-run when the cache directory exists.
    #[serde(default = "default_true")]
    pub dedup: bool,

    /// Seconds before a manager process is killed (default 120).
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,

    /// Installed-dependency directory checked before dedup (default `node_modules`).
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Force a manager instead of detecting it from lockfiles.
    #[serde(default)]
    pub manager: Option<PackageManager>,
}

fn default_true() -> bool {
    true
}
fn default_probe_timeout() -> u64 {
    120
}
fn default_cache_dir() -> String {
    "node_modules".into()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            tree: true,
            dry_run: true,
            manifest: true,
            dedup: true,
            timeout_secs: default_probe_timeout(),
            cache_dir: default_cache_dir(),
            manager: None,
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Advisory
// ---------------------------------------------------------------------------

/// Which HTTP API serves the advisory call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Anthropic,
    OpenAi,
}

impl LlmProvider {
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => "claude-3-5-haiku-latest",
            Self::OpenAi => "gpt-4o-mini",
        }
    }

    pub fn default_api_key_env(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAi => "https://api.openai.com",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

/// Language-model advisory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryConfig {
    /// Set to `false` to always use the static advice table.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub provider: LlmProvider,

    /// Model name; the provider default when unset.
    #[serde(default)]
    pub model: Option<String>,

    /// Environment variable holding the API key; the provider default when unset.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// API base URL override (proxies, gateways).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Token budget for the response (default 500).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Seconds before the advisory call is abandoned (default 10).
    #[serde(default = "default_advisory_timeout")]
    pub timeout_secs: u64,

    /// Problems quoted verbatim in the prompt (default 5).
    #[serde(default = "default_max_problems")]
    pub max_problems: usize,

    /// Resolved API key (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_max_tokens() -> u32 {
    500
}
fn default_advisory_timeout() -> u64 {
    10
}
fn default_max_problems() -> usize {
    5
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: LlmProvider::default(),
            model: None,
            api_key_env: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            timeout_secs: default_advisory_timeout(),
            max_problems: default_max_problems(),
            api_key: None,
        }
    }
}

impl AdvisoryConfig {
    pub fn api_key_env_name(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_key_env())
    }

    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether the language-model step should run at all.
    pub fn is_available(&self) -> bool {
        self.enabled && self.api_key.is_some()
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl DepwatchConfig {
    /// Load a [`DepwatchConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: DepwatchConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Like [`load_from_file`](Self::load_from_file), but a missing file
    /// yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load_from_file(&path) {
            Err(ConfigError::FileNotFound(p)) => {
                debug!(path = %p, "no configuration file; using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Resolve `advisory.api_key_env` into `advisory.api_key`.
    ///
    /// A missing variable logs a warning and leaves the key unset, which
    /// disables the language-model step.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if self.advisory.enabled {
            let env_name = self.advisory.api_key_env_name().to_string();
            self.advisory.api_key = resolve_optional_env(&env_name, "advisory.api_key_env");
        }
        Ok(())
    }

    /// Validate that all values are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probes.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "probes.timeout_secs".into(),
                detail: "probe timeout must be > 0".into(),
            });
        }
        if self.probes.cache_dir.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "probes.cache_dir".into(),
                detail: "cache directory must not be empty".into(),
            });
        }
        if self.advisory.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "advisory.max_tokens".into(),
                detail: "max tokens must be > 0".into(),
            });
        }
        if self.advisory.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "advisory.timeout_secs".into(),
                detail: "advisory timeout must be > 0".into(),
            });
        }
        if self.advisory.max_problems == 0 {
            return Err(ConfigError::InvalidValue {
                field: "advisory.max_problems".into(),
                detail: "at least one problem must be sampled".into(),
            });
        }
        Ok(())
    }

    /// Convenience: load (or default), resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_or_default(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[general]
log_level = "debug"

[probes]
tree = true
dry_run = false
manifest = true
dedup = false
timeout_secs = 45
cache_dir = "node_modules"
manager = "pnpm"

[advisory]
enabled = true
provider = "openai"
model = "gpt-4o"
api_key_env = "DEPWATCH_TEST_KEY"
base_url = "https://llm.internal.example.com"
max_tokens = 300
timeout_secs = 5
max_problems = 3
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: DepwatchConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.general.log_level, "debug");
        assert!(!config.probes.dry_run);
        assert!(!config.probes.dedup);
        assert_eq!(config.probes.timeout(), Duration::from_secs(45));
        assert_eq!(config.probes.manager, Some(PackageManager::Pnpm));
        assert_eq!(config.advisory.provider, LlmProvider::OpenAi);
        assert_eq!(config.advisory.model_name(), "gpt-4o");
        assert_eq!(config.advisory.base_url(), "https://llm.internal.example.com");
        assert_eq!(config.advisory.max_problems, 3);
    }

    #[test]
    fn test_defaults() {
        let config: DepwatchConfig = toml::from_str("").unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert!(config.probes.tree && config.probes.dry_run && config.probes.manifest && config.probes.dedup);
        assert_eq!(config.probes.timeout_secs, 120);
        assert_eq!(config.probes.cache_dir, "node_modules");
        assert_eq!(config.probes.manager, None);
        assert_eq!(config.advisory.provider, LlmProvider::Anthropic);
        assert_eq!(config.advisory.api_key_env_name(), "ANTHROPIC_API_KEY");
        assert_eq!(config.advisory.model_name(), "claude-3-5-haiku-latest");
        assert_eq!(config.advisory.max_tokens, 500);
        assert_eq!(config.advisory.timeout_secs, 10);
        assert_eq!(config.advisory.max_problems, 5);
        assert!(!config.advisory.is_available());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = DepwatchConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.general.log_level, "debug");
    }

    #[test]
    fn test_file_not_found() {
        let result = DepwatchConfig::load_from_file("/nonexistent/depwatch.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = DepwatchConfig::load_or_default("/nonexistent/depwatch.toml").unwrap();
        assert_eq!(config.probes.cache_dir, "node_modules");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "[probes\ntree = ").unwrap();
        let result = DepwatchConfig::load_or_default(&path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = DepwatchConfig::default();
        config.probes.timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "probes.timeout_secs"
        ));
    }

    #[test]
    fn test_validate_rejects_empty_cache_dir() {
        let mut config = DepwatchConfig::default();
        config.probes.cache_dir = "  ".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "probes.cache_dir"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_max_problems() {
        let mut config = DepwatchConfig::default();
        config.advisory.max_problems = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "advisory.max_problems"
        ));
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("DEPWATCH_TEST_KEY", "sk-test");

        let mut config: DepwatchConfig = toml::from_str(sample_toml()).unwrap();
        config.resolve_env_vars().unwrap();
        assert_eq!(config.advisory.api_key.as_deref(), Some("sk-test"));
        assert!(config.advisory.is_available());

        // Clean up
        std::env::remove_var("DEPWATCH_TEST_KEY");
    }

    #[test]
    fn test_disabled_advisory_skips_key() {
        std::env::set_var("DEPWATCH_DISABLED_KEY", "sk-unused");
        let mut config: DepwatchConfig = toml::from_str(
            "[advisory]\nenabled = false\napi_key_env = \"DEPWATCH_DISABLED_KEY\"\n",
        )
        .unwrap();
        config.resolve_env_vars().unwrap();
        assert!(config.advisory.api_key.is_none());
        assert!(!config.advisory.is_available());
        std::env::remove_var("DEPWATCH_DISABLED_KEY");
    }
}
