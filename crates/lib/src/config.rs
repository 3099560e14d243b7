//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.linerelay/config.json`) and environment.
//! The file is optional: every secret can come from the environment (or a `.env` file
//! loaded by the CLI). [`Settings`] is the resolved, read-only view the gateway runs on.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// System instruction compiled into the binary; used when no instruction file is configured or present.
pub static DEFAULT_SYSTEM_INSTRUCTION: &str = include_str!("../config/system_instruction.md");

/// File name of the instruction file looked up next to the config file.
pub const SYSTEM_INSTRUCTION_FILE: &str = "system_instruction.md";

const DEFAULT_LINE_API_BASE: &str = "https://api.line.me";
const DEFAULT_MODEL_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL_NAME: &str = "gemini-1.5-flash";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Channel settings (LINE).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Model provider settings (Gemini).
    #[serde(default)]
    pub model: ModelConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 8080). Overridden by PORT env.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; the platform must be able to reach the callback).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub line: LineChannelConfig,
}

/// LINE Messaging API channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChannelConfig {
    /// Long-lived channel access token. Overridden by LINE_CHANNEL_ACCESS_TOKEN env when set.
    pub channel_access_token: Option<String>,
    /// Channel secret used to verify X-Line-Signature. Overridden by LINE_CHANNEL_SECRET env when set.
    pub channel_secret: Option<String>,
    /// Messaging API base URL (default https://api.line.me). Mostly useful for tests.
    pub api_base: Option<String>,
}

/// Model provider config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Gemini API key. Overridden by GEMINI_API_KEY env when set.
    pub api_key: Option<String>,
    /// Model name (default "gemini-1.5-flash").
    pub name: Option<String>,
    /// Generative Language API base URL (default https://generativelanguage.googleapis.com/v1beta).
    pub api_base: Option<String>,
    /// Upper bound on one generateContent call, in seconds. Unset means no timeout.
    pub timeout_secs: Option<u64>,
    /// Instruction file. Relative paths are resolved against the config file's parent.
    pub system_instruction_path: Option<PathBuf>,
}

/// Startup configuration errors. Any of these prevents the gateway from serving.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("LINE channel access token not configured (set LINE_CHANNEL_ACCESS_TOKEN or channels.line.channelAccessToken)")]
    MissingAccessToken,
    #[error("LINE channel secret not configured (set LINE_CHANNEL_SECRET or channels.line.channelSecret)")]
    MissingChannelSecret,
    #[error("reading system instruction from {}: {source}", .path.display())]
    ReadInstruction {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("system instruction is empty")]
    EmptyInstruction,
}

/// Resolved runtime settings. Built once at startup and shared read-only.
#[derive(Clone)]
pub struct Settings {
    pub bind: String,
    pub port: u16,
    pub channel_access_token: String,
    pub channel_secret: String,
    /// None when no key is configured; every generation then fails with a diagnostic reply.
    pub model_api_key: Option<String>,
    pub model_name: String,
    pub line_api_base: String,
    pub model_api_base: String,
    pub model_timeout: Option<Duration>,
    pub system_instruction: Arc<str>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("channel_access_token", &"<redacted>")
            .field("channel_secret", &"<redacted>")
            .field("model_api_key", &self.model_api_key.as_ref().map(|_| "<redacted>"))
            .field("model_name", &self.model_name)
            .field("line_api_base", &self.line_api_base)
            .field("model_api_base", &self.model_api_base)
            .field("model_timeout", &self.model_timeout)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Build settings from a config (env overrides already applied) and an instruction string.
    pub fn from_config(config: &Config, system_instruction: &str) -> Result<Self, ConfigError> {
        let channel_access_token = non_empty(config.channels.line.channel_access_token.as_deref())
            .ok_or(ConfigError::MissingAccessToken)?;
        let channel_secret = non_empty(config.channels.line.channel_secret.as_deref())
            .ok_or(ConfigError::MissingChannelSecret)?;
        if system_instruction.trim().is_empty() {
            return Err(ConfigError::EmptyInstruction);
        }
        Ok(Self {
            bind: config.gateway.bind.trim().to_string(),
            port: config.gateway.port,
            channel_access_token,
            channel_secret,
            model_api_key: non_empty(config.model.api_key.as_deref()),
            model_name: non_empty(config.model.name.as_deref())
                .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            line_api_base: base_url(
                config.channels.line.api_base.as_deref(),
                DEFAULT_LINE_API_BASE,
            ),
            model_api_base: base_url(config.model.api_base.as_deref(), DEFAULT_MODEL_API_BASE),
            model_timeout: config
                .model
                .timeout_secs
                .filter(|s| *s > 0)
                .map(Duration::from_secs),
            system_instruction: Arc::from(system_instruction),
        })
    }

    /// Resolve settings for `config` loaded from `config_path`: apply env overrides, read the
    /// system instruction, and validate required secrets.
    pub fn resolve(mut config: Config, config_path: &Path) -> Result<Self, ConfigError> {
        apply_env_overrides(&mut config);
        let instruction = load_system_instruction(&config, config_path)?;
        Self::from_config(&config, &instruction)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn base_url(value: Option<&str>, default: &str) -> String {
    non_empty(value)
        .map(|u| u.trim_end_matches('/').to_string())
        .unwrap_or_else(|| default.to_string())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| non_empty(Some(&s)))
}

/// Apply environment overrides: LINE_CHANNEL_ACCESS_TOKEN, LINE_CHANNEL_SECRET, GEMINI_API_KEY, PORT.
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(token) = env_non_empty("LINE_CHANNEL_ACCESS_TOKEN") {
        config.channels.line.channel_access_token = Some(token);
    }
    if let Some(secret) = env_non_empty("LINE_CHANNEL_SECRET") {
        config.channels.line.channel_secret = Some(secret);
    }
    if let Some(key) = env_non_empty("GEMINI_API_KEY") {
        config.model.api_key = Some(key);
    }
    if let Some(port) = env_non_empty("PORT") {
        match port.parse::<u16>() {
            Ok(p) => config.gateway.port = p,
            Err(_) => log::warn!("ignoring invalid PORT value: {}", port),
        }
    }
}

fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Where the system instruction comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionSource {
    /// An explicit `model.systemInstructionPath`; must be readable.
    Configured(PathBuf),
    /// `system_instruction.md` next to the config file; used only if it exists.
    ConfigDir(PathBuf),
    Bundled,
}

/// Decide which instruction source applies (does not read the file).
pub fn resolve_instruction_source(config: &Config, config_path: &Path) -> InstructionSource {
    let dir = config_dir(config_path);
    match &config.model.system_instruction_path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                InstructionSource::Configured(p.clone())
            } else {
                InstructionSource::Configured(dir.join(p))
            }
        }
        _ => {
            let candidate = dir.join(SYSTEM_INSTRUCTION_FILE);
            if candidate.is_file() {
                InstructionSource::ConfigDir(candidate)
            } else {
                InstructionSource::Bundled
            }
        }
    }
}

/// Load the system instruction text once, at startup.
pub fn load_system_instruction(config: &Config, config_path: &Path) -> Result<String, ConfigError> {
    match resolve_instruction_source(config, config_path) {
        InstructionSource::Configured(path) | InstructionSource::ConfigDir(path) => {
            log::info!("loading system instruction from {}", path.display());
            std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::ReadInstruction { path, source })
        }
        InstructionSource::Bundled => {
            log::debug!("using bundled system instruction");
            Ok(DEFAULT_SYSTEM_INSTRUCTION.to_string())
        }
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("LINERELAY_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".linerelay").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, the default path, or LINERELAY_CONFIG_PATH. Missing file => default config.
/// Returns the config and the path that was used (for resolving the instruction file).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_secrets() -> Config {
        let mut config = Config::default();
        config.channels.line.channel_access_token = Some("access".to_string());
        config.channels.line.channel_secret = Some("secret".to_string());
        config
    }

    #[test]
    fn default_gateway_port_and_bind() {
        let g = GatewayConfig::default();
        assert_eq!(g.port, 8080);
        assert_eq!(g.bind, "0.0.0.0");
    }

    #[test]
    fn parses_camel_case_file() {
        let json = r#"{
            "gateway": { "port": 9000 },
            "channels": { "line": { "channelAccessToken": "a", "channelSecret": "s" } },
            "model": { "name": "gemini-2.0-flash", "timeoutSecs": 30 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.bind, "0.0.0.0");
        assert_eq!(config.channels.line.channel_secret.as_deref(), Some("s"));
        assert_eq!(config.model.timeout_secs, Some(30));
    }

    #[test]
    fn settings_require_access_token() {
        let mut config = config_with_secrets();
        config.channels.line.channel_access_token = Some("   ".to_string());
        let err = Settings::from_config(&config, "be helpful").unwrap_err();
        assert!(matches!(err, ConfigError::MissingAccessToken));
    }

    #[test]
    fn settings_require_channel_secret() {
        let mut config = config_with_secrets();
        config.channels.line.channel_secret = None;
        let err = Settings::from_config(&config, "be helpful").unwrap_err();
        assert!(matches!(err, ConfigError::MissingChannelSecret));
    }

    #[test]
    fn settings_reject_blank_instruction() {
        let err = Settings::from_config(&config_with_secrets(), " \n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyInstruction));
    }

    #[test]
    fn settings_defaults() {
        let settings = Settings::from_config(&config_with_secrets(), "be helpful").unwrap();
        assert_eq!(settings.model_name, "gemini-1.5-flash");
        assert_eq!(settings.line_api_base, "https://api.line.me");
        assert_eq!(
            settings.model_api_base,
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert!(settings.model_api_key.is_none());
        assert!(settings.model_timeout.is_none());
        assert_eq!(&*settings.system_instruction, "be helpful");
    }

    #[test]
    fn settings_trim_base_urls_and_zero_timeout() {
        let mut config = config_with_secrets();
        config.channels.line.api_base = Some("http://127.0.0.1:9999/".to_string());
        config.model.timeout_secs = Some(0);
        let settings = Settings::from_config(&config, "x").unwrap();
        assert_eq!(settings.line_api_base, "http://127.0.0.1:9999");
        assert!(settings.model_timeout.is_none());
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = config_with_secrets();
        config.channels.line.channel_secret = Some("s3cr3t-value".to_string());
        config.model.api_key = Some("AIza-key-value".to_string());
        let out = format!("{:?}", Settings::from_config(&config, "x").unwrap());
        assert!(!out.contains("s3cr3t-value"));
        assert!(!out.contains("AIza-key-value"));
    }

    #[test]
    fn instruction_source_configured_relative() {
        let mut config = Config::default();
        config.model.system_instruction_path = Some(PathBuf::from("prompts/analyst.md"));
        let path = Path::new("/home/user/.linerelay/config.json");
        assert_eq!(
            resolve_instruction_source(&config, path),
            InstructionSource::Configured(PathBuf::from("/home/user/.linerelay/prompts/analyst.md"))
        );
    }

    #[test]
    fn instruction_source_falls_back_to_bundled() {
        let config = Config::default();
        let path = Path::new("/nonexistent-linerelay-dir/config.json");
        assert_eq!(resolve_instruction_source(&config, path), InstructionSource::Bundled);
        let text = load_system_instruction(&config, path).unwrap();
        assert_eq!(text, DEFAULT_SYSTEM_INSTRUCTION);
    }

    #[test]
    fn missing_configured_instruction_is_an_error() {
        let mut config = Config::default();
        config.model.system_instruction_path =
            Some(PathBuf::from("/nonexistent-linerelay-dir/x.md"));
        let err = load_system_instruction(&config, Path::new("config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadInstruction { .. }));
    }
}
