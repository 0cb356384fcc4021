use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContadorConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub twilio: TwilioConfig,
    #[serde(default)]
    pub digest: DigestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Today's total above which replies become a warning
    #[serde(default = "default_daily_threshold")]
    pub daily_threshold: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            daily_threshold: default_daily_threshold(),
        }
    }
}

/// Twilio must reach the webhook, so listen on every interface
fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_daily_threshold() -> f64 {
    50000.0
}

#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            max_tokens: default_openai_max_tokens(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt)
            .finish()
    }
}

fn default_openai_base_url() -> String {
    contador_core::providers::openai::DEFAULT_OPENAI_BASE_URL.to_string()
}

fn default_openai_model() -> String {
    contador_core::providers::openai::DEFAULT_OPENAI_MODEL.to_string()
}

fn default_openai_max_tokens() -> u32 {
    1024
}

fn default_system_prompt() -> String {
    contador_core::providers::ASSISTANT_PERSONA.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default = "default_range")]
    pub range: String,
    #[serde(default = "default_credentials_file")]
    pub credentials_file: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            range: default_range(),
            credentials_file: default_credentials_file(),
        }
    }
}

fn default_range() -> String {
    contador_core::ledger::DEFAULT_RANGE.to_string()
}

fn default_credentials_file() -> String {
    "google-credentials.json".to_string()
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TwilioConfig {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    /// Bot identity messages are sent from
    #[serde(default)]
    pub from_number: String,
    /// Recipient of the weekly digest
    #[serde(default)]
    pub to_number: String,
}

impl std::fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &mask_secret(&self.auth_token))
            .field("from_number", &self.from_number)
            .field("to_number", &self.to_number)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_digest_cron")]
    pub cron: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: default_digest_cron(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_digest_cron() -> String {
    contador_scheduler::DEFAULT_DIGEST_CRON.to_string()
}

/// Mask a secret string for safe display in Debug output / logs.
/// Shows first 3 and last 4 chars for keys longer than 7 chars, otherwise "***".
fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".contador")
}

/// Template written by `contador init`, also used when no config file exists
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

impl ContadorConfig {
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        match custom_path {
            Some(path) => Self::load_from(path),
            None => Self::load_or_default(&config_dir().join("config.toml")),
        }
    }

    /// Load `path` if present, otherwise the built-in template with `${VAR}`
    /// references filled from the environment
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load_from(path);
        }
        info!(
            "No config at {}, using built-in defaults and environment",
            path.display()
        );
        Self::parse(DEFAULT_CONFIG).context("Failed to parse built-in default config")
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        // Refuse group/other-readable files, they may hold secrets
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(path) {
                let mode = metadata.permissions().mode();
                if mode & 0o077 != 0 {
                    return Err(anyhow::anyhow!(
                        "Config file {:?} has overly permissive permissions ({:o}). \
                         It may contain secrets. Fix with: chmod 600 {:?}",
                        path,
                        mode & 0o777,
                        path
                    ));
                }
            }
        }

        let content = std::fs::read_to_string(path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `contador init` first.",
                path.display()
            )
        })?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;

        if config.openai.api_key.starts_with("sk-") && !content.contains("${OPENAI_API_KEY}") {
            warn!(
                "API key is hardcoded in config file. For security, use environment variables: api_key = \"${{OPENAI_API_KEY}}\""
            );
        }

        if !config.twilio.auth_token.is_empty() && !content.contains("${TWILIO_AUTH_TOKEN}") {
            warn!(
                "Twilio auth token is hardcoded in config file. For security, use environment variables: auth_token = \"${{TWILIO_AUTH_TOKEN}}\""
            );
        }

        Ok(config)
    }

    /// Parse config text after expanding allowlisted `${VAR}` references
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        Ok(toml::from_str(&expanded)?)
    }
}

/// Allowlist of environment variable names that may be expanded in config files.
const ALLOWED_ENV_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "SHEET_ID",
    "TWILIO_SID",
    "TWILIO_AUTH_TOKEN",
    "TWILIO_NUMBER",
    "USER_NUMBER",
    "HOME",
    "USER",
];

fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(start) = result[pos..].find("${") else {
            break;
        };
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = result[abs_start + 2..abs_start + end].to_string();

        if !ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            pos = abs_start + end + 1;
            continue;
        }

        let value = std::env::var(&var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value.len();
    }
    result
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(s: &str) -> PathBuf {
    match (s.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(s),
    }
}
