use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

// ── Defaults ─────────────────────────────────────────────────────────────────

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_ACCEPTED_TYPES: &[&str] =
    &["image/jpeg", "image/png", "image/gif", "application/pdf"];

const DEFAULT_TIMEOUT_SECS: u64 = 60;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is not valid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

// ── Config tree ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub upload: UploadPolicy,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
}

#[derive(Clone)]
pub struct UpstreamConfig {
    pub api_key: String,
    pub base_url: Url,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub max_retries: u32,
}

// The key stays out of logs.
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

/// Limits applied to every upload before any content is derived from it.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_bytes: usize,
    pub accepted_types: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            accepted_types: DEFAULT_ACCEPTED_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl UploadPolicy {
    pub fn accepts(&self, mime: &str) -> bool {
        self.accepted_types.iter().any(|t| t.eq_ignore_ascii_case(mime))
    }
}

// ── Loading ──────────────────────────────────────────────────────────────────

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_key = env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::Missing("ANTHROPIC_API_KEY"))?;

        let base_url = parse_base_url(
            &env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        )?;

        let accepted_types = match env::var("ACCEPTED_MIME_TYPES") {
            Ok(raw) => parse_type_list(&raw)?,
            Err(_) => UploadPolicy::default().accepted_types,
        };

        Ok(Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("PORT", 3000)?,
                static_dir: env::var("STATIC_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("public")),
            },
            upstream: UpstreamConfig {
                api_key,
                base_url,
                model: env::var("SUMMARIZER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
                max_tokens: parse_var("SUMMARIZER_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
                timeout: Duration::from_secs(parse_var(
                    "UPSTREAM_TIMEOUT_SECS",
                    DEFAULT_TIMEOUT_SECS,
                )?),
                max_retries: parse_var("UPSTREAM_MAX_RETRIES", 0)?,
            },
            upload: UploadPolicy {
                max_bytes: parse_var("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
                accepted_types,
            },
        })
    }
}

fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name: "ANTHROPIC_BASE_URL",
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            name: "ANTHROPIC_BASE_URL",
            reason: "only http and https URLs are allowed".to_string(),
        });
    }
    // `Url::join` replaces the last segment unless the path ends in a slash.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_type_list(raw: &str) -> Result<Vec<String>, ConfigError> {
    let types: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if types.is_empty() {
        return Err(ConfigError::Invalid {
            name: "ACCEPTED_MIME_TYPES",
            reason: "at least one type is required".to_string(),
        });
    }
    Ok(types)
}
