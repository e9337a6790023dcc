//! Runtime configuration parsed from CLI flags and environment variables.
//!
//! Every flag is backed by an environment variable so a `.env` file (loaded
//! by the binary through `dotenvy`) is enough to run the client.

use std::path::PathBuf;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Path appended to the API base URL when no events URL is configured.
const DEFAULT_EVENTS_PATH: &str = "/api/events";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    EmptyValue(&'static str),
    #[error("{name} must use http:// or https:// and include a host (got `{value}`)")]
    InvalidUrl { name: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Raw flags as accepted on the command line.
#[derive(Debug, Clone, clap::Args)]
pub struct ConfigArgs {
    /// Base URL of the hosted auth service.
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: String,

    /// Public (anon) key sent with every auth request.
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    pub supabase_anon_key: String,

    /// Base URL serving `/api/getNames` and `/api/saveName`.
    #[arg(long, env = "PETNAMER_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_base_url: String,

    /// Generation event endpoint. Defaults to `<api base>/api/events`.
    #[arg(long, env = "PETNAMER_EVENTS_URL")]
    pub events_url: Option<String>,

    /// Application id attached to generation events.
    #[arg(long, env = "PETNAMER_APP_ID")]
    pub app_id: Option<String>,

    /// File used to keep the session across restarts.
    #[arg(long, env = "PETNAMER_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    #[arg(long, env = "PETNAMER_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "PETNAMER_CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub url: String,
    pub anon_key: String,
    pub session_file: Option<PathBuf>,
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub auth: AuthSettings,
    pub api_base_url: String,
    pub events_url: String,
    pub app_id: Option<String>,
    pub timeouts: HttpTimeouts,
}

impl AppConfig {
    /// Validate and normalize raw flags.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for blank keys, malformed URLs, or zero
    /// timeouts.
    pub fn from_args(args: ConfigArgs) -> Result<Self, ConfigError> {
        let auth_url = normalize_base_url("SUPABASE_URL", &args.supabase_url)?;
        let anon_key = args.supabase_anon_key.trim().to_string();
        if anon_key.is_empty() {
            return Err(ConfigError::EmptyValue("SUPABASE_ANON_KEY"));
        }

        let api_base_url = normalize_base_url("PETNAMER_API_BASE_URL", &args.api_base_url)?;
        let events_url = match non_empty(args.events_url) {
            Some(raw) => normalize_base_url("PETNAMER_EVENTS_URL", &raw)?,
            None => format!("{api_base_url}{DEFAULT_EVENTS_PATH}"),
        };

        if args.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("PETNAMER_REQUEST_TIMEOUT_SECS"));
        }
        if args.connect_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("PETNAMER_CONNECT_TIMEOUT_SECS"));
        }

        Ok(Self {
            auth: AuthSettings { url: auth_url, anon_key, session_file: args.session_file },
            api_base_url,
            events_url,
            app_id: non_empty(args.app_id),
            timeouts: HttpTimeouts {
                request_secs: args.request_timeout_secs,
                connect_secs: args.connect_timeout_secs,
            },
        })
    }
}

/// Trim whitespace and trailing slashes; require an http(s) scheme and host.
///
/// # Errors
///
/// Returns a [`ConfigError`] when the value is blank or not an http(s) URL.
pub fn normalize_base_url(name: &'static str, raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyValue(name));
    }
    let invalid = || ConfigError::InvalidUrl { name, value: raw.to_string() };
    let Some((scheme, remainder)) = trimmed.split_once("://") else {
        return Err(invalid());
    };
    if !matches!(scheme, "http" | "https") || remainder.trim().is_empty() || remainder.starts_with('/') {
        return Err(invalid());
    }
    Ok(trimmed.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
