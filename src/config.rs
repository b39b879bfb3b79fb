//! Client configuration parsed from environment variables.
//!
//! Every problem is collected before failing so a misconfigured deployment
//! reports all missing variables in one pass.

use std::time::Duration;

use crate::storage::AUTH_KEY_PREFIX;

pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_AUTH_STORAGE_KEY: &str = "supabase.auth.token";
pub const DEFAULT_HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_EXCHANGE_RATE_URLS: [&str; 2] = [
    "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@latest/v1/currencies/pln.min.json",
    "https://latest.currency-api.pages.dev/v1/currencies/pln.json",
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid client configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl HttpTimeouts {
    /// Read `HTTP_REQUEST_TIMEOUT_SECS` / `HTTP_CONNECT_TIMEOUT_SECS`; unset or
    /// malformed values keep the defaults.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            request_secs: parse_u64(&lookup, "HTTP_REQUEST_TIMEOUT_SECS", DEFAULT_HTTP_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_u64(&lookup, "HTTP_CONNECT_TIMEOUT_SECS", DEFAULT_HTTP_CONNECT_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_HTTP_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_HTTP_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub supabase_url: String,
    pub supabase_publishable_key: String,
    pub backend_api_url: String,
    pub app_origin: String,
    pub auth_storage_key: String,
    pub exchange_rate_urls: Vec<String>,
    pub timeouts: HttpTimeouts,
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Required:
    /// - `SUPABASE_URL`
    /// - `SUPABASE_PUBLISHABLE_KEY`
    /// - `BACKEND_API_URL`
    ///
    /// Optional:
    /// - `APP_ORIGIN`: default `http://localhost:5173`
    /// - `AUTH_STORAGE_KEY`: default `supabase.auth.token`; must start with `supabase.auth`
    /// - `EXCHANGE_RATE_URLS`: comma-separated, tried in order
    /// - `HTTP_REQUEST_TIMEOUT_SECS`: default 30
    /// - `HTTP_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] listing every missing or malformed variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (environment, CLI overrides, tests).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] listing every missing or malformed value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut problems = Vec::new();

        let supabase_url = required_url(&lookup, "SUPABASE_URL", &mut problems);
        let supabase_publishable_key = match lookup("SUPABASE_PUBLISHABLE_KEY").filter(|v| !v.trim().is_empty()) {
            Some(key) => key.trim().to_owned(),
            None => {
                problems.push("SUPABASE_PUBLISHABLE_KEY is required".to_owned());
                String::new()
            }
        };
        let backend_api_url = required_url(&lookup, "BACKEND_API_URL", &mut problems);

        let app_origin = match lookup("APP_ORIGIN").filter(|v| !v.trim().is_empty()) {
            Some(raw) => normalize_url("APP_ORIGIN", &raw, &mut problems),
            None => DEFAULT_APP_ORIGIN.to_owned(),
        };
        // Forced logout clears keys by prefix, so the session key must share it.
        let auth_storage_key = match lookup("AUTH_STORAGE_KEY").map(|v| v.trim().to_owned()).filter(|v| !v.is_empty()) {
            Some(key) if key.starts_with(AUTH_KEY_PREFIX) => key,
            Some(_) => {
                problems.push(format!("AUTH_STORAGE_KEY must start with {AUTH_KEY_PREFIX}"));
                String::new()
            }
            None => DEFAULT_AUTH_STORAGE_KEY.to_owned(),
        };
        let exchange_rate_urls = exchange_rate_urls(lookup("EXCHANGE_RATE_URLS").as_deref());
        let timeouts = HttpTimeouts::from_lookup(&lookup);

        if !problems.is_empty() {
            return Err(ConfigError::Invalid(problems));
        }

        Ok(Self {
            supabase_url,
            supabase_publishable_key,
            backend_api_url,
            app_origin,
            auth_storage_key,
            exchange_rate_urls,
            timeouts,
        })
    }

    /// Redirect target for password-reset emails.
    #[must_use]
    pub fn password_reset_redirect(&self) -> String {
        format!("{}/update-password", self.app_origin)
    }
}

fn required_url<F>(lookup: &F, key: &str, problems: &mut Vec<String>) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => normalize_url(key, &raw, problems),
        None => {
            problems.push(format!("{key} is required"));
            String::new()
        }
    }
}

fn normalize_url(key: &str, raw: &str, problems: &mut Vec<String>) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    match reqwest::Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => trimmed.to_owned(),
        _ => {
            problems.push(format!("{key} must be a valid URL"));
            String::new()
        }
    }
}

/// Parse a comma-separated `EXCHANGE_RATE_URLS` value; unset or empty lists
/// fall back to [`DEFAULT_EXCHANGE_RATE_URLS`].
#[must_use]
pub fn exchange_rate_urls(raw: Option<&str>) -> Vec<String> {
    let urls: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect();
    if urls.is_empty() { DEFAULT_EXCHANGE_RATE_URLS.iter().map(|u| (*u).to_owned()).collect() } else { urls }
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
