//! # Configuration
//!
//! Environment-driven settings. A `.env` file in the working directory is
//! loaded first (see `main`), then process variables win.
//!
//! | Variable                    | Meaning                                   |
//! |-----------------------------|-------------------------------------------|
//! | `DATABASE_URL`              | Legacy database URL, carried for logging  |
//! | `SUPABASE_URL`              | Base URL of the hosted backend            |
//! | `SUPABASE_ANON_KEY`         | Public API key (fallback)                 |
//! | `SUPABASE_SERVICE_ROLE_KEY` | Privileged API key (preferred)            |
//! | `BAZAAR_HTTP_TIMEOUT_SECS`  | Per-request timeout, default 30           |

use crate::error::{BazaarError, BazaarResult};
use crate::jwt;
use std::time::Duration;
use tracing::warn;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings read from the environment
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub database_url: Option<String>,
    pub supabase_url: Option<String>,
    pub anon_key: Option<String>,
    pub service_role_key: Option<String>,
    pub http_timeout: Option<Duration>,
}

/// Which API key the remote backend will use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    ServiceRole,
    Anon,
}

/// Everything needed to talk to the remote backend
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub url: String,
    pub api_key: String,
    pub key_role: KeyRole,
    pub timeout: Duration,
}

impl Config {
    /// Reads settings from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let http_timeout = get("BAZAAR_HTTP_TIMEOUT_SECS").and_then(|v| match v.parse::<u64>() {
            Ok(secs) => Some(Duration::from_secs(secs)),
            Err(_) => {
                warn!("Ignoring BAZAAR_HTTP_TIMEOUT_SECS={:?}: not a number of seconds", v);
                None
            }
        });

        Self {
            database_url: get("DATABASE_URL"),
            supabase_url: get("SUPABASE_URL"),
            anon_key: get("SUPABASE_ANON_KEY"),
            service_role_key: get("SUPABASE_SERVICE_ROLE_KEY"),
            http_timeout,
        }
    }

    /// Resolves the remote backend settings.
    ///
    /// The service-role key is preferred; the anon key is accepted with a
    /// warning since row-level security will usually reject seed inserts.
    pub fn remote(&self) -> BazaarResult<RemoteConfig> {
        let url = self
            .supabase_url
            .as_deref()
            .ok_or_else(|| BazaarError::Config("SUPABASE_URL is not set".to_string()))?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(BazaarError::Config(format!(
                "SUPABASE_URL must be an http(s) URL, got '{}'",
                url
            )));
        }

        let (api_key, key_role) = match (&self.service_role_key, &self.anon_key) {
            (Some(key), _) => {
                check_key_role(key, "service_role");
                (key.clone(), KeyRole::ServiceRole)
            }
            (None, Some(key)) => {
                warn!("SUPABASE_SERVICE_ROLE_KEY is not set, falling back to the anon key");
                (key.clone(), KeyRole::Anon)
            }
            (None, None) => {
                return Err(BazaarError::Config(
                    "Set SUPABASE_SERVICE_ROLE_KEY (or SUPABASE_ANON_KEY)".to_string(),
                ))
            }
        };

        Ok(RemoteConfig {
            url: url.trim_end_matches('/').to_string(),
            api_key,
            key_role,
            timeout: self.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT),
        })
    }
}

/// Warns when a key's `role` claim is not the expected one. Opaque keys are let through.
fn check_key_role(key: &str, expected: &str) {
    if let Ok(payload) = jwt::decode_payload(key) {
        match jwt::claim_str(&payload, "role") {
            Some(role) if role != expected => {
                warn!("API key carries role '{}', expected '{}'", role, expected)
            }
            _ => {}
        }
        if jwt::is_expired(&payload, chrono::Utc::now()) {
            warn!("API key has expired");
        }
    }
}
