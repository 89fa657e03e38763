//! Configuration management for Quillbase
//!
//! This module handles loading, parsing, and validating backend
//! configuration from YAML files and environment variables. A partially
//! filled or placeholder configuration is legal: the facade then runs in
//! the unconfigured state where every operation degrades to a no-op
//! instead of failing the surrounding application.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default base URL for the account endpoints (sign-up, sign-in,
/// identity-provider exchange, auth-URI creation).
fn default_identity_base() -> String {
    "https://identitytoolkit.googleapis.com".to_string()
}

/// Default base URL for the refresh-token exchange endpoint.
fn default_token_base() -> String {
    "https://securetoken.googleapis.com".to_string()
}

/// Fixed per-request timeout in seconds. There is no retry logic
/// anywhere, so a timed-out request is reported exactly once.
fn default_timeout_secs() -> u64 {
    10
}

/// Backend configuration for Quillbase
///
/// All identity fields are optional; [`Config::is_complete`] decides
/// whether persistence can be enabled. The `identity_base` and
/// `token_base` fields exist so tests can point the auth endpoints at a
/// local mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API key sent as a query parameter on every backend request
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the path-addressed tree database
    #[serde(default)]
    pub database_url: Option<String>,

    /// Project identifier, used only for placeholder detection
    #[serde(default)]
    pub project_id: Option<String>,

    /// Hosted auth domain (informational; kept for config parity)
    #[serde(default)]
    pub auth_domain: Option<String>,

    /// Google OAuth client id for the local auth-URL path
    #[serde(default)]
    pub google_client_id: Option<String>,

    /// Google OAuth client secret, paired with `google_client_id`
    #[serde(default)]
    pub google_client_secret: Option<String>,

    /// Base URL for account endpoints (overridable for tests and mocks)
    #[serde(default = "default_identity_base")]
    pub identity_base: String,

    /// Base URL for the token refresh endpoint (overridable for tests)
    #[serde(default = "default_token_base")]
    pub token_base: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            database_url: None,
            project_id: None,
            auth_domain: None,
            google_client_id: None,
            google_client_secret: None,
            identity_base: default_identity_base(),
            token_base: default_token_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Tokens that indicate a configuration value was copied from a setup
/// guide and never filled in.
const PLACEHOLDER_TOKENS: [&str; 4] = ["your-project", "your_project", "your-backend", "<"];

impl Config {
    /// Loads configuration from a YAML file.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use quillbase::Config;
    ///
    /// let config = Config::load("quillbase.yaml").unwrap();
    /// assert!(config.timeout_secs > 0);
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Builds configuration from `QUILLBASE_*` environment variables.
    ///
    /// Recognized variables: `QUILLBASE_API_KEY`, `QUILLBASE_DATABASE_URL`,
    /// `QUILLBASE_PROJECT_ID`, `QUILLBASE_AUTH_DOMAIN`,
    /// `QUILLBASE_GOOGLE_CLIENT_ID`, `QUILLBASE_GOOGLE_CLIENT_SECRET`,
    /// `QUILLBASE_IDENTITY_BASE`, `QUILLBASE_TOKEN_BASE`.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let defaults = Config::default();
        Self {
            api_key: var("QUILLBASE_API_KEY"),
            database_url: var("QUILLBASE_DATABASE_URL"),
            project_id: var("QUILLBASE_PROJECT_ID"),
            auth_domain: var("QUILLBASE_AUTH_DOMAIN"),
            google_client_id: var("QUILLBASE_GOOGLE_CLIENT_ID"),
            google_client_secret: var("QUILLBASE_GOOGLE_CLIENT_SECRET"),
            identity_base: var("QUILLBASE_IDENTITY_BASE").unwrap_or(defaults.identity_base),
            token_base: var("QUILLBASE_TOKEN_BASE").unwrap_or(defaults.token_base),
            timeout_secs: defaults.timeout_secs,
        }
    }

    /// Returns `true` when the fields required for persistence are set.
    pub fn is_complete(&self) -> bool {
        self.api_key.is_some() && self.database_url.is_some()
    }

    /// Returns `true` when any identity field still carries a
    /// placeholder value from a setup template.
    pub fn has_placeholders(&self) -> bool {
        [&self.api_key, &self.database_url, &self.project_id]
            .into_iter()
            .flatten()
            .any(|value| PLACEHOLDER_TOKENS.iter().any(|token| value.contains(token)))
    }

    /// Returns `true` when Google sign-in can be attempted. An API key is
    /// sufficient: without explicit OAuth client credentials the
    /// identity-toolkit auth-URI path is used instead.
    pub fn supports_google_auth(&self) -> bool {
        self.api_key.is_some()
    }
}
