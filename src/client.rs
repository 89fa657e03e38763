//! Top-level facade wiring configuration to the stores
//!
//! [`Quillbase::new`] decides once, at construction, whether persistence
//! is enabled. An incomplete or placeholder configuration produces a
//! working facade whose stores degrade to no-ops, so the surrounding
//! application keeps running without a backend.

use std::time::Duration;

use tracing::info;

use crate::auth::{AuthClient, IdentityClient};
use crate::config::Config;
use crate::store::{MessageStore, TemplateStore};
use crate::tree::TreeClient;
use crate::warnings::WarningChannel;

/// Entry point for the persistence layer.
///
/// Cloning is cheap; every clone shares the same HTTP connection pools
/// and warning slot.
///
/// # Examples
///
/// ```no_run
/// use quillbase::{Config, Quillbase};
///
/// # async fn demo() -> quillbase::Result<()> {
/// let client = Quillbase::new(Config::load("quillbase.yaml")?);
/// if client.is_configured() {
///     let sessions = client.messages().list_sessions("user-1", None).await;
///     println!("{} sessions", sessions.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Quillbase {
    config: Config,
    db: Option<TreeClient>,
    auth: AuthClient,
    messages: MessageStore,
    templates: TemplateStore,
    warnings: WarningChannel,
}

impl Quillbase {
    /// Builds the facade from a configuration.
    ///
    /// Never fails: configuration problems (missing fields, placeholder
    /// values, a malformed database URL) disable persistence and leave a
    /// warning in the channel instead.
    pub fn new(config: Config) -> Self {
        let warnings = WarningChannel::default();
        let timeout = Duration::from_secs(config.timeout_secs);

        let db = if !config.is_complete() {
            warnings.record(
                "Backend configuration is incomplete; persistence is disabled.".to_string(),
            );
            None
        } else if config.has_placeholders() {
            warnings.record(
                "Backend initialization skipped: placeholder configuration detected.".to_string(),
            );
            None
        } else {
            // is_complete() checked the field above
            let database_url = config.database_url.as_deref().unwrap_or_default();
            match TreeClient::new(
                database_url,
                config.api_key.as_deref(),
                timeout,
                warnings.clone(),
            ) {
                Ok(client) => {
                    info!(target: "quillbase", "backend persistence enabled");
                    Some(client)
                }
                Err(err) => {
                    warnings.record(format!("Backend initialization failed: {err}"));
                    None
                }
            }
        };

        let identity = match (&db, &config.api_key) {
            (Some(_), Some(api_key)) => {
                IdentityClient::new(api_key, &config.identity_base, &config.token_base, timeout)
                    .ok()
            }
            _ => None,
        };

        let auth = AuthClient::new(
            db.clone(),
            identity,
            config.google_client_id.clone(),
            config.google_client_secret.clone(),
            warnings.clone(),
        );
        let messages = MessageStore::new(db.clone(), warnings.clone());
        let templates = TemplateStore::new(db.clone(), warnings.clone());

        Self {
            config,
            db,
            auth,
            messages,
            templates,
            warnings,
        }
    }

    /// Builds the facade from `QUILLBASE_*` environment variables.
    pub fn from_env() -> Self {
        Self::new(Config::from_env())
    }

    /// Returns `true` when a backend is attached and writes will be
    /// attempted.
    pub fn is_configured(&self) -> bool {
        self.db.is_some()
    }

    /// Authentication and session operations.
    pub fn auth(&self) -> AuthClient {
        self.auth.clone()
    }

    /// Message log and session metadata operations.
    pub fn messages(&self) -> MessageStore {
        self.messages.clone()
    }

    /// Template operations.
    pub fn templates(&self) -> TemplateStore {
        self.templates.clone()
    }

    /// Takes the most recent degradation warning, clearing the slot.
    pub fn take_warning(&self) -> Option<String> {
        self.warnings.take()
    }

    /// The configuration this facade was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }
}
