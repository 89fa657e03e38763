//! Account and session lifecycle
//!
//! Email/password registration and login, Google identity-provider
//! exchange, and refresh-token-backed persistent sessions. All
//! operations are built on the tree adapter: the long-term account
//! record lives under `users/{uid}` and persistent sessions under
//! `auth_sessions/{token}`.
//!
//! A persistent session is an opaque, unguessable token that lets a
//! returning client skip credentials: resumption loads the stored
//! refresh token, exchanges it for a fresh access token, and rotates
//! the stored refresh token in place. Two devices resuming the same
//! session concurrently can both succeed, in which case the second
//! rotation strands the first device's stored token until its next
//! resume. That window is known and accepted.

use serde_json::{json, Map, Value};
use url::Url;
use uuid::Uuid;

use crate::error::{QuillbaseError, Result};
use crate::tree::{Snapshot, TreeClient};
use crate::types::{now_ts, AuthUser, SessionRecord};
use crate::warnings::WarningChannel;

mod identity;
pub use identity::{IdentityClient, RefreshedToken};

/// Credential accepted by [`AuthClient::login_with_google`].
///
/// The UI layer may hold either a raw provider ID token or the full
/// sign-in result payload from a completed browser flow; both normalize
/// into the same user-merge path.
#[derive(Debug, Clone)]
pub enum GoogleCredential {
    /// A raw Google ID token, to be exchanged server-side
    IdToken(String),
    /// A complete sign-in result payload (contains `localId` when the
    /// exchange already happened)
    SignInResult(Map<String, Value>),
}

/// Result of [`AuthClient::google_auth_url`].
#[derive(Debug, Clone)]
pub struct GoogleAuthUrl {
    /// URL to open in the user's browser
    pub auth_uri: String,
    /// Opaque session id to echo back on code exchange, when the
    /// identity service issued one
    pub session_id: Option<String>,
}

/// Account and session operations.
///
/// Constructed by the [`Quillbase`](crate::client::Quillbase) facade;
/// when the backend is unconfigured, pair-style operations return
/// [`QuillbaseError::NotConfigured`] and the boolean ones return
/// `false`.
#[derive(Clone)]
pub struct AuthClient {
    db: Option<TreeClient>,
    identity: Option<IdentityClient>,
    google_client_id: Option<String>,
    google_client_secret: Option<String>,
    warnings: WarningChannel,
}

impl AuthClient {
    pub(crate) fn new(
        db: Option<TreeClient>,
        identity: Option<IdentityClient>,
        google_client_id: Option<String>,
        google_client_secret: Option<String>,
        warnings: WarningChannel,
    ) -> Self {
        Self {
            db,
            identity,
            google_client_id,
            google_client_secret,
            warnings,
        }
    }

    fn db(&self) -> Result<&TreeClient> {
        self.db.as_ref().ok_or(QuillbaseError::NotConfigured)
    }

    fn identity(&self) -> Result<&IdentityClient> {
        self.identity.as_ref().ok_or(QuillbaseError::NotConfigured)
    }

    /// Returns `true` when Google sign-in can be attempted.
    pub fn supports_google_auth(&self) -> bool {
        self.identity.is_some()
    }

    // -----------------------------------------------------------------------
    // Email/password accounts
    // -----------------------------------------------------------------------

    /// Registers a new account and writes its `users/{uid}` record.
    ///
    /// Upstream validation failures (weak password, duplicate email)
    /// surface as `Auth("Registration failed: <provider message>")`;
    /// the provider's wording is preserved.
    pub async fn register(&self, email: &str, password: &str) -> Result<()> {
        let db = self.db()?;
        let identity = self.identity()?;
        if email.is_empty() || password.is_empty() {
            return Err(QuillbaseError::Validation(
                "Email and password required.".to_string(),
            ));
        }

        let result = identity
            .sign_up(email, password)
            .await
            .map_err(|err| match err {
                QuillbaseError::Auth(message) => {
                    QuillbaseError::Auth(format!("Registration failed: {message}"))
                }
                other => other,
            })?;
        let uid = result
            .get("localId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                QuillbaseError::Auth("Registration failed: missing user id in response.".to_string())
            })?;

        db.root()
            .child("users")
            .child(uid)
            .set(&json!({
                "email": email.to_lowercase(),
                "created_at": now_ts(),
                "last_login": Value::Null,
                "auth_provider": "email",
            }))
            .await?;
        Ok(())
    }

    /// Signs in with email and password.
    ///
    /// On success the stored `users/{uid}` record is loaded and merged
    /// with the fresh tokens. The returned user always carries an email
    /// even when the stored record predates that field, and the stored
    /// record's `last_login`/`email` are updated in place.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthUser> {
        let db = self.db()?;
        let identity = self.identity()?;

        let result = identity.sign_in_with_password(email, password).await?;
        let uid = result
            .get("localId")
            .and_then(Value::as_str)
            .ok_or_else(|| QuillbaseError::Auth("Invalid credentials.".to_string()))?
            .to_string();

        let user_ref = db.root().child("users").child(&uid);
        let mut user_map = user_ref.get().await?.as_object().cloned().unwrap_or_default();

        let email_value = user_map
            .get("email")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| email.to_lowercase());
        let now = now_ts();

        user_map.insert("email".to_string(), json!(email_value));
        user_map.insert("uid".to_string(), json!(uid));
        user_map.insert("last_login".to_string(), json!(now));
        if let Some(id_token) = result.get("idToken").and_then(Value::as_str) {
            user_map.insert("id_token".to_string(), json!(id_token));
        }
        if let Some(refresh_token) = result.get("refreshToken").and_then(Value::as_str) {
            user_map.insert("refresh_token".to_string(), json!(refresh_token));
        }

        let mut stored_update = Map::new();
        stored_update.insert("last_login".to_string(), json!(now));
        stored_update.insert("email".to_string(), json!(email_value));
        user_ref.update(&stored_update).await?;

        Ok(serde_json::from_value(Value::Object(user_map))?)
    }

    // -----------------------------------------------------------------------
    // Google sign-in
    // -----------------------------------------------------------------------

    /// Signs in with a Google credential.
    ///
    /// Raw ID tokens are exchanged via the identity-provider endpoint;
    /// completed sign-in payloads skip the exchange. Both paths merge
    /// into the same `users/{uid}` record with
    /// `auth_provider = "google"`.
    pub async fn login_with_google(&self, credential: GoogleCredential) -> Result<AuthUser> {
        let db = self.db()?;
        let identity = self.identity()?;

        let id_token = match credential {
            GoogleCredential::SignInResult(map) if map.contains_key("localId") => {
                return self.process_google_sign_in(db, &map).await;
            }
            GoogleCredential::SignInResult(map) => map
                .get("id_token")
                .or_else(|| map.get("idToken"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    QuillbaseError::Validation(
                        "Google authentication payload missing ID token.".to_string(),
                    )
                })?,
            GoogleCredential::IdToken(token) => token,
        };

        let post_body = format!("id_token={id_token}&providerId=google.com");
        let result = identity
            .sign_in_with_idp(&post_body, "http://localhost", None)
            .await
            .map_err(|err| match err {
                QuillbaseError::Auth(_) => {
                    QuillbaseError::Auth("Google authentication failed.".to_string())
                }
                other => other,
            })?;
        self.process_google_sign_in(db, &result).await
    }

    async fn process_google_sign_in(
        &self,
        db: &TreeClient,
        result: &Map<String, Value>,
    ) -> Result<AuthUser> {
        let uid = result
            .get("localId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                QuillbaseError::Auth("Google sign-in result missing user id.".to_string())
            })?;
        let email = result
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();

        let mut user_data = Map::new();
        user_data.insert("email".to_string(), json!(email));
        user_data.insert("uid".to_string(), json!(uid));
        user_data.insert("auth_provider".to_string(), json!("google"));
        user_data.insert("last_login".to_string(), json!(now_ts()));
        if let Some(id_token) = result.get("idToken").and_then(Value::as_str) {
            user_data.insert("id_token".to_string(), json!(id_token));
        }
        if let Some(refresh_token) = result.get("refreshToken").and_then(Value::as_str) {
            user_data.insert("refresh_token".to_string(), json!(refresh_token));
        }

        db.root().child("users").child(uid).update(&user_data).await?;
        Ok(serde_json::from_value(Value::Object(user_data))?)
    }

    /// Builds a Google sign-in URL for the browser.
    ///
    /// With explicit OAuth client credentials the URL is constructed
    /// locally; otherwise the identity service's auth-URI endpoint is
    /// asked to build one (and may return a session id to echo back on
    /// code exchange).
    pub async fn google_auth_url(
        &self,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> Result<GoogleAuthUrl> {
        let identity = self.identity()?;

        if let Some(client_id) = &self.google_client_id {
            if self.google_client_secret.is_some() {
                let mut params = vec![
                    ("client_id", client_id.as_str()),
                    ("redirect_uri", redirect_uri),
                    ("response_type", "code"),
                    ("scope", "openid email profile"),
                    ("access_type", "online"),
                ];
                if let Some(state) = state {
                    params.push(("state", state));
                }
                let url =
                    Url::parse_with_params("https://accounts.google.com/o/oauth2/v2/auth", &params)?;
                return Ok(GoogleAuthUrl {
                    auth_uri: url.to_string(),
                    session_id: None,
                });
            }
        }

        let result = identity
            .create_auth_uri("google.com", redirect_uri, state)
            .await?;
        let auth_uri = result
            .get("authUri")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let session_id = result
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(GoogleAuthUrl {
            auth_uri,
            session_id,
        })
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// Uses the Google token endpoint when OAuth client credentials are
    /// configured; otherwise the code goes through the identity-provider
    /// sign-in endpoint with the session id from
    /// [`google_auth_url`](Self::google_auth_url).
    pub async fn exchange_code_for_token(
        &self,
        code: &str,
        redirect_uri: &str,
        session_id: Option<&str>,
    ) -> Result<Map<String, Value>> {
        let identity = self.identity()?;

        if let (Some(client_id), Some(client_secret)) =
            (&self.google_client_id, &self.google_client_secret)
        {
            return identity
                .exchange_google_code(code, client_id, client_secret, redirect_uri)
                .await;
        }

        let post_body = format!(
            "code={}&providerId=google.com",
            urlencode(code)
        );
        identity
            .sign_in_with_idp(&post_body, redirect_uri, session_id)
            .await
    }

    // -----------------------------------------------------------------------
    // Persistent sessions
    // -----------------------------------------------------------------------

    /// Creates a persistent session backed by `refresh_token` and
    /// returns its opaque token.
    pub async fn create_persistent_session(
        &self,
        user_id: &str,
        refresh_token: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<String> {
        let db = self.db()?;
        if refresh_token.is_empty() {
            return Err(QuillbaseError::Validation(
                "Missing refresh token.".to_string(),
            ));
        }

        let token = Uuid::new_v4().simple().to_string();
        let now = now_ts();
        let record = SessionRecord {
            user_id: user_id.to_string(),
            refresh_token: refresh_token.to_string(),
            created_at: now,
            updated_at: now,
            metadata,
        };
        db.root()
            .child("auth_sessions")
            .child(&token)
            .set(&serde_json::to_value(&record)?)
            .await?;
        self.warnings.clear();
        Ok(token)
    }

    /// Resumes a persistent session: exchanges the stored refresh token
    /// for a fresh access token and rotates the stored token in place.
    ///
    /// Fails with distinct messages for a missing record ("Session not
    /// found."), a corrupted record, and a record with no refresh token.
    /// Upstream refresh failures, including a token already rotated by
    /// a resume on another device, surface verbatim. Bookkeeping
    /// failures after a successful refresh degrade to a warning; the
    /// resumed user is still returned.
    pub async fn resume_session(&self, session_token: &str) -> Result<AuthUser> {
        let db = self.db()?;
        let identity = self.identity()?;
        if session_token.is_empty() {
            return Err(QuillbaseError::Validation(
                "Missing session token.".to_string(),
            ));
        }

        let session_ref = db.root().child("auth_sessions").child(session_token);
        let record = match session_ref.get().await? {
            Snapshot::Object(map) => map,
            Snapshot::Missing => {
                return Err(QuillbaseError::NotFound("Session not found.".to_string()))
            }
            _ => {
                return Err(QuillbaseError::Validation(
                    "Session data is corrupted.".to_string(),
                ))
            }
        };

        let refresh_token = record
            .get("refresh_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                QuillbaseError::Validation("Session missing refresh token.".to_string())
            })?;

        let refreshed = identity.refresh_id_token(refresh_token).await?;

        let user_id = refreshed
            .user_id
            .clone()
            .or_else(|| {
                record
                    .get("user_id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .ok_or_else(|| {
                QuillbaseError::Validation("Session missing user information.".to_string())
            })?;
        let id_token = refreshed.id_token.clone().ok_or_else(|| {
            QuillbaseError::Auth("Failed to refresh authentication token.".to_string())
        })?;
        let new_refresh_token = refreshed
            .refresh_token
            .clone()
            .unwrap_or_else(|| refresh_token.to_string());

        let user_ref = db.root().child("users").child(&user_id);
        let mut user_map = user_ref.get().await?.as_object().cloned().unwrap_or_default();

        // Older session records stashed the email in their metadata;
        // fall back to it so the returned user always has one.
        if user_map.get("email").and_then(Value::as_str).is_none() {
            let metadata_email = record
                .get("metadata")
                .and_then(Value::as_object)
                .and_then(|metadata| metadata.get("email"))
                .and_then(Value::as_str);
            if let Some(email) = metadata_email {
                user_map.insert("email".to_string(), json!(email));
            }
        }

        let now = now_ts();
        user_map.insert("uid".to_string(), json!(user_id));
        user_map.insert("id_token".to_string(), json!(id_token));
        user_map.insert("refresh_token".to_string(), json!(new_refresh_token));
        user_map.insert("last_login".to_string(), json!(now));

        let mut session_update = Map::new();
        session_update.insert("refresh_token".to_string(), json!(new_refresh_token));
        session_update.insert("updated_at".to_string(), json!(now));
        if let Some(expires_in) = &refreshed.expires_in {
            session_update.insert("expires_in".to_string(), json!(expires_in));
        }
        let mut user_update = Map::new();
        user_update.insert("last_login".to_string(), json!(now));

        let bookkeeping = async {
            session_ref.update(&session_update).await?;
            user_ref.update(&user_update).await
        };
        match bookkeeping.await {
            Ok(()) => self.warnings.clear(),
            Err(err) => self
                .warnings
                .record(format!("Failed to update session metadata: {err}")),
        }

        Ok(serde_json::from_value(Value::Object(user_map))?)
    }

    /// Deletes a persistent session.
    ///
    /// Idempotent: returns `false`, never an error, when the token is
    /// unknown or empty or the backend is unconfigured.
    pub async fn delete_persistent_session(&self, session_token: &str) -> bool {
        let Some(db) = &self.db else {
            return false;
        };
        if session_token.is_empty() {
            return false;
        }

        let session_ref = db.root().child("auth_sessions").child(session_token);
        match session_ref.get().await {
            Ok(snapshot) if !snapshot.is_missing() => {}
            _ => return false,
        }
        match session_ref.remove().await {
            Ok(()) => {
                self.warnings.clear();
                true
            }
            Err(err) => {
                self.warnings
                    .record(format!("Failed to delete session token: {err}"));
                false
            }
        }
    }
}

/// Minimal percent-encoding for values embedded in an identity-provider
/// post body.
fn urlencode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}
