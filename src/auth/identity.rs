//! REST client for the identity endpoints
//!
//! Wraps the account endpoints (`accounts:signUp`,
//! `accounts:signInWithPassword`, `accounts:signInWithIdp`,
//! `accounts:createAuthUri`) and the refresh-token exchange endpoint.
//! Upstream error messages are extracted from the response body and
//! surfaced verbatim: credential problems are reported in the
//! provider's own words, never re-interpreted here.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::error::{QuillbaseError, Result};

/// Raw JSON response from the refresh-token endpoint.
///
/// The endpoint reports numbers as strings (`"expires_in": "3600"`);
/// the fields are kept as received because `expires_in` is stored back
/// into the session record unmodified.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshedToken {
    /// User the refresh token belongs to
    #[serde(default)]
    pub user_id: Option<String>,

    /// Fresh short-lived access token
    #[serde(default)]
    pub id_token: Option<String>,

    /// Rotated refresh token; the previous one is invalidated upstream
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Lifetime of the new access token, in seconds, as a string
    #[serde(default)]
    pub expires_in: Option<String>,
}

/// Client for the auth REST endpoints.
///
/// Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    api_key: String,
    identity_base: String,
    token_base: String,
}

impl IdentityClient {
    /// Creates a client with a fixed per-request timeout.
    pub fn new(
        api_key: &str,
        identity_base: &str,
        token_base: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            identity_base: identity_base.trim_end_matches('/').to_string(),
            token_base: token_base.trim_end_matches('/').to_string(),
        })
    }

    /// Registers a new email/password account.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Map<String, Value>> {
        self.post_accounts(
            "signUp",
            serde_json::json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }),
        )
        .await
    }

    /// Signs in with email and password.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Map<String, Value>> {
        self.post_accounts(
            "signInWithPassword",
            serde_json::json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }),
        )
        .await
    }

    /// Exchanges an identity-provider credential (`post_body` in
    /// `application/x-www-form-urlencoded` form, e.g.
    /// `id_token=...&providerId=google.com`) for account tokens.
    pub async fn sign_in_with_idp(
        &self,
        post_body: &str,
        request_uri: &str,
        session_id: Option<&str>,
    ) -> Result<Map<String, Value>> {
        let mut payload = serde_json::json!({
            "postBody": post_body,
            "requestUri": request_uri,
            "returnIdpCredential": true,
            "returnSecureToken": true,
        });
        if let Some(session_id) = session_id {
            payload["sessionId"] = Value::String(session_id.to_string());
        }
        self.post_accounts("signInWithIdp", payload).await
    }

    /// Asks the identity service to build a provider sign-in URL.
    pub async fn create_auth_uri(
        &self,
        provider_id: &str,
        continue_uri: &str,
        state: Option<&str>,
    ) -> Result<Map<String, Value>> {
        let mut payload = serde_json::json!({
            "providerId": provider_id,
            "continueUri": continue_uri,
        });
        if let Some(state) = state {
            payload["state"] = Value::String(state.to_string());
        }
        self.post_accounts("createAuthUri", payload).await
    }

    /// Exchanges a refresh token for a fresh access token.
    ///
    /// Upstream failures (expired or revoked tokens, a token rotated by
    /// a concurrent resume elsewhere) surface as
    /// [`QuillbaseError::Auth`] carrying the provider's message.
    pub async fn refresh_id_token(&self, refresh_token: &str) -> Result<RefreshedToken> {
        if refresh_token.is_empty() {
            return Err(QuillbaseError::Validation(
                "Missing refresh token.".to_string(),
            ));
        }
        let url = format!("{}/v1/token?key={}", self.token_base, self.api_key);
        debug!(target: "quillbase", "POST token refresh");
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|err| classify_transport(err, "refreshing session"))?;

        let status = response.status();
        let body = read_json_body(response).await?;
        if !status.is_success() {
            return Err(QuillbaseError::Auth(extract_error_message(
                &body,
                "Failed to refresh session.",
            )));
        }
        Ok(serde_json::from_value(body)?)
    }

    /// Exchanges an authorization code at the Google OAuth token
    /// endpoint using explicit client credentials.
    pub async fn exchange_google_code(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> Result<Map<String, Value>> {
        debug!(target: "quillbase", "POST oauth code exchange");
        let response = self
            .http
            .post("https://oauth2.googleapis.com/token")
            .form(&[
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|err| classify_transport(err, "exchanging the authorization code"))?;

        let status = response.status();
        let body = read_json_body(response).await?;
        if !status.is_success() {
            return Err(QuillbaseError::Auth(extract_error_message(
                &body,
                "Failed to exchange authorization code.",
            )));
        }
        match body {
            Value::Object(map) => Ok(map),
            other => Err(QuillbaseError::Auth(format!(
                "Token endpoint returned an unexpected response: {other}"
            ))),
        }
    }

    async fn post_accounts(&self, endpoint: &str, payload: Value) -> Result<Map<String, Value>> {
        let url = format!(
            "{}/v1/accounts:{}?key={}",
            self.identity_base, endpoint, self.api_key
        );
        debug!(target: "quillbase", endpoint, "POST accounts");
        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| classify_transport(err, "contacting the authentication service"))?;

        let status = response.status();
        let body = read_json_body(response).await?;
        if !status.is_success() {
            return Err(QuillbaseError::Auth(extract_error_message(
                &body,
                "Authentication request failed.",
            )));
        }
        match body {
            Value::Object(map) => Ok(map),
            other => Err(QuillbaseError::Auth(format!(
                "Authentication service returned an unexpected response: {other}"
            ))),
        }
    }
}

fn classify_transport(err: reqwest::Error, action: &str) -> QuillbaseError {
    if err.is_timeout() {
        QuillbaseError::Timeout(format!("while {action}"))
    } else {
        QuillbaseError::Http(err)
    }
}

async fn read_json_body(response: reqwest::Response) -> Result<Value> {
    response
        .json::<Value>()
        .await
        .map_err(|err| QuillbaseError::Auth(format!("Unreadable authentication response: {err}")))
}

/// Pulls the human-readable message out of an error response body.
///
/// The endpoints wrap failures as `{"error": {"message": "..."}}`, but
/// some error shapes carry a bare string or a list under `errors`;
/// whatever is found is passed through verbatim.
fn extract_error_message(body: &Value, fallback: &str) -> String {
    match body.get("error") {
        Some(Value::Object(detail)) => {
            if let Some(message) = detail.get("message").and_then(Value::as_str) {
                return message.to_string();
            }
            if let Some(errors) = detail.get("errors") {
                return errors.to_string();
            }
            Value::Object(detail.clone()).to_string()
        }
        Some(Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None => fallback.to_string(),
    }
}
