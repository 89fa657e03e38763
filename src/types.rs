//! Persisted record types
//!
//! Every struct here maps one-to-one onto a stable record layout in the
//! tree database (`users/{uid}`, `auth_sessions/{token}`,
//! `messages/{message_id}`, `sessions/{user_id}/{session_id}`,
//! `templates/{user_id}/{template_id}`, `public_templates/{template_id}`)
//! or onto the exported history document. Field names are a contract
//! other tooling may read; do not rename them.
//!
//! Timestamps are integer Unix seconds throughout, matching the stored
//! schema.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Sentinel user id for callers that have not logged in. Anonymous
/// activity is never written to per-user indexes.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Default title for a session whose first message carried none.
pub const DEFAULT_SESSION_TITLE: &str = "Untitled";

/// Current wall-clock time as Unix seconds.
pub(crate) fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Returns `true` for a missing, empty, or anonymous user id.
pub(crate) fn is_anonymous(user_id: Option<&str>) -> bool {
    match user_id {
        None => true,
        Some(id) => id.is_empty() || id == ANONYMOUS_USER,
    }
}

// ---------------------------------------------------------------------------
// Auth records
// ---------------------------------------------------------------------------

/// An authenticated user as returned by login and session resumption.
///
/// The typed fields are the ones the library maintains; `extra` carries
/// whatever else an older stored `users/{uid}` record contained, so a
/// login never loses fields it does not know about. After a successful
/// login or resume, `email` is always present even when the stored
/// record predates that field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    /// Stable user id assigned by the identity provider
    pub uid: String,

    /// Account email, lowercased
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Short-lived access token; transient, refreshed on every login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Long-lived refresh token; rotates on use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Unix seconds of the most recent login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<i64>,

    /// "email" or "google"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_provider: Option<String>,

    /// Fields from the stored record this library does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A persistent-session record stored under `auth_sessions/{token}`.
///
/// Created on login when the client asks for a long-lived token; the
/// `refresh_token` inside is rotated in place on every resumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Owner of the session
    pub user_id: String,

    /// Refresh token backing this session
    pub refresh_token: String,

    /// Unix seconds at creation
    pub created_at: i64,

    /// Unix seconds of the last rotation
    pub updated_at: i64,

    /// Caller-supplied metadata (device name, client version, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

// ---------------------------------------------------------------------------
// Messages and sessions
// ---------------------------------------------------------------------------

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human on the other side of the UI
    User,
    /// The generative-text backend
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message in the append-only log under `messages/{message_id}`.
/// Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Conversation this message belongs to
    pub session_id: String,

    /// Author role
    pub role: Role,

    /// Message text
    pub content: String,

    /// Free-form metadata; `title` here feeds the session title
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Unix seconds at write time; the sort key for listing
    pub timestamp: i64,

    /// Owning user, or "anonymous"
    pub user_id: String,
}

/// Derived per-session metadata under `sessions/{user_id}/{session_id}`.
///
/// Created on the first message of a session and updated on every
/// subsequent append. The `message_count` increment is a read-then-write
/// and can under-count under concurrent appends; see
/// [`MessageStore::save`](crate::store::MessageStore::save).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    /// Conversation id
    pub session_id: String,

    /// Owning user
    pub user_id: String,

    /// Unix seconds of the first message
    pub created_at: i64,

    /// Unix seconds of the latest message
    pub updated_at: i64,

    /// Display title, latest one wins
    #[serde(default = "default_title")]
    pub title: String,

    /// Number of messages appended so far (best effort)
    #[serde(default)]
    pub message_count: u64,
}

fn default_title() -> String {
    DEFAULT_SESSION_TITLE.to_string()
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// A reusable document-structure template.
///
/// Stored under `templates/{user_id}/{template_id}`; public templates
/// are additionally mirrored under `public_templates/{template_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Stable template id
    pub template_id: String,

    /// Display name
    pub template_name: String,

    /// Ordered section headings
    pub sections: Vec<String>,

    /// Optional free-text description
    #[serde(default)]
    pub description: String,

    /// Owning user
    pub user_id: String,

    /// Whether the template is mirrored into the public index
    #[serde(default)]
    pub is_public: bool,

    /// Unix seconds at creation
    pub created_at: i64,

    /// Unix seconds of the last edit
    pub updated_at: i64,

    /// Set on listing results only: this entry came from the public
    /// index and belongs to another user. Never persisted as `true` in
    /// the owner's own record.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_public_shared: bool,
}

// ---------------------------------------------------------------------------
// History export
// ---------------------------------------------------------------------------

/// One session inside a [`HistoryExport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    /// Conversation id
    pub session_id: String,
    /// Session title
    pub title: String,
    /// Unix seconds of the first message
    pub created_at: i64,
    /// Unix seconds of the latest message
    pub updated_at: i64,
    /// Number of exported messages
    pub message_count: usize,
    /// The messages themselves, ascending by timestamp
    pub messages: Vec<StoredMessage>,
}

/// Full denormalized history dump for one user.
///
/// The field names are a versionless but stable schema; downstream
/// consumers parse the serialized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryExport {
    /// User the export belongs to
    pub user_id: String,
    /// Unix seconds when the export was built
    pub export_timestamp: i64,
    /// Number of sessions included
    pub total_sessions: usize,
    /// Sessions, most recently updated first
    pub sessions: Vec<SessionExport>,
}
