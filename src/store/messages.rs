//! Append-only message log with derived session metadata
//!
//! Messages live under `messages/{message_id}` and are immutable once
//! written. Every append also maintains the owner's session index under
//! `sessions/{user_id}/{session_id}` (title, counts, timestamps), which
//! feeds the session list and the history export.
//!
//! The backend has no query-by-field, so listing and deleting scan the
//! whole `messages` subtree, O(total messages). That cost is accepted
//! for the target deployment scale; see the method docs.

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::{QuillbaseError, Result};
use crate::tree::{Snapshot, TreeClient};
use crate::types::{
    is_anonymous, now_ts, HistoryExport, Role, SessionExport, SessionMeta, StoredMessage,
    DEFAULT_SESSION_TITLE,
};
use crate::warnings::WarningChannel;

/// Default cap on messages returned by [`MessageStore::list`].
pub const DEFAULT_MESSAGE_LIMIT: usize = 200;

/// Store for messages and session metadata.
#[derive(Clone)]
pub struct MessageStore {
    db: Option<TreeClient>,
    warnings: WarningChannel,
}

impl MessageStore {
    pub(crate) fn new(db: Option<TreeClient>, warnings: WarningChannel) -> Self {
        Self { db, warnings }
    }

    /// Appends a message to the log and updates the session metadata.
    ///
    /// Returns `Ok(None)` without touching the network when
    /// `do_not_store` is set (the privacy escape hatch) or the backend
    /// is unconfigured. Message persistence is prioritized over
    /// metadata accuracy: a failed metadata update records a warning
    /// but the saved message is still returned.
    ///
    /// The `message_count` increment reads the current value and writes
    /// it back; concurrent appends to the same session can under-count.
    pub async fn save(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        metadata: Option<Map<String, Value>>,
        user_id: Option<&str>,
        do_not_store: bool,
    ) -> Result<Option<StoredMessage>> {
        if do_not_store {
            return Ok(None);
        }
        let Some(db) = &self.db else {
            return Ok(None);
        };

        let timestamp = now_ts();
        let message = StoredMessage {
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            metadata: metadata.clone().unwrap_or_default(),
            timestamp,
            user_id: user_id.unwrap_or(crate::types::ANONYMOUS_USER).to_string(),
        };

        let message_id = Uuid::new_v4().to_string();
        db.root()
            .child("messages")
            .child(&message_id)
            .set(&serde_json::to_value(&message)?)
            .await?;

        if let Err(err) = self
            .update_session_metadata(db, session_id, user_id, metadata.as_ref(), timestamp)
            .await
        {
            self.warnings
                .record(format!("Error updating session metadata: {err}"));
        }

        Ok(Some(message))
    }

    /// Creates or advances the `sessions/{user}/{session}` record.
    async fn update_session_metadata(
        &self,
        db: &TreeClient,
        session_id: &str,
        user_id: Option<&str>,
        metadata: Option<&Map<String, Value>>,
        timestamp: i64,
    ) -> Result<()> {
        let Some(user_id) = user_id.filter(|id| !is_anonymous(Some(*id))) else {
            return Ok(());
        };

        let session_ref = db
            .root()
            .child("sessions")
            .child(user_id)
            .child(session_id);
        let title = metadata
            .and_then(|m| m.get("title"))
            .and_then(Value::as_str);

        match session_ref.get().await? {
            Snapshot::Object(existing) => {
                let mut update = Map::new();
                update.insert("updated_at".to_string(), json!(timestamp));
                if let Some(title) = title {
                    update.insert("title".to_string(), json!(title));
                }
                let current_count = existing
                    .get("message_count")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                update.insert("message_count".to_string(), json!(current_count + 1));
                session_ref.update(&update).await
            }
            _ => {
                let meta = SessionMeta {
                    session_id: session_id.to_string(),
                    user_id: user_id.to_string(),
                    created_at: timestamp,
                    updated_at: timestamp,
                    title: title.unwrap_or(DEFAULT_SESSION_TITLE).to_string(),
                    message_count: 1,
                };
                session_ref.set(&serde_json::to_value(&meta)?).await
            }
        }
    }

    /// Lists the messages of a session, ascending by timestamp.
    ///
    /// Scans the whole message log and filters client-side; the
    /// backend cannot query by field. With `user_id` set, messages
    /// written by other users are excluded as well.
    pub async fn list(
        &self,
        session_id: &str,
        user_id: Option<&str>,
        limit: usize,
    ) -> Vec<StoredMessage> {
        let Some(db) = &self.db else {
            return Vec::new();
        };

        let Ok(snapshot) = db.root().child("messages").get().await else {
            return Vec::new();
        };

        let mut messages: Vec<StoredMessage> = snapshot
            .children()
            .into_iter()
            .filter_map(|(_, child)| child.decode::<StoredMessage>().ok().flatten())
            .filter(|message| message.session_id == session_id)
            .filter(|message| user_id.map_or(true, |uid| message.user_id == uid))
            .collect();
        messages.sort_by_key(|message| message.timestamp);
        messages.truncate(limit);
        self.warnings.clear();
        messages
    }

    /// Lists a user's sessions, most recently updated first, optionally
    /// filtered by a case-insensitive title substring.
    pub async fn list_sessions(
        &self,
        user_id: &str,
        search_term: Option<&str>,
    ) -> Vec<SessionMeta> {
        let Some(db) = &self.db else {
            return Vec::new();
        };
        if is_anonymous(Some(user_id)) {
            return Vec::new();
        }

        let Ok(snapshot) = db.root().child("sessions").child(user_id).get().await else {
            return Vec::new();
        };

        let needle = search_term.map(str::to_lowercase);
        let mut sessions: Vec<SessionMeta> = snapshot
            .children()
            .into_iter()
            .filter_map(|(_, child)| child.decode::<SessionMeta>().ok().flatten())
            .filter(|session| {
                needle
                    .as_deref()
                    .map_or(true, |needle| session.title.to_lowercase().contains(needle))
            })
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        self.warnings.clear();
        sessions
    }

    /// Builds a full denormalized history dump for a user.
    ///
    /// Sessions come from [`list_sessions`](Self::list_sessions); each
    /// session's messages from [`list`](Self::list) with the default
    /// limit. The field layout is a stable schema (see
    /// [`HistoryExport`]).
    pub async fn export_history(&self, user_id: &str) -> Result<HistoryExport> {
        if self.db.is_none() {
            return Err(QuillbaseError::NotConfigured);
        }
        if is_anonymous(Some(user_id)) {
            return Err(QuillbaseError::Validation("Invalid user ID".to_string()));
        }

        let sessions = self.list_sessions(user_id, None).await;
        let mut exported = Vec::with_capacity(sessions.len());
        for session in sessions {
            let messages = self
                .list(&session.session_id, Some(user_id), DEFAULT_MESSAGE_LIMIT)
                .await;
            exported.push(SessionExport {
                session_id: session.session_id,
                title: session.title,
                created_at: session.created_at,
                updated_at: session.updated_at,
                message_count: messages.len(),
                messages,
            });
        }

        Ok(HistoryExport {
            user_id: user_id.to_string(),
            export_timestamp: now_ts(),
            total_sessions: exported.len(),
            sessions: exported,
        })
    }

    /// Deletes a session's metadata and every message belonging to it.
    ///
    /// Scans the whole message log to find the session's messages.
    /// Deletion is at-least-attempted: a failure partway through leaves
    /// already-deleted messages gone and later ones orphaned, and
    /// reports `false` with a warning.
    pub async fn delete_session(&self, session_id: &str, user_id: &str) -> bool {
        let Some(db) = &self.db else {
            return false;
        };
        if is_anonymous(Some(user_id)) {
            return false;
        }

        match self.delete_session_inner(db, session_id, user_id).await {
            Ok(()) => {
                self.warnings.clear();
                true
            }
            Err(err) => {
                self.warnings
                    .record(format!("Error deleting session: {err}"));
                false
            }
        }
    }

    async fn delete_session_inner(
        &self,
        db: &TreeClient,
        session_id: &str,
        user_id: &str,
    ) -> Result<()> {
        db.root()
            .child("sessions")
            .child(user_id)
            .child(session_id)
            .remove()
            .await?;

        let snapshot = db.root().child("messages").get().await?;
        for (key, child) in snapshot.children() {
            let Ok(Some(message)) = child.decode::<StoredMessage>() else {
                continue;
            };
            if message.session_id == session_id && message.user_id == user_id {
                db.root().child("messages").child(&key).remove().await?;
            }
        }
        Ok(())
    }
}
