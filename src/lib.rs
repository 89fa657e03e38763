//! Quillbase - Persistence layer for a document-drafting application
//!
//! This library provides the backend client used by the drafting app:
//! a path-addressed JSON tree adapter over REST, email/password and
//! Google authentication with persistent sessions, an append-only
//! message log with per-session metadata, and user-owned document
//! templates with public sharing.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `client`: Top-level [`Quillbase`] facade wiring config to stores
//! - `tree`: Path-addressed tree adapter ([`TreeClient`], [`Reference`],
//!   [`Snapshot`])
//! - `auth`: Account registration, sign-in, and persistent sessions
//! - `store`: Message log and template stores
//! - `config`: Configuration loading and validation
//! - `warnings`: Shared slot for silent-degradation warnings
//! - `error`: Error types and result alias
//!
//! A missing or placeholder configuration never fails construction:
//! the facade runs unconfigured, reads return empty results, writes
//! become no-ops, and the reason lands in the warning channel.
//!
//! # Example
//!
//! ```no_run
//! use quillbase::{Config, Quillbase};
//!
//! #[tokio::main]
//! async fn main() -> quillbase::Result<()> {
//!     let client = Quillbase::new(Config::from_env());
//!     if let Some(warning) = client.take_warning() {
//!         eprintln!("{warning}");
//!     }
//!
//!     let user = client.auth().login("author@example.com", "secret").await?;
//!     let token = client
//!         .auth()
//!         .create_persistent_session(
//!             &user.uid,
//!             user.refresh_token.as_deref().unwrap_or(""),
//!             None,
//!         )
//!         .await?;
//!     println!("session token: {token}");
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod store;
pub mod tree;
pub mod types;
pub mod warnings;

// Re-export commonly used types
pub use auth::{AuthClient, GoogleAuthUrl, GoogleCredential, IdentityClient, RefreshedToken};
pub use client::Quillbase;
pub use config::Config;
pub use error::{QuillbaseError, Result};
pub use store::{MessageStore, TemplateStore, TemplateUpdate, DEFAULT_MESSAGE_LIMIT};
pub use tree::{Reference, Snapshot, TreeClient};
pub use types::{
    AuthUser, HistoryExport, Role, SessionExport, SessionMeta, StoredMessage, Template,
};
pub use warnings::WarningChannel;
