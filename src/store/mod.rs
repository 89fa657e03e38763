//! Domain stores built on the tree adapter
//!
//! [`MessageStore`] keeps the append-only message log and its derived
//! per-session metadata; [`TemplateStore`] keeps user-owned document
//! templates and their public mirrors. Both degrade to empty/`false`
//! results rather than failing the caller when the backend is
//! unconfigured, and record a warning when a backend operation fails
//! partway through.

mod messages;
mod templates;

pub use messages::{MessageStore, DEFAULT_MESSAGE_LIMIT};
pub use templates::{TemplateStore, TemplateUpdate};
