//! Path-addressed adapter over the REST tree database
//!
//! The backend exposes only whole-subtree `GET`/`PUT`/`PATCH`/`DELETE`
//! by path (`{base}/{seg}/{seg}.json?key=...`); the rest of the library
//! is written against the chainable [`Reference`] abstraction this
//! module provides. A [`TreeClient`] is a cheaply cloneable handle over
//! one database plus the shared warning channel.
//!
//! Failure policy at this level:
//!
//! - Reads never fail: HTTP 404 and a JSON `null` body both normalize
//!   to [`Snapshot::Missing`]; any other failure records a warning and
//!   yields `Missing`.
//! - Writes that hit 401/403/404 are skipped with a warning and return
//!   `Ok`, so the caller's flow continues. Transient transport failures
//!   (timeouts, refused connections) behave the same way and are never
//!   retried. Any other non-success status is a real error.
//! - Resolving the parent of the root reference is a caller bug and
//!   fails loudly with [`QuillbaseError::InvalidReference`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::error::{QuillbaseError, Result};
use crate::warnings::WarningChannel;

mod snapshot;
pub use snapshot::Snapshot;

/// HTTP statuses on writes that mean "skip the operation, keep going".
const SKIPPED_WRITE_STATUSES: [StatusCode; 3] = [
    StatusCode::UNAUTHORIZED,
    StatusCode::FORBIDDEN,
    StatusCode::NOT_FOUND,
];

struct Inner {
    http: reqwest::Client,
    /// Base URL with any trailing slash trimmed
    base: String,
    api_key: Option<String>,
    warnings: WarningChannel,
}

/// Handle over one tree database.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use quillbase::tree::TreeClient;
/// use quillbase::warnings::WarningChannel;
///
/// # async fn example() -> quillbase::Result<()> {
/// let client = TreeClient::new(
///     "https://db.example.com",
///     Some("api-key"),
///     Duration::from_secs(10),
///     WarningChannel::default(),
/// )?;
/// let snapshot = client.root().child("users").child("u1").get().await?;
/// assert!(snapshot.is_missing() || snapshot.as_object().is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TreeClient {
    inner: Arc<Inner>,
}

impl TreeClient {
    /// Creates a client for the database at `base_url`.
    ///
    /// `api_key`, when present, is appended to every request as the
    /// `key` query parameter. `timeout` applies to each individual
    /// round trip; once issued, a request runs to completion or failure.
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
        warnings: WarningChannel,
    ) -> Result<Self> {
        // Validate early so a malformed URL fails construction, not the
        // first operation.
        Url::parse(base_url)?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base: base_url.trim_end_matches('/').to_string(),
                api_key: api_key.map(str::to_string),
                warnings,
            }),
        })
    }

    /// A reference to the root of the tree.
    pub fn root(&self) -> Reference {
        Reference {
            client: self.clone(),
            path: Vec::new(),
        }
    }

    /// The warning channel shared by everything built on this client.
    pub fn warnings(&self) -> &WarningChannel {
        &self.inner.warnings
    }

    fn url_for(&self, path: &[String]) -> Result<Url> {
        let joined = path.join("/");
        let raw = if joined.is_empty() {
            format!("{}/.json", self.inner.base)
        } else {
            format!("{}/{}.json", self.inner.base, joined)
        };
        let mut url = Url::parse(&raw)?;
        if let Some(key) = &self.inner.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }

    fn warn(&self, message: String) {
        self.inner.warnings.record(message);
    }

    /// Converts a transport failure on a recoverable write into a
    /// warning, classifying timeouts distinctly.
    fn warn_transport(&self, action: &str, path: &str, err: &reqwest::Error) {
        if err.is_timeout() {
            self.warn(format!("Request timed out while {action} {path}."));
        } else {
            self.warn(format!("Backend request failed while {action} {path}: {err}"));
        }
    }

    async fn get_value(&self, path: &[String]) -> Result<Option<Value>> {
        let url = self.url_for(path)?;
        let shown = display_path(path);
        debug!(target: "quillbase", path = %shown, "GET");
        match self.inner.http.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if !status.is_success() {
                    self.warn(format!(
                        "Backend warning: get at {shown} returned HTTP {}. Treating as no data.",
                        status.as_u16()
                    ));
                    return Ok(None);
                }
                match response.json::<Value>().await {
                    Ok(Value::Null) => Ok(None),
                    Ok(value) => Ok(Some(value)),
                    Err(err) => {
                        self.warn(format!(
                            "Backend returned an unreadable body while reading {shown}: {err}"
                        ));
                        Ok(None)
                    }
                }
            }
            Err(err) => {
                self.warn_transport("reading", &shown, &err);
                Ok(None)
            }
        }
    }

    async fn put_value(&self, path: &[String], value: &Value, action: &str) -> Result<()> {
        let url = self.url_for(path)?;
        let shown = display_path(path);
        debug!(target: "quillbase", path = %shown, "PUT");
        match self.inner.http.put(url).json(value).send().await {
            Ok(response) => self.classify_write(response.status(), action, &shown),
            Err(err) => {
                self.warn_transport("writing", &shown, &err);
                Ok(())
            }
        }
    }

    async fn patch_value(&self, path: &[String], partial: &Map<String, Value>) -> Result<()> {
        let url = self.url_for(path)?;
        let shown = display_path(path);
        debug!(target: "quillbase", path = %shown, "PATCH");
        match self.inner.http.patch(url).json(partial).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(());
                }
                if status == StatusCode::NOT_FOUND {
                    // The backend refuses to create new nested paths via
                    // PATCH. Three-way fallback: merge into an existing
                    // mapping, replace a non-mapping wholesale, create
                    // when absent.
                    let merged = match self.get_value(path).await? {
                        Some(Value::Object(mut existing)) => {
                            for (key, value) in partial {
                                existing.insert(key.clone(), value.clone());
                            }
                            Value::Object(existing)
                        }
                        Some(_) | None => Value::Object(partial.clone()),
                    };
                    return self.put_value(path, &merged, "update").await;
                }
                self.classify_write(status, "update", &shown)
            }
            Err(err) => {
                self.warn_transport("updating", &shown, &err);
                Ok(())
            }
        }
    }

    async fn delete_value(&self, path: &[String]) -> Result<()> {
        let url = self.url_for(path)?;
        let shown = display_path(path);
        debug!(target: "quillbase", path = %shown, "DELETE");
        match self.inner.http.delete(url).send().await {
            Ok(response) => {
                let status = response.status();
                // Deleting something already absent is a success.
                if status.is_success() || status == StatusCode::NOT_FOUND {
                    Ok(())
                } else {
                    Err(QuillbaseError::Backend {
                        status: status.as_u16(),
                        path: shown,
                    })
                }
            }
            Err(err) => {
                if err.is_timeout() {
                    Err(QuillbaseError::Timeout(format!("while deleting {shown}")))
                } else {
                    Err(err.into())
                }
            }
        }
    }

    fn classify_write(&self, status: StatusCode, action: &str, shown: &str) -> Result<()> {
        if status.is_success() {
            return Ok(());
        }
        if SKIPPED_WRITE_STATUSES.contains(&status) {
            self.warn(format!(
                "Backend warning: {action} at {shown} returned HTTP {}. Operation skipped.",
                status.as_u16()
            ));
            return Ok(());
        }
        Err(QuillbaseError::Backend {
            status: status.as_u16(),
            path: shown.to_string(),
        })
    }
}

fn display_path(path: &[String]) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", path.join("/"))
    }
}

// ---------------------------------------------------------------------------
// Reference
// ---------------------------------------------------------------------------

/// A navigable path into the tree.
///
/// Navigation only appends segments; there is no way to step upward, so
/// a reference can never escape the subtree it was derived from.
/// `child` is pure and never touches the network.
#[derive(Clone)]
pub struct Reference {
    client: TreeClient,
    path: Vec<String>,
}

impl Reference {
    /// Appends a segment to the path.
    pub fn child(&self, name: impl Into<String>) -> Reference {
        let mut path = self.path.clone();
        path.push(name.into());
        Reference {
            client: self.client.clone(),
            path,
        }
    }

    /// The path segments of this reference. Empty means the root.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// The final segment, or `None` for the root.
    pub fn key(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }

    /// Splits the path into parent segments and final key.
    ///
    /// Required by the write operations; the root has no parent, so
    /// calling this on the root is a programming error.
    fn parent_and_key(&self) -> Result<(&[String], &str)> {
        match self.path.split_last() {
            Some((key, parent)) => Ok((parent, key)),
            None => Err(QuillbaseError::InvalidReference(
                "cannot resolve parent path for root reference".to_string(),
            )),
        }
    }

    /// Reads the whole subtree at this reference.
    ///
    /// An absent path yields [`Snapshot::Missing`]; read failures are
    /// recorded as warnings and also yield `Missing`.
    pub async fn get(&self) -> Result<Snapshot> {
        let value = self.client.get_value(&self.path).await?;
        Ok(Snapshot::from_value(value.unwrap_or(Value::Null)))
    }

    /// Writes `value` as the entire content at this reference,
    /// replacing whatever was there.
    pub async fn set(&self, value: &Value) -> Result<()> {
        self.parent_and_key()?;
        self.client.put_value(&self.path, value, "set").await
    }

    /// Shallow-merges `partial` into the mapping at this reference,
    /// creating the record when it does not exist yet.
    pub async fn update(&self, partial: &Map<String, Value>) -> Result<()> {
        self.parent_and_key()?;
        self.client.patch_value(&self.path, partial).await
    }

    /// Deletes the node at this reference and everything beneath it.
    pub async fn remove(&self) -> Result<()> {
        self.parent_and_key()?;
        self.client.delete_value(&self.path).await
    }
}
