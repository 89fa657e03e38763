//! Shared test helpers: an in-memory fake of the path-addressed tree
//! backend, mounted on a wiremock server.
//!
//! [`FakeTree`] implements the backend's REST contract over a JSON value
//! guarded by a mutex: `GET` returns the subtree (or `null`), `PUT`
//! replaces it, `PATCH` shallow-merges into an existing mapping and
//! returns 404 otherwise (which is what drives the client's update
//! fallback), `DELETE` removes the node. It only claims paths ending in
//! `.json`, so identity-endpoint mocks can live on the same server.

use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};
use wiremock::matchers::path_regex;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use quillbase::{Config, Quillbase};

/// Stateful in-memory tree backend.
#[derive(Clone)]
pub struct FakeTree {
    data: Arc<Mutex<Value>>,
}

#[allow(dead_code)]
impl FakeTree {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(Value::Null)),
        }
    }

    /// Mounts a fresh fake on `server`, claiming every `*.json` path.
    pub async fn mount(server: &MockServer) -> FakeTree {
        let fake = FakeTree::new();
        Mock::given(path_regex(r"\.json$"))
            .respond_with(fake.clone())
            .mount(server)
            .await;
        fake
    }

    /// Snapshot of the subtree at `path` (`Value::Null` when absent).
    pub fn value_at(&self, path: &[&str]) -> Value {
        let data = self.data.lock().expect("tree lock");
        lookup(&data, path).cloned().unwrap_or(Value::Null)
    }

    /// Writes `value` at `path` directly, bypassing HTTP.
    pub fn seed(&self, path: &[&str], value: Value) {
        let mut data = self.data.lock().expect("tree lock");
        write(&mut data, path, value);
    }
}

impl Respond for FakeTree {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let trimmed = request
            .url
            .path()
            .trim_end_matches(".json")
            .trim_matches('/');
        let segments: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };

        let mut data = self.data.lock().expect("tree lock");
        match request.method.to_string().as_str() {
            "GET" => {
                let value = lookup(&data, &segments).cloned().unwrap_or(Value::Null);
                ResponseTemplate::new(200).set_body_json(value)
            }
            "PUT" => match serde_json::from_slice::<Value>(&request.body) {
                Ok(value) => {
                    write(&mut data, &segments, value.clone());
                    ResponseTemplate::new(200).set_body_json(value)
                }
                Err(_) => ResponseTemplate::new(400)
                    .set_body_json(json!({"error": "Invalid data"})),
            },
            "PATCH" => {
                let partial = match serde_json::from_slice::<Value>(&request.body) {
                    Ok(Value::Object(map)) => map,
                    _ => {
                        return ResponseTemplate::new(400)
                            .set_body_json(json!({"error": "Invalid data"}))
                    }
                };
                match lookup_mut(&mut data, &segments) {
                    Some(Value::Object(existing)) => {
                        for (key, value) in partial.clone() {
                            existing.insert(key, value);
                        }
                        ResponseTemplate::new(200).set_body_json(Value::Object(partial))
                    }
                    // The real backend refuses to PATCH a path that does
                    // not already hold a mapping.
                    _ => ResponseTemplate::new(404)
                        .set_body_json(json!({"error": "Path not found"})),
                }
            }
            "DELETE" => {
                erase(&mut data, &segments);
                ResponseTemplate::new(200).set_body_json(Value::Null)
            }
            _ => ResponseTemplate::new(405),
        }
    }
}

fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut node = root;
    for segment in path {
        node = node.as_object()?.get(*segment)?;
    }
    Some(node)
}

fn lookup_mut<'a>(root: &'a mut Value, path: &[&str]) -> Option<&'a mut Value> {
    let mut node = root;
    for segment in path {
        node = node.as_object_mut()?.get_mut(*segment)?;
    }
    Some(node)
}

fn write(root: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return;
    };
    let mut node = root;
    for segment in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = node
            .as_object_mut()
            .expect("object node")
            .entry(segment.to_string())
            .or_insert(Value::Null);
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    node.as_object_mut()
        .expect("object node")
        .insert(last.to_string(), value);
}

fn erase(root: &mut Value, path: &[&str]) {
    let Some((last, parents)) = path.split_last() else {
        *root = Value::Null;
        return;
    };
    let mut node = root;
    for segment in parents {
        let Some(next) = node.as_object_mut().and_then(|map| map.get_mut(*segment)) else {
            return;
        };
        node = next;
    }
    if let Some(map) = node.as_object_mut() {
        map.remove(*last);
    }
}

/// Configuration pointing every endpoint at the mock server.
#[allow(dead_code)]
pub fn backend_config(server: &MockServer) -> Config {
    Config {
        api_key: Some("test-key".to_string()),
        database_url: Some(server.uri()),
        identity_base: server.uri(),
        token_base: server.uri(),
        ..Config::default()
    }
}

/// Starts a mock server with a fake tree mounted and a facade wired to
/// it.
#[allow(dead_code)]
pub async fn backend() -> (MockServer, FakeTree, Quillbase) {
    let server = MockServer::start().await;
    let fake = FakeTree::mount(&server).await;
    let client = Quillbase::new(backend_config(&server));
    (server, fake, client)
}
