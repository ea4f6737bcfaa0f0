//! BrainClient: wire client for the external classifier.
//!
//! One exchange per connection over a Unix domain socket: connect, write
//! the request JSON plus a newline, half-close, read the reply to EOF.
//! Send and receive are each bounded by a 60 second timeout because the
//! brain may be running OCR or a cold model behind the socket.
//!
//! The reply is parsed structurally: any object that carries a "category"
//! string alongside a string equal to a requested path yields a verdict,
//! whatever the envelope or key naming. Paths the reply never mentions are
//! classifier rejections; so is the whole batch on any transport failure.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::error::{FolderError, Result};

/// Fixed rendezvous path shared with the brain process.
pub const BRAIN_SOCKET: &str = "/tmp/magic_brain.ipc";

/// Applied independently to the send and receive legs.
const IPC_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    files: &'a [String],
}

pub struct BrainClient {
    socket_path: PathBuf,
}

impl Default for BrainClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BrainClient {
    pub fn new() -> Self {
        Self::at(BRAIN_SOCKET)
    }

    /// Client against a non-default socket (tests point this at a stub).
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: path.into(),
        }
    }

    /// Send one batch of absolute backing-store paths, return the verdicts
    /// the brain produced for them.
    pub async fn classify(&self, paths: &[String]) -> Result<HashMap<String, String>> {
        let request = serde_json::to_vec(&ClassifyRequest { files: paths })?;

        let mut stream = timeout(IPC_TIMEOUT, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| FolderError::Ipc("connect timed out".into()))?
            .map_err(|e| {
                FolderError::Ipc(format!("connect to {}: {e}", self.socket_path.display()))
            })?;

        timeout(IPC_TIMEOUT, async {
            stream.write_all(&request).await?;
            stream.write_all(b"\n").await?;
            stream.shutdown().await
        })
        .await
        .map_err(|_| FolderError::Ipc("send timed out".into()))?
        .map_err(|e: std::io::Error| FolderError::Ipc(format!("send: {e}")))?;

        let mut reply = String::new();
        timeout(IPC_TIMEOUT, stream.read_to_string(&mut reply))
            .await
            .map_err(|_| FolderError::Ipc("receive timed out".into()))?
            .map_err(|e| FolderError::Ipc(format!("receive: {e}")))?;

        tracing::debug!("[Brain] Received batch response ({} bytes)", reply.len());
        Ok(parse_verdicts(&reply, paths))
    }
}

/// Best-effort structural parse of a brain reply.
///
/// Walks the JSON tree; every object holding a non-empty "category" string
/// and some string value equal to a requested path binds that path. Paths
/// not requested are ignored, unparseable replies yield no verdicts.
pub fn parse_verdicts(reply: &str, requested: &[String]) -> HashMap<String, String> {
    let requested: HashSet<&str> = requested.iter().map(String::as_str).collect();
    let mut verdicts = HashMap::new();

    match serde_json::from_str::<Value>(reply) {
        Ok(value) => collect_verdicts(&value, &requested, &mut verdicts),
        Err(e) => tracing::warn!("[Brain] Unparseable response: {}", e),
    }

    verdicts
}

fn collect_verdicts(
    value: &Value,
    requested: &HashSet<&str>,
    out: &mut HashMap<String, String>,
) {
    match value {
        Value::Object(map) => {
            if let Some(category) = map.get("category").and_then(Value::as_str) {
                if !category.is_empty() {
                    for (key, field) in map {
                        if key == "category" {
                            continue;
                        }
                        if let Some(s) = field.as_str() {
                            if requested.contains(s) {
                                out.insert(s.to_string(), category.to_string());
                            }
                        }
                    }
                }
            }
            for field in map.values() {
                collect_verdicts(field, requested, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_verdicts(item, requested, out);
            }
        }
        _ => {}
    }
}
