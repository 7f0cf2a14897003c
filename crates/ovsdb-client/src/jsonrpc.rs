//! JSON-RPC 1.0 framing over a byte stream (RFC 7047 section 4).
//!
//! OVSDB sends bare JSON values back to back with no delimiter, so the
//! reader buffers bytes and peels off one complete value at a time.

use crate::error::{OvsdbError, Result};
use crate::executor::Transact;
use crate::operation::Operation;
use async_trait::async_trait;
use serde_json::{json, Value as Json};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, instrument, trace};

const READ_CHUNK: usize = 8192;

/// Byte stream a JSON-RPC session runs over.
pub trait RpcStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> RpcStream for T {}

struct Connection {
    stream: Box<dyn RpcStream>,
    buffer: Vec<u8>,
}

impl Connection {
    async fn send(&mut self, message: &Json) -> Result<()> {
        let bytes = serde_json::to_vec(message)
            .map_err(|e| OvsdbError::protocol(format!("failed to encode request: {}", e)))?;
        trace!(bytes = bytes.len(), "Sending message");
        self.stream
            .write_all(&bytes)
            .await
            .map_err(|e| OvsdbError::transport(format!("write failed: {}", e)))?;
        self.stream
            .flush()
            .await
            .map_err(|e| OvsdbError::transport(format!("flush failed: {}", e)))?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Json> {
        loop {
            if let Some(message) = self.take_message()? {
                return Ok(message);
            }
            let mut chunk = [0u8; READ_CHUNK];
            let n = self
                .stream
                .read(&mut chunk)
                .await
                .map_err(|e| OvsdbError::transport(format!("read failed: {}", e)))?;
            if n == 0 {
                return Err(OvsdbError::transport("connection closed by database"));
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    /// Removes and returns the first complete value in the buffer.
    ///
    /// Malformed input cannot be resynchronized, so it is discarded along
    /// with everything buffered after it.
    fn take_message(&mut self) -> Result<Option<Json>> {
        let (message, consumed) = {
            let mut values = serde_json::Deserializer::from_slice(&self.buffer).into_iter::<Json>();
            match values.next() {
                None => (None, self.buffer.len()),
                Some(Ok(value)) => (Some(value), values.byte_offset()),
                Some(Err(e)) if e.is_eof() => (None, 0),
                Some(Err(e)) => {
                    let discarded = self.buffer.len();
                    self.buffer.clear();
                    return Err(OvsdbError::protocol(format!(
                        "malformed message, discarded {} bytes: {}",
                        discarded, e
                    )));
                }
            }
        };
        self.buffer.drain(..consumed);
        Ok(message)
    }
}

/// One JSON-RPC session with a database server.
///
/// Requests are serialized: a transaction holds the session until its reply
/// arrives. While waiting, `echo` keepalives from the server are answered
/// and unsolicited notifications are dropped.
pub struct JsonRpcTransport {
    peer: String,
    connection: Mutex<Connection>,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    /// Wraps an already connected stream.
    pub fn new(peer: impl Into<String>, stream: Box<dyn RpcStream>) -> Self {
        Self {
            peer: peer.into(),
            connection: Mutex::new(Connection {
                stream,
                buffer: Vec::new(),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the address this session is connected to.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    async fn call(&self, method: &str, params: Vec<Json>) -> Result<Json> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({"method": method, "params": params, "id": id});

        let mut conn = self.connection.lock().await;
        conn.send(&request).await?;

        loop {
            let message = conn.receive().await?;

            if let Some(method) = message.get("method").and_then(Json::as_str) {
                if method == "echo" {
                    let reply = json!({
                        "result": message.get("params").cloned().unwrap_or(Json::Array(vec![])),
                        "error": null,
                        "id": message.get("id").cloned().unwrap_or(Json::Null),
                    });
                    conn.send(&reply).await?;
                } else {
                    debug!(method, "Ignoring notification");
                }
                continue;
            }

            if message.get("id").and_then(Json::as_u64) != Some(id) {
                debug!(reply_id = ?message.get("id"), "Ignoring reply to another request");
                continue;
            }

            if let Some(error) = message.get("error").filter(|e| !e.is_null()) {
                return Err(OvsdbError::protocol(format!(
                    "{} request rejected by {}: {}",
                    method, self.peer, error
                )));
            }

            return message
                .get("result")
                .cloned()
                .ok_or_else(|| OvsdbError::protocol(format!("reply without result: {}", message)));
        }
    }
}

#[async_trait]
impl Transact for JsonRpcTransport {
    #[instrument(skip(self, operations), fields(peer = %self.peer, ops = operations.len()))]
    async fn transact(&self, database: &str, operations: &[Operation]) -> Result<Json> {
        let mut params = Vec::with_capacity(operations.len() + 1);
        params.push(Json::String(database.to_string()));
        for operation in operations {
            params.push(
                serde_json::to_value(operation)
                    .map_err(|e| OvsdbError::protocol(format!("failed to encode {}: {}", operation, e)))?,
            );
        }
        self.call("transact", params).await
    }
}
