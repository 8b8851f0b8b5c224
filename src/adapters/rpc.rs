//! Newline-delimited JSON RPC over TCP.
//!
//! Each call writes one request frame and reads exactly one response frame:
//!
//! ```text
//! -> {"id":1,"method":"classify","params":[...]}
//! <- {"id":1,"result":{...}}            or  {"id":1,"error":{"name":"...","message":"..."}}
//! ```
//!
//! The socket is opened on the first call and re-opened after any transport failure, so a
//! connection survives server restarts. Frames are paired by order on the wire, which is
//! why calls on one connection are serialized behind an async mutex.

use crate::domain::model::Address;
use crate::domain::ports::{ConnectionFactory, RpcConnection};
use crate::utils::error::{ClassifyError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Largest response frame accepted, newline included.
pub const MAX_FRAME_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    id: u64,
    method: &'a str,
    params: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: u64,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RemoteFault>,
}

#[derive(Debug, Deserialize)]
struct RemoteFault {
    name: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug)]
pub struct TcpJsonConnection {
    address: Address,
    call_timeout: Duration,
    connect_timeout: Duration,
    max_frame_bytes: u64,
    next_id: AtomicU64,
    stream: Mutex<Option<BufStream<TcpStream>>>,
}

impl TcpJsonConnection {
    pub fn new(address: Address, call_timeout: Duration) -> Self {
        Self {
            address,
            call_timeout,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_frame_bytes: MAX_FRAME_BYTES,
            next_id: AtomicU64::new(1),
            stream: Mutex::new(None),
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_max_frame_bytes(mut self, max_frame_bytes: u64) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    fn lost(&self, message: impl std::fmt::Display) -> ClassifyError {
        ClassifyError::ConnectionLost {
            address: self.address.to_string(),
            message: message.to_string(),
        }
    }

    fn protocol(&self, message: String) -> ClassifyError {
        ClassifyError::ProtocolError {
            address: self.address.to_string(),
            message,
        }
    }

    /// An unreachable host counts as a lost connection, however the connect attempt ends.
    async fn open(&self) -> Result<BufStream<TcpStream>> {
        let socket = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect(self.address.socket_target()),
        )
        .await
        .map_err(|_| self.lost(format!("no answer to connect within {:?}", self.connect_timeout)))?
        .map_err(|e| self.lost(e))?;

        socket.set_nodelay(true).map_err(|e| self.lost(e))?;
        tracing::debug!("Connected to {}", self.address);
        Ok(BufStream::new(socket))
    }

    async fn exchange(&self, stream: &mut BufStream<TcpStream>, frame: &str) -> Result<String> {
        stream
            .write_all(frame.as_bytes())
            .await
            .map_err(|e| self.lost(e))?;
        stream.flush().await.map_err(|e| self.lost(e))?;

        let mut line = String::new();
        let read = (&mut *stream)
            .take(self.max_frame_bytes)
            .read_line(&mut line)
            .await
            .map_err(|e| self.lost(e))?;

        if read == 0 {
            return Err(self.lost("connection closed by peer"));
        }
        if !line.ends_with('\n') {
            if read as u64 >= self.max_frame_bytes {
                return Err(self.protocol(format!(
                    "response frame exceeds {} bytes",
                    self.max_frame_bytes
                )));
            }
            return Err(self.lost("connection closed mid-frame"));
        }

        Ok(line)
    }

    fn decode(&self, id: u64, line: &str) -> Result<serde_json::Value> {
        let response: RpcResponse = serde_json::from_str(line)
            .map_err(|e| self.protocol(format!("undecodable frame: {}", e)))?;

        if response.id != id {
            return Err(self.protocol(format!(
                "expected response {} but got {}",
                id, response.id
            )));
        }

        if let Some(fault) = response.error {
            return Err(ClassifyError::RemoteError {
                name: fault.name,
                message: fault.message,
            });
        }

        Ok(response.result.unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl RpcConnection for TcpJsonConnection {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let mut slot = self.stream.lock().await;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut frame = serde_json::to_string(&RpcRequest {
            id,
            method,
            params: &params,
        })?;
        frame.push('\n');

        if slot.is_none() {
            *slot = Some(self.open().await?);
        }
        let Some(stream) = slot.as_mut() else {
            return Err(self.lost("socket unavailable"));
        };

        tracing::debug!(id, method, bytes = frame.len(), "Calling {}", self.address);

        let line = match tokio::time::timeout(self.call_timeout, self.exchange(stream, &frame)).await {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => {
                *slot = None;
                return Err(e);
            }
            Err(_) => {
                // A late answer would be paired with the next request.
                *slot = None;
                return Err(ClassifyError::RemoteTimeout {
                    address: self.address.to_string(),
                    seconds: self.call_timeout.as_secs(),
                });
            }
        };

        let decoded = self.decode(id, &line);
        if matches!(decoded, Err(ClassifyError::ProtocolError { .. })) {
            *slot = None;
        }
        decoded
    }
}

/// Builds [`TcpJsonConnection`]s; the socket itself is opened lazily on first call.
#[derive(Debug, Clone)]
pub struct TcpConnectionFactory {
    call_timeout: Duration,
    connect_timeout: Duration,
}

impl TcpConnectionFactory {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            call_timeout,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl Default for TcpConnectionFactory {
    fn default() -> Self {
        Self::new(DEFAULT_CALL_TIMEOUT)
    }
}

impl ConnectionFactory for TcpConnectionFactory {
    fn connect(&self, address: &Address) -> Result<Arc<dyn RpcConnection>> {
        Ok(Arc::new(
            TcpJsonConnection::new(address.clone(), self.call_timeout)
                .with_connect_timeout(self.connect_timeout),
        ))
    }
}
