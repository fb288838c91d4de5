//! A connection-per-call client for talking to the backend dispatcher.
//!
//! Each call opens a fresh TCP connection, retries the connect a few times
//! with a fixed backoff, sends one framed request, reads one framed
//! response, and closes. There is no connection pooling or keepalive: the
//! backend is trusted to handle its own concurrency, and a short-lived
//! connection is simplest to reason about when jobs can legitimately take
//! tens of seconds.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use wire_protocol::{Message, MessageType};

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

#[derive(thiserror::Error, Debug)]
pub enum CallError {
    #[error("failed to connect to {host}:{port} after {attempts} attempts")]
    ConnectFailed {
        host: String,
        port: u16,
        attempts: u32,
    },
    #[error("timed out waiting for {host}:{port}")]
    Timeout { host: String, port: u16 },
    #[error("protocol error: {0}")]
    Protocol(#[from] wire_protocol::FrameError),
    #[error("remote error: {0}")]
    Remote(String),
}

/// A client bound to one backend address. Cheap to clone and share across
/// tasks: it carries no connection state between calls.
#[derive(Clone)]
pub struct RemoteClient {
    host: String,
    port: u16,
    max_retries: u32,
    timeout: Duration,
}

impl RemoteClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_config(
        host: impl Into<String>,
        port: u16,
        max_retries: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            max_retries,
            timeout,
        }
    }

    /// Sends one request and waits for the matching response, applying the
    /// configured connect retries and an overall I/O deadline covering both
    /// the write and the read.
    pub async fn call(
        &self,
        msg_type: MessageType,
        data: serde_json::Value,
    ) -> Result<serde_json::Value, CallError> {
        let mut stream = self.connect().await?;
        let request = Message::new(msg_type, data);

        let deadline = self.timeout;
        tokio::time::timeout(deadline, wire_protocol::write_message(&mut stream, &request))
            .await
            .map_err(|_| self.timeout_error())??;

        let response = tokio::time::timeout(deadline, wire_protocol::read_message(&mut stream))
            .await
            .map_err(|_| self.timeout_error())??;

        match response.msg_type {
            MessageType::Error => Err(CallError::Remote(extract_error_message(&response))),
            _ => {
                debug!(msg_type = response.msg_type.as_str(), "call succeeded");
                Ok(response.data)
            }
        }
    }

    async fn connect(&self) -> Result<TcpStream, CallError> {
        for attempt in 0..self.max_retries {
            info!(
                host = %self.host,
                port = self.port,
                attempt = attempt + 1,
                max_retries = self.max_retries,
                "connecting to backend"
            );
            match tokio::time::timeout(self.timeout, TcpStream::connect((self.host.as_str(), self.port))).await {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(err)) => {
                    warn!(error = %err, attempt = attempt + 1, "connect failed");
                }
                Err(_) => {
                    warn!(attempt = attempt + 1, "connect timed out");
                }
            }
            if attempt + 1 < self.max_retries {
                sleep(RETRY_BACKOFF).await;
            }
        }
        Err(CallError::ConnectFailed {
            host: self.host.clone(),
            port: self.port,
            attempts: self.max_retries,
        })
    }

    fn timeout_error(&self) -> CallError {
        CallError::Timeout {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

fn extract_error_message(message: &Message) -> String {
    message
        .data
        .get("error")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown remote error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn calls_succeed_against_a_well_behaved_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = wire_protocol::read_message(&mut socket).await.unwrap();
            assert_eq!(request.msg_type, MessageType::Screenshot);
            let response = Message::response(serde_json::json!({"ok": true}));
            wire_protocol::write_message(&mut socket, &response)
                .await
                .unwrap();
        });

        let client = RemoteClient::new("127.0.0.1", addr.port());
        let result = client
            .call(MessageType::Screenshot, serde_json::json!({"url": "x"}))
            .await
            .unwrap();
        assert_eq!(result["ok"], true);
    }

    #[tokio::test]
    async fn remote_errors_surface_as_call_error_remote() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            drop(wire_protocol::read_message(&mut socket).await.unwrap());
            let response = Message::error("job failed");
            wire_protocol::write_message(&mut socket, &response)
                .await
                .unwrap();
        });

        let client = RemoteClient::new("127.0.0.1", addr.port());
        let err = client
            .call(MessageType::Performance, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Remote(msg) if msg == "job failed"));
    }

    #[tokio::test]
    async fn connect_failure_retries_then_gives_up() {
        // Nothing is listening on this port, so every attempt refuses.
        let client = RemoteClient::with_config(
            "127.0.0.1",
            1, // reserved port, connection refused immediately
            2,
            Duration::from_millis(200),
        );
        let err = client
            .call(MessageType::Screenshot, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::ConnectFailed { attempts: 2, .. }));
    }
}
