//! The dispatcher's accept loop. Each connection is handled on its own
//! task so one slow or stuck peer never blocks another — the async
//! equivalent of the original thread-per-connection server, with the
//! process pool doing the actual fault isolation for CPU-bound work.

use std::sync::Arc;

use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};
use wire_protocol::{Message, MessageType};

use crate::error::DispatchError;
use crate::pool::JobPool;

pub async fn run(listener: TcpListener, pool: Arc<JobPool>) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        let pool = pool.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, pool).await {
                warn!(%addr, %err, "connection handling failed");
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, pool: Arc<JobPool>) -> anyhow::Result<()> {
    let request = wire_protocol::read_message(&mut stream).await?;
    info!(msg_type = request.msg_type.as_str(), "dispatching job");

    let response = match request.msg_type {
        MessageType::Screenshot | MessageType::Performance | MessageType::ImageProcessing => {
            match pool.execute(request).await {
                Ok(response) => response,
                Err(DispatchError::Timeout) => {
                    warn!("job timed out");
                    Message::response(json!({"error": "Task timeout", "success": false}))
                }
                Err(err) => {
                    error!(%err, "job failed");
                    Message::error(err.to_string())
                }
            }
        }
        other => Message::error(format!("Unknown task type: {}", other.as_str())),
    };

    wire_protocol::write_message(&mut stream, &response).await?;
    Ok(())
}
