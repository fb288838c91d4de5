//! The `--job-worker` child entrypoint: reads one framed job off stdin,
//! runs it, writes one framed result to stdout, and exits. This is the
//! whole lifetime of a job process — no state survives between jobs.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::error;
use wire_protocol::{Message, MessageType};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_IMAGES: usize = scrape_collaborators::images::DEFAULT_MAX_IMAGES;

pub async fn run() {
    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();

    let response = match wire_protocol::read_message(&mut stdin).await {
        Ok(request) => process(request).await,
        Err(err) => {
            error!(%err, "job worker failed to read request");
            Message::error(err.to_string())
        }
    };

    if let Err(err) = wire_protocol::write_message(&mut stdout, &response).await {
        error!(%err, "job worker failed to write result");
    }
}

async fn process(request: Message) -> Message {
    match request.msg_type {
        MessageType::Screenshot => screenshot_task(request.data).await,
        MessageType::Performance => performance_task(request.data).await,
        MessageType::ImageProcessing => image_task(request.data).await,
        other => Message::error(format!("Unknown task type: {}", other.as_str())),
    }
}

fn timeout_of(data: &Value) -> Duration {
    let secs = data.get("timeout").and_then(|v| v.as_u64()).unwrap_or(DEFAULT_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

async fn screenshot_task(data: Value) -> Message {
    let url = data.get("url").and_then(|v| v.as_str()).unwrap_or_default();
    match scrape_collaborators::browser::generate_screenshot(url, timeout_of(&data)).await {
        Ok(screenshot) => Message::response(json!({"screenshot": screenshot, "success": true})),
        Err(err) => {
            error!(%err, url, "screenshot job failed");
            Message::response(json!({"screenshot": Value::Null, "success": false}))
        }
    }
}

async fn performance_task(data: Value) -> Message {
    let url = data.get("url").and_then(|v| v.as_str()).unwrap_or_default();
    match scrape_collaborators::browser::analyze_performance(url, timeout_of(&data)).await {
        Ok(metrics) => Message::response(json!({
            "performance": serde_json::to_value(metrics).unwrap_or(Value::Null),
            "success": true,
        })),
        Err(err) => {
            error!(%err, url, "performance job failed");
            Message::response(json!({"performance": Value::Null, "success": false}))
        }
    }
}

async fn image_task(data: Value) -> Message {
    let url = data.get("url").and_then(|v| v.as_str()).unwrap_or_default();
    let html_content = data.get("html_content").and_then(|v| v.as_str()).unwrap_or_default();
    let max_images = data
        .get("max_images")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_MAX_IMAGES);

    let thumbnails = scrape_collaborators::images::process_images(url, html_content, max_images).await;
    let count = thumbnails.len();
    Message::response(json!({
        "thumbnails": thumbnails,
        "count": count,
        "success": true,
    }))
}
