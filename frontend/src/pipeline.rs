//! The background task that turns a `/scrape` request into a finished
//! result: download the page, parse it locally, then hand the three heavy
//! jobs (screenshot, performance, thumbnails) to the backend dispatcher one
//! at a time. A backend job that fails or times out degrades that one field
//! to `null`/empty rather than failing the whole task — only a failure to
//! download the page at all fails the task.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use task_registry::{TaskRegistry, TaskStatus};
use tracing::{info, warn};
use uuid::Uuid;
use wire_protocol::MessageType;

use remote_client::RemoteClient;

use crate::time::TimeSource;

const BACKEND_JOB_TIMEOUT_SECS: u64 = 30;
const MAX_IMAGES: usize = scrape_collaborators::images::DEFAULT_MAX_IMAGES;

pub async fn run(
    task_id: Uuid,
    url: String,
    registry: Arc<TaskRegistry>,
    backend: RemoteClient,
    timesource: Arc<dyn TimeSource + Send + Sync>,
) {
    info!(%task_id, url, "starting scraping pipeline");
    registry.advance(task_id, TaskStatus::Scraping);

    let scraped = match do_scraping(&url).await {
        Some(scraped) => scraped,
        None => {
            registry.set_error(task_id, "Failed to scrape URL".to_string());
            return;
        }
    };

    registry.advance(task_id, TaskStatus::Processing);
    let processing_data = do_processing(&backend, &url, &scraped.html_content).await;

    let result = json!({
        "url": url,
        "timestamp": timesource.current_time(),
        "scraping_data": scraped.data,
        "processing_data": processing_data,
        "status": "success",
    });

    registry.set_result(task_id, result);
    info!(%task_id, "pipeline completed");
}

struct ScrapedPage {
    data: Value,
    html_content: String,
}

async fn do_scraping(url: &str) -> Option<ScrapedPage> {
    let page = match scrape_collaborators::fetch(url).await {
        Ok(page) => page,
        Err(err) => {
            warn!(url, %err, "failed to download page");
            return None;
        }
    };

    let parsed = scrape_collaborators::parse_html(&page.content, &page.final_url);

    let data = json!({
        "title": parsed.title,
        "links": parsed.links,
        "meta_tags": {
            "basic": parsed.metadata.basic,
            "open_graph": parsed.metadata.open_graph,
            "twitter": parsed.metadata.twitter,
            "other": parsed.metadata.other,
        },
        "structure": parsed.structure,
        "images_count": parsed.images_count,
        "canonical_url": parsed.metadata.canonical_url,
        "language": parsed.metadata.language,
    });

    Some(ScrapedPage {
        data,
        html_content: page.content,
    })
}

async fn do_processing(backend: &RemoteClient, url: &str, html_content: &str) -> Value {
    let screenshot = call_backend_field(
        backend,
        MessageType::Screenshot,
        json!({"url": url, "timeout": BACKEND_JOB_TIMEOUT_SECS}),
        "screenshot",
    )
    .await;

    let performance = call_backend_field(
        backend,
        MessageType::Performance,
        json!({"url": url, "timeout": BACKEND_JOB_TIMEOUT_SECS}),
        "performance",
    )
    .await;

    let thumbnails = call_backend(
        backend,
        MessageType::ImageProcessing,
        json!({
            "url": url,
            "html_content": html_content,
            "max_images": MAX_IMAGES,
        }),
    )
    .await
    .and_then(|data| data.get("success").and_then(|v| v.as_bool()).unwrap_or(false).then_some(data))
    .and_then(|data| data.get("thumbnails").cloned())
    .unwrap_or_else(|| Value::Array(Vec::new()));

    json!({
        "screenshot": screenshot,
        "performance": performance,
        "thumbnails": thumbnails,
    })
}

async fn call_backend(backend: &RemoteClient, msg_type: MessageType, data: Value) -> Option<Value> {
    match backend.call(msg_type, data).await {
        Ok(response) => Some(response),
        Err(err) => {
            warn!(msg_type = msg_type.as_str(), %err, "backend job failed, degrading result");
            None
        }
    }
}

async fn call_backend_field(
    backend: &RemoteClient,
    msg_type: MessageType,
    data: Value,
    field: &str,
) -> Value {
    call_backend(backend, msg_type, data)
        .await
        .filter(|response| response.get("success").and_then(|v| v.as_bool()).unwrap_or(false))
        .and_then(|response| response.get(field).cloned())
        .unwrap_or(Value::Null)
}

pub fn remote_client_for(host: &str, port: u16) -> RemoteClient {
    RemoteClient::with_config(host, port, 3, Duration::from_secs(BACKEND_JOB_TIMEOUT_SECS))
}
