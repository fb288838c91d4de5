use std::sync::Arc;

use frontend::config::Config;
use frontend::{router, AppState};
use health::HealthRegistry;
use serde_json::Value;
use task_registry::TaskRegistry;

async fn spawn_test_server() -> String {
    let config = Config {
        ip: "127.0.0.1".to_string(),
        port: 0,
        processing_host: "127.0.0.1".to_string(),
        // Nothing listens here; backend calls degrade instead of blocking
        // the frontend's own request/response cycle.
        processing_port: 1,
        workers: 1,
        max_tasks: 1000,
        verbose: false,
        export_prometheus: false,
    };

    let state = AppState {
        registry: Arc::new(TaskRegistry::new(config.max_tasks)),
        backend: frontend::pipeline::remote_client_for(&config.processing_host, config.processing_port),
        liveness: HealthRegistry::new("test"),
        timesource: Arc::new(frontend::time::SystemTime {}),
    };

    let app = router::router(state, false);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn root_describes_the_service() {
    let base = spawn_test_server().await;
    let body: Value = reqwest::get(format!("{base}/")).await.unwrap().json().await.unwrap();
    assert_eq!(body["service"], "Web Scraping Server");
}

#[tokio::test]
async fn scrape_without_url_is_a_bad_request() {
    let base = spawn_test_server().await;
    let response = reqwest::get(format!("{base}/scrape")).await.unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn scrape_with_an_invalid_url_is_a_bad_request() {
    let base = spawn_test_server().await;
    let response = reqwest::get(format!("{base}/scrape?url=not-a-url")).await.unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn scrape_creates_a_pending_task_with_a_trackable_id() {
    let base = spawn_test_server().await;
    let response = reqwest::get(format!("{base}/scrape?url=https://example.com")).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "pending");
    let task_id = body["task_id"].as_str().unwrap();

    let status: Value = reqwest::get(format!("{base}/status/{task_id}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(["pending", "scraping", "processing", "completed", "failed"]
        .contains(&status["status"].as_str().unwrap()));
}

#[tokio::test]
async fn status_and_result_404_for_unknown_tasks() {
    let base = spawn_test_server().await;
    let unknown = uuid::Uuid::new_v4();

    let status = reqwest::get(format!("{base}/status/{unknown}")).await.unwrap();
    assert_eq!(status.status(), 404);

    let result = reqwest::get(format!("{base}/result/{unknown}")).await.unwrap();
    assert_eq!(result.status(), 404);
}

#[tokio::test]
async fn tasks_endpoint_reports_counts() {
    let base = spawn_test_server().await;
    reqwest::get(format!("{base}/scrape?url=https://example.com")).await.unwrap();
    reqwest::get(format!("{base}/scrape?url=https://example.org")).await.unwrap();

    let body: Value = reqwest::get(format!("{base}/tasks")).await.unwrap().json().await.unwrap();
    assert_eq!(body["total_tasks"], 2);
}
