//! Headless-Chrome-backed jobs: full-page screenshots and Navigation Timing
//! based performance analysis. Both jobs launch their own browser instance
//! and tear it down when done — the backend's process pool is what bounds
//! concurrency, not a shared browser.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("failed to load page: {0}")]
    Navigation(String),
    #[error("failed to capture result: {0}")]
    Capture(String),
}

const WINDOW_WIDTH: u32 = 1920;
const WINDOW_HEIGHT: u32 = 1080;

async fn launch() -> Result<(Browser, tokio::task::JoinHandle<()>), BrowserError> {
    let config = BrowserConfig::builder()
        .window_size(WINDOW_WIDTH, WINDOW_HEIGHT)
        .args(vec![
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--disable-gpu",
            "--disable-extensions",
            "--disable-popup-blocking",
        ])
        .build()
        .map_err(BrowserError::Launch)?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|err| BrowserError::Launch(err.to_string()))?;

    let handle = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });

    Ok((browser, handle))
}

/// Renders `url` in a headless Chrome instance and returns a base64 PNG
/// screenshot of the full viewport.
pub async fn generate_screenshot(url: &str, timeout: Duration) -> Result<String, BrowserError> {
    let (mut browser, handle) = launch().await?;

    let result = tokio::time::timeout(timeout, async {
        let page = browser
            .new_page(url)
            .await
            .map_err(|err| BrowserError::Navigation(err.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|err| BrowserError::Navigation(err.to_string()))?;

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        let bytes = page
            .screenshot(params)
            .await
            .map_err(|err| BrowserError::Capture(err.to_string()))?;
        Ok::<_, BrowserError>(BASE64.encode(bytes))
    })
    .await;

    drop(browser.close().await);
    handle.abort();

    match result {
        Ok(inner) => inner,
        Err(_) => Err(BrowserError::Navigation(format!(
            "timed out loading {url}"
        ))),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    pub load_time_ms: i64,
    pub dom_content_loaded_ms: i64,
    pub response_time_ms: i64,
    pub dom_interactive_ms: i64,
    pub total_size_kb: i64,
    pub num_requests: i64,
    pub resource_types: BTreeMap<String, i64>,
    pub num_images: i64,
    pub num_scripts: i64,
    pub num_stylesheets: i64,
}

const NAVIGATION_TIMING_SCRIPT: &str = r#"
    (function() {
        var timing = window.performance.timing;
        return {
            loadTime: timing.loadEventEnd - timing.navigationStart,
            domContentLoaded: timing.domContentLoadedEventEnd - timing.navigationStart,
            responseTime: timing.responseEnd - timing.requestStart,
            domInteractive: timing.domInteractive - timing.navigationStart
        };
    })()
"#;

const RESOURCE_TIMING_SCRIPT: &str = r#"
    (function() {
        var resources = window.performance.getEntriesByType('resource');
        var totalSize = 0;
        var resourceTypes = {};
        resources.forEach(function(resource) {
            if (resource.transferSize) { totalSize += resource.transferSize; }
            var type = resource.initiatorType || 'other';
            resourceTypes[type] = (resourceTypes[type] || 0) + 1;
        });
        return { numRequests: resources.length, totalSize: totalSize, resourceTypes: resourceTypes };
    })()
"#;

const ELEMENT_COUNT_SCRIPT: &str = r#"
    (function() {
        return {
            numImages: document.getElementsByTagName('img').length,
            numScripts: document.getElementsByTagName('script').length,
            numStylesheets: document.getElementsByTagName('link').length
        };
    })()
"#;

/// Loads `url` and measures Navigation Timing API metrics, resource counts,
/// and basic DOM element counts, mirroring what a browser devtools
/// performance panel would report.
pub async fn analyze_performance(
    url: &str,
    timeout: Duration,
) -> Result<PerformanceMetrics, BrowserError> {
    let (mut browser, handle) = launch().await?;

    let result = tokio::time::timeout(timeout, async {
        let started = Instant::now();
        let page = browser
            .new_page(url)
            .await
            .map_err(|err| BrowserError::Navigation(err.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|err| BrowserError::Navigation(err.to_string()))?;
        let fallback_load_time = started.elapsed().as_millis() as i64;

        let navigation_timing: serde_json::Value = page
            .evaluate(NAVIGATION_TIMING_SCRIPT)
            .await
            .map_err(|err| BrowserError::Capture(err.to_string()))?
            .into_value()
            .map_err(|err| BrowserError::Capture(err.to_string()))?;
        let resources: serde_json::Value = page
            .evaluate(RESOURCE_TIMING_SCRIPT)
            .await
            .map_err(|err| BrowserError::Capture(err.to_string()))?
            .into_value()
            .map_err(|err| BrowserError::Capture(err.to_string()))?;
        let elements: serde_json::Value = page
            .evaluate(ELEMENT_COUNT_SCRIPT)
            .await
            .map_err(|err| BrowserError::Capture(err.to_string()))?
            .into_value()
            .map_err(|err| BrowserError::Capture(err.to_string()))?;

        let total_size = resources["totalSize"].as_i64().unwrap_or(0);
        let resource_types = resources["resourceTypes"]
            .as_object()
            .map(|map| {
                map.iter()
                    .map(|(k, v)| (k.clone(), v.as_i64().unwrap_or(0)))
                    .collect()
            })
            .unwrap_or_default();

        Ok::<_, BrowserError>(PerformanceMetrics {
            load_time_ms: navigation_timing["loadTime"]
                .as_i64()
                .unwrap_or(fallback_load_time),
            dom_content_loaded_ms: navigation_timing["domContentLoaded"].as_i64().unwrap_or(0),
            response_time_ms: navigation_timing["responseTime"].as_i64().unwrap_or(0),
            dom_interactive_ms: navigation_timing["domInteractive"].as_i64().unwrap_or(0),
            total_size_kb: total_size / 1024,
            num_requests: resources["numRequests"].as_i64().unwrap_or(0),
            resource_types,
            num_images: elements["numImages"].as_i64().unwrap_or(0),
            num_scripts: elements["numScripts"].as_i64().unwrap_or(0),
            num_stylesheets: elements["numStylesheets"].as_i64().unwrap_or(0),
        })
    })
    .await;

    drop(browser.close().await);
    handle.abort();

    match result {
        Ok(inner) => inner,
        Err(_) => Err(BrowserError::Navigation(format!(
            "timed out analyzing {url}"
        ))),
    }
}
