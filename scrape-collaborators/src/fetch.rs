//! Downloads a page the way the frontend's light scraping step needs it:
//! a desktop user agent, compressed transfer, redirects followed, and a
//! hard cap on how much body we're willing to buffer in memory.

use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
/// Pages larger than this are rejected rather than buffered in full; a
/// scrape target is never expected to be a multi-hundred-megabyte download.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("response body exceeds {max} bytes")]
    TooLarge { max: usize },
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub content: String,
    pub status: u16,
    pub final_url: String,
    pub content_type: String,
}

/// Fetches `url`, following redirects, and returns the decoded body along
/// with the bits of response metadata downstream parsing needs.
pub async fn fetch(url: &str) -> Result<FetchedPage, FetchError> {
    fetch_with_timeout(url, DEFAULT_TIMEOUT).await
}

pub async fn fetch_with_timeout(url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
    url::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT_ENCODING,
        reqwest::header::HeaderValue::from_static("gzip, deflate"),
    );

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()?;

    let response = client.get(url).send().await?;
    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if let Some(len) = response.content_length() {
        if len as usize > MAX_BODY_BYTES {
            return Err(FetchError::TooLarge {
                max: MAX_BODY_BYTES,
            });
        }
    }

    let bytes = response.bytes().await?;
    if bytes.len() > MAX_BODY_BYTES {
        return Err(FetchError::TooLarge {
            max: MAX_BODY_BYTES,
        });
    }
    let content = String::from_utf8_lossy(&bytes).into_owned();

    Ok(FetchedPage {
        content,
        status,
        final_url,
        content_type,
    })
}
