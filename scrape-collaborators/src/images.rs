//! Extracts a page's images, downloads a bounded number of them, and builds
//! JPEG thumbnails suitable for embedding as base64 in a job result.

use std::io::Cursor;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::imageops::FilterType;
use scraper::{Html, Selector};
use url::Url;

pub const THUMBNAIL_SIZE: u32 = 200;
pub const JPEG_QUALITY: u8 = 85;
pub const DEFAULT_MAX_IMAGES: usize = 5;
const IMAGE_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);
const IMAGE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("url is not an image (content-type: {0})")]
    NotAnImage(String),
    #[error("failed to decode or encode image: {0}")]
    Image(#[from] image::ImageError),
}

/// Finds up to `max_images` absolute image URLs referenced by `html`,
/// resolving `src`/`data-src`/`data-lazy-src` against `base_url`.
pub fn extract_image_urls(html: &str, base_url: &str, max_images: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("img") else {
        return Vec::new();
    };
    let base = Url::parse(base_url).ok();

    let mut urls = Vec::new();
    for el in document.select(&selector) {
        let src = el
            .value()
            .attr("src")
            .or_else(|| el.value().attr("data-src"))
            .or_else(|| el.value().attr("data-lazy-src"));
        let Some(src) = src else { continue };

        let resolved = match &base {
            Some(base) => base.join(src).ok().map(|u| u.to_string()),
            None => Some(src.to_string()),
        };
        let Some(resolved) = resolved else { continue };

        if let Ok(parsed) = Url::parse(&resolved) {
            if parsed.scheme() == "http" || parsed.scheme() == "https" {
                urls.push(resolved);
            }
        }

        if urls.len() >= max_images {
            break;
        }
    }
    urls
}

/// Downloads one image, verifying the response declares an `image/*`
/// content type before returning its bytes.
pub async fn download_image(url: &str) -> Result<Vec<u8>, ImageError> {
    let client = reqwest::Client::builder()
        .timeout(IMAGE_DOWNLOAD_TIMEOUT)
        .user_agent(IMAGE_USER_AGENT)
        .build()?;

    let response = client.get(url).send().await?.error_for_status()?;
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !content_type.starts_with("image/") {
        return Err(ImageError::NotAnImage(content_type));
    }

    Ok(response.bytes().await?.to_vec())
}

/// Decodes `image_bytes`, shrinks it to fit within
/// `THUMBNAIL_SIZE`x`THUMBNAIL_SIZE` preserving aspect ratio, and re-encodes
/// it as base64 JPEG.
pub fn create_thumbnail(image_bytes: &[u8]) -> Result<String, ImageError> {
    let image = image::load_from_memory(image_bytes)?;
    let thumbnail = image.resize(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3);
    let rgb = thumbnail.to_rgb8();

    let mut buffer = Cursor::new(Vec::new());
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;

    Ok(BASE64.encode(buffer.into_inner()))
}

/// Downloads and thumbnails up to `max_images` images referenced by `html`,
/// skipping any that fail to download or decode rather than failing the
/// whole job.
pub async fn process_images(url: &str, html: &str, max_images: usize) -> Vec<String> {
    let image_urls = extract_image_urls(html, url, max_images);
    let mut thumbnails = Vec::new();

    for image_url in image_urls.into_iter().take(max_images) {
        let bytes = match download_image(&image_url).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(image_url, %err, "skipping image that failed to download");
                continue;
            }
        };
        match create_thumbnail(&bytes) {
            Ok(thumbnail) => thumbnails.push(thumbnail),
            Err(err) => tracing::debug!(image_url, %err, "skipping image that failed to thumbnail"),
        }
        if thumbnails.len() >= max_images {
            break;
        }
    }

    thumbnails
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_image_urls_up_to_the_limit() {
        let html = r#"<img src="/a.png"><img src="/b.png"><img src="/c.png">"#;
        let urls = extract_image_urls(html, "https://example.com", 2);
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0], "https://example.com/a.png");
    }

    #[test]
    fn falls_back_to_data_src_attributes() {
        let html = r#"<img data-src="/lazy.png">"#;
        let urls = extract_image_urls(html, "https://example.com", 5);
        assert_eq!(urls, vec!["https://example.com/lazy.png".to_string()]);
    }

    #[test]
    fn thumbnail_round_trips_a_small_png() {
        let mut img = image::RgbImage::new(400, 300);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([10, 20, 30]);
        }
        let mut png_bytes = Cursor::new(Vec::new());
        img.write_with_encoder(image::codecs::png::PngEncoder::new(&mut png_bytes))
            .unwrap();

        let thumbnail_b64 = create_thumbnail(&png_bytes.into_inner()).unwrap();
        let decoded = BASE64.decode(thumbnail_b64).unwrap();
        let thumbnail = image::load_from_memory(&decoded).unwrap();
        assert!(thumbnail.width() <= THUMBNAIL_SIZE);
        assert!(thumbnail.height() <= THUMBNAIL_SIZE);
    }
}
