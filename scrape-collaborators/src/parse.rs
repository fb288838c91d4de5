//! Turns a downloaded HTML document into the structured shape the frontend
//! returns from `/scrape`: title, links, heading structure, image count, and
//! page metadata (basic meta tags, Open Graph, Twitter cards, canonical URL,
//! declared language).

use std::collections::BTreeMap;

use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

#[derive(Debug, Clone, Serialize, Default)]
pub struct PageMetadata {
    pub basic: BTreeMap<String, String>,
    pub open_graph: BTreeMap<String, String>,
    pub twitter: BTreeMap<String, String>,
    pub other: BTreeMap<String, String>,
    pub canonical_url: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParsedPage {
    pub title: String,
    pub links: Vec<String>,
    pub structure: BTreeMap<String, usize>,
    pub images_count: usize,
    pub metadata: PageMetadata,
}

const BASIC_META_NAMES: [&str; 7] = [
    "description",
    "keywords",
    "author",
    "viewport",
    "robots",
    "generator",
    "theme-color",
];

/// Parses `html`, resolving relative links and image sources against
/// `base_url`. Never fails: a malformed document just yields empty fields,
/// mirroring how a best-effort scraper should behave with adversarial input.
pub fn parse_html(html: &str, base_url: &str) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
        structure: extract_structure(&document),
        images_count: count_images(&document),
        metadata: extract_metadata(&document),
    }
}

fn extract_title(document: &Html) -> String {
    if let Ok(selector) = Selector::parse("title") {
        if let Some(el) = document.select(&selector).next() {
            let text: String = el.text().collect();
            let text = text.trim();
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }
    if let Some(content) = meta_property(document, "og:title") {
        return content;
    }
    String::new()
}

fn extract_links(document: &Html, base_url: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let base = Url::parse(base_url).ok();

    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();
    for el in document.select(&selector) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            continue;
        }

        let resolved = match &base {
            Some(base) => base.join(href).ok().map(|u| u.to_string()),
            None => Some(href.to_string()),
        };
        let Some(resolved) = resolved else { continue };

        let Ok(parsed) = Url::parse(&resolved) else {
            continue;
        };
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            continue;
        }

        if seen.insert(resolved.clone()) {
            links.push(resolved);
        }
    }
    links
}

fn extract_structure(document: &Html) -> BTreeMap<String, usize> {
    let mut structure = BTreeMap::new();
    for level in 1..=6 {
        let tag = format!("h{level}");
        let Ok(selector) = Selector::parse(&tag) else {
            continue;
        };
        let count = document.select(&selector).count();
        if count > 0 {
            structure.insert(tag, count);
        }
    }
    structure
}

fn count_images(document: &Html) -> usize {
    Selector::parse("img")
        .map(|selector| document.select(&selector).count())
        .unwrap_or(0)
}

fn extract_metadata(document: &Html) -> PageMetadata {
    let mut metadata = PageMetadata {
        canonical_url: extract_canonical_url(document),
        language: extract_language(document),
        ..Default::default()
    };

    let Ok(meta_selector) = Selector::parse("meta") else {
        return metadata;
    };

    for el in document.select(&meta_selector) {
        let content = el.value().attr("content").unwrap_or("").trim().to_string();
        if content.is_empty() {
            continue;
        }

        if let Some(property) = el.value().attr("property") {
            if let Some(key) = property.strip_prefix("og:") {
                metadata.open_graph.insert(key.to_string(), content.clone());
                continue;
            }
        }
        if let Some(name) = el.value().attr("name") {
            if let Some(key) = name.strip_prefix("twitter:") {
                metadata.twitter.insert(key.to_string(), content.clone());
                continue;
            }
            if BASIC_META_NAMES.contains(&name) {
                metadata.basic.insert(name.to_string(), content.clone());
                continue;
            }
        }

        let name = el
            .value()
            .attr("name")
            .or_else(|| el.value().attr("property"));
        if let Some(name) = name {
            let already_categorized = name.starts_with("og:")
                || name.starts_with("twitter:")
                || BASIC_META_NAMES.contains(&name);
            if !already_categorized {
                metadata.other.insert(name.to_string(), content);
            }
        }
    }

    if let Ok(charset_selector) = Selector::parse("meta[charset]") {
        if let Some(el) = document.select(&charset_selector).next() {
            if let Some(charset) = el.value().attr("charset") {
                metadata.basic.insert("charset".to_string(), charset.to_string());
            }
        }
    }

    metadata
}

fn extract_canonical_url(document: &Html) -> String {
    let Ok(selector) = Selector::parse("link[rel=canonical]") else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .unwrap_or("")
        .trim()
        .to_string()
}

fn extract_language(document: &Html) -> String {
    if let Ok(selector) = Selector::parse("html") {
        if let Some(el) = document.select(&selector).next() {
            if let Some(lang) = el.value().attr("lang").or_else(|| el.value().attr("xml:lang")) {
                let lang = lang.trim();
                if !lang.is_empty() {
                    return lang.to_string();
                }
            }
        }
    }
    if let Ok(selector) = Selector::parse("meta[http-equiv=content-language]") {
        if let Some(el) = document.select(&selector).next() {
            return el.value().attr("content").unwrap_or("").trim().to_string();
        }
    }
    String::new()
}

fn meta_property(document: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse("meta[property]").ok()?;
    document
        .select(&selector)
        .find(|el| el.value().attr("property") == Some(property))
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
