//! Collaborator adapters the backend dispatcher's job handlers call into:
//! fetching pages, parsing HTML, driving a headless browser, and building
//! image thumbnails. Each module wraps one external system behind a small,
//! synchronous-looking async function so job handlers stay free of any
//! particular HTTP client or browser automation detail.

pub mod browser;
pub mod fetch;
pub mod images;
pub mod parse;

pub use fetch::{fetch, FetchError, FetchedPage};
pub use parse::{parse_html, ParsedPage};
