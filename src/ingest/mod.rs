// src/ingest/mod.rs
//! Vendor adapters and the helpers they share: HTTP client construction,
//! JSON fetching with typed errors, and title normalization.

pub mod providers;
pub mod types;

use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::config::HttpConfig;
use crate::error::FetchError;

pub use types::{Item, Source};

/// Desktop-browser user agent; the retail and ticketing APIs reject bare clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Client with an explicit request timeout and browser-like default headers.
/// `extra` is merged on top (Referer, vendor credentials).
pub fn vendor_client(http: HttpConfig, extra: HeaderMap) -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.extend(extra);
    reqwest::Client::builder()
        .timeout(http.timeout)
        .default_headers(headers)
        .build()
}

/// Send, require 2xx, decode JSON. Decode failures carry the offending URL.
pub async fn get_json<T: DeserializeOwned>(req: reqwest::RequestBuilder) -> Result<T, FetchError> {
    let rsp = req.send().await?.error_for_status()?;
    let url = rsp.url().to_string();
    let body = rsp.text().await?;
    serde_json::from_str(&body).map_err(|e| FetchError::Malformed(format!("{url}: {e}")))
}

/// Vendor titles arrive with entities and highlight tags (`<b>rust</b>`).
/// Decode, strip tags, collapse whitespace.
pub fn clean_title(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z][^>]*>").expect("static regex"));
    let stripped = re_tags.replace_all(&decoded, "");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("static regex"));
    re_ws.replace_all(&stripped, " ").trim().to_string()
}
