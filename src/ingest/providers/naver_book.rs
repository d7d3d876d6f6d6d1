// src/ingest/providers/naver_book.rs
//! Naver book search, newest first, for one keyword.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::json;

use crate::config::{HttpConfig, NaverConfig};
use crate::error::FetchError;
use crate::ingest::types::{Item, Source};
use crate::ingest::{clean_title, get_json, vendor_client};
use crate::render;

const SEARCH_URL: &str = "https://openapi.naver.com/v1/search/book.json";
/// Results requested per keyword.
pub const PAGE_SIZE: usize = 20;

#[derive(Debug, Deserialize)]
struct SearchReply {
    #[serde(default)]
    items: Vec<Book>,
}

#[derive(Debug, Deserialize)]
struct Book {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    isbn: String,
    #[serde(default)]
    pubdate: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    publisher: String,
    #[serde(default)]
    discount: String,
}

pub struct NaverBookSource {
    client: reqwest::Client,
    keyword: String,
}

impl NaverBookSource {
    /// Client carrying the API credentials; shared by every keyword.
    pub fn client(creds: &NaverConfig, http: HttpConfig) -> anyhow::Result<reqwest::Client> {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            ("x-naver-client-id", &creds.client_id),
            ("x-naver-client-secret", &creds.client_secret),
        ] {
            let value = HeaderValue::from_str(value)
                .map_err(|_| anyhow::anyhow!("{name} is not a valid header value"))?;
            headers.insert(HeaderName::from_static(name), value);
        }
        Ok(vendor_client(http, headers)?)
    }

    pub fn with_client(client: reqwest::Client, keyword: impl Into<String>) -> Self {
        Self {
            client,
            keyword: keyword.into(),
        }
    }

    fn parse_reply(reply: SearchReply) -> Vec<Item> {
        let mut out = Vec::with_capacity(reply.items.len());
        for b in reply.items {
            let Some(published) = parse_pubdate(&b.pubdate) else {
                tracing::warn!(isbn = %b.isbn, pubdate = %b.pubdate, "book without usable pubdate skipped");
                continue;
            };
            out.push(
                Item::new(b.isbn, clean_title(&b.title), published, b.link).with_detail(json!({
                    "author": clean_title(&b.author),
                    "publisher": b.publisher,
                    "discount": b.discount,
                })),
            );
        }
        out
    }

    pub fn parse_items_from_str(s: &str) -> Result<Vec<Item>, FetchError> {
        let reply: SearchReply = serde_json::from_str(s)?;
        Ok(Self::parse_reply(reply))
    }
}

/// `20240105`, tolerating the dashed form.
fn parse_pubdate(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

#[async_trait]
impl Source for NaverBookSource {
    async fn fetch_latest(&self) -> Result<Vec<Item>, FetchError> {
        tracing::debug!(keyword = %self.keyword, "book search");
        let display = PAGE_SIZE.to_string();
        let req = self.client.get(SEARCH_URL).query(&[
            ("query", self.keyword.as_str()),
            ("sort", "date"),
            ("display", display.as_str()),
        ]);
        let reply: SearchReply = get_json(req).await?;
        let items = Self::parse_reply(reply);
        tracing::debug!(keyword = %self.keyword, found = items.len(), "book search done");
        Ok(items)
    }

    fn name(&self) -> &str {
        "New books"
    }

    fn render_alert(&self, novel: &[Item]) -> String {
        let mut lines = vec![render::bold(&format!("New books - \"{}\"", self.keyword))];
        lines.extend(render::numbered(novel, |b| {
            format!("{} {}", b.timestamp.format("%Y-%m-%d"), render::link(&b.link, &b.title))
        }));
        lines.join("\n")
    }
}
