// src/ingest/types.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// One normalized unit of vendor content (a book, a play time, a product variant).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    /// Stable identifier (ISBN, play sequence, product spec). `None` keeps the
    /// item out of dedup tracking entirely.
    pub key: Option<String>,
    pub title: String,
    pub timestamp: NaiveDate,
    pub link: String,
    /// Vendor-specific fields (price, stock, seat counts).
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl Item {
    pub fn new(
        key: impl Into<String>,
        title: impl Into<String>,
        timestamp: NaiveDate,
        link: impl Into<String>,
    ) -> Self {
        let key: String = key.into();
        let key = key.trim();
        Self {
            key: (!key.is_empty()).then(|| key.to_string()),
            title: title.into(),
            timestamp,
            link: link.into(),
            detail: serde_json::Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }

    /// Key usable for dedup, if any.
    pub fn dedup_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// Render a detail field as a comparable string (`true`, `"IN_STOCK"` → `IN_STOCK`).
    pub fn field(&self, name: &str) -> Option<String> {
        match self.detail.get(name)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// A vendor adapter: fetches the current items and knows how to describe them.
#[async_trait]
pub trait Source: Send + Sync {
    /// Current items. Zero results is `Ok(vec![])`, never an error.
    async fn fetch_latest(&self) -> Result<Vec<Item>, FetchError>;

    /// Short label used in logs and failure reports.
    fn name(&self) -> &str;

    /// HTML-mode alert body for the given novel items (already ordered).
    fn render_alert(&self, novel: &[Item]) -> String;
}
