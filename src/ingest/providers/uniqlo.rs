// src/ingest/providers/uniqlo.rs
//! Uniqlo (KR) product variant: price, promo price and stock for one
//! colour/size combination.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER};
use serde::Deserialize;
use serde_json::json;

use crate::config::HttpConfig;
use crate::error::FetchError;
use crate::ingest::types::{Item, Source};
use crate::ingest::{get_json, vendor_client};
use crate::render;

const PRODUCT_PAGE: &str = "https://www.uniqlo.com/kr/ko/products";
const API_BASE: &str = "https://www.uniqlo.com/kr/api/commerce/v5/ko/products";
const STORE_ID: &str = "113326";

/// Detail field the sale watcher tracks.
pub const DISCOUNTED_FIELD: &str = "discounted";

/// `E465185-000/00?colorDisplayCode=09&sizeDisplayCode=004`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSpec {
    pub raw: String,
    pub product_id: String,
    pub price_group: String,
    pub color_code: String,
    pub size_code: String,
}

impl ProductSpec {
    pub fn parse(raw: &str) -> Result<Self, FetchError> {
        let raw = raw.trim();
        let malformed = |why: &str| FetchError::Malformed(format!("product spec {raw:?}: {why}"));

        let (path, _query) = raw.split_once('?').ok_or_else(|| malformed("missing query"))?;
        let (product_id, price_group) = path.split_once('/').ok_or_else(|| malformed("missing price group"))?;
        if product_id.is_empty() || price_group.is_empty() {
            return Err(malformed("empty product id or price group"));
        }

        static RE_COLOR: OnceCell<Regex> = OnceCell::new();
        static RE_SIZE: OnceCell<Regex> = OnceCell::new();
        let re_color = RE_COLOR.get_or_init(|| Regex::new(r"colorDisplayCode=(\d+)").expect("static regex"));
        let re_size = RE_SIZE.get_or_init(|| Regex::new(r"sizeDisplayCode=(\d+)").expect("static regex"));

        let color_code = re_color
            .captures(raw)
            .map(|c| c[1].to_string())
            .ok_or_else(|| malformed("missing colorDisplayCode"))?;
        let size_code = re_size
            .captures(raw)
            .map(|c| c[1].to_string())
            .ok_or_else(|| malformed("missing sizeDisplayCode"))?;

        Ok(Self {
            raw: raw.to_string(),
            product_id: product_id.to_string(),
            price_group: price_group.to_string(),
            color_code,
            size_code,
        })
    }

    pub fn page_url(&self) -> String {
        format!("{PRODUCT_PAGE}/{}", self.raw)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct Details {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Variants {
    #[serde(default)]
    l2s: Vec<Variant>,
    #[serde(default)]
    prices: HashMap<String, Price>,
    #[serde(default)]
    stocks: HashMap<String, Stock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Variant {
    l2_id: String,
    color: DisplayCode,
    size: DisplayCode,
    #[serde(default)]
    flags: Flags,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisplayCode {
    display_code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Flags {
    #[serde(default)]
    price_flags: Vec<Flag>,
}

#[derive(Debug, Deserialize)]
struct Flag {
    code: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Price {
    base: Amount,
    #[serde(default)]
    promo: Option<Amount>,
}

#[derive(Debug, Deserialize)]
struct Amount {
    value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Stock {
    #[serde(default)]
    status_localized: String,
}

pub struct UniqloSource {
    client: reqwest::Client,
    spec: ProductSpec,
}

impl UniqloSource {
    /// A malformed specifier fails here, before any request is made.
    pub fn new(http: HttpConfig, raw_spec: &str) -> Result<Self, FetchError> {
        let spec = ProductSpec::parse(raw_spec)?;
        let referer = HeaderValue::from_str(&spec.page_url())
            .map_err(|_| FetchError::Malformed(format!("product spec {raw_spec:?}: not usable in a URL")))?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(REFERER, referer);
        Ok(Self {
            client: vendor_client(http, headers)?,
            spec,
        })
    }

    /// Build the tracked item; `None` when the colour/size combination is not listed.
    fn variant_item(
        spec: &ProductSpec,
        name: &str,
        variants: Variants,
        today: NaiveDate,
    ) -> Result<Option<Item>, FetchError> {
        let Some(variant) = variants
            .l2s
            .into_iter()
            .find(|v| v.color.display_code == spec.color_code && v.size.display_code == spec.size_code)
        else {
            return Ok(None);
        };

        let price = variants
            .prices
            .get(&variant.l2_id)
            .ok_or_else(|| FetchError::Malformed(format!("no price for variant {}", variant.l2_id)))?;
        let stock = variants
            .stocks
            .get(&variant.l2_id)
            .map(|s| s.status_localized.clone())
            .unwrap_or_default();
        let discount_label = variant
            .flags
            .price_flags
            .iter()
            .find(|f| f.code == "discount")
            .map(|f| f.name.clone())
            .unwrap_or_default();

        let base = price.base.value.round() as i64;
        let promo = price.promo.as_ref().map(|p| p.value.round() as i64);
        // A promo equal to the base price is not a sale.
        let discounted = promo.is_some_and(|p| p > 0 && p < base);

        Ok(Some(
            Item::new(spec.raw.clone(), name, today, spec.page_url()).with_detail(json!({
                DISCOUNTED_FIELD: discounted,
                "base_price": base,
                "promo_price": promo,
                "stock": stock,
                "discount_label": discount_label,
            })),
        ))
    }
}

#[async_trait]
impl Source for UniqloSource {
    async fn fetch_latest(&self) -> Result<Vec<Item>, FetchError> {
        let base = format!("{API_BASE}/{}/price-groups/{}", self.spec.product_id, self.spec.price_group);

        let details_req = self.client.get(format!("{base}/details")).query(&[
            ("includeModelSize", "false"),
            ("imageRatio", "3x4"),
            ("httpFailure", "true"),
        ]);
        let details: Envelope<Details> = get_json(details_req).await?;

        let variants_req = self.client.get(format!("{base}/l2s")).query(&[
            ("withPrices", "true"),
            ("withStocks", "true"),
            ("storeId", STORE_ID),
            ("includePreviousPrice", "true"),
            ("httpFailure", "true"),
        ]);
        let variants: Envelope<Variants> = get_json(variants_req).await?;

        let today = chrono::Local::now().date_naive();
        match Self::variant_item(&self.spec, &details.result.name, variants.result, today)? {
            Some(item) => Ok(vec![item]),
            None => {
                tracing::info!(
                    product = %self.spec.raw,
                    color = %self.spec.color_code,
                    size = %self.spec.size_code,
                    "variant not listed"
                );
                Ok(Vec::new())
            }
        }
    }

    fn name(&self) -> &str {
        "Uniqlo sale"
    }

    fn render_alert(&self, novel: &[Item]) -> String {
        let mut blocks = Vec::with_capacity(novel.len());
        for it in novel {
            let base = it.detail["base_price"].as_i64().unwrap_or_default();
            let promo = it.detail["promo_price"].as_i64().unwrap_or(base);
            let stock = it.detail["stock"].as_str().unwrap_or_default();
            let label = it.detail["discount_label"].as_str().unwrap_or_default();

            let mut lines = vec!["Uniqlo sale".to_string(), render::bold(&it.title)];
            if !label.is_empty() {
                lines.push(render::escape_text(label).into_owned());
            }
            lines.push(format!(
                "{} → {} ({})",
                render::thousands(base),
                render::thousands(promo),
                render::escape_text(stock)
            ));
            lines.push(render::link(&it.link, "Product page"));
            blocks.push(lines.join("\n"));
        }
        blocks.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = "E465185-000/00?colorDisplayCode=09&sizeDisplayCode=004";

    fn variants(promo: &str) -> Variants {
        let body = format!(
            r#"{{"result":{{
                "l2s":[
                  {{"l2Id":"L1","color":{{"displayCode":"09"}},"size":{{"displayCode":"003"}},"flags":{{"priceFlags":[]}}}},
                  {{"l2Id":"L2","color":{{"displayCode":"09"}},"size":{{"displayCode":"004"}},
                    "flags":{{"priceFlags":[{{"code":"discount","name":"Limited offer"}}]}}}}
                ],
                "prices":{{
                  "L1":{{"base":{{"currency":{{"code":"KRW"}},"value":29900}},"promo":null}},
                  "L2":{{"base":{{"currency":{{"code":"KRW"}},"value":29900}},"promo":{promo}}}
                }},
                "stocks":{{"L2":{{"statusCode":"IN_STOCK","quantity":11,"statusLocalized":"In stock"}}}}
            }}}}"#
        );
        serde_json::from_str::<Envelope<Variants>>(&body).unwrap().result
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 20).unwrap()
    }

    #[test]
    fn spec_parses_codes() {
        let spec = ProductSpec::parse(SPEC).unwrap();
        assert_eq!(spec.product_id, "E465185-000");
        assert_eq!(spec.price_group, "00");
        assert_eq!(spec.color_code, "09");
        assert_eq!(spec.size_code, "004");
        assert_eq!(spec.page_url(), format!("https://www.uniqlo.com/kr/ko/products/{SPEC}"));
    }

    #[test]
    fn spec_without_size_is_malformed() {
        let err = ProductSpec::parse("E465185-000/00?colorDisplayCode=09").unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
        assert!(ProductSpec::parse("E465185-000").is_err());
    }

    #[test]
    fn promo_price_marks_variant_discounted() {
        let spec = ProductSpec::parse(SPEC).unwrap();
        let item = UniqloSource::variant_item(
            &spec,
            "Heattech Crew",
            variants(r#"{"currency":{"code":"KRW"},"value":19900}"#),
            today(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(item.key.as_deref(), Some(SPEC));
        assert_eq!(item.field(DISCOUNTED_FIELD).as_deref(), Some("true"));
        assert_eq!(item.detail["promo_price"], 19900);
        assert_eq!(item.field("stock").as_deref(), Some("In stock"));
        assert_eq!(item.field("discount_label").as_deref(), Some("Limited offer"));
    }

    #[test]
    fn no_promo_is_not_discounted() {
        let spec = ProductSpec::parse(SPEC).unwrap();
        let item = UniqloSource::variant_item(&spec, "Heattech Crew", variants("null"), today())
            .unwrap()
            .unwrap();
        assert_eq!(item.field(DISCOUNTED_FIELD).as_deref(), Some("false"));
    }

    #[test]
    fn unlisted_variant_yields_nothing() {
        let spec = ProductSpec::parse("E465185-000/00?colorDisplayCode=01&sizeDisplayCode=004").unwrap();
        let out = UniqloSource::variant_item(&spec, "Heattech Crew", variants("null"), today()).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn alert_shows_price_drop() {
        let src = UniqloSource::new(HttpConfig::default(), SPEC).unwrap();
        let item = UniqloSource::variant_item(
            &src.spec,
            "Heattech <Crew>",
            variants(r#"{"value":19900}"#),
            today(),
        )
        .unwrap()
        .unwrap();
        let text = src.render_alert(&[item]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Uniqlo sale");
        assert_eq!(lines[1], "<b>Heattech &lt;Crew&gt;</b>");
        assert_eq!(lines[2], "Limited offer");
        assert_eq!(lines[3], "29,900 → 19,900 (In stock)");
        assert!(lines[4].starts_with("<a href=\"https://www.uniqlo.com/kr/ko/products/E465185-000/00?colorDisplayCode=09&amp;sizeDisplayCode=004\">"));
    }
}
