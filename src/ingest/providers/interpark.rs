// src/ingest/providers/interpark.rs
//! Interpark ticket API: goods summary (booking window), play times, and
//! remaining seats per play time.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER};
use serde::{Deserialize, Deserializer};
use serde_json::json;

use crate::config::HttpConfig;
use crate::error::FetchError;
use crate::ingest::types::{Item, Source};
use crate::ingest::{get_json, vendor_client};
use crate::render;
use crate::scheduler::BookingWindow;

const API_BASE: &str = "https://api-ticketfront.interpark.com/v1/goods";
const GOODS_PAGE: &str = "https://tickets.interpark.com/goods";

/// The API speaks Korea Standard Time without an offset marker.
pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("+09:00 is a valid offset")
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSummary {
    goods_name: String,
    ticket_open_date: String,
    booking_end_date: String,
    #[serde(default)]
    play_start_date: String,
    #[serde(default)]
    play_end_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaySeq {
    #[serde(deserialize_with = "string_or_number")]
    pub play_seq: String,
    pub play_date: String,
    pub play_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemainSeats {
    #[serde(default)]
    remain_seat: Vec<SeatGrade>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeatGrade {
    seat_grade_name: String,
    #[serde(default)]
    remain_cnt: i64,
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number, got {other}"))),
    }
}

/// `202510181100` in KST.
fn parse_kst_minute(s: &str) -> Result<DateTime<FixedOffset>, FetchError> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), "%Y%m%d%H%M")
        .map_err(|e| FetchError::Malformed(format!("bad timestamp {s:?}: {e}")))?;
    kst()
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| FetchError::Malformed(format!("ambiguous timestamp {s:?}")))
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoodsSummary {
    pub name: String,
    pub booking_open: DateTime<FixedOffset>,
    pub booking_end: DateTime<FixedOffset>,
    pub play_start: String,
    pub play_end: String,
}

impl GoodsSummary {
    pub fn booking_window(&self) -> BookingWindow {
        BookingWindow::new(
            self.booking_open.with_timezone(&Utc),
            self.booking_end.with_timezone(&Utc),
        )
    }

    #[cfg(test)]
    fn parse(s: &str) -> Result<Self, FetchError> {
        let env: Envelope<RawSummary> = serde_json::from_str(s)?;
        Self::from_raw(env.data)
    }

    fn from_raw(raw: RawSummary) -> Result<Self, FetchError> {
        Ok(Self {
            name: raw.goods_name,
            booking_open: parse_kst_minute(&raw.ticket_open_date)?,
            booking_end: parse_kst_minute(&raw.booking_end_date)?,
            play_start: raw.play_start_date,
            play_end: raw.play_end_date,
        })
    }
}

/// Metadata calls for one goods code.
#[derive(Clone)]
pub struct InterparkClient {
    client: reqwest::Client,
    goods_code: String,
}

impl InterparkClient {
    pub fn new(http: HttpConfig, goods_code: impl Into<String>) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(REFERER, HeaderValue::from_static("https://tickets.interpark.com/"));
        Ok(Self {
            client: vendor_client(http, headers)?,
            goods_code: goods_code.into(),
        })
    }

    pub fn goods_code(&self) -> &str {
        &self.goods_code
    }

    pub fn goods_page(&self) -> String {
        format!("{GOODS_PAGE}/{}", self.goods_code)
    }

    pub async fn summary(&self) -> Result<GoodsSummary, FetchError> {
        let url = format!("{API_BASE}/{}/summary", self.goods_code);
        let req = self.client.get(url).query(&[("goodsCode", self.goods_code.as_str())]);
        let env: Envelope<RawSummary> = get_json(req).await?;
        GoodsSummary::from_raw(env.data)
    }

    pub async fn play_sequences(&self, summary: &GoodsSummary) -> Result<Vec<PlaySeq>, FetchError> {
        let url = format!("{API_BASE}/{}/playSeq", self.goods_code);
        let req = self.client.get(url).query(&[
            ("startDate", summary.play_start.as_str()),
            ("endDate", summary.play_end.as_str()),
            ("goodsCode", self.goods_code.as_str()),
            ("isBookableDate", "true"),
            ("page", "1"),
            ("pageSize", "1550"),
        ]);
        let env: Envelope<Vec<PlaySeq>> = get_json(req).await?;
        Ok(env.data)
    }

    async fn remain_seats(&self, seq: &PlaySeq) -> Result<RemainSeats, FetchError> {
        let url = format!(
            "{API_BASE}/{}/playSeq/PlaySeq/{}/REMAINSEAT",
            self.goods_code, seq.play_seq
        );
        let env: Envelope<RemainSeats> = get_json(self.client.get(url)).await?;
        Ok(env.data)
    }
}

/// Play times of one goods that currently have seats left.
pub struct SeatSource {
    client: InterparkClient,
    summary: GoodsSummary,
    sequences: Vec<PlaySeq>,
}

impl SeatSource {
    pub fn new(client: InterparkClient, summary: GoodsSummary, sequences: Vec<PlaySeq>) -> Self {
        Self {
            client,
            summary,
            sequences,
        }
    }

    fn to_item(&self, seq: &PlaySeq, seats: RemainSeats) -> Result<Option<Item>, FetchError> {
        let open: Vec<serde_json::Value> = seats
            .remain_seat
            .into_iter()
            .filter(|g| g.remain_cnt > 0)
            .map(|g| json!({ "grade": g.seat_grade_name, "remain": g.remain_cnt }))
            .collect();
        if open.is_empty() {
            return Ok(None);
        }

        let when = parse_kst_minute(&format!("{}{}", seq.play_date, seq.play_time))?;
        Ok(Some(
            Item::new(
                seq.play_seq.clone(),
                when.format("%Y-%m-%d %H:%M").to_string(),
                when.date_naive(),
                self.client.goods_page(),
            )
            .with_detail(serde_json::Value::Array(open)),
        ))
    }
}

#[async_trait]
impl Source for SeatSource {
    async fn fetch_latest(&self) -> Result<Vec<Item>, FetchError> {
        let mut out = Vec::new();
        for seq in &self.sequences {
            let seats = self.client.remain_seats(seq).await?;
            if let Some(item) = self.to_item(seq, seats)? {
                out.push(item);
            }
        }
        tracing::debug!(
            goods = %self.client.goods_code(),
            checked = self.sequences.len(),
            with_seats = out.len(),
            "seat check"
        );
        Ok(out)
    }

    fn name(&self) -> &str {
        &self.summary.name
    }

    fn render_alert(&self, novel: &[Item]) -> String {
        let mut lines = vec![
            "<b>Seats available</b>".to_string(),
            render::escape_text(&self.summary.name).into_owned(),
        ];
        for it in novel {
            let grades: Vec<String> = it
                .detail
                .as_array()
                .map(|gs| {
                    gs.iter()
                        .map(|g| {
                            format!(
                                "{} {}",
                                g["grade"].as_str().unwrap_or_default(),
                                g["remain"].as_i64().unwrap_or_default()
                            )
                        })
                        .collect()
                })
                .unwrap_or_default();
            lines.push(render::escape_text(&format!("{}: {}", it.title, grades.join(", "))).into_owned());
        }
        lines.push(render::escape_text(&self.client.goods_page()).into_owned());
        lines.join("\n")
    }
}
