//! Poll remaining seats for one Interpark goods while its booking window is open.
//!
//! Usage: `seat_watch <goods-code> [poll-interval-secs]` (default 60 s).

use std::time::Duration;

use better_life_alerts::config::{HttpConfig, TelegramConfig};
use better_life_alerts::error::{ConfigError, FetchError};
use better_life_alerts::ingest::providers::interpark::{InterparkClient, SeatSource};
use better_life_alerts::notify::{NotifySink, ParseMode, TelegramNotifier};
use better_life_alerts::render;
use better_life_alerts::scheduler::{Clock, PollingDriver, SystemClock, TokioSleeper, WindowState};
use better_life_alerts::telemetry;

const DEFAULT_INTERVAL_SECS: u64 = 60;

fn parse_args(args: &[String]) -> Result<(String, Duration), ConfigError> {
    let usage = || ConfigError::Usage("seat_watch <goods-code> [poll-interval-secs]".into());
    let goods = args.first().map(|s| s.trim()).filter(|s| !s.is_empty()).ok_or_else(usage)?;
    let secs = match args.get(1) {
        None => DEFAULT_INTERVAL_SECS,
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(n) if n > 0 => n,
            _ => return Err(usage()),
        },
    };
    Ok((goods.to_string(), Duration::from_secs(secs)))
}

/// Metadata, then the polling loop. Any fetch error ends the watch.
async fn watch(
    client: InterparkClient,
    sink: &NotifySink,
    interval: Duration,
) -> Result<(), FetchError> {
    let summary = client.summary().await?;
    let window = summary.booking_window();
    let clock = SystemClock;

    if window.state(clock.now()) != WindowState::InWindow {
        tracing::info!(
            goods = %client.goods_code(),
            open = %window.open(),
            close = %window.close(),
            "outside booking window, nothing to do"
        );
        return Ok(());
    }

    let sequences = client.play_sequences(&summary).await?;
    tracing::info!(goods = %summary.name, plays = sequences.len(), ?interval, "watching seats");
    let source = SeatSource::new(client, summary, sequences);

    let report = PollingDriver::new(&source, sink, &clock, &TokioSleeper, window, interval)
        .run()
        .await?;
    tracing::info!(fetches = report.fetches, notifications = report.notifications, "seat watch done");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (goods_code, interval) = parse_args(&args)?;
    let telegram = TelegramConfig::from_env()?;
    let http = HttpConfig::from_env()?;

    let sink = NotifySink::new(TelegramNotifier::new(&telegram, http)?);
    let client = InterparkClient::new(http, goods_code.as_str())?;

    if let Err(e) = watch(client, &sink, interval).await {
        tracing::error!(goods = %goods_code, error = %e, "seat watch failed");
        let label = format!("Seat watch {goods_code}");
        sink.notify(&render::failure_report(&label, &e), ParseMode::Plain).await;
    }
    Ok(())
}
