//! Announce newly published books for each configured keyword.
//!
//! Meant to be invoked by an external scheduler (cron, systemd timer).

use better_life_alerts::config::{BookWatchConfig, HttpConfig, NaverConfig, TelegramConfig};
use better_life_alerts::ingest::providers::naver_book::NaverBookSource;
use better_life_alerts::notify::{NotifySink, TelegramNotifier};
use better_life_alerts::pipeline::Pipeline;
use better_life_alerts::telemetry;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let telegram = TelegramConfig::from_env()?;
    let http = HttpConfig::from_env()?;
    let naver = NaverConfig::from_env()?;
    let watch = BookWatchConfig::from_env()?;

    let sink = NotifySink::new(TelegramNotifier::new(&telegram, http)?);

    let client = NaverBookSource::client(&naver, http)?;
    let sources: Vec<NaverBookSource> = watch
        .keywords
        .iter()
        .map(|kw| NaverBookSource::with_client(client.clone(), kw.as_str()))
        .collect();

    let pipeline = Pipeline::new(
        watch.novelty.clone(),
        watch.first_run,
        &watch.cache_file,
        watch.retention,
    );
    let today = chrono::Local::now().date_naive();
    let report = pipeline.run_batch(&sources, &sink, today).await?;

    tracing::info!(
        keywords = sources.len(),
        completed = report.completed.len(),
        failed = report.failed.len(),
        "book check finished"
    );
    Ok(())
}
