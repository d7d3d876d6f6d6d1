//! Announce when a tracked Uniqlo colour/size goes on sale.

use better_life_alerts::change_detector::{FirstRunPolicy, NoveltyPolicy};
use better_life_alerts::config::{HttpConfig, PriceWatchConfig, TelegramConfig};
use better_life_alerts::ingest::providers::uniqlo::{UniqloSource, DISCOUNTED_FIELD};
use better_life_alerts::notify::{NotifySink, ParseMode, TelegramNotifier};
use better_life_alerts::pipeline::Pipeline;
use better_life_alerts::{render, telemetry};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let telegram = TelegramConfig::from_env()?;
    let http = HttpConfig::from_env()?;
    let watch = PriceWatchConfig::from_env()?;

    let sink = NotifySink::new(TelegramNotifier::new(&telegram, http)?);

    let mut sources = Vec::with_capacity(watch.products.len());
    for raw in &watch.products {
        match UniqloSource::new(http, raw) {
            Ok(src) => sources.push(src),
            Err(e) => {
                tracing::error!(product = %raw, error = %e, "product skipped");
                sink.notify(&render::failure_report(raw, &e), ParseMode::Plain).await;
            }
        }
    }

    // Initial state is always recorded; first-run policy has no say here.
    let pipeline = Pipeline::new(
        NoveltyPolicy::transition(DISCOUNTED_FIELD, "true"),
        FirstRunPolicy::NotifyAll,
        watch.cache_file(),
        watch.retention,
    );
    let today = chrono::Local::now().date_naive();
    let report = pipeline.run_batch(&sources, &sink, today).await?;

    tracing::info!(
        products = sources.len(),
        completed = report.completed.len(),
        failed = report.failed.len(),
        "price check finished"
    );
    Ok(())
}
