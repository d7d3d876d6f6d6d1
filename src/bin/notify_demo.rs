//! Send one test alert through the configured Telegram chat.

use better_life_alerts::config::{HttpConfig, TelegramConfig};
use better_life_alerts::notify::{Delivery, NotifySink, ParseMode, TelegramNotifier};
use better_life_alerts::{render, telemetry};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let telegram = TelegramConfig::from_env()?;
    let http = HttpConfig::from_env()?;
    let sink = NotifySink::new(TelegramNotifier::new(&telegram, http)?);

    let text = format!(
        "{}\nsent at {}\n{}",
        render::bold("Notification test"),
        render::escape_text(&chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
        render::link("https://core.telegram.org/bots/api#sendmessage", "Bot API")
    );

    match sink.notify(&text, ParseMode::Html).await {
        Delivery::Sent => println!("notify-demo: delivered"),
        Delivery::Dropped => println!("notify-demo: not delivered, see log"),
    }
    Ok(())
}
