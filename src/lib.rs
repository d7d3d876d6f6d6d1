// src/lib.rs
// Shared core of the watchers: snapshot cache, change detection, notification
// sink and the bounded polling driver, plus the vendor adapters.

pub mod change_detector;
pub mod config;
pub mod error;
pub mod ingest;
pub mod notify;
pub mod pipeline;
pub mod render;
pub mod scheduler;
pub mod snapshot;
pub mod telemetry;

// ---- Re-exports for bins/tests ----
pub use crate::change_detector::{detect, Detection, FirstRunPolicy, NoveltyPolicy};
pub use crate::error::{ConfigError, FetchError, NotifyError, RunError};
pub use crate::ingest::{Item, Source};
pub use crate::notify::{Delivery, Notifier, NotifySink, ParseMode};
pub use crate::pipeline::{Pipeline, RunOutcome};
pub use crate::scheduler::{BookingWindow, PollingDriver, WindowState};
