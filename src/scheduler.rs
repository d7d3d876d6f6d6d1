// src/scheduler.rs
//! Bounded live polling: fetch, compare with the previous iteration, notify on
//! change, sleep, repeat while the booking window is open.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::FetchError;
use crate::ingest::types::{Item, Source};
use crate::notify::{Delivery, NotifySink, ParseMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    BeforeWindow,
    InWindow,
    Closed,
}

/// Open/close pair during which polling is meaningful. Derived from source
/// metadata every process start; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingWindow {
    open: DateTime<Utc>,
    close: DateTime<Utc>,
}

impl BookingWindow {
    pub fn new(open: DateTime<Utc>, close: DateTime<Utc>) -> Self {
        Self { open, close }
    }

    pub fn open(&self) -> DateTime<Utc> {
        self.open
    }

    pub fn close(&self) -> DateTime<Utc> {
        self.close
    }

    /// Both ends inclusive.
    pub fn state(&self, now: DateTime<Utc>) -> WindowState {
        if now < self.open {
            WindowState::BeforeWindow
        } else if now > self.close {
            WindowState::Closed
        } else {
            WindowState::InWindow
        }
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, d: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await;
    }
}

/// What a driver run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub fetches: usize,
    pub notifications: usize,
    pub final_state: WindowState,
}

pub struct PollingDriver<'a> {
    source: &'a dyn Source,
    sink: &'a NotifySink,
    clock: &'a dyn Clock,
    sleeper: &'a dyn Sleeper,
    window: BookingWindow,
    interval: Duration,
}

impl<'a> PollingDriver<'a> {
    pub fn new(
        source: &'a dyn Source,
        sink: &'a NotifySink,
        clock: &'a dyn Clock,
        sleeper: &'a dyn Sleeper,
        window: BookingWindow,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            sink,
            clock,
            sleeper,
            window,
            interval,
        }
    }

    /// Poll until the window closes. Returns immediately, with zero fetches,
    /// when not started inside the window. A fetch error ends the run; the
    /// caller decides how to report it.
    pub async fn run(&self) -> Result<PollReport, FetchError> {
        let mut state = self.window.state(self.clock.now());
        let mut report = PollReport {
            fetches: 0,
            notifications: 0,
            final_state: state,
        };
        if state != WindowState::InWindow {
            tracing::info!(
                source = self.source.name(),
                state = ?state,
                open = %self.window.open(),
                close = %self.window.close(),
                "outside booking window, not polling"
            );
            return Ok(report);
        }

        // Previous iteration only; a restart starts from nothing.
        let mut previous: Option<Vec<Item>> = None;

        while state == WindowState::InWindow {
            let current = self.source.fetch_latest().await?;
            report.fetches += 1;

            let changed = previous.as_ref() != Some(&current);
            if changed && !current.is_empty() {
                let text = self.source.render_alert(&current);
                if self.sink.notify(&text, ParseMode::Html).await == Delivery::Sent {
                    report.notifications += 1;
                }
            }
            tracing::debug!(
                source = self.source.name(),
                items = current.len(),
                changed,
                "poll"
            );
            previous = Some(current);

            self.sleeper.sleep(self.interval).await;
            state = self.window.state(self.clock.now());
        }

        report.final_state = state;
        tracing::info!(
            source = self.source.name(),
            fetches = report.fetches,
            notifications = report.notifications,
            "booking window closed"
        );
        Ok(report)
    }
}
