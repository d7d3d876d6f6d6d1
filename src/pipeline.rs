// src/pipeline.rs
//! One-shot run: load snapshot → fetch → detect → notify → persist.
//!
//! The snapshot is written only after a successful fetch, so a failed run
//! leaves the previous state for the next scheduled invocation.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

use crate::change_detector::{detect, FirstRunPolicy, NoveltyPolicy};
use crate::error::{Disposition, RunError};
use crate::ingest::types::Source;
use crate::notify::{Delivery, NotifySink, ParseMode};
use crate::render;
use crate::snapshot::{self, SnapshotRow};

/// Pause between consecutive sources in a batch.
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Pipeline {
    pub policy: NoveltyPolicy,
    pub first_run: FirstRunPolicy,
    pub cache_path: PathBuf,
    pub retention: usize,
    pub pause: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub source: String,
    pub fetched: usize,
    pub novel: usize,
    pub recorded: usize,
    /// `None` when there was nothing to announce.
    pub delivery: Option<Delivery>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub completed: Vec<RunOutcome>,
    /// `(source, error)` for runs that were reported as failed.
    pub failed: Vec<(String, String)>,
}

impl Pipeline {
    pub fn new(
        policy: NoveltyPolicy,
        first_run: FirstRunPolicy,
        cache_path: impl Into<PathBuf>,
        retention: usize,
    ) -> Self {
        Self {
            policy,
            first_run,
            cache_path: cache_path.into(),
            retention,
            pause: DEFAULT_BATCH_PAUSE,
        }
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub async fn run_once(
        &self,
        source: &dyn Source,
        sink: &NotifySink,
        today: NaiveDate,
    ) -> Result<RunOutcome, RunError> {
        let existing = snapshot::load(&self.cache_path)?;
        let items = source.fetch_latest().await?;

        let det = detect(&self.policy, self.first_run, &items, existing.as_ref(), today);
        tracing::info!(
            source = source.name(),
            fetched = items.len(),
            novel = det.novel.len(),
            record = det.to_record.len(),
            "detection done"
        );

        let delivery = if det.novel.is_empty() {
            None
        } else {
            let text = source.render_alert(&det.novel);
            Some(sink.notify(&text, ParseMode::Html).await)
        };

        // The first successful run always leaves a file, possibly header-only,
        // so the next run is no longer a first run.
        if existing.is_none() || !det.to_record.is_empty() {
            let tracked = self.policy.tracked_field();
            let rows: Vec<SnapshotRow> = det
                .to_record
                .iter()
                .filter_map(|it| SnapshotRow::from_item(it, tracked))
                .collect();
            snapshot::merge_and_save(&self.cache_path, existing.as_ref(), rows, self.retention)?;
        }

        Ok(RunOutcome {
            source: source.name().to_string(),
            fetched: items.len(),
            novel: det.novel.len(),
            recorded: det.to_record.len(),
            delivery,
        })
    }

    /// [`run_once`](Self::run_once), reporting recoverable failures through the
    /// sink as plain text. Only fatal errors are returned.
    pub async fn run_guarded(
        &self,
        source: &dyn Source,
        sink: &NotifySink,
        today: NaiveDate,
    ) -> Result<Result<RunOutcome, String>, RunError> {
        match self.run_once(source, sink, today).await {
            Ok(outcome) => Ok(Ok(outcome)),
            Err(e) if e.disposition() == Disposition::Fatal => Err(e),
            Err(e) => {
                tracing::error!(source = source.name(), error = %e, disposition = ?e.disposition(), "run failed");
                let report = render::failure_report(source.name(), &e);
                sink.notify(&report, ParseMode::Plain).await;
                Ok(Err(e.to_string()))
            }
        }
    }

    /// Sources one at a time with [`pause`](Self::pause) between them. A failing
    /// source is reported and the batch moves on.
    pub async fn run_batch<S>(
        &self,
        sources: &[S],
        sink: &NotifySink,
        today: NaiveDate,
    ) -> Result<BatchReport, RunError>
    where
        S: Source,
    {
        let mut report = BatchReport::default();
        for (i, src) in sources.iter().enumerate() {
            if i > 0 && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
            match self.run_guarded(src, sink, today).await? {
                Ok(outcome) => report.completed.push(outcome),
                Err(msg) => report.failed.push((src.name().to_string(), msg)),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, NotifyError};
    use crate::ingest::types::Item;
    use crate::notify::Notifier;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct Fixed(Result<Vec<Item>, FetchError>);

    #[async_trait]
    impl Source for Fixed {
        async fn fetch_latest(&self) -> Result<Vec<Item>, FetchError> {
            self.0.clone()
        }

        fn name(&self) -> &str {
            "books"
        }

        fn render_alert(&self, novel: &[Item]) -> String {
            novel.iter().map(|i| i.title.as_str()).collect::<Vec<_>>().join("\n")
        }
    }

    #[derive(Clone, Default)]
    struct Sent(Arc<Mutex<Vec<(String, ParseMode)>>>);

    #[async_trait]
    impl Notifier for Sent {
        async fn send(&self, text: &str, mode: ParseMode) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push((text.to_string(), mode));
            Ok(())
        }

        fn name(&self) -> &'static str {
            "sent"
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[tokio::test]
    async fn quiet_first_run_still_writes_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("books.csv");
        let sent = Sent::default();
        let sink = NotifySink::new(sent.clone());
        let p = Pipeline::new(NoveltyPolicy::since_yesterday(), FirstRunPolicy::NotifyAll, &path, 50);

        let old = Item::new("1", "old", day(1), "l");
        let out = p.run_once(&Fixed(Ok(vec![old])), &sink, day(10)).await.unwrap();

        assert_eq!(out.novel, 0);
        assert_eq!(out.delivery, None);
        assert!(sent.0.lock().unwrap().is_empty());
        let snap = snapshot::load(&path).unwrap().expect("first run leaves a snapshot");
        assert!(snap.is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_is_reported_in_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("books.csv");
        let sent = Sent::default();
        let sink = NotifySink::new(sent.clone());
        let p = Pipeline::new(NoveltyPolicy::CacheExclusion, FirstRunPolicy::NotifyAll, &path, 50);

        let src = Fixed(Err(FetchError::Status {
            status: 503,
            url: "https://api.test/books".into(),
        }));
        let res = p.run_guarded(&src, &sink, day(10)).await.unwrap();
        assert!(res.is_err());

        let sent = sent.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "books check failed: HTTP 503 from https://api.test/books");
        assert_eq!(sent[0].1, ParseMode::Plain);
        assert!(!path.exists());
    }
}
