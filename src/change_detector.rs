//! Novelty rules: which freshly fetched items deserve an alert.
//!
//! Pure functions over `(items, snapshot, today)`; no I/O. The pipeline decides
//! what to do with the result (notify `novel`, persist `to_record`).

use std::str::FromStr;

use chrono::{Duration, NaiveDate};

use crate::ingest::types::Item;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoveltyPolicy {
    /// Published within the trailing window AND not yet in the snapshot.
    DateThreshold { window_days: i64 },
    /// Not yet in the snapshot, whatever its age.
    CacheExclusion,
    /// Tracked detail field moved to `interesting` since the last recorded value.
    FieldTransition { field: String, interesting: String },
}

impl NoveltyPolicy {
    /// "Yesterday or later".
    pub fn since_yesterday() -> Self {
        NoveltyPolicy::DateThreshold { window_days: 1 }
    }

    pub fn transition(field: impl Into<String>, interesting: impl Into<String>) -> Self {
        NoveltyPolicy::FieldTransition {
            field: field.into(),
            interesting: interesting.into(),
        }
    }

    /// Field whose value is persisted in the snapshot `state` column.
    pub fn tracked_field(&self) -> Option<&str> {
        match self {
            NoveltyPolicy::FieldTransition { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// What an empty (never written) snapshot means for the cache-based policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstRunPolicy {
    /// Every qualifying item is announced.
    NotifyAll,
    /// Only the newest qualifying item is announced; all of them are recorded.
    SeedNewest,
}

impl FromStr for FirstRunPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "notify-all" | "notify_all" | "all" => Ok(FirstRunPolicy::NotifyAll),
            "seed-newest" | "seed_newest" | "seed" => Ok(FirstRunPolicy::SeedNewest),
            other => Err(format!("expected `notify-all` or `seed-newest`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    /// Items to announce, newest first.
    pub novel: Vec<Item>,
    /// Items whose row should be (re)written in the snapshot.
    pub to_record: Vec<Item>,
}

pub fn detect(
    policy: &NoveltyPolicy,
    first_run: FirstRunPolicy,
    items: &[Item],
    snapshot: Option<&Snapshot>,
    today: NaiveDate,
) -> Detection {
    let mut det = match policy {
        NoveltyPolicy::DateThreshold { window_days } => {
            let threshold = today - Duration::days(*window_days);
            let recent: Vec<&Item> = items.iter().filter(|it| it.timestamp >= threshold).collect();
            unseen(recent, snapshot, first_run)
        }
        NoveltyPolicy::CacheExclusion => unseen(items.iter().collect(), snapshot, first_run),
        NoveltyPolicy::FieldTransition { field, interesting } => {
            transitions(items, snapshot, field, interesting)
        }
    };
    newest_first(&mut det.novel);
    det.to_record.retain(|it| it.dedup_key().is_some());
    det
}

fn unseen(candidates: Vec<&Item>, snapshot: Option<&Snapshot>, first_run: FirstRunPolicy) -> Detection {
    match snapshot {
        Some(snap) => {
            let novel: Vec<Item> = candidates
                .into_iter()
                .filter(|it| it.dedup_key().map_or(true, |k| !snap.contains(k)))
                .cloned()
                .collect();
            Detection {
                to_record: novel.clone(),
                novel,
            }
        }
        None => {
            let mut all: Vec<Item> = candidates.into_iter().cloned().collect();
            match first_run {
                FirstRunPolicy::NotifyAll => Detection {
                    to_record: all.clone(),
                    novel: all,
                },
                FirstRunPolicy::SeedNewest => {
                    // Seeding only applies to keyed items; keyless ones are always novel.
                    newest_first(&mut all);
                    let mut novel: Vec<Item> = all
                        .iter()
                        .filter(|it| it.dedup_key().is_some())
                        .take(1)
                        .cloned()
                        .collect();
                    novel.extend(all.iter().filter(|it| it.dedup_key().is_none()).cloned());
                    Detection {
                        novel,
                        to_record: all,
                    }
                }
            }
        }
    }
}

fn transitions(
    items: &[Item],
    snapshot: Option<&Snapshot>,
    field: &str,
    interesting: &str,
) -> Detection {
    let mut det = Detection::default();
    for it in items {
        let current = it.field(field);
        let previous = it
            .dedup_key()
            .and_then(|k| snapshot.and_then(|s| s.get(k)))
            .map(|row| row.state.clone());

        if current.as_deref() == Some(interesting) {
            let already = matches!(&previous, Some(Some(prev)) if prev == interesting);
            if !already {
                det.novel.push(it.clone());
            }
        }

        // Record first sightings and every change, so a sale ending is remembered.
        let changed = match &previous {
            None => true,
            Some(prev) => *prev != current,
        };
        if changed && it.dedup_key().is_some() {
            det.to_record.push(it.clone());
        }
    }
    det
}

fn newest_first(items: &mut [Item]) {
    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
