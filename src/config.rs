// src/config.rs
//! Environment-driven settings. Each binary builds the structs it needs once at
//! startup (after `dotenvy::dotenv()`) and passes them down by reference.

use std::path::PathBuf;
use std::time::Duration;

use crate::change_detector::{FirstRunPolicy, NoveltyPolicy};
use crate::error::ConfigError;
use crate::ingest::providers::naver_book::PAGE_SIZE;

pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
pub const ENV_NAVER_CLIENT_ID: &str = "NAVER_CLIENT_ID";
pub const ENV_NAVER_CLIENT_SECRET: &str = "NAVER_CLIENT_SECRET";
pub const ENV_BOOK_KEYWORDS: &str = "NEW_BOOK_KEYWORDS";
pub const ENV_BOOK_CACHE_FILE: &str = "BOOK_CACHE_FILE";
pub const ENV_BOOK_NOVELTY: &str = "BOOK_NOVELTY";
pub const ENV_BOOK_FIRST_RUN: &str = "BOOK_FIRST_RUN";
pub const ENV_CACHE_RETENTION: &str = "CACHE_RETENTION";
pub const ENV_UNIQLO_PRODS: &str = "UNIQLO_PRODS";
pub const ENV_CACHE_DIR: &str = "CACHE_DIR";

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CACHE_RETENTION: usize = 50;

/// Destination for every alert.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}

impl TelegramConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            token: required(ENV_TELEGRAM_TOKEN)?,
            chat_id: required(ENV_TELEGRAM_CHAT_ID)?,
        })
    }
}

/// Transport settings shared by every vendor client.
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl HttpConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let secs = parsed_or(ENV_HTTP_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS)?;
        if secs == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_HTTP_TIMEOUT_SECS,
                value: secs.to_string(),
                reason: "must be at least 1 second".into(),
            });
        }
        Ok(Self {
            timeout: Duration::from_secs(secs),
        })
    }
}

/// Naver open-API credentials for the book search.
#[derive(Debug, Clone)]
pub struct NaverConfig {
    pub client_id: String,
    pub client_secret: String,
}

impl NaverConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: required(ENV_NAVER_CLIENT_ID)?,
            client_secret: required(ENV_NAVER_CLIENT_SECRET)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BookWatchConfig {
    pub keywords: Vec<String>,
    pub cache_file: PathBuf,
    pub novelty: NoveltyPolicy,
    pub first_run: FirstRunPolicy,
    pub retention: usize,
}

impl BookWatchConfig {
    /// `BOOK_FIRST_RUN` has no default: whether the very first run should
    /// announce everything or only seed the cache is the operator's call.
    pub fn from_env() -> Result<Self, ConfigError> {
        let keywords = list(ENV_BOOK_KEYWORDS)?;
        let cache_file = PathBuf::from(required(ENV_BOOK_CACHE_FILE)?);

        let raw_novelty = optional(ENV_BOOK_NOVELTY).map(|v| v.to_ascii_lowercase());
        let novelty = match raw_novelty.as_deref() {
            None | Some("date") => NoveltyPolicy::since_yesterday(),
            Some("cache") => NoveltyPolicy::CacheExclusion,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: ENV_BOOK_NOVELTY,
                    value: other.to_string(),
                    reason: "expected `date` or `cache`".into(),
                })
            }
        };

        let raw_first_run = required(ENV_BOOK_FIRST_RUN)?;
        let first_run = raw_first_run
            .parse::<FirstRunPolicy>()
            .map_err(|reason| ConfigError::Invalid {
                name: ENV_BOOK_FIRST_RUN,
                value: raw_first_run.clone(),
                reason,
            })?;

        // Without a date filter every fetched row must fit, or trimmed rows
        // come back as new on the next run.
        let retention = retention()?;
        let needed = keywords.len() * PAGE_SIZE;
        if novelty == NoveltyPolicy::CacheExclusion && retention < needed {
            return Err(ConfigError::Invalid {
                name: ENV_CACHE_RETENTION,
                value: retention.to_string(),
                reason: format!(
                    "`cache` novelty with {} keywords needs at least {needed} rows",
                    keywords.len()
                ),
            });
        }

        Ok(Self {
            keywords,
            cache_file,
            novelty,
            first_run,
            retention,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PriceWatchConfig {
    pub products: Vec<String>,
    pub cache_dir: PathBuf,
    pub retention: usize,
}

impl PriceWatchConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            products: list(ENV_UNIQLO_PRODS)?,
            cache_dir: PathBuf::from(required(ENV_CACHE_DIR)?),
            retention: retention()?,
        })
    }

    pub fn cache_file(&self) -> PathBuf {
        self.cache_dir.join("uniqlo_sale.csv")
    }
}

fn retention() -> Result<usize, ConfigError> {
    let cap = parsed_or(ENV_CACHE_RETENTION, DEFAULT_CACHE_RETENTION)?;
    if cap == 0 {
        return Err(ConfigError::Invalid {
            name: ENV_CACHE_RETENTION,
            value: "0".into(),
            reason: "retention must keep at least one row".into(),
        });
    }
    Ok(cap)
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parsed_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

/// Required comma-separated list; at least one non-empty entry.
fn list(name: &'static str) -> Result<Vec<String>, ConfigError> {
    let raw = required(name)?;
    let items = split_list(&raw);
    if items.is_empty() {
        return Err(ConfigError::Missing(name));
    }
    Ok(items)
}

/// Split on commas, trim, drop empties and repeats (first occurrence wins).
pub fn split_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let t = part.trim();
        if !t.is_empty() && !out.iter().any(|seen| seen == t) {
            out.push(t.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn clear_book_env() {
        for k in [
            ENV_BOOK_KEYWORDS,
            ENV_BOOK_CACHE_FILE,
            ENV_BOOK_NOVELTY,
            ENV_BOOK_FIRST_RUN,
            ENV_CACHE_RETENTION,
        ] {
            env::remove_var(k);
        }
    }

    #[test]
    fn split_list_trims_and_dedups() {
        let out = split_list(" rust , ,tokio,rust,  async ");
        assert_eq!(out, vec!["rust", "tokio", "async"]);
        assert!(split_list(" , ").is_empty());
    }

    #[serial_test::serial]
    #[test]
    fn book_config_requires_first_run_policy() {
        clear_book_env();
        env::set_var(ENV_BOOK_KEYWORDS, "rust,tokio");
        env::set_var(ENV_BOOK_CACHE_FILE, "/tmp/books.csv");

        let err = BookWatchConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_BOOK_FIRST_RUN)));

        env::set_var(ENV_BOOK_FIRST_RUN, "seed-newest");
        let cfg = BookWatchConfig::from_env().unwrap();
        assert_eq!(cfg.keywords, vec!["rust", "tokio"]);
        assert_eq!(cfg.first_run, FirstRunPolicy::SeedNewest);
        assert_eq!(cfg.novelty, NoveltyPolicy::since_yesterday());
        assert_eq!(cfg.retention, DEFAULT_CACHE_RETENTION);

        clear_book_env();
    }

    #[serial_test::serial]
    #[test]
    fn book_config_rejects_unknown_values() {
        clear_book_env();
        env::set_var(ENV_BOOK_KEYWORDS, "rust");
        env::set_var(ENV_BOOK_CACHE_FILE, "/tmp/books.csv");
        env::set_var(ENV_BOOK_FIRST_RUN, "notify-all");
        env::set_var(ENV_BOOK_NOVELTY, "weekly");

        let err = BookWatchConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name, .. } if name == ENV_BOOK_NOVELTY));

        env::set_var(ENV_BOOK_NOVELTY, "cache");
        env::set_var(ENV_CACHE_RETENTION, "0");
        let err = BookWatchConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name, .. } if name == ENV_CACHE_RETENTION));

        env::set_var(ENV_CACHE_RETENTION, "20");
        let cfg = BookWatchConfig::from_env().unwrap();
        assert_eq!(cfg.novelty, NoveltyPolicy::CacheExclusion);
        assert_eq!(cfg.retention, 20);

        clear_book_env();
    }

    #[serial_test::serial]
    #[test]
    fn cache_novelty_needs_room_for_every_keyword() {
        clear_book_env();
        env::set_var(ENV_BOOK_KEYWORDS, "rust,tokio,async");
        env::set_var(ENV_BOOK_CACHE_FILE, "/tmp/books.csv");
        env::set_var(ENV_BOOK_FIRST_RUN, "notify-all");
        env::set_var(ENV_BOOK_NOVELTY, " Cache ");

        let err = BookWatchConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name, .. } if name == ENV_CACHE_RETENTION));

        env::set_var(ENV_CACHE_RETENTION, "60");
        let cfg = BookWatchConfig::from_env().unwrap();
        assert_eq!(cfg.novelty, NoveltyPolicy::CacheExclusion);

        // The date policy does not need the whole history.
        env::set_var(ENV_BOOK_NOVELTY, "DATE");
        env::set_var(ENV_CACHE_RETENTION, "10");
        let cfg = BookWatchConfig::from_env().unwrap();
        assert_eq!(cfg.novelty, NoveltyPolicy::since_yesterday());

        clear_book_env();
    }

    #[serial_test::serial]
    #[test]
    fn http_timeout_defaults_and_parses() {
        env::remove_var(ENV_HTTP_TIMEOUT_SECS);
        assert_eq!(HttpConfig::from_env().unwrap().timeout, Duration::from_secs(10));

        env::set_var(ENV_HTTP_TIMEOUT_SECS, "3");
        assert_eq!(HttpConfig::from_env().unwrap().timeout, Duration::from_secs(3));

        env::set_var(ENV_HTTP_TIMEOUT_SECS, "soon");
        assert!(HttpConfig::from_env().is_err());
        env::remove_var(ENV_HTTP_TIMEOUT_SECS);
    }
}
