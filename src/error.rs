//! Error taxonomy shared by the watchers.
//!
//! Every run ends in one of three ways when something goes wrong: the process
//! refuses to start (`ConfigError`), the run reports the failure and retries on
//! the next scheduled invocation (`FetchError`), or the failure is logged and
//! swallowed inside the notifier (`NotifyError`).

use std::path::PathBuf;
use std::sync::Arc;

/// A required setting is absent or unusable. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("usage: {0}")]
    Usage(String),
}

/// A vendor API could not be read.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            let url = err.url().map(|u| u.to_string()).unwrap_or_default();
            return FetchError::Timeout(url);
        }
        if let Some(status) = err.status() {
            let url = err.url().map(|u| u.to_string()).unwrap_or_default();
            return FetchError::Status {
                status: status.as_u16(),
                url,
            };
        }
        if err.is_decode() {
            return FetchError::Malformed(err.to_string());
        }
        FetchError::Network(Arc::new(err))
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Malformed(err.to_string())
    }
}

/// The outbound message could not be delivered.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("send timed out")]
    Timeout,

    #[error("could not reach the messaging API: {0}")]
    Connect(String),

    #[error("messaging API returned HTTP {status}: {description}")]
    Api { status: u16, description: String },

    #[error("messaging request failed: {0}")]
    Other(String),
}

impl NotifyError {
    /// Timeout-class failures are worth one immediate retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, NotifyError::Timeout | NotifyError::Connect(_))
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NotifyError::Timeout
        } else if err.is_connect() {
            NotifyError::Connect(err.to_string())
        } else {
            NotifyError::Other(err.to_string())
        }
    }
}

/// The snapshot file could not be read or written.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("reading snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("writing snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encoding snapshot {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// What the caller should do with a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Abort the process with a non-zero exit code.
    Fatal,
    /// Report the failure and stop this run.
    NotifyAndStop,
    /// Report the failure; nothing was persisted so the next run retries cleanly.
    NotifyRetryNextRun,
}

/// Error surfaced at the boundary of a single fetch → detect → notify → persist run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl RunError {
    pub fn disposition(&self) -> Disposition {
        match self {
            RunError::Config(_) => Disposition::Fatal,
            RunError::Fetch(_) => Disposition::NotifyRetryNextRun,
            RunError::Cache(_) => Disposition::NotifyAndStop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeout_class_errors_are_transient() {
        assert!(NotifyError::Timeout.is_transient());
        assert!(NotifyError::Connect("refused".into()).is_transient());
        assert!(!NotifyError::Api {
            status: 400,
            description: "Bad Request: can't parse entities".into()
        }
        .is_transient());
        assert!(!NotifyError::Other("boom".into()).is_transient());
    }

    #[test]
    fn run_errors_map_to_dispositions() {
        let fatal = RunError::from(ConfigError::Missing("TELEGRAM_TOKEN"));
        assert_eq!(fatal.disposition(), Disposition::Fatal);

        let fetch = RunError::from(FetchError::Malformed("no items".into()));
        assert_eq!(fetch.disposition(), Disposition::NotifyRetryNextRun);
    }

    #[test]
    fn error_display_names_the_setting() {
        let err = ConfigError::Missing("BOOK_CACHE_FILE");
        assert!(err.to_string().contains("BOOK_CACHE_FILE"));
    }
}
