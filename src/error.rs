//! Typed errors for every pipeline stage.
//!
//! Each stage has its own error enum so the dispatcher can map failures to
//! the right statistics counter. [`PipelineError`] aggregates them at the
//! per-article boundary; nothing below the dispatcher decides whether an
//! error is fatal for the batch.

use crate::audio::mp3::StreamFormat;
use thiserror::Error;

/// Failure to retrieve a page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request did not complete within the configured timeout.
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// Server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Connection, TLS or body decoding failure.
    #[error("request failed for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Classify a `reqwest` error for `url`.
    pub fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = e.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                source: e,
            }
        }
    }
}

/// Every extraction tier was exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("extraction failed: {reason}")]
pub struct ExtractionFailure {
    pub reason: String,
}

/// The generative-text backend could not produce any script.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No API key configured; the generator is disabled.
    #[error("generative-text backend is not configured: {0}")]
    NotConfigured(String),

    /// Backend call failed (network, quota, server error).
    #[error("backend error: {0}")]
    Backend(String),

    /// Backend answered but the payload carried no text.
    #[error("backend returned an empty response")]
    EmptyResponse,

    /// All attempts failed before any text was produced.
    #[error("no script after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Speech synthesis produced nothing usable.
#[derive(Debug, Error)]
pub enum SynthesisFailure {
    /// Single-turn backend failure; the turn is dropped.
    #[error("speech backend error: {0}")]
    Backend(String),

    #[error("speech backend returned undecodable audio: {0}")]
    Decode(String),

    /// Not a single dialogue turn synthesized.
    #[error("no dialogue turn synthesized ({attempted} attempted)")]
    NoTurns { attempted: usize },
}

/// Assembled artifact was rejected or could not be written.
#[derive(Debug, Error)]
pub enum AssemblyFailure {
    #[error("artifact {path} is {size} bytes, below the {min} byte floor")]
    TooSmall { path: String, size: u64, min: u64 },

    #[error("no decodable audio frames to stitch")]
    NothingToStitch,

    /// A mandatory part cannot be spliced into the episode stream.
    #[error("{part} is {found} but the episode is {expected}")]
    FormatMismatch {
        part: &'static str,
        found: StreamFormat,
        expected: StreamFormat,
    },

    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Upload or persistence of a finished episode failed.
#[derive(Debug, Error)]
pub enum PublishFailure {
    #[error("artifact storage is not configured")]
    StorageDisabled,

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("episode record not saved: {0}")]
    Persist(#[from] StoreError),
}

/// Keyword/episode store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Startup-time configuration problem; the only error class allowed to
/// terminate the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("cannot build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// The opening jingle cannot be spliced into synthesized speech.
    #[error("opening jingle {path} is {jingle}, speech is {speech}")]
    JingleFormat {
        path: String,
        jingle: StreamFormat,
        speech: StreamFormat,
    },
}

/// Any per-article failure, caught at the dispatcher boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisFailure),

    #[error(transparent)]
    Assembly(#[from] AssemblyFailure),

    #[error(transparent)]
    Publish(#[from] PublishFailure),
}
