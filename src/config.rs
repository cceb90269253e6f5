//! Pipeline tunables loaded from an optional YAML file.
//!
//! Secrets and connection settings come from the CLI/environment (see
//! [`crate::cli`]); everything here has a default so the file may be absent
//! or partial.
//!
//! ```yaml
//! max_articles_per_keyword: 5
//! generation:
//!   model: gemini-2.5-pro
//!   max_retries: 3
//! assembly:
//!   jingle_path: /srv/podcast/opening.mp3
//! ```

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// News search endpoint; the query is appended URL-encoded.
    pub search_url: String,
    /// Query used when the keyword table has no active rows.
    pub default_query: String,
    pub max_articles_per_keyword: usize,
    pub fetch_timeout_secs: u64,
    /// Randomized courtesy delay before each article fetch.
    pub extraction_delay_ms: DelayRange,
    /// Treat metadata-only extractions as failures.
    pub skip_low_confidence: bool,
    pub generation: GenerationConfig,
    pub speech: SpeechConfig,
    pub assembly: AssemblyConfig,
    pub alert_cooldown_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            search_url: "https://search.naver.com/search.naver?ssc=tab.news.all&sm=tab_opt&sort=1&nso=so%3Add&query=".to_string(),
            default_query: "인공지능".to_string(),
            max_articles_per_keyword: 3,
            fetch_timeout_secs: 15,
            extraction_delay_ms: DelayRange { min: 1000, max: 3000 },
            skip_low_confidence: false,
            generation: GenerationConfig::default(),
            speech: SpeechConfig::default(),
            assembly: AssemblyConfig::default(),
            alert_cooldown_secs: 600,
        }
    }
}

impl PipelineConfig {
    /// Load from `path`, or return defaults when no path is given.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        info!(config_path = path, "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Inclusive millisecond range.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct DelayRange {
    pub min: u64,
    pub max: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub endpoint: String,
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Wait after a backend error (rate-limit recovery).
    pub backend_cooldown_secs: u64,
    /// Wait after an invalid script (plain regeneration).
    pub validation_cooldown_ms: u64,
    /// Article text budget in characters.
    pub content_budget_chars: usize,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            max_retries: 2,
            backend_cooldown_secs: 30,
            validation_cooldown_ms: 1000,
            content_budget_chars: 15000,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub endpoint: String,
    pub language_code: String,
    pub host_a_voice: String,
    pub host_b_voice: String,
    pub announcer_voice: String,
    pub speaking_rate: f32,
    /// Output rate; matches the opening jingle so frames can be spliced.
    pub sample_rate_hertz: u32,
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://texttospeech.googleapis.com/v1/text:synthesize".to_string(),
            language_code: "ko-KR".to_string(),
            host_a_voice: "ko-KR-Standard-C".to_string(),
            host_b_voice: "ko-KR-Standard-A".to_string(),
            announcer_voice: "ko-KR-Standard-D".to_string(),
            speaking_rate: 1.1,
            sample_rate_hertz: 44100,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Local directory for finished artifacts awaiting upload.
    pub output_dir: PathBuf,
    /// Opening jingle; skipped when missing or undecodable. Its sample rate
    /// must equal `speech.sample_rate_hertz` and it must be mono.
    pub jingle_path: Option<PathBuf>,
    /// Silence after the title announcement.
    pub title_gap_ms: u64,
    /// Artifacts smaller than this are discarded.
    pub min_artifact_bytes: u64,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("MP3"),
            jingle_path: Some(PathBuf::from("opening.mp3")),
            title_gap_ms: 500,
            min_artifact_bytes: 1_048_576,
        }
    }
}
