//! Data models shared by the pipeline stages.
//!
//! - [`CandidateArticle`]: one search-result entry, before extraction
//! - [`ExtractionResult`] / [`Strategy`]: outcome of the extractor cascade
//! - [`DialogueTurn`] / [`Script`]: the parsed two-host dialogue
//! - [`AudioSegment`]: one synthesized utterance
//! - [`Episode`]: a validated artifact ready for publication
//! - [`Keyword`] / [`RunStats`]: dispatcher input and output

use crate::error::ExtractionFailure;
use std::fmt;
use std::ops::AddAssign;
use std::path::PathBuf;

/// A news article as listed on the search result page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateArticle {
    /// Headline text.
    pub title: String,
    /// Link displayed on the result entry. This is the dedup key.
    pub link: String,
    /// Portal-hosted copy of the same article, when the result entry has one.
    pub canonical_link: Option<String>,
    /// Publisher name.
    pub press: String,
}

impl CandidateArticle {
    /// URL to fetch for extraction: the portal copy when present, since its
    /// markup is the most predictable.
    pub fn fetch_url(&self) -> &str {
        self.canonical_link.as_deref().unwrap_or(&self.link)
    }
}

/// How the extracted text was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Publisher-specific container selector.
    SiteSelector {
        domain: &'static str,
        selector: &'static str,
    },
    /// Generic "article body" container selector.
    GenericSelector(&'static str),
    /// Sentence-like paragraphs concatenated in document order.
    Paragraphs { count: usize },
    /// Highest-scoring block element.
    LargestBlock,
}

impl Strategy {
    /// Stable tier name used in logs and tests.
    pub fn tier(&self) -> &'static str {
        match self {
            Strategy::SiteSelector { .. } => "site-selector",
            Strategy::GenericSelector(_) => "generic-selector",
            Strategy::Paragraphs { .. } => "paragraph-heuristic",
            Strategy::LargestBlock => "largest-block",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::SiteSelector { domain, selector } => {
                write!(f, "{}({} {})", self.tier(), domain, selector)
            }
            Strategy::GenericSelector(selector) => write!(f, "{}({})", self.tier(), selector),
            Strategy::Paragraphs { count } => write!(f, "{}({} paragraphs)", self.tier(), count),
            Strategy::LargestBlock => f.write_str(self.tier()),
        }
    }
}

/// Outcome of running the extractor cascade on one page.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    /// Body text that passed the quality validator.
    Ok { text: String, strategy: Strategy },
    /// Metadata description only, prefixed with [`crate::extract::LOW_CONFIDENCE_PREFIX`].
    LowConfidence { text: String },
    /// Every tier failed.
    Failed(ExtractionFailure),
}

/// Dialogue participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Speaker {
    HostA,
    HostB,
    Announcer,
}

/// One attributed utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueTurn {
    pub speaker: Speaker,
    pub text: String,
    /// Assigned at parse time, strictly increasing.
    pub ordinal: usize,
}

/// Parsed dialogue, in speaking order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    pub turns: Vec<DialogueTurn>,
}

/// A synthesized utterance. The byte buffer is moved into the assembler.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub ordinal: usize,
    pub speaker: Speaker,
    pub source_text: String,
    pub audio_bytes: Vec<u8>,
    pub duration_ms: u64,
}

/// A validated artifact handed to the publisher.
#[derive(Debug, Clone)]
pub struct Episode {
    pub title: String,
    pub press: String,
    pub link: String,
    pub keyword_id: Option<i32>,
    pub artifact_path: PathBuf,
    pub size_bytes: u64,
    pub duration_ms: u64,
}

/// A configured search keyword.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Keyword {
    pub id: i32,
    pub keyword: String,
    pub topic: Option<String>,
    pub requirements: Option<String>,
    pub priority: i32,
}

/// Per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: u32,
    pub success: u32,
    pub duplicate: u32,
    pub failed: u32,
}

impl AddAssign for RunStats {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.success += other.success;
        self.duplicate += other.duplicate;
        self.failed += other.failed;
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total: {}, success: {}, duplicate: {}, failed: {}",
            self.total, self.success, self.duplicate, self.failed
        )
    }
}
