//! The dispatcher: keywords in, published episodes out.
//!
//! Per article, strictly in this order:
//!
//! 1. dedup gate on the displayed link (no network work for a duplicate)
//! 2. randomized courtesy delay, then fetch
//! 3. extraction cascade
//! 4. script generation with validation/retry
//! 5. per-turn speech synthesis
//! 6. assembly, size floor, size re-check on the local file
//! 7. upload and episode record
//!
//! Every failure is folded into an [`ArticleOutcome`] at the article
//! boundary; nothing escapes into the batch loop. Cancellation is observed
//! between articles only.

use crate::alert::Alerter;
use crate::audio::assemble::{EpisodeAssembler, verify_artifact_size};
use crate::audio::parse::parse_dialogue;
use crate::audio::synth::Synthesizer;
use crate::config::{DelayRange, PipelineConfig};
use crate::error::{ExtractionFailure, PipelineError, StoreError};
use crate::extract::extract;
use crate::fetch::PageFetcher;
use crate::models::{CandidateArticle, Episode, ExtractionResult, Keyword, RunStats};
use crate::publish::Publisher;
use crate::script::ScriptGenerator;
use crate::search::search;
use crate::store::EpisodeStore;
use crate::utils::{safe_file_stem, truncate_for_log};
use rand::Rng;
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Why an article was skipped before any paid work was done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Duplicate,
    /// No usable text; counted as a failure.
    ExtractionFailed(ExtractionFailure),
}

/// Terminal state of one article.
#[derive(Debug)]
pub enum ArticleOutcome {
    Published { stored_path: String },
    Skipped(SkipReason),
    Failed(PipelineError),
}

impl ArticleOutcome {
    fn record(&self, stats: &mut RunStats) {
        stats.total += 1;
        match self {
            ArticleOutcome::Published { .. } => stats.success += 1,
            ArticleOutcome::Skipped(SkipReason::Duplicate) => stats.duplicate += 1,
            ArticleOutcome::Skipped(SkipReason::ExtractionFailed(_)) | ArticleOutcome::Failed(_) => {
                stats.failed += 1
            }
        }
    }
}

/// Everything one dispatcher pass needs. Built once at startup.
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub fetcher: Arc<dyn PageFetcher>,
    pub store: Arc<dyn EpisodeStore>,
    pub generator: ScriptGenerator,
    pub synthesizer: Synthesizer,
    pub assembler: EpisodeAssembler,
    pub publisher: Publisher,
    pub alerter: Arc<dyn Alerter>,
}

fn pick_delay(range: DelayRange) -> Duration {
    let (lo, hi) = if range.min <= range.max {
        (range.min, range.max)
    } else {
        (range.max, range.min)
    };
    if hi == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(lo..=hi))
}

impl PipelineContext {
    /// One full pass over the active keywords.
    ///
    /// Fails only when the keyword table cannot be read; per-article
    /// failures are counted in the returned stats.
    #[instrument(level = "info", skip_all)]
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<RunStats, StoreError> {
        let t0 = Instant::now();
        let mut keywords = self.store.active_keywords().await?;
        // stable: ties keep store order
        keywords.sort_by_key(|k| Reverse(k.priority));

        let mut stats = RunStats::default();
        if keywords.is_empty() {
            info!(query = %self.config.default_query, "No active keywords; using default query");
            stats += self.run_keyword(&self.config.default_query, None, cancel).await;
        } else {
            info!(count = keywords.len(), "Active keywords loaded");
            for keyword in &keywords {
                if cancel.is_cancelled() {
                    break;
                }
                stats += self.run_keyword(&keyword.keyword, Some(keyword), cancel).await;
            }
        }

        info!(
            total = stats.total,
            success = stats.success,
            duplicate = stats.duplicate,
            failed = stats.failed,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            cancelled = cancel.is_cancelled(),
            "Run complete"
        );
        if stats.failed > 0 && stats.success == 0 {
            self.alerter
                .alert("배치 실패", &format!("성공한 에피소드 없음 ({stats})"))
                .await;
        }
        Ok(stats)
    }

    /// Search `query` and process up to the configured number of results.
    #[instrument(level = "info", skip(self, keyword, cancel), fields(keyword_id = keyword.map(|k| k.id)))]
    pub async fn run_keyword(
        &self,
        query: &str,
        keyword: Option<&Keyword>,
        cancel: &CancellationToken,
    ) -> RunStats {
        let mut stats = RunStats::default();
        let candidates = match search(
            self.fetcher.as_ref(),
            &self.config.search_url,
            query,
            self.config.max_articles_per_keyword,
        )
        .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(error = %e, "Search failed; skipping keyword");
                return stats;
            }
        };

        for (index, candidate) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Cancellation requested; stopping before next article");
                break;
            }
            let outcome = self.process_article(candidate, keyword, index).await;
            match &outcome {
                ArticleOutcome::Published { stored_path } => {
                    info!(title = %candidate.title, %stored_path, "Article published")
                }
                ArticleOutcome::Skipped(SkipReason::Duplicate) => {
                    info!(title = %candidate.title, "Article already published; skipped")
                }
                ArticleOutcome::Skipped(SkipReason::ExtractionFailed(failure)) => {
                    warn!(title = %candidate.title, link = %candidate.link, %failure, "Article skipped")
                }
                ArticleOutcome::Failed(e) => {
                    warn!(title = %candidate.title, link = %candidate.link, error = %e, "Article failed")
                }
            }
            outcome.record(&mut stats);
        }
        stats
    }

    /// Run one article to a terminal state.
    #[instrument(level = "info", skip_all, fields(title = %candidate.title, press = %candidate.press))]
    pub async fn process_article(
        &self,
        candidate: &CandidateArticle,
        keyword: Option<&Keyword>,
        index: usize,
    ) -> ArticleOutcome {
        if self.is_duplicate(&candidate.link).await {
            return ArticleOutcome::Skipped(SkipReason::Duplicate);
        }
        self.produce(candidate, keyword, index)
            .await
            .unwrap_or_else(ArticleOutcome::Failed)
    }

    /// Dedup lookup. A store error is logged and treated as "not seen".
    async fn is_duplicate(&self, link: &str) -> bool {
        match self.store.is_duplicate(link).await {
            Ok(seen) => seen,
            Err(e) => {
                warn!(%link, error = %e, "Dedup lookup failed; processing anyway");
                false
            }
        }
    }

    async fn produce(
        &self,
        candidate: &CandidateArticle,
        keyword: Option<&Keyword>,
        index: usize,
    ) -> Result<ArticleOutcome, PipelineError> {
        let delay = pick_delay(self.config.extraction_delay_ms);
        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis() as u64, "Courtesy delay before fetch");
            tokio::time::sleep(delay).await;
        }

        let page = self.fetcher.fetch(candidate.fetch_url()).await?;
        let content = match extract(&page.final_url, &page.body) {
            ExtractionResult::Ok { text, strategy } => {
                info!(%strategy, chars = text.chars().count(), "Article text extracted");
                text
            }
            ExtractionResult::LowConfidence { text } if !self.config.skip_low_confidence => {
                warn!(preview = %truncate_for_log(&text, 80), "Using low-confidence summary");
                text
            }
            ExtractionResult::LowConfidence { .. } => {
                info!("Low-confidence extraction skipped by configuration");
                return Ok(ArticleOutcome::Skipped(SkipReason::ExtractionFailed(
                    ExtractionFailure {
                        reason: "only a low-confidence summary was found".to_string(),
                    },
                )));
            }
            ExtractionResult::Failed(failure) => {
                warn!(reason = %failure.reason, url = %page.final_url, "Extraction failed");
                return Ok(ArticleOutcome::Skipped(SkipReason::ExtractionFailed(failure)));
            }
        };

        let requirements = keyword.and_then(|k| k.requirements.as_deref());
        let script = self
            .generator
            .generate(&candidate.title, &content, requirements)
            .await?;
        if !script.validated {
            warn!(
                attempts = script.attempts,
                issue = ?script.issue.as_ref().map(ToString::to_string),
                "Proceeding with best unvalidated script"
            );
        }

        let dialogue = parse_dialogue(&script.text);
        let audio = self
            .synthesizer
            .synthesize(&dialogue, Some(&candidate.title))
            .await?;

        let file_name = format!("podcast_{}_{}.mp3", safe_file_stem(&candidate.title), index);
        let artifact = self.assembler.assemble(audio.turns, audio.title, &file_name).await?;
        // re-check on disk right before handing off
        let size_bytes =
            verify_artifact_size(artifact.file.path(), self.assembler.min_artifact_bytes()).await?;

        let episode = Episode {
            title: candidate.title.clone(),
            press: candidate.press.clone(),
            link: candidate.link.clone(),
            keyword_id: keyword.map(|k| k.id),
            artifact_path: artifact.file.path().to_path_buf(),
            size_bytes,
            duration_ms: artifact.duration_ms,
        };
        let stored_path = self
            .publisher
            .publish(&episode, artifact.file, Some(index))
            .await?;
        Ok(ArticleOutcome::Published { stored_path })
    }
}
