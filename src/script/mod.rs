//! Two-host dialogue script generation.
//!
//! [`ScriptGenerator`] wraps a [`TextGenerator`] backend with the prompt,
//! output cleanup, validation and a bounded retry loop. The loop
//! distinguishes two failure kinds:
//!
//! - backend errors (network, quota) wait `backend_cooldown_secs` plus
//!   0-250ms of jitter, giving rate limits time to recover;
//! - invalid scripts wait `validation_cooldown_ms` and simply regenerate.
//!
//! Once attempts run out, the best script seen (most speaker lines) is
//! returned with `validated = false`. Only when no attempt produced any text
//! at all is the outcome a [`GenerationError`].

pub mod prompt;
pub mod speaker;
pub mod validate;

use crate::config::GenerationConfig;
use crate::error::GenerationError;
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use validate::{ScriptIssue, clean_script_output, named_line_count, truncate_content_smart, validate_script};

/// A text-completion backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Google Gemini `generateContent` REST client.
#[derive(Clone)]
pub struct GeminiClient {
    http_client: Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("configured", &self.api_key.is_some())
            .finish()
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

impl GeminiClient {
    /// A client without a key is valid but every call fails with
    /// [`GenerationError::NotConfigured`].
    pub fn new(api_key: Option<String>, config: &GenerationConfig) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http_client,
            api_key: api_key.filter(|k| !k.is_empty()),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GenerationError::NotConfigured("GEMINI_API_KEY not set".into()))?;

        let t0 = Instant::now();
        let body = GenerateRequest {
            contents: [Content {
                parts: [RequestPart { text: prompt }],
            }],
        };
        let response = self
            .http_client
            .post(format!("{}/models/{}:generateContent", self.endpoint, self.model))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Gemini request failed");
                GenerationError::Backend(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(%status, error = %truncate_for_log(&error_text, 300), "Gemini API error");
            return Err(GenerationError::Backend(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate_for_log(&error_text, 300)
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Backend(format!("invalid response body: {e}")))?;
        let text = parsed.into_text().ok_or(GenerationError::EmptyResponse)?;
        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            chars = text.chars().count(),
            "Gemini completion"
        );
        Ok(text)
    }
}

/// A script ready for synthesis.
#[derive(Debug, Clone)]
pub struct GeneratedScript {
    pub text: String,
    /// Whether `text` passed validation.
    pub validated: bool,
    /// Attempts spent, including the successful one.
    pub attempts: u32,
    /// Last validation problem when `validated` is false.
    pub issue: Option<ScriptIssue>,
}

/// Prompt, validate and retry around a [`TextGenerator`].
pub struct ScriptGenerator {
    backend: Box<dyn TextGenerator>,
    config: GenerationConfig,
}

impl fmt::Debug for ScriptGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptGenerator")
            .field("max_retries", &self.config.max_retries)
            .field("backend_cooldown_secs", &self.config.backend_cooldown_secs)
            .field("validation_cooldown_ms", &self.config.validation_cooldown_ms)
            .finish()
    }
}

/// `base` plus 0-250ms of jitter; a zero base stays zero.
fn with_jitter(base: Duration) -> Duration {
    if base.is_zero() {
        return base;
    }
    let jitter_ms: u64 = rand::rng().random_range(0..=250);
    base + Duration::from_millis(jitter_ms)
}

impl ScriptGenerator {
    pub fn new(backend: Box<dyn TextGenerator>, config: GenerationConfig) -> Self {
        Self { backend, config }
    }

    /// Generate a dialogue script for one article.
    #[instrument(level = "info", skip_all, fields(%title))]
    pub async fn generate(
        &self,
        title: &str,
        content: &str,
        requirements: Option<&str>,
    ) -> Result<GeneratedScript, GenerationError> {
        let budgeted = truncate_content_smart(content, self.config.content_budget_chars);
        if budgeted.len() < content.len() {
            info!(
                from = content.chars().count(),
                to = budgeted.chars().count(),
                "Article truncated to content budget"
            );
        }
        let prompt = prompt::build_prompt(title, &budgeted, requirements);

        let total_t0 = Instant::now();
        let max_attempts = self.config.max_retries + 1;
        let mut best: Option<GeneratedScript> = None;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let attempt_t0 = Instant::now();
            let delay = match self.backend.generate_text(&prompt).await {
                Ok(raw) => {
                    let script = clean_script_output(&raw);
                    if script.len() < raw.len() {
                        debug!(from = raw.len(), to = script.len(), "Cleaned model output");
                    }
                    match validate_script(&script) {
                        Ok(()) => {
                            info!(
                                attempt,
                                elapsed_ms = total_t0.elapsed().as_millis() as u64,
                                "Script validated"
                            );
                            return Ok(GeneratedScript {
                                text: script,
                                validated: true,
                                attempts: attempt,
                                issue: None,
                            });
                        }
                        Err(issue) => {
                            warn!(
                                attempt,
                                max = max_attempts,
                                elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                                %issue,
                                "Script failed validation"
                            );
                            last_error = issue.to_string();
                            let lines = named_line_count(&script);
                            let better = best
                                .as_ref()
                                .is_none_or(|b| lines > named_line_count(&b.text));
                            if better {
                                best = Some(GeneratedScript {
                                    text: script,
                                    validated: false,
                                    attempts: attempt,
                                    issue: Some(issue),
                                });
                            }
                            Duration::from_millis(self.config.validation_cooldown_ms)
                        }
                    }
                }
                Err(e @ GenerationError::NotConfigured(_)) => {
                    error!(error = %e, "Script generation disabled");
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max = max_attempts,
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                        error = %e,
                        "Backend call failed"
                    );
                    last_error = e.to_string();
                    with_jitter(Duration::from_secs(self.config.backend_cooldown_secs))
                }
            };

            if attempt < max_attempts {
                debug!(?delay, "Cooling down before retry");
                sleep(delay).await;
            }
        }

        match best {
            Some(mut script) => {
                warn!(
                    attempts = max_attempts,
                    issue = ?script.issue,
                    "Retries exhausted; using best unvalidated script"
                );
                script.attempts = max_attempts;
                Ok(script)
            }
            None => {
                error!(
                    attempts = max_attempts,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    error = %last_error,
                    "No script produced"
                );
                Err(GenerationError::Exhausted {
                    attempts: max_attempts,
                    last: last_error,
                })
            }
        }
    }
}
