//! Per-turn synthesis with failure isolation.

use super::mp3::Mp3Clip;
use super::tts::SpeechSynthesizer;
use crate::error::SynthesisFailure;
use crate::models::{AudioSegment, Script, Speaker};
use crate::utils::truncate_for_log;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Synthesized audio for one episode, before assembly.
#[derive(Debug)]
pub struct SynthesizedEpisode {
    pub title: Option<AudioSegment>,
    /// Dialogue segments in ordinal order; failed turns leave gaps.
    pub turns: Vec<AudioSegment>,
}

/// Announcement read before the dialogue.
pub fn title_announcement(title: &str) -> String {
    let clean = title.replace(['[', ']'], "");
    format!("오늘의 뉴스. {}.", clean.trim())
}

/// Drives a [`SpeechSynthesizer`] over a parsed script.
#[derive(Clone)]
pub struct Synthesizer {
    tts: Arc<dyn SpeechSynthesizer>,
}

impl Synthesizer {
    pub fn new(tts: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { tts }
    }

    async fn segment(
        &self,
        ordinal: usize,
        speaker: Speaker,
        text: &str,
    ) -> Result<AudioSegment, SynthesisFailure> {
        let bytes = self.tts.synthesize(text, speaker).await?;
        let clip = Mp3Clip::decode(bytes).map_err(|e| SynthesisFailure::Decode(e.to_string()))?;
        let duration_ms = clip.duration_ms();
        let mut audio_bytes = Vec::new();
        clip.write_frames(&mut audio_bytes);
        Ok(AudioSegment {
            ordinal,
            speaker,
            source_text: text.to_string(),
            audio_bytes,
            duration_ms,
        })
    }

    /// Synthesize every turn of `script`, plus the title announcement when
    /// `title` is given.
    ///
    /// Failed turns are logged and dropped. Fails only when not a single
    /// dialogue turn succeeded; a failed title is just omitted.
    #[instrument(level = "info", skip_all, fields(turns = script.turns.len()))]
    pub async fn synthesize(
        &self,
        script: &Script,
        title: Option<&str>,
    ) -> Result<SynthesizedEpisode, SynthesisFailure> {
        let title = match title {
            Some(title) => match self.segment(0, Speaker::Announcer, &title_announcement(title)).await {
                Ok(segment) => Some(segment),
                Err(e) => {
                    warn!(error = %e, "Title announcement failed; continuing without it");
                    None
                }
            },
            None => None,
        };

        let mut turns = Vec::with_capacity(script.turns.len());
        for turn in &script.turns {
            match self.segment(turn.ordinal, turn.speaker, &turn.text).await {
                Ok(segment) => turns.push(segment),
                Err(e) => warn!(
                    ordinal = turn.ordinal,
                    text = %truncate_for_log(&turn.text, 40),
                    error = %e,
                    "Turn synthesis failed; dropping turn"
                ),
            }
        }

        if turns.is_empty() {
            return Err(SynthesisFailure::NoTurns {
                attempted: script.turns.len(),
            });
        }
        info!(
            synthesized = turns.len(),
            dropped = script.turns.len() - turns.len(),
            duration_ms = turns.iter().map(|t| t.duration_ms).sum::<u64>(),
            "Synthesis complete"
        );
        Ok(SynthesizedEpisode { title, turns })
    }
}
