//! Speech synthesis backends.

use crate::config::SpeechConfig;
use crate::error::SynthesisFailure;
use crate::models::Speaker;
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Turns one utterance into encoded MP3 bytes.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, speaker: Speaker) -> Result<Vec<u8>, SynthesisFailure>;
}

/// Google Cloud Text-to-Speech REST client.
///
/// Built once per process and shared read-only by every article.
#[derive(Clone)]
pub struct GoogleTts {
    http_client: Client,
    api_key: Option<String>,
    config: SpeechConfig,
}

impl fmt::Debug for GoogleTts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleTts")
            .field("endpoint", &self.config.endpoint)
            .field("configured", &self.api_key.is_some())
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: TextInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Serialize)]
struct TextInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    speaking_rate: f32,
    sample_rate_hertz: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

impl GoogleTts {
    pub fn new(api_key: Option<String>, config: SpeechConfig) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http_client,
            api_key: api_key.filter(|k| !k.is_empty()),
            config,
        })
    }

    /// Voice name for `speaker`.
    pub fn voice(&self, speaker: Speaker) -> &str {
        match speaker {
            Speaker::HostA => &self.config.host_a_voice,
            Speaker::HostB => &self.config.host_b_voice,
            Speaker::Announcer => &self.config.announcer_voice,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    #[instrument(level = "debug", skip_all, fields(?speaker, chars = text.chars().count()))]
    async fn synthesize(&self, text: &str, speaker: Speaker) -> Result<Vec<u8>, SynthesisFailure> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SynthesisFailure::Backend("GOOGLE_TTS_API_KEY not set".into()))?;

        let t0 = Instant::now();
        let request = SynthesizeRequest {
            input: TextInput { text },
            voice: VoiceSelection {
                language_code: &self.config.language_code,
                name: self.voice(speaker),
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate: self.config.speaking_rate,
                sample_rate_hertz: self.config.sample_rate_hertz,
            },
        };
        let response = self
            .http_client
            .post(&self.config.endpoint)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SynthesisFailure::Backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(%status, error = %truncate_for_log(&error_text, 300), "TTS API error");
            return Err(SynthesisFailure::Backend(format!("HTTP {}", status.as_u16())));
        }

        let body: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| SynthesisFailure::Backend(format!("invalid response body: {e}")))?;
        let audio = decode_audio_content(&body.audio_content)?;
        debug!(
            bytes = audio.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Synthesized utterance"
        );
        Ok(audio)
    }
}

fn decode_audio_content(encoded: &str) -> Result<Vec<u8>, SynthesisFailure> {
    if encoded.is_empty() {
        return Err(SynthesisFailure::Decode("empty audioContent".into()));
    }
    STANDARD
        .decode(encoded)
        .map_err(|e| SynthesisFailure::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_mapping() {
        let tts = GoogleTts::new(None, SpeechConfig::default()).unwrap();
        assert_eq!(tts.voice(Speaker::HostA), "ko-KR-Standard-C");
        assert_eq!(tts.voice(Speaker::HostB), "ko-KR-Standard-A");
        assert_eq!(tts.voice(Speaker::Announcer), "ko-KR-Standard-D");
    }

    #[test]
    fn test_request_shape() {
        let request = SynthesizeRequest {
            input: TextInput { text: "안녕" },
            voice: VoiceSelection {
                language_code: "ko-KR",
                name: "ko-KR-Standard-C",
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate: 1.25,
                sample_rate_hertz: 44100,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["voice"]["languageCode"], "ko-KR");
        assert_eq!(json["audioConfig"]["audioEncoding"], "MP3");
        assert_eq!(json["audioConfig"]["speakingRate"], 1.25);
        assert_eq!(json["audioConfig"]["sampleRateHertz"], 44100);
    }

    #[test]
    fn test_decode_audio_content() {
        assert_eq!(decode_audio_content("SUQz").unwrap(), b"ID3");
        assert!(matches!(decode_audio_content(""), Err(SynthesisFailure::Decode(_))));
        assert!(matches!(decode_audio_content("!!"), Err(SynthesisFailure::Decode(_))));
    }

    #[tokio::test]
    async fn test_missing_key_fails_the_turn() {
        let tts = GoogleTts::new(None, SpeechConfig::default()).unwrap();
        assert!(matches!(
            tts.synthesize("안녕", Speaker::HostA).await,
            Err(SynthesisFailure::Backend(_))
        ));
    }
}
