//! Episode assembly and the artifact size floor.
//!
//! Output layout: title announcement, a short silence gap, the opening
//! jingle, then every dialogue segment by ordinal. The first decodable
//! dialogue segment fixes the episode's stream format. Corrupt or
//! differently formatted segments and titles are skipped with a warning.
//! The jingle is checked against the speech format once at startup, so a
//! jingle that still does not match at assembly time fails the episode.

use super::mp3::{Mp3Clip, StreamFormat};
use crate::config::AssemblyConfig;
use crate::error::{AssemblyFailure, ConfigError};
use crate::models::AudioSegment;
use crate::utils::truncate_for_log;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

/// A local artifact file, removed when dropped unless retained.
#[derive(Debug)]
pub struct LocalArtifact {
    path: PathBuf,
    retained: bool,
}

impl LocalArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            retained: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file on disk past this guard's lifetime.
    pub fn retain(mut self) -> PathBuf {
        self.retained = true;
        self.path.clone()
    }
}

impl Drop for LocalArtifact {
    fn drop(&mut self) {
        if self.retained {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed local artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove local artifact"),
        }
    }
}

/// An assembled episode that passed the size floor.
#[derive(Debug)]
pub struct AssembledArtifact {
    pub file: LocalArtifact,
    pub duration_ms: u64,
}

/// Check the artifact at `path` against `min_bytes`, deleting it when it
/// falls short. A file of exactly `min_bytes` passes.
pub async fn verify_artifact_size(path: &Path, min_bytes: u64) -> Result<u64, AssemblyFailure> {
    let size = fs::metadata(path).await?.len();
    if size < min_bytes {
        warn!(path = %path.display(), size, min_bytes, "Artifact below size floor; deleting");
        if let Err(e) = fs::remove_file(path).await {
            error!(path = %path.display(), error = %e, "Failed to delete undersized artifact");
        }
        return Err(AssemblyFailure::TooSmall {
            path: path.display().to_string(),
            size,
            min: min_bytes,
        });
    }
    Ok(size)
}

/// Load the opening jingle for speech produced in `speech` format.
///
/// A missing or undecodable file only disables the jingle. A jingle whose
/// sample rate or channel count differs from speech cannot be spliced and
/// is reported as a configuration error.
pub async fn load_jingle(
    config: &AssemblyConfig,
    speech: StreamFormat,
) -> Result<Option<Mp3Clip>, ConfigError> {
    let Some(path) = config.jingle_path.as_ref() else {
        return Ok(None);
    };
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            info!(path = %path.display(), error = %e, "Opening jingle unavailable; episodes go without it");
            return Ok(None);
        }
    };
    let clip = match Mp3Clip::decode(bytes) {
        Ok(clip) => clip,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Opening jingle undecodable; episodes go without it");
            return Ok(None);
        }
    };
    if clip.format() != speech {
        return Err(ConfigError::JingleFormat {
            path: path.display().to_string(),
            jingle: clip.format(),
            speech,
        });
    }
    info!(
        path = %path.display(),
        format = %clip.format(),
        duration_ms = clip.duration_ms(),
        "Opening jingle loaded"
    );
    Ok(Some(clip))
}

/// Stitches synthesized segments into one MP3 artifact.
#[derive(Debug, Clone)]
pub struct EpisodeAssembler {
    config: AssemblyConfig,
    jingle: Option<Mp3Clip>,
}

impl EpisodeAssembler {
    /// `jingle` comes from [`load_jingle`].
    pub fn new(config: AssemblyConfig, jingle: Option<Mp3Clip>) -> Self {
        Self { config, jingle }
    }

    pub fn min_artifact_bytes(&self) -> u64 {
        self.config.min_artifact_bytes
    }

    /// Stitch `segments` (plus optional `title`) into `file_name` under the
    /// output directory. Segment buffers are consumed.
    #[instrument(level = "info", skip_all, fields(%file_name, segments = segments.len()))]
    pub async fn assemble(
        &self,
        mut segments: Vec<AudioSegment>,
        title: Option<AudioSegment>,
        file_name: &str,
    ) -> Result<AssembledArtifact, AssemblyFailure> {
        segments.sort_by_key(|s| s.ordinal);

        let mut dialogue: Vec<Mp3Clip> = Vec::with_capacity(segments.len());
        for segment in segments {
            let clip = match Mp3Clip::decode(segment.audio_bytes) {
                Ok(clip) => clip,
                Err(e) => {
                    warn!(
                        ordinal = segment.ordinal,
                        speaker = ?segment.speaker,
                        text = %truncate_for_log(&segment.source_text, 40),
                        error = %e,
                        "Corrupt segment; skipping"
                    );
                    continue;
                }
            };
            if let Some(first) = dialogue.first().filter(|first| first.format() != clip.format()) {
                warn!(
                    ordinal = segment.ordinal,
                    speaker = ?segment.speaker,
                    found = %clip.format(),
                    expected = %first.format(),
                    "Segment format differs from the episode; skipping"
                );
                continue;
            }
            dialogue.push(clip);
        }
        let Some(first) = dialogue.first() else {
            return Err(AssemblyFailure::NothingToStitch);
        };
        let format = first.format();

        let mut out = Vec::new();
        let mut samples = 0u64;

        if let Some(title) = title {
            match Mp3Clip::decode(title.audio_bytes) {
                Ok(clip) if clip.format() == format => {
                    clip.write_frames(&mut out);
                    samples += clip.samples();
                    let (gap, gap_samples) = first.silence(self.config.title_gap_ms);
                    out.extend(gap);
                    samples += gap_samples;
                }
                Ok(clip) => warn!(
                    found = %clip.format(),
                    expected = %format,
                    "Title announcement format differs; skipping"
                ),
                Err(e) => warn!(
                    text = %truncate_for_log(&title.source_text, 40),
                    error = %e,
                    "Title announcement corrupt; skipping"
                ),
            }
        }

        if let Some(jingle) = &self.jingle {
            if jingle.format() != format {
                error!(jingle = %jingle.format(), speech = %format, "Opening jingle cannot be spliced");
                return Err(AssemblyFailure::FormatMismatch {
                    part: "opening jingle",
                    found: jingle.format(),
                    expected: format,
                });
            }
            jingle.write_frames(&mut out);
            samples += jingle.samples();
        }

        for clip in &dialogue {
            clip.write_frames(&mut out);
            samples += clip.samples();
        }
        drop(dialogue);
        let duration_ms = samples * 1000 / u64::from(format.sample_rate);

        if let Err(e) = fs::create_dir_all(&self.config.output_dir).await {
            error!(dir = %self.config.output_dir.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
        let path = self.config.output_dir.join(file_name);
        fs::write(&path, &out).await?;
        let file = LocalArtifact::new(path);

        // on any error the guard removes whatever is left on disk
        let size_bytes = verify_artifact_size(file.path(), self.config.min_artifact_bytes).await?;
        info!(
            path = %file.path().display(),
            size_bytes,
            duration_ms,
            %format,
            "Episode assembled"
        );
        Ok(AssembledArtifact { file, duration_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mp3::testing::{V1_MONO_44K, V1_STEREO_44K, V2_MONO_24K, frames, speech_clip};
    use crate::models::Speaker;
    use tempfile::tempdir;

    const MONO_44K: StreamFormat = StreamFormat {
        sample_rate: 44100,
        channels: 1,
    };

    fn segment(ordinal: usize, bytes: Vec<u8>) -> AudioSegment {
        AudioSegment {
            ordinal,
            speaker: Speaker::HostA,
            source_text: format!("turn {ordinal}"),
            audio_bytes: bytes,
            duration_ms: 0,
        }
    }

    fn config(dir: &Path, min: u64, jingle: Option<PathBuf>) -> AssemblyConfig {
        AssemblyConfig {
            output_dir: dir.join("out"),
            jingle_path: jingle,
            title_gap_ms: 500,
            min_artifact_bytes: min,
        }
    }

    fn clip(bytes: Vec<u8>) -> Mp3Clip {
        Mp3Clip::decode(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_stitch_order_and_duration() {
        let dir = tempdir().unwrap();
        let jingle = clip(frames(V2_MONO_24K, 5, 0x11));
        let assembler = EpisodeAssembler::new(config(dir.path(), 1, None), Some(jingle));

        let segments = vec![
            segment(3, frames(V2_MONO_24K, 2, 0x33)),
            segment(1, frames(V2_MONO_24K, 2, 0x22)),
        ];
        let title = segment(0, frames(V2_MONO_24K, 1, 0x44));
        let artifact = assembler.assemble(segments, Some(title), "ep.mp3").await.unwrap();

        let bytes = std::fs::read(artifact.file.path()).unwrap();
        let payload_fill: Vec<u8> = bytes.chunks(96).map(|f| f[50]).collect();
        let mut expected = vec![0x44];
        expected.extend([0x00; 21]);
        expected.extend([0x11; 5]);
        expected.extend([0x22; 2]);
        expected.extend([0x33; 2]);
        assert_eq!(payload_fill, expected);
        // 500 ms gap rounds up to 21 frames of 24 ms
        assert_eq!(artifact.duration_ms, 24 + 504 + 5 * 24 + 4 * 24);
    }

    #[tokio::test]
    async fn test_corrupt_and_mismatched_segments_are_skipped() {
        let dir = tempdir().unwrap();
        let assembler = EpisodeAssembler::new(config(dir.path(), 1, None), None);

        let segments = vec![
            segment(0, speech_clip(4)),
            segment(1, b"corrupt".to_vec()),
            segment(2, frames(V1_STEREO_44K, 2, 0x11)),
        ];
        let title = segment(0, b"also corrupt".to_vec());
        let artifact = assembler.assemble(segments, Some(title), "ep.mp3").await.unwrap();
        let bytes = std::fs::read(artifact.file.path()).unwrap();
        assert_eq!(bytes, speech_clip(4));
        assert_eq!(artifact.duration_ms, 96);
    }

    #[tokio::test]
    async fn test_stereo_jingle_fails_mono_episode() {
        let dir = tempdir().unwrap();
        let jingle = clip(frames(V1_STEREO_44K, 40, 0x11));
        let assembler = EpisodeAssembler::new(config(dir.path(), 1, None), Some(jingle));

        let err = assembler
            .assemble(vec![segment(0, frames(V1_MONO_44K, 10, 0x22))], None, "ep.mp3")
            .await
            .unwrap_err();
        match err {
            AssemblyFailure::FormatMismatch { found, expected, .. } => {
                assert_eq!(found.channels, 2);
                assert_eq!(expected, MONO_44K);
            }
            other => panic!("expected FormatMismatch, got {other:?}"),
        }
        assert!(!dir.path().join("out/ep.mp3").exists());
    }

    #[tokio::test]
    async fn test_load_jingle_rejects_stereo_for_mono_speech() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("opening.mp3");
        std::fs::write(&path, frames(V1_STEREO_44K, 40, 0x11)).unwrap();

        let err = load_jingle(&config(dir.path(), 1, Some(path)), MONO_44K)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::JingleFormat { .. }));
    }

    #[tokio::test]
    async fn test_load_jingle_accepts_matching_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("opening.mp3");
        std::fs::write(&path, frames(V1_MONO_44K, 40, 0x11)).unwrap();

        let jingle = load_jingle(&config(dir.path(), 1, Some(path)), MONO_44K)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(jingle.format(), MONO_44K);
    }

    #[tokio::test]
    async fn test_load_jingle_missing_or_corrupt_is_skipped() {
        let dir = tempdir().unwrap();
        let missing = config(dir.path(), 1, Some(dir.path().join("nope.mp3")));
        assert!(load_jingle(&missing, MONO_44K).await.unwrap().is_none());

        let garbage = dir.path().join("garbage.mp3");
        std::fs::write(&garbage, b"<html>404</html>").unwrap();
        let corrupt = config(dir.path(), 1, Some(garbage));
        assert!(load_jingle(&corrupt, MONO_44K).await.unwrap().is_none());

        assert!(load_jingle(&config(dir.path(), 1, None), MONO_44K).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_nothing_to_stitch() {
        let dir = tempdir().unwrap();
        let assembler = EpisodeAssembler::new(config(dir.path(), 1, None), None);
        let err = assembler
            .assemble(vec![segment(0, b"junk".to_vec())], None, "ep.mp3")
            .await
            .unwrap_err();
        assert!(matches!(err, AssemblyFailure::NothingToStitch));
    }

    #[tokio::test]
    async fn test_size_floor_exact_threshold_passes() {
        let dir = tempdir().unwrap();
        let assembler = EpisodeAssembler::new(config(dir.path(), 10 * 96, None), None);
        let artifact = assembler
            .assemble(vec![segment(0, speech_clip(10))], None, "ep.mp3")
            .await
            .unwrap();
        assert_eq!(std::fs::metadata(artifact.file.path()).unwrap().len(), 960);
    }

    #[tokio::test]
    async fn test_size_floor_one_byte_under_fails_and_deletes() {
        let dir = tempdir().unwrap();
        let assembler = EpisodeAssembler::new(config(dir.path(), 10 * 96 + 1, None), None);
        let err = assembler
            .assemble(vec![segment(0, speech_clip(10))], None, "ep.mp3")
            .await
            .unwrap_err();
        assert!(matches!(err, AssemblyFailure::TooSmall { size: 960, min: 961, .. }));
        assert!(!dir.path().join("out/ep.mp3").exists());
    }

    #[tokio::test]
    async fn test_verify_artifact_size_boundary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        std::fs::write(&path, vec![0u8; 1024]).unwrap();
        assert_eq!(verify_artifact_size(&path, 1024).await.unwrap(), 1024);
        assert!(path.exists());
        assert!(verify_artifact_size(&path, 1025).await.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_failed_verification_leaves_no_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.mp3");
        std::fs::write(&path, b"x").unwrap();
        let file = LocalArtifact::new(path.clone());

        // remove it behind the guard's back: metadata now fails with Io
        std::fs::remove_file(&path).unwrap();
        let err = verify_artifact_size(file.path(), 1).await.unwrap_err();
        assert!(matches!(err, AssemblyFailure::Io(_)));
        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn test_local_artifact_guard() {
        let dir = tempdir().unwrap();
        let dropped = dir.path().join("dropped.mp3");
        let kept = dir.path().join("kept.mp3");
        std::fs::write(&dropped, b"x").unwrap();
        std::fs::write(&kept, b"x").unwrap();

        drop(LocalArtifact::new(dropped.clone()));
        let retained = LocalArtifact::new(kept.clone()).retain();

        assert!(!dropped.exists());
        assert_eq!(retained, kept);
        assert!(kept.exists());
    }
}
