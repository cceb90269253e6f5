//! MP3 clips: recognition, validation, duration and splicing.
//!
//! Clips are opened with symphonia. Every packet is run through the decoder
//! once, so a clip only keeps packets that actually decode, and its
//! duration is the sum of decoded samples. The demuxer already drops ID3
//! tags and Xing/Info/VBRI metadata frames, so the kept packets are plain
//! MPEG audio frames.
//!
//! Splicing copies those frames byte for byte. Frames can only be
//! concatenated when sample rate and channel count match, which
//! [`Mp3Clip::format`] exposes for the assembler to check.

use std::fmt;
use std::io::Cursor;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, warn};

const HEADER_LEN: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Mp3Error {
    #[error("not an MP3 stream: {0}")]
    Unrecognized(String),

    #[error("no decodable MPEG audio frames")]
    NoFrames,
}

/// Sample rate and channel count shared by spliceable clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: usize,
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = match self.channels {
            1 => "mono".to_string(),
            2 => "stereo".to_string(),
            n => format!("{n} channels"),
        };
        write!(f, "{} Hz {}", self.sample_rate, layout)
    }
}

/// A validated MP3 clip held as its decodable frames.
#[derive(Debug, Clone)]
pub struct Mp3Clip {
    frames: Vec<Box<[u8]>>,
    format: StreamFormat,
    samples: u64,
    samples_per_frame: u64,
}

impl Mp3Clip {
    /// Open and validate `bytes`.
    pub fn decode(bytes: Vec<u8>) -> Result<Self, Mp3Error> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
        let mut hint = Hint::new();
        hint.with_extension("mp3");

        let opened = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Mp3Error::Unrecognized(e.to_string()))?;
        let mut reader = opened.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(Mp3Error::NoFrames)?;
        let track_id = track.id;
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Mp3Error::Unrecognized(e.to_string()))?;

        let mut frames = Vec::new();
        let mut format: Option<StreamFormat> = None;
        let mut samples = 0u64;
        let mut samples_per_frame = 0u64;
        let mut rejected = 0usize;

        loop {
            let packet = match reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "Stopped reading packets");
                    break;
                }
            };
            if packet.track_id() != track_id {
                continue;
            }
            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = decoded.spec();
                    let frame_format = StreamFormat {
                        sample_rate: spec.rate,
                        channels: spec.channels.count(),
                    };
                    let decoded_frames = decoded.frames() as u64;
                    if *format.get_or_insert(frame_format) != frame_format {
                        rejected += 1;
                        continue;
                    }
                    if samples_per_frame == 0 {
                        samples_per_frame = decoded_frames;
                    }
                    samples += decoded_frames;
                    frames.push(packet.buf().into());
                }
                Err(e) => {
                    debug!(error = %e, "Undecodable packet dropped");
                    rejected += 1;
                }
            }
        }

        let Some(format) = format.filter(|_| !frames.is_empty() && samples_per_frame > 0) else {
            return Err(Mp3Error::NoFrames);
        };
        if rejected > 0 {
            warn!(rejected, kept = frames.len(), "Dropped undecodable MP3 frames");
        }
        Ok(Self {
            frames,
            format,
            samples,
            samples_per_frame,
        })
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn duration_ms(&self) -> u64 {
        self.samples * 1000 / u64::from(self.format.sample_rate)
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Append the audio frames to `out`.
    pub fn write_frames(&self, out: &mut Vec<u8>) {
        for frame in &self.frames {
            out.extend_from_slice(frame);
        }
    }

    /// Silent frames in this clip's format covering at least `duration_ms`,
    /// and the number of samples they hold.
    ///
    /// Each frame copies the first frame's header with CRC protection off,
    /// followed by zeroed side information: no main data, which decodes as
    /// digital silence.
    pub fn silence(&self, duration_ms: u64) -> (Vec<u8>, u64) {
        let template = &self.frames[0];
        let wanted = duration_ms * u64::from(self.format.sample_rate) / 1000;
        let count = wanted.div_ceil(self.samples_per_frame);

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&template[..HEADER_LEN]);
        header[1] |= 0x01;

        let mut out = Vec::with_capacity(template.len() * count as usize);
        for _ in 0..count {
            out.extend_from_slice(&header);
            out.resize(out.len() + template.len() - HEADER_LEN, 0);
        }
        (out, count * self.samples_per_frame)
    }
}

/// Synthetic streams for tests across the crate.
///
/// Frames carry a header, zeroed side information (so they decode as
/// silence) and a marker byte in the ancillary area, which decoders ignore.
#[cfg(test)]
pub(crate) mod testing {
    /// A frame header together with its frame length.
    #[derive(Debug, Clone, Copy)]
    pub struct FrameKind {
        pub header: [u8; 4],
        pub len: usize,
    }

    /// MPEG-2 Layer III, 32 kbps, 24 kHz, mono: 96-byte frames of 24 ms.
    pub const V2_MONO_24K: FrameKind = FrameKind {
        header: [0xFF, 0xF3, 0x44, 0xC0],
        len: 96,
    };
    /// MPEG-1 Layer III, 128 kbps, 44.1 kHz, mono: 417-byte frames.
    pub const V1_MONO_44K: FrameKind = FrameKind {
        header: [0xFF, 0xFB, 0x90, 0xC0],
        len: 417,
    };
    /// MPEG-1 Layer III, 128 kbps, 44.1 kHz, joint stereo: 417-byte frames.
    pub const V1_STEREO_44K: FrameKind = FrameKind {
        header: [0xFF, 0xFB, 0x90, 0x40],
        len: 417,
    };

    /// Side information fits in the first 36 bytes for every mode.
    const MARKER_AT: usize = 36;

    /// `count` frames of `kind`, the ancillary area filled with `marker`.
    pub fn frames(kind: FrameKind, count: usize, marker: u8) -> Vec<u8> {
        let mut out = Vec::with_capacity(kind.len * count);
        for _ in 0..count {
            out.extend_from_slice(&kind.header);
            out.resize(out.len() + MARKER_AT - 4, 0);
            out.resize(out.len() + kind.len - MARKER_AT, marker);
        }
        out
    }

    /// A 24 kHz mono clip lasting `frames * 24` ms.
    pub fn speech_clip(frame_count: usize) -> Vec<u8> {
        frames(V2_MONO_24K, frame_count, 0x55)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_decode_measures_format_and_duration() {
        let clip = Mp3Clip::decode(speech_clip(50)).unwrap();
        assert_eq!(
            clip.format(),
            StreamFormat {
                sample_rate: 24000,
                channels: 1
            }
        );
        assert_eq!(clip.samples(), 50 * 576);
        assert_eq!(clip.duration_ms(), 1200);
    }

    #[test]
    fn test_duration_is_not_truncated_per_frame() {
        // 1152 samples at 44.1 kHz is 26.12 ms; 100 frames is 2612 ms, not 2600
        let clip = Mp3Clip::decode(frames(V1_MONO_44K, 100, 0x11)).unwrap();
        assert_eq!(clip.duration_ms(), 2612);
        assert_eq!(clip.format().to_string(), "44100 Hz mono");
    }

    #[test]
    fn test_stereo_format() {
        let clip = Mp3Clip::decode(frames(V1_STEREO_44K, 4, 0x11)).unwrap();
        assert_eq!(clip.format().channels, 2);
        assert_eq!(clip.format().to_string(), "44100 Hz stereo");
    }

    #[test]
    fn test_write_frames_round_trips_audio() {
        let data = speech_clip(3);
        let clip = Mp3Clip::decode(data.clone()).unwrap();
        let mut out = Vec::new();
        clip.write_frames(&mut out);
        assert_eq!(out, data);
    }

    #[test]
    fn test_leading_id3_tag_is_not_audio() {
        // ID3v2.4 header declaring a 16-byte tag of padding
        let mut data = b"ID3\x04\x00\x00\x00\x00\x00\x10".to_vec();
        data.extend([0u8; 16]);
        data.extend(speech_clip(3));
        let clip = Mp3Clip::decode(data).unwrap();
        let mut out = Vec::new();
        clip.write_frames(&mut out);
        assert_eq!(out, speech_clip(3));
    }

    #[test]
    fn test_corrupt_data_is_rejected() {
        assert!(Mp3Clip::decode(b"<html>error</html>".to_vec()).is_err());
        assert!(Mp3Clip::decode(Vec::new()).is_err());
    }

    #[test]
    fn test_silence_matches_clip_format() {
        let clip = Mp3Clip::decode(speech_clip(2)).unwrap();
        let (gap, samples) = clip.silence(500);
        // 500 ms at 24 ms per frame rounds up to 21 frames
        assert_eq!(gap.len(), 21 * 96);
        assert_eq!(samples, 21 * 576);
        let decoded = Mp3Clip::decode(gap).unwrap();
        assert_eq!(decoded.format(), clip.format());
        assert_eq!(decoded.samples(), samples);
    }

    #[test]
    fn test_zero_silence_is_empty() {
        let clip = Mp3Clip::decode(speech_clip(1)).unwrap();
        assert_eq!(clip.silence(0), (Vec::new(), 0));
    }
}
