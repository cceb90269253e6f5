//! Script-to-audio: dialogue parsing, speech synthesis and episode assembly.
//!
//! - [`parse`]: script text into ordered [`crate::models::DialogueTurn`]s
//! - [`tts`]: the [`tts::SpeechSynthesizer`] seam and its Google backend
//! - [`synth`]: per-turn synthesis with failure isolation
//! - [`mp3`]: MP3 validation and measuring with symphonia, frame splicing
//! - [`assemble`]: stitching, size floor, local artifact lifetime

pub mod assemble;
pub mod mp3;
pub mod parse;
pub mod synth;
pub mod tts;
