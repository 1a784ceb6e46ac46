//! # Conversion Errors
//!
//! Failures the transcoding pipeline can report. Every one of them reaches the
//! caller unchanged: no stage swallows an error to hand back a partial or
//! silent WAV file, and nothing is retried automatically.
//!
//! Note that an unrecognised container is *not* an error. Format sniffing
//! always answers, with `Unknown` if nothing matches.

use std::fmt;

/// Errors produced by `convert` and `probe`.
///
/// ## Error Categories:
/// - **Decode**: The decoder could not parse the input (corrupt, truncated,
///   unsupported codec). Carries the decoder's own diagnostic text
/// - **Read**: The source bytes could not be fully read before decoding
/// - **InvalidWav**: A WAV buffer failed header validation
/// - **InvalidSampleRate**: A caller asked for a 0 Hz target rate
#[derive(Debug, Clone, PartialEq)]
pub enum ConvertError {
    Decode(String),
    Read(String),
    InvalidWav(String),
    InvalidSampleRate(u32),
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::Decode(msg) => write!(f, "Audio decoding failed: {}", msg),
            ConvertError::Read(msg) => write!(f, "Failed to read audio data: {}", msg),
            ConvertError::InvalidWav(msg) => write!(f, "Invalid WAV data: {}", msg),
            ConvertError::InvalidSampleRate(rate) => {
                write!(f, "Invalid sample rate: {} Hz", rate)
            }
        }
    }
}

impl std::error::Error for ConvertError {}

/// I/O failures only happen while pulling the source bytes in, so they are
/// always read errors.
impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        ConvertError::Read(err.to_string())
    }
}

pub type ConvertResult<T> = Result<T, ConvertError>;
