//! # Container Format Sniffing
//!
//! Classifies an audio byte buffer by its leading "magic" bytes, without
//! parsing the rest of the container. Browsers hand us recordings with no
//! reliable filename or MIME type, so the first four bytes are the only
//! thing we can trust.
//!
//! ## Signatures:
//! - **WAV**: `52 49 46 46` (`RIFF`)
//! - **WebM**: `1A 45 DF A3` (EBML header)
//! - **MP3**: `FF Ex` (frame sync) or `49 44 33` (`ID3` tag)
//!
//! An unrecognised buffer is classified as [`AudioFormat::Unknown`]. That is a
//! valid answer, never an error.

use serde::Serialize;
use std::fmt;

/// Minimum number of bytes needed before any signature is checked.
pub const MIN_SNIFF_LEN: usize = 4;

/// Container/codec family detected from leading bytes.
///
/// ## Rust Concepts:
/// - **Copy**: A one-byte enum is cheaper to copy than to borrow
/// - **#[serde(rename_all)]**: Serializes as `"wav"`, `"webm"`, ... in JSON responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Webm,
    Mp3,
    Unknown,
}

impl AudioFormat {
    /// Lower-case short name, matching the JSON representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Webm => "webm",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Unknown => "unknown",
        }
    }

    /// MIME type to advertise for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Webm => "audio/webm",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Unknown => "application/octet-stream",
        }
    }

    /// File extension handed to the demuxer probe as a hint.
    ///
    /// Returns `None` for unknown input so the probe falls back to scanning
    /// every registered container reader.
    pub fn extension_hint(&self) -> Option<&'static str> {
        match self {
            AudioFormat::Wav => Some("wav"),
            AudioFormat::Webm => Some("webm"),
            AudioFormat::Mp3 => Some("mp3"),
            AudioFormat::Unknown => None,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a byte buffer by its leading bytes.
///
/// ## Matching Rules (first match wins):
/// 1. `RIFF` → [`AudioFormat::Wav`]
/// 2. EBML magic → [`AudioFormat::Webm`]
/// 3. MPEG frame sync (`0xFF` followed by a byte with the top three bits set)
///    or an `ID3` tag → [`AudioFormat::Mp3`]
///
/// Buffers shorter than [`MIN_SNIFF_LEN`] are always `Unknown`.
pub fn sniff(bytes: &[u8]) -> AudioFormat {
    if bytes.len() < MIN_SNIFF_LEN {
        return AudioFormat::Unknown;
    }

    match bytes {
        [0x52, 0x49, 0x46, 0x46, ..] => AudioFormat::Wav,
        [0x1A, 0x45, 0xDF, 0xA3, ..] => AudioFormat::Webm,
        [0xFF, second, ..] if second & 0xE0 == 0xE0 => AudioFormat::Mp3,
        [0x49, 0x44, 0x33, ..] => AudioFormat::Mp3,
        _ => AudioFormat::Unknown,
    }
}

/// Whether a recording with this MIME type must be transcoded before the
/// speech-recognition service will accept it.
///
/// Browser `MediaRecorder` output (`audio/webm;codecs=opus`, `audio/ogg`)
/// always needs conversion; WAV and MP3 uploads are passed through by callers
/// that trust them.
pub fn needs_conversion(mime_type: &str) -> bool {
    let mime = mime_type.to_ascii_lowercase();
    mime.contains("webm") || mime.contains("opus") || mime.contains("ogg")
}
