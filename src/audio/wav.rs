//! # WAV Encoding and Parsing
//!
//! Produces the canonical 44-byte-header RIFF/WAVE file the speech-recognition
//! service ingests, and parses such files back for validation.
//!
//! ## Output Format (always):
//! - **Encoding**: PCM, format code 1
//! - **Channels**: Mono
//! - **Bit Depth**: 16-bit signed, little-endian
//!
//! ## Header Layout:
//! ```text
//! 0   "RIFF"          4   chunk size (36 + data)   8  "WAVE"
//! 12  "fmt "          16  16                       20 1 (PCM)
//! 22  1 (channels)    24  sample rate              28 byte rate
//! 32  block align     34  bits per sample
//! 36  "data"          40  data size                44 samples...
//! ```

use crate::audio::error::ConvertError;
use byteorder::{ByteOrder, LittleEndian};
use std::io::Cursor;

/// Size of the canonical RIFF/WAVE header in bytes.
pub const WAV_HEADER_LEN: usize = 44;

/// PCM format code in the `fmt ` chunk.
pub const PCM_FORMAT: u16 = 1;

/// Highest output rate the pipeline accepts, in Hz.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = CHANNELS * (BITS_PER_SAMPLE / 8);

/// A complete, well-formed WAV file held in memory.
///
/// The header's size fields always match the trailing data, because the only
/// way to build one is [`encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavFile {
    bytes: Vec<u8>,
}

impl WavFile {
    /// The full file: header followed by PCM data.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Total file size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the data section holds at least one sample.
    pub fn has_samples(&self) -> bool {
        self.sample_count() > 0
    }

    /// Sample rate declared in the header.
    pub fn sample_rate(&self) -> u32 {
        LittleEndian::read_u32(&self.bytes[24..28])
    }

    /// Number of 16-bit samples in the data section.
    pub fn sample_count(&self) -> usize {
        (self.bytes.len() - WAV_HEADER_LEN) / 2
    }

    /// The PCM data section, without the header.
    pub fn data(&self) -> &[u8] {
        &self.bytes[WAV_HEADER_LEN..]
    }

    /// Playback duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.sample_count() as f64 / self.sample_rate() as f64
    }
}

impl AsRef<[u8]> for WavFile {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Convert one float sample to a signed 16-bit PCM value.
///
/// ## Conversion:
/// 1. Clamp to [-1.0, 1.0] so out-of-range values saturate instead of wrapping
/// 2. Negative full scale maps to `i16::MIN`
/// 3. Everything else is `round(s * 32767)`, with halves rounded up
///    (-0.5 becomes -16383, not -16384)
pub fn sample_to_pcm16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped <= -1.0 {
        return i16::MIN;
    }
    (clamped * i16::MAX as f32 + 0.5).floor() as i16
}

/// Serialize mono samples into a canonical 16-bit PCM WAV file.
///
/// ## Parameters:
/// - **samples**: Mono float samples, nominally in [-1.0, 1.0]
/// - **sample_rate**: Rate written into the header, in Hz
///
/// ## Rust Concepts:
/// - **ByteOrder on slices**: `LittleEndian::write_u32` writes into a
///   pre-sized buffer, so encoding cannot fail part-way through
///
/// Upload limits keep recordings far below the 4 GiB that the 32-bit RIFF
/// size fields can describe. Callers keep `sample_rate` within
/// [`MAX_SAMPLE_RATE`]; the byte-rate field saturates rather than wrapping
/// for anything larger.
pub fn encode(samples: &[f32], sample_rate: u32) -> WavFile {
    let data_size = samples.len() * BLOCK_ALIGN as usize;
    let mut bytes = vec![0u8; WAV_HEADER_LEN + data_size];

    // RIFF chunk descriptor
    bytes[0..4].copy_from_slice(b"RIFF");
    LittleEndian::write_u32(&mut bytes[4..8], (WAV_HEADER_LEN + data_size - 8) as u32);
    bytes[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    bytes[12..16].copy_from_slice(b"fmt ");
    LittleEndian::write_u32(&mut bytes[16..20], 16);
    LittleEndian::write_u16(&mut bytes[20..22], PCM_FORMAT);
    LittleEndian::write_u16(&mut bytes[22..24], CHANNELS);
    LittleEndian::write_u32(&mut bytes[24..28], sample_rate);
    LittleEndian::write_u32(&mut bytes[28..32], sample_rate.saturating_mul(u32::from(BLOCK_ALIGN)));
    LittleEndian::write_u16(&mut bytes[32..34], BLOCK_ALIGN);
    LittleEndian::write_u16(&mut bytes[34..36], BITS_PER_SAMPLE);

    // data sub-chunk
    bytes[36..40].copy_from_slice(b"data");
    LittleEndian::write_u32(&mut bytes[40..44], data_size as u32);

    let pcm: Vec<i16> = samples.iter().map(|&s| sample_to_pcm16(s)).collect();
    LittleEndian::write_i16_into(&pcm, &mut bytes[WAV_HEADER_LEN..]);

    WavFile { bytes }
}

/// Parsed contents of a 16-bit PCM WAV file.
#[derive(Debug, Clone)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Interleaved samples when `channels > 1`
    pub samples: Vec<i16>,
}

impl WavInfo {
    /// Parse a WAV buffer and extract its PCM samples.
    ///
    /// ## Validation:
    /// - Must start with `RIFF` and declare `WAVE`
    /// - Format code must be PCM (1)
    /// - Bit depth must be 16
    ///
    /// This is the check the recogniser runs on every upload; running it on
    /// our own output catches header drift before it leaves the service.
    // wav 1.0.1 marks the whole crate deprecated
    #[allow(deprecated)]
    pub fn parse(bytes: &[u8]) -> Result<Self, ConvertError> {
        if bytes.len() < WAV_HEADER_LEN || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(ConvertError::InvalidWav("missing RIFF/WAVE header".to_string()));
        }

        let mut cursor = Cursor::new(bytes);
        let (header, data) = wav::read(&mut cursor)
            .map_err(|e| ConvertError::InvalidWav(e.to_string()))?;

        if header.audio_format != PCM_FORMAT {
            return Err(ConvertError::InvalidWav(format!(
                "unsupported audio format {} (need PCM)",
                header.audio_format
            )));
        }

        let samples = match data {
            wav::BitDepth::Sixteen(samples) => samples,
            wav::BitDepth::Empty => Vec::new(),
            _ => {
                return Err(ConvertError::InvalidWav(format!(
                    "unsupported bit depth {} (need 16)",
                    header.bits_per_sample
                )))
            }
        };

        Ok(Self {
            sample_rate: header.sampling_rate,
            channels: header.channel_count,
            bits_per_sample: header.bits_per_sample,
            samples,
        })
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.channels == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        (self.samples.len() / self.channels as usize) as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_i16(bytes: &[u8], sample: usize) -> i16 {
        let offset = WAV_HEADER_LEN + sample * 2;
        LittleEndian::read_i16(&bytes[offset..offset + 2])
    }

    #[test]
    fn test_header_exactness() {
        let wav = encode(&vec![0.0; 100], 16000);
        let bytes = wav.as_bytes();

        assert_eq!(bytes.len(), 244);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(LittleEndian::read_u32(&bytes[4..8]), 236);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(LittleEndian::read_u32(&bytes[16..20]), 16);
        assert_eq!(LittleEndian::read_u16(&bytes[20..22]), 1);
        assert_eq!(LittleEndian::read_u16(&bytes[22..24]), 1);
        assert_eq!(LittleEndian::read_u32(&bytes[24..28]), 16000);
        assert_eq!(LittleEndian::read_u32(&bytes[28..32]), 32000);
        assert_eq!(LittleEndian::read_u16(&bytes[32..34]), 2);
        assert_eq!(LittleEndian::read_u16(&bytes[34..36]), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(LittleEndian::read_u32(&bytes[40..44]), 200);
    }

    #[test]
    fn test_clamp_law() {
        let wav = encode(&[2.0, -2.0, 1.0, -1.0], 16000);
        assert_eq!(read_i16(wav.as_bytes(), 0), 32767);
        assert_eq!(read_i16(wav.as_bytes(), 1), -32768);
        assert_eq!(read_i16(wav.as_bytes(), 2), 32767);
        assert_eq!(read_i16(wav.as_bytes(), 3), -32768);
    }

    #[test]
    fn test_sample_rounding() {
        assert_eq!(sample_to_pcm16(0.0), 0);
        assert_eq!(sample_to_pcm16(0.5), 16384);
        assert_eq!(sample_to_pcm16(-0.25), -8192);
        assert_eq!(sample_to_pcm16(f32::INFINITY), 32767);
    }

    #[test]
    fn test_halves_round_up() {
        // -0.5 * 32767 = -16383.5
        assert_eq!(sample_to_pcm16(-0.5), -16383);
        // 0.5 * 32767 = 16383.5
        assert_eq!(sample_to_pcm16(0.5), 16384);
    }

    #[test]
    fn test_oversized_rate_does_not_overflow_byte_rate() {
        let wav = encode(&[], 3_000_000_000);
        assert_eq!(wav.sample_rate(), 3_000_000_000);
        assert_eq!(LittleEndian::read_u32(&wav.as_bytes()[28..32]), u32::MAX);

        let wav = encode(&[0.0], MAX_SAMPLE_RATE);
        assert_eq!(LittleEndian::read_u32(&wav.as_bytes()[28..32]), 768_000);
    }

    #[test]
    fn test_accessors() {
        let wav = encode(&[0.1; 1600], 16000);
        assert_eq!(wav.sample_rate(), 16000);
        assert_eq!(wav.sample_count(), 1600);
        assert_eq!(wav.data().len(), 3200);
        assert!((wav.duration_seconds() - 0.1).abs() < 1e-9);
        assert!(wav.has_samples());
    }

    #[test]
    fn test_empty_recording_is_still_valid() {
        let wav = encode(&[], 8000);
        assert_eq!(wav.len(), WAV_HEADER_LEN);
        assert_eq!(LittleEndian::read_u32(&wav.as_bytes()[4..8]), 36);
        assert!(!wav.has_samples());
    }

    #[test]
    fn test_parse_encoder_output() {
        let wav = encode(&[0.5, -0.5, 0.0, 1.0], 22050);
        let info = WavInfo::parse(wav.as_bytes()).unwrap();

        assert_eq!(info.sample_rate, 22050);
        assert_eq!(info.channels, 1);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.samples, vec![16384, -16383, 0, 32767]);
    }

    #[test]
    fn test_parse_rejects_non_riff() {
        let err = WavInfo::parse(&[0x1A, 0x45, 0xDF, 0xA3, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidWav(_)));
    }

    #[test]
    fn test_parse_rejects_non_pcm() {
        let mut bytes = encode(&[0.0; 8], 16000).into_bytes();
        // IEEE float format code
        LittleEndian::write_u16(&mut bytes[20..22], 3);
        assert!(matches!(WavInfo::parse(&bytes), Err(ConvertError::InvalidWav(_))));
    }
}
