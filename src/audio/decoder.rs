//! # Decoder Contract
//!
//! The pipeline does not parse compressed audio itself. It depends on an
//! [`AudioDecoder`], which turns a complete compressed recording into one
//! float buffer per channel at the recording's native sample rate.
//!
//! ## Why a trait:
//! - **Swappable backends**: The production service uses
//!   [`SymphoniaDecoder`](crate::audio::symphonia_decoder::SymphoniaDecoder); tests
//!   plug in canned output
//! - **Async boundary**: Decoding is the only step that may suspend the
//!   caller, so it is the only async method in the pipeline

use crate::audio::error::ConvertResult;
use async_trait::async_trait;

/// Output of a successful decode.
///
/// ## Invariants:
/// - `channels` holds one buffer per channel, all the same length
/// - `sample_rate` is the recording's native rate and never 0
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self { channels, sample_rate }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }
}

/// Something that can decode a compressed recording held in memory.
///
/// ## Contract:
/// - Resolves with per-channel samples and the native rate, or a
///   [`ConvertError::Decode`](crate::audio::error::ConvertError::Decode)
/// - Any native decoding context it creates is released before the future
///   resolves, on success and failure alike
/// - Dropping the future must not leak that context
///
/// ## Rust Concepts:
/// - **#[async_trait]**: Boxes the returned future so the trait can be used as
///   `Arc<dyn AudioDecoder>`
/// - **Send + Sync**: One decoder is shared by every concurrent conversion
#[async_trait]
pub trait AudioDecoder: Send + Sync {
    async fn decode(&self, bytes: Vec<u8>) -> ConvertResult<DecodedAudio>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoded_audio_dimensions() {
        let audio = DecodedAudio::new(vec![vec![0.0; 4800], vec![0.0; 4800]], 48000);
        assert_eq!(audio.channel_count(), 2);
        assert_eq!(audio.frame_count(), 4800);
        assert!((audio.duration_seconds() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_empty_decode() {
        let audio = DecodedAudio::new(Vec::new(), 16000);
        assert_eq!(audio.frame_count(), 0);
        assert_eq!(audio.duration_seconds(), 0.0);
    }
}
