//! # Transcoding Pipeline
//!
//! Ties the stages together into the operations callers actually use:
//!
//! ```text
//! compressed bytes → decode → downmix → resample → encode → WAV bytes
//! ```
//!
//! ## Key Properties:
//! - **Stateless**: A [`Transcoder`] holds only its decoder; every call owns
//!   its buffers end-to-end, so concurrent calls never share mutable data
//! - **One suspension point**: Only decoding awaits. Downmix, resample and
//!   encode are synchronous CPU work that runs after the decode resolves
//! - **All or nothing**: The encoder only runs once decoding and resampling
//!   have succeeded, so a failed call never yields a partial WAV

use crate::audio::decoder::{AudioDecoder, DecodedAudio};
use crate::audio::downmix::downmix;
use crate::audio::error::{ConvertError, ConvertResult};
use crate::audio::format::{self, AudioFormat};
use crate::audio::resample::resample;
use crate::audio::symphonia_decoder::SymphoniaDecoder;
use crate::audio::wav::{self, WavFile, MAX_SAMPLE_RATE};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Sample rate the speech-recognition service expects.
pub const DEFAULT_TARGET_SAMPLE_RATE: u32 = 16_000;

/// Check that `rate` can be used as an output sample rate.
///
/// Accepts 1 Hz up to [`MAX_SAMPLE_RATE`]. Anything else would either make
/// the resampler divide by zero or overflow the header's byte-rate field.
pub fn validate_target_rate(rate: u32) -> ConvertResult<()> {
    // ByteRate = rate * 2 bytes per mono 16-bit frame
    let byte_rate = rate.checked_mul(2);
    if rate == 0 || rate > MAX_SAMPLE_RATE || byte_rate.is_none() {
        return Err(ConvertError::InvalidSampleRate(rate));
    }
    Ok(())
}

/// What a recording looks like before conversion.
///
/// `sample_count` is per channel (frames), so
/// `duration_seconds == sample_count / sample_rate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioMetadata {
    pub sample_rate: u32,
    pub channel_count: usize,
    pub duration_seconds: f64,
    pub sample_count: usize,
    pub format: AudioFormat,
}

/// Converts browser recordings into canonical mono 16-bit PCM WAV.
///
/// ## Thread Safety:
/// The decoder sits behind an `Arc<dyn AudioDecoder>`, so a `Transcoder` is
/// cheap to clone and can be shared across request handlers.
#[derive(Clone)]
pub struct Transcoder {
    decoder: Arc<dyn AudioDecoder>,
}

impl fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcoder").finish_non_exhaustive()
    }
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new(Arc::new(SymphoniaDecoder::new()))
    }
}

impl Transcoder {
    pub fn new(decoder: Arc<dyn AudioDecoder>) -> Self {
        Self { decoder }
    }

    /// Classify the container of `bytes` from its magic number.
    pub fn sniff_format(&self, bytes: &[u8]) -> AudioFormat {
        format::sniff(bytes)
    }

    /// Convert a compressed recording into a mono 16-bit PCM WAV file.
    ///
    /// ## Steps:
    /// 1. Reject an unusable target rate before doing any work
    /// 2. Decode to per-channel float samples at the native rate
    /// 3. Downmix to mono (channels 0 and 1 only)
    /// 4. Resample to `target_sample_rate`
    /// 5. Encode the WAV header and PCM data
    ///
    /// ## Errors:
    /// - [`ConvertError::InvalidSampleRate`] for a target of 0 Hz or above
    ///   [`MAX_SAMPLE_RATE`]
    /// - [`ConvertError::Decode`] when the decoder cannot parse the input, or
    ///   reports a 0 Hz native rate
    pub async fn convert(&self, compressed: Vec<u8>, target_sample_rate: u32) -> ConvertResult<WavFile> {
        validate_target_rate(target_sample_rate)?;

        let conversion_id = Uuid::new_v4();
        let started = Instant::now();
        let input_bytes = compressed.len();
        let source_format = format::sniff(&compressed);

        debug!(%conversion_id, format = %source_format, input_bytes, "Starting conversion");

        let decoded = self.decode(compressed, conversion_id).await?;
        let native_rate = decoded.sample_rate;
        let channel_count = decoded.channel_count();

        if channel_count > 2 {
            warn!(%conversion_id, channel_count, "Only the first two channels are mixed into the output");
        }

        let mono = downmix(decoded.channels);
        let resampled = resample(mono, native_rate, target_sample_rate);
        let wav_file = wav::encode(&resampled, target_sample_rate);

        info!(
            %conversion_id,
            format = %source_format,
            native_rate,
            channel_count,
            target_sample_rate,
            output_samples = wav_file.sample_count(),
            output_bytes = wav_file.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Conversion completed"
        );

        Ok(wav_file)
    }

    /// Convert using [`DEFAULT_TARGET_SAMPLE_RATE`].
    pub async fn convert_default(&self, compressed: Vec<u8>) -> ConvertResult<WavFile> {
        self.convert(compressed, DEFAULT_TARGET_SAMPLE_RATE).await
    }

    /// Read a recording from an async source, then convert it.
    ///
    /// The source is read completely before decoding starts. Any I/O failure
    /// along the way surfaces as [`ConvertError::Read`].
    pub async fn convert_reader<R>(&self, mut reader: R, target_sample_rate: u32) -> ConvertResult<WavFile>
    where
        R: AsyncRead + Unpin,
    {
        let mut compressed = Vec::new();
        reader.read_to_end(&mut compressed).await?;
        self.convert(compressed, target_sample_rate).await
    }

    /// Inspect a recording's native layout without converting it.
    pub async fn probe(&self, compressed: Vec<u8>) -> ConvertResult<AudioMetadata> {
        let conversion_id = Uuid::new_v4();
        let format = format::sniff(&compressed);
        let decoded = self.decode(compressed, conversion_id).await?;

        let metadata = AudioMetadata {
            sample_rate: decoded.sample_rate,
            channel_count: decoded.channel_count(),
            duration_seconds: decoded.duration_seconds(),
            sample_count: decoded.frame_count(),
            format,
        };

        debug!(%conversion_id, ?metadata, "Probed recording");
        Ok(metadata)
    }

    /// Run the decoder and vet what it hands back.
    async fn decode(&self, compressed: Vec<u8>, conversion_id: Uuid) -> ConvertResult<DecodedAudio> {
        let result = self.decoder.decode(compressed).await.and_then(|decoded| {
            if decoded.sample_rate == 0 {
                return Err(ConvertError::Decode("decoder reported a 0 Hz sample rate".to_string()));
            }
            Ok(decoded)
        });

        match result {
            Ok(decoded) => Ok(decoded),
            Err(err) => {
                warn!(%conversion_id, error = %err, "Decoding failed");
                Err(err)
            }
        }
    }
}
