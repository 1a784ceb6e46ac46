//! # Audio Transcoding Module
//!
//! Converts browser-captured recordings (WebM/Opus, MP3, WAV, ...) into the
//! format the speech-recognition service ingests.
//!
//! ## Key Components:
//! - **Format Sniffer**: Classifies a buffer by its magic bytes
//! - **Decoder**: Async contract plus the symphonia-backed implementation
//! - **Downmixer**: Averages channels 0 and 1 into mono
//! - **Resampler**: Linear interpolation to the target rate
//! - **WAV Encoder**: Canonical 44-byte header + 16-bit PCM
//! - **Pipeline**: `convert` / `probe` / `sniff_format` entry points
//!
//! ## Output Format Requirements:
//! - **Sample Rate**: 16kHz by default, caller-selectable
//! - **Bit Depth**: 16-bit PCM
//! - **Channels**: Mono (1 channel)
//! - **Encoding**: Little-endian signed integers

pub mod decoder;            // AudioDecoder contract and DecodedAudio
pub mod downmix;            // Multi-channel to mono
pub mod error;              // ConvertError
pub mod format;             // Magic-byte format sniffing
pub mod pipeline;           // Transcoder orchestration
pub mod resample;           // Linear-interpolation resampler
pub mod symphonia_decoder;  // Production decoder
pub mod wav;                // WAV encoding and parsing

pub use decoder::{AudioDecoder, DecodedAudio};
pub use error::{ConvertError, ConvertResult};
pub use format::{needs_conversion, sniff, AudioFormat};
pub use pipeline::{validate_target_rate, AudioMetadata, Transcoder, DEFAULT_TARGET_SAMPLE_RATE};
pub use symphonia_decoder::SymphoniaDecoder;
pub use self::wav::{WavFile, WavInfo, MAX_SAMPLE_RATE};
