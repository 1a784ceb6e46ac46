//! # Audio Transcoder
//!
//! Turns browser-captured recordings (WebM/Opus, MP3, WAV, ...) into mono
//! 16-bit PCM WAV at a fixed sample rate, ready for speech recognition.
//!
//! ## Library vs. binary:
//! - **audio**: The transcoding pipeline; usable without any HTTP code
//! - **config / error / state / health / middleware / handlers**: The actix-web
//!   service built around it (see `main.rs`)
//!
//! ## Quick start:
//! ```no_run
//! # async fn run(recording: Vec<u8>) -> Result<(), audio_transcoder::audio::ConvertError> {
//! use audio_transcoder::audio::Transcoder;
//!
//! let wav = Transcoder::default().convert(recording, 16_000).await?;
//! assert_eq!(wav.sample_rate(), 16_000);
//! # Ok(())
//! # }
//! ```

pub mod audio;       // Decode, downmix, resample, encode
pub mod config;      // Configuration management (config.rs)
pub mod error;       // Error handling types (error.rs)
pub mod handlers;    // HTTP request handlers (handlers/ directory)
pub mod health;      // Health check endpoints (health.rs)
pub mod middleware;  // Custom middleware (middleware/ directory)
pub mod state;       // Application state management (state.rs)
