//! # Symphonia Decoder
//!
//! Production [`AudioDecoder`] built on the `symphonia` demux/decode stack.
//!
//! ## Supported Inputs:
//! - **WAV**: PCM in RIFF
//! - **MP3**: MPEG layer III, with or without an ID3 tag
//! - **WebM / Matroska**: Vorbis tracks natively; Opus tracks when the crate
//!   is built with the `opus` feature (libopus)
//! - **Ogg / FLAC**: Whatever symphonia's registry handles
//!
//! ## Resource Handling:
//! The container reader and codec state live in a [`DecodeContext`] on a
//! blocking worker thread. The context is dropped (and logged) on every exit
//! path: success, decode failure, caller abandonment, even a panic unwinding
//! through the worker. If the awaiting future is dropped, a shared flag tells
//! the worker to stop at the next packet instead of decoding to the end.

use crate::audio::decoder::{AudioDecoder, DecodedAudio};
use crate::audio::error::{ConvertError, ConvertResult};
use crate::audio::format;
use async_trait::async_trait;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decoder backed by symphonia's default format and codec registries.
#[derive(Debug, Clone, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioDecoder for SymphoniaDecoder {
    async fn decode(&self, bytes: Vec<u8>) -> ConvertResult<DecodedAudio> {
        let cancelled = Arc::new(AtomicBool::new(false));
        // Flips the flag if this future is dropped before the worker finishes
        let _cancel_guard = CancelOnDrop(cancelled.clone());

        tokio::task::spawn_blocking(move || decode_blocking(bytes, &cancelled))
            .await
            .map_err(|e| ConvertError::Decode(format!("decoder task failed: {}", e)))?
    }
}

/// Signals the blocking worker when the awaiting future goes away.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Owns the native decoding state for a single recording.
///
/// ## Rust Concepts:
/// - **RAII**: Resources are released in `Drop`, so no exit path can forget
///   them, including `?` early returns and panics
struct DecodeContext {
    format: Box<dyn FormatReader>,
    decoder: PacketDecoder,
    track_id: u32,
}

impl DecodeContext {
    /// Probe the container and open a decoder for its first audio track.
    fn open(bytes: Vec<u8>) -> ConvertResult<Self> {
        let sniffed = format::sniff(&bytes);
        let mut hint = Hint::new();
        if let Some(extension) = sniffed.extension_hint() {
            hint.with_extension(extension);
        }

        let source = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
        let probed = symphonia::default::get_probe()
            .format(&hint, source, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| ConvertError::Decode(format!("unrecognised container ({}): {}", sniffed, e)))?;

        let format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| ConvertError::Decode("no supported audio track found".to_string()))?;

        let track_id = track.id;
        let decoder = PacketDecoder::for_track(&track.codec_params)?;

        debug!(container = %sniffed, track_id, "Opened decoding context");
        Ok(Self { format, decoder, track_id })
    }

    /// Decode every packet of the selected track into per-channel buffers.
    fn decode_all(&mut self, cancelled: &AtomicBool) -> ConvertResult<DecodedAudio> {
        let mut channels: Vec<Vec<f32>> = Vec::new();
        let mut sample_rate = self.decoder.declared_rate();
        let mut skipped_packets = 0usize;
        let mut last_skip_reason = None;

        loop {
            if cancelled.load(Ordering::Relaxed) {
                return Err(ConvertError::Decode("decode abandoned by caller".to_string()));
            }

            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(ConvertError::Decode(format!("failed to read packet: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet)? {
                PacketOutcome::Frames { rate, channel_count, interleaved } => {
                    sample_rate.get_or_insert(rate);
                    append_interleaved(&mut channels, &interleaved, channel_count);
                }
                PacketOutcome::Skipped(reason) => {
                    skipped_packets += 1;
                    last_skip_reason = Some(reason);
                }
            }
        }

        let frames = channels.first().map_or(0, Vec::len);
        if skipped_packets > 0 {
            warn!(skipped_packets, frames, "Skipped undecodable packets");
        }

        match sample_rate {
            Some(rate) if rate > 0 && (frames > 0 || skipped_packets == 0) => {
                Ok(DecodedAudio::new(channels, rate))
            }
            _ => Err(ConvertError::Decode(
                last_skip_reason.unwrap_or_else(|| "no audio frames decoded".to_string()),
            )),
        }
    }
}

impl Drop for DecodeContext {
    fn drop(&mut self) {
        debug!(track_id = self.track_id, "Released decoding context");
    }
}

fn decode_blocking(bytes: Vec<u8>, cancelled: &AtomicBool) -> ConvertResult<DecodedAudio> {
    let mut context = DecodeContext::open(bytes)?;
    context.decode_all(cancelled)
}

/// Split interleaved frames onto the end of per-channel buffers.
fn append_interleaved(channels: &mut Vec<Vec<f32>>, interleaved: &[f32], channel_count: usize) {
    if channel_count == 0 {
        return;
    }
    if channels.is_empty() {
        channels.resize_with(channel_count, Vec::new);
    }

    for frame in interleaved.chunks_exact(channel_count) {
        for (buffer, &sample) in channels.iter_mut().zip(frame) {
            buffer.push(sample);
        }
    }
}

/// Result of feeding one packet to a codec.
enum PacketOutcome {
    Frames {
        rate: u32,
        channel_count: usize,
        interleaved: Vec<f32>,
    },
    /// A corrupt packet the codec could step over
    Skipped(String),
}

/// Codec state for the selected track.
enum PacketDecoder {
    Native {
        decoder: Box<dyn Decoder>,
        declared_rate: Option<u32>,
    },
    #[cfg(feature = "opus")]
    Opus(opus_packets::OpusPacketDecoder),
}

impl PacketDecoder {
    fn for_track(params: &CodecParameters) -> ConvertResult<Self> {
        #[cfg(feature = "opus")]
        {
            if params.codec == symphonia::core::codecs::CODEC_TYPE_OPUS {
                return opus_packets::OpusPacketDecoder::new(params).map(PacketDecoder::Opus);
            }
        }

        let decoder = symphonia::default::get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|e| ConvertError::Decode(format!("unsupported codec: {}", e)))?;

        Ok(PacketDecoder::Native {
            decoder,
            declared_rate: params.sample_rate,
        })
    }

    fn declared_rate(&self) -> Option<u32> {
        match self {
            PacketDecoder::Native { declared_rate, .. } => *declared_rate,
            #[cfg(feature = "opus")]
            PacketDecoder::Opus(_) => Some(opus_packets::OPUS_RATE),
        }
    }

    fn decode(&mut self, packet: &Packet) -> ConvertResult<PacketOutcome> {
        match self {
            PacketDecoder::Native { decoder, .. } => {
                match decoder.decode(packet) {
                    Ok(decoded) => {
                        let spec = *decoded.spec();
                        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                        buffer.copy_interleaved_ref(decoded);
                        Ok(PacketOutcome::Frames {
                            rate: spec.rate,
                            channel_count: spec.channels.count(),
                            interleaved: buffer.samples().to_vec(),
                        })
                    }
                    Err(SymphoniaError::DecodeError(msg)) => Ok(PacketOutcome::Skipped(msg.to_string())),
                    Err(e) => Err(ConvertError::Decode(e.to_string())),
                }
            }
            #[cfg(feature = "opus")]
            PacketDecoder::Opus(decoder) => decoder.decode(&packet.data),
        }
    }
}

#[cfg(feature = "opus")]
mod opus_packets {
    use super::PacketOutcome;
    use crate::audio::error::{ConvertError, ConvertResult};
    use symphonia::core::codecs::CodecParameters;

    /// Opus always decodes at 48kHz internally; asking for it avoids a second resample.
    pub const OPUS_RATE: u32 = 48_000;

    /// Largest Opus frame: 120 ms at 48kHz.
    const MAX_FRAME: usize = 5_760;

    pub struct OpusPacketDecoder {
        decoder: opus::Decoder,
        channel_count: usize,
        buffer: Vec<f32>,
    }

    impl OpusPacketDecoder {
        pub fn new(params: &CodecParameters) -> ConvertResult<Self> {
            let channel_count = params.channels.map_or(1, |c| c.count());
            let channels = match channel_count {
                1 => opus::Channels::Mono,
                2 => opus::Channels::Stereo,
                n => {
                    return Err(ConvertError::Decode(format!(
                        "unsupported codec: multistream Opus with {} channels",
                        n
                    )))
                }
            };

            let decoder = opus::Decoder::new(OPUS_RATE, channels)
                .map_err(|e| ConvertError::Decode(format!("failed to create Opus decoder: {}", e)))?;

            Ok(Self {
                decoder,
                channel_count,
                buffer: vec![0.0; MAX_FRAME * channel_count],
            })
        }

        pub fn decode(&mut self, data: &[u8]) -> ConvertResult<PacketOutcome> {
            match self.decoder.decode_float(data, &mut self.buffer, false) {
                Ok(frames) => Ok(PacketOutcome::Frames {
                    rate: OPUS_RATE,
                    channel_count: self.channel_count,
                    interleaved: self.buffer[..frames * self.channel_count].to_vec(),
                }),
                Err(e) => Ok(PacketOutcome::Skipped(e.to_string())),
            }
        }
    }
}
