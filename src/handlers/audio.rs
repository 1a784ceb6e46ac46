//! # Audio Upload Handlers
//!
//! HTTP front door for the transcoder. Every endpoint takes a
//! `multipart/form-data` upload with the recording in a field named `audio`.
//!
//! ## Endpoints:
//! - `POST /api/v1/audio/convert?sample_rate=N`: Returns the WAV bytes (`audio/wav`)
//! - `POST /api/v1/audio/probe`: Returns the recording's native layout as JSON
//! - `POST /api/v1/audio/sniff`: Returns the detected container, without decoding
//!
//! ## Backpressure:
//! Decoding holds the whole recording in memory, so `convert` and `probe` wait
//! for a slot from the state's limiter before touching the decoder.

use crate::audio::{needs_conversion, ConvertError, WavFile};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_multipart::{Field, Multipart};
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};
use futures_util::stream::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

/// Name of the multipart field that carries the recording.
pub const AUDIO_FIELD: &str = "audio";

/// Query parameters accepted by the convert endpoint.
#[derive(Debug, Deserialize)]
pub struct ConvertQuery {
    /// Output rate in Hz; the configured `audio.target_sample_rate` when absent
    pub sample_rate: Option<u32>,
}

/// A recording pulled out of a multipart form.
#[derive(Debug)]
struct Upload {
    bytes: Vec<u8>,
    filename: Option<String>,
}

impl Upload {
    /// Download name for the converted file: the upload's stem with a `.wav` extension.
    fn wav_filename(&self) -> String {
        let stem: String = self
            .filename
            .as_deref()
            .and_then(|name| name.rsplit_once('.').map(|(stem, _)| stem).or(Some(name)))
            .unwrap_or("recording")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
            .collect();

        if stem.is_empty() {
            "recording.wav".to_string()
        } else {
            format!("{}.wav", stem)
        }
    }
}

/// Convert an uploaded recording into mono 16-bit PCM WAV.
///
/// ## Response:
/// - **200** with `Content-Type: audio/wav` and the WAV file as the body
/// - **400** when the upload is missing, too large or unreadable, or when
///   `sample_rate` is 0 or above `MAX_SAMPLE_RATE`
/// - **422** when the recording can't be decoded
pub async fn convert_audio(
    state: web::Data<AppState>,
    query: web::Query<ConvertQuery>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let config = state.get_config();
    let target_sample_rate = query.sample_rate.unwrap_or(config.audio.target_sample_rate);

    let upload = read_audio_field(payload, config.audio.max_upload_bytes).await?;
    let download_name = upload.wav_filename();
    let bytes_in = upload.bytes.len();

    let result = {
        let _slot = state
            .acquire_conversion_slot()
            .await
            .map_err(|e| AppError::Internal(format!("Conversion limiter closed: {}", e)))?;
        state.transcoder.convert(upload.bytes, target_sample_rate).await
    };

    state.record_conversion(bytes_in, result.as_ref().ok().map(WavFile::len));
    let wav_file = result?;

    info!(
        filename = %download_name,
        bytes_in,
        bytes_out = wav_file.len(),
        target_sample_rate,
        "Served converted recording"
    );

    Ok(HttpResponse::Ok()
        .content_type("audio/wav")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(download_name)],
        })
        .body(wav_file.into_bytes()))
}

/// Report a recording's native sample rate, channel count and duration.
pub async fn probe_audio(state: web::Data<AppState>, payload: Multipart) -> AppResult<HttpResponse> {
    let max_upload_bytes = state.get_config().audio.max_upload_bytes;
    let upload = read_audio_field(payload, max_upload_bytes).await?;
    let size_bytes = upload.bytes.len();

    let metadata = {
        let _slot = state
            .acquire_conversion_slot()
            .await
            .map_err(|e| AppError::Internal(format!("Conversion limiter closed: {}", e)))?;
        state.transcoder.probe(upload.bytes).await?
    };

    Ok(HttpResponse::Ok().json(json!({
        "filename": upload.filename,
        "size_bytes": size_bytes,
        "metadata": metadata,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Identify the container from its magic bytes. Never decodes, never fails on content.
pub async fn sniff_audio(state: web::Data<AppState>, payload: Multipart) -> AppResult<HttpResponse> {
    let max_upload_bytes = state.get_config().audio.max_upload_bytes;
    let upload = read_audio_field(payload, max_upload_bytes).await?;
    let format = state.transcoder.sniff_format(&upload.bytes);

    Ok(HttpResponse::Ok().json(json!({
        "format": format,
        "mime_type": format.mime_type(),
        "needs_conversion": needs_conversion(format.mime_type()),
        "size_bytes": upload.bytes.len()
    })))
}

/// Pull the `audio` field out of a multipart form.
///
/// Other fields are skipped. The size cap is enforced while streaming, so an
/// oversized upload is rejected before it is fully buffered.
async fn read_audio_field(mut payload: Multipart, max_bytes: usize) -> AppResult<Upload> {
    let mut upload: Option<Upload> = None;

    while let Some(item) = payload.next().await {
        let mut field: Field = item.map_err(|e| AppError::ValidationError(format!("Multipart error: {}", e)))?;

        let content_disposition = field
            .content_disposition()
            .ok_or_else(|| AppError::ValidationError("Missing content disposition".to_string()))?;

        let field_name = content_disposition
            .get_name()
            .ok_or_else(|| AppError::ValidationError("Missing field name".to_string()))?
            .to_owned();

        if field_name != AUDIO_FIELD {
            debug!(field = %field_name, "Skipping multipart field");
            continue;
        }

        let filename = content_disposition.get_filename().map(str::to_owned);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ConvertError::Read(e.to_string()))?;

            if bytes.len() + chunk.len() > max_bytes {
                return Err(AppError::ValidationError(format!(
                    "File too large: more than {} bytes",
                    max_bytes
                )));
            }

            bytes.extend_from_slice(&chunk);
        }

        upload = Some(Upload { bytes, filename });
    }

    upload.ok_or_else(|| AppError::ValidationError("No audio file provided".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{wav, WavInfo};
    use crate::config::AppConfig;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};

    const BOUNDARY: &str = "audio-transcoder-test-boundary";

    fn multipart_request(uri: &str, field: &str, bytes: &[u8]) -> test::TestRequest {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"clip.webm\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        test::TestRequest::post()
            .uri(uri)
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
    }

    /// 0.1 s of a constant 0.5 signal at 32 kHz, as a real WAV file.
    fn recording() -> Vec<u8> {
        wav::encode(&vec![0.5; 3200], 32_000).into_bytes()
    }

    macro_rules! service {
        ($config:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(AppState::new($config)))
                    .configure(crate::handlers::configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_convert_returns_wav() {
        let app = service!(AppConfig::default());
        let req = multipart_request("/api/v1/audio/convert?sample_rate=16000", AUDIO_FIELD, &recording());

        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "audio/wav");
        assert!(resp
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("clip.wav"));

        let body = test::read_body(resp).await;
        assert_eq!(body.len(), 44 + 1600 * 2);

        let info = WavInfo::parse(&body).unwrap();
        assert_eq!(info.sample_rate, 16_000);
        assert_eq!(info.channels, 1);
        assert!(info.samples.iter().all(|&s| (s - 16384).abs() <= 1));
    }

    #[actix_web::test]
    async fn test_convert_uses_configured_rate() {
        let mut config = AppConfig::default();
        config.audio.target_sample_rate = 8_000;
        let app = service!(config);
        let req = multipart_request("/api/v1/audio/convert", AUDIO_FIELD, &recording());

        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = test::read_body(resp).await;
        assert_eq!(WavInfo::parse(&body).unwrap().samples.len(), 800);
    }

    #[actix_web::test]
    async fn test_convert_rejects_zero_rate() {
        let app = service!(AppConfig::default());
        let req = multipart_request("/api/v1/audio/convert?sample_rate=0", AUDIO_FIELD, &recording());

        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_convert_rejects_oversized_rate() {
        let app = service!(AppConfig::default());

        for uri in [
            "/api/v1/audio/convert?sample_rate=3000000000",
            "/api/v1/audio/convert?sample_rate=384001",
        ] {
            let req = multipart_request(uri, AUDIO_FIELD, &recording());
            let resp = test::call_service(&app, req.to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);

            let body: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(body["error"]["type"], "validation_error");
        }
    }

    #[actix_web::test]
    async fn test_undecodable_upload_is_unprocessable() {
        let app = service!(AppConfig::default());
        let garbage = b"this is a text file pretending to be audio".repeat(20);
        let req = multipart_request("/api/v1/audio/convert", AUDIO_FIELD, &garbage);

        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "decode_error");
    }

    #[actix_web::test]
    async fn test_missing_audio_field() {
        let app = service!(AppConfig::default());
        let req = multipart_request("/api/v1/audio/convert", "file", &recording());

        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_upload_size_cap() {
        let mut config = AppConfig::default();
        config.audio.max_upload_bytes = 64;
        let app = service!(config);
        let req = multipart_request("/api/v1/audio/convert", AUDIO_FIELD, &recording());

        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_probe_returns_metadata() {
        let app = service!(AppConfig::default());
        let req = multipart_request("/api/v1/audio/probe", AUDIO_FIELD, &recording());

        let body: serde_json::Value = test::call_and_read_body_json(&app, req.to_request()).await;
        assert_eq!(body["metadata"]["sample_rate"], 32_000);
        assert_eq!(body["metadata"]["channel_count"], 1);
        assert_eq!(body["metadata"]["sample_count"], 3200);
        assert_eq!(body["metadata"]["format"], "wav");
        assert_eq!(body["filename"], "clip.webm");
    }

    #[actix_web::test]
    async fn test_sniff_webm() {
        let app = service!(AppConfig::default());
        let header_bytes = [0x1A, 0x45, 0xDF, 0xA3, 0x9F, 0x42, 0x86, 0x81];
        let req = multipart_request("/api/v1/audio/sniff", AUDIO_FIELD, &header_bytes);

        let body: serde_json::Value = test::call_and_read_body_json(&app, req.to_request()).await;
        assert_eq!(body["format"], "webm");
        assert_eq!(body["mime_type"], "audio/webm");
        assert_eq!(body["needs_conversion"], true);
    }

    #[actix_web::test]
    async fn test_wav_filename() {
        let named = |name: Option<&str>| Upload { bytes: Vec::new(), filename: name.map(str::to_owned) };

        assert_eq!(named(Some("memo.webm")).wav_filename(), "memo.wav");
        assert_eq!(named(Some("take\"2\".mp3")).wav_filename(), "take2.wav");
        assert_eq!(named(Some("noext")).wav_filename(), "noext.wav");
        assert_eq!(named(None).wav_filename(), "recording.wav");
        assert_eq!(named(Some("???.ogg")).wav_filename(), "recording.wav");
    }
}
