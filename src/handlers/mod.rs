pub mod audio;
pub mod config;

pub use audio::*;
pub use config::*;

use crate::error::AppError;
use crate::health;
use actix_web::{web, HttpRequest};

/// Register every route of the service.
///
/// Kept apart from `main` so handler tests mount exactly what the server does.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health::health_check))
            .route("/metrics", web::get().to(health::detailed_metrics))
            .route("/config", web::get().to(get_config))
            .route("/config", web::put().to(update_config))
            .service(
                web::scope("/audio")
                    .route("/convert", web::post().to(convert_audio))
                    .route("/probe", web::post().to(probe_audio))
                    .route("/sniff", web::post().to(sniff_audio)),
            ),
    )
    // Also provide health check at root level for convenience
    .route("/health", web::get().to(health::health_check));
}

/// Fallback for unknown routes, so clients get the usual JSON error body.
pub async fn not_found(req: HttpRequest) -> Result<actix_web::HttpResponse, AppError> {
    Err(AppError::NotFound(format!("No route for {} {}", req.method(), req.path())))
}
