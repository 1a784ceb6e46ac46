//! # Application State Management
//!
//! Shared state handed to every HTTP request handler.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc<RwLock<T>> Pattern
//! - **Arc**: Many handlers hold a reference to the same data
//! - **RwLock**: Many readers OR one writer at a time
//! - **Result**: Thread-safe shared mutable state without data races
//!
//! ### What is NOT shared
//! Audio buffers never live here. Each conversion owns its samples from decode
//! to encode; the state only carries configuration, counters, the (stateless)
//! transcoder and the concurrency limiter.

use crate::audio::Transcoder;
use crate::config::AppConfig;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::{AcquireError, Semaphore, SemaphorePermit};

/// The main application state that's shared across all HTTP request handlers.
///
/// ## Rust Concepts:
/// - **#[derive(Clone)]**: Cloning copies the `Arc`s, not the data behind them
/// - **Semaphore**: Caps how many conversions run at once; waiting requests
///   suspend instead of piling decoded audio into memory
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Request and conversion counters
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// The audio pipeline
    pub transcoder: Arc<Transcoder>,

    /// One permit per conversion allowed to run concurrently
    limiter: Arc<Semaphore>,

    /// When the server started
    pub start_time: Instant,
}

/// Metrics collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of error responses since server start
    pub error_count: u64,

    /// Conversions currently decoding/encoding
    pub active_conversions: u32,

    /// Conversions that produced a WAV file
    pub completed_conversions: u64,

    /// Conversions that ended in an error
    pub failed_conversions: u64,

    /// Compressed bytes received by conversion endpoints
    pub bytes_in: u64,

    /// WAV bytes returned by conversion endpoints
    pub bytes_out: u64,

    /// Key: endpoint (e.g., "POST /api/v1/audio/convert")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Detailed performance metrics for a specific API endpoint.
///
/// ## Performance calculations:
/// - **Average response time**: total_duration_ms / request_count
/// - **Error rate**: error_count / request_count
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

/// Marks one conversion as active for as long as it is alive.
///
/// ## Rust Concepts:
/// - **RAII guard**: The active count drops back in `Drop`, so a handler that
///   returns early with `?` can't leave the counter inflated
pub struct ConversionSlot<'a> {
    state: &'a AppState,
    _permit: SemaphorePermit<'a>,
}

impl Drop for ConversionSlot<'_> {
    fn drop(&mut self) {
        let mut metrics = self.state.metrics.write().unwrap();
        metrics.active_conversions = metrics.active_conversions.saturating_sub(1);
    }
}

impl AppState {
    /// Create a new AppState with the default symphonia-backed transcoder.
    pub fn new(config: AppConfig) -> Self {
        Self::with_transcoder(config, Transcoder::default())
    }

    /// Create a new AppState around a specific transcoder (tests swap the decoder).
    pub fn with_transcoder(config: AppConfig, transcoder: Transcoder) -> Self {
        let permits = config.performance.max_concurrent_conversions.max(1);

        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            transcoder: Arc::new(transcoder),
            limiter: Arc::new(Semaphore::new(permits)),
            start_time: Instant::now(),
        }
    }

    /// Get a copy of the current configuration.
    ///
    /// ## Why clone:
    /// Cloning releases the lock immediately, so other threads aren't blocked.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Replace the configuration after validating it.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap() = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Wait for a free conversion slot.
    ///
    /// The returned guard must be held for the whole conversion; dropping it
    /// frees the slot and decrements the active counter.
    pub async fn acquire_conversion_slot(&self) -> Result<ConversionSlot<'_>, AcquireError> {
        let permit = self.limiter.acquire().await?;
        self.metrics.write().unwrap().active_conversions += 1;
        Ok(ConversionSlot { state: self, _permit: permit })
    }

    /// Record the outcome of a finished conversion.
    pub fn record_conversion(&self, bytes_in: usize, bytes_out: Option<usize>) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.bytes_in += bytes_in as u64;

        match bytes_out {
            Some(bytes) => {
                metrics.completed_conversions += 1;
                metrics.bytes_out += bytes as u64;
            }
            None => metrics.failed_conversions += 1,
        }
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    /// Increment the total error counter (4xx and 5xx responses).
    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    ///
    /// The first time an endpoint is seen, `.or_default()` creates its entry.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    ///
    /// Cloning means the lock isn't held while the response is serialized.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().unwrap().clone()
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average response time for this endpoint.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate for this endpoint, from 0.0 (no errors) to 1.0 (all failed).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_conversion_slot_tracks_active_count() {
        let state = AppState::new(AppConfig::default());

        {
            let _slot = state.acquire_conversion_slot().await.unwrap();
            assert_eq!(state.get_metrics_snapshot().active_conversions, 1);
        }

        assert_eq!(state.get_metrics_snapshot().active_conversions, 0);
    }

    #[tokio::test]
    async fn test_limiter_caps_concurrency() {
        let mut config = AppConfig::default();
        config.performance.max_concurrent_conversions = 1;
        let state = AppState::new(config);

        let first = state.acquire_conversion_slot().await.unwrap();
        assert!(state.limiter.try_acquire().is_err());
        drop(first);
        assert!(state.limiter.try_acquire().is_ok());
    }

    #[test]
    fn test_record_conversion() {
        let state = AppState::new(AppConfig::default());
        state.record_conversion(1000, Some(3244));
        state.record_conversion(500, None);

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.completed_conversions, 1);
        assert_eq!(metrics.failed_conversions, 1);
        assert_eq!(metrics.bytes_in, 1500);
        assert_eq!(metrics.bytes_out, 3244);
    }

    #[test]
    fn test_endpoint_metrics() {
        let state = AppState::new(AppConfig::default());
        state.record_endpoint_request("POST /api/v1/audio/convert", 30, false);
        state.record_endpoint_request("POST /api/v1/audio/convert", 10, true);

        let metrics = state.get_metrics_snapshot();
        let endpoint = &metrics.endpoint_metrics["POST /api/v1/audio/convert"];
        assert_eq!(endpoint.average_duration_ms(), 20.0);
        assert_eq!(endpoint.error_rate(), 0.5);
    }

    #[test]
    fn test_update_config_validates() {
        let state = AppState::new(AppConfig::default());
        let mut bad = state.get_config();
        bad.audio.target_sample_rate = 0;
        assert!(state.update_config(bad).is_err());
        assert_eq!(state.get_config().audio.target_sample_rate, 16000);
    }
}
