//! # Configuration
//!
//! Settings are layered; later layers override earlier ones:
//! 1. Built-in defaults (the `Default` impl)
//! 2. `config.toml` in the working directory, when present
//! 3. `APP_`-prefixed environment variables, `__` between nested keys
//!    (`APP_SERVER__PORT`, `APP_AUDIO__TARGET_SAMPLE_RATE`, ...)
//! 4. Plain `HOST` / `PORT`, as set by most deployment platforms
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: The same structs round-trip through TOML, env vars and JSON
//! - **Result<T, E>**: Loading and validation can fail, and callers must handle it

use crate::audio::{DEFAULT_TARGET_SAMPLE_RATE, MAX_SAMPLE_RATE};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Everything the service reads at startup, one TOML table per field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub performance: PerformanceConfig,
}

/// Listen address. Use `host = "0.0.0.0"` to accept connections from other machines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Transcoding settings.
///
/// ## Fields:
/// - `target_sample_rate`: Output rate used when a request doesn't ask for one (Hz)
/// - `max_upload_bytes`: Largest recording accepted by the upload endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub target_sample_rate: u32,
    pub max_upload_bytes: usize,
}

/// Concurrency limits.
///
/// Each conversion holds the whole decoded recording in memory, so raising
/// `max_concurrent_conversions` trades memory for throughput.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub max_concurrent_conversions: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            audio: AudioConfig {
                target_sample_rate: DEFAULT_TARGET_SAMPLE_RATE,
                max_upload_bytes: 50 * 1024 * 1024,  // 50MB
            },
            performance: PerformanceConfig {
                max_concurrent_conversions: 10,
            },
        }
    }
}

impl AppConfig {
    /// Build the configuration from every layer listed in the module docs.
    ///
    /// ## Examples:
    /// - `APP_AUDIO__TARGET_SAMPLE_RATE=8000`: Telephony-rate output
    /// - `APP_PERFORMANCE__MAX_CONCURRENT_CONVERSIONS=4`: Smaller memory footprint
    /// - `PORT=3000`: Wins over everything else
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // required(false) means "don't error if missing"
            .add_source(config::File::with_name("config").required(false))
            // APP_SERVER__HOST becomes server.host; the nested keys contain
            // underscores themselves, so the prefix separator is set separately
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Reject settings the service can't run with:
    /// - Server port is not 0
    /// - Target sample rate is between 1 Hz and `MAX_SAMPLE_RATE`
    /// - Upload limit is not 0
    /// - At least one conversion may run at a time
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.audio.target_sample_rate == 0 {
            return Err(anyhow::anyhow!("Target sample rate must be greater than 0"));
        }

        if self.audio.target_sample_rate > MAX_SAMPLE_RATE {
            return Err(anyhow::anyhow!(
                "Target sample rate {} exceeds the {} Hz maximum",
                self.audio.target_sample_rate,
                MAX_SAMPLE_RATE
            ));
        }

        if self.audio.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        if self.performance.max_concurrent_conversions == 0 {
            return Err(anyhow::anyhow!("Max concurrent conversions must be greater than 0"));
        }

        Ok(())
    }

    /// Apply a partial runtime update from JSON, then validate the result.
    ///
    /// Only the fields present in the JSON change. For example,
    /// `{"audio": {"target_sample_rate": 8000}}` changes only the output rate.
    ///
    /// The concurrency limit is applied at startup, so a runtime change to
    /// `max_concurrent_conversions` takes effect on the next restart.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = u16::try_from(port)
                    .map_err(|_| anyhow::anyhow!("Server port out of range: {}", port))?;
            }
        }

        if let Some(audio) = partial_config.get("audio") {
            if let Some(rate) = audio.get("target_sample_rate").and_then(|v| v.as_u64()) {
                self.audio.target_sample_rate = u32::try_from(rate)
                    .map_err(|_| anyhow::anyhow!("Target sample rate out of range: {}", rate))?;
            }
            if let Some(limit) = audio.get("max_upload_bytes").and_then(|v| v.as_u64()) {
                self.audio.max_upload_bytes = limit as usize;
            }
        }

        if let Some(performance) = partial_config.get("performance") {
            if let Some(limit) = performance.get("max_concurrent_conversions").and_then(|v| v.as_u64()) {
                self.performance.max_concurrent_conversions = limit as usize;
            }
        }

        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.audio.target_sample_rate, 16000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.audio.target_sample_rate = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.performance.max_concurrent_conversions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_target_rate_upper_bound() {
        let mut config = AppConfig::default();
        config.audio.target_sample_rate = MAX_SAMPLE_RATE;
        assert!(config.validate().is_ok());

        config.audio.target_sample_rate = MAX_SAMPLE_RATE + 1;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        let json = r#"{"audio": {"target_sample_rate": 3000000000}}"#;
        assert!(config.update_from_json(json).is_err());
    }

    #[test]
    fn test_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"audio": {"target_sample_rate": 8000}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.audio.target_sample_rate, 8000);
        // Other fields should remain unchanged
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.audio.max_upload_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn test_config_update_rejects_invalid_values() {
        let mut config = AppConfig::default();
        assert!(config.update_from_json(r#"{"audio": {"target_sample_rate": 0}}"#).is_err());
        assert!(config.update_from_json(r#"{"server": {"port": 70000}}"#).is_err());
        assert!(config.update_from_json("not json").is_err());
    }
}
