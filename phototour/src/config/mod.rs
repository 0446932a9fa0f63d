//! Tour configuration.
//!
//! All playback and storage constants live in `TourConfig`, with defaults
//! matching the shipped behavior and an INI file loader for overrides:
//!
//! ```ini
//! [tour]
//! station_dwell_ms = 1500
//! popup_duration_ms = 1400
//! base_leg_duration_ms = 1000
//! arrival_threshold_m = 500
//! tick_interval_ms = 100
//!
//! [storage]
//! images_bucket = images
//! thumbnails_bucket = thumbnails
//! signed_url_expiry_secs = 3600
//!
//! [cache]
//! url_ttl_secs = 3000
//! ```

use std::path::Path;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::tour::{
    DEFAULT_ARRIVAL_THRESHOLD_M, DEFAULT_BASE_LEG_DURATION, DEFAULT_POPUP_DURATION,
    DEFAULT_STATION_DWELL, DEFAULT_TICK_INTERVAL,
};

/// Default signed-URL validity requested from the storage service.
pub const DEFAULT_SIGNED_URL_EXPIRY_SECS: u64 = 3600;

/// Default resolved-URL cache TTL: 50 minutes.
pub const DEFAULT_URL_TTL_SECS: u64 = 50 * 60;

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read or parsed.
    #[error("Failed to load config file: {0}")]
    Load(String),

    /// A setting has an unusable value.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// All tunable constants of the tour engine.
#[derive(Debug, Clone)]
pub struct TourConfig {
    /// Pause at each interior waypoint.
    pub station_dwell: Duration,
    /// Auto-close delay for playback popups.
    pub popup_duration: Duration,
    /// Nominal per-leg animation time before distance scaling.
    pub base_leg_duration: Duration,
    /// Arrival proximity in meters.
    pub arrival_threshold_m: f64,
    /// Marker position update interval.
    pub tick_interval: Duration,
    /// Bucket holding full-size images.
    pub images_bucket: String,
    /// Bucket holding thumbnails.
    pub thumbnails_bucket: String,
    /// Validity window requested for each signed URL.
    pub signed_url_expiry_secs: u64,
    /// Resolved-URL cache freshness window. Must stay below the signed
    /// URL expiry so a cached URL is never handed out near death.
    pub url_ttl: Duration,
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            station_dwell: DEFAULT_STATION_DWELL,
            popup_duration: DEFAULT_POPUP_DURATION,
            base_leg_duration: DEFAULT_BASE_LEG_DURATION,
            arrival_threshold_m: DEFAULT_ARRIVAL_THRESHOLD_M,
            tick_interval: DEFAULT_TICK_INTERVAL,
            images_bucket: "images".to_string(),
            thumbnails_bucket: "thumbnails".to_string(),
            signed_url_expiry_secs: DEFAULT_SIGNED_URL_EXPIRY_SECS,
            url_ttl: Duration::from_secs(DEFAULT_URL_TTL_SECS),
        }
    }
}

impl TourConfig {
    /// Load configuration from an INI file, with defaults for anything
    /// not present.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Load(e.to_string()))?;
        let mut config = Self::default();

        if let Some(tour) = ini.section(Some("tour")) {
            if let Some(ms) = parse_key(tour.get("station_dwell_ms"), "station_dwell_ms")? {
                config.station_dwell = Duration::from_millis(ms);
            }
            if let Some(ms) = parse_key(tour.get("popup_duration_ms"), "popup_duration_ms")? {
                config.popup_duration = Duration::from_millis(ms);
            }
            if let Some(ms) = parse_key(tour.get("base_leg_duration_ms"), "base_leg_duration_ms")? {
                config.base_leg_duration = Duration::from_millis(ms);
            }
            if let Some(m) = parse_key(tour.get("arrival_threshold_m"), "arrival_threshold_m")? {
                config.arrival_threshold_m = m as f64;
            }
            if let Some(ms) = parse_key(tour.get("tick_interval_ms"), "tick_interval_ms")? {
                config.tick_interval = Duration::from_millis(ms);
            }
        }

        if let Some(storage) = ini.section(Some("storage")) {
            if let Some(bucket) = storage.get("images_bucket") {
                config.images_bucket = bucket.to_string();
            }
            if let Some(bucket) = storage.get("thumbnails_bucket") {
                config.thumbnails_bucket = bucket.to_string();
            }
            if let Some(secs) =
                parse_key(storage.get("signed_url_expiry_secs"), "signed_url_expiry_secs")?
            {
                config.signed_url_expiry_secs = secs;
            }
        }

        if let Some(cache) = ini.section(Some("cache")) {
            if let Some(secs) = parse_key(cache.get("url_ttl_secs"), "url_ttl_secs")? {
                config.url_ttl = Duration::from_secs(secs);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-setting invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_leg_duration.is_zero() {
            return Err(ConfigError::Invalid(
                "base_leg_duration_ms must be positive".to_string(),
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.arrival_threshold_m <= 0.0 {
            return Err(ConfigError::Invalid(
                "arrival_threshold_m must be positive".to_string(),
            ));
        }
        if self.url_ttl.as_secs() >= self.signed_url_expiry_secs {
            return Err(ConfigError::Invalid(format!(
                "url_ttl_secs ({}) must be below signed_url_expiry_secs ({})",
                self.url_ttl.as_secs(),
                self.signed_url_expiry_secs
            )));
        }
        if self.images_bucket.is_empty() || self.thumbnails_bucket.is_empty() {
            return Err(ConfigError::Invalid(
                "bucket names must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the popup auto-close delay.
    pub fn with_popup_duration(mut self, duration: Duration) -> Self {
        self.popup_duration = duration;
        self
    }

    /// Set the station dwell.
    pub fn with_station_dwell(mut self, duration: Duration) -> Self {
        self.station_dwell = duration;
        self
    }

    /// Set the nominal per-leg duration.
    pub fn with_base_leg_duration(mut self, duration: Duration) -> Self {
        self.base_leg_duration = duration;
        self
    }

    /// Set the resolved-URL cache TTL.
    pub fn with_url_ttl(mut self, ttl: Duration) -> Self {
        self.url_ttl = ttl;
        self
    }
}

fn parse_key(value: Option<&str>, key: &str) -> Result<Option<u64>, ConfigError> {
    match value {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{} must be a number, got '{}'", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_shipped_constants() {
        let config = TourConfig::default();
        assert_eq!(config.station_dwell, Duration::from_millis(1500));
        assert_eq!(config.popup_duration, Duration::from_millis(1400));
        assert_eq!(config.base_leg_duration, Duration::from_millis(1000));
        assert_eq!(config.arrival_threshold_m, 500.0);
        assert_eq!(config.url_ttl, Duration::from_secs(3000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ttl_default_is_below_signed_expiry() {
        let config = TourConfig::default();
        assert!(config.url_ttl.as_secs() < config.signed_url_expiry_secs);
    }

    #[test]
    fn test_load_from_file_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[tour]\nstation_dwell_ms = 800\npopup_duration_ms = 900\n\n\
             [storage]\nimages_bucket = photos\n\n[cache]\nurl_ttl_secs = 120"
        )
        .unwrap();

        let config = TourConfig::from_file(file.path()).unwrap();
        assert_eq!(config.station_dwell, Duration::from_millis(800));
        assert_eq!(config.popup_duration, Duration::from_millis(900));
        assert_eq!(config.images_bucket, "photos");
        assert_eq!(config.url_ttl, Duration::from_secs(120));
        // Untouched keys keep defaults
        assert_eq!(config.base_leg_duration, Duration::from_millis(1000));
    }

    #[test]
    fn test_load_rejects_non_numeric_value() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tour]\nstation_dwell_ms = soon").unwrap();

        let result = TourConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let result = TourConfig::from_file(Path::new("/nonexistent/tour.ini"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_validate_rejects_ttl_at_or_above_expiry() {
        let config = TourConfig {
            url_ttl: Duration::from_secs(3600),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_leg_duration() {
        let config = TourConfig::default().with_base_leg_duration(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builders() {
        let config = TourConfig::default()
            .with_popup_duration(Duration::from_millis(10))
            .with_station_dwell(Duration::from_millis(20))
            .with_url_ttl(Duration::from_secs(5));
        assert_eq!(config.popup_duration, Duration::from_millis(10));
        assert_eq!(config.station_dwell, Duration::from_millis(20));
        assert_eq!(config.url_ttl, Duration::from_secs(5));
    }
}
