//! Configuration management for the pickup locator
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::error::LocatorError;
use crate::models::Coordinates;
use crate::scoring::ScoringWeights;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// Geocoding provider configuration
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    /// Weather provider configuration
    #[serde(default)]
    pub weather: WeatherConfig,
    /// Response cache and request de-duplication
    #[serde(default)]
    pub cache: CacheConfig,
    /// Venue scoring weights
    #[serde(default)]
    pub scoring: ScoringWeights,
    /// Default search settings
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Geocoding provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Google Geocoding API key; the primary geocoder is skipped without one
    pub google_api_key: Option<String>,
    #[serde(default = "default_google_base_url")]
    pub google_base_url: String,
    /// Use the keyless open geocoder
    #[serde(default = "default_provider_enabled")]
    pub nominatim_enabled: bool,
    #[serde(default = "default_nominatim_base_url")]
    pub nominatim_base_url: String,
    /// Fall back to zip code centroids
    #[serde(default = "default_provider_enabled")]
    pub postal_enabled: bool,
    #[serde(default = "default_postal_base_url")]
    pub postal_base_url: String,
    /// Per-provider timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u32,
    /// Retries for transient HTTP failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Weather provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key; Open-Meteo is used alone without one
    pub openweather_api_key: Option<String>,
    #[serde(default = "default_openweather_base_url")]
    pub openweather_base_url: String,
    #[serde(default = "default_open_meteo_base_url")]
    pub open_meteo_base_url: String,
    /// Per-provider timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Area whose weather is shown when venue coordinates are unusable
    #[serde(default)]
    pub default_location: DefaultLocationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultLocationConfig {
    #[serde(default = "default_location_name")]
    pub name: String,
    #[serde(default = "default_location_latitude")]
    pub latitude: f64,
    #[serde(default = "default_location_longitude")]
    pub longitude: f64,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Maximum number of cached responses
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    /// Cache TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
    /// Window in which identical requests share one provider call
    #[serde(default = "default_dedup_window")]
    pub dedup_window_ms: u64,
}

/// Default search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Search radius in kilometers
    #[serde(default = "default_max_distance")]
    pub max_distance_km: f64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_google_base_url() -> String {
    "https://maps.googleapis.com/maps/api/geocode".to_string()
}

fn default_nominatim_base_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_postal_base_url() -> String {
    "https://api.zippopotam.us".to_string()
}

fn default_openweather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_open_meteo_base_url() -> String {
    "https://api.open-meteo.com/v1".to_string()
}

fn default_provider_enabled() -> bool {
    true
}

fn default_provider_timeout() -> u32 {
    5
}

fn default_max_retries() -> u32 {
    1
}

fn default_location_name() -> String {
    "Gainesville, FL".to_string()
}

fn default_location_latitude() -> f64 {
    29.6516
}

fn default_location_longitude() -> f64 {
    -82.3248
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    256
}

fn default_cache_ttl() -> u64 {
    600
}

fn default_dedup_window() -> u64 {
    3000
}

fn default_max_distance() -> f64 {
    25.0
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            google_api_key: None,
            google_base_url: default_google_base_url(),
            nominatim_enabled: default_provider_enabled(),
            nominatim_base_url: default_nominatim_base_url(),
            postal_enabled: default_provider_enabled(),
            postal_base_url: default_postal_base_url(),
            timeout_seconds: default_provider_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            openweather_api_key: None,
            openweather_base_url: default_openweather_base_url(),
            open_meteo_base_url: default_open_meteo_base_url(),
            timeout_seconds: default_provider_timeout(),
            max_retries: default_max_retries(),
            default_location: DefaultLocationConfig::default(),
        }
    }
}

impl Default for DefaultLocationConfig {
    fn default() -> Self {
        Self {
            name: default_location_name(),
            latitude: default_location_latitude(),
            longitude: default_location_longitude(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            capacity: default_cache_capacity(),
            ttl_seconds: default_cache_ttl(),
            dedup_window_ms: default_dedup_window(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            max_distance_km: default_max_distance(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            geocoding: GeocodingConfig::default(),
            weather: WeatherConfig::default(),
            cache: CacheConfig::default(),
            scoring: ScoringWeights::default(),
            defaults: DefaultsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl GeocodingConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }
}

impl WeatherConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }
}

impl DefaultLocationConfig {
    pub fn coordinates(&self) -> crate::Result<Coordinates> {
        Coordinates::new(self.latitude, self.longitude)
    }
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    #[must_use]
    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }
}

impl LocatorConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. PICKUP_GEOCODING__TIMEOUT_SECONDS=3
        builder = builder.add_source(
            Environment::with_prefix("PICKUP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: LocatorConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_well_known_keys();
        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pickup-locator").join("config.toml"))
    }

    /// Fill missing API keys from the providers' conventional variables
    pub fn apply_well_known_keys(&mut self) {
        if self.geocoding.google_api_key.is_none() {
            self.geocoding.google_api_key = std::env::var("GOOGLE_MAPS_API_KEY").ok();
        }
        if self.weather.openweather_api_key.is_none() {
            self.weather.openweather_api_key = std::env::var("OPENWEATHER_API_KEY").ok();
        }
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.geocoding.timeout_seconds == 0 {
            self.geocoding.timeout_seconds = default_provider_timeout();
        }
        if self.weather.timeout_seconds == 0 {
            self.weather.timeout_seconds = default_provider_timeout();
        }
        if self.cache.capacity == 0 {
            self.cache.capacity = default_cache_capacity();
        }
        if self.defaults.max_distance_km <= 0.0 {
            self.defaults.max_distance_km = default_max_distance();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        // blank keys mean "not configured"
        if self.geocoding.google_api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            self.geocoding.google_api_key = None;
        }
        if self.weather.openweather_api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            self.weather.openweather_api_key = None;
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        self.scoring.validate()?;
        Ok(())
    }

    /// Validate API keys and credentials
    pub fn validate_api_keys(&self) -> Result<()> {
        let keys = [
            ("Google Geocoding", &self.geocoding.google_api_key),
            ("OpenWeatherMap", &self.weather.openweather_api_key),
        ];
        for (name, key) in keys {
            if let Some(key) = key {
                if key.len() < 8 {
                    return Err(LocatorError::config(format!(
                        "{name} API key appears to be invalid (too short). Please check your API key."
                    ))
                    .into());
                }
                if key.len() > 100 {
                    return Err(LocatorError::config(format!(
                        "{name} API key appears to be invalid (too long). Please check your API key."
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.geocoding.timeout_seconds > 60 || self.weather.timeout_seconds > 60 {
            return Err(LocatorError::config("Provider timeout cannot exceed 60 seconds").into());
        }

        if self.geocoding.max_retries > 5 || self.weather.max_retries > 5 {
            return Err(LocatorError::config("Provider max retries cannot exceed 5").into());
        }

        if self.cache.ttl_seconds > 24 * 60 * 60 {
            return Err(LocatorError::config("Cache TTL cannot exceed 24 hours").into());
        }

        if self.cache.capacity > 100_000 {
            return Err(LocatorError::config("Cache capacity cannot exceed 100000 entries").into());
        }

        if self.cache.dedup_window_ms > 60_000 {
            return Err(LocatorError::config("De-duplication window cannot exceed 60 seconds").into());
        }

        if !self.defaults.max_distance_km.is_finite() || self.defaults.max_distance_km > 500.0 {
            return Err(LocatorError::config("Search radius cannot exceed 500 km").into());
        }

        self.weather
            .default_location
            .coordinates()
            .map_err(|e| LocatorError::config(format!("Default weather location: {e}")))?;

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(LocatorError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(LocatorError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let urls = [
            (true, &self.geocoding.google_base_url),
            (self.geocoding.nominatim_enabled, &self.geocoding.nominatim_base_url),
            (self.geocoding.postal_enabled, &self.geocoding.postal_base_url),
            (true, &self.weather.openweather_base_url),
            (true, &self.weather.open_meteo_base_url),
        ];
        for (_, url) in urls.into_iter().filter(|(enabled, _)| *enabled) {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(LocatorError::config(format!(
                    "Provider base URL must be a valid HTTP or HTTPS URL: '{url}'"
                ))
                .into());
            }
        }

        Ok(())
    }
}
