//! Weather snapshot model and the outdoor-play policy

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of the rule implemented by [`is_outdoor_friendly`]
pub const OUTDOOR_POLICY_VERSION: u32 = 1;

/// Coarse weather condition, shared by all providers
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherCondition {
    Clear,
    Clouds,
    Rain,
    Drizzle,
    Thunderstorm,
    Snow,
    Mist,
    Unknown,
}

impl WeatherCondition {
    /// Conditions that rule out outdoor play regardless of temperature
    #[must_use]
    pub fn is_severe(self) -> bool {
        matches!(self, WeatherCondition::Thunderstorm | WeatherCondition::Snow)
    }

    /// Map an OpenWeatherMap `weather[].main` group
    #[must_use]
    pub fn from_group(group: &str) -> Self {
        match group.to_ascii_lowercase().as_str() {
            "clear" => WeatherCondition::Clear,
            "clouds" => WeatherCondition::Clouds,
            "rain" => WeatherCondition::Rain,
            "drizzle" => WeatherCondition::Drizzle,
            "thunderstorm" => WeatherCondition::Thunderstorm,
            "snow" => WeatherCondition::Snow,
            "mist" | "fog" | "haze" | "smoke" | "dust" | "sand" | "ash" | "squall" | "tornado" => {
                WeatherCondition::Mist
            }
            _ => WeatherCondition::Unknown,
        }
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WeatherCondition::Clear => "Clear",
            WeatherCondition::Clouds => "Clouds",
            WeatherCondition::Rain => "Rain",
            WeatherCondition::Drizzle => "Drizzle",
            WeatherCondition::Thunderstorm => "Thunderstorm",
            WeatherCondition::Snow => "Snow",
            WeatherCondition::Mist => "Mist",
            WeatherCondition::Unknown => "Unknown",
        };
        write!(f, "{name}")
    }
}

/// Outdoor-play policy: mild temperature and no severe condition
#[must_use]
pub fn is_outdoor_friendly(temperature_f: f64, condition: WeatherCondition) -> bool {
    temperature_f > 40.0 && temperature_f < 95.0 && !condition.is_severe()
}

/// Raw observation as returned by a weather provider
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeatherReading {
    /// Temperature in Fahrenheit
    pub temperature_f: f64,
    pub condition: WeatherCondition,
    pub description: String,
    /// Relative humidity, 0-100
    pub humidity_pct: f64,
    /// Wind speed in mph
    pub wind_mph: f64,
    /// Precipitation in mm for the covered period
    pub precipitation: f64,
}

/// Where the data in a snapshot came from
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    /// Forecast for the requested time and place
    Forecast,
    /// Current conditions at the requested place, standing in for the requested time
    CurrentConditions,
    /// Current conditions at the configured default area
    DefaultArea,
    /// No provider answered
    Placeholder,
}

/// Weather summary used for game planning
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub temperature_f: f64,
    pub condition: WeatherCondition,
    pub description: String,
    pub humidity_pct: f64,
    pub wind_mph: f64,
    pub precipitation: f64,
    outdoor_friendly: bool,
    /// Advisory lines shown to the user verbatim
    pub alerts: Vec<String>,
    pub source: SnapshotSource,
}

impl WeatherSnapshot {
    /// Build a snapshot from a provider reading, deriving outdoor suitability
    #[must_use]
    pub fn from_reading(reading: WeatherReading, source: SnapshotSource, mut alerts: Vec<String>) -> Self {
        let outdoor_friendly = is_outdoor_friendly(reading.temperature_f, reading.condition);
        if reading.condition.is_severe() {
            alerts.push(format!(
                "{} expected: outdoor play not advised",
                reading.condition
            ));
        }
        Self {
            temperature_f: reading.temperature_f,
            condition: reading.condition,
            description: reading.description,
            humidity_pct: reading.humidity_pct,
            wind_mph: reading.wind_mph,
            precipitation: reading.precipitation,
            outdoor_friendly,
            alerts,
            source,
        }
    }

    /// Permissive stand-in used when no provider could answer
    #[must_use]
    pub fn placeholder(location_label: &str) -> Self {
        Self {
            temperature_f: 70.0,
            condition: WeatherCondition::Unknown,
            description: "Weather unavailable".to_string(),
            humidity_pct: 0.0,
            wind_mph: 0.0,
            precipitation: 0.0,
            outdoor_friendly: true,
            alerts: vec![format!(
                "Weather data is unavailable for {location_label}"
            )],
            source: SnapshotSource::Placeholder,
        }
    }

    /// Whether conditions suit outdoor play
    #[must_use]
    pub fn outdoor_friendly(&self) -> bool {
        self.outdoor_friendly
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.source == SnapshotSource::Placeholder
    }

    /// Format temperature with unit
    #[must_use]
    pub fn format_temperature(&self) -> String {
        format!("{:.0}°F", self.temperature_f)
    }
}
