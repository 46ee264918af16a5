//! Open-Meteo weather provider (no API key required)

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeDelta};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

use super::WeatherProvider;
use crate::Result;
use crate::http::{Fetched, get_json};
use crate::models::{Coordinates, WeatherCondition, WeatherReading};

const PROVIDER: &str = "open-meteo";
const VARIABLES: &str =
    "temperature_2m,relative_humidity_2m,precipitation,weather_code,wind_speed_10m";
const UNITS: &str = "temperature_unit=fahrenheit&wind_speed_unit=mph&timezone=auto";

/// Open-Meteo forecast/current client
pub struct OpenMeteoProvider {
    client: ClientWithMiddleware,
    base_url: String,
}

impl OpenMeteoProvider {
    pub fn new(client: ClientWithMiddleware, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    #[tracing::instrument(name = "open_meteo_forecast", level = "debug", skip(self))]
    async fn forecast(
        &self,
        coordinates: Coordinates,
        when_local: NaiveDateTime,
    ) -> Result<Option<WeatherReading>> {
        let url = format!(
            "{}/forecast?latitude={}&longitude={}&hourly={VARIABLES}&{UNITS}&forecast_days=16",
            self.base_url, coordinates.latitude, coordinates.longitude
        );

        match get_json::<ForecastResponse>(&self.client, PROVIDER, &url).await? {
            Fetched::Body(response) => Ok(response
                .hourly
                .and_then(|hourly| hourly.reading_near(when_local))),
            Fetched::NotFound => Ok(None),
        }
    }

    #[tracing::instrument(name = "open_meteo_current", level = "debug", skip(self))]
    async fn current(&self, coordinates: Coordinates) -> Result<Option<WeatherReading>> {
        let url = format!(
            "{}/forecast?latitude={}&longitude={}&current={VARIABLES}&{UNITS}",
            self.base_url, coordinates.latitude, coordinates.longitude
        );

        match get_json::<ForecastResponse>(&self.client, PROVIDER, &url).await? {
            Fetched::Body(response) => Ok(response.current.map(CurrentData::into_reading)),
            Fetched::NotFound => Ok(None),
        }
    }
}

/// Forecast/current response from Open-Meteo
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: Option<HourlyData>,
    current: Option<CurrentData>,
}

/// Hourly series; timestamps are local to the location (`timezone=auto`)
#[derive(Debug, Deserialize)]
struct HourlyData {
    time: Vec<String>,
    #[serde(rename = "temperature_2m")]
    temperature: Option<Vec<Option<f64>>>,
    #[serde(rename = "relative_humidity_2m")]
    humidity: Option<Vec<Option<f64>>>,
    precipitation: Option<Vec<Option<f64>>>,
    weather_code: Option<Vec<Option<u8>>>,
    #[serde(rename = "wind_speed_10m")]
    wind_speed: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct CurrentData {
    #[serde(rename = "temperature_2m")]
    temperature: f64,
    #[serde(rename = "relative_humidity_2m")]
    humidity: Option<f64>,
    precipitation: Option<f64>,
    weather_code: Option<u8>,
    #[serde(rename = "wind_speed_10m")]
    wind_speed: Option<f64>,
}

fn value_at(series: Option<&Vec<Option<f64>>>, index: usize) -> Option<f64> {
    series.and_then(|values| values.get(index).copied().flatten())
}

impl HourlyData {
    /// Reading for the hour closest to `when_local`, if within an hour of it
    fn reading_near(&self, when_local: NaiveDateTime) -> Option<WeatherReading> {
        let (index, _) = self
            .time
            .iter()
            .enumerate()
            .filter_map(|(i, time)| {
                NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M")
                    .ok()
                    .map(|t| (i, (t - when_local).abs()))
            })
            .filter(|(_, gap)| *gap <= TimeDelta::hours(1))
            .min_by_key(|(_, gap)| *gap)?;

        let temperature_f = value_at(self.temperature.as_ref(), index)?;
        let code = self
            .weather_code
            .as_ref()
            .and_then(|codes| codes.get(index).copied().flatten());

        Some(reading(
            temperature_f,
            code,
            value_at(self.humidity.as_ref(), index),
            value_at(self.wind_speed.as_ref(), index),
            value_at(self.precipitation.as_ref(), index),
        ))
    }
}

impl CurrentData {
    fn into_reading(self) -> WeatherReading {
        reading(
            self.temperature,
            self.weather_code,
            self.humidity,
            self.wind_speed,
            self.precipitation,
        )
    }
}

fn reading(
    temperature_f: f64,
    code: Option<u8>,
    humidity: Option<f64>,
    wind_speed: Option<f64>,
    precipitation: Option<f64>,
) -> WeatherReading {
    let (condition, description) = code.map_or(
        (WeatherCondition::Unknown, "Unknown"),
        |code| (weather_code_to_condition(code), weather_code_to_description(code)),
    );
    WeatherReading {
        temperature_f,
        condition,
        description: description.to_string(),
        humidity_pct: humidity.unwrap_or(0.0),
        wind_mph: wind_speed.unwrap_or(0.0),
        precipitation: precipitation.unwrap_or(0.0),
    }
}

/// Group a WMO weather code into a coarse condition
#[must_use]
pub fn weather_code_to_condition(code: u8) -> WeatherCondition {
    match code {
        0 | 1 => WeatherCondition::Clear,
        2 | 3 => WeatherCondition::Clouds,
        45 | 48 => WeatherCondition::Mist,
        51..=57 => WeatherCondition::Drizzle,
        61..=67 | 80..=82 => WeatherCondition::Rain,
        71..=77 | 85 | 86 => WeatherCondition::Snow,
        95..=99 => WeatherCondition::Thunderstorm,
        _ => WeatherCondition::Unknown,
    }
}

/// Convert a WMO weather code to a human-readable description
#[must_use]
pub fn weather_code_to_description(code: u8) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}
