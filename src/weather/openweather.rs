//! OpenWeatherMap provider (requires an API key)

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeDelta};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

use super::WeatherProvider;
use crate::Result;
use crate::http::{Fetched, get_json};
use crate::models::{Coordinates, WeatherCondition, WeatherReading};

const PROVIDER: &str = "openweathermap";

/// OpenWeatherMap 5-day/3-hour forecast and current weather client
pub struct OpenWeatherProvider {
    client: ClientWithMiddleware,
    api_key: Option<String>,
    base_url: String,
}

impl OpenWeatherProvider {
    pub fn new(
        client: ClientWithMiddleware,
        api_key: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, endpoint: &str, coordinates: Coordinates) -> String {
        format!(
            "{}/{endpoint}?lat={}&lon={}&appid={}&units=imperial",
            self.base_url,
            coordinates.latitude,
            coordinates.longitude,
            urlencoding::encode(self.api_key.as_deref().unwrap_or_default())
        )
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[tracing::instrument(name = "openweather_forecast", level = "debug", skip(self))]
    async fn forecast(
        &self,
        coordinates: Coordinates,
        when_local: NaiveDateTime,
    ) -> Result<Option<WeatherReading>> {
        let url = self.url("forecast", coordinates);
        match get_json::<ForecastResponse>(&self.client, PROVIDER, &url).await? {
            Fetched::Body(response) => Ok(response.reading_near(when_local)),
            Fetched::NotFound => Ok(None),
        }
    }

    #[tracing::instrument(name = "openweather_current", level = "debug", skip(self))]
    async fn current(&self, coordinates: Coordinates) -> Result<Option<WeatherReading>> {
        let url = self.url("weather", coordinates);
        match get_json::<CurrentResponse>(&self.client, PROVIDER, &url).await? {
            Fetched::Body(response) => Ok(Some(response.into_reading())),
            Fetched::NotFound => Ok(None),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    list: Vec<ForecastEntry>,
    city: Option<City>,
}

#[derive(Debug, Deserialize)]
struct City {
    /// Offset from UTC in seconds
    #[serde(default)]
    timezone: i64,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    dt: i64,
    main: MainData,
    #[serde(default)]
    weather: Vec<Conditions>,
    wind: Option<Wind>,
    rain: Option<Precipitation>,
    snow: Option<Precipitation>,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    main: MainData,
    #[serde(default)]
    weather: Vec<Conditions>,
    wind: Option<Wind>,
    rain: Option<Precipitation>,
    snow: Option<Precipitation>,
}

#[derive(Debug, Deserialize)]
struct MainData {
    temp: f64,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Conditions {
    main: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: f64,
}

/// Precipitation volume in mm over the last hour or three hours
#[derive(Debug, Deserialize)]
struct Precipitation {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
    #[serde(rename = "3h")]
    three_hours: Option<f64>,
}

impl Precipitation {
    fn amount(&self) -> f64 {
        self.three_hours.or(self.one_hour).unwrap_or(0.0)
    }
}

impl ForecastResponse {
    /// Entry closest to `when_local`, if within three hours of it
    fn reading_near(self, when_local: NaiveDateTime) -> Option<WeatherReading> {
        let offset = self.city.map_or(0, |city| city.timezone);
        self.list
            .into_iter()
            .filter_map(|entry| {
                let local = DateTime::from_timestamp(entry.dt.checked_add(offset)?, 0)?.naive_utc();
                Some(((local - when_local).abs(), entry))
            })
            .filter(|(gap, _)| *gap <= TimeDelta::hours(3))
            .min_by_key(|(gap, _)| *gap)
            .map(|(_, entry)| {
                reading(
                    entry.main,
                    &entry.weather,
                    entry.wind,
                    entry.rain.as_ref().or(entry.snow.as_ref()),
                )
            })
    }
}

impl CurrentResponse {
    fn into_reading(self) -> WeatherReading {
        reading(
            self.main,
            &self.weather,
            self.wind,
            self.rain.as_ref().or(self.snow.as_ref()),
        )
    }
}

fn reading(
    main: MainData,
    weather: &[Conditions],
    wind: Option<Wind>,
    precipitation: Option<&Precipitation>,
) -> WeatherReading {
    let (condition, description) = weather.first().map_or_else(
        || (WeatherCondition::Unknown, "Unknown".to_string()),
        |w| (WeatherCondition::from_group(&w.main), w.description.clone()),
    );
    WeatherReading {
        temperature_f: main.temp,
        condition,
        description,
        humidity_pct: main.humidity.unwrap_or(0.0),
        wind_mph: wind.map_or(0.0, |w| w.speed),
        precipitation: precipitation.map_or(0.0, Precipitation::amount),
    }
}
