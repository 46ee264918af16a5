//! Weather lookup for a place and a future local time
//!
//! Providers are tried in order for each step of the chain: forecast for the
//! requested hour, current conditions as a same-day approximation, current
//! conditions at the default area when the coordinates are unusable, and finally
//! a permissive placeholder. The lookup itself never fails.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;
use crate::cache::ResponseCache;
use crate::chain::{Attempt, attempt};
use crate::inflight::InFlight;
use crate::models::{
    Coordinates, OUTDOOR_POLICY_VERSION, SnapshotSource, WeatherReading, WeatherSnapshot,
};

pub mod open_meteo;
pub mod openweather;

pub use open_meteo::OpenMeteoProvider;
pub use openweather::OpenWeatherProvider;

/// A single weather backend
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Unconfigured providers are skipped without a network call
    fn is_configured(&self) -> bool {
        true
    }

    /// Forecast for the hour nearest `when_local`; `None` when beyond the horizon
    async fn forecast(
        &self,
        coordinates: Coordinates,
        when_local: NaiveDateTime,
    ) -> Result<Option<WeatherReading>>;

    /// Conditions right now
    async fn current(&self, coordinates: Coordinates) -> Result<Option<WeatherReading>>;
}

/// Anything that can produce a weather snapshot for ranking
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn forecast_for(
        &self,
        coordinates: Coordinates,
        when_local: NaiveDateTime,
        cancel: &CancellationToken,
    ) -> WeatherSnapshot;
}

/// Fallback area used when the requested coordinates are unusable
#[derive(Debug, Clone)]
pub struct DefaultArea {
    pub name: String,
    pub coordinates: Coordinates,
}

#[derive(Clone, Copy)]
enum Step {
    Forecast(NaiveDateTime),
    Current,
}

#[derive(Clone)]
struct LookupInner {
    providers: Vec<Arc<dyn WeatherProvider>>,
    timeout: Duration,
    default_area: Option<DefaultArea>,
    cache: Option<Arc<ResponseCache>>,
}

/// Weather chain with optional caching and in-flight de-duplication
pub struct WeatherLookup {
    inner: Arc<LookupInner>,
    inflight: InFlight<String, WeatherSnapshot>,
}

impl WeatherLookup {
    /// Providers are tried in the given order; each call gets `timeout`
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn WeatherProvider>>, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(LookupInner {
                providers,
                timeout,
                default_area: None,
                cache: None,
            }),
            inflight: InFlight::new(Duration::ZERO),
        }
    }

    #[must_use]
    pub fn with_default_area(mut self, name: impl Into<String>, coordinates: Coordinates) -> Self {
        Arc::make_mut(&mut self.inner).default_area = Some(DefaultArea {
            name: name.into(),
            coordinates,
        });
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        Arc::make_mut(&mut self.inner).cache = Some(cache);
        self
    }

    /// Share identical lookups started within `window`
    #[must_use]
    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.inflight = InFlight::new(window);
        self
    }

    /// Exact coordinates and time, so only identical lookups share a result
    fn cache_key(coordinates: Coordinates, when_local: NaiveDateTime) -> String {
        format!(
            "weather:{}:{}:{when_local:?}",
            coordinates.latitude, coordinates.longitude
        )
    }
}

#[async_trait]
impl ForecastSource for WeatherLookup {
    #[tracing::instrument(name = "forecast_for", level = "debug", skip(self, cancel))]
    async fn forecast_for(
        &self,
        coordinates: Coordinates,
        when_local: NaiveDateTime,
        cancel: &CancellationToken,
    ) -> WeatherSnapshot {
        let label = coordinates.format_pair();
        if cancel.is_cancelled() {
            return WeatherSnapshot::placeholder(&label);
        }

        let key = Self::cache_key(coordinates, when_local);
        if let Some(cache) = &self.inner.cache {
            match cache.get::<WeatherSnapshot>(&key) {
                Ok(Some(snapshot)) => return snapshot,
                Ok(None) => {}
                Err(e) => debug!(error = %e, "Ignoring unreadable cache entry"),
            }
        }

        let inner = Arc::clone(&self.inner);
        let lookup = self.inflight.run(key.clone(), move || async move {
            inner.lookup(coordinates, when_local, &key).await
        });

        tokio::select! {
            () = cancel.cancelled() => {
                info!("Weather lookup cancelled");
                WeatherSnapshot::placeholder(&label)
            }
            snapshot = lookup => snapshot,
        }
    }
}

impl LookupInner {
    async fn lookup(
        &self,
        coordinates: Coordinates,
        when_local: NaiveDateTime,
        key: &str,
    ) -> WeatherSnapshot {
        let snapshot = self.run_chain(coordinates, when_local).await;
        debug!(
            source = ?snapshot.source,
            outdoor_friendly = snapshot.outdoor_friendly(),
            policy_version = OUTDOOR_POLICY_VERSION,
            "Weather snapshot ready"
        );

        if !snapshot.is_placeholder()
            && let Some(cache) = &self.cache
            && let Err(e) = cache.put(key, snapshot.clone())
        {
            warn!(error = %e, "Failed to cache weather snapshot");
        }
        snapshot
    }

    async fn run_chain(&self, coordinates: Coordinates, when_local: NaiveDateTime) -> WeatherSnapshot {
        if coordinates.is_valid() {
            if let Some(reading) = self.first_reading(coordinates, Step::Forecast(when_local)).await {
                return WeatherSnapshot::from_reading(reading, SnapshotSource::Forecast, Vec::new());
            }

            if let Some(reading) = self.first_reading(coordinates, Step::Current).await {
                let alert = format!(
                    "No forecast available for {}; showing current conditions as a same-day approximation",
                    when_local.format("%Y-%m-%d %H:%M")
                );
                return WeatherSnapshot::from_reading(
                    reading,
                    SnapshotSource::CurrentConditions,
                    vec![alert],
                );
            }
        } else if let Some(area) = &self.default_area {
            warn!(
                latitude = coordinates.latitude,
                longitude = coordinates.longitude,
                "Unusable coordinates, using the default area"
            );
            if let Some(reading) = self.first_reading(area.coordinates, Step::Current).await {
                let alert = format!(
                    "Weather shown is for {}, a nearby default area, not the venue itself",
                    area.name
                );
                return WeatherSnapshot::from_reading(reading, SnapshotSource::DefaultArea, vec![alert]);
            }
        }

        warn!("No weather provider answered, using placeholder");
        WeatherSnapshot::placeholder(&coordinates.format_pair())
    }

    async fn first_reading(&self, coordinates: Coordinates, step: Step) -> Option<WeatherReading> {
        // Shared runs outlive any single caller, so callers cancel by abandoning the wait.
        let never = CancellationToken::new();

        for provider in self.providers.iter().filter(|p| p.is_configured()) {
            let call = match step {
                Step::Forecast(when_local) => provider.forecast(coordinates, when_local),
                Step::Current => provider.current(coordinates),
            };
            match attempt(provider.name(), self.timeout, &never, call).await {
                Ok(Attempt::Found(reading)) => {
                    debug!(provider = provider.name(), "Weather provider answered");
                    return Some(reading);
                }
                Ok(Attempt::NoMatch | Attempt::Failed(_)) => {}
                Err(_) => return None,
            }
        }
        None
    }
}
