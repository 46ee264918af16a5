//! Single entry point: resolve, fetch weather, gather candidates, rank

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;
use crate::cache::ResponseCache;
use crate::candidates::CandidateProvider;
use crate::config::LocatorConfig;
use crate::error::LocatorError;
use crate::geocoding::{
    GeocodeProvider, GeocodeResolver, GoogleGeocoder, NominatimGeocoder, PostalLookup,
};
use crate::http::build_client;
use crate::models::{LocationQuery, ResolvedLocation, VenueFilters, VenueRecommendation, WeatherSnapshot};
use crate::scoring::{ScoringWeights, VenueScorer};
use crate::weather::{ForecastSource, OpenMeteoProvider, OpenWeatherProvider, WeatherLookup};

/// Everything a caller needs to plan a game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub location: ResolvedLocation,
    /// Weather at the resolved location for the requested time
    pub weather: WeatherSnapshot,
    pub recommendations: Vec<VenueRecommendation>,
}

pub struct RecommendationFacade {
    resolver: GeocodeResolver,
    weather: Arc<dyn ForecastSource>,
    scorer: VenueScorer,
}

impl RecommendationFacade {
    #[must_use]
    pub fn new(
        resolver: GeocodeResolver,
        weather: Arc<dyn ForecastSource>,
        weights: ScoringWeights,
        default_max_distance_km: f64,
    ) -> Self {
        let scorer = VenueScorer::new(weights, default_max_distance_km, Arc::clone(&weather));
        Self {
            resolver,
            weather,
            scorer,
        }
    }

    /// Wire the HTTP providers, cache and de-duplication described by `config`
    pub fn from_config(config: &LocatorConfig) -> anyhow::Result<Self> {
        let cache = if config.cache.enabled {
            Some(Arc::new(ResponseCache::new(
                config.cache.capacity,
                config.cache.ttl(),
            )?))
        } else {
            None
        };

        let geocoding = &config.geocoding;
        let client = build_client(geocoding.timeout(), geocoding.max_retries)?;
        let mut geocoders: Vec<Arc<dyn GeocodeProvider>> = vec![Arc::new(GoogleGeocoder::new(
            client.clone(),
            geocoding.google_api_key.clone(),
            &geocoding.google_base_url,
        ))];
        if geocoding.nominatim_enabled {
            geocoders.push(Arc::new(NominatimGeocoder::new(
                client.clone(),
                &geocoding.nominatim_base_url,
            )));
        }
        if geocoding.postal_enabled {
            geocoders.push(Arc::new(PostalLookup::new(client, &geocoding.postal_base_url)));
        }
        let mut resolver = GeocodeResolver::new(geocoders, geocoding.timeout())
            .with_dedup_window(config.cache.dedup_window());

        let weather = &config.weather;
        let client = build_client(weather.timeout(), weather.max_retries)?;
        let mut lookup = WeatherLookup::new(
            vec![
                Arc::new(OpenWeatherProvider::new(
                    client.clone(),
                    weather.openweather_api_key.clone(),
                    &weather.openweather_base_url,
                )),
                Arc::new(OpenMeteoProvider::new(client, &weather.open_meteo_base_url)),
            ],
            weather.timeout(),
        )
        .with_default_area(
            &weather.default_location.name,
            weather.default_location.coordinates()?,
        )
        .with_dedup_window(config.cache.dedup_window());

        if let Some(cache) = cache {
            resolver = resolver.with_cache(Arc::clone(&cache));
            lookup = lookup.with_cache(cache);
        }

        Ok(Self::new(
            resolver,
            Arc::new(lookup),
            config.scoring,
            config.defaults.max_distance_km,
        ))
    }

    #[must_use]
    pub fn resolver(&self) -> &GeocodeResolver {
        &self.resolver
    }

    #[must_use]
    pub fn weather(&self) -> &dyn ForecastSource {
        self.weather.as_ref()
    }

    /// Resolve the query, look up weather there and rank nearby venues for `sport`.
    ///
    /// Only `InvalidInput`, `UnresolvableLocation` and `Cancelled` are returned;
    /// weather and candidate failures degrade to placeholders and empty lists.
    #[tracing::instrument(name = "recommend", level = "info", skip(self, candidates, cancel))]
    pub async fn recommend(
        &self,
        query: &LocationQuery,
        sport: &str,
        when_local: Option<NaiveDateTime>,
        candidates: &dyn CandidateProvider,
        filters: &VenueFilters,
        cancel: &CancellationToken,
    ) -> Result<Recommendation> {
        let sport = sport.trim();
        if sport.is_empty() {
            return Err(LocatorError::invalid_input("Sport must not be empty"));
        }
        let when_local = when_local.unwrap_or_else(|| Local::now().naive_local());

        let location = self.resolver.resolve(query, cancel).await?;
        info!(
            address = %location.formatted_address,
            source = ?location.source,
            precise = location.precise,
            "Resolved location"
        );

        let weather = self
            .weather
            .forecast_for(location.coordinates, when_local, cancel)
            .await;
        if cancel.is_cancelled() {
            return Err(LocatorError::Cancelled);
        }

        let radius_km = filters
            .max_distance_km
            .unwrap_or(self.scorer.default_max_distance_km());
        let venues = tokio::select! {
            () = cancel.cancelled() => return Err(LocatorError::Cancelled),
            venues = candidates.get_venues_near(location.coordinates, radius_km) => venues,
        };
        let venues = venues.unwrap_or_else(|e| {
            warn!(error = %e, "Candidate venues unavailable, ranking nothing");
            Vec::new()
        });

        let recommendations = self
            .scorer
            .rank(location.coordinates, sport, when_local, &venues, filters, cancel)
            .await;
        if cancel.is_cancelled() {
            return Err(LocatorError::Cancelled);
        }

        info!(
            candidates = venues.len(),
            recommended = recommendations.len(),
            "Ranked venues"
        );

        Ok(Recommendation {
            location,
            weather,
            recommendations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocationSource;

    #[tokio::test]
    async fn test_zip_resolves_through_postal_when_open_geocoder_disabled() {
        let mut postal = mockito::Server::new_async().await;
        let _zip = postal
            .mock("GET", "/us/32601")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"post code": "32601", "country": "United States", "country abbreviation": "US",
                    "places": [{"place name": "Gainesville", "longitude": "-82.3248",
                                "state": "Florida", "state abbreviation": "FL", "latitude": "29.6537"}]}"#,
            )
            .create_async()
            .await;
        let mut open = mockito::Server::new_async().await;
        let untouched = open
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let mut config = LocatorConfig::default();
        config.geocoding.nominatim_enabled = false;
        config.geocoding.nominatim_base_url = open.url();
        config.geocoding.postal_base_url = postal.url();
        config.geocoding.max_retries = 0;

        let facade = RecommendationFacade::from_config(&config).unwrap();
        let location = facade
            .resolver()
            .resolve(&LocationQuery::text("32601"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(location.source, LocationSource::PostalLookup);
        assert!(!location.precise);
        assert_eq!(location.formatted_address, "Gainesville, FL 32601");
        untouched.assert_async().await;
    }
}
