//! Google Geocoding API (primary, keyed)

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

use super::GeocodeProvider;
use crate::Result;
use crate::error::LocatorError;
use crate::http::{Fetched, get_json};
use crate::models::{Coordinates, LocationSource, ResolvedLocation};

pub const PROVIDER: &str = "google";

pub struct GoogleGeocoder {
    client: ClientWithMiddleware,
    api_key: Option<String>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl GoogleGeocoder {
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

    async fn lookup(&self, parameter: &str) -> Result<Vec<GeocodeResult>> {
        let url = format!(
            "{}/json?{parameter}&key={}",
            self.base_url,
            urlencoding::encode(self.api_key.as_deref().unwrap_or_default())
        );

        let response = match get_json::<GeocodeResponse>(&self.client, PROVIDER, &url).await? {
            Fetched::Body(response) => response,
            Fetched::NotFound => return Ok(Vec::new()),
        };

        match response.status.as_str() {
            "OK" => Ok(response.results),
            "ZERO_RESULTS" => Ok(Vec::new()),
            status => Err(LocatorError::provider(
                PROVIDER,
                format!(
                    "{status}: {}",
                    response.error_message.unwrap_or_default()
                ),
            )),
        }
    }
}

#[async_trait]
impl GeocodeProvider for GoogleGeocoder {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn source(&self) -> LocationSource {
        LocationSource::PrimaryGeocoder
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[tracing::instrument(name = "google_geocode", level = "debug", skip(self))]
    async fn forward(&self, text: &str) -> Result<Option<ResolvedLocation>> {
        let results = self
            .lookup(&format!("address={}", urlencoding::encode(text)))
            .await?;

        results
            .into_iter()
            .next()
            .map(|result| {
                Ok(ResolvedLocation {
                    coordinates: Coordinates::new(
                        result.geometry.location.lat,
                        result.geometry.location.lng,
                    )
                    .map_err(|e| LocatorError::provider(PROVIDER, e.to_string()))?,
                    formatted_address: result.formatted_address,
                    source: LocationSource::PrimaryGeocoder,
                    precise: true,
                })
            })
            .transpose()
    }

    #[tracing::instrument(name = "google_reverse_geocode", level = "debug", skip(self))]
    async fn reverse(&self, coordinates: Coordinates) -> Result<Option<String>> {
        let results = self
            .lookup(&format!(
                "latlng={},{}",
                coordinates.latitude, coordinates.longitude
            ))
            .await?;
        Ok(results.into_iter().next().map(|result| result.formatted_address))
    }
}
