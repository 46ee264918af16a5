//! OpenStreetMap Nominatim geocoder (secondary, keyless)

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

use super::GeocodeProvider;
use crate::Result;
use crate::error::LocatorError;
use crate::http::{Fetched, get_json, parse_degrees};
use crate::models::{Coordinates, LocationSource, ResolvedLocation};

pub const PROVIDER: &str = "nominatim";

pub struct NominatimGeocoder {
    client: ClientWithMiddleware,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
    display_name: String,
}

/// Reverse answers carry either a place or an `error` message for open water and the like
#[derive(Debug, Deserialize)]
struct ReverseResult {
    display_name: Option<String>,
    error: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(client: ClientWithMiddleware, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GeocodeProvider for NominatimGeocoder {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn source(&self) -> LocationSource {
        LocationSource::SecondaryGeocoder
    }

    #[tracing::instrument(name = "nominatim_search", level = "debug", skip(self))]
    async fn forward(&self, text: &str) -> Result<Option<ResolvedLocation>> {
        let url = format!(
            "{}/search?q={}&format=jsonv2&limit=1",
            self.base_url,
            urlencoding::encode(text)
        );

        let results = match get_json::<Vec<SearchResult>>(&self.client, PROVIDER, &url).await? {
            Fetched::Body(results) => results,
            Fetched::NotFound => return Ok(None),
        };

        let Some(result) = results.into_iter().next() else {
            return Ok(None);
        };

        let coordinates = Coordinates::new(
            parse_degrees(PROVIDER, &result.lat)?,
            parse_degrees(PROVIDER, &result.lon)?,
        )
        .map_err(|e| LocatorError::provider(PROVIDER, e.to_string()))?;

        Ok(Some(ResolvedLocation {
            coordinates,
            formatted_address: result.display_name,
            source: LocationSource::SecondaryGeocoder,
            precise: true,
        }))
    }

    #[tracing::instrument(name = "nominatim_reverse", level = "debug", skip(self))]
    async fn reverse(&self, coordinates: Coordinates) -> Result<Option<String>> {
        let url = format!(
            "{}/reverse?lat={}&lon={}&format=jsonv2&zoom=18",
            self.base_url, coordinates.latitude, coordinates.longitude
        );

        match get_json::<ReverseResult>(&self.client, PROVIDER, &url).await? {
            Fetched::Body(ReverseResult {
                error: Some(reason), ..
            }) => {
                tracing::debug!(%reason, "Nominatim has no address here");
                Ok(None)
            }
            Fetched::Body(result) => Ok(result.display_name),
            Fetched::NotFound => Ok(None),
        }
    }
}
