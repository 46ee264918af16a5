//! US ZIP code centroid lookup via Zippopotam (keyless)

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

use super::GeocodeProvider;
use crate::Result;
use crate::error::LocatorError;
use crate::http::{Fetched, get_json, parse_degrees};
use crate::models::{Coordinates, LocationSource, ResolvedLocation};

pub const PROVIDER: &str = "zippopotam";

static ZIP_CODE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(\d{5})(?:-\d{4})?\b").ok());

/// First five-digit US ZIP code in `text`, ignoring any +4 suffix
#[must_use]
pub fn extract_zip(text: &str) -> Option<&str> {
    ZIP_CODE
        .as_ref()?
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|zip| zip.as_str())
}

pub struct PostalLookup {
    client: ClientWithMiddleware,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PostalResponse {
    #[serde(rename = "post code")]
    post_code: String,
    #[serde(default)]
    places: Vec<Place>,
}

#[derive(Debug, Deserialize)]
struct Place {
    #[serde(rename = "place name")]
    place_name: String,
    #[serde(rename = "state abbreviation")]
    state_abbreviation: String,
    latitude: String,
    longitude: String,
}

impl PostalLookup {
    pub fn new(client: ClientWithMiddleware, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GeocodeProvider for PostalLookup {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn source(&self) -> LocationSource {
        LocationSource::PostalLookup
    }

    #[tracing::instrument(name = "postal_lookup", level = "debug", skip(self))]
    async fn forward(&self, text: &str) -> Result<Option<ResolvedLocation>> {
        let Some(zip) = extract_zip(text) else {
            return Ok(None);
        };

        let url = format!("{}/us/{zip}", self.base_url);
        let response = match get_json::<PostalResponse>(&self.client, PROVIDER, &url).await? {
            Fetched::Body(response) => response,
            Fetched::NotFound => return Ok(None),
        };

        let Some(place) = response.places.into_iter().next() else {
            return Ok(None);
        };

        let coordinates = Coordinates::new(
            parse_degrees(PROVIDER, &place.latitude)?,
            parse_degrees(PROVIDER, &place.longitude)?,
        )
        .map_err(|e| LocatorError::provider(PROVIDER, e.to_string()))?;

        Ok(Some(ResolvedLocation {
            coordinates,
            formatted_address: format!(
                "{}, {} {}",
                place.place_name, place.state_abbreviation, response.post_code
            ),
            source: LocationSource::PostalLookup,
            precise: false,
        }))
    }
}
