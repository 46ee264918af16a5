//! Location models: coordinates, queries and resolved locations

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::LocatorError;

/// A point on the globe in decimal degrees
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Latitude in decimal degrees, [-90, 90]
    pub latitude: f64,
    /// Longitude in decimal degrees, [-180, 180]
    pub longitude: f64,
}

impl Coordinates {
    /// Create validated coordinates
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let coordinates = Self {
            latitude,
            longitude,
        };
        if coordinates.is_valid() {
            Ok(coordinates)
        } else {
            Err(LocatorError::invalid_input(format!(
                "Coordinates out of range: lat={latitude}, lng={longitude}"
            )))
        }
    }

    /// Whether both components are finite and within range
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Format as `"lat, lng"` with four decimals
    #[must_use]
    pub fn format_pair(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Exact bit pattern, usable as a hash key
    pub(crate) fn key_bits(&self) -> (u64, u64) {
        (self.latitude.to_bits(), self.longitude.to_bits())
    }
}

/// What the caller knows about a location
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct LocationQuery {
    /// Free-text address, place name or zip code
    pub text: Option<String>,
    /// Coordinates, e.g. from the device GPS
    pub coordinates: Option<Coordinates>,
}

impl LocationQuery {
    #[must_use]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: Some(text.into()),
            coordinates: None,
        }
    }

    #[must_use]
    pub fn coordinates(coordinates: Coordinates) -> Self {
        Self {
            text: None,
            coordinates: Some(coordinates),
        }
    }

    /// Attach coordinates to a text query, used as a raw fallback
    #[must_use]
    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    /// Trimmed text, `None` when absent or blank
    #[must_use]
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Which step of the geocoding chain produced a location
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationSource {
    PrimaryGeocoder,
    SecondaryGeocoder,
    PostalLookup,
    RawCoordinates,
}

/// A location that is ready to be used for distance and weather lookups
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub coordinates: Coordinates,
    /// Human readable address
    pub formatted_address: String,
    pub source: LocationSource,
    /// False for centroid fallbacks rather than street-level matches
    pub precise: bool,
}

impl ResolvedLocation {
    /// Raw coordinates named by their own `"lat, lng"` rendering
    #[must_use]
    pub fn raw(coordinates: Coordinates, precise: bool) -> Self {
        Self {
            formatted_address: coordinates.format_pair(),
            coordinates,
            source: LocationSource::RawCoordinates,
            precise,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0.0, true)]
    #[case(90.0, 180.0, true)]
    #[case(-90.0, -180.0, true)]
    #[case(90.1, 0.0, false)]
    #[case(0.0, -180.5, false)]
    #[case(f64::NAN, 0.0, false)]
    #[case(0.0, f64::INFINITY, false)]
    fn test_coordinate_validation(#[case] lat: f64, #[case] lng: f64, #[case] valid: bool) {
        assert_eq!(Coordinates::new(lat, lng).is_ok(), valid);
    }

    #[test]
    fn test_format_pair() {
        let coordinates = Coordinates::new(29.651_634, -82.324_826).unwrap();
        assert_eq!(coordinates.format_pair(), "29.6516, -82.3248");
    }

    #[test]
    fn test_trimmed_text() {
        assert_eq!(LocationQuery::text("  Gainesville ").trimmed_text(), Some("Gainesville"));
        assert_eq!(LocationQuery::text("   ").trimmed_text(), None);
        assert_eq!(LocationQuery::default().trimmed_text(), None);
    }

    #[test]
    fn test_raw_location() {
        let coordinates = Coordinates::new(29.65, -82.32).unwrap();
        let location = ResolvedLocation::raw(coordinates, true);
        assert_eq!(location.formatted_address, "29.6500, -82.3200");
        assert_eq!(location.source, LocationSource::RawCoordinates);
    }
}
