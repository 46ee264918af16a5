//! Candidate venue sources
//!
//! Venue storage lives outside this crate; ranking only needs something that
//! can list venues around a point.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::geo::distance_km;
use crate::models::{Coordinates, Venue};

/// Supplies candidate venues near a point
#[async_trait]
pub trait CandidateProvider: Send + Sync {
    async fn get_venues_near(&self, coordinates: Coordinates, radius_km: f64) -> Result<Vec<Venue>>;
}

/// In-memory venue list, optionally loaded from a JSON file
#[derive(Debug, Clone, Default)]
pub struct StaticVenueProvider {
    venues: Vec<Venue>,
}

impl StaticVenueProvider {
    #[must_use]
    pub fn new(venues: Vec<Venue>) -> Self {
        Self { venues }
    }

    /// Load venues from a JSON array file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read venues file: {}", path.display()))?;
        let venues: Vec<Venue> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse venues file: {}", path.display()))?;
        info!("Loaded {} venues from {}", venues.len(), path.display());
        Ok(Self { venues })
    }

    #[must_use]
    pub fn venues(&self) -> &[Venue] {
        &self.venues
    }
}

#[async_trait]
impl CandidateProvider for StaticVenueProvider {
    async fn get_venues_near(&self, coordinates: Coordinates, radius_km: f64) -> Result<Vec<Venue>> {
        let nearby: Vec<Venue> = self
            .venues
            .iter()
            .filter(|venue| {
                venue.coordinates.is_valid()
                    && distance_km(&coordinates, &venue.coordinates) <= radius_km
            })
            .cloned()
            .collect();
        debug!(
            "Found {} of {} venues within {}km",
            nearby.len(),
            self.venues.len(),
            radius_km
        );
        Ok(nearby)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VenueType;
    use std::io::Write;

    const VENUES_JSON: &str = r#"[
        {"id": "swrc", "name": "Southwest Rec Center",
         "coordinates": {"latitude": 29.6387, "longitude": -82.3686},
         "venue_type": "INDOOR", "supported_sports": ["Basketball", "Volleyball"],
         "average_rating": 4.6, "total_ratings": 38},
        {"id": "jacksonville", "name": "Metropolitan Park",
         "coordinates": {"latitude": 30.3254, "longitude": -81.6435},
         "venue_type": "OUTDOOR", "supported_sports": ["Soccer"],
         "average_rating": 4.1, "total_ratings": 12}
    ]"#;

    #[tokio::test]
    async fn test_load_and_filter_by_radius() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{VENUES_JSON}").unwrap();

        let provider = StaticVenueProvider::from_json_file(file.path()).unwrap();
        assert_eq!(provider.venues().len(), 2);
        assert_eq!(provider.venues()[0].venue_type, VenueType::Indoor);

        let gainesville = Coordinates::new(29.6516, -82.3248).unwrap();
        let nearby = provider.get_venues_near(gainesville, 25.0).await.unwrap();
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].id, "swrc");
    }

    #[test]
    fn test_bad_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = StaticVenueProvider::from_json_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse venues file"));
    }
}
