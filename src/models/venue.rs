//! Venue input records, ranking filters and recommendation output

use serde::{Deserialize, Serialize};

use super::Coordinates;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VenueType {
    Indoor,
    Outdoor,
    Mixed,
}

/// A place to play, supplied by the storage layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub coordinates: Coordinates,
    pub venue_type: VenueType,
    pub supported_sports: Vec<String>,
    /// Mean rating, 0-5
    pub average_rating: f64,
    pub total_ratings: u32,
}

impl Venue {
    /// Case-insensitive sport membership
    #[must_use]
    pub fn supports(&self, sport: &str) -> bool {
        let sport = sport.trim();
        self.supported_sports
            .iter()
            .any(|supported| supported.trim().eq_ignore_ascii_case(sport))
    }
}

/// Optional narrowing applied before scoring
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VenueFilters {
    pub venue_type: Option<VenueType>,
    pub min_rating: Option<f64>,
    pub max_distance_km: Option<f64>,
    /// Keep only the best N recommendations
    pub limit: Option<usize>,
}

/// A ranked venue with the reasons it was picked
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VenueRecommendation {
    pub venue: Venue,
    pub distance_km: f64,
    pub score: f64,
    pub reasons: Vec<String>,
}
