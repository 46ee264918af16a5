//! Pickup Locator - location resolution and venue recommendation for pickup games
//!
//! Turns free text or GPS coordinates into a resolved location through a chain of
//! geocoding providers, looks up the weather for a planned game time, and ranks
//! nearby venues by distance, rating, weather fit and popularity.

pub mod cache;
pub mod candidates;
pub mod chain;
pub mod config;
pub mod error;
pub mod geo;
pub mod geocoding;
pub mod http;
pub mod inflight;
pub mod logging;
pub mod models;
pub mod recommendation;
pub mod scoring;
pub mod weather;

// Re-export core types for public API
pub use cache::ResponseCache;
pub use candidates::{CandidateProvider, StaticVenueProvider};
pub use config::LocatorConfig;
pub use error::LocatorError;
pub use geo::{bearing_degrees, cardinal_direction, distance_km, format_distance};
pub use geocoding::{GeocodeProvider, GeocodeResolver};
pub use models::{
    Coordinates, LocationQuery, LocationSource, ResolvedLocation, SnapshotSource, Venue,
    VenueFilters, VenueRecommendation, VenueType, WeatherCondition, WeatherReading,
    WeatherSnapshot,
};
pub use recommendation::{Recommendation, RecommendationFacade};
pub use scoring::{ScoringWeights, VenueScorer};
pub use weather::{ForecastSource, WeatherLookup, WeatherProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, LocatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
