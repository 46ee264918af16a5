//! Data models for the pickup locator
//!
//! This module contains the request-scoped domain models organized by concern:
//! - Location: coordinates, queries and resolved locations
//! - Weather: provider readings, snapshots and the outdoor-play policy
//! - Venue: candidate venues, filters and ranked recommendations

pub mod location;
pub mod venue;
pub mod weather;

// Re-export all public types for convenient access
pub use location::{Coordinates, LocationQuery, LocationSource, ResolvedLocation};
pub use venue::{Venue, VenueFilters, VenueRecommendation, VenueType};
pub use weather::{
    OUTDOOR_POLICY_VERSION, SnapshotSource, WeatherCondition, WeatherReading, WeatherSnapshot,
    is_outdoor_friendly,
};
