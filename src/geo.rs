//! Great-circle math between two coordinates

use std::f64::consts::PI;

use haversine::{Location as HaversineLocation, Units, distance};

use crate::Result;
use crate::error::LocatorError;
use crate::models::Coordinates;

/// Mean Earth radius used by the haversine crate, in km
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const NULL_ISLAND_RADIUS_KM: f64 = 1.0;

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Haversine distance in kilometers
#[must_use]
pub fn distance_km(a: &Coordinates, b: &Coordinates) -> f64 {
    if a == b {
        return 0.0;
    }
    let from = HaversineLocation {
        latitude: a.latitude,
        longitude: a.longitude,
    };
    let to = HaversineLocation {
        latitude: b.latitude,
        longitude: b.longitude,
    };
    let km = distance(from, to, Units::Kilometers);
    // rounding can push the haversine term past 1 for antipodal points
    if km.is_nan() { PI * EARTH_RADIUS_KM } else { km }
}

/// Render a distance for display: meters below 1 km, otherwise km with one decimal
pub fn format_distance(km: f64) -> Result<String> {
    if !km.is_finite() || km < 0.0 {
        return Err(LocatorError::invalid_input(format!(
            "Distance must be a non-negative number, got {km}"
        )));
    }
    if km < 1.0 {
        let meters = ((km * 1000.0) / 10.0).round() * 10.0;
        if meters < 1000.0 {
            return Ok(format!("{meters:.0} m"));
        }
    }
    Ok(format!("{km:.1} km"))
}

/// Initial great-circle bearing from `from` towards `to`, in [0, 360)
#[must_use]
pub fn bearing_degrees(from: &Coordinates, to: &Coordinates) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let delta_lambda = (to.longitude - from.longitude).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Convert a bearing to one of 16 compass points
#[must_use]
pub fn cardinal_direction(degrees: f64) -> &'static str {
    if !degrees.is_finite() {
        return "Unknown";
    }
    let normalized = degrees.rem_euclid(360.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = (normalized / 22.5).round() as usize % COMPASS_POINTS.len();
    COMPASS_POINTS[index]
}

/// Providers sometimes answer (0, 0) when they have no data
#[must_use]
pub fn is_null_island(coordinates: &Coordinates) -> bool {
    let origin = Coordinates {
        latitude: 0.0,
        longitude: 0.0,
    };
    distance_km(coordinates, &origin) < NULL_ISLAND_RADIUS_KM
}
