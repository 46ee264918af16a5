//! Multi-factor venue ranking
//!
//! Each candidate that passes the filters gets a score in [0, 1] from four
//! weighted terms: distance, rating, weather fit and popularity. Weather is only
//! consulted for outdoor venues, once per distinct coordinate pair.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::Result;
use crate::error::LocatorError;
use crate::geo::distance_km;
use crate::models::{Coordinates, Venue, VenueFilters, VenueRecommendation, VenueType};
use crate::weather::ForecastSource;

/// Weather-fit value for an outdoor venue under unfriendly weather
const POOR_WEATHER_FIT: f64 = 0.2;
/// Rating count at which popularity saturates
const POPULARITY_CAP: u32 = 50;
/// Terms below this value never produce a reason
const REASON_THRESHOLD: f64 = 0.5;
const MAX_REASONS: usize = 3;

pub const WEATHER_ADVISORY: &str = "Weather may affect outdoor play";

/// Relative weight of each scoring term; the four must sum to 1
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringWeights {
    pub distance: f64,
    pub rating: f64,
    pub weather: f64,
    pub popularity: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            distance: 0.35,
            rating: 0.30,
            weather: 0.25,
            popularity: 0.10,
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<()> {
        let weights = [self.distance, self.rating, self.weather, self.popularity];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(LocatorError::config(
                "Scoring weights must be non-negative numbers",
            ));
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > 1e-3 {
            return Err(LocatorError::config(format!(
                "Scoring weights must sum to 1.0, got {total:.3}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Term {
    Distance,
    Rating,
    Weather,
    Popularity,
}

/// Per-term values for one venue, each in [0, 1]
#[derive(Debug, Clone, Copy)]
struct Breakdown {
    distance: f64,
    rating: f64,
    weather: f64,
    popularity: f64,
}

impl Breakdown {
    fn score(&self, weights: &ScoringWeights) -> f64 {
        (self.distance * weights.distance
            + self.rating * weights.rating
            + self.weather * weights.weather
            + self.popularity * weights.popularity)
            .clamp(0.0, 1.0)
    }

    fn terms(&self) -> [(Term, f64); 4] {
        [
            (Term::Distance, self.distance),
            (Term::Rating, self.rating),
            (Term::Weather, self.weather),
            (Term::Popularity, self.popularity),
        ]
    }
}

fn weight_of(term: Term, weights: &ScoringWeights) -> f64 {
    match term {
        Term::Distance => weights.distance,
        Term::Rating => weights.rating,
        Term::Weather => weights.weather,
        Term::Popularity => weights.popularity,
    }
}

fn reason_for(term: Term, venue_type: VenueType) -> &'static str {
    match (term, venue_type) {
        (Term::Distance, _) => "Close to you",
        (Term::Rating, _) => "Highly rated",
        (Term::Weather, VenueType::Indoor) => "Indoor venue, weather won't matter",
        (Term::Weather, VenueType::Mixed) => "Indoor and outdoor space, weather won't matter",
        (Term::Weather, VenueType::Outdoor) => "Good weather for outdoor play",
        (Term::Popularity, _) => "Popular with local players",
    }
}

/// Up to three reasons, strongest weighted contribution first
fn reasons(
    breakdown: &Breakdown,
    weights: &ScoringWeights,
    venue_type: VenueType,
    weather_advisory: bool,
) -> Vec<String> {
    let mut contributing: Vec<(Term, f64)> = breakdown
        .terms()
        .into_iter()
        .filter(|(_, value)| *value >= REASON_THRESHOLD)
        .map(|(term, value)| (term, value * weight_of(term, weights)))
        .filter(|(_, contribution)| *contribution > 0.0)
        .collect();
    contributing.sort_by(|a, b| b.1.total_cmp(&a.1));

    let slots = if weather_advisory {
        MAX_REASONS - 1
    } else {
        MAX_REASONS
    };
    let mut reasons: Vec<String> = contributing
        .into_iter()
        .take(slots)
        .map(|(term, _)| reason_for(term, venue_type).to_string())
        .collect();

    if weather_advisory {
        reasons.push(WEATHER_ADVISORY.to_string());
    }
    reasons
}

/// Ranks candidate venues for a sport, place and time
pub struct VenueScorer {
    weights: ScoringWeights,
    default_max_distance_km: f64,
    forecasts: Arc<dyn ForecastSource>,
}

impl VenueScorer {
    #[must_use]
    pub fn new(
        weights: ScoringWeights,
        default_max_distance_km: f64,
        forecasts: Arc<dyn ForecastSource>,
    ) -> Self {
        Self {
            weights,
            default_max_distance_km,
            forecasts,
        }
    }

    #[must_use]
    pub fn default_max_distance_km(&self) -> f64 {
        self.default_max_distance_km
    }

    /// Filter, score and order `candidates`.
    ///
    /// The result is sorted by score (desc), then distance (asc), then rating
    /// (desc), and truncated to `filters.limit`. Never fails.
    #[tracing::instrument(name = "rank_venues", level = "debug", skip_all, fields(sport = %sport, candidates = candidates.len()))]
    pub async fn rank(
        &self,
        origin: Coordinates,
        sport: &str,
        when_local: NaiveDateTime,
        candidates: &[Venue],
        filters: &VenueFilters,
        cancel: &CancellationToken,
    ) -> Vec<VenueRecommendation> {
        let max_distance_km = filters
            .max_distance_km
            .unwrap_or(self.default_max_distance_km);
        let min_rating = filters.min_rating.unwrap_or(0.0);

        let eligible: Vec<(&Venue, f64)> = candidates
            .iter()
            .filter(|venue| venue.supports(sport))
            .filter(|venue| filters.venue_type.is_none_or(|kind| venue.venue_type == kind))
            .filter(|venue| venue.average_rating >= min_rating)
            .filter_map(|venue| {
                if !venue.coordinates.is_valid() {
                    debug!(venue = %venue.id, "Skipping venue with unusable coordinates");
                    return None;
                }
                let distance = distance_km(&origin, &venue.coordinates);
                (distance <= max_distance_km).then_some((venue, distance))
            })
            .collect();

        if eligible.is_empty() {
            return Vec::new();
        }

        let friendly = self.outdoor_weather(&eligible, when_local, cancel).await;

        let mut ranked: Vec<VenueRecommendation> = eligible
            .into_iter()
            .map(|(venue, distance)| {
                let outdoor_friendly = (venue.venue_type == VenueType::Outdoor)
                    .then(|| friendly.get(&venue.coordinates.key_bits()).copied())
                    .flatten();
                self.recommend(venue, distance, max_distance_km, outdoor_friendly)
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.distance_km.total_cmp(&b.distance_km))
                .then_with(|| b.venue.average_rating.total_cmp(&a.venue.average_rating))
        });

        if let Some(limit) = filters.limit {
            ranked.truncate(limit);
        }
        ranked
    }

    /// Outdoor-friendliness per distinct outdoor coordinate pair, fetched concurrently
    async fn outdoor_weather(
        &self,
        eligible: &[(&Venue, f64)],
        when_local: NaiveDateTime,
        cancel: &CancellationToken,
    ) -> HashMap<(u64, u64), bool> {
        let mut places: HashMap<(u64, u64), Coordinates> = HashMap::new();
        for (venue, _) in eligible {
            if venue.venue_type == VenueType::Outdoor {
                places
                    .entry(venue.coordinates.key_bits())
                    .or_insert(venue.coordinates);
            }
        }

        let lookups = places.into_iter().map(|(key, coordinates)| async move {
            let snapshot = self
                .forecasts
                .forecast_for(coordinates, when_local, cancel)
                .await;
            (key, snapshot.outdoor_friendly())
        });
        join_all(lookups).await.into_iter().collect()
    }

    fn recommend(
        &self,
        venue: &Venue,
        distance: f64,
        max_distance_km: f64,
        outdoor_friendly: Option<bool>,
    ) -> VenueRecommendation {
        let breakdown = Breakdown {
            distance: if max_distance_km > 0.0 {
                (1.0 - distance / max_distance_km).max(0.0)
            } else {
                1.0
            },
            rating: (venue.average_rating / 5.0).clamp(0.0, 1.0),
            weather: match outdoor_friendly {
                Some(false) => POOR_WEATHER_FIT,
                _ => 1.0,
            },
            popularity: f64::from(venue.total_ratings.min(POPULARITY_CAP))
                / f64::from(POPULARITY_CAP),
        };

        VenueRecommendation {
            venue: venue.clone(),
            distance_km: distance,
            score: breakdown.score(&self.weights),
            reasons: reasons(
                &breakdown,
                &self.weights,
                venue.venue_type,
                outdoor_friendly == Some(false),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SnapshotSource, WeatherCondition, WeatherReading, WeatherSnapshot};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    /// Fixed weather everywhere, counting lookups
    struct FixedWeather {
        condition: WeatherCondition,
        calls: AtomicUsize,
    }

    impl FixedWeather {
        fn new(condition: WeatherCondition) -> Arc<Self> {
            Arc::new(Self {
                condition,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ForecastSource for FixedWeather {
        async fn forecast_for(
            &self,
            _coordinates: Coordinates,
            _when_local: NaiveDateTime,
            _cancel: &CancellationToken,
        ) -> WeatherSnapshot {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            WeatherSnapshot::from_reading(
                WeatherReading {
                    temperature_f: 72.0,
                    condition: self.condition,
                    description: self.condition.to_string(),
                    humidity_pct: 50.0,
                    wind_mph: 5.0,
                    precipitation: 0.0,
                },
                SnapshotSource::Forecast,
                Vec::new(),
            )
        }
    }

    const ORIGIN: Coordinates = Coordinates {
        latitude: 29.6516,
        longitude: -82.3248,
    };

    /// A point roughly `km` kilometers due north of the origin
    fn north_of_origin(km: f64) -> Coordinates {
        Coordinates {
            latitude: ORIGIN.latitude + km / 111.195,
            longitude: ORIGIN.longitude,
        }
    }

    fn venue(id: &str, km: f64, venue_type: VenueType, rating: f64, total: u32) -> Venue {
        Venue {
            id: id.to_string(),
            name: format!("Venue {id}"),
            coordinates: north_of_origin(km),
            venue_type,
            supported_sports: vec!["Basketball".to_string()],
            average_rating: rating,
            total_ratings: total,
        }
    }

    fn when() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 17)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap()
    }

    fn scorer(weather: Arc<FixedWeather>) -> VenueScorer {
        VenueScorer::new(ScoringWeights::default(), 25.0, weather)
    }

    async fn rank(scorer: &VenueScorer, candidates: &[Venue], filters: &VenueFilters) -> Vec<VenueRecommendation> {
        scorer
            .rank(ORIGIN, "basketball", when(), candidates, filters, &CancellationToken::new())
            .await
    }

    #[test]
    fn test_default_weights_are_valid() {
        assert!(ScoringWeights::default().validate().is_ok());
    }

    #[rstest]
    #[case(0.5, 0.3, 0.25, 0.10)]
    #[case(-0.1, 0.5, 0.5, 0.1)]
    #[case(f64::NAN, 0.3, 0.25, 0.10)]
    fn test_invalid_weights(#[case] distance: f64, #[case] rating: f64, #[case] weather: f64, #[case] popularity: f64) {
        let weights = ScoringWeights { distance, rating, weather, popularity };
        assert!(matches!(weights.validate(), Err(LocatorError::Config { .. })));
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let weather = FixedWeather::new(WeatherCondition::Clear);
        let ranked = rank(&scorer(weather.clone()), &[], &VenueFilters::default()).await;
        assert!(ranked.is_empty());
        assert_eq!(weather.calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsupported_sport_yields_nothing() {
        let mut soccer = venue("a", 1.0, VenueType::Outdoor, 4.0, 10);
        soccer.supported_sports = vec!["Soccer".to_string()];
        let ranked = rank(&scorer(FixedWeather::new(WeatherCondition::Clear)), &[soccer], &VenueFilters::default()).await;
        assert!(ranked.is_empty());
    }

    #[tokio::test]
    async fn test_indoor_beats_closer_outdoor_in_bad_weather() {
        let candidates = vec![
            venue("outdoor", 1.0, VenueType::Outdoor, 4.0, 20),
            venue("indoor", 2.0, VenueType::Indoor, 4.8, 20),
        ];
        let ranked = rank(
            &scorer(FixedWeather::new(WeatherCondition::Thunderstorm)),
            &candidates,
            &VenueFilters::default(),
        )
        .await;

        assert_eq!(ranked[0].venue.id, "indoor");
        assert_eq!(ranked[1].venue.id, "outdoor");
        assert!(ranked[0].reasons.contains(&"Indoor venue, weather won't matter".to_string()));
        assert_eq!(ranked[1].reasons.last().map(String::as_str), Some(WEATHER_ADVISORY));
        assert!(ranked[1].reasons.len() <= 3);
    }

    #[tokio::test]
    async fn test_max_distance_filter() {
        let candidates = vec![
            venue("near", 4.0, VenueType::Indoor, 3.0, 5),
            venue("far", 6.0, VenueType::Indoor, 5.0, 50),
        ];
        let filters = VenueFilters {
            max_distance_km: Some(5.0),
            ..Default::default()
        };
        let ranked = rank(&scorer(FixedWeather::new(WeatherCondition::Clear)), &candidates, &filters).await;
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].venue.id, "near");
    }

    #[tokio::test]
    async fn test_output_sorted_and_limited() {
        let candidates = vec![
            venue("a", 10.0, VenueType::Mixed, 2.0, 1),
            venue("b", 1.0, VenueType::Indoor, 4.5, 60),
            venue("c", 5.0, VenueType::Outdoor, 3.5, 30),
            venue("d", 20.0, VenueType::Indoor, 1.0, 0),
        ];
        let all = rank(&scorer(FixedWeather::new(WeatherCondition::Clear)), &candidates, &VenueFilters::default()).await;
        assert_eq!(all.len(), 4);
        assert!(all.windows(2).all(|pair| pair[0].score >= pair[1].score));
        assert!(all.iter().all(|r| (0.0..=1.0).contains(&r.score)));

        let limited = rank(
            &scorer(FixedWeather::new(WeatherCondition::Clear)),
            &candidates,
            &VenueFilters {
                limit: Some(2),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].venue.id, all[0].venue.id);
    }

    #[tokio::test]
    async fn test_ties_break_on_distance_then_rating() {
        let weather_only = ScoringWeights {
            distance: 0.0,
            rating: 0.0,
            weather: 1.0,
            popularity: 0.0,
        };
        let scorer = VenueScorer::new(weather_only, 25.0, FixedWeather::new(WeatherCondition::Clear));
        let candidates = vec![
            venue("far-low", 3.0, VenueType::Indoor, 4.0, 10),
            venue("near", 1.0, VenueType::Indoor, 2.0, 10),
            venue("far-high", 3.0, VenueType::Indoor, 5.0, 10),
        ];

        let ranked = rank(&scorer, &candidates, &VenueFilters::default()).await;
        let ids: Vec<&str> = ranked.iter().map(|r| r.venue.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "far-high", "far-low"]);
        assert!(ranked.iter().all(|r| r.score == 1.0));
    }

    #[tokio::test]
    async fn test_weather_fetched_once_per_place() {
        let weather = FixedWeather::new(WeatherCondition::Clear);
        let shared_spot = north_of_origin(2.0);
        let mut a = venue("a", 2.0, VenueType::Outdoor, 4.0, 10);
        let mut b = venue("b", 2.0, VenueType::Outdoor, 3.0, 10);
        a.coordinates = shared_spot;
        b.coordinates = shared_spot;
        let c = venue("c", 3.0, VenueType::Outdoor, 3.0, 10);
        let indoor = venue("d", 1.0, VenueType::Indoor, 3.0, 10);

        rank(&scorer(weather.clone()), &[a, b, c, indoor], &VenueFilters::default()).await;
        assert_eq!(weather.calls.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_filters_by_type_and_rating() {
        let candidates = vec![
            venue("indoor-low", 1.0, VenueType::Indoor, 2.0, 10),
            venue("indoor-high", 1.0, VenueType::Indoor, 4.5, 10),
            venue("outdoor-high", 1.0, VenueType::Outdoor, 4.5, 10),
        ];
        let filters = VenueFilters {
            venue_type: Some(VenueType::Indoor),
            min_rating: Some(4.0),
            ..Default::default()
        };
        let ranked = rank(&scorer(FixedWeather::new(WeatherCondition::Clear)), &candidates, &filters).await;
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].venue.id, "indoor-high");
    }

    #[test]
    fn test_reasons_follow_weighted_contribution() {
        let breakdown = Breakdown {
            distance: 0.9,
            rating: 0.6,
            weather: 1.0,
            popularity: 0.4,
        };
        let weights = ScoringWeights::default();
        let reasons = reasons(&breakdown, &weights, VenueType::Outdoor, false);
        assert_eq!(
            reasons,
            vec![
                "Close to you".to_string(),
                "Good weather for outdoor play".to_string(),
                "Highly rated".to_string(),
            ]
        );
    }
}
