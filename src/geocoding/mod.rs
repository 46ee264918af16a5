//! Location resolution through an ordered chain of geocoding providers
//!
//! Forward lookups (text to coordinates) try every configured provider in order
//! and fall back to any coordinates the caller supplied. Reverse lookups
//! (coordinates to address) never fail: without a provider answer the caller's
//! coordinates are named by their own `"lat, lng"` rendering.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;
use crate::cache::ResponseCache;
use crate::chain::{Attempt, attempt};
use crate::error::LocatorError;
use crate::geo::is_null_island;
use crate::inflight::InFlight;
use crate::models::{Coordinates, LocationQuery, LocationSource, ResolvedLocation};

pub mod google;
pub mod nominatim;
pub mod postal;

pub use google::GoogleGeocoder;
pub use nominatim::NominatimGeocoder;
pub use postal::PostalLookup;

/// A single geocoding backend
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Chain step this provider stands for
    fn source(&self) -> LocationSource;

    /// Unconfigured providers are skipped without a network call
    fn is_configured(&self) -> bool {
        true
    }

    /// Resolve free text; `None` when the provider has no match
    async fn forward(&self, text: &str) -> Result<Option<ResolvedLocation>>;

    /// Address for a coordinate pair; `None` when unsupported or unknown
    async fn reverse(&self, _coordinates: Coordinates) -> Result<Option<String>> {
        Ok(None)
    }
}

#[derive(Clone)]
struct ResolverInner {
    providers: Vec<Arc<dyn GeocodeProvider>>,
    timeout: Duration,
    cache: Option<Arc<ResponseCache>>,
}

/// Geocoding chain with optional caching and in-flight de-duplication
pub struct GeocodeResolver {
    inner: Arc<ResolverInner>,
    inflight: InFlight<String, Option<ResolvedLocation>>,
}

/// Lowercase with collapsed whitespace, so trivially different spellings share a key
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl GeocodeResolver {
    /// Providers are tried in the given order; each call gets `timeout`
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn GeocodeProvider>>, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                providers,
                timeout,
                cache: None,
            }),
            inflight: InFlight::new(Duration::ZERO),
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        Arc::make_mut(&mut self.inner).cache = Some(cache);
        self
    }

    /// Share identical lookups started within `window`
    #[must_use]
    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.inflight = InFlight::new(window);
        self
    }

    /// Resolve a location query to coordinates and a display address.
    ///
    /// Text takes precedence; coordinates alone trigger a reverse lookup. Only
    /// `InvalidInput`, `UnresolvableLocation` and `Cancelled` are returned.
    #[tracing::instrument(name = "resolve_location", level = "debug", skip(self, cancel))]
    pub async fn resolve(
        &self,
        query: &LocationQuery,
        cancel: &CancellationToken,
    ) -> Result<ResolvedLocation> {
        if let Some(coordinates) = query.coordinates
            && !coordinates.is_valid()
        {
            return Err(LocatorError::invalid_input(format!(
                "Coordinates out of range: lat={}, lng={}",
                coordinates.latitude, coordinates.longitude
            )));
        }

        match (query.trimmed_text(), query.coordinates) {
            (Some(text), fallback) => self.resolve_text(text, fallback, cancel).await,
            (None, Some(coordinates)) => self.resolve_coordinates(coordinates, cancel).await,
            (None, None) => Err(LocatorError::invalid_input(
                "Location query needs text or coordinates",
            )),
        }
    }

    async fn resolve_text(
        &self,
        text: &str,
        fallback: Option<Coordinates>,
        cancel: &CancellationToken,
    ) -> Result<ResolvedLocation> {
        let normalized = normalize(text);
        let key = format!("geocode:fwd:{normalized}");

        let found = match self.cached(&key) {
            Some(location) => Some(location),
            None => {
                let inner = Arc::clone(&self.inner);
                let run_key = key.clone();
                let chain = self.inflight.run(key, move || async move {
                    inner.forward_chain(&normalized, &run_key).await
                });
                wait(chain, cancel).await?
            }
        };

        if let Some(location) = found {
            return Ok(location);
        }

        if let Some(coordinates) = fallback {
            info!("Text could not be geocoded, using supplied coordinates");
            return Ok(ResolvedLocation::raw(coordinates, false));
        }

        Err(LocatorError::unresolvable(text))
    }

    async fn resolve_coordinates(
        &self,
        coordinates: Coordinates,
        cancel: &CancellationToken,
    ) -> Result<ResolvedLocation> {
        let key = format!(
            "geocode:rev:{}:{}",
            coordinates.latitude, coordinates.longitude
        );

        let found = match self.cached(&key) {
            Some(location) => Some(location),
            None => {
                let inner = Arc::clone(&self.inner);
                let run_key = key.clone();
                let chain = self.inflight.run(key, move || async move {
                    inner.reverse_chain(coordinates, &run_key).await
                });
                wait(chain, cancel).await?
            }
        };

        Ok(match found {
            Some(location) => ResolvedLocation {
                coordinates,
                ..location
            },
            None => {
                debug!("No reverse geocoding results found, using coordinates as name");
                ResolvedLocation::raw(coordinates, true)
            }
        })
    }

    fn cached(&self, key: &str) -> Option<ResolvedLocation> {
        let cache = self.inner.cache.as_ref()?;
        match cache.get::<ResolvedLocation>(key) {
            Ok(found) => found,
            Err(e) => {
                debug!(error = %e, "Ignoring unreadable cache entry");
                None
            }
        }
    }
}

async fn wait<F>(chain: F, cancel: &CancellationToken) -> Result<Option<ResolvedLocation>>
where
    F: Future<Output = Option<ResolvedLocation>>,
{
    if cancel.is_cancelled() {
        return Err(LocatorError::Cancelled);
    }
    tokio::select! {
        () = cancel.cancelled() => Err(LocatorError::Cancelled),
        found = chain => Ok(found),
    }
}

impl ResolverInner {
    fn remember(&self, key: &str, location: &ResolvedLocation) {
        if let Some(cache) = &self.cache
            && let Err(e) = cache.put(key, location.clone())
        {
            warn!(error = %e, "Failed to cache resolved location");
        }
    }

    async fn forward_chain(&self, text: &str, key: &str) -> Option<ResolvedLocation> {
        // Shared runs outlive any single caller, so callers cancel by abandoning the wait.
        let never = CancellationToken::new();

        for provider in self.providers.iter().filter(|p| p.is_configured()) {
            match attempt(provider.name(), self.timeout, &never, provider.forward(text)).await {
                Ok(Attempt::Found(location)) => {
                    let coordinates = location.coordinates;
                    if !coordinates.is_valid() || is_null_island(&coordinates) {
                        warn!(
                            provider = provider.name(),
                            latitude = coordinates.latitude,
                            longitude = coordinates.longitude,
                            "Discarding implausible geocoding result"
                        );
                        continue;
                    }
                    debug!(
                        provider = provider.name(),
                        address = %location.formatted_address,
                        "Found location"
                    );
                    self.remember(key, &location);
                    return Some(location);
                }
                Ok(Attempt::NoMatch | Attempt::Failed(_)) => {}
                Err(_) => return None,
            }
        }
        None
    }

    async fn reverse_chain(&self, coordinates: Coordinates, key: &str) -> Option<ResolvedLocation> {
        let never = CancellationToken::new();

        for provider in self.providers.iter().filter(|p| p.is_configured()) {
            match attempt(provider.name(), self.timeout, &never, provider.reverse(coordinates)).await {
                Ok(Attempt::Found(address)) if !address.trim().is_empty() => {
                    let location = ResolvedLocation {
                        coordinates,
                        formatted_address: address.trim().to_string(),
                        source: provider.source(),
                        precise: true,
                    };
                    self.remember(key, &location);
                    return Some(location);
                }
                Ok(_) => {}
                Err(_) => return None,
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockGeocoder {
        forward: Option<ResolvedLocation>,
        reverse: Option<String>,
        fail: bool,
        delay: Duration,
        unconfigured: bool,
        calls: AtomicUsize,
    }

    impl MockGeocoder {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn answer<T>(&self, value: Option<T>) -> Result<Option<T>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(LocatorError::provider("mock", "HTTP 503"));
            }
            Ok(value)
        }
    }

    #[async_trait]
    impl GeocodeProvider for MockGeocoder {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn source(&self) -> LocationSource {
            LocationSource::SecondaryGeocoder
        }

        fn is_configured(&self) -> bool {
            !self.unconfigured
        }

        async fn forward(&self, _text: &str) -> Result<Option<ResolvedLocation>> {
            self.answer(self.forward.clone()).await
        }

        async fn reverse(&self, _coordinates: Coordinates) -> Result<Option<String>> {
            self.answer(self.reverse.clone()).await
        }
    }

    fn gainesville(source: LocationSource) -> ResolvedLocation {
        ResolvedLocation {
            coordinates: Coordinates::new(29.6516, -82.3248).unwrap(),
            formatted_address: "Gainesville, FL, USA".to_string(),
            source,
            precise: true,
        }
    }

    fn resolver(providers: Vec<Arc<MockGeocoder>>) -> GeocodeResolver {
        let providers = providers
            .into_iter()
            .map(|p| p as Arc<dyn GeocodeProvider>)
            .collect();
        GeocodeResolver::new(providers, Duration::from_millis(200))
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Gainesville,   FL "), "gainesville, fl");
    }

    #[tokio::test]
    async fn test_empty_query_makes_no_calls() {
        let provider = Arc::new(MockGeocoder::default());
        let result = resolver(vec![provider.clone()])
            .resolve(&LocationQuery::text("   "), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(LocatorError::InvalidInput { .. })));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_coordinates_rejected() {
        let query = LocationQuery::coordinates(Coordinates {
            latitude: 91.0,
            longitude: 0.0,
        });
        let result = resolver(vec![])
            .resolve(&query, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(LocatorError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let primary = Arc::new(MockGeocoder {
            forward: Some(gainesville(LocationSource::PrimaryGeocoder)),
            ..Default::default()
        });
        let secondary = Arc::new(MockGeocoder {
            forward: Some(gainesville(LocationSource::SecondaryGeocoder)),
            ..Default::default()
        });
        let location = resolver(vec![primary, secondary.clone()])
            .resolve(&LocationQuery::text("Gainesville"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(location.source, LocationSource::PrimaryGeocoder);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_failures_and_timeouts_fall_through() {
        let unkeyed = Arc::new(MockGeocoder {
            unconfigured: true,
            ..Default::default()
        });
        let slow = Arc::new(MockGeocoder {
            forward: Some(gainesville(LocationSource::PrimaryGeocoder)),
            delay: Duration::from_secs(5),
            ..Default::default()
        });
        let broken = Arc::new(MockGeocoder {
            fail: true,
            ..Default::default()
        });
        let open = Arc::new(MockGeocoder {
            forward: Some(gainesville(LocationSource::SecondaryGeocoder)),
            ..Default::default()
        });

        let location = resolver(vec![unkeyed.clone(), slow, broken.clone(), open])
            .resolve(&LocationQuery::text("Gainesville"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(location.source, LocationSource::SecondaryGeocoder);
        assert_eq!(unkeyed.calls(), 0);
        assert_eq!(broken.calls(), 1);
    }

    #[tokio::test]
    async fn test_null_island_result_is_discarded() {
        let bogus = Arc::new(MockGeocoder {
            forward: Some(ResolvedLocation {
                coordinates: Coordinates::new(0.0, 0.0).unwrap(),
                formatted_address: "Somewhere".to_string(),
                source: LocationSource::PrimaryGeocoder,
                precise: true,
            }),
            ..Default::default()
        });
        let result = resolver(vec![bogus])
            .resolve(&LocationQuery::text("Somewhere"), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(LocatorError::UnresolvableLocation { .. })));
    }

    #[tokio::test]
    async fn test_text_failure_falls_back_to_coordinates() {
        let coordinates = Coordinates::new(29.6436, -82.3549).unwrap();
        let query = LocationQuery::text("the big field by the lake").with_coordinates(coordinates);
        let location = resolver(vec![Arc::new(MockGeocoder::default())])
            .resolve(&query, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(location.source, LocationSource::RawCoordinates);
        assert!(!location.precise);
        assert_eq!(location.coordinates, coordinates);
    }

    #[tokio::test]
    async fn test_reverse_keeps_caller_coordinates() {
        let provider = Arc::new(MockGeocoder {
            reverse: Some("1 Stadium Rd, Gainesville, FL".to_string()),
            ..Default::default()
        });
        let coordinates = Coordinates::new(29.65, -82.35).unwrap();
        let location = resolver(vec![provider])
            .resolve(&LocationQuery::coordinates(coordinates), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(location.coordinates, coordinates);
        assert_eq!(location.formatted_address, "1 Stadium Rd, Gainesville, FL");
        assert!(location.precise);
    }

    #[tokio::test]
    async fn test_reverse_total_failure_still_succeeds() {
        let provider = Arc::new(MockGeocoder {
            fail: true,
            ..Default::default()
        });
        let coordinates = Coordinates::new(29.65, -82.35).unwrap();
        let location = resolver(vec![provider])
            .resolve(&LocationQuery::coordinates(coordinates), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(location.formatted_address, "29.6500, -82.3500");
        assert_eq!(location.source, LocationSource::RawCoordinates);
        assert!(location.precise);
    }

    #[tokio::test]
    async fn test_cancelled_resolution() {
        let provider = Arc::new(MockGeocoder {
            forward: Some(gainesville(LocationSource::PrimaryGeocoder)),
            ..Default::default()
        });
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = resolver(vec![provider.clone()])
            .resolve(&LocationQuery::text("Gainesville"), &cancel)
            .await;
        assert_eq!(result.unwrap_err(), LocatorError::Cancelled);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_identical_queries_share_calls() {
        let provider = Arc::new(MockGeocoder {
            forward: Some(gainesville(LocationSource::SecondaryGeocoder)),
            delay: Duration::from_millis(30),
            ..Default::default()
        });
        let resolver = resolver(vec![provider.clone()]).with_dedup_window(Duration::from_secs(3));
        let cancel = CancellationToken::new();

        let first = LocationQuery::text("Gainesville, FL");
        let second = LocationQuery::text("gainesville,  fl");
        let (a, b) = tokio::join!(
            resolver.resolve(&first, &cancel),
            resolver.resolve(&second, &cancel),
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_nearby_reverse_lookups_run_separately() {
        let provider = Arc::new(MockGeocoder {
            reverse: Some("1 Stadium Rd, Gainesville, FL".to_string()),
            delay: Duration::from_millis(30),
            ..Default::default()
        });
        let resolver = resolver(vec![provider.clone()]).with_dedup_window(Duration::from_secs(3));
        let cancel = CancellationToken::new();
        let first = LocationQuery::coordinates(Coordinates::new(29.65001, -82.35).unwrap());
        let second = LocationQuery::coordinates(Coordinates::new(29.65002, -82.35).unwrap());

        let (a, b) = tokio::join!(
            resolver.resolve(&first, &cancel),
            resolver.resolve(&second, &cancel),
        );
        assert_eq!(a.unwrap().coordinates.latitude, 29.65001);
        assert_eq!(b.unwrap().coordinates.latitude, 29.65002);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_cached_result_skips_providers() {
        let provider = Arc::new(MockGeocoder {
            forward: Some(gainesville(LocationSource::PrimaryGeocoder)),
            ..Default::default()
        });
        let cache = Arc::new(ResponseCache::new(16, Duration::from_secs(60)).unwrap());
        let resolver = resolver(vec![provider.clone()]).with_cache(cache);
        let cancel = CancellationToken::new();

        resolver.resolve(&LocationQuery::text("Gainesville"), &cancel).await.unwrap();
        resolver.resolve(&LocationQuery::text("Gainesville"), &cancel).await.unwrap();
        assert_eq!(provider.calls(), 1);
    }
}
