//! # Coordinate Provider
//!
//! Reads the device position for new drafts and captured media.
//!
//! ## Fallback Chain
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CachedLocationProvider::locate                       │
//! │                                                                         │
//! │   platform provider ──(within 10s fg / 15s bg)──► fix                   │
//! │          │                                         │                    │
//! │          │ denied / unavailable / timed out        ▼                    │
//! │          ▼                                  cache + persist             │
//! │   last known position (memory, then store)  "location.last_known"      │
//! │          │                                                              │
//! │          │ never had one                                                │
//! │          ▼                                                              │
//! │   None  (the address stays editable; absence is not an error)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use fieldsync_core::Coordinates;
use fieldsync_db::kv::LAST_LOCATION_KEY;
use fieldsync_db::{load_json, save_json, KvStore};
use fieldsync_sync::LocationSettings;

use crate::error::{LocationError, LocationResult};

/// Options passed to the platform provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationOptions {
    pub high_accuracy: bool,
    /// Bounded wait for a fix.
    pub timeout: Duration,
}

impl LocationOptions {
    /// Options for the current visibility state.
    pub fn for_visibility(settings: &LocationSettings, foreground: bool) -> Self {
        let secs = if foreground {
            settings.foreground_timeout_secs
        } else {
            settings.background_timeout_secs
        };
        LocationOptions {
            high_accuracy: settings.high_accuracy,
            timeout: Duration::from_secs(secs),
        }
    }
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self::for_visibility(&LocationSettings::default(), true)
    }
}

/// A source of device coordinates. May fail; callers decide the fallback.
#[async_trait]
pub trait CoordinateProvider: Send + Sync + 'static {
    async fn current_location(&self, options: &LocationOptions) -> LocationResult<Coordinates>;
}

#[async_trait]
impl<T: CoordinateProvider + ?Sized> CoordinateProvider for Arc<T> {
    async fn current_location(&self, options: &LocationOptions) -> LocationResult<Coordinates> {
        (**self).current_location(options).await
    }
}

/// Provider for devices without location hardware.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl CoordinateProvider for NoLocation {
    async fn current_location(&self, _options: &LocationOptions) -> LocationResult<Coordinates> {
        Err(LocationError::Unavailable("no location source".into()))
    }
}

// =============================================================================
// Cached Provider
// =============================================================================

/// Wraps a platform provider with a bounded wait and a persisted
/// last-known position.
pub struct CachedLocationProvider {
    inner: Arc<dyn CoordinateProvider>,
    store: Arc<dyn KvStore>,
    settings: LocationSettings,
    last_known: RwLock<Option<Coordinates>>,
}

impl std::fmt::Debug for CachedLocationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedLocationProvider")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CachedLocationProvider {
    pub fn new(
        inner: Arc<dyn CoordinateProvider>,
        store: Arc<dyn KvStore>,
        settings: LocationSettings,
    ) -> Self {
        CachedLocationProvider {
            inner,
            store,
            settings,
            last_known: RwLock::new(None),
        }
    }

    /// Like [`new`](Self::new), also loading the persisted last-known position.
    pub async fn restore(
        inner: Arc<dyn CoordinateProvider>,
        store: Arc<dyn KvStore>,
        settings: LocationSettings,
    ) -> Self {
        let provider = Self::new(inner, store, settings);
        match load_json::<Coordinates, _>(provider.store.as_ref(), LAST_LOCATION_KEY).await {
            Ok(last) => *provider.last_known.write().await = last,
            Err(e) => warn!(error = %e, "Last known location unreadable"),
        }
        provider
    }

    /// The most recent successful fix, if any.
    pub async fn last_known(&self) -> Option<Coordinates> {
        *self.last_known.read().await
    }

    /// Reads a fresh position, falling back to the last known one.
    ///
    /// Returns `None` only when no position was ever obtained.
    pub async fn locate(&self, foreground: bool) -> Option<Coordinates> {
        match self.fresh(foreground).await {
            Ok(coords) => Some(coords),
            Err(e) => {
                let cached = self.last_known().await;
                warn!(
                    error = %e,
                    cached = cached.is_some(),
                    "Location unavailable, using last known position"
                );
                cached
            }
        }
    }

    /// Reads a fresh position within the bounded wait, caching it on success.
    pub async fn fresh(&self, foreground: bool) -> LocationResult<Coordinates> {
        let options = LocationOptions::for_visibility(&self.settings, foreground);

        let coords =
            match tokio::time::timeout(options.timeout, self.inner.current_location(&options))
                .await
            {
                Ok(result) => result?,
                Err(_) => return Err(LocationError::Timeout(options.timeout)),
            };

        debug!(
            latitude = coords.latitude,
            longitude = coords.longitude,
            "Location fix"
        );
        *self.last_known.write().await = Some(coords);
        if let Err(e) = save_json(self.store.as_ref(), LAST_LOCATION_KEY, &coords).await {
            error!(error = %e, "Failed to persist last known location");
        }
        Ok(coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeCoordinateProvider;
    use fieldsync_db::MemoryKvStore;

    fn provider(fake: &FakeCoordinateProvider, store: Arc<MemoryKvStore>) -> CachedLocationProvider {
        CachedLocationProvider::new(Arc::new(fake.clone()), store, LocationSettings::default())
    }

    #[tokio::test]
    async fn test_fix_is_cached_and_persisted() {
        let fake = FakeCoordinateProvider::at(29.76, -95.36);
        let store = Arc::new(MemoryKvStore::new());
        let location = provider(&fake, store.clone());

        let fix = location.locate(true).await.unwrap();
        assert_eq!(fix.latitude, 29.76);
        assert_eq!(fake.calls(), 1);

        let restored =
            CachedLocationProvider::restore(Arc::new(NoLocation), store, LocationSettings::default())
                .await;
        assert_eq!(restored.last_known().await, Some(fix));
        assert_eq!(restored.locate(true).await, Some(fix));
    }

    #[tokio::test]
    async fn test_denied_without_cache_is_none() {
        let fake = FakeCoordinateProvider::failing(LocationError::PermissionDenied);
        let location = provider(&fake, Arc::new(MemoryKvStore::new()));

        assert_eq!(location.locate(true).await, None);
        assert_eq!(
            location.fresh(true).await,
            Err(LocationError::PermissionDenied)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreground_wait_is_bounded() {
        let fake = FakeCoordinateProvider::at(1.0, 2.0);
        fake.fake_delay(Duration::from_secs(60));
        let location = provider(&fake, Arc::new(MemoryKvStore::new()));

        let started = tokio::time::Instant::now();
        let result = location.fresh(true).await;

        assert_eq!(result, Err(LocationError::Timeout(Duration::from_secs(10))));
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_uses_longer_wait_and_falls_back() {
        let fake = FakeCoordinateProvider::at(1.0, 2.0);
        let location = provider(&fake, Arc::new(MemoryKvStore::new()));
        let first = location.locate(true).await;

        fake.fake_delay(Duration::from_secs(12));
        fake.move_to(3.0, 4.0);

        // 12s fits the 15s background wait but not the 10s foreground one.
        assert_eq!(location.locate(false).await.map(|c| c.latitude), Some(3.0));
        assert_eq!(location.locate(true).await.map(|c| c.latitude), Some(3.0));
        assert_ne!(first.map(|c| c.latitude), Some(3.0));
    }

    #[test]
    fn test_options_follow_visibility() {
        let settings = LocationSettings::default();
        assert_eq!(
            LocationOptions::for_visibility(&settings, false).timeout,
            Duration::from_secs(15)
        );
        assert!(LocationOptions::default().high_accuracy);
    }
}
