//! Scriptable coordinate provider for tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use fieldsync_core::Coordinates;

use crate::error::{LocationError, LocationResult};
use crate::location::{CoordinateProvider, LocationOptions};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Returns a fixed position or a fixed error, optionally after a delay.
#[derive(Clone)]
pub struct FakeCoordinateProvider {
    result: Arc<Mutex<LocationResult<Coordinates>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    calls: Arc<AtomicUsize>,
}

impl FakeCoordinateProvider {
    /// A provider that reports the given position.
    pub fn at(latitude: f64, longitude: f64) -> Self {
        FakeCoordinateProvider {
            result: Arc::new(Mutex::new(Ok(Coordinates::new(latitude, longitude)))),
            delay: Arc::new(Mutex::new(None)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A provider that always fails with `error`.
    pub fn failing(error: LocationError) -> Self {
        let fake = Self::at(0.0, 0.0);
        fake.fake_fail(error);
        fake
    }

    pub fn move_to(&self, latitude: f64, longitude: f64) {
        *lock(&self.result) = Ok(Coordinates::new(latitude, longitude));
    }

    pub fn fake_fail(&self, error: LocationError) {
        *lock(&self.result) = Err(error);
    }

    /// Every request waits `delay` before answering.
    pub fn fake_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CoordinateProvider for FakeCoordinateProvider {
    async fn current_location(&self, _options: &LocationOptions) -> LocationResult<Coordinates> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.result).clone()
    }
}
