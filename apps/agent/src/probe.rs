//! # Connectivity Probe
//!
//! Polls `GET {api}/health` and turns reachability changes into
//! [`DeviceEvent::Online`] / [`DeviceEvent::Offline`] for the synchronizer.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tick ──► GET /health ──► reachable? ──► changed? ──► DeviceEvent      │
//! │                                              │                          │
//! │                                              └── unchanged: no event    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The first observation is always reported so the synchronizer starts from
//! a known state.

use reqwest::Client;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use fieldsync_sync::DeviceEvent;

use crate::http::endpoint;

// =============================================================================
// Change Detector
// =============================================================================

/// Remembers the last reachability and reports only transitions.
#[derive(Debug, Default)]
pub struct ReachabilityTracker {
    last: Option<bool>,
}

impl ReachabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an observation, returning the event to send if it changed.
    pub fn observe(&mut self, reachable: bool) -> Option<DeviceEvent> {
        if self.last == Some(reachable) {
            return None;
        }
        self.last = Some(reachable);
        Some(if reachable {
            DeviceEvent::Online
        } else {
            DeviceEvent::Offline
        })
    }

    pub fn last(&self) -> Option<bool> {
        self.last
    }
}

// =============================================================================
// Probe
// =============================================================================

pub struct ConnectivityProbe {
    client: Client,
    health_url: String,
    interval: Duration,
    tracker: ReachabilityTracker,
}

impl ConnectivityProbe {
    pub fn new(client: Client, api_base_url: &str, interval: Duration) -> Self {
        ConnectivityProbe {
            client,
            health_url: endpoint(api_base_url, "health"),
            interval,
            tracker: ReachabilityTracker::new(),
        }
    }

    /// One health request. Any 2xx counts as reachable.
    pub async fn check(&self) -> bool {
        match self.client.get(&self.health_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Health check failed");
                false
            }
        }
    }

    /// Probes until the event receiver is dropped.
    pub async fn run(mut self, events: mpsc::Sender<DeviceEvent>) {
        info!(url = %self.health_url, interval = ?self.interval, "Connectivity probe starting");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let reachable = self.check().await;

            if let Some(event) = self.tracker.observe(reachable) {
                info!(?event, "Connectivity changed");
                if events.send(event).await.is_err() {
                    break;
                }
            }
        }

        info!("Connectivity probe stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_client;

    #[test]
    fn test_first_observation_is_reported() {
        let mut tracker = ReachabilityTracker::new();
        assert_eq!(tracker.observe(false), Some(DeviceEvent::Offline));
        assert_eq!(tracker.last(), Some(false));
    }

    #[test]
    fn test_only_transitions_are_reported() {
        let mut tracker = ReachabilityTracker::new();
        let events: Vec<_> = [true, true, false, false, true]
            .into_iter()
            .filter_map(|reachable| tracker.observe(reachable))
            .collect();

        assert_eq!(
            events,
            vec![
                DeviceEvent::Online,
                DeviceEvent::Offline,
                DeviceEvent::Online
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_offline_then_stops() {
        let client = build_client(Duration::from_secs(2)).unwrap();
        let probe = ConnectivityProbe::new(client, "http://127.0.0.1:9/api", Duration::from_millis(10));
        let (tx, mut rx) = mpsc::channel(4);

        let handle = tokio::spawn(probe.run(tx));
        assert_eq!(rx.recv().await, Some(DeviceEvent::Offline));

        drop(rx);
        // Offline is never re-sent, so the probe only notices the closed
        // channel on a transition; abort instead of waiting for one.
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
