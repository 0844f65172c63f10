//! # Autosave Scheduler
//!
//! Two cancellable timers owned by the draft engine:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Autosave Timers                                  │
//! │                                                                         │
//! │  periodic   ──┬── 30s ──┬── 30s ──┬── 30s ──►   save every period      │
//! │               start     save      save                                  │
//! │                                                                         │
//! │  debounced  edit ─ edit ─ edit ──── 1s ────►    one save per burst     │
//! │             (each edit replaces the pending timer)                      │
//! │                                                                         │
//! │  start_periodic / debounce abort the timer they replace, so at most    │
//! │  one of each is ever pending. cancel_all stops both immediately.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A fired timer runs its save as a detached task: cancelling afterwards
//! stops future saves without tearing down one already writing.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use fieldsync_sync::AutosaveSettings;

/// How soon after a mutation the debounced save fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveDelay {
    /// Cheap structural edits (removing media).
    Quick,
    /// Most edits.
    Standard,
    /// Free text typed character by character.
    Text,
}

impl SaveDelay {
    pub fn duration(&self, settings: &AutosaveSettings) -> Duration {
        let ms = match self {
            SaveDelay::Quick => settings.quick_debounce_ms,
            SaveDelay::Standard => settings.debounce_ms,
            SaveDelay::Text => settings.text_debounce_ms,
        };
        Duration::from_millis(ms)
    }
}

fn lock(slot: &Mutex<Option<JoinHandle<()>>>) -> MutexGuard<'_, Option<JoinHandle<()>>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns the periodic and debounced save timers.
#[derive(Debug, Default)]
pub struct AutosaveScheduler {
    periodic: Mutex<Option<JoinHandle<()>>>,
    debounce: Mutex<Option<JoinHandle<()>>>,
}

impl AutosaveScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)starts the periodic timer. The first save fires one `period`
    /// from now. The timer stops by itself once `tick` returns `None`.
    pub fn start_periodic<F, Fut>(&self, period: Duration, tick: F)
    where
        F: Fn() -> Option<Fut> + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                match tick() {
                    Some(save) => {
                        tokio::spawn(save);
                    }
                    None => break,
                }
            }
            debug!("Periodic autosave stopped");
        });

        if let Some(previous) = lock(&self.periodic).replace(task) {
            previous.abort();
        }
    }

    /// Runs `save` after `delay`, replacing any pending debounced save.
    pub fn debounce<Fut>(&self, delay: Duration, save: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(save);
        });

        if let Some(previous) = lock(&self.debounce).replace(task) {
            previous.abort();
        }
    }

    pub fn cancel_periodic(&self) {
        if let Some(task) = lock(&self.periodic).take() {
            task.abort();
        }
    }

    pub fn cancel_debounce(&self) {
        if let Some(task) = lock(&self.debounce).take() {
            task.abort();
        }
    }

    /// Stops both timers. Nothing fires after this returns.
    pub fn cancel_all(&self) {
        self.cancel_periodic();
        self.cancel_debounce();
    }

    pub fn is_periodic_running(&self) -> bool {
        lock(&self.periodic)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub fn is_debounce_pending(&self) -> bool {
        lock(&self.debounce)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for AutosaveScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
