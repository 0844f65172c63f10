//! # Sync Events
//!
//! Outbound notifications for the UI layer and inbound device signals.
//!
//! ## Event Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Platform (probe, lifecycle)        Synchronizer             UI layer   │
//! │  ───────────────────────────        ────────────             ────────   │
//! │  DeviceEvent::Online   ────────►  drain if queue  ─────►  SyncEvent::  │
//! │  DeviceEvent::Offline  ────────►  non-empty               Status       │
//! │  DeviceEvent::Foreground ──────►                          ItemSynced   │
//! │  DeviceEvent::Background ──────►                          Permanent-   │
//! │                                                           Failure      │
//! │                                                           Media-       │
//! │                                                           Confirmed    │
//! │                                                                         │
//! │  subscribe() returns a broadcast receiver; dropping it unsubscribes.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use fieldsync_core::{SyncKind, SyncStatus, Tombstone};

use crate::transport::UploadedBlob;

/// Buffered events per subscriber before the slowest one starts lagging.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Notification pushed to every subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SyncEvent {
    /// New status snapshot; sent on every change.
    Status(SyncStatus),

    /// An item was delivered and removed from the queue.
    #[serde(rename_all = "camelCase")]
    ItemSynced {
        item_id: String,
        kind: SyncKind,
        subject_id: String,
    },

    /// An item exhausted its attempts.
    PermanentFailure(Tombstone),

    /// A queued media file reached the blob store and the server.
    #[serde(rename_all = "camelCase")]
    MediaConfirmed {
        media_id: String,
        blob: UploadedBlob,
    },
}

/// Platform signal consumed by [`crate::Synchronizer::handle_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Online,
    Offline,
    Foreground,
    Background,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = SyncEvent::ItemSynced {
            item_id: "i1".into(),
            kind: SyncKind::PinSave,
            subject_id: "p1".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "item-synced");
        assert_eq!(json["kind"], "pin-save");
        assert_eq!(json["subjectId"], "p1");

        let status = SyncEvent::Status(SyncStatus::default());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["pendingItems"], 0);
    }
}
