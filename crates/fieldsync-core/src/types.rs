//! # Domain Types
//!
//! Core domain types used throughout FieldSync.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ InspectionDraft │   │   MediaItem     │   │    MapPin       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │──►│  id (UUID)      │   │  id (UUID)      │       │
//! │  │  address        │   │  url/thumbnail  │   │  location       │       │
//! │  │  media[]        │   │  upload_status  │   │  description    │       │
//! │  │  map_pins[]  ───┼──►│  owner_info?    │   │  is_urgent      │       │
//! │  │  progress       │   └─────────────────┘   └─────────────────┘       │
//! │  │  status         │                                                    │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  SyncItem { id, payload: SyncPayload, priority, attempts, ... } │   │
//! │  │                                                                 │   │
//! │  │  SyncPayload::Inspection(InspectionDraft)                       │   │
//! │  │  SyncPayload::MediaUpload(MediaItem)                            │   │
//! │  │  SyncPayload::PinSave(MapPin)                                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership
//! A [`MediaItem`] belongs to exactly one [`InspectionDraft`]. While its
//! upload is pending a copy of it also travels inside a
//! [`SyncPayload::MediaUpload`] item.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{DEFAULT_MAX_ATTEMPTS, DEFAULT_TOTAL_STEPS, MAX_STEPS};

/// Generates a fresh identifier (UUID v4, offline-safe).
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Location
// =============================================================================

/// Mean Earth radius used by the haversine formula.
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A device position reported by the coordinate provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters, when the platform reports one.
    pub accuracy: Option<f64>,
    #[ts(as = "Option<String>")]
    pub captured_at: Option<DateTime<Utc>>,
}

impl Coordinates {
    /// Creates coordinates without accuracy or timestamp.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Coordinates {
            latitude,
            longitude,
            accuracy: None,
            captured_at: None,
        }
    }

    /// Great-circle distance to `other` in meters.
    pub fn distance_meters(&self, other: &Coordinates) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lng = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_METERS * c
    }
}

/// A bare latitude/longitude pair, as stored on addresses and pins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl From<Coordinates> for GeoPoint {
    fn from(c: Coordinates) -> Self {
        GeoPoint {
            lat: c.latitude,
            lng: c.longitude,
        }
    }
}

// =============================================================================
// Address
// =============================================================================

/// Property address of an inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    /// Single-line display form.
    pub formatted: String,
    pub coordinates: Option<GeoPoint>,
}

impl Default for Address {
    fn default() -> Self {
        Address {
            street: String::new(),
            city: String::new(),
            state: String::new(),
            zip_code: String::new(),
            country: "US".to_string(),
            formatted: String::new(),
            coordinates: None,
        }
    }
}

impl Address {
    /// An empty address pre-filled with the given coordinates.
    pub fn at(coordinates: Option<GeoPoint>) -> Self {
        Address {
            coordinates,
            ..Default::default()
        }
    }

    /// True when neither a street nor a formatted line has been entered.
    pub fn is_blank(&self) -> bool {
        self.street.trim().is_empty() && self.formatted.trim().is_empty()
    }
}

// =============================================================================
// Media
// =============================================================================

/// Contact details of the property owner, attached by value to a media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OwnerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Photo,
    Video,
}

impl MediaType {
    /// Classifies a MIME type; anything that is not `video/*` is a photo.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("video/") {
            MediaType::Video
        } else {
            MediaType::Photo
        }
    }
}

/// Upload state of a single media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    #[default]
    Pending,
    Uploading,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum MediaQuality {
    Low,
    #[default]
    Medium,
    High,
}

/// A photo or video captured for an inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    /// Remote URL once uploaded, local preview URL while pending.
    pub url: String,
    pub thumbnail_url: String,
    pub filename: String,
    /// Original size in bytes.
    pub size: u64,
    pub compressed_size: Option<u64>,
    #[ts(as = "String")]
    pub captured_at: DateTime<Utc>,
    pub location: Option<Coordinates>,
    pub tags: Vec<String>,
    pub owner_info: Option<OwnerInfo>,
    pub upload_status: UploadStatus,
    pub quality: MediaQuality,
    /// Source file on the device, kept until the remote copy is confirmed.
    pub local_path: Option<String>,
}

impl MediaItem {
    /// True while the item still points at a local preview.
    pub fn is_pending(&self) -> bool {
        self.upload_status != UploadStatus::Completed
    }
}

// =============================================================================
// Map Pins
// =============================================================================

/// A point of interest dropped on the inspection map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MapPin {
    pub id: String,
    pub location: GeoPoint,
    pub description: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub media: Vec<MediaItem>,
    pub is_urgent: bool,
}

/// Caller-supplied fields of a new pin; id and timestamp are assigned on add.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMapPin {
    pub location: GeoPoint,
    pub description: String,
    #[serde(default)]
    pub media: Vec<MediaItem>,
    #[serde(default)]
    pub is_urgent: bool,
}

impl NewMapPin {
    /// Assigns an id and creation time.
    pub fn into_pin(self) -> MapPin {
        MapPin {
            id: new_id(),
            location: self.location,
            description: self.description,
            created_at: Utc::now(),
            media: self.media,
            is_urgent: self.is_urgent,
        }
    }
}

// =============================================================================
// Inspection Progress
// =============================================================================

/// Names recorded in `completed_steps` for the default three-step flow.
pub const STEP_NAMES: [&str; 3] = ["address", "media", "review"];

/// Returns the name recorded when `step` (1-based) is completed.
pub fn step_name(step: u32) -> String {
    match step {
        1..=3 => STEP_NAMES[(step - 1) as usize].to_string(),
        n => format!("step-{}", n),
    }
}

/// Monotonic step tracker of an inspection.
///
/// `total_steps` never decreases and `completed_steps` only grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InspectionProgress {
    pub current_step: u32,
    pub total_steps: u32,
    pub completed_steps: Vec<String>,
}

impl Default for InspectionProgress {
    fn default() -> Self {
        InspectionProgress {
            current_step: 1,
            total_steps: DEFAULT_TOTAL_STEPS,
            completed_steps: Vec::new(),
        }
    }
}

impl InspectionProgress {
    /// Records `name` as completed unless it already is.
    pub fn mark_complete(&mut self, name: &str) {
        if !self.completed_steps.iter().any(|s| s == name) {
            self.completed_steps.push(name.to_string());
        }
    }

    /// Moves to `step`, marking every earlier step completed.
    ///
    /// Moving backwards changes only `current_step`; completions stay.
    /// Steps are clamped to `1..=MAX_STEPS`.
    pub fn set_step(&mut self, step: u32) {
        let step = step.clamp(1, MAX_STEPS);
        self.current_step = step;
        if step > self.total_steps {
            self.total_steps = step;
        }

        let done: HashSet<String> = self.completed_steps.iter().cloned().collect();
        let missing: Vec<String> = (1..step)
            .map(step_name)
            .filter(|name| !done.contains(name))
            .collect();
        self.completed_steps.extend(missing);
    }
}

// =============================================================================
// Inspection Status
// =============================================================================

/// Lifecycle of an inspection.
///
/// ```text
/// draft → in-progress → pending-upload → uploading → submitted
///       → under-review → { completed | rejected }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum InspectionStatus {
    #[default]
    Draft,
    InProgress,
    PendingUpload,
    Uploading,
    Submitted,
    UnderReview,
    Completed,
    Rejected,
}

impl InspectionStatus {
    /// Position in the lifecycle; the two terminal states share a rank.
    fn rank(&self) -> u8 {
        match self {
            InspectionStatus::Draft => 0,
            InspectionStatus::InProgress => 1,
            InspectionStatus::PendingUpload => 2,
            InspectionStatus::Uploading => 3,
            InspectionStatus::Submitted => 4,
            InspectionStatus::UnderReview => 5,
            InspectionStatus::Completed | InspectionStatus::Rejected => 6,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InspectionStatus::Completed | InspectionStatus::Rejected)
    }

    /// True if moving to `next` goes strictly forward in the lifecycle.
    pub fn can_advance_to(&self, next: InspectionStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl std::fmt::Display for InspectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InspectionStatus::Draft => "draft",
            InspectionStatus::InProgress => "in-progress",
            InspectionStatus::PendingUpload => "pending-upload",
            InspectionStatus::Uploading => "uploading",
            InspectionStatus::Submitted => "submitted",
            InspectionStatus::UnderReview => "under-review",
            InspectionStatus::Completed => "completed",
            InspectionStatus::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// Inspection Draft
// =============================================================================

/// The unit of field work: an inspection being authored or already submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InspectionDraft {
    pub id: String,
    pub address: Address,
    pub media: Vec<MediaItem>,
    pub map_pins: Vec<MapPin>,
    pub notes: String,
    pub is_urgent: bool,
    pub tags: Vec<String>,
    pub progress: InspectionProgress,
    pub status: InspectionStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub draft_saved_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl InspectionDraft {
    /// Creates an empty draft at step 1 of 3.
    pub fn new(address: Address) -> Self {
        let now = Utc::now();
        InspectionDraft {
            id: new_id(),
            address,
            media: Vec::new(),
            map_pins: Vec::new(),
            notes: String::new(),
            is_urgent: false,
            tags: Vec::new(),
            progress: InspectionProgress::default(),
            status: InspectionStatus::Draft,
            created_at: now,
            updated_at: now,
            draft_saved_at: None,
            submitted_at: None,
        }
    }

    /// Stamps `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn media_mut(&mut self, media_id: &str) -> Option<&mut MediaItem> {
        self.media.iter_mut().find(|m| m.id == media_id)
    }

    /// Adds tags not already present, keeping existing order.
    pub fn merge_tags<'a>(&mut self, tags: impl IntoIterator<Item = &'a str>) {
        for tag in tags {
            if !self.tags.iter().any(|t| t == tag) {
                self.tags.push(tag.to_string());
            }
        }
    }
}

// =============================================================================
// Sync Items
// =============================================================================

/// Kind of pending work; the synchronizer dispatches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum SyncKind {
    Inspection,
    MediaUpload,
    PinSave,
}

impl std::fmt::Display for SyncKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncKind::Inspection => write!(f, "inspection"),
            SyncKind::MediaUpload => write!(f, "media-upload"),
            SyncKind::PinSave => write!(f, "pin-save"),
        }
    }
}

/// Domain object needed to rebuild the upload request of a sync item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum SyncPayload {
    Inspection(InspectionDraft),
    MediaUpload(MediaItem),
    PinSave(MapPin),
}

impl SyncPayload {
    pub fn kind(&self) -> SyncKind {
        match self {
            SyncPayload::Inspection(_) => SyncKind::Inspection,
            SyncPayload::MediaUpload(_) => SyncKind::MediaUpload,
            SyncPayload::PinSave(_) => SyncKind::PinSave,
        }
    }

    /// Id of the inspection, media item or pin carried by the payload.
    pub fn subject_id(&self) -> &str {
        match self {
            SyncPayload::Inspection(d) => &d.id,
            SyncPayload::MediaUpload(m) => &m.id,
            SyncPayload::PinSave(p) => &p.id,
        }
    }
}

/// A unit of pending work in the sync queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SyncItem {
    /// Assigned at enqueue time, stable for the item's lifetime.
    pub id: String,
    pub payload: SyncPayload,
    /// Higher values drain first.
    pub priority: i32,
    pub attempts: u32,
    pub max_attempts: u32,
    #[ts(as = "String")]
    pub enqueued_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SyncItem {
    /// Creates a fresh item with zero attempts.
    pub fn new(payload: SyncPayload, priority: i32, max_attempts: u32) -> Self {
        SyncItem {
            id: new_id(),
            payload,
            priority,
            attempts: 0,
            max_attempts: if max_attempts == 0 {
                DEFAULT_MAX_ATTEMPTS
            } else {
                max_attempts
            },
            enqueued_at: Utc::now(),
            last_attempt_at: None,
            last_error: None,
        }
    }

    pub fn kind(&self) -> SyncKind {
        self.payload.kind()
    }

    /// True once the attempt ceiling has been reached.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// Record of a sync item removed after exhausting its attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    pub item: SyncItem,
    #[ts(as = "String")]
    pub failed_at: DateTime<Utc>,
    pub last_error: String,
}

/// Status snapshot pushed to UI subscribers on every change.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_online: bool,
    pub pending_items: usize,
    #[ts(as = "Option<String>")]
    pub last_sync_time: Option<DateTime<Utc>>,
    pub sync_in_progress: bool,
    /// Most recent delivery error, cleared by a fully successful cycle.
    pub last_error: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_draft_defaults() {
        let draft = InspectionDraft::new(Address::default());
        assert_eq!(draft.status, InspectionStatus::Draft);
        assert_eq!(draft.progress.current_step, 1);
        assert_eq!(draft.progress.total_steps, 3);
        assert!(draft.progress.completed_steps.is_empty());
        assert_eq!(draft.address.country, "US");
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut progress = InspectionProgress::default();
        progress.set_step(3);
        assert_eq!(progress.completed_steps, vec!["address", "media"]);

        progress.set_step(1);
        assert_eq!(progress.current_step, 1);
        assert_eq!(progress.total_steps, 3);
        assert_eq!(progress.completed_steps.len(), 2);

        progress.set_step(5);
        assert_eq!(progress.total_steps, 5);
        assert_eq!(
            progress.completed_steps,
            vec!["address", "media", "review", "step-4"]
        );
    }

    #[test]
    fn test_out_of_range_step_is_clamped() {
        let mut progress = InspectionProgress::default();
        progress.set_step(u32::MAX);
        assert_eq!(progress.current_step, MAX_STEPS);
        assert_eq!(progress.total_steps, MAX_STEPS);
        assert_eq!(progress.completed_steps.len(), (MAX_STEPS - 1) as usize);

        progress.set_step(0);
        assert_eq!(progress.current_step, 1);
        assert_eq!(progress.total_steps, MAX_STEPS);

        progress.set_step(MAX_STEPS);
        assert_eq!(progress.completed_steps.len(), (MAX_STEPS - 1) as usize);
    }

    #[test]
    fn test_status_transitions() {
        assert!(InspectionStatus::Submitted.can_advance_to(InspectionStatus::UnderReview));
        assert!(InspectionStatus::UnderReview.can_advance_to(InspectionStatus::Rejected));
        assert!(!InspectionStatus::Submitted.can_advance_to(InspectionStatus::Draft));
        assert!(!InspectionStatus::Completed.can_advance_to(InspectionStatus::Rejected));
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        let json = serde_json::to_string(&InspectionStatus::PendingUpload).unwrap();
        assert_eq!(json, "\"pending-upload\"");
        assert_eq!(InspectionStatus::UnderReview.to_string(), "under-review");
    }

    #[test]
    fn test_payload_is_tagged_by_kind() {
        let pin = NewMapPin {
            location: GeoPoint { lat: 1.0, lng: 2.0 },
            description: "gutter".into(),
            media: vec![],
            is_urgent: false,
        }
        .into_pin();
        let item = SyncItem::new(SyncPayload::PinSave(pin.clone()), 1, 3);

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["payload"]["kind"], "pin-save");
        assert_eq!(item.kind(), SyncKind::PinSave);
        assert_eq!(item.payload.subject_id(), pin.id);
    }

    #[test]
    fn test_zero_max_attempts_falls_back_to_default() {
        let item = SyncItem::new(SyncPayload::Inspection(InspectionDraft::new(Address::default())), 3, 0);
        assert_eq!(item.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(!item.is_exhausted());
    }

    #[test]
    fn test_merge_tags_is_set_union() {
        let mut draft = InspectionDraft::new(Address::default());
        draft.tags = vec!["Mold".to_string()];
        draft.merge_tags(["Flooding", "Mold", "Flooding"]);
        assert_eq!(draft.tags, vec!["Mold", "Flooding"]);
    }

    #[test]
    fn test_distance_meters() {
        let a = Coordinates::new(52.5200, 13.4050);
        let b = Coordinates::new(48.8566, 2.3522);
        let d = a.distance_meters(&b);
        assert!((d - 877_000.0).abs() < 5_000.0, "got {}", d);
        assert!(a.distance_meters(&a) < 1e-6);
    }
}
