//! Security event retrieval and archiving for the appliance API.
//!
//! This module covers the "Events" endpoint family, which exists twice on
//! the appliance: once for confirmed events and once for suspicious
//! (lower-confidence) events with an identical shape:
//!
//! - [`list_events`] / [`list_suspicious_events`] — collect events matching
//!   a search payload (paginated POST).
//! - [`get_event`] / [`get_suspicious_event`] — retrieve one event by ID.
//! - [`archive_events`] / [`unarchive_events`] and the suspicious variants —
//!   batch visibility management.
//!
//! Search payloads are opaque to this crate: the appliance accepts a JSON
//! criteria object (severity, status, time window, device attribution, ...)
//! that is forwarded verbatim. An absent payload is sent as `{}`, which the
//! server reads as "everything".

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::ApplianceClient;
use crate::collect::{CollectConfig, ResourceKind, collect};
use crate::error::Result;

// ── Response types ─────────────────────────────────────────────────────

/// A security event as returned by the appliance API.
///
/// Only `id` is guaranteed. The record is decoded leniently: absent fields
/// become `None` and unknown fields are ignored, so the same struct works
/// across appliance versions and for both event families.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique numeric identifier; pagination cursors are watermarks over
    /// this value.
    pub id: u64,

    /// Event category, e.g. `STATIC_ANALYSIS`, `RANSOMWARE_FILE_ENCRYPTION`,
    /// `REMOTE_CODE_INJECTION_EXECUTION`, `KNOWN_PAYLOAD_EXECUTION`.
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,

    /// Workflow state: `OPEN` or `CLOSED`.
    #[serde(default)]
    pub status: Option<String>,

    /// What the agent did: `PREVENTED`, `DETECTED`, or `NONE`.
    #[serde(default)]
    pub action: Option<String>,

    /// Severity bucket: `NONE`, `LOW`, `MODERATE`, `HIGH`, or `VERY_HIGH`.
    #[serde(default)]
    pub threat_severity: Option<String>,

    /// What fired the verdict, e.g. `BRAIN` (static model) or a behavioral
    /// trigger name.
    #[serde(default)]
    pub trigger: Option<String>,

    /// SHA-256 of the file involved, when the event concerns a file.
    #[serde(default)]
    pub file_hash: Option<String>,

    /// Filesystem path involved in the event.
    #[serde(default)]
    pub path: Option<String>,

    /// File size in bytes, when applicable.
    #[serde(default)]
    pub file_size: Option<u64>,

    /// ID of the device the event was recorded on.
    #[serde(default)]
    pub device_id: Option<u64>,

    /// Owning tenant ID (multitenancy deployments).
    #[serde(default)]
    pub tenant_id: Option<u64>,

    /// Owning MSP ID (multitenancy deployments).
    #[serde(default)]
    pub msp_id: Option<u64>,

    /// ISO 8601 timestamp of when the event occurred on the device.
    #[serde(default)]
    pub timestamp: Option<String>,

    /// ISO 8601 timestamp of when the appliance ingested the event.
    #[serde(default)]
    pub insertion_timestamp: Option<String>,

    /// Snapshot of the device at recording time (hostname, OS, group,
    /// tenant name). Kept opaque — the shape varies by appliance version.
    #[serde(default)]
    pub recorded_device_info: Option<Value>,
}

/// Single-event envelope returned by the get-by-ID endpoints:
/// `{"event": {...}}`.
#[derive(Debug, Deserialize)]
struct EventEnvelope {
    event: Event,
}

// ── Request types ──────────────────────────────────────────────────────

/// Body for the batch archive/unarchive actions: `{"ids": [...]}`.
#[derive(Debug, Serialize)]
struct EventIds<'a> {
    ids: &'a [u64],
}

// ── Endpoint functions ─────────────────────────────────────────────────

/// Collects events matching `search`, walking the cursor to the end of the
/// dataset.
///
/// `search` is forwarded verbatim as the POST body (`{}` when `None`).
/// Use `config.start_after` to skip events at or below a known ID, e.g.
/// the highest ID processed by a previous export run.
///
/// # Errors
///
/// - [`crate::error::ApplianceError::InvalidFilter`] — the appliance
///   rejected the search payload (400-class).
/// - [`crate::error::ApplianceError::Collection`] — retry budget exhausted;
///   no partial result is returned.
pub async fn list_events(
    client: &ApplianceClient,
    search: Option<&Value>,
    config: Option<&CollectConfig>,
) -> Result<Vec<Event>> {
    collect(client, ResourceKind::Events, search, config).await
}

/// Collects suspicious events matching `search`.
///
/// Identical contract to [`list_events`] against the lower-confidence
/// event store.
///
/// # Errors
///
/// Same error variants as [`list_events`].
pub async fn list_suspicious_events(
    client: &ApplianceClient,
    search: Option<&Value>,
    config: Option<&CollectConfig>,
) -> Result<Vec<Event>> {
    collect(client, ResourceKind::SuspiciousEvents, search, config).await
}

/// Retrieves a single event by ID.
///
/// # Errors
///
/// [`crate::error::ApplianceError::Api`] — non-success status; 404 means
/// no event carries this ID (or it lives in the suspicious store — try
/// [`get_suspicious_event`]).
pub async fn get_event(client: &ApplianceClient, event_id: u64) -> Result<Event> {
    let envelope: EventEnvelope = client.get(&format!("events/{event_id}")).await?;
    Ok(envelope.event)
}

/// Retrieves a single suspicious event by ID.
///
/// # Errors
///
/// Same error variants as [`get_event`].
pub async fn get_suspicious_event(client: &ApplianceClient, event_id: u64) -> Result<Event> {
    let envelope: EventEnvelope = client
        .get(&format!("suspicious-events/{event_id}"))
        .await?;
    Ok(envelope.event)
}

/// Posts a batch visibility action against one of the two event stores.
///
/// All four public archive/unarchive wrappers delegate here; the appliance
/// answers 204 with no body on success.
async fn event_action(
    client: &ApplianceClient,
    family: &str,
    action: &str,
    ids: &[u64],
) -> Result<()> {
    client
        .post_no_content(&format!("{family}/actions/{action}"), &EventIds { ids })
        .await
}

/// Archives events, hiding them from the default console views.
///
/// # Errors
///
/// [`crate::error::ApplianceError::Api`] — non-success status.
pub async fn archive_events(client: &ApplianceClient, ids: &[u64]) -> Result<()> {
    event_action(client, "events", "archive", ids).await
}

/// Restores previously archived events.
///
/// # Errors
///
/// Same error variants as [`archive_events`].
pub async fn unarchive_events(client: &ApplianceClient, ids: &[u64]) -> Result<()> {
    event_action(client, "events", "unarchive", ids).await
}

/// Archives suspicious events.
///
/// # Errors
///
/// Same error variants as [`archive_events`].
pub async fn archive_suspicious_events(client: &ApplianceClient, ids: &[u64]) -> Result<()> {
    event_action(client, "suspicious-events", "archive", ids).await
}

/// Restores previously archived suspicious events.
///
/// # Errors
///
/// Same error variants as [`archive_events`].
pub async fn unarchive_suspicious_events(client: &ApplianceClient, ids: &[u64]) -> Result<()> {
    event_action(client, "suspicious-events", "unarchive", ids).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_deserializes_full_response() {
        let json = r#"{
            "id": 6105,
            "type": "STATIC_ANALYSIS",
            "trigger": "BRAIN",
            "action": "PREVENTED",
            "status": "OPEN",
            "threat_severity": "VERY_HIGH",
            "file_hash": "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08",
            "path": "C:\\Users\\jdoe\\Downloads\\invoice.exe",
            "file_size": 482133,
            "device_id": 1751,
            "tenant_id": 2,
            "msp_id": 1,
            "timestamp": "2026-03-01T11:02:33.000Z",
            "insertion_timestamp": "2026-03-01T11:02:40.000Z",
            "recorded_device_info": {
                "os": "WINDOWS",
                "hostname": "WS-0042",
                "tenant_name": "Acme East"
            }
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.id, 6105);
        assert_eq!(event.event_type.as_deref(), Some("STATIC_ANALYSIS"));
        assert_eq!(event.action.as_deref(), Some("PREVENTED"));
        assert_eq!(event.threat_severity.as_deref(), Some("VERY_HIGH"));
        assert_eq!(event.device_id, Some(1751));
        let info = event.recorded_device_info.unwrap();
        assert_eq!(info["hostname"], "WS-0042");
    }

    #[test]
    fn event_deserializes_minimal_response() {
        let event: Event = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert_eq!(event.id, 1);
        assert!(event.event_type.is_none());
        assert!(event.recorded_device_info.is_none());
    }

    #[test]
    fn event_tolerates_unknown_fields() {
        let json = r#"{"id": 2, "sandbox_status": "DONE", "deep_classification": "RANSOMWARE"}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.id, 2);
    }

    #[test]
    fn single_event_envelope_unwraps() {
        let json = r#"{"event": {"id": 77, "status": "CLOSED"}}"#;
        let envelope: EventEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.event.id, 77);
        assert_eq!(envelope.event.status.as_deref(), Some("CLOSED"));
    }
}
