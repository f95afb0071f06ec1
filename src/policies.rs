//! Policy management for the appliance API.
//!
//! This module covers the "Policies" endpoint family:
//!
//! - [`list_policies`] — retrieve all visible policies (single GET, bare
//!   JSON array, not paginated).
//! - [`get_policy_data`] / [`put_policy_data`] — read and write the
//!   platform-specific settings blob behind a policy.
//! - [`list_policies_with_data`] — the list plus each policy's data.
//! - [`create_policy`] / [`delete_policy`] — lifecycle.
//! - [`get_policy_list`] — allow-list / deny-list contents.
//! - [`set_automatic_upgrade`] — flip agent auto-upgrade across platforms.
//! - [`migrate_policies`] — copy custom policies between two appliances.
//!
//! ## Policy data
//!
//! The appliance exposes a policy's settings as a JSON object under
//! `{"data": {...}}` whose exact shape depends on platform and appliance
//! version. [`PolicyData`] types the handful of fields this crate
//! interprets (prevention posture, auto-upgrade) and carries every other
//! field through a flattened map, so a record fetched with
//! [`get_policy_data`] can be written back with [`put_policy_data`] without
//! losing settings this crate has never heard of. Not every platform has
//! data (mobile platforms answer 404), which is why
//! [`PolicyDetail::data`] is optional.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::client::ApplianceClient;
use crate::error::{ApplianceError, Result};

// ── Response types ─────────────────────────────────────────────────────

/// A policy as returned by the appliance list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Unique numeric identifier.
    pub id: u64,

    /// Display name. Unique per server; name collisions are why
    /// [`migrate_policies`] skips already-present names.
    #[serde(default)]
    pub name: String,

    /// Platform this policy applies to: `WINDOWS`, `MAC`, `LINUX`,
    /// `ANDROID`, `IOS`, or `CHROME`.
    #[serde(default)]
    pub os: Option<String>,

    /// True for the built-in per-platform policies. Default policies can
    /// be edited but not deleted.
    #[serde(default)]
    pub is_default_policy: bool,

    /// Owning MSP ID (multitenancy deployments).
    #[serde(default)]
    pub msp_id: Option<u64>,

    /// Owning MSP display name.
    #[serde(default)]
    pub msp_name: Option<String>,

    /// Free-form comment set at creation time.
    #[serde(default)]
    pub comment: Option<String>,
}

/// The settings blob behind a policy (`GET policies/{id}/data`).
///
/// Typed fields are the ones this crate reads or writes; everything else
/// rides in `extra` and is preserved verbatim on write-back. `None` fields
/// are omitted when serializing so a round-trip does not invent nulls the
/// server never sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyData {
    /// Whether agents under this policy upgrade themselves automatically.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic_upgrade: Option<bool>,

    /// Static analysis posture: `DISABLED`, `LOW`, `MEDIUM`, or `HIGH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prevention_level: Option<String>,

    /// Ransomware behavior response: `PREVENT`, `DETECT`, or `ALLOW`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ransomware_behavior: Option<String>,

    /// Remote code injection response: `PREVENT`, `DETECT`, or `ALLOW`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_code_injection: Option<String>,

    /// Arbitrary shellcode execution response: `PREVENT`, `DETECT`, or
    /// `ALLOW`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arbitrary_shellcode_execution: Option<String>,

    /// Known payload execution response: `PREVENT`, `DETECT`, or `ALLOW`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_payload_execution: Option<String>,

    /// Master switch for the in-memory protection features above.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_memory_protection: Option<bool>,

    /// Every other setting, preserved for verbatim write-back.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PolicyData {
    /// Whether a Windows device under this policy runs in full prevention
    /// mode.
    ///
    /// True only when static analysis is enabled (any level but
    /// `DISABLED`), in-memory protection is on, and all four behavioral
    /// responses are `PREVENT`. Anything else — including a field the
    /// server did not send — counts as detection mode.
    pub fn is_prevention_mode(&self) -> bool {
        self.prevention_level
            .as_deref()
            .is_some_and(|level| level != "DISABLED")
            && self.ransomware_behavior.as_deref() == Some("PREVENT")
            && self.in_memory_protection == Some(true)
            && self.remote_code_injection.as_deref() == Some("PREVENT")
            && self.known_payload_execution.as_deref() == Some("PREVENT")
            && self.arbitrary_shellcode_execution.as_deref() == Some("PREVENT")
    }
}

/// A policy joined with its settings blob.
///
/// `data` is `None` when the platform exposes no data endpoint (the
/// appliance answers a non-success status for e.g. mobile platforms).
#[derive(Debug, Clone)]
pub struct PolicyDetail {
    /// The policy record from the list endpoint.
    pub policy: Policy,
    /// The policy's settings, when readable.
    pub data: Option<PolicyData>,
}

/// Wire shape of the data endpoint: `{"data": {...}}`.
#[derive(Debug, Serialize, Deserialize)]
struct PolicyDataEnvelope {
    data: PolicyData,
}

/// Envelope of the allow-list / deny-list endpoints: `{"items": [...]}`.
#[derive(Debug, Deserialize)]
struct ItemsEnvelope {
    #[serde(default)]
    items: Vec<Value>,
}

// ── Request types ──────────────────────────────────────────────────────

/// Body for policy creation.
#[derive(Debug, Serialize)]
struct CreatePolicyRequest<'a> {
    name: &'a str,
    comment: &'a str,
    base_policy_id: u64,
}

/// One policy copied by [`migrate_policies`].
#[derive(Debug)]
pub struct PolicyMigration {
    /// Policy ID on the source appliance.
    pub source_id: u64,
    /// ID of the newly created policy on the destination appliance.
    pub new_id: u64,
    /// The (shared) display name.
    pub name: String,
}

// ── Exclusion lists ────────────────────────────────────────────────────

/// The per-policy allow/deny lists the appliance exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyListKind {
    /// Static analysis allow-list by file hash.
    AllowHashes,
    /// Static analysis allow-list by filesystem path.
    AllowPaths,
    /// Static analysis allow-list by signing certificate.
    AllowCertificates,
    /// Behavioral analysis allow-list by process path.
    AllowProcessPaths,
    /// Script control allow-list.
    AllowScripts,
    /// Static analysis deny-list by file hash.
    DenyHashes,
}

impl PolicyListKind {
    /// Path segment under `policies/{id}/`.
    fn path_segment(self) -> &'static str {
        match self {
            PolicyListKind::AllowHashes => "allow-list/hashes",
            PolicyListKind::AllowPaths => "allow-list/paths",
            PolicyListKind::AllowCertificates => "allow-list/certificates",
            PolicyListKind::AllowProcessPaths => "allow-list/process_paths",
            PolicyListKind::AllowScripts => "allow-list/scripts",
            PolicyListKind::DenyHashes => "deny-list/hashes",
        }
    }
}

// ── Endpoint functions ─────────────────────────────────────────────────

/// Retrieves all visible policies.
///
/// The endpoint returns a bare JSON array with the policy metadata only;
/// use [`get_policy_data`] or [`list_policies_with_data`] for settings.
///
/// # Errors
///
/// - [`ApplianceError::Api`] — non-success status.
/// - [`ApplianceError::Network`] — transport-level failure.
pub async fn list_policies(client: &ApplianceClient) -> Result<Vec<Policy>> {
    client.get("policies/").await
}

/// Retrieves the settings blob of one policy.
///
/// # Errors
///
/// [`ApplianceError::Api`] — non-success status. Platforms without a data
/// endpoint (mobile) answer 404.
pub async fn get_policy_data(client: &ApplianceClient, policy_id: u64) -> Result<PolicyData> {
    let envelope: PolicyDataEnvelope = client.get(&format!("policies/{policy_id}/data")).await?;
    Ok(envelope.data)
}

/// Writes a policy's settings blob back (PUT, 204 on success).
///
/// The record is re-wrapped in the `{"data": ...}` envelope the endpoint
/// expects. Fields fetched into [`PolicyData::extra`] are written back
/// verbatim.
///
/// # Errors
///
/// [`ApplianceError::Api`] — non-success status (422 when the blob fails
/// server-side validation).
pub async fn put_policy_data(
    client: &ApplianceClient,
    policy_id: u64,
    data: &PolicyData,
) -> Result<()> {
    let envelope = PolicyDataEnvelope { data: data.clone() };
    client
        .put_no_content(&format!("policies/{policy_id}/data"), &envelope)
        .await
}

/// Retrieves all policies together with each policy's settings.
///
/// One data request is made per policy, sequentially. A non-success data
/// response (no data for that platform) yields `data: None`; transport
/// failures propagate.
///
/// # Errors
///
/// - [`ApplianceError::Api`] — the policy *list* itself failed.
/// - [`ApplianceError::Network`] — transport-level failure on any call.
pub async fn list_policies_with_data(client: &ApplianceClient) -> Result<Vec<PolicyDetail>> {
    let policies = list_policies(client).await?;

    let mut details = Vec::with_capacity(policies.len());
    for policy in policies {
        let data = match get_policy_data(client, policy.id).await {
            Ok(data) => Some(data),
            Err(ApplianceError::Api { status, .. }) => {
                debug!(policy = policy.id, %status, "no policy data for platform");
                None
            }
            Err(e) => return Err(e),
        };
        details.push(PolicyDetail { policy, data });
    }
    Ok(details)
}

/// Creates a policy based on an existing one and returns the new record.
///
/// The new policy starts as a copy of `base_policy_id` (typically the
/// platform's default policy); adjust its settings afterwards with
/// [`put_policy_data`].
///
/// # Errors
///
/// [`ApplianceError::Api`] — non-success status (the appliance answers
/// 200 with the created policy; 409 for a name collision).
pub async fn create_policy(
    client: &ApplianceClient,
    name: &str,
    base_policy_id: u64,
    comment: &str,
) -> Result<Policy> {
    let request = CreatePolicyRequest {
        name,
        comment,
        base_policy_id,
    };
    client.post("policies/", &request).await
}

/// Deletes a policy (204 on success).
///
/// # Errors
///
/// [`ApplianceError::Api`] — non-success status:
/// - 404: no policy carries this ID.
/// - 422: the policy is a default policy, which cannot be deleted.
pub async fn delete_policy(client: &ApplianceClient, policy_id: u64) -> Result<()> {
    client.delete(&format!("policies/{policy_id}")).await
}

/// Retrieves the contents of one allow/deny list of a policy.
///
/// Items are returned opaquely — their shape differs per list kind (hashes
/// carry `{"item", "comment"}`, paths just a string, ...) and is owned by
/// the server.
///
/// # Errors
///
/// [`ApplianceError::Api`] — non-success status.
pub async fn get_policy_list(
    client: &ApplianceClient,
    policy_id: u64,
    kind: PolicyListKind,
) -> Result<Vec<Value>> {
    let envelope: ItemsEnvelope = client
        .get(&format!("policies/{policy_id}/{}", kind.path_segment()))
        .await?;
    Ok(envelope.items)
}

// ── Composite flows ────────────────────────────────────────────────────

/// Sets the automatic-upgrade flag on every policy of the given platforms
/// whose current setting differs. Returns the IDs of the modified policies.
///
/// Policies whose data is not readable are skipped with a warning; the
/// write carries the full fetched blob back, changing only the flag.
///
/// # Errors
///
/// - [`ApplianceError::Api`] — the policy list failed, or a write-back
///   failed (policies already modified stay modified).
/// - [`ApplianceError::Network`] — transport-level failure.
pub async fn set_automatic_upgrade(
    client: &ApplianceClient,
    platforms: &[&str],
    enabled: bool,
) -> Result<Vec<u64>> {
    let policies = list_policies(client).await?;

    let mut modified = Vec::new();
    for policy in policies {
        let Some(os) = policy.os.as_deref() else {
            continue;
        };
        if !platforms.contains(&os) {
            continue;
        }
        let mut data = match get_policy_data(client, policy.id).await {
            Ok(data) => data,
            Err(ApplianceError::Api { status, .. }) => {
                warn!(policy = policy.id, %status, "policy data not readable, skipping");
                continue;
            }
            Err(e) => return Err(e),
        };
        if data.automatic_upgrade == Some(enabled) {
            continue;
        }
        data.automatic_upgrade = Some(enabled);
        put_policy_data(client, policy.id, &data).await?;
        modified.push(policy.id);
    }

    Ok(modified)
}

/// Copies custom policies from one appliance to another.
///
/// For every source policy on one of the requested platforms that is not a
/// default policy, has readable data, and whose name does not already
/// exist on the destination: a new policy is created on the destination
/// from its platform default, then the source data is written over it
/// verbatim. Per-platform default policies are never migrated, and name
/// collisions are skipped — both appliance constraints.
///
/// Settings the REST API does not expose stay at the destination default's
/// values; they are not part of the data blob and cannot be copied.
///
/// # Errors
///
/// - [`ApplianceError::Collection`] is never produced here (policy lists
///   are not paginated); list, create, and data calls surface
///   [`ApplianceError::Api`] / [`ApplianceError::Network`] as usual.
///   Policies migrated before a failure remain on the destination.
pub async fn migrate_policies(
    source: &ApplianceClient,
    destination: &ApplianceClient,
    platforms: &[&str],
) -> Result<Vec<PolicyMigration>> {
    let source_policies = list_policies_with_data(source).await?;
    let destination_policies = list_policies_with_data(destination).await?;

    let destination_names: Vec<&str> = destination_policies
        .iter()
        .map(|d| d.policy.name.as_str())
        .collect();

    let mut default_policy_by_os: HashMap<&str, u64> = HashMap::new();
    for detail in &destination_policies {
        if detail.policy.is_default_policy {
            if let Some(os) = detail.policy.os.as_deref() {
                default_policy_by_os.insert(os, detail.policy.id);
            }
        }
    }

    let mut migrated = Vec::new();
    for detail in &source_policies {
        let policy = &detail.policy;
        let Some(os) = policy.os.as_deref() else {
            continue;
        };
        if !platforms.contains(&os) || policy.is_default_policy {
            continue;
        }
        if destination_names.contains(&policy.name.as_str()) {
            debug!(policy = policy.id, name = %policy.name, "name exists on destination, skipping");
            continue;
        }
        let Some(data) = detail.data.as_ref() else {
            warn!(policy = policy.id, "source policy has no readable data, skipping");
            continue;
        };
        let Some(&base_id) = default_policy_by_os.get(os) else {
            warn!(platform = os, "destination has no default policy for platform, skipping");
            continue;
        };

        let new_policy = create_policy(destination, &policy.name, base_id, "").await?;
        put_policy_data(destination, new_policy.id, data).await?;
        debug!(
            source_id = policy.id,
            new_id = new_policy.id,
            name = %policy.name,
            "policy migrated"
        );
        migrated.push(PolicyMigration {
            source_id: policy.id,
            new_id: new_policy.id,
            name: policy.name.clone(),
        });
    }

    Ok(migrated)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Policy deserialization ───────────────────────────────────────

    #[test]
    fn policy_deserializes_from_list_element() {
        let json = r#"{
            "id": 7,
            "name": "Windows hardened",
            "os": "WINDOWS",
            "is_default_policy": false,
            "msp_id": 1,
            "msp_name": "Acme MSP",
            "comment": "Servers and workstations"
        }"#;
        let policy: Policy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.id, 7);
        assert_eq!(policy.name, "Windows hardened");
        assert_eq!(policy.os.as_deref(), Some("WINDOWS"));
        assert!(!policy.is_default_policy);
        assert_eq!(policy.msp_name.as_deref(), Some("Acme MSP"));
    }

    #[test]
    fn policy_deserializes_minimal_response() {
        let policy: Policy = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert_eq!(policy.id, 1);
        assert_eq!(policy.name, "");
        assert!(!policy.is_default_policy);
    }

    // ── PolicyData round-trip ────────────────────────────────────────

    #[test]
    fn policy_data_preserves_unknown_fields_on_round_trip() {
        // The write-back path must not drop settings this crate does not
        // type. Flattened fields survive deserialize → mutate → serialize.
        let json = r#"{
            "automatic_upgrade": false,
            "prevention_level": "MEDIUM",
            "ransomware_behavior": "PREVENT",
            "detect_suspicious_activity": true,
            "d_cloud_services": {"reputation": "ENABLED"},
            "scan_network_drives": false
        }"#;
        let mut data: PolicyData = serde_json::from_str(json).unwrap();
        assert_eq!(data.automatic_upgrade, Some(false));
        assert_eq!(data.extra["d_cloud_services"]["reputation"], "ENABLED");

        data.automatic_upgrade = Some(true);
        let written = serde_json::to_value(&data).unwrap();
        assert_eq!(written["automatic_upgrade"], true);
        assert_eq!(written["prevention_level"], "MEDIUM");
        assert_eq!(written["d_cloud_services"]["reputation"], "ENABLED");
        assert_eq!(written["scan_network_drives"], false);
    }

    #[test]
    fn policy_data_omits_absent_fields_when_serialized() {
        // An absent field must stay absent on write-back, not become null.
        let data: PolicyData = serde_json::from_str(r#"{"prevention_level": "HIGH"}"#).unwrap();
        let written = serde_json::to_value(&data).unwrap();
        let object = written.as_object().unwrap();
        assert!(object.contains_key("prevention_level"));
        assert!(!object.contains_key("automatic_upgrade"));
        assert!(!object.contains_key("in_memory_protection"));
    }

    #[test]
    fn policy_data_envelope_round_trips() {
        let json = r#"{"data": {"automatic_upgrade": true}}"#;
        let envelope: PolicyDataEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.data.automatic_upgrade, Some(true));
        let written = serde_json::to_value(&envelope).unwrap();
        assert_eq!(written["data"]["automatic_upgrade"], true);
    }

    // ── Prevention mode ──────────────────────────────────────────────

    fn full_prevention() -> PolicyData {
        serde_json::from_str(
            r#"{
                "prevention_level": "HIGH",
                "ransomware_behavior": "PREVENT",
                "remote_code_injection": "PREVENT",
                "arbitrary_shellcode_execution": "PREVENT",
                "known_payload_execution": "PREVENT",
                "in_memory_protection": true
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn prevention_mode_requires_every_condition() {
        assert!(full_prevention().is_prevention_mode());

        let mut disabled = full_prevention();
        disabled.prevention_level = Some("DISABLED".to_string());
        assert!(!disabled.is_prevention_mode());

        let mut detect_only = full_prevention();
        detect_only.ransomware_behavior = Some("DETECT".to_string());
        assert!(!detect_only.is_prevention_mode());

        let mut no_in_memory = full_prevention();
        no_in_memory.in_memory_protection = Some(false);
        assert!(!no_in_memory.is_prevention_mode());

        let mut missing_field = full_prevention();
        missing_field.known_payload_execution = None;
        assert!(
            !missing_field.is_prevention_mode(),
            "a field the server did not send counts as detection mode"
        );
    }

    // ── Exclusion list paths ─────────────────────────────────────────

    #[test]
    fn policy_list_kinds_map_to_path_segments() {
        assert_eq!(
            PolicyListKind::AllowHashes.path_segment(),
            "allow-list/hashes"
        );
        assert_eq!(
            PolicyListKind::AllowProcessPaths.path_segment(),
            "allow-list/process_paths"
        );
        assert_eq!(PolicyListKind::DenyHashes.path_segment(), "deny-list/hashes");
    }

    #[test]
    fn items_envelope_defaults_to_empty() {
        let envelope: ItemsEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.items.is_empty());
    }
}
