//! Device inventory and lifecycle management for the appliance API.
//!
//! This module covers the "Devices" endpoint family:
//!
//! - [`list_devices`] — collect the full device inventory (paginated).
//! - [`get_device`] — retrieve a single device by ID.
//! - [`archive_devices`] / [`unarchive_devices`] — hide/restore devices in
//!   the console.
//! - [`remove_device`] — uninstall the agent on next check-in.
//! - [`HostMatcher`] / [`find_device_ids`] — select devices client-side by
//!   hostname, pattern, or network range.
//!
//! The response type [`Device`] captures the properties returned by the
//! appliance. Fields use `Option` where the server may omit them depending
//! on platform, agent version, or deployment state; the record is decoded
//! leniently and never validated locally.
//!
//! Listing goes through the shared pagination loop in [`crate::collect`];
//! everything else here is a single request.

use ipnet::IpNet;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::client::ApplianceClient;
use crate::collect::{CollectConfig, ResourceKind, collect_filtered};
use crate::error::Result;

// ── Response types ─────────────────────────────────────────────────────

/// A device as returned by the appliance API.
///
/// Field names match the wire contract exactly (the appliance uses
/// snake_case). Only `id` is guaranteed; everything else may be absent
/// depending on platform and agent state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Unique numeric identifier, assigned by the appliance in insertion
    /// order. Pagination cursors are watermarks over this value.
    pub id: u64,

    /// Hostname as reported by the agent (e.g. `"WS-0042"`).
    #[serde(default)]
    pub hostname: Option<String>,

    /// Last known IP address of the device.
    #[serde(default)]
    pub ip_address: Option<String>,

    /// MAC address of the primary interface.
    #[serde(default)]
    pub mac_address: Option<String>,

    /// Platform: `WINDOWS`, `MAC`, `LINUX`, `ANDROID`, `IOS`, or `CHROME`.
    #[serde(default)]
    pub os: Option<String>,

    /// Operating system version string as reported by the agent.
    #[serde(default)]
    pub osv: Option<String>,

    /// License state: `ACTIVATED`, `DEACTIVATED`, or `EXPIRED`.
    /// Deactivated devices stay in the inventory but consume no license.
    #[serde(default)]
    pub license_status: Option<String>,

    /// Connectivity state: `ONLINE` or `OFFLINE`.
    #[serde(default)]
    pub connectivity_status: Option<String>,

    /// Deployment state, e.g. `REGISTERED`, `PENDING_REMOVAL`, `MIGRATED`.
    #[serde(default)]
    pub deployment_status: Option<String>,

    /// ID of the device group this device belongs to.
    #[serde(default)]
    pub group_id: Option<u64>,

    /// Display name of the device group.
    #[serde(default)]
    pub group_name: Option<String>,

    /// ID of the policy currently applied to this device.
    #[serde(default)]
    pub policy_id: Option<u64>,

    /// Display name of the applied policy.
    #[serde(default)]
    pub policy_name: Option<String>,

    /// Owning tenant ID (multitenancy deployments).
    #[serde(default)]
    pub tenant_id: Option<u64>,

    /// Owning MSP ID (multitenancy deployments).
    #[serde(default)]
    pub msp_id: Option<u64>,

    /// Free-form tag set in the console or at install time.
    #[serde(default)]
    pub tag: Option<String>,

    /// ISO 8601 timestamp of the last agent check-in.
    #[serde(default)]
    pub last_contact: Option<String>,

    /// ISO 8601 timestamp of the initial registration.
    #[serde(default)]
    pub last_registration: Option<String>,
}

impl Device {
    /// True when the device holds an active license
    /// (`license_status == "ACTIVATED"`).
    pub fn is_activated(&self) -> bool {
        self.license_status.as_deref() == Some("ACTIVATED")
    }
}

// ── Request types ──────────────────────────────────────────────────────

/// Body for the batch archive/unarchive actions: `{"ids": [...]}`.
#[derive(Debug, Serialize)]
struct DeviceIds<'a> {
    ids: &'a [u64],
}

// ── Client-side selection ──────────────────────────────────────────────

/// Selects devices by hostname or address, client-side.
///
/// Used by the group-move flows to translate "these hosts" into device IDs
/// without any server-side query support.
#[derive(Debug, Clone)]
pub enum HostMatcher {
    /// Exact hostname list (case-sensitive, as displayed in the console).
    Hostnames(Vec<String>),
    /// Regular expressions matched from the START of the hostname: a
    /// pattern `web` selects `web01` but not `my-web01`. Anchor with `$`
    /// for a full match.
    Patterns(Vec<Regex>),
    /// Network ranges tested against the device's reported IP address.
    /// Devices with no address or an unparseable one never match.
    Cidrs(Vec<IpNet>),
}

impl HostMatcher {
    /// Whether this matcher selects the given device.
    pub fn matches(&self, device: &Device) -> bool {
        match self {
            HostMatcher::Hostnames(names) => device
                .hostname
                .as_deref()
                .is_some_and(|h| names.iter().any(|n| n == h)),
            HostMatcher::Patterns(patterns) => device.hostname.as_deref().is_some_and(|h| {
                patterns
                    .iter()
                    .any(|p| p.find(h).is_some_and(|m| m.start() == 0))
            }),
            HostMatcher::Cidrs(ranges) => device
                .ip_address
                .as_deref()
                .and_then(|ip| ip.parse::<IpAddr>().ok())
                .is_some_and(|ip| ranges.iter().any(|net| net.contains(&ip))),
        }
    }
}

/// Returns the IDs of the devices selected by `matcher`, in first-match
/// order and without duplicates.
pub fn find_device_ids(devices: &[Device], matcher: &HostMatcher) -> Vec<u64> {
    let mut ids = Vec::new();
    for device in devices {
        if matcher.matches(device) && !ids.contains(&device.id) {
            ids.push(device.id);
        }
    }
    ids
}

// ── Endpoint functions ─────────────────────────────────────────────────

/// Collects the device inventory.
///
/// By default only activated devices are returned (the inventory keeps
/// deactivated and expired devices around for history); pass
/// `include_deactivated = true` to get everything. `config` tunes the
/// pagination retry behavior, `None` for defaults.
///
/// # Errors
///
/// - [`crate::error::ApplianceError::Collection`] — the pagination retry
///   budget was exhausted; no partial inventory is returned.
/// - [`crate::error::ApplianceError::Configuration`] — rejected API key or
///   unreachable appliance.
pub async fn list_devices(
    client: &ApplianceClient,
    include_deactivated: bool,
    config: Option<&CollectConfig>,
) -> Result<Vec<Device>> {
    collect_filtered(
        client,
        ResourceKind::Devices,
        None,
        |d: &Device| include_deactivated || d.is_activated(),
        config,
    )
    .await
}

/// Retrieves a single device by its numeric ID.
///
/// # Errors
///
/// - [`crate::error::ApplianceError::Api`] — non-success status. A 404
///   means no device carries this ID (or it was archived).
/// - [`crate::error::ApplianceError::Network`] — transport-level failure.
pub async fn get_device(client: &ApplianceClient, device_id: u64) -> Result<Device> {
    client.get(&format!("devices/{device_id}")).await
}

/// Archives devices, hiding them from the default console views.
///
/// Archiving is bookkeeping only — the agent keeps running and the device
/// reappears on its next registration unless it is also deactivated.
///
/// # Errors
///
/// [`crate::error::ApplianceError::Api`] — non-success status (the
/// appliance answers 200 with no meaningful body on success).
pub async fn archive_devices(client: &ApplianceClient, ids: &[u64]) -> Result<()> {
    client
        .post_no_content("devices/actions/archive", &DeviceIds { ids })
        .await
}

/// Restores previously archived devices.
///
/// # Errors
///
/// Same error variants as [`archive_devices`].
pub async fn unarchive_devices(client: &ApplianceClient, ids: &[u64]) -> Result<()> {
    client
        .post_no_content("devices/actions/unarchive", &DeviceIds { ids })
        .await
}

/// Requests removal of a device: the agent uninstalls itself the next time
/// it checks in.
///
/// # Errors
///
/// [`crate::error::ApplianceError::Api`] — non-success status (204 is the
/// documented success answer; 404 for an unknown device ID).
pub async fn remove_device(client: &ApplianceClient, device_id: u64) -> Result<()> {
    client
        .post_empty(&format!("devices/{device_id}/actions/remove"))
        .await
}
