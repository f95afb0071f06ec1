//! Device group management for the appliance API.
//!
//! This module covers the "Groups" endpoint family:
//!
//! - [`list_groups`] — retrieve all visible device groups (single GET, the
//!   group list is small and not paginated).
//! - [`find_group_id`] — pure, case-insensitive name → ID lookup.
//! - [`add_devices_to_group`] / [`remove_devices_from_group`] — batch
//!   membership changes.
//! - [`move_devices`] — composite: select devices with a
//!   [`HostMatcher`], resolve a target group by name, move the selection.
//! - [`clear_group_assignment`] — composite: return named devices to
//!   automatic (rule-based) group assignment.
//!
//! Every appliance ships default groups (one per platform) that devices
//! fall into when no explicit assignment exists. Default groups cannot be
//! move targets, so the composite flows exclude them when resolving names.

use serde::{Deserialize, Serialize};

use crate::client::ApplianceClient;
use crate::collect::CollectConfig;
use crate::devices::{HostMatcher, find_device_ids, list_devices};
use crate::error::{ApplianceError, Result};

// ── Response types ─────────────────────────────────────────────────────

/// A device group as returned by the appliance API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceGroup {
    /// Unique numeric identifier.
    pub id: u64,

    /// Display name shown in the console.
    #[serde(default)]
    pub name: String,

    /// Platform this group accepts: `WINDOWS`, `MAC`, etc.
    #[serde(default)]
    pub os: Option<String>,

    /// True for the built-in per-platform groups that collect devices with
    /// no explicit assignment.
    #[serde(default)]
    pub is_default_group: bool,

    /// ID of the policy applied to members of this group.
    #[serde(default)]
    pub policy_id: Option<u64>,

    /// Owning MSP ID (multitenancy deployments).
    #[serde(default)]
    pub msp_id: Option<u64>,
}

// ── Request types ──────────────────────────────────────────────────────

/// Body for the membership actions: `{"devices": [...]}`.
#[derive(Debug, Serialize)]
struct GroupDevices<'a> {
    devices: &'a [u64],
}

/// Result of a [`move_devices`] call.
#[derive(Debug)]
pub struct MovedDevices {
    /// The group the devices were added to.
    pub group_id: u64,
    /// The device IDs that matched and were moved (may be empty).
    pub device_ids: Vec<u64>,
}

// ── Endpoint functions ─────────────────────────────────────────────────

/// Retrieves all visible device groups.
///
/// The endpoint returns a bare JSON array (no envelope, no pagination).
/// With `exclude_default_groups` the built-in per-platform groups are
/// dropped client-side, leaving only groups that can be assignment targets.
///
/// # Errors
///
/// - [`ApplianceError::Api`] — non-success status.
/// - [`ApplianceError::Network`] — transport-level failure.
pub async fn list_groups(
    client: &ApplianceClient,
    exclude_default_groups: bool,
) -> Result<Vec<DeviceGroup>> {
    let mut groups: Vec<DeviceGroup> = client.get("groups/").await?;
    if exclude_default_groups {
        groups.retain(|g| !g.is_default_group);
    }
    Ok(groups)
}

/// Looks up a group ID by display name, case-insensitively.
///
/// Returns `None` when no group carries the name. Case folding is
/// Unicode-aware, so non-ASCII names match in any casing. Works on an
/// already-fetched list so composite flows resolve names without extra
/// round-trips.
pub fn find_group_id(groups: &[DeviceGroup], name: &str) -> Option<u64> {
    let wanted = name.to_lowercase();
    groups
        .iter()
        .find(|g| g.name.to_lowercase() == wanted)
        .map(|g| g.id)
}

/// Adds devices to a group. The appliance answers 204 with no body.
///
/// Moving a device into a group also switches it to the group's policy on
/// its next check-in.
///
/// # Errors
///
/// [`ApplianceError::Api`] — non-success status (404 for an unknown group,
/// 422 when the target is a default group).
pub async fn add_devices_to_group(
    client: &ApplianceClient,
    group_id: u64,
    device_ids: &[u64],
) -> Result<()> {
    client
        .post_no_content(
            &format!("groups/{group_id}/add-devices"),
            &GroupDevices {
                devices: device_ids,
            },
        )
        .await
}

/// Removes devices from a group, returning them to automatic assignment.
///
/// # Errors
///
/// Same error variants as [`add_devices_to_group`].
pub async fn remove_devices_from_group(
    client: &ApplianceClient,
    group_id: u64,
    device_ids: &[u64],
) -> Result<()> {
    client
        .post_no_content(
            &format!("groups/{group_id}/remove-devices"),
            &GroupDevices {
                devices: device_ids,
            },
        )
        .await
}

// ── Composite flows ────────────────────────────────────────────────────

/// Moves every device selected by `matcher` into the group named
/// `group_name`.
///
/// The selection runs over activated devices only, and the target is
/// resolved among non-default groups (default groups cannot be move
/// targets). When nothing matches, no membership request is made and the
/// returned [`MovedDevices::device_ids`] is empty.
///
/// # Errors
///
/// - [`ApplianceError::GroupNotFound`] — no non-default group carries
///   `group_name`.
/// - [`ApplianceError::Collection`] — the device inventory collection
///   exhausted its retry budget.
/// - [`ApplianceError::Api`] / [`ApplianceError::Network`] — a single call
///   failed.
pub async fn move_devices(
    client: &ApplianceClient,
    matcher: &HostMatcher,
    group_name: &str,
    config: Option<&CollectConfig>,
) -> Result<MovedDevices> {
    let devices = list_devices(client, false, config).await?;
    let device_ids = find_device_ids(&devices, matcher);

    let groups = list_groups(client, true).await?;
    let group_id =
        find_group_id(&groups, group_name).ok_or_else(|| ApplianceError::GroupNotFound {
            name: group_name.to_string(),
        })?;

    if !device_ids.is_empty() {
        add_devices_to_group(client, group_id, &device_ids).await?;
    }

    Ok(MovedDevices {
        group_id,
        device_ids,
    })
}

/// Removes any explicit group assignment from the devices with the given
/// hostnames, returning them to automatic assignment.
///
/// Devices are matched by exact hostname among activated devices; each
/// match is removed from its current group individually. Returns how many
/// devices were moved. Devices with no hostname or no current group are
/// skipped.
///
/// # Errors
///
/// - [`ApplianceError::Collection`] — the device inventory collection
///   exhausted its retry budget.
/// - [`ApplianceError::Api`] / [`ApplianceError::Network`] — a removal
///   call failed; earlier removals in the batch remain applied.
pub async fn clear_group_assignment(
    client: &ApplianceClient,
    hostnames: &[String],
    config: Option<&CollectConfig>,
) -> Result<usize> {
    let devices = list_devices(client, false, config).await?;

    let mut moved = 0;
    for device in &devices {
        let Some(hostname) = device.hostname.as_deref() else {
            continue;
        };
        if !hostnames.iter().any(|h| h == hostname) {
            continue;
        }
        let Some(group_id) = device.group_id else {
            continue;
        };
        remove_devices_from_group(client, group_id, &[device.id]).await?;
        moved += 1;
    }

    Ok(moved)
}
