//! Tenant and MSP management for multi-tenant appliances.
//!
//! Hub deployments partition devices into tenants, grouped under managed
//! service providers (MSPs). This module covers the "Multitenancy"
//! endpoint family:
//!
//! - [`list_tenants`] — GET `multitenancy/tenant/`.
//! - [`list_msps`] — GET `multitenancy/msp/`.
//! - [`create_msp`] / [`delete_msp`] — MSP lifecycle (Hub-Admin only).
//!
//! Neither list is paginated; the appliance returns the full set in one
//! envelope. On a non-multitenancy appliance both lists contain a single
//! implicit entry.

use serde::{Deserialize, Serialize};

use crate::client::ApplianceClient;
use crate::error::Result;

// ── Response types ─────────────────────────────────────────────────────

/// A tenant as returned by the appliance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    /// Unique numeric identifier. Devices reference it via `tenant_id`.
    pub id: u64,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Owning MSP.
    #[serde(default)]
    pub msp_id: Option<u64>,

    /// Maximum number of activated devices this tenant may hold.
    #[serde(default)]
    pub license_limit: u64,
}

/// A managed service provider as returned by the appliance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Msp {
    /// Unique numeric identifier.
    pub id: u64,

    /// Display name. Unique per server.
    #[serde(default)]
    pub name: String,

    /// Maximum number of activated devices across this MSP's tenants.
    #[serde(default)]
    pub license_limit: u64,
}

#[derive(Debug, Deserialize)]
struct TenantsEnvelope {
    #[serde(default)]
    tenants: Vec<Tenant>,
}

#[derive(Debug, Deserialize)]
struct MspsEnvelope {
    #[serde(default)]
    msps: Vec<Msp>,
}

#[derive(Debug, Serialize)]
struct CreateMspRequest<'a> {
    name: &'a str,
    license_limit: u64,
}

// ── Endpoint functions ─────────────────────────────────────────────────

/// Retrieves all visible tenants.
///
/// # Errors
///
/// - [`ApplianceError::Api`](crate::error::ApplianceError::Api) —
///   non-success status.
/// - [`ApplianceError::Network`](crate::error::ApplianceError::Network) —
///   transport-level failure.
pub async fn list_tenants(client: &ApplianceClient) -> Result<Vec<Tenant>> {
    let envelope: TenantsEnvelope = client.get("multitenancy/tenant/").await?;
    Ok(envelope.tenants)
}

/// Retrieves all visible MSPs.
///
/// # Errors
///
/// - [`ApplianceError::Api`](crate::error::ApplianceError::Api) —
///   non-success status.
/// - [`ApplianceError::Network`](crate::error::ApplianceError::Network) —
///   transport-level failure.
pub async fn list_msps(client: &ApplianceClient) -> Result<Vec<Msp>> {
    let envelope: MspsEnvelope = client.get("multitenancy/msp/").await?;
    Ok(envelope.msps)
}

/// Creates an MSP with the given license allocation (200 on success).
///
/// # Errors
///
/// [`ApplianceError::Api`](crate::error::ApplianceError::Api) —
/// non-success status:
/// - 400: the requested limit exceeds the unallocated licenses.
/// - 401: the key is not a Hub-Admin key.
/// - 409: an MSP with this name already exists.
pub async fn create_msp(client: &ApplianceClient, name: &str, license_limit: u64) -> Result<()> {
    let request = CreateMspRequest {
        name,
        license_limit,
    };
    client.post_no_content("multitenancy/msp/", &request).await
}

/// Deletes an MSP (204 on success).
///
/// # Errors
///
/// [`ApplianceError::Api`](crate::error::ApplianceError::Api) —
/// non-success status:
/// - 403: only Hub-Admin keys may delete MSPs.
/// - 404: no MSP carries this ID.
/// - 409: the MSP still holds active devices.
pub async fn delete_msp(client: &ApplianceClient, msp_id: u64) -> Result<()> {
    client.delete(&format!("multitenancy/msp/{msp_id}")).await
}

/// Finds the ID of the MSP with the given name, case-insensitively.
///
/// Case folding is Unicode-aware, so non-ASCII names match in any casing.
pub fn find_msp_id(msps: &[Msp], name: &str) -> Option<u64> {
    let wanted = name.to_lowercase();
    msps.iter()
        .find(|msp| msp.name.to_lowercase() == wanted)
        .map(|msp| msp.id)
}
