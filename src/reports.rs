//! Reports computed from appliance records.
//!
//! Everything here is pure: the caller fetches devices, tenants, MSPs, and
//! policies with the endpoint modules, then joins them locally. No
//! additional requests are made, so a report is always consistent with the
//! snapshot it was computed from.
//!
//! - [`license_usage`] — activated-device counts per tenant against each
//!   tenant's license allocation.
//! - [`windows_policy_compliance`] — per-policy check of the Windows
//!   prevention settings, with one violation line per misconfigured field.
//! - [`windows_prevention_summary`] — device counts split by whether the
//!   assigned policy runs in prevention or detection mode.

use crate::devices::Device;
use crate::multitenancy::{Msp, Tenant};
use crate::policies::{PolicyData, PolicyDetail};

// ── License usage ──────────────────────────────────────────────────────

/// License consumption of one tenant.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantLicenseUsage {
    /// Tenant ID.
    pub tenant_id: u64,
    /// Tenant display name.
    pub tenant_name: String,
    /// Name of the owning MSP, when the tenant's `msp_id` resolved.
    pub msp_name: Option<String>,
    /// Number of activated devices in this tenant.
    pub licenses_used: u64,
    /// The tenant's license allocation.
    pub license_limit: u64,
    /// `licenses_used` as a percentage of the limit; 0 when the limit is 0.
    pub percent_used: f64,
}

/// Computes per-tenant license usage from fetched records.
///
/// A device consumes a license when its `license_status` is `ACTIVATED`
/// and its `tenant_id` matches the tenant. Rows come back sorted by MSP
/// name, then tenant name.
pub fn license_usage(tenants: &[Tenant], msps: &[Msp], devices: &[Device]) -> Vec<TenantLicenseUsage> {
    let mut rows: Vec<TenantLicenseUsage> = tenants
        .iter()
        .map(|tenant| {
            let msp_name = tenant
                .msp_id
                .and_then(|id| msps.iter().find(|msp| msp.id == id))
                .map(|msp| msp.name.clone());
            let licenses_used = devices
                .iter()
                .filter(|device| device.is_activated() && device.tenant_id == Some(tenant.id))
                .count() as u64;
            let percent_used = if tenant.license_limit > 0 {
                licenses_used as f64 / tenant.license_limit as f64 * 100.0
            } else {
                0.0
            };
            TenantLicenseUsage {
                tenant_id: tenant.id,
                tenant_name: tenant.name.clone(),
                msp_name,
                licenses_used,
                license_limit: tenant.license_limit,
                percent_used,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        (a.msp_name.as_deref(), a.tenant_name.as_str())
            .cmp(&(b.msp_name.as_deref(), b.tenant_name.as_str()))
    });
    rows
}

// ── Windows policy compliance ──────────────────────────────────────────

/// Compliance verdict for one Windows policy.
#[derive(Debug, Clone)]
pub struct PolicyCompliance {
    /// Policy ID.
    pub policy_id: u64,
    /// Policy display name.
    pub policy_name: String,
    /// Owning MSP ID, when present.
    pub msp_id: Option<u64>,
    /// Owning MSP display name, when present.
    pub msp_name: Option<String>,
    /// True when no violations were found.
    pub compliant: bool,
    /// One line per misconfigured setting, empty when compliant.
    pub violations: Vec<String>,
}

fn describe(field: &str, value: Option<&str>) -> String {
    match value {
        Some(value) => format!("{field} is set to {value}"),
        None => format!("{field} is not set"),
    }
}

fn windows_violations(data: &PolicyData) -> Vec<String> {
    let mut violations = Vec::new();

    let level = data.prevention_level.as_deref();
    if !matches!(level, Some("HIGH" | "MEDIUM" | "LOW")) {
        violations.push(describe("prevention_level", level));
    }
    let injection = data.remote_code_injection.as_deref();
    if injection != Some("PREVENT") {
        violations.push(describe("remote_code_injection", injection));
    }
    let shellcode = data.arbitrary_shellcode_execution.as_deref();
    if shellcode != Some("PREVENT") {
        violations.push(describe("arbitrary_shellcode_execution", shellcode));
    }
    let ransomware = data.ransomware_behavior.as_deref();
    if ransomware != Some("PREVENT") {
        violations.push(describe("ransomware_behavior", ransomware));
    }

    violations
}

/// Checks every Windows policy against the expected prevention settings.
///
/// A policy passes when `prevention_level` is `HIGH`, `MEDIUM`, or `LOW`
/// and remote code injection, arbitrary shellcode execution, and
/// ransomware behavior are all `PREVENT`. Non-Windows policies are skipped.
/// A Windows policy whose data could not be read is reported
/// non-compliant rather than silently passing.
pub fn windows_policy_compliance(details: &[PolicyDetail]) -> Vec<PolicyCompliance> {
    details
        .iter()
        .filter(|detail| detail.policy.os.as_deref() == Some("WINDOWS"))
        .map(|detail| {
            let violations = match detail.data.as_ref() {
                Some(data) => windows_violations(data),
                None => vec!["policy data is not readable".to_string()],
            };
            PolicyCompliance {
                policy_id: detail.policy.id,
                policy_name: detail.policy.name.clone(),
                msp_id: detail.policy.msp_id,
                msp_name: detail.policy.msp_name.clone(),
                compliant: violations.is_empty(),
                violations,
            }
        })
        .collect()
}

// ── Prevention versus detection ────────────────────────────────────────

/// Device counts split by the assigned policy's mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreventionSummary {
    /// Devices whose policy runs in prevention mode.
    pub prevention: u64,
    /// Devices whose policy runs in detection mode.
    pub detection: u64,
}

/// Splits devices by whether their Windows policy runs in prevention mode.
///
/// Mode is [`PolicyData::is_prevention_mode`]; a Windows policy without
/// readable data counts as detection. Devices assigned to non-Windows
/// policies, or to a policy not in `policies`, are not counted.
pub fn windows_prevention_summary(
    devices: &[Device],
    policies: &[PolicyDetail],
) -> PreventionSummary {
    let mut prevention_ids = Vec::new();
    let mut detection_ids = Vec::new();
    for detail in policies {
        if detail.policy.os.as_deref() != Some("WINDOWS") {
            continue;
        }
        if detail.data.as_ref().is_some_and(PolicyData::is_prevention_mode) {
            prevention_ids.push(detail.policy.id);
        } else {
            detection_ids.push(detail.policy.id);
        }
    }

    let mut summary = PreventionSummary::default();
    for device in devices {
        let Some(policy_id) = device.policy_id else {
            continue;
        };
        if prevention_ids.contains(&policy_id) {
            summary.prevention += 1;
        } else if detection_ids.contains(&policy_id) {
            summary.detection += 1;
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::Policy;

    fn tenant(id: u64, name: &str, msp_id: Option<u64>, limit: u64) -> Tenant {
        Tenant {
            id,
            name: name.to_string(),
            msp_id,
            license_limit: limit,
        }
    }

    fn msp(id: u64, name: &str) -> Msp {
        Msp {
            id,
            name: name.to_string(),
            license_limit: 1000,
        }
    }

    fn device(tenant_id: u64, status: &str, policy_id: Option<u64>) -> Device {
        let mut device: Device = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        device.tenant_id = Some(tenant_id);
        device.license_status = Some(status.to_string());
        device.policy_id = policy_id;
        device
    }

    fn windows_detail(id: u64, data: Option<&str>) -> PolicyDetail {
        let policy: Policy =
            serde_json::from_str(&format!(r#"{{"id": {id}, "os": "WINDOWS"}}"#)).unwrap();
        PolicyDetail {
            policy,
            data: data.map(|json| serde_json::from_str(json).unwrap()),
        }
    }

    // ── license_usage ────────────────────────────────────────────────

    #[test]
    fn license_usage_counts_activated_devices_per_tenant() {
        let tenants = vec![tenant(1, "West", Some(10), 4), tenant(2, "East", Some(10), 10)];
        let msps = vec![msp(10, "Acme")];
        let devices = vec![
            device(1, "ACTIVATED", None),
            device(1, "ACTIVATED", None),
            device(1, "DEACTIVATED", None),
            device(2, "PENDING_ACTIVATION", None),
        ];

        let rows = license_usage(&tenants, &msps, &devices);
        assert_eq!(rows.len(), 2);
        // Sorted by MSP name then tenant name: East before West.
        assert_eq!(rows[0].tenant_name, "East");
        assert_eq!(rows[0].licenses_used, 0);
        assert_eq!(rows[1].tenant_name, "West");
        assert_eq!(rows[1].licenses_used, 2);
        assert_eq!(rows[1].msp_name.as_deref(), Some("Acme"));
        assert!((rows[1].percent_used - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn license_usage_handles_zero_limit_and_unknown_msp() {
        let tenants = vec![tenant(1, "Unlimited", Some(99), 0)];
        let rows = license_usage(&tenants, &[msp(10, "Acme")], &[device(1, "ACTIVATED", None)]);
        assert_eq!(rows[0].msp_name, None);
        assert_eq!(rows[0].licenses_used, 1);
        assert_eq!(rows[0].percent_used, 0.0);
    }

    #[test]
    fn license_usage_sorts_by_msp_then_tenant() {
        let tenants = vec![
            tenant(1, "Zeta", Some(2), 10),
            tenant(2, "Alpha", Some(2), 10),
            tenant(3, "Mid", Some(1), 10),
        ];
        let msps = vec![msp(1, "Beta MSP"), msp(2, "Alpha MSP")];
        let rows = license_usage(&tenants, &msps, &[]);
        let order: Vec<&str> = rows.iter().map(|r| r.tenant_name.as_str()).collect();
        assert_eq!(order, ["Alpha", "Zeta", "Mid"]);
    }

    // ── windows_policy_compliance ────────────────────────────────────

    #[test]
    fn compliant_policy_has_no_violations() {
        let details = vec![windows_detail(
            1,
            Some(
                r#"{
                    "prevention_level": "MEDIUM",
                    "remote_code_injection": "PREVENT",
                    "arbitrary_shellcode_execution": "PREVENT",
                    "ransomware_behavior": "PREVENT"
                }"#,
            ),
        )];
        let report = windows_policy_compliance(&details);
        assert_eq!(report.len(), 1);
        assert!(report[0].compliant);
        assert!(report[0].violations.is_empty());
    }

    #[test]
    fn violations_name_the_offending_setting() {
        let details = vec![windows_detail(
            1,
            Some(
                r#"{
                    "prevention_level": "DISABLED",
                    "remote_code_injection": "DETECT",
                    "arbitrary_shellcode_execution": "PREVENT",
                    "ransomware_behavior": "ALLOW"
                }"#,
            ),
        )];
        let report = windows_policy_compliance(&details);
        assert!(!report[0].compliant);
        assert_eq!(
            report[0].violations,
            [
                "prevention_level is set to DISABLED",
                "remote_code_injection is set to DETECT",
                "ransomware_behavior is set to ALLOW",
            ]
        );
    }

    #[test]
    fn missing_settings_are_reported_as_not_set() {
        let details = vec![windows_detail(1, Some(r#"{"prevention_level": "HIGH"}"#))];
        let report = windows_policy_compliance(&details);
        assert_eq!(
            report[0].violations,
            [
                "remote_code_injection is not set",
                "arbitrary_shellcode_execution is not set",
                "ransomware_behavior is not set",
            ]
        );
    }

    #[test]
    fn unreadable_data_is_not_compliant() {
        let report = windows_policy_compliance(&[windows_detail(1, None)]);
        assert!(!report[0].compliant);
        assert_eq!(report[0].violations, ["policy data is not readable"]);
    }

    #[test]
    fn non_windows_policies_are_skipped() {
        let policy: Policy = serde_json::from_str(r#"{"id": 9, "os": "MAC"}"#).unwrap();
        let details = vec![PolicyDetail { policy, data: None }];
        assert!(windows_policy_compliance(&details).is_empty());
    }

    // ── windows_prevention_summary ───────────────────────────────────

    fn prevention_data() -> &'static str {
        r#"{
            "prevention_level": "HIGH",
            "ransomware_behavior": "PREVENT",
            "remote_code_injection": "PREVENT",
            "arbitrary_shellcode_execution": "PREVENT",
            "known_payload_execution": "PREVENT",
            "in_memory_protection": true
        }"#
    }

    #[test]
    fn summary_splits_devices_by_policy_mode() {
        let policies = vec![
            windows_detail(1, Some(prevention_data())),
            windows_detail(2, Some(r#"{"prevention_level": "DISABLED"}"#)),
            windows_detail(3, None),
        ];
        let devices = vec![
            device(1, "ACTIVATED", Some(1)),
            device(1, "ACTIVATED", Some(1)),
            device(1, "ACTIVATED", Some(2)),
            device(1, "ACTIVATED", Some(3)),
            device(1, "ACTIVATED", Some(42)),
            device(1, "ACTIVATED", None),
        ];

        let summary = windows_prevention_summary(&devices, &policies);
        assert_eq!(summary.prevention, 2);
        // Unreadable data counts as detection; unknown policies count as
        // neither.
        assert_eq!(summary.detection, 2);
    }
}
