//! Async Rust client library for the Deep Instinct D-Appliance REST API (v1).
//!
//! Provides an API-key-authenticated HTTP client, a cursor-paginated
//! collector with bounded retry, and typed wrappers for the device, event,
//! group, policy, and multitenancy endpoint families, plus pure report
//! computations over the fetched records.
//!
//! # Modules
//!
//! - [`client`] — Authenticated HTTP wrapper for the appliance REST API.
//! - [`collect`] — Cursor-paginated collection with bounded retry.
//! - [`devices`] — Device listing, matching, and lifecycle actions.
//! - [`error`] — Typed error hierarchy (`ApplianceError`) for all library operations.
//! - [`events`] — Threat and suspicious-event collection and archival.
//! - [`groups`] — Device groups and device-to-group moves.
//! - [`multitenancy`] — Tenant and MSP management.
//! - [`policies`] — Policy data read/write, lifecycle, and cross-appliance migration.
//! - [`reports`] — License usage, compliance, and prevention-mode reports.
//!
//! # Quick Start
//!
//! ```ignore
//! use di_appliance::client::ApplianceClient;
//! use di_appliance::collect::CollectConfig;
//! use di_appliance::events::list_events;
//!
//! let client = ApplianceClient::new("di-server.customer.com", "api-key")?;
//! let config = CollectConfig { start_after: 1000, ..CollectConfig::default() };
//! let events = list_events(&client, None, Some(&config)).await?;
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod collect;
pub mod devices;
pub mod error;
pub mod events;
pub mod groups;
pub mod multitenancy;
pub mod policies;
pub mod reports;
