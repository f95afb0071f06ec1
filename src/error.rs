//! Typed error hierarchy for the di-appliance crate.
//!
//! `ApplianceError` is a structured enum that preserves diagnostic context at
//! each failure boundary. Every variant carries enough information for callers
//! to:
//! - Distinguish the failure category (configuration, API, collection, parse,
//!   network).
//! - Inspect the original cause via `source()` (thiserror derives this
//!   automatically from `#[source]` fields).
//! - Display a human-readable message that includes the relevant context
//!   (status code, response body, cursor, attempt count).
//!
//! Design rationale:
//! - Variants map to real system boundaries, not to internal implementation
//!   details. `Configuration` covers credentials and reachability; `Api`
//!   covers individual appliance REST calls; `Collection` covers the
//!   pagination loop; etc.
//! - `Api` preserves the response body. Appliance error responses carry
//!   human-readable explanations (license limits, default-policy protection,
//!   active-device conflicts) that matter for debugging.
//! - `Collection` exists so an interrupted pagination run is never mistaken
//!   for a complete or empty dataset: when the retry budget runs out the
//!   caller gets this error, not a partial list.
//! - `Network` wraps `reqwest::Error` for transport-level failures that don't
//!   produce an HTTP status code.

use reqwest::StatusCode;

/// Unified error type for all di-appliance library operations.
///
/// Each variant corresponds to a distinct failure boundary in the system.
/// The `#[source]` attribute on inner errors enables `Error::source()` chaining
/// so callers (and logging frameworks) can traverse the full cause chain.
#[derive(Debug, thiserror::Error)]
pub enum ApplianceError {
    /// The client is misconfigured or the appliance rejected its identity.
    ///
    /// This covers:
    /// - An empty or ill-formed appliance FQDN or API key at construction.
    /// - 401/403 responses (invalid, expired, or under-privileged API key).
    /// - Transport failures that mean the host itself cannot be reached
    ///   (DNS resolution, TCP connect).
    ///
    /// These are never retried: repeating the request cannot succeed until
    /// the configuration changes.
    #[error("configuration error: {message}")]
    Configuration {
        /// Human-readable description of the problem, including the HTTP
        /// status and response body when the appliance answered.
        message: String,
        /// The underlying transport error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The appliance returned a non-success HTTP status code on a single
    /// (non-paginated) call.
    ///
    /// The full response body is preserved. Appliance error responses
    /// explain conditions like "an MSP with this name already exists",
    /// "default policies cannot be deleted", or "MSP has non-archived
    /// devices" that the status code alone does not convey.
    #[error("API error {status}: {body}")]
    Api {
        /// The HTTP status code returned by the appliance.
        status: StatusCode,
        /// The raw response body text. May contain JSON error details,
        /// or an empty string if the body could not be read.
        body: String,
    },

    /// The appliance rejected a caller-supplied search payload.
    ///
    /// Raised on a 400-class response to an event search. The filter is
    /// opaque to this crate and forwarded verbatim, so a rejection can only
    /// be fixed by the caller; it is surfaced immediately and never retried.
    #[error("server rejected search filter ({status}): {body}")]
    InvalidFilter {
        /// The 400-class status code returned by the appliance.
        status: StatusCode,
        /// The raw response body, usually naming the offending criterion.
        body: String,
    },

    /// A pagination run exhausted its retry budget.
    ///
    /// This is distinct from `Api` errors: individual transient failures
    /// inside the collection loop are retried with the same cursor, and only
    /// a run of consecutive failures escalates to this variant. Whatever was
    /// gathered before the failure is discarded — callers must never receive
    /// a partial dataset that looks complete.
    #[error("collection of {resource} failed at cursor {cursor} after {attempts} attempts")]
    Collection {
        /// The resource being collected (`devices`, `events`, ...).
        resource: &'static str,
        /// The cursor the failing page was requested with.
        cursor: u64,
        /// How many consecutive attempts were made at this cursor.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        source: Box<ApplianceError>,
    },

    /// A device group referenced by name does not exist on the appliance.
    ///
    /// This is distinct from `Api` errors — the group listing itself
    /// succeeded, but no group carried the requested name.
    #[error("no device group named {name:?} on the appliance")]
    GroupNotFound {
        /// The name that failed to resolve.
        name: String,
    },

    /// JSON deserialization failed when parsing an API response body.
    ///
    /// This can occur if the appliance returns an unexpected response shape,
    /// or a 200 whose body is not JSON at all.
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// A network-level failure occurred (TLS handshake, request timeout,
    /// connection reset mid-body, etc.).
    ///
    /// No HTTP status code is available because the request did not
    /// complete. This wraps the underlying `reqwest::Error` which carries
    /// detailed transport diagnostics.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Convenience alias used throughout the library.
/// Keeps function signatures concise while providing the full typed error.
pub type Result<T> = std::result::Result<T, ApplianceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn configuration_error_displays_message() {
        let err = ApplianceError::Configuration {
            message: "appliance rejected the API key (status 401)".to_string(),
            source: None,
        };
        let msg = err.to_string();
        assert!(
            msg.contains("configuration error"),
            "display should indicate a configuration failure"
        );
        assert!(msg.contains("401"), "display should include the status");
    }

    #[test]
    fn configuration_error_with_source_chains_correctly() {
        // Simulate a serde parse error as the underlying cause.
        let json_err: serde_json::Error = serde_json::from_str::<String>("not-json").unwrap_err();
        let err = ApplianceError::Configuration {
            message: "unreachable host".to_string(),
            source: Some(Box::new(json_err)),
        };
        assert!(
            err.source().is_some(),
            "Configuration error with source should have a chained cause"
        );
    }

    #[test]
    fn api_error_preserves_status_and_body() {
        let err = ApplianceError::Api {
            status: StatusCode::CONFLICT,
            body: "An MSP with this name already exists".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("409"), "display should include status code");
        assert!(
            msg.contains("already exists"),
            "display should include response body"
        );
    }

    #[test]
    fn invalid_filter_error_includes_status_and_body() {
        let err = ApplianceError::InvalidFilter {
            status: StatusCode::BAD_REQUEST,
            body: r#"{"error": "unknown field 'severty'"}"#.to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("400"), "display should include status code");
        assert!(
            msg.contains("severty"),
            "display should include the server's explanation"
        );
    }

    #[test]
    fn collection_error_includes_cursor_and_attempts() {
        let last = ApplianceError::Api {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: String::new(),
        };
        let err = ApplianceError::Collection {
            resource: "devices",
            cursor: 150,
            attempts: 10,
            source: Box::new(last),
        };
        let msg = err.to_string();
        assert!(msg.contains("devices"), "display should name the resource");
        assert!(msg.contains("150"), "display should include the cursor");
        assert!(
            msg.contains("10 attempts"),
            "display should include the attempt count"
        );
        // The final attempt's error is reachable through source().
        assert!(
            err.source().is_some(),
            "Collection should chain to the last underlying error"
        );
    }

    #[test]
    fn group_not_found_names_the_group() {
        let err = ApplianceError::GroupNotFound {
            name: "Quarantine".to_string(),
        };
        assert!(
            err.to_string().contains("Quarantine"),
            "display should include the group name"
        );
    }

    #[test]
    fn parse_error_wraps_serde_json() {
        let json_err: serde_json::Error =
            serde_json::from_str::<String>("{{bad json}}").unwrap_err();
        let err = ApplianceError::Parse(json_err);
        let msg = err.to_string();
        assert!(
            msg.contains("failed to parse response"),
            "display should indicate parse failure"
        );
        // source() should be the serde_json::Error
        assert!(
            err.source().is_some(),
            "Parse variant should chain to serde_json::Error"
        );
    }

    #[test]
    fn error_is_send_and_sync() {
        // ApplianceError must be Send + Sync for use across async task boundaries.
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ApplianceError>();
    }
}
