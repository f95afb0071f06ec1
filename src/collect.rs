//! Cursor-paginated collection over the appliance list endpoints.
//!
//! Three endpoints page the same way and share this one loop:
//!
//! | resource          | request                                        | envelope  |
//! |-------------------|------------------------------------------------|-----------|
//! | devices           | GET `devices?after_device_id=N`                | `devices` |
//! | events            | POST `events/search?after_event_id=N`          | `events`  |
//! | suspicious events | POST `suspicious-events/search?after_event_id=N` | `events` |
//!
//! Each page carries a bounded batch of items (50 observed) plus `last_id`,
//! the highest item ID delivered so far. The next request repeats with the
//! cursor set to that value; a null or absent `last_id` means the dataset is
//! exhausted (older appliance builds omit the field on the final page).
//! Item IDs are strictly increasing, so re-requesting the same cursor yields
//! the same page — which is what makes retry without loss or duplication
//! possible.
//!
//! Failure policy:
//! - Unexpected statuses and transport hiccups are retried with the SAME
//!   cursor after a fixed backoff, up to `max_retries` consecutive failures;
//!   a successful page resets the budget.
//! - When the budget runs out the whole run fails with
//!   [`ApplianceError::Collection`]. A partial list is never returned, so an
//!   interrupted run can never be mistaken for a small dataset.
//! - 401/403 (bad key) and 400-class search-payload rejections abort
//!   immediately; retrying cannot fix either.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::client::ApplianceClient;
use crate::error::{ApplianceError, Result};

// ── Resource kinds ─────────────────────────────────────────────────────

/// The paginated resources the appliance exposes.
///
/// A kind bundles everything the collection loop needs to know about an
/// endpoint: path, HTTP method, cursor parameter name, and the envelope key
/// the items arrive under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Device inventory (`GET devices`).
    Devices,
    /// Security events (`POST events/search`).
    Events,
    /// Suspicious (lower-confidence) events (`POST suspicious-events/search`).
    SuspiciousEvents,
}

impl ResourceKind {
    /// Endpoint path relative to the API base.
    pub(crate) fn path(self) -> &'static str {
        match self {
            ResourceKind::Devices => "devices",
            ResourceKind::Events => "events/search",
            ResourceKind::SuspiciousEvents => "suspicious-events/search",
        }
    }

    /// Query parameter carrying the cursor.
    pub(crate) fn cursor_param(self) -> &'static str {
        match self {
            ResourceKind::Devices => "after_device_id",
            ResourceKind::Events | ResourceKind::SuspiciousEvents => "after_event_id",
        }
    }

    /// Key under which the page's items arrive.
    pub(crate) fn envelope_key(self) -> &'static str {
        match self {
            ResourceKind::Devices => "devices",
            ResourceKind::Events | ResourceKind::SuspiciousEvents => "events",
        }
    }

    /// Search endpoints POST their criteria; inventory is a plain GET.
    fn is_search(self) -> bool {
        matches!(self, ResourceKind::Events | ResourceKind::SuspiciousEvents)
    }

    fn method(self) -> Method {
        if self.is_search() {
            Method::POST
        } else {
            Method::GET
        }
    }

    /// Human-readable name used in logs and error context.
    pub(crate) fn name(self) -> &'static str {
        match self {
            ResourceKind::Devices => "devices",
            ResourceKind::Events => "events",
            ResourceKind::SuspiciousEvents => "suspicious events",
        }
    }
}

// ── Collection configuration ───────────────────────────────────────────

/// Controls retry behavior and the starting cursor of a collection run.
///
/// Defaults:
/// - `max_retries`: 10 consecutive failures before the run is abandoned.
/// - `backoff`: 10 seconds between attempts. The appliance recovers from
///   restarts and upgrade windows on the order of a minute, which this
///   budget rides out.
/// - `start_after`: 0, i.e. collect from the first item. Set a higher value
///   to skip everything at or below a known ID (the cursor is an exclusive
///   lower bound).
#[derive(Debug, Clone)]
pub struct CollectConfig {
    /// Consecutive failed attempts tolerated before giving up.
    pub max_retries: u32,
    /// Fixed wait between consecutive attempts at the same cursor.
    pub backoff: Duration,
    /// Initial cursor value.
    pub start_after: u64,
}

impl Default for CollectConfig {
    fn default() -> Self {
        CollectConfig {
            max_retries: 10,
            backoff: Duration::from_secs(10),
            start_after: 0,
        }
    }
}

// ── Collection functions ───────────────────────────────────────────────

/// Collects every item of `kind`, walking the cursor until the appliance
/// signals the end of the dataset.
///
/// `filter` is an opaque criteria object forwarded verbatim to the server
/// (search endpoints always send a JSON body; an absent filter becomes `{}`,
/// matching the appliance's wire contract). `config` tunes retry behavior
/// and the starting cursor; `None` uses [`CollectConfig::default`].
///
/// Items deserialize to any `T` — a typed record such as
/// [`crate::devices::Device`], or `serde_json::Value` to keep records
/// opaque.
///
/// # Errors
///
/// - [`ApplianceError::Collection`] — the retry budget was exhausted. No
///   partial data is returned.
/// - [`ApplianceError::Configuration`] — the appliance rejected the API key
///   or could not be reached at all.
/// - [`ApplianceError::InvalidFilter`] — the server rejected `filter`.
/// - [`ApplianceError::Parse`] — a 200 response carried a non-JSON body or
///   an item does not fit `T`.
pub async fn collect<T: DeserializeOwned>(
    client: &ApplianceClient,
    kind: ResourceKind,
    filter: Option<&Value>,
    config: Option<&CollectConfig>,
) -> Result<Vec<T>> {
    collect_filtered(client, kind, filter, |_: &T| true, config).await
}

/// Like [`collect`], but keeps only items for which `include` returns true.
///
/// The predicate runs client-side on each item as its page arrives, in
/// server order; filtering is equivalent to collecting everything and
/// filtering afterwards, without holding the excluded items.
///
/// # Errors
///
/// Same as [`collect`].
pub async fn collect_filtered<T, F>(
    client: &ApplianceClient,
    kind: ResourceKind,
    filter: Option<&Value>,
    mut include: F,
    config: Option<&CollectConfig>,
) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    F: FnMut(&T) -> bool,
{
    let defaults = CollectConfig::default();
    let config = config.unwrap_or(&defaults);

    let empty = Value::Object(Map::new());
    let body = if kind.is_search() {
        Some(filter.unwrap_or(&empty))
    } else {
        filter
    };

    let mut collected = Vec::new();
    let mut cursor = Some(config.start_after);
    let mut consecutive_errors: u32 = 0;

    while let Some(after) = cursor {
        match fetch_page::<T>(client, kind, after, body).await {
            Ok(page) => {
                consecutive_errors = 0;
                debug!(
                    resource = kind.name(),
                    cursor = after,
                    items = page.items.len(),
                    "fetched page"
                );
                // Items are appended before the cursor advances so the
                // terminal page (null cursor) still contributes its items.
                for item in page.items {
                    if include(&item) {
                        collected.push(item);
                    }
                }
                cursor = page.next;
            }
            // Fatal: retrying cannot change the outcome.
            Err(
                e @ (ApplianceError::Configuration { .. }
                | ApplianceError::InvalidFilter { .. }
                | ApplianceError::Parse(_)),
            ) => return Err(e),
            // Transient: unexpected status or transport hiccup. Retry the
            // same cursor after the backoff.
            Err(e) => {
                consecutive_errors += 1;
                warn!(
                    resource = kind.name(),
                    cursor = after,
                    attempt = consecutive_errors,
                    max_retries = config.max_retries,
                    "page fetch failed, retrying with the same cursor: {e}"
                );
                if consecutive_errors >= config.max_retries {
                    return Err(ApplianceError::Collection {
                        resource: kind.name(),
                        cursor: after,
                        attempts: consecutive_errors,
                        source: Box::new(e),
                    });
                }
                sleep(config.backoff).await;
            }
        }
    }

    Ok(collected)
}

// ── Single page fetch ──────────────────────────────────────────────────

/// One decoded page: the items under the envelope key and the next cursor.
struct Page<T> {
    items: Vec<T>,
    next: Option<u64>,
}

/// Fetches and decodes exactly one page. The caller decides which errors
/// are worth a retry.
async fn fetch_page<T: DeserializeOwned>(
    client: &ApplianceClient,
    kind: ResourceKind,
    after: u64,
    body: Option<&Value>,
) -> Result<Page<T>> {
    let query = [(kind.cursor_param(), after.to_string())];
    let response = client.send(kind.method(), kind.path(), &query, body).await?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let body = response.text().await.unwrap_or_default();
        return Err(ApplianceError::Configuration {
            message: format!("appliance rejected the API key ({status}): {body}"),
            source: None,
        });
    }
    if kind.is_search()
        && (status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY)
    {
        let body = response.text().await.unwrap_or_default();
        return Err(ApplianceError::InvalidFilter { status, body });
    }
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(ApplianceError::Api { status, body });
    }

    let text = response.text().await?;
    let envelope: Value = serde_json::from_str(&text)?;

    // A missing or non-array envelope key is an empty page, not an error:
    // boundary pages from some server builds omit it.
    let mut items = Vec::new();
    if let Some(values) = envelope.get(kind.envelope_key()).and_then(Value::as_array) {
        items.reserve(values.len());
        for value in values {
            items.push(serde_json::from_value(value.clone())?);
        }
    }

    // Absent, null, and non-integer cursors all mean "no more data".
    let next = match envelope.get("last_id") {
        None | Some(Value::Null) => None,
        Some(other) => other.as_u64(),
    };

    Ok(Page { items, next })
}
