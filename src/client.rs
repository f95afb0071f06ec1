//! Authenticated HTTP client for the D-Appliance management REST API.
//!
//! `ApplianceClient` wraps a `reqwest::Client` plus the appliance coordinates
//! (base URL, API key), providing ergonomic JSON-based request helpers
//! (`get`, `post`, `put_no_content`, ...) used by every endpoint module.
//!
//! Authentication:
//! - The appliance uses static API keys minted in the management console.
//!   Each request carries the key verbatim in the `Authorization` header —
//!   no scheme prefix, no token refresh, no expiry handling. This is the
//!   appliance's wire format, not an omission.
//! - A 401/403 response therefore can never be fixed by retrying: it means
//!   the key is wrong, revoked, or under-privileged, and is surfaced as
//!   [`ApplianceError::Configuration`].
//!
//! Each client instance is self-contained: the server address and credential
//! travel with the value rather than living in process-wide state, so two
//! clients pointed at different appliances can be used side by side (policy
//! migration does exactly that).

use reqwest::header::{self, HeaderValue};
use reqwest::{Client, Method, Response};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::debug;

use crate::error::{ApplianceError, Result};

/// Connect timeout for the appliance HTTP client.
/// Covers TCP + TLS handshake only. On-premise appliances answer fast or
/// not at all, so 10 seconds is generous.
const API_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall request timeout for appliance API calls.
/// Covers the full round-trip including response body download. Event
/// searches over large retention windows are the slowest calls and complete
/// well within a minute per page.
const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Builds a `reqwest::Client` with explicit timeouts for appliance calls.
fn build_api_client() -> Client {
    Client::builder()
        .connect_timeout(API_CONNECT_TIMEOUT)
        .timeout(API_REQUEST_TIMEOUT)
        .build()
        .expect("failed to build HTTP client for the appliance API")
}

/// Authenticated HTTP client for one D-Appliance server.
///
/// Design decisions:
/// - `base_url` is stored as a `String` rather than being derived per call so
///   it can be overridden in tests (e.g. pointing at a wiremock server).
/// - The API key is validated once at construction (non-empty, legal header
///   value) so every later request can attach it infallibly.
/// - Helpers never call `error_for_status()`: the response body is read
///   before failing, because appliance error bodies explain conditions the
///   status code alone does not.
#[derive(Debug)]
pub struct ApplianceClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ApplianceClient {
    /// Creates a client for the appliance at `https://{fqdn}/api/v1/`.
    ///
    /// `fqdn` is the bare host name of the management console (e.g.
    /// `"acme.customers.deepinstinctweb.com"`); `api_key` is a key minted
    /// under Settings → Connectivity.
    ///
    /// # Errors
    ///
    /// [`ApplianceError::Configuration`] if the FQDN is empty or contains a
    /// path/scheme, or if the API key is empty or not a legal header value.
    pub fn new(fqdn: &str, api_key: &str) -> Result<Self> {
        if fqdn.trim().is_empty() {
            return Err(ApplianceError::Configuration {
                message: "appliance FQDN is empty".to_string(),
                source: None,
            });
        }
        if fqdn.contains('/') {
            return Err(ApplianceError::Configuration {
                message: format!("expected a bare host name, got {fqdn:?}"),
                source: None,
            });
        }
        Self::with_base_url(&format!("https://{fqdn}/api/v1/"), api_key)
    }

    /// Constructor that accepts a full base URL, used by tests to point at a
    /// local mock server instead of a real appliance.
    ///
    /// A missing trailing slash is added so relative paths join cleanly.
    ///
    /// # Errors
    ///
    /// [`ApplianceError::Configuration`] if the API key is empty or not a
    /// legal header value.
    pub fn with_base_url(base_url: &str, api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(ApplianceError::Configuration {
                message: "API key is empty".to_string(),
                source: None,
            });
        }
        if HeaderValue::from_str(api_key).is_err() {
            return Err(ApplianceError::Configuration {
                message: "API key contains characters not allowed in a header".to_string(),
                source: None,
            });
        }

        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };

        Ok(ApplianceClient {
            client: build_api_client(),
            base_url,
            api_key: api_key.to_string(),
        })
    }

    /// Core request method: sends an authenticated request and returns the
    /// raw response without judging its status code.
    ///
    /// `path` is relative to `base_url` (no leading slash needed). `query`
    /// pairs are appended when present; `body` is serialized as JSON when
    /// present.
    ///
    /// Status handling is left to the caller because the two consumers want
    /// different policies: the single-call helpers below map any non-success
    /// status to [`ApplianceError::Api`], while the pagination loop retries
    /// transient statuses and classifies 401/403 and 400 specially.
    ///
    /// Transport errors that mean "this host cannot be reached at all"
    /// (DNS, TCP connect) are mapped to [`ApplianceError::Configuration`];
    /// everything else becomes [`ApplianceError::Network`].
    pub(crate) async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{method} {url}");

        let mut req = self
            .client
            .request(method, &url)
            .header(header::ACCEPT, "application/json")
            .header(header::AUTHORIZATION, self.api_key.as_str());
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(payload) = body {
            req = req.json(payload);
        }

        match req.send().await {
            Ok(resp) => Ok(resp),
            Err(e) if e.is_connect() => Err(ApplianceError::Configuration {
                message: format!("cannot reach appliance at {url}"),
                source: Some(Box::new(e)),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Accepts any success status; otherwise reads the body and returns
    /// [`ApplianceError::Api`] with it.
    async fn check_status(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ApplianceError::Api { status, body })
    }

    /// Reads a success response body and deserializes it as JSON.
    async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let resp = Self::check_status(resp).await?;
        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Sends an authenticated GET request and deserializes the JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.send::<()>(Method::GET, path, &[], None).await?;
        Self::read_json(resp).await
    }

    /// Sends an authenticated POST request with a JSON body and deserializes
    /// the response.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self.send(Method::POST, path, &[], Some(body)).await?;
        Self::read_json(resp).await
    }

    /// Sends an authenticated POST request where the appliance answers with
    /// no meaningful body (200/204 action endpoints).
    pub async fn post_no_content<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<()> {
        let resp = self.send(Method::POST, path, &[], Some(body)).await?;
        Self::check_status(resp).await?;
        Ok(())
    }

    /// Sends an authenticated POST request with no body at all (a few
    /// action endpoints reject even an empty JSON object).
    pub async fn post_empty(&self, path: &str) -> Result<()> {
        let resp = self.send::<()>(Method::POST, path, &[], None).await?;
        Self::check_status(resp).await?;
        Ok(())
    }

    /// Sends an authenticated PUT request where the appliance answers with
    /// no meaningful body (204).
    pub async fn put_no_content<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let resp = self.send(Method::PUT, path, &[], Some(body)).await?;
        Self::check_status(resp).await?;
        Ok(())
    }

    /// Sends an authenticated DELETE request (204 on success).
    pub async fn delete(&self, path: &str) -> Result<()> {
        let resp = self.send::<()>(Method::DELETE, path, &[], None).await?;
        Self::check_status(resp).await?;
        Ok(())
    }
}
