//! Integration tests for the events endpoint family using wiremock.
//!
//! These tests mock the appliance API to verify that the events module
//! correctly constructs requests, handles responses, and propagates
//! errors for the threat and suspicious-event endpoints:
//!
//! - POST /api/v1/events/search                        — list_events
//! - POST /api/v1/suspicious-events/search             — list_suspicious_events
//! - GET  /api/v1/events/{id}                          — get_event
//! - GET  /api/v1/suspicious-events/{id}               — get_suspicious_event
//! - POST /api/v1/events/actions/(un)archive           — archive/unarchive
//! - POST /api/v1/suspicious-events/actions/(un)archive

use serde_json::json;

use di_appliance::client::ApplianceClient;
use di_appliance::collect::CollectConfig;
use di_appliance::events::*;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper: creates a client pointed at the given wiremock server.
fn mock_client(server: &MockServer) -> ApplianceClient {
    ApplianceClient::with_base_url(&format!("{}/api/v1/", server.uri()), "mock-api-key").unwrap()
}

// ── list_events ────────────────────────────────────────────────────────

#[tokio::test]
async fn list_events_walks_the_search_pages() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("POST"))
        .and(path("api/v1/events/search"))
        .and(query_param("after_event_id", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [
                {
                    "id": 101,
                    "type": "STATIC_ANALYSIS",
                    "status": "OPEN",
                    "threat_severity": "VERY_HIGH",
                    "file_hash": "d1e8a9b2",
                    "device_id": 42
                },
                {"id": 102, "type": "RANSOMWARE", "threat_severity": "HIGH"}
            ],
            "last_id": 102
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("api/v1/events/search"))
        .and(query_param("after_event_id", "102"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [{"id": 103}],
            "last_id": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let events = list_events(&client, None, None).await.unwrap();

    assert_eq!(events.len(), 3);
    assert_eq!(events[0].id, 101);
    assert_eq!(events[0].event_type.as_deref(), Some("STATIC_ANALYSIS"));
    assert_eq!(events[0].threat_severity.as_deref(), Some("VERY_HIGH"));
    assert_eq!(events[0].device_id, Some(42));
    assert_eq!(events[2].id, 103);
}

#[tokio::test]
async fn list_events_forwards_search_and_minimum_id() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    let filter = json!({"status": ["OPEN"]});
    Mock::given(method("POST"))
        .and(path("api/v1/events/search"))
        .and(query_param("after_event_id", "5000"))
        .and(body_json(&filter))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [{"id": 5001, "status": "OPEN"}],
            "last_id": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = CollectConfig {
        start_after: 5000,
        ..CollectConfig::default()
    };
    let events = list_events(&client, Some(&filter), Some(&config))
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, 5001);
}

#[tokio::test]
async fn list_suspicious_events_uses_its_own_index() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("POST"))
        .and(path("api/v1/suspicious-events/search"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [{"id": 9, "trigger": "SUSPICIOUS_SCRIPT_EXECUTION"}],
            "last_id": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let events = list_suspicious_events(&client, None, None).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].trigger.as_deref(),
        Some("SUSPICIOUS_SCRIPT_EXECUTION")
    );
}

// ── get_event ──────────────────────────────────────────────────────────

#[tokio::test]
async fn get_event_unwraps_the_single_event_envelope() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("GET"))
        .and(path("api/v1/events/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "event": {
                "id": 101,
                "type": "STATIC_ANALYSIS",
                "path": "C:\\Users\\mal\\dropper.exe",
                "file_size": 220160,
                "recorded_device_info": {"hostname": "LAPTOP-001"}
            }
        })))
        .mount(&server)
        .await;

    let event = get_event(&client, 101).await.unwrap();
    assert_eq!(event.id, 101);
    assert_eq!(event.file_size, Some(220160));
    assert_eq!(
        event.recorded_device_info.as_ref().unwrap()["hostname"],
        "LAPTOP-001"
    );
}

#[tokio::test]
async fn get_suspicious_event_hits_the_suspicious_index() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("GET"))
        .and(path("api/v1/suspicious-events/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "event": {"id": 9}
        })))
        .mount(&server)
        .await;

    let event = get_suspicious_event(&client, 9).await.unwrap();
    assert_eq!(event.id, 9);
}

// ── archive / unarchive ────────────────────────────────────────────────

#[tokio::test]
async fn archive_events_posts_the_id_batch() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("POST"))
        .and(path("api/v1/events/actions/archive"))
        .and(body_json(json!({"ids": [101, 102]})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    archive_events(&client, &[101, 102])
        .await
        .expect("archive should succeed");
}

#[tokio::test]
async fn unarchive_suspicious_events_uses_the_suspicious_action_path() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("POST"))
        .and(path("api/v1/suspicious-events/actions/unarchive"))
        .and(body_json(json!({"ids": [9]})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    unarchive_suspicious_events(&client, &[9])
        .await
        .expect("unarchive should succeed");
}
