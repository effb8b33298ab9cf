use std::sync::Arc;

use serde_json::json;
use sproutly_rust::auth::{MemoryStore, TokenStore, ACCESS_TOKEN_KEY};
use sproutly_rust::cache::OfflineCache;
use sproutly_rust::config::ClientOptions;
use sproutly_rust::sync::SyncEngine;
use sproutly_rust::types::{
    AttendanceMark, AttendanceStatus, BulkAttendanceRequest, LocationPing, NewActivity,
};
use sproutly_rust::Sproutly;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn bulk_request() -> BulkAttendanceRequest {
    BulkAttendanceRequest {
        date: "2024-03-21".to_string(),
        records: vec![AttendanceMark {
            student_id: 5,
            status: AttendanceStatus::Present,
            check_in: Some("09:02".to_string()),
        }],
    }
}

fn activity() -> NewActivity {
    NewActivity {
        title: "Art time".to_string(),
        content: "Finger painting.".to_string(),
        media_urls: vec![],
        activity_type: "art".to_string(),
        mood: Some("happy".to_string()),
        child_ids: vec![5],
    }
}

fn ping() -> LocationPing {
    LocationPing {
        latitude: 12.9716,
        longitude: 77.5946,
        speed: Some(24.0),
        heading: None,
    }
}

async fn engine_against(uri: &str) -> (SyncEngine, OfflineCache) {
    let store = Arc::new(MemoryStore::new());
    store.store(ACCESS_TOKEN_KEY, "test-access").await.unwrap();
    let client = Sproutly::new_with_store(uri, ClientOptions::default(), store);
    let cache = OfflineCache::open_in_memory().await.unwrap();
    (client.sync_engine(cache.clone()), cache)
}

fn created_activity_body() -> serde_json::Value {
    json!({
        "data": {
            "id": 11,
            "title": "Art time",
            "content": "Finger painting.",
            "mediaUrls": [],
            "activityType": "art",
            "mood": "happy",
            "teacherName": "Ravi",
            "postedAt": "2024-03-21T10:00:00Z"
        }
    })
}

#[tokio::test]
async fn replay_drains_the_outbox_in_fifo_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/mobile/teacher/attendance/bulk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/mobile/teacher/activity"))
        .respond_with(ResponseTemplate::new(200).set_body_json(created_activity_body()))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/mobile/driver/location"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&mock_server)
        .await;

    let (engine, cache) = engine_against(&mock_server.uri()).await;

    engine.queue_attendance_marks(&bulk_request()).await.unwrap();
    engine.queue_activity_post(&activity()).await.unwrap();
    engine.queue_location_update(&ping()).await.unwrap();

    let report = engine.replay().await.unwrap();
    assert_eq!(report.replayed, 3);
    assert_eq!(report.dropped, 0);
    assert_eq!(report.pending, 0);
    assert!(cache.pending_actions().await.unwrap().is_empty());

    let requests = mock_server.received_requests().await.unwrap();
    let paths: Vec<String> = requests.iter().map(|r| r.url.path().to_string()).collect();
    assert_eq!(
        paths,
        vec![
            "/api/v1/mobile/teacher/attendance/bulk",
            "/api/v1/mobile/teacher/activity",
            "/api/v1/mobile/driver/location",
        ]
    );
}

#[tokio::test]
async fn a_transient_failure_stops_the_drain_and_bumps_the_retry_count() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/mobile/teacher/attendance/bulk"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "Database unavailable"
        })))
        .mount(&mock_server)
        .await;

    let (engine, cache) = engine_against(&mock_server.uri()).await;

    engine.queue_attendance_marks(&bulk_request()).await.unwrap();
    engine.queue_activity_post(&activity()).await.unwrap();

    let report = engine.replay().await.unwrap();
    assert_eq!(report.replayed, 0);
    assert_eq!(report.dropped, 0);
    assert_eq!(report.pending, 2);

    // The failed action keeps its place at the head of the queue.
    let pending = cache.pending_actions().await.unwrap();
    assert_eq!(pending[0].action_type, sproutly_rust::sync::MARK_ATTENDANCE);
    assert_eq!(pending[0].retry_count, 1);
    assert_eq!(pending[1].retry_count, 0);

    // The activity post was never attempted.
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn an_action_out_of_attempts_is_dropped() {
    let mock_server = MockServer::start().await;
    let (engine, cache) = engine_against(&mock_server.uri()).await;

    let id = engine.queue_location_update(&ping()).await.unwrap();
    for _ in 0..SyncEngine::MAX_REPLAY_ATTEMPTS {
        cache.bump_retry(id).await.unwrap();
    }

    let report = engine.replay().await.unwrap();
    assert_eq!(report.replayed, 0);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.pending, 0);

    // Nothing was sent for the dropped action.
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_action_tags_are_dropped_not_retried() {
    let mock_server = MockServer::start().await;
    let (engine, cache) = engine_against(&mock_server.uri()).await;

    cache
        .queue_action("reorder_lunchboxes", &json!({ "childId": 5 }))
        .await
        .unwrap();
    engine.queue_location_update(&ping()).await.unwrap();

    Mock::given(method("POST"))
        .and(path("/api/v1/mobile/driver/location"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&mock_server)
        .await;

    let report = engine.replay().await.unwrap();
    assert_eq!(report.dropped, 1);
    assert_eq!(report.replayed, 1);
    assert_eq!(report.pending, 0);
}
