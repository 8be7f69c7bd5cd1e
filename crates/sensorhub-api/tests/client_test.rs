#![allow(clippy::unwrap_used)]
// Integration tests for `HubClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sensorhub_api::types::ChannelPreferenceJson;
use sensorhub_api::{Error, HubClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, HubClient) {
    let server = MockServer::start().await;
    let client = HubClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    (server, client)
}

// ── Auth ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_me_stores_csrf_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {
                "id": 1, "username": "ops", "email": "ops@example.com",
                "roles": ["admin"], "permissions": ["view_notifications"]
            },
            "csrf_token": "csrf-abc"
        })))
        .mount(&server)
        .await;

    let me = client.me().await.unwrap();
    assert_eq!(me.user.unwrap().username, "ops");
    assert_eq!(client.csrf_token().as_deref(), Some("csrf-abc"));
}

#[tokio::test]
async fn test_me_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "no session"})))
        .mount(&server)
        .await;

    let result = client.me().await;
    assert!(
        matches!(result, Err(Error::Unauthorized)),
        "expected Unauthorized, got: {result:?}"
    );
}

#[tokio::test]
async fn test_session_cookie_sent_from_transport() {
    let server = MockServer::start().await;
    let transport = TransportConfig::default().with_session(SecretString::from("sess-1"));
    let client = HubClient::new(&server.uri(), &transport).unwrap();

    Mock::given(method("GET"))
        .and(path("/sensors/"))
        .and(header("cookie", "sensor_hub_session=sess-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let sensors = client.list_sensors(None).await.unwrap();
    assert!(sensors.is_empty());
    assert_eq!(
        client.push_cookie().as_deref(),
        Some("sensor_hub_session=sess-1")
    );
}

// ── Sensors ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_sensors_by_type() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/sensors/"))
        .and(query_param("type", "Temperature"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 1, "name": "Upstairs", "type": "Temperature",
                "url": "http://10.0.0.5", "health_status": "good",
                "health_reason": null, "enabled": true
            },
            {
                "id": 2, "name": "Downstairs", "type": "Temperature",
                "url": "http://10.0.0.6", "health_status": "bad",
                "health_reason": "timeout", "enabled": false
            }
        ])))
        .mount(&server)
        .await;

    let sensors = client.list_sensors(Some("Temperature")).await.unwrap();
    assert_eq!(sensors.len(), 2);
    assert_eq!(sensors[1].health_reason.as_deref(), Some("timeout"));
    assert_eq!(sensors[1].enabled, Some(false));
}

#[tokio::test]
async fn test_sensor_health_history_encodes_name() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/sensors/health/Living%20Room"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 9, "sensor_id": 3, "health_status": "good", "recorded_at": "2025-01-01 10:00:00"}
        ])))
        .mount(&server)
        .await;

    let history = client.sensor_health_history("Living Room", 5).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].sensor_id, 3);
}

#[tokio::test]
async fn test_total_readings_per_sensor() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/sensors/stats/total-readings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"Upstairs": 1200, "Attic": 30})),
        )
        .mount(&server)
        .await;

    let totals = client.total_readings_per_sensor().await.unwrap();
    assert_eq!(totals.keys().collect::<Vec<_>>(), vec!["Attic", "Upstairs"]);
    assert_eq!(totals["Upstairs"], 1200);
}

// ── Temperature ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_hourly_readings_between() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/temperature/readings/hourly/between"))
        .and(query_param("start", "2025-01-01"))
        .and(query_param("end", "2025-01-02"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"sensor_name": "Upstairs", "temperature": 20.25, "time": "2025-01-01 10:00:00"}
        ])))
        .mount(&server)
        .await;

    let readings = client
        .hourly_readings_between("2025-01-01", "2025-01-02")
        .await
        .unwrap();
    assert_eq!(readings.len(), 1);
    assert!((readings[0].temperature - 20.25).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_readings_between_bad_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/temperature/readings/between"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = client.readings_between("2025-01-01", "2025-01-02").await;
    match result {
        Err(Error::Deserialization { body, .. }) => assert!(body.contains("oops")),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_carries_message() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/temperature/readings/between"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "message": "Failed to fetch readings", "error": "db down"
        })))
        .mount(&server)
        .await;

    let err = client
        .readings_between("2025-01-01", "2025-01-02")
        .await
        .unwrap_err();
    assert!(err.is_transient());
    match err {
        Error::Api {
            status,
            message,
            detail,
        } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Failed to fetch readings");
            assert_eq!(detail.as_deref(), Some("db down"));
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

// ── Notifications ───────────────────────────────────────────────────

#[tokio::test]
async fn test_list_notifications_query() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/notifications/"))
        .and(query_param("limit", "50"))
        .and(query_param("offset", "0"))
        .and(query_param("include_dismissed", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 1, "user_id": 2, "notification_id": 10,
                "is_read": false, "is_dismissed": false,
                "notification": {
                    "id": 10, "category": "threshold_alert", "severity": "error",
                    "title": "Too hot", "message": "Attic 41C",
                    "created_at": "2025-01-01T10:00:00Z"
                }
            }
        ])))
        .mount(&server)
        .await;

    let page = client.list_notifications(50, 0, false).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].notification_id, 10);
}

#[tokio::test]
async fn test_unread_count() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/notifications/unread-count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 7})))
        .mount(&server)
        .await;

    assert_eq!(client.unread_count().await.unwrap().count, 7);
}

#[tokio::test]
async fn test_mark_read_sends_csrf_header() {
    let (server, client) = setup().await;
    client.set_csrf_token(Some("tok-9".into()));

    Mock::given(method("POST"))
        .and(path("/notifications/10/read"))
        .and(header("x-csrf-token", "tok-9"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Notification marked as read"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ack = client.mark_read(10).await.unwrap();
    assert_eq!(ack.message, "Notification marked as read");
}

#[tokio::test]
async fn test_bulk_dismiss_with_empty_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/notifications/bulk/dismiss"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let ack = client.bulk_dismiss().await.unwrap();
    assert!(ack.message.is_empty());
}

#[tokio::test]
async fn test_dismiss_forbidden() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/notifications/3/dismiss"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "CSRF token invalid"})))
        .mount(&server)
        .await;

    let result = client.dismiss(3).await;
    match result {
        Err(Error::Forbidden { message }) => assert_eq!(message, "CSRF token invalid"),
        other => panic!("expected Forbidden, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_update_channel_preference_uses_put() {
    let (server, client) = setup().await;
    client.set_csrf_token(Some("tok".into()));

    Mock::given(method("PUT"))
        .and(path("/notifications/preferences"))
        .and(header_exists("x-csrf-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let pref = ChannelPreferenceJson {
        user_id: None,
        category: "threshold_alert".into(),
        email_enabled: false,
        inapp_enabled: true,
    };
    client.update_channel_preference(&pref).await.unwrap();

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["category"], "threshold_alert");
    assert_eq!(body["inapp_enabled"], true);
}
