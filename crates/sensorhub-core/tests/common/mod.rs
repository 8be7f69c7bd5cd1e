#![allow(clippy::unwrap_used, dead_code)]
// In-process SensorHub stand-in serving both REST routes and push channels
// on one port, so a single `HubClient` base URL reaches both.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use url::Url;

use sensorhub_api::{HubClient, TransportConfig};
use sensorhub_core::{Dashboard, SyncConfig};

#[derive(Clone)]
struct Route {
    status: u16,
    body: String,
    delay: Duration,
}

struct Hub {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<String>>,
    frames: broadcast::Sender<(String, String)>,
    sockets: watch::Sender<HashMap<String, usize>>,
}

/// Test server. Routes are keyed by `"METHOD /path"` (query ignored).
pub struct HubServer {
    url: Url,
    hub: Arc<Hub>,
    sockets: watch::Receiver<HashMap<String, usize>>,
}

impl HubServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        let (frames, _) = broadcast::channel(64);
        let (sockets_tx, sockets) = watch::channel(HashMap::new());
        let hub = Arc::new(Hub {
            routes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            frames,
            sockets: sockets_tx,
        });

        let app = Router::new()
            .route("/sensors/ws/{kind}", get(upgrade))
            .route("/temperature/ws/{feed}", get(upgrade))
            .route("/notifications/ws", get(upgrade))
            .fallback(rest)
            .with_state(Arc::clone(&hub));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { url, hub, sockets }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn route(&self, method: &str, path: &str, status: u16, body: impl Into<String>) {
        self.route_delayed(method, path, status, body, Duration::ZERO);
    }

    pub fn route_delayed(
        &self,
        method: &str,
        path: &str,
        status: u16,
        body: impl Into<String>,
        delay: Duration,
    ) {
        self.hub.routes.lock().unwrap().insert(
            format!("{method} {path}"),
            Route {
                status,
                body: body.into(),
                delay,
            },
        );
    }

    /// Every REST request seen so far, as `"METHOD /path"`.
    pub fn requests(&self) -> Vec<String> {
        self.hub.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, key: &str) -> usize {
        self.requests().iter().filter(|r| *r == key).count()
    }

    /// Send a text frame to every socket open on `path`.
    pub fn push(&self, path: &str, frame: impl Into<String>) {
        let _ = self.hub.frames.send((path.to_owned(), frame.into()));
    }

    /// Wait until `count` sockets are open on `path`.
    pub async fn wait_for_sockets(&self, path: &str, count: usize) {
        let mut sockets = self.sockets.clone();
        tokio::time::timeout(
            Duration::from_secs(5),
            sockets.wait_for(|open| open.get(path).copied().unwrap_or(0) >= count),
        )
        .await
        .unwrap()
        .unwrap();
    }

    pub fn open_sockets(&self, path: &str) -> usize {
        self.sockets.borrow().get(path).copied().unwrap_or(0)
    }

    /// Wait until no socket is open on `path`.
    pub async fn wait_for_no_sockets(&self, path: &str) {
        let mut sockets = self.sockets.clone();
        tokio::time::timeout(
            Duration::from_secs(5),
            sockets.wait_for(|open| open.get(path).copied().unwrap_or(0) == 0),
        )
        .await
        .unwrap()
        .unwrap();
    }

    pub fn config(&self) -> SyncConfig {
        SyncConfig::new(self.url.clone())
    }

    pub fn dashboard(&self, config: SyncConfig) -> Dashboard {
        let client = HubClient::new(self.url.as_str(), &TransportConfig::default()).unwrap();
        Dashboard::with_client(config, client)
    }
}

// ── Handlers ────────────────────────────────────────────────────────

async fn rest(State(hub): State<Arc<Hub>>, method: Method, uri: Uri) -> Response {
    let key = format!("{method} {}", uri.path());
    hub.requests.lock().unwrap().push(key.clone());
    let route = hub.routes.lock().unwrap().get(&key).cloned();
    let route = route.unwrap_or(Route {
        status: 404,
        body: r#"{"message":"not found"}"#.to_owned(),
        delay: Duration::ZERO,
    });
    if !route.delay.is_zero() {
        tokio::time::sleep(route.delay).await;
    }

    let status = StatusCode::from_u16(route.status).unwrap();
    (status, [(header::CONTENT_TYPE, "application/json")], route.body).into_response()
}

async fn upgrade(State(hub): State<Arc<Hub>>, uri: Uri, ws: WebSocketUpgrade) -> Response {
    let path = uri.path().to_owned();
    ws.on_upgrade(move |socket| relay(socket, path, hub))
}

/// Forward frames pushed for `path` until either side closes.
async fn relay(mut socket: WebSocket, path: String, hub: Arc<Hub>) {
    let mut frames = hub.frames.subscribe();
    hub.sockets
        .send_modify(|open| *open.entry(path.clone()).or_insert(0) += 1);
    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok((target, text)) if target == path => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    hub.sockets.send_modify(|open| {
        if let Some(n) = open.get_mut(&path) {
            *n = n.saturating_sub(1);
        }
    });
}

// ── Fixtures ────────────────────────────────────────────────────────

pub fn sensor_json(id: i64, name: &str, health: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "type": "Temperature",
        "url": format!("http://10.0.0.{id}"),
        "health_status": health,
        "health_reason": null,
        "enabled": true
    })
}

pub fn reading_json(sensor: &str, time: &str, value: f64) -> serde_json::Value {
    serde_json::json!({ "sensor_name": sensor, "temperature": value, "time": time })
}

pub fn notification_json(id: i64, title: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "category": "threshold_alert",
        "severity": "warning",
        "title": title,
        "message": "Attic above 30C",
        "created_at": "2024-01-01T10:00:00Z"
    })
}

pub fn user_notification_json(id: i64, notification_id: i64, is_read: bool) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "user_id": 1,
        "notification_id": notification_id,
        "is_read": is_read,
        "is_dismissed": false,
        "notification": notification_json(notification_id, &format!("Alert {notification_id}"))
    })
}

pub fn me_json(permissions: &[&str]) -> String {
    serde_json::json!({
        "user": {
            "id": 1,
            "username": "ops",
            "email": "ops@example.com",
            "roles": ["viewer"],
            "permissions": permissions
        },
        "csrf_token": "csrf-1"
    })
    .to_string()
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}
