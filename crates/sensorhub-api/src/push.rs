//! Push-channel connection with optional reconnect.
//!
//! Opens one WebSocket to a SensorHub push endpoint and broadcasts each
//! decoded text frame through a [`tokio::sync::broadcast`] channel. The
//! server is the only talker: nothing is sent after the upgrade except the
//! final close frame.
//!
//! # Example
//!
//! ```rust,ignore
//! use sensorhub_api::push::{PushConnection, ReconnectPolicy};
//! use sensorhub_api::types::TemperatureReadingJson;
//! use tokio_util::sync::CancellationToken;
//!
//! let url = client.push_url(&["temperature", "ws", "current-temperatures"])?;
//! let conn: PushConnection<Vec<TemperatureReadingJson>> =
//!     PushConnection::open(url, ReconnectPolicy::default(), &CancellationToken::new(), None);
//! let mut rx = conn.subscribe();
//! while let Ok(batch) = rx.recv().await {
//!     println!("{} readings", batch.len());
//! }
//! conn.close();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── Broadcast channel capacity ───────────────────────────────────────

const FRAME_CHANNEL_CAPACITY: usize = 256;

// ── ReconnectPolicy ──────────────────────────────────────────────────

/// Exponential backoff configuration for push-channel reconnection.
///
/// The default performs no reconnection at all: once the socket drops the
/// connection stays closed until its owner opens a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` retries forever, `Some(0)` never reconnects.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: Some(0),
        }
    }
}

impl ReconnectPolicy {
    /// Never reconnect.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Reconnect forever with the default delays.
    pub fn forever() -> Self {
        Self {
            max_retries: None,
            ..Self::default()
        }
    }

    fn allows(&self, attempt: u32) -> bool {
        self.max_retries.is_none_or(|max| attempt < max)
    }
}

// ── Frame decoding ───────────────────────────────────────────────────

/// Result of decoding one text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome<T> {
    /// Literal `null` (or an empty frame): the server had nothing new.
    Ignored,
    /// A payload matching the topic's wire shape.
    Payload(T),
    /// Anything else. Carries the decode error for logging.
    Malformed(String),
}

/// Decode a push-channel text frame into the topic's wire type.
pub fn decode_frame<T: DeserializeOwned>(text: &str) -> FrameOutcome<T> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return FrameOutcome::Ignored;
    }
    match serde_json::from_str(trimmed) {
        Ok(payload) => FrameOutcome::Payload(payload),
        Err(e) => FrameOutcome::Malformed(e.to_string()),
    }
}

// ── PushConnection ───────────────────────────────────────────────────

/// Handle to one running push channel.
///
/// Owns a child of the caller's cancellation token: [`close`](Self::close)
/// or dropping the handle stops this connection only.
pub struct PushConnection<T> {
    url: Url,
    frame_rx: broadcast::Receiver<Arc<T>>,
    cancel: CancellationToken,
}

impl<T> PushConnection<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Spawn the connection task and return immediately.
    ///
    /// The handshake happens asynchronously; subscribe to start receiving
    /// payloads. `cookie` is sent as the `Cookie` header on the upgrade.
    pub fn open(
        url: Url,
        reconnect: ReconnectPolicy,
        parent: &CancellationToken,
        cookie: Option<String>,
    ) -> Self {
        let (frame_tx, frame_rx) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        let cancel = parent.child_token();

        let task_cancel = cancel.clone();
        let task_url = url.clone();
        tokio::spawn(async move {
            push_loop(task_url, frame_tx, reconnect, task_cancel, cookie).await;
        });

        Self {
            url,
            frame_rx,
            cancel,
        }
    }

    /// New receiver for decoded payloads.
    ///
    /// Receivers that fall behind get [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.frame_rx.resubscribe()
    }
}

impl<T> PushConnection<T> {
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request close. Idempotent; no payload is forwarded afterwards.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl<T> Drop for PushConnection<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background loop ──────────────────────────────────────────────────

/// connect → read → on drop, back off and reconnect if the policy allows.
async fn push_loop<T>(
    url: Url,
    frame_tx: broadcast::Sender<Arc<T>>,
    reconnect: ReconnectPolicy,
    cancel: CancellationToken,
    cookie: Option<String>,
) where
    T: DeserializeOwned + Send + Sync + 'static,
{
    let mut attempt: u32 = 0;

    loop {
        let result = connect_and_read(&url, &frame_tx, &cancel, cookie.as_deref()).await;
        if cancel.is_cancelled() {
            break;
        }

        match result {
            Ok(()) => {
                tracing::info!(url = %url, "push channel closed by server");
                attempt = 0;
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, attempt, "push channel error");
            }
        }

        if !reconnect.allows(attempt) {
            tracing::debug!(url = %url, "push channel not reconnecting");
            break;
        }

        let delay = calculate_backoff(attempt, &reconnect);
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before push reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }

    cancel.cancel();
    tracing::debug!(url = %url, "push loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// One connection: handshake, then read until the socket drops or the
/// token is cancelled. On cancel a single close frame is sent.
async fn connect_and_read<T>(
    url: &Url,
    frame_tx: &broadcast::Sender<Arc<T>>,
    cancel: &CancellationToken,
    cookie: Option<&str>,
) -> Result<(), Error>
where
    T: DeserializeOwned,
{
    tracing::debug!(url = %url, "connecting push channel");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::PushConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(cookie_val) = cookie {
        request = request.with_header("Cookie", cookie_val);
    }

    let (ws_stream, _response) = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        res = tokio_tungstenite::connect_async(request) => {
            res.map_err(|e| Error::PushConnect(e.to_string()))?
        }
    };

    tracing::info!(url = %url, "push channel connected");

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                if let Err(e) = write.send(tungstenite::Message::Close(None)).await {
                    tracing::debug!(error = %e, "close frame not delivered");
                }
                return Ok(());
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        forward(&text, frame_tx, cancel);
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::debug!(code = %cf.code, reason = %cf.reason, "close frame received");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::PushConnect(e.to_string()));
                    }
                    None => return Ok(()),
                    // Ping/pong is answered by tungstenite; binary frames carry nothing for us.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

/// Decode and broadcast one frame unless close was requested meanwhile.
fn forward<T>(text: &str, frame_tx: &broadcast::Sender<Arc<T>>, cancel: &CancellationToken)
where
    T: DeserializeOwned,
{
    if cancel.is_cancelled() {
        return;
    }
    match decode_frame::<T>(text) {
        FrameOutcome::Ignored => tracing::trace!("null push frame"),
        FrameOutcome::Payload(payload) => {
            // No receivers is fine; the owner may not have subscribed yet.
            let _ = frame_tx.send(Arc::new(payload));
        }
        FrameOutcome::Malformed(e) => {
            tracing::warn!(error = %e, "dropping malformed push frame");
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// `delay = min(initial * 2^attempt, max)` with a +-25% deterministic jitter.
fn calculate_backoff(attempt: u32, policy: &ReconnectPolicy) -> Duration {
    let exp = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = policy.initial_delay.as_secs_f64() * 2.0_f64.powi(exp);
    let capped = base.min(policy.max_delay.as_secs_f64());

    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{SensorJson, TemperatureReadingJson};

    #[test]
    fn default_policy_never_reconnects() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_retries, Some(0));
        assert!(!policy.allows(0));
        assert!(ReconnectPolicy::forever().allows(10_000));
    }

    #[test]
    fn backoff_grows_then_caps() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };
        let d0 = calculate_backoff(0, &policy);
        let d2 = calculate_backoff(2, &policy);
        assert!(d2 > d0, "d2 ({d2:?}) should exceed d0 ({d0:?})");
        assert!(calculate_backoff(40, &policy) <= Duration::from_millis(12_500));
    }

    #[test]
    fn null_and_empty_frames_are_ignored() {
        assert_eq!(decode_frame::<Vec<SensorJson>>("null"), FrameOutcome::Ignored);
        assert_eq!(decode_frame::<Vec<SensorJson>>("  null\n"), FrameOutcome::Ignored);
        assert_eq!(decode_frame::<Vec<SensorJson>>(""), FrameOutcome::Ignored);
    }

    #[test]
    fn reading_batch_decodes() {
        let text = r#"[{"sensor_name":"Attic","temperature":21.5,"time":"2025-01-01 10:00:00"}]"#;
        match decode_frame::<Vec<TemperatureReadingJson>>(text) {
            FrameOutcome::Payload(batch) => {
                assert_eq!(batch.len(), 1);
                assert_eq!(batch[0].sensor_name, "Attic");
            }
            other => panic!("expected payload, got {other:?}"),
        }
    }

    #[test]
    fn wrong_shape_is_malformed() {
        let outcome = decode_frame::<Vec<SensorJson>>(r#"{"id": "not-a-list"}"#);
        assert!(matches!(outcome, FrameOutcome::Malformed(_)));
        let outcome = decode_frame::<Vec<SensorJson>>("not json at all");
        assert!(matches!(outcome, FrameOutcome::Malformed(_)));
    }

    #[test]
    fn forward_drops_frames_after_cancel() {
        let (tx, mut rx) = broadcast::channel::<Arc<Vec<SensorJson>>>(4);
        let cancel = CancellationToken::new();

        forward(r#"[{"id":1,"name":"A","type":"Temperature"}]"#, &tx, &cancel);
        assert_eq!(rx.try_recv().unwrap().len(), 1);

        cancel.cancel();
        forward(r#"[{"id":2,"name":"B","type":"Temperature"}]"#, &tx, &cancel);
        assert!(rx.try_recv().is_err());
    }
}
