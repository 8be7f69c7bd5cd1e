use thiserror::Error;

/// Top-level error type for the `sensorhub-api` crate.
///
/// Covers every failure mode of the wire layer: HTTP transport, non-2xx
/// responses, payload decoding, and the push channel.
/// `sensorhub-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authorization ───────────────────────────────────────────────
    /// The server rejected the session (HTTP 401).
    #[error("Unauthorized -- session missing or expired")]
    Unauthorized,

    /// The session lacks a permission the endpoint requires (HTTP 403).
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API ─────────────────────────────────────────────────────────
    /// Non-success response with the server's `{message, error}` body.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        message: String,
        detail: Option<String>,
    },

    // ── Push channel ────────────────────────────────────────────────
    /// WebSocket handshake failed.
    #[error("Push channel connection failed: {0}")]
    PushConnect(String),

    /// WebSocket closed with an error while reading.
    #[error("Push channel closed (code {code}): {reason}")]
    PushClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying on the
    /// next scheduled cycle.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            Self::PushConnect(_) | Self::PushClosed { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the session was rejected outright.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}
