// ── Core error types ──
//
// Domain errors from sensorhub-core. Consumers never match on HTTP status
// codes or serde failures directly: `From<sensorhub_api::Error>` folds the
// wire-layer taxonomy into the variants below.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach SensorHub at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request to SensorHub timed out")]
    Timeout,

    #[error("Not signed in -- session missing or expired")]
    Unauthorized,

    #[error("Permission denied: {message}")]
    Forbidden { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// A payload failed boundary validation and was dropped.
    #[error("Invalid payload: {message}")]
    Decode { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    // ── Lifecycle ────────────────────────────────────────────────────
    /// The attempt was cancelled by teardown. Never surfaced by
    /// subscriptions; one-shot callers may see it.
    #[error("Operation cancelled")]
    Cancelled,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Worth retrying on the next scheduled cycle.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout => true,
            Self::Api { status, .. } => status.is_some_and(|s| s >= 500),
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<sensorhub_api::Error> for CoreError {
    fn from(err: sensorhub_api::Error) -> Self {
        match err {
            sensorhub_api::Error::Unauthorized => CoreError::Unauthorized,
            sensorhub_api::Error::Forbidden { message } => CoreError::Forbidden { message },
            sensorhub_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            sensorhub_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            sensorhub_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            sensorhub_api::Error::Api {
                status: 404,
                message,
                ..
            } => CoreError::NotFound { what: message },
            sensorhub_api::Error::Api {
                status,
                message,
                detail,
            } => CoreError::Api {
                message: match detail {
                    Some(d) if !d.is_empty() => format!("{message} ({d})"),
                    _ => message,
                },
                status: Some(status),
            },
            sensorhub_api::Error::PushConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("push channel: {reason}"),
            },
            sensorhub_api::Error::PushClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("push channel closed (code {code}): {reason}"),
            },
            sensorhub_api::Error::Deserialization { message, body: _ } => {
                CoreError::Decode { message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_from_404() {
        let err = CoreError::from(sensorhub_api::Error::Api {
            status: 404,
            message: "Sensor not found".into(),
            detail: None,
        });
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn api_detail_is_kept_in_message() {
        let err = CoreError::from(sensorhub_api::Error::Api {
            status: 500,
            message: "Failed".into(),
            detail: Some("db down".into()),
        });
        assert_eq!(err.to_string(), "API error: Failed (db down)");
        assert!(err.is_transient());
    }

    #[test]
    fn deserialization_becomes_decode() {
        let err = CoreError::from(sensorhub_api::Error::Deserialization {
            message: "expected array".into(),
            body: "{}".into(),
        });
        assert!(matches!(err, CoreError::Decode { .. }));
        assert!(!err.is_transient());
    }
}
