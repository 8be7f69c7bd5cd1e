// Shared transport configuration for building reqwest::Client instances.
//
// The REST client and the push-channel upgrade request share TLS, timeout
// and session settings through this module.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

const USER_AGENT: &str = concat!("sensorhub/", env!("CARGO_PKG_VERSION"));

/// Name of the session cookie issued by the SensorHub server.
pub const SESSION_COOKIE: &str = "sensor_hub_session";

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (self-signed lab servers).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
    /// Session token sent as a cookie on every request and push upgrade.
    pub session: Option<SecretString>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            session: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// The session cookie, when present, is injected as a sensitive default
    /// header so it never shows up in debug output.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = self.cookie_header() {
            let mut value = HeaderValue::from_str(&cookie)
                .map_err(|e| Error::Tls(format!("invalid session cookie value: {e}")))?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// The `Cookie` header value for the configured session, if any.
    pub fn cookie_header(&self) -> Option<String> {
        self.session
            .as_ref()
            .map(|s| format!("{SESSION_COOKIE}={}", s.expose_secret()))
    }

    /// Attach a session token.
    pub fn with_session(mut self, token: SecretString) -> Self {
        self.session = Some(token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_absent_without_session() {
        assert!(TransportConfig::default().cookie_header().is_none());
    }

    #[test]
    fn cookie_header_carries_session_token() {
        let cfg = TransportConfig::default().with_session(SecretString::from("abc123"));
        assert_eq!(
            cfg.cookie_header().as_deref(),
            Some("sensor_hub_session=abc123")
        );
    }

    #[test]
    fn missing_ca_file_is_a_tls_error() {
        let cfg = TransportConfig {
            tls: TlsMode::CustomCa(PathBuf::from("/nonexistent/ca.pem")),
            ..TransportConfig::default()
        };
        assert!(matches!(cfg.build_client(), Err(Error::Tls(_))));
    }
}
