// SensorHub REST client
//
// Wraps `reqwest::Client` with SensorHub URL construction, error-body
// parsing, and CSRF token handling. Endpoint methods are grouped by
// resource below; each returns wire types from `crate::types`.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;
use crate::types::{
    ApiMessage, ChannelPreferenceJson, ErrorBody, MeResponse, SensorHealthHistoryJson, SensorJson,
    TemperatureReadingJson, UnreadCountJson, UserNotificationJson,
};

const CSRF_HEADER: &str = "X-CSRF-Token";

/// Async client for the SensorHub REST API.
///
/// Mutating requests carry the `X-CSRF-Token` header once a token has been
/// obtained from [`me()`](Self::me) (or set explicitly).
pub struct HubClient {
    http: reqwest::Client,
    base_url: Url,
    session_cookie: Option<SecretString>,
    csrf_token: RwLock<Option<String>>,
}

impl HubClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build a client for `base_url` from a transport config.
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self {
            http,
            base_url,
            session_cookie: transport.cookie_header().map(SecretString::from),
            csrf_token: RwLock::new(None),
        })
    }

    /// Wrap an existing `reqwest::Client` (caller manages session headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self {
            http,
            base_url,
            session_cookie: None,
            csrf_token: RwLock::new(None),
        })
    }

    /// Ensure the base URL path ends with a slash so relative joins append.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `Cookie` header value to replay on push-channel upgrade requests.
    pub fn push_cookie(&self) -> Option<String> {
        self.session_cookie
            .as_ref()
            .map(|c| c.expose_secret().to_owned())
    }

    pub fn set_csrf_token(&self, token: Option<String>) {
        *self
            .csrf_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn csrf_token(&self) -> Option<String> {
        self.csrf_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build an endpoint URL from path segments. Segments are
    /// percent-encoded, so sensor names with spaces or slashes are safe.
    /// A trailing `""` segment produces a trailing slash.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Build the `ws://` / `wss://` URL for a push-channel path.
    pub fn push_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.endpoint(segments)?;
        let scheme = if self.base_url.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::PushConnect(format!("cannot derive push URL from {url}")))?;
        Ok(url)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {url}");
        let resp = self.http.get(url).send().await?;
        Self::handle_response(resp).await
    }

    async fn get_with_params<T: DeserializeOwned>(
        &self,
        url: Url,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        debug!("GET {url} params={params:?}");
        let resp = self.http.get(url).query(params).send().await?;
        Self::handle_response(resp).await
    }

    async fn post_empty(&self, url: Url) -> Result<ApiMessage, Error> {
        debug!("POST {url}");
        let resp = self.with_csrf(self.http.post(url)).send().await?;
        Self::handle_message(resp).await
    }

    async fn post_json<B: Serialize + Sync>(&self, url: Url, body: &B) -> Result<ApiMessage, Error> {
        debug!("POST {url}");
        let resp = self.with_csrf(self.http.post(url)).json(body).send().await?;
        Self::handle_message(resp).await
    }

    async fn put_json<B: Serialize + Sync>(&self, url: Url, body: &B) -> Result<ApiMessage, Error> {
        debug!("PUT {url}");
        let resp = self.with_csrf(self.http.put(url)).json(body).send().await?;
        Self::handle_message(resp).await
    }

    fn with_csrf(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.csrf_token().and_then(|t| HeaderValue::from_str(&t).ok()) {
            Some(mut value) => {
                value.set_sensitive(true);
                req.header(CSRF_HEADER, value)
            }
            None => req,
        }
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        if !status.is_success() {
            return Err(Self::parse_error(status, resp).await);
        }
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }

    /// Mutation endpoints answer `{message}` or nothing at all.
    async fn handle_message(resp: reqwest::Response) -> Result<ApiMessage, Error> {
        let status = resp.status();
        if !status.is_success() {
            return Err(Self::parse_error(status, resp).await);
        }
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(ApiMessage::default());
        }
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }

    async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Error::Unauthorized;
        }

        let raw = resp.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<ErrorBody>(&raw).ok();
        let message = parsed
            .as_ref()
            .and_then(|b| b.message.clone())
            .unwrap_or_else(|| {
                if raw.is_empty() {
                    status.to_string()
                } else {
                    raw.clone()
                }
            });

        if status == reqwest::StatusCode::FORBIDDEN {
            return Error::Forbidden { message };
        }

        Error::Api {
            status: status.as_u16(),
            message,
            detail: parsed.and_then(|b| b.error),
        }
    }

    // ── Auth ─────────────────────────────────────────────────────────

    /// Resolve the current session's user. Stores the CSRF token the
    /// server hands back so later mutations are accepted.
    pub async fn me(&self) -> Result<MeResponse, Error> {
        let me: MeResponse = self.get(self.endpoint(&["auth", "me"])?).await?;
        if let Some(ref token) = me.csrf_token {
            if !token.is_empty() {
                self.set_csrf_token(Some(token.clone()));
            }
        }
        Ok(me)
    }

    // ── Sensors ──────────────────────────────────────────────────────

    /// `GET /sensors/?type=<T>`; all sensors when `sensor_type` is `None`.
    pub async fn list_sensors(&self, sensor_type: Option<&str>) -> Result<Vec<SensorJson>, Error> {
        let url = self.endpoint(&["sensors", ""])?;
        match sensor_type {
            Some(t) => self.get_with_params(url, &[("type", t.to_owned())]).await,
            None => self.get(url).await,
        }
    }

    pub async fn sensor_health_history(
        &self,
        name: &str,
        limit: u32,
    ) -> Result<Vec<SensorHealthHistoryJson>, Error> {
        let url = self.endpoint(&["sensors", "health", name])?;
        self.get_with_params(url, &[("limit", limit.to_string())])
            .await
    }

    pub async fn total_readings_per_sensor(&self) -> Result<BTreeMap<String, i64>, Error> {
        self.get(self.endpoint(&["sensors", "stats", "total-readings"])?)
            .await
    }

    // ── Temperature ──────────────────────────────────────────────────

    /// Raw readings between two ISO dates (inclusive, server-defined).
    pub async fn readings_between(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<TemperatureReadingJson>, Error> {
        let url = self.endpoint(&["temperature", "readings", "between"])?;
        self.get_with_params(url, &[("start", start.to_owned()), ("end", end.to_owned())])
            .await
    }

    /// Hourly averages between two ISO dates.
    pub async fn hourly_readings_between(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<TemperatureReadingJson>, Error> {
        let url = self.endpoint(&["temperature", "readings", "hourly", "between"])?;
        self.get_with_params(url, &[("start", start.to_owned()), ("end", end.to_owned())])
            .await
    }

    // ── Notifications ────────────────────────────────────────────────

    pub async fn list_notifications(
        &self,
        limit: u32,
        offset: u32,
        include_dismissed: bool,
    ) -> Result<Vec<UserNotificationJson>, Error> {
        let url = self.endpoint(&["notifications", ""])?;
        self.get_with_params(
            url,
            &[
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
                ("include_dismissed", include_dismissed.to_string()),
            ],
        )
        .await
    }

    pub async fn unread_count(&self) -> Result<UnreadCountJson, Error> {
        self.get(self.endpoint(&["notifications", "unread-count"])?)
            .await
    }

    pub async fn channel_preferences(&self) -> Result<Vec<ChannelPreferenceJson>, Error> {
        self.get(self.endpoint(&["notifications", "preferences"])?)
            .await
    }

    pub async fn mark_read(&self, notification_id: i64) -> Result<ApiMessage, Error> {
        let id = notification_id.to_string();
        self.post_empty(self.endpoint(&["notifications", &id, "read"])?)
            .await
    }

    pub async fn dismiss(&self, notification_id: i64) -> Result<ApiMessage, Error> {
        let id = notification_id.to_string();
        self.post_empty(self.endpoint(&["notifications", &id, "dismiss"])?)
            .await
    }

    pub async fn bulk_mark_read(&self) -> Result<ApiMessage, Error> {
        self.post_empty(self.endpoint(&["notifications", "bulk", "read"])?)
            .await
    }

    pub async fn bulk_dismiss(&self) -> Result<ApiMessage, Error> {
        self.post_empty(self.endpoint(&["notifications", "bulk", "dismiss"])?)
            .await
    }

    /// `POST /notifications/preferences`
    pub async fn set_channel_preference(
        &self,
        pref: &ChannelPreferenceJson,
    ) -> Result<ApiMessage, Error> {
        self.post_json(self.endpoint(&["notifications", "preferences"])?, pref)
            .await
    }

    /// `PUT /notifications/preferences`
    pub async fn update_channel_preference(
        &self,
        pref: &ChannelPreferenceJson,
    ) -> Result<ApiMessage, Error> {
        self.put_json(self.endpoint(&["notifications", "preferences"])?, pref)
            .await
    }
}
