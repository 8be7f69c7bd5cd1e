// ── Dashboard facade ──
//
// Owns the HTTP client, the push registry and the session identity, and
// vends live subscriptions plus one-shot queries for the CLI.

use std::collections::BTreeMap;
use std::sync::Arc;

use sensorhub_api::HubClient;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::convert::ensure_unique_names;
use crate::error::CoreError;
use crate::model::{AlignedEntry, Identity, NotificationState, SensorHealthRecord, SensorSnapshot};
use crate::push::PushRegistry;
use crate::series::{ReadingsQuery, TemperatureSeries, fetch_aligned};
use crate::store::canonical_order;
use crate::subscription::{
    CurrentReadingsSubscription, NotificationSubscription, RosterSubscription, SyncContext,
    fetch_all, fetch_state,
};

/// The main entry point for consumers.
///
/// Cheaply cloneable. Subscriptions it vends are independent: each one is
/// started and stopped by its owner, and all of them stop when the
/// dashboard shuts down.
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<DashboardInner>,
}

struct DashboardInner {
    config: Arc<SyncConfig>,
    client: Arc<HubClient>,
    registry: Arc<PushRegistry>,
    identity: watch::Sender<Identity>,
    cancel: CancellationToken,
}

impl Dashboard {
    /// Build the client from `config`. Does not touch the network; call
    /// [`connect()`](Self::connect) to resolve the session identity.
    pub fn new(config: SyncConfig) -> Result<Self, CoreError> {
        let client = HubClient::new(config.url.as_str(), &config.transport())?;
        Ok(Self::with_client(config, client))
    }

    /// Use an already-built client (tests, custom transports).
    pub fn with_client(config: SyncConfig, client: HubClient) -> Self {
        let cancel = CancellationToken::new();
        let registry = Arc::new(PushRegistry::new(&cancel));
        let (identity, _) = watch::channel(Identity::Pending);
        Self {
            inner: Arc::new(DashboardInner {
                config: Arc::new(config),
                client: Arc::new(client),
                registry,
                identity,
                cancel,
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &HubClient {
        &self.inner.client
    }

    pub fn registry(&self) -> &PushRegistry {
        &self.inner.registry
    }

    // ── Identity ─────────────────────────────────────────────────

    /// Resolve who the session belongs to. Any failure counts as signed
    /// out; the error is logged, not returned.
    pub async fn connect(&self) -> Identity {
        let identity = match self.inner.client.me().await {
            Ok(me) => Identity::from(me),
            Err(e) => {
                if e.is_unauthorized() {
                    debug!("no valid session");
                } else {
                    warn!(error = %e, "identity lookup failed");
                }
                Identity::Unauthenticated
            }
        };
        if let Identity::Authenticated(user) = &identity {
            info!(user = %user.username, "signed in");
        }
        self.set_identity(identity.clone());
        identity
    }

    pub fn identity(&self) -> Identity {
        self.inner.identity.borrow().clone()
    }

    pub fn identity_changes(&self) -> watch::Receiver<Identity> {
        self.inner.identity.subscribe()
    }

    /// Replace the identity. Gated subscriptions react immediately.
    pub fn set_identity(&self, identity: Identity) {
        self.inner.identity.send_if_modified(|current| {
            if *current == identity {
                return false;
            }
            *current = identity;
            true
        });
    }

    // ── Subscriptions ────────────────────────────────────────────

    fn context(&self) -> SyncContext {
        SyncContext {
            client: Arc::clone(&self.inner.client),
            registry: Arc::clone(&self.inner.registry),
            config: Arc::clone(&self.inner.config),
            cancel: self.inner.cancel.clone(),
        }
    }

    /// Roster feed for every configured sensor type. Not started.
    pub fn roster(&self) -> RosterSubscription {
        RosterSubscription::new(self.context())
    }

    /// Push-fed latest reading per sensor. Not started.
    pub fn current_readings(&self) -> CurrentReadingsSubscription {
        CurrentReadingsSubscription::new(self.context())
    }

    /// Identity-gated notification feed. Not started.
    pub fn notifications(&self) -> NotificationSubscription {
        NotificationSubscription::new(self.context(), self.identity_changes())
    }

    /// Aligned temperature series for `query`. Not started.
    pub fn temperature_series(&self, query: ReadingsQuery) -> TemperatureSeries {
        TemperatureSeries::new(self.context(), query)
    }

    // ── One-shot queries ─────────────────────────────────────────

    /// Merged roster of every configured type, in canonical order.
    pub async fn fetch_roster(&self) -> Result<Vec<SensorSnapshot>, CoreError> {
        let slices = fetch_all(&self.inner.client, self.inner.config.sensor_types.clone()).await?;
        let mut sensors: Vec<SensorSnapshot> = slices.into_values().flatten().collect();
        ensure_unique_names(&sensors)?;
        canonical_order(&mut sensors);
        Ok(sensors)
    }

    pub async fn fetch_series(&self, query: &ReadingsQuery) -> Result<Vec<AlignedEntry>, CoreError> {
        fetch_aligned(&self.inner.client, query).await
    }

    /// First page, unread count and preferences, as the feed would show
    /// them.
    pub async fn fetch_notifications(&self) -> Result<NotificationState, CoreError> {
        let (records, unread, preferences) =
            fetch_state(&self.inner.client, self.inner.config.notification_page_limit).await?;
        Ok(NotificationState {
            records: records.into_iter().filter(|r| !r.is_dismissed).collect(),
            unread,
            preferences,
        })
    }

    pub async fn sensor_health_history(
        &self,
        name: &str,
        limit: u32,
    ) -> Result<Vec<SensorHealthRecord>, CoreError> {
        let history = self.inner.client.sensor_health_history(name, limit).await?;
        Ok(history.into_iter().map(Into::into).collect())
    }

    pub async fn total_readings_per_sensor(&self) -> Result<BTreeMap<String, i64>, CoreError> {
        Ok(self.inner.client.total_readings_per_sensor().await?)
    }

    /// Connect, run `f`, shut down. For single CLI invocations.
    pub async fn oneshot<F, Fut, T>(config: SyncConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Dashboard) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let dashboard = Dashboard::new(config)?;
        dashboard.connect().await;
        let result = f(dashboard.clone()).await;
        dashboard.shutdown();
        result
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Stop every subscription and push connection this dashboard vended.
    pub fn shutdown(&self) {
        self.inner.registry.shutdown();
        self.inner.cancel.cancel();
        debug!("dashboard shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}

impl Drop for DashboardInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
