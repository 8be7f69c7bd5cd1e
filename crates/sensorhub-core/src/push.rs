// ── Push topics and connection registry ──
//
// Keeps at most one live push connection per (topic, mount). A mount is
// one consumer instance (a subscription); opening a topic again for the
// same mount closes the earlier connection first.

use std::fmt;

use dashmap::DashMap;
use sensorhub_api::{HubClient, PushConnection, ReconnectPolicy};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::CoreError;

/// A server push channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Roster of one sensor type: `/sensors/ws/{type}`.
    SensorRoster(String),
    /// Latest reading per sensor: `/temperature/ws/current-temperatures`.
    CurrentReadings,
    /// New notifications for the signed-in user: `/notifications/ws`.
    Notifications,
}

impl Topic {
    pub fn path_segments(&self) -> Vec<&str> {
        match self {
            Self::SensorRoster(kind) => vec!["sensors", "ws", kind.as_str()],
            Self::CurrentReadings => vec!["temperature", "ws", "current-temperatures"],
            Self::Notifications => vec!["notifications", "ws"],
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorRoster(kind) => write!(f, "roster:{kind}"),
            Self::CurrentReadings => f.write_str("current-readings"),
            Self::Notifications => f.write_str("notifications"),
        }
    }
}

/// Identifies one consumer of push topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MountId(Uuid);

impl MountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub struct PushRegistry {
    root: CancellationToken,
    live: DashMap<(Topic, MountId), CancellationToken>,
}

impl PushRegistry {
    /// Registry whose connections all close when `parent` is cancelled.
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            root: parent.child_token(),
            live: DashMap::new(),
        }
    }

    /// Open `topic` for `mount`, closing any connection the mount already
    /// holds for it. The returned handle closes the connection on drop.
    pub fn open<T>(
        &self,
        client: &HubClient,
        topic: Topic,
        mount: MountId,
        reconnect: ReconnectPolicy,
    ) -> Result<PushConnection<T>, CoreError>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let url = client.push_url(&topic.path_segments())?;
        let entry = self.root.child_token();
        if let Some(previous) = self.live.insert((topic.clone(), mount), entry.clone()) {
            debug!(topic = %topic, mount = %mount, "replacing live push connection");
            previous.cancel();
        }
        debug!(topic = %topic, url = %url, "opening push channel");
        Ok(PushConnection::open(url, reconnect, &entry, client.push_cookie()))
    }

    /// Close one connection. Returns whether one was registered.
    pub fn close(&self, topic: &Topic, mount: MountId) -> bool {
        match self.live.remove(&(topic.clone(), mount)) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Close every connection held by `mount`.
    pub fn close_mount(&self, mount: MountId) {
        self.live.retain(|(_, owner), token| {
            if *owner == mount {
                token.cancel();
                false
            } else {
                true
            }
        });
    }

    pub fn is_open(&self, topic: &Topic, mount: MountId) -> bool {
        self.live
            .get(&(topic.clone(), mount))
            .is_some_and(|token| !token.is_cancelled())
    }

    pub fn live_count(&self) -> usize {
        self.live.iter().filter(|e| !e.value().is_cancelled()).count()
    }

    /// Close everything. Further `open` calls yield already-closed
    /// connections.
    pub fn shutdown(&self) {
        self.root.cancel();
        self.live.clear();
    }
}
