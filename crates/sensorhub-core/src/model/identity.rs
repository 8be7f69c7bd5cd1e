// ── Session identity ──

use serde::{Deserialize, Serialize};

/// Permission required to see the notification feed.
pub const VIEW_NOTIFICATIONS: &str = "view_notifications";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl User {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// Who the session belongs to. Gated push topics wait while `Pending`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Identity {
    /// Not resolved yet.
    #[default]
    Pending,
    Unauthenticated,
    Authenticated(User),
}

/// Outcome of gating the notification feed on an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAccess {
    /// Identity not resolved; do nothing yet.
    Pending,
    /// Signed out or lacking permission; stay closed.
    Denied,
    /// Open for the given user id.
    Granted(i64),
}

impl Identity {
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(u) => Some(u),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn notification_access(&self) -> NotificationAccess {
        match self {
            Self::Pending => NotificationAccess::Pending,
            Self::Unauthenticated => NotificationAccess::Denied,
            Self::Authenticated(u) if u.has_permission(VIEW_NOTIFICATIONS) => {
                NotificationAccess::Granted(u.id)
            }
            Self::Authenticated(_) => NotificationAccess::Denied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(perms: &[&str]) -> User {
        User {
            id: 4,
            username: "ops".into(),
            email: None,
            roles: vec!["viewer".into()],
            permissions: perms.iter().map(|p| (*p).to_owned()).collect(),
        }
    }

    #[test]
    fn access_follows_identity_and_permission() {
        assert_eq!(
            Identity::Pending.notification_access(),
            NotificationAccess::Pending
        );
        assert_eq!(
            Identity::Unauthenticated.notification_access(),
            NotificationAccess::Denied
        );
        assert_eq!(
            Identity::Authenticated(user(&["view_readings"])).notification_access(),
            NotificationAccess::Denied
        );
        assert_eq!(
            Identity::Authenticated(user(&[VIEW_NOTIFICATIONS])).notification_access(),
            NotificationAccess::Granted(4)
        );
    }
}
