//! The access gate: the single decision point every navigation passes
//! through before a route is entered.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use portal_nav_config::gate::GateConfig;

use crate::access::{can_access, AccessRequirement, UserIdentity};
use crate::tree::{self, TreeNode};

/// A navigable route with its declared protection. Children carry their full
/// path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTarget {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub access: AccessRequirement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<RouteTarget>>,
}

impl RouteTarget {
    pub fn new(name: &str, path: &str, access: AccessRequirement) -> Self {
        RouteTarget {
            name: name.to_string(),
            path: path.to_string(),
            access,
            children: None,
        }
    }

    pub fn with_children(mut self, children: Vec<RouteTarget>) -> Self {
        self.children = Some(children);
        self
    }
}

impl TreeNode for RouteTarget {
    fn key(&self) -> &str {
        &self.name
    }

    fn children(&self) -> Option<&[Self]> {
        self.children.as_deref()
    }

    fn set_children(&mut self, children: Option<Vec<Self>>) {
        self.children = children;
    }

    fn path(&self) -> Option<&str> {
        Some(&self.path)
    }

    fn absorb(&mut self, incoming: &Self) {
        self.path = incoming.path.clone();
        self.access = incoming.access.clone();
    }
}

/// What the host router should do with a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Allowed,
    /// Send to the login page; `resume` is the path to return to after a
    /// successful login.
    RedirectLogin { resume: Option<String> },
    RedirectForbidden,
    RedirectHome,
}

impl fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateOutcome::Allowed => write!(f, "allow"),
            GateOutcome::RedirectLogin { resume: Some(path) } => {
                write!(f, "redirect: login (resume {path})")
            }
            GateOutcome::RedirectLogin { resume: None } => write!(f, "redirect: login"),
            GateOutcome::RedirectForbidden => write!(f, "redirect: forbidden"),
            GateOutcome::RedirectHome => write!(f, "redirect: home"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("session refresh rejected: {0}")]
    Rejected(String),
    #[error("session refresh failed: {0}")]
    Transport(String),
}

/// The session lifecycle collaborator: expiry checks, one-shot refresh, and
/// forced logout. Implemented by the host against its auth backend.
#[async_trait]
pub trait SessionGuard: Send + Sync {
    fn is_expired(&self, identity: &UserIdentity) -> bool;

    /// Attempts to extend the session, returning the refreshed identity.
    async fn refresh(&self, identity: &UserIdentity) -> Result<UserIdentity, RefreshError>;

    /// Tears the session down (clear storage, notify the host).
    async fn force_logout(&self);
}

pub struct AccessGate {
    config: GateConfig,
    routes: Vec<RouteTarget>,
}

impl AccessGate {
    pub fn new(config: GateConfig, routes: Vec<RouteTarget>) -> Self {
        AccessGate { config, routes }
    }

    /// Whether `path` bypasses authorization. Allow-list entries ending in
    /// `*` are prefix matches, all others are exact.
    pub fn is_allow_listed(&self, path: &str) -> bool {
        self.config.allow_list.iter().any(|entry| {
            match entry.strip_suffix('*') {
                Some(prefix) => path.starts_with(prefix),
                None => entry == path,
            }
        })
    }

    /// Decides a navigation to `path`. The checks run in a fixed order:
    /// allow list (with the login-page bounce for authenticated users),
    /// identity presence, session expiry (one refresh attempt, then forced
    /// logout), and finally the route's own access requirement. Anything not
    /// explicitly decided earlier is allowed.
    pub async fn authorize(
        &self,
        path: &str,
        identity: Option<&UserIdentity>,
        session: &dyn SessionGuard,
    ) -> GateOutcome {
        if self.is_allow_listed(path) {
            if path == self.config.login_path && identity.is_some() {
                return GateOutcome::RedirectHome;
            }
            return GateOutcome::Allowed;
        }

        let Some(identity) = identity else {
            return GateOutcome::RedirectLogin {
                resume: Some(path.to_string()),
            };
        };

        let mut current = identity.clone();
        if session.is_expired(&current) {
            match session.refresh(&current).await {
                Ok(refreshed) if !session.is_expired(&refreshed) => {
                    current = refreshed;
                }
                Ok(_) => {
                    tracing::warn!(user = %current.id, "session still expired after refresh, forcing logout");
                    session.force_logout().await;
                    return GateOutcome::RedirectLogin {
                        resume: Some(path.to_string()),
                    };
                }
                Err(error) => {
                    tracing::warn!(user = %current.id, %error, "session refresh failed, forcing logout");
                    session.force_logout().await;
                    return GateOutcome::RedirectLogin {
                        resume: Some(path.to_string()),
                    };
                }
            }
        }

        if let Some(route) = tree::find_by_path(&self.routes, path) {
            if !can_access(&route.access, Some(&current)) {
                tracing::warn!(user = %current.id, path, "access to route denied");
                return GateOutcome::RedirectForbidden;
            }
        }

        GateOutcome::Allowed
    }

    pub fn login_path(&self) -> &str {
        &self.config.login_path
    }

    pub fn home_path(&self) -> &str {
        &self.config.home_path
    }

    pub fn forbidden_path(&self) -> &str {
        &self.config.forbidden_path
    }
}
