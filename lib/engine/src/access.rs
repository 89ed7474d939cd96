//! Access predicates: the rules that turn (user roles, user permissions,
//! resource requirement) into an allow/deny decision.
//!
//! Everything here is pure and deterministic, which is what allows the menu
//! engine to memoize filtered views keyed by an identity fingerprint.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3;

/// Coarse-grained identity tag, drawn from a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Manager,
    Employee,
    Guest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Employee => "employee",
            Role::Guest => "guest",
        }
    }
}

/// Protection level of a resource, ordered by increasing strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    Public,
    Authenticated,
    RoleBased,
}

/// The declared protection on a menu node or route target.
///
/// At `Public` level the role/permission constraints are ignored entirely.
/// `RoleBased` with both constraint lists empty behaves like `Authenticated`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AccessRequirement {
    #[serde(default)]
    pub level: AccessLevel,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl AccessRequirement {
    pub fn public() -> Self {
        AccessRequirement::default()
    }

    pub fn authenticated() -> Self {
        AccessRequirement {
            level: AccessLevel::Authenticated,
            ..Default::default()
        }
    }

    pub fn role_based(roles: &[Role], permissions: &[&str]) -> Self {
        AccessRequirement {
            level: AccessLevel::RoleBased,
            roles: roles.to_vec(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// The authenticated user as seen by the engine. Permission codes are opaque
/// strings, conventionally `resource:action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl UserIdentity {
    pub fn new(id: &str, roles: &[Role], permissions: &[&str]) -> Self {
        UserIdentity {
            id: id.to_string(),
            roles: roles.to_vec(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Structural fingerprint of the identity: id plus the role and
    /// permission *sets* (sorted, deduplicated), so two identities that
    /// differ only in list ordering hash the same.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Xxh3::new();
        self.id.hash(&mut hasher);

        let mut roles: Vec<&str> = self.roles.iter().map(Role::as_str).collect();
        roles.sort_unstable();
        roles.dedup();
        roles.hash(&mut hasher);

        let mut permissions: Vec<&str> = self.permissions.iter().map(String::as_str).collect();
        permissions.sort_unstable();
        permissions.dedup();
        permissions.hash(&mut hasher);

        hasher.finish()
    }
}

/// Checks whether the owned permission codes satisfy the required ones.
///
/// Empty `required` means no constraint. With `require_all` every required
/// code must be owned, otherwise one is enough.
pub fn has_permission(required: &[String], owned: &[String], require_all: bool) -> bool {
    if required.is_empty() {
        return true;
    }
    if owned.is_empty() {
        return false;
    }
    if require_all {
        required.iter().all(|p| owned.contains(p))
    } else {
        required.iter().any(|p| owned.contains(p))
    }
}

/// Same contract as [`has_permission`], over roles.
pub fn has_role(required: &[Role], owned: &[Role], require_all: bool) -> bool {
    if required.is_empty() {
        return true;
    }
    if owned.is_empty() {
        return false;
    }
    if require_all {
        required.iter().all(|r| owned.contains(r))
    } else {
        required.iter().any(|r| owned.contains(r))
    }
}

/// The access decision, with the default any-of semantics for role and
/// permission constraints.
pub fn can_access(requirement: &AccessRequirement, identity: Option<&UserIdentity>) -> bool {
    can_access_with(requirement, identity, false)
}

/// The access decision. This is a closed decision table: any combination not
/// explicitly allowed is a deny.
pub fn can_access_with(
    requirement: &AccessRequirement,
    identity: Option<&UserIdentity>,
    require_all: bool,
) -> bool {
    match (requirement.level, identity) {
        (AccessLevel::Public, _) => true,
        (_, None) => false,
        (AccessLevel::Authenticated, Some(_)) => true,
        (AccessLevel::RoleBased, Some(identity)) => {
            let roles_ok = requirement.roles.is_empty()
                || has_role(&requirement.roles, &identity.roles, require_all);
            let permissions_ok = requirement.permissions.is_empty()
                || has_permission(&requirement.permissions, &identity.permissions, require_all);
            roles_ok && permissions_ok
        }
    }
}
