//! The menu node model: the strict in-memory shape, the lenient wire shape
//! remote sources deliver, and structural validation.

use std::fmt;
use std::str::FromStr;

use ahash::{HashMap, HashMapExt};
use serde::{Deserialize, Serialize};

use crate::access::{AccessLevel, AccessRequirement, Role};
use crate::tree::TreeNode;

/// Rendering category of a menu node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuKind {
    #[default]
    Item,
    Group,
    Divider,
}

/// A fully normalized menu node. Instances the engine hands out are always in
/// this shape; lenient inputs go through [`RawMenuNode::normalize`] first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MenuNode {
    pub key: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub kind: MenuKind,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub external: bool,
    /// Whether the node shows up in generated breadcrumbs.
    #[serde(default = "default_true")]
    pub breadcrumb: bool,
    #[serde(default)]
    pub access: AccessRequirement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<MenuNode>>,
}

fn default_true() -> bool {
    true
}

impl MenuNode {
    pub fn item(key: &str, title: &str, path: &str, order: i64) -> Self {
        MenuNode {
            key: key.to_string(),
            title: title.to_string(),
            path: Some(path.to_string()),
            icon: None,
            kind: MenuKind::Item,
            order,
            hidden: false,
            disabled: false,
            external: false,
            breadcrumb: true,
            access: AccessRequirement::default(),
            children: None,
        }
    }

    pub fn group(key: &str, title: &str, order: i64, children: Vec<MenuNode>) -> Self {
        MenuNode {
            key: key.to_string(),
            title: title.to_string(),
            path: None,
            icon: None,
            kind: MenuKind::Group,
            order,
            hidden: false,
            disabled: false,
            external: false,
            breadcrumb: true,
            access: AccessRequirement::default(),
            children: Some(children),
        }
    }

    pub fn with_access(mut self, access: AccessRequirement) -> Self {
        self.access = access;
        self
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

impl TreeNode for MenuNode {
    fn key(&self) -> &str {
        &self.key
    }

    fn children(&self) -> Option<&[Self]> {
        self.children.as_deref()
    }

    fn set_children(&mut self, children: Option<Vec<Self>>) {
        self.children = children;
    }

    fn order(&self) -> i64 {
        self.order
    }

    fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn in_breadcrumb(&self) -> bool {
        self.breadcrumb
    }

    fn matches_text(&self, term: &str) -> bool {
        self.title.to_lowercase().contains(term)
            || self.key.to_lowercase().contains(term)
            || self
                .path
                .as_deref()
                .is_some_and(|p| p.to_lowercase().contains(term))
    }

    fn absorb(&mut self, incoming: &Self) {
        self.title = incoming.title.clone();
        self.path = incoming.path.clone();
        self.icon = incoming.icon.clone();
        self.kind = incoming.kind;
        self.order = incoming.order;
        self.hidden = incoming.hidden;
        self.disabled = incoming.disabled;
        self.external = incoming.external;
        self.breadcrumb = incoming.breadcrumb;
        self.access = incoming.access.clone();
    }
}

/// The lenient shape remote menu sources are allowed to send. Field aliases
/// accumulated across backend versions are resolved here, in one place, so
/// the rest of the engine only ever sees [`MenuNode`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RawMenuNode {
    pub key: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,

    pub title: Option<String>,
    pub label: Option<String>,

    pub path: Option<String>,
    pub route: Option<String>,
    pub url: Option<String>,

    pub icon: Option<String>,
    pub kind: Option<String>,

    pub order: Option<i64>,
    pub sort: Option<i64>,

    pub level: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,

    pub hidden: Option<bool>,
    pub disabled: Option<bool>,
    pub external: Option<bool>,
    pub breadcrumb: Option<bool>,

    pub children: Option<Vec<RawMenuNode>>,
}

impl RawMenuNode {
    /// Collapses the alias fields into the strict shape.
    ///
    /// Precedence is `key > id > name`, `title > label`, `path > route > url`
    /// and `order > sort`. Unknown `kind`, `level`, or role strings fall back
    /// to the defaults with a warning rather than rejecting the whole tree.
    pub fn normalize(&self) -> MenuNode {
        let key = self
            .key
            .clone()
            .or_else(|| self.id.clone())
            .or_else(|| self.name.clone())
            .unwrap_or_default();

        let kind = match self.kind.as_deref() {
            None | Some("item") => MenuKind::Item,
            Some("group") => MenuKind::Group,
            Some("divider") => MenuKind::Divider,
            Some(other) => {
                tracing::warn!(node = %key, kind = %other, "unknown menu kind, treating as item");
                MenuKind::Item
            }
        };

        let level = match self.level.as_deref() {
            None | Some("public") => AccessLevel::Public,
            Some("authenticated") => AccessLevel::Authenticated,
            Some("role_based") => AccessLevel::RoleBased,
            Some(other) => {
                tracing::warn!(node = %key, level = %other, "unknown access level, treating as public");
                AccessLevel::Public
            }
        };

        let roles: Vec<Role> = self
            .roles
            .iter()
            .filter_map(|raw| match Role::from_str(raw) {
                Ok(role) => Some(role),
                Err(_) => {
                    tracing::warn!(node = %key, role = %raw, "unknown role in menu payload, skipping");
                    None
                }
            })
            .collect();

        MenuNode {
            title: self.title.clone().or_else(|| self.label.clone()).unwrap_or_default(),
            path: self
                .path
                .clone()
                .or_else(|| self.route.clone())
                .or_else(|| self.url.clone()),
            icon: self.icon.clone(),
            kind,
            order: self.order.or(self.sort).unwrap_or(0),
            hidden: self.hidden.unwrap_or(false),
            disabled: self.disabled.unwrap_or(false),
            external: self.external.unwrap_or(false),
            breadcrumb: self.breadcrumb.unwrap_or(true),
            access: AccessRequirement {
                level,
                roles,
                permissions: self.permissions.clone(),
            },
            children: self
                .children
                .as_ref()
                .map(|c| c.iter().map(RawMenuNode::normalize).collect()),
            key,
        }
    }
}

pub fn normalize_all(raw: &[RawMenuNode]) -> Vec<MenuNode> {
    raw.iter().map(RawMenuNode::normalize).collect()
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "employee" => Ok(Role::Employee),
            "guest" => Ok(Role::Guest),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

/// One structural defect found by [`validate_forest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Location of the offending node, e.g. `side[1].children[0]`.
    pub location: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

#[derive(Debug)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl std::error::Error for ValidationError {}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid menu forest: ")?;
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

/// Validates a whole forest of named trees: every node needs a key and a
/// title, and keys must be unique across all trees. Duplicate reports name
/// both occurrences.
pub fn validate_forest(trees: &[(&str, &[MenuNode])]) -> Result<(), ValidationError> {
    let mut issues = Vec::new();
    let mut seen: HashMap<String, String> = HashMap::new();

    for (name, nodes) in trees {
        for (i, node) in nodes.iter().enumerate() {
            validate_node(node, &format!("{name}[{i}]"), &mut seen, &mut issues);
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { issues })
    }
}

/// Single-tree convenience wrapper over [`validate_forest`].
pub fn validate(name: &str, nodes: &[MenuNode]) -> Result<(), ValidationError> {
    validate_forest(&[(name, nodes)])
}

fn validate_node(
    node: &MenuNode,
    location: &str,
    seen: &mut HashMap<String, String>,
    issues: &mut Vec<ValidationIssue>,
) {
    if node.key.is_empty() {
        issues.push(ValidationIssue {
            location: location.to_string(),
            message: "missing key".to_string(),
        });
    } else if let Some(first) = seen.get(&node.key) {
        issues.push(ValidationIssue {
            location: location.to_string(),
            message: format!("duplicate key '{}', first seen at {first}", node.key),
        });
    } else {
        seen.insert(node.key.clone(), location.to_string());
    }

    if node.title.is_empty() && node.kind != MenuKind::Divider {
        issues.push(ValidationIssue {
            location: location.to_string(),
            message: "missing title".to_string(),
        });
    }

    if let Some(children) = &node.children {
        for (i, child) in children.iter().enumerate() {
            validate_node(child, &format!("{location}.children[{i}]"), seen, issues);
        }
    }
}
