//! Client-side navigation engine for the portal shell: role and permission
//! evaluation, menu tree shaping, memoized menu views, navigation state, and
//! the route access gate.
//!
//! The crate is UI-framework agnostic. Hosts plug in three collaborators:
//! a [`provider::MenuProvider`] for remote menu payloads, a
//! [`gate::SessionGuard`] for session lifecycle, and a
//! [`session::KeyValueStore`] for persistence.

pub mod access;
pub mod engine;
pub mod gate;
pub mod logging;
pub mod menu;
pub mod navigation;
pub mod provider;
pub mod session;
pub mod tree;

pub use access::{
    can_access, can_access_with, AccessLevel, AccessRequirement, Role, UserIdentity,
};
pub use engine::{MenuEngine, MenuPatch, HEAD_TREE, SIDE_TREE};
pub use gate::{AccessGate, GateOutcome, RefreshError, RouteTarget, SessionGuard};
pub use logging::init_logging;
pub use menu::{MenuKind, MenuNode, RawMenuNode, ValidationError, ValidationIssue};
pub use navigation::NavigationState;
pub use provider::{MenuProvider, ProviderError};
pub use session::{KeyValueStore, MemoryStore, SessionStore};
