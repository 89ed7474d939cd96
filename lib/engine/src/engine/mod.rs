//! The menu engine: owns the named canonical trees, sources them per the
//! configured mode, memoizes computed views, and applies runtime mutations.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use moka::sync::Cache;
use xxhash_rust::xxh3::Xxh3;

use portal_nav_config::menu::{MenuOptions, SourceMode};

use crate::access::{can_access, UserIdentity};
use crate::menu::{self, normalize_all, MenuNode, ValidationError};
use crate::provider::MenuProvider;
use crate::tree::{self, SortDirection, MAX_DEPTH};

pub const SIDE_TREE: &str = "side";
pub const HEAD_TREE: &str = "head";

struct NamedTree {
    name: String,
    /// The compiled-in tree this one resets to on every `load`.
    baseline: Vec<MenuNode>,
    /// The current source of truth for views.
    canonical: Vec<MenuNode>,
    /// Bumped on every canonical change; part of every view cache key, so
    /// cached views of earlier states become unreachable.
    epoch: u64,
}

/// Partial update applied by [`MenuEngine::update_node`]. `None` fields are
/// left untouched.
#[derive(Debug, Clone, Default)]
pub struct MenuPatch {
    pub title: Option<String>,
    pub path: Option<String>,
    pub icon: Option<String>,
    pub order: Option<i64>,
    pub hidden: Option<bool>,
    pub disabled: Option<bool>,
    pub external: Option<bool>,
    pub breadcrumb: Option<bool>,
    pub kind: Option<crate::menu::MenuKind>,
    pub access: Option<crate::access::AccessRequirement>,
}

impl MenuPatch {
    fn apply(&self, node: &mut MenuNode) {
        if let Some(title) = &self.title {
            node.title = title.clone();
        }
        if let Some(path) = &self.path {
            node.path = Some(path.clone());
        }
        if let Some(icon) = &self.icon {
            node.icon = Some(icon.clone());
        }
        if let Some(order) = self.order {
            node.order = order;
        }
        if let Some(hidden) = self.hidden {
            node.hidden = hidden;
        }
        if let Some(disabled) = self.disabled {
            node.disabled = disabled;
        }
        if let Some(external) = self.external {
            node.external = external;
        }
        if let Some(breadcrumb) = self.breadcrumb {
            node.breadcrumb = breadcrumb;
        }
        if let Some(kind) = self.kind {
            node.kind = kind;
        }
        if let Some(access) = &self.access {
            node.access = access.clone();
        }
    }
}

pub struct MenuEngine {
    options: MenuOptions,
    provider: Option<Arc<dyn MenuProvider>>,
    trees: RwLock<Vec<NamedTree>>,
    /// Computed views keyed by a structural fingerprint. `None` when view
    /// caching is disabled.
    views: Option<Cache<u64, Arc<Vec<MenuNode>>>>,
    /// Monotonic load counter. A `load` that observes a newer generation
    /// after its fetch resolves discards its result.
    generation: AtomicU64,
}

impl MenuEngine {
    /// Engine with the two standard trees (`side`, `head`), both starting
    /// empty.
    pub fn new(options: MenuOptions, provider: Option<Arc<dyn MenuProvider>>) -> Self {
        Self::with_baselines(
            options,
            provider,
            vec![
                (SIDE_TREE.to_string(), Vec::new()),
                (HEAD_TREE.to_string(), Vec::new()),
            ],
        )
    }

    pub fn with_baselines(
        options: MenuOptions,
        provider: Option<Arc<dyn MenuProvider>>,
        baselines: Vec<(String, Vec<MenuNode>)>,
    ) -> Self {
        let views = if options.cache.enabled {
            Some(
                Cache::builder()
                    .max_capacity(options.cache.max_entries)
                    .time_to_live(options.cache.ttl)
                    .build(),
            )
        } else {
            None
        };

        let trees = baselines
            .into_iter()
            .map(|(name, baseline)| NamedTree {
                name,
                canonical: baseline.clone(),
                baseline,
                epoch: 0,
            })
            .collect();

        MenuEngine {
            options,
            provider,
            trees: RwLock::new(trees),
            views,
            generation: AtomicU64::new(0),
        }
    }

    pub fn tree_names(&self) -> Vec<String> {
        self.read_trees().iter().map(|t| t.name.clone()).collect()
    }

    /// Snapshot of a tree's canonical (unfiltered) nodes.
    pub fn canonical(&self, tree: &str) -> Option<Vec<MenuNode>> {
        self.read_trees()
            .iter()
            .find(|t| t.name == tree)
            .map(|t| t.canonical.clone())
    }

    /// (Re)builds the canonical trees for `identity`.
    ///
    /// Every tree first resets to its baseline. Unless the source mode is
    /// static-only, the provider is then asked for each tree's payload, which
    /// replaces (dynamic-only) or merges onto (merged) the canonical tree. A
    /// provider failure keeps the static tree and logs a warning. If another
    /// `load` starts while a fetch is in flight, the older load discards its
    /// result: the last load started always wins.
    pub async fn load(&self, identity: Option<&UserIdentity>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut trees = self.write_trees();
            for t in trees.iter_mut() {
                t.canonical = t.baseline.clone();
                t.epoch += 1;
            }
        }

        if self.options.source == SourceMode::StaticOnly {
            return;
        }
        let (Some(provider), Some(identity)) = (self.provider.as_ref(), identity) else {
            tracing::debug!("no menu source or identity, keeping static trees");
            return;
        };

        for name in self.tree_names() {
            match provider.fetch_menus(&identity.id, &name).await {
                Ok(payload) => {
                    let fetched = normalize_all(&payload);
                    let mut trees = self.write_trees();
                    // checked under the write lock: a newer load cannot
                    // interleave between this check and the write below
                    if self.generation.load(Ordering::SeqCst) != generation {
                        tracing::debug!(tree = %name, "newer load in flight, discarding stale menus");
                        return;
                    }
                    if let Some(t) = trees.iter_mut().find(|t| t.name == name) {
                        t.canonical = match self.options.source {
                            SourceMode::DynamicOnly => {
                                tree::sort_tree(&fetched, SortDirection::Asc)
                            }
                            _ => tree::merge_trees(&t.canonical, &fetched),
                        };
                        t.epoch += 1;
                    }
                }
                Err(error) => {
                    tracing::warn!(tree = %name, %error, "menu source failed, keeping static tree");
                }
            }
        }
    }

    /// The rendered view of a tree for an identity: access-filtered, searched,
    /// and sorted. Unknown tree names yield an empty view with a warning.
    ///
    /// Views are memoized; the key covers the tree's content and epoch, the
    /// identity fingerprint, and the search term, so every mutation or
    /// identity change computes fresh.
    pub fn view(
        &self,
        tree: &str,
        identity: Option<&UserIdentity>,
        search: Option<&str>,
    ) -> Arc<Vec<MenuNode>> {
        let trees = self.read_trees();
        let Some(named) = trees.iter().find(|t| t.name == tree) else {
            tracing::warn!(tree, "view requested for unknown tree");
            return Arc::new(Vec::new());
        };

        let term = if self.options.search_enabled {
            search.unwrap_or("").trim()
        } else {
            ""
        };

        let compute = || {
            // a hidden node takes its whole subtree with it; the access
            // filter then keeps parents whose children survived
            let unhidden = tree::prune_tree(&named.canonical, &|n: &MenuNode| !n.hidden);
            let visible = tree::filter_tree(&unhidden, &|n: &MenuNode| {
                can_access(&n.access, identity)
            });
            let searched = tree::search_tree(&visible, term);
            Arc::new(tree::sort_tree(&searched, SortDirection::Asc))
        };

        match &self.views {
            Some(cache) => cache.get_with(view_key(named, identity, term), compute),
            None => compute(),
        }
    }

    /// Inserts a node into the named tree, at the root or under
    /// `parent_key`. An unknown tree or parent key is a warning and a no-op.
    pub fn add_node(&self, tree: &str, node: MenuNode, parent_key: Option<&str>) {
        let mut trees = self.write_trees();
        let Some(named) = trees.iter_mut().find(|t| t.name == tree) else {
            tracing::warn!(tree, "cannot add menu node to unknown tree");
            return;
        };

        match parent_key {
            None => {
                named.canonical.push(node);
            }
            Some(parent) => {
                if let Some(node) = insert_under(&mut named.canonical, parent, node, 0) {
                    tracing::warn!(tree, parent, key = %node.key, "parent key not found, ignoring added menu node");
                    return;
                }
            }
        }
        named.canonical = tree::sort_tree(&named.canonical, SortDirection::Asc);
        named.epoch += 1;
    }

    /// Removes the first node matching `key`, searching trees in their
    /// configured order. Returns whether anything was removed.
    pub fn remove_node(&self, key: &str) -> bool {
        let mut trees = self.write_trees();
        for named in trees.iter_mut() {
            if remove_in(&mut named.canonical, key, 0) {
                named.epoch += 1;
                return true;
            }
        }
        false
    }

    /// Patches the first node matching `key`, searching trees in their
    /// configured order. Returns whether a node was updated.
    pub fn update_node(&self, key: &str, patch: &MenuPatch) -> bool {
        let mut trees = self.write_trees();
        for named in trees.iter_mut() {
            if update_in(&mut named.canonical, key, patch, 0) {
                if patch.order.is_some() {
                    named.canonical = tree::sort_tree(&named.canonical, SortDirection::Asc);
                }
                named.epoch += 1;
                return true;
            }
        }
        false
    }

    /// Structural validation of the whole forest, including cross-tree key
    /// uniqueness.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let trees = self.read_trees();
        let forest: Vec<(&str, &[MenuNode])> = trees
            .iter()
            .map(|t| (t.name.as_str(), t.canonical.as_slice()))
            .collect();
        menu::validate_forest(&forest)
    }

    /// Drops every memoized view. Mutations already invalidate precisely;
    /// this is for hosts that swap ambient state the engine cannot see.
    pub fn clear_views(&self) {
        if let Some(cache) = &self.views {
            cache.invalidate_all();
        }
    }

    fn read_trees(&self) -> RwLockReadGuard<'_, Vec<NamedTree>> {
        self.trees.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_trees(&self) -> RwLockWriteGuard<'_, Vec<NamedTree>> {
        self.trees.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn view_key(named: &NamedTree, identity: Option<&UserIdentity>, term: &str) -> u64 {
    let mut hasher = Xxh3::new();
    named.name.hash(&mut hasher);
    named.epoch.hash(&mut hasher);
    named.canonical.hash(&mut hasher);
    identity
        .map(UserIdentity::fingerprint)
        .unwrap_or(0)
        .hash(&mut hasher);
    term.hash(&mut hasher);
    hasher.finish()
}

/// Attaches `node` under the first node matching `parent_key`. Returns the
/// node back when no parent was found.
fn insert_under(
    nodes: &mut [MenuNode],
    parent_key: &str,
    node: MenuNode,
    depth: usize,
) -> Option<MenuNode> {
    if depth >= MAX_DEPTH {
        return Some(node);
    }
    let mut node = node;
    for candidate in nodes.iter_mut() {
        if candidate.key == parent_key {
            let mut children = candidate.children.take().unwrap_or_default();
            children.push(node);
            candidate.children = Some(children);
            return None;
        }
        if let Some(children) = candidate.children.as_mut() {
            match insert_under(children, parent_key, node, depth + 1) {
                None => return None,
                Some(returned) => node = returned,
            }
        }
    }
    Some(node)
}

fn remove_in(nodes: &mut Vec<MenuNode>, key: &str, depth: usize) -> bool {
    if depth >= MAX_DEPTH {
        return false;
    }
    if let Some(pos) = nodes.iter().position(|n| n.key == key) {
        nodes.remove(pos);
        return true;
    }
    for node in nodes.iter_mut() {
        if let Some(children) = node.children.as_mut() {
            if remove_in(children, key, depth + 1) {
                return true;
            }
        }
    }
    false
}

fn update_in(nodes: &mut [MenuNode], key: &str, patch: &MenuPatch, depth: usize) -> bool {
    if depth >= MAX_DEPTH {
        return false;
    }
    for node in nodes.iter_mut() {
        if node.key == key {
            patch.apply(node);
            return true;
        }
        if let Some(children) = node.children.as_mut() {
            if update_in(children, key, patch, depth + 1) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests;
