//! Generic recursive operations over hierarchical node structures.
//!
//! Every operation produces a fresh tree and leaves its input untouched, so
//! cached views can never be mutated behind the engine's back. All recursion
//! is capped at [`MAX_DEPTH`]; past the cap an operation truncates instead of
//! looping or crashing.

/// Recursion cap for every tree walk. Realistic menu forests are a handful of
/// levels deep; anything past this is malformed caller input.
pub const MAX_DEPTH: usize = 64;

/// The node shape the tree operations work against.
pub trait TreeNode: Clone {
    /// Unique key of the node within its forest.
    fn key(&self) -> &str;

    /// `None` means the node never had a children field, `Some(&[])` means it
    /// had one that is (now) empty. The distinction matters for pruning.
    fn children(&self) -> Option<&[Self]>;

    fn set_children(&mut self, children: Option<Vec<Self>>);

    /// Sort weight. Missing values default to 0.
    fn order(&self) -> i64 {
        0
    }

    /// Navigable location of the node, when it has one.
    fn path(&self) -> Option<&str> {
        None
    }

    /// Whether the node participates in breadcrumbs. Traversal still passes
    /// through opted-out nodes to reach their descendants.
    fn in_breadcrumb(&self) -> bool {
        true
    }

    /// Whether any of the node's text fields match the (lowercased) term.
    fn matches_text(&self, _term: &str) -> bool {
        false
    }

    /// Copies every non-children field from `incoming` onto `self`. Children
    /// are merged separately, by key.
    fn absorb(&mut self, incoming: &Self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Recursively filters a tree, children before parents.
///
/// A parent survives when the predicate keeps it or at least one child
/// survived. A parent whose children field is present but empty after
/// filtering is dropped unless it is directly navigable (has a `path`);
/// surviving empty children collapse to `None`. Sibling order is preserved.
pub fn filter_tree<N, F>(nodes: &[N], keep: &F) -> Vec<N>
where
    N: TreeNode,
    F: Fn(&N) -> bool,
{
    filter_at(nodes, keep, 0)
}

fn filter_at<N, F>(nodes: &[N], keep: &F, depth: usize) -> Vec<N>
where
    N: TreeNode,
    F: Fn(&N) -> bool,
{
    if depth >= MAX_DEPTH {
        return Vec::new();
    }

    let mut out = Vec::new();
    for node in nodes {
        let surviving_children = node.children().map(|c| filter_at(c, keep, depth + 1));
        match surviving_children {
            Some(children) if !children.is_empty() => {
                let mut copy = node.clone();
                copy.set_children(Some(children));
                out.push(copy);
            }
            Some(_) => {
                // The subtree is gone; only directly navigable nodes stay.
                if keep(node) && node.path().is_some() {
                    let mut copy = node.clone();
                    copy.set_children(None);
                    out.push(copy);
                }
            }
            None => {
                if keep(node) {
                    out.push(node.clone());
                }
            }
        }
    }
    out
}

/// Drops every node failing `keep` together with its entire subtree. Unlike
/// [`filter_tree`] there is no rescue through surviving children: a rejected
/// parent takes its descendants with it.
pub fn prune_tree<N, F>(nodes: &[N], keep: &F) -> Vec<N>
where
    N: TreeNode,
    F: Fn(&N) -> bool,
{
    prune_at(nodes, keep, 0)
}

fn prune_at<N, F>(nodes: &[N], keep: &F, depth: usize) -> Vec<N>
where
    N: TreeNode,
    F: Fn(&N) -> bool,
{
    if depth >= MAX_DEPTH {
        return Vec::new();
    }

    let mut out = Vec::new();
    for node in nodes {
        if !keep(node) {
            continue;
        }
        let mut copy = node.clone();
        if let Some(children) = node.children() {
            copy.set_children(Some(prune_at(children, keep, depth + 1)));
        }
        out.push(copy);
    }
    out
}

/// Stable sort by `order()` at every level of the tree.
pub fn sort_tree<N: TreeNode>(nodes: &[N], direction: SortDirection) -> Vec<N> {
    sort_at(nodes, direction, 0)
}

fn sort_at<N: TreeNode>(nodes: &[N], direction: SortDirection, depth: usize) -> Vec<N> {
    let mut sorted: Vec<N> = nodes.to_vec();
    if depth >= MAX_DEPTH {
        return sorted;
    }

    match direction {
        SortDirection::Asc => sorted.sort_by_key(|n| n.order()),
        SortDirection::Desc => sorted.sort_by(|a, b| b.order().cmp(&a.order())),
    }

    for node in &mut sorted {
        if let Some(children) = node.children() {
            let sorted_children = sort_at(children, direction, depth + 1);
            node.set_children(Some(sorted_children));
        }
    }
    sorted
}

/// Depth-first pre-order traversal, parent before children, with the
/// children field stripped from every emitted copy.
pub fn flatten<N: TreeNode>(nodes: &[N]) -> Vec<N> {
    let mut out = Vec::new();
    flatten_into(nodes, &mut out, 0);
    out
}

fn flatten_into<N: TreeNode>(nodes: &[N], out: &mut Vec<N>, depth: usize) {
    if depth >= MAX_DEPTH {
        return;
    }
    for node in nodes {
        let mut copy = node.clone();
        copy.set_children(None);
        out.push(copy);
        if let Some(children) = node.children() {
            flatten_into(children, out, depth + 1);
        }
    }
}

/// First pre-order match for an arbitrary predicate.
pub fn find_by<'a, N, F>(nodes: &'a [N], pred: &F) -> Option<&'a N>
where
    N: TreeNode,
    F: Fn(&N) -> bool,
{
    find_at(nodes, pred, 0)
}

fn find_at<'a, N, F>(nodes: &'a [N], pred: &F, depth: usize) -> Option<&'a N>
where
    N: TreeNode,
    F: Fn(&N) -> bool,
{
    if depth >= MAX_DEPTH {
        return None;
    }
    for node in nodes {
        if pred(node) {
            return Some(node);
        }
        if let Some(children) = node.children() {
            if let Some(found) = find_at(children, pred, depth + 1) {
                return Some(found);
            }
        }
    }
    None
}

pub fn find_by_key<'a, N: TreeNode>(nodes: &'a [N], key: &str) -> Option<&'a N> {
    find_by(nodes, &|n: &N| n.key() == key)
}

pub fn find_by_path<'a, N: TreeNode>(nodes: &'a [N], path: &str) -> Option<&'a N> {
    find_by(nodes, &|n: &N| n.path() == Some(path))
}

/// Chain of ancestor keys for the node matching `target_key`, outermost
/// first, the target itself excluded. Empty when the key is absent.
pub fn ancestor_keys<N: TreeNode>(nodes: &[N], target_key: &str) -> Vec<String> {
    let mut chain = Vec::new();
    if ancestors_at(nodes, target_key, &mut chain, 0) {
        chain
    } else {
        Vec::new()
    }
}

fn ancestors_at<N: TreeNode>(
    nodes: &[N],
    target_key: &str,
    chain: &mut Vec<String>,
    depth: usize,
) -> bool {
    if depth >= MAX_DEPTH {
        return false;
    }
    for node in nodes {
        if node.key() == target_key {
            return true;
        }
        if let Some(children) = node.children() {
            chain.push(node.key().to_string());
            if ancestors_at(children, target_key, chain, depth + 1) {
                return true;
            }
            chain.pop();
        }
    }
    false
}

/// Root-to-leaf chain (ancestors plus the matched node) for the node whose
/// `path` equals `target_path`. Nodes that opted out of breadcrumbs are
/// filtered from the result, but the walk still passes through them.
/// Children are stripped from every emitted copy.
pub fn breadcrumb_for<N: TreeNode>(nodes: &[N], target_path: &str) -> Vec<N> {
    let mut trail: Vec<N> = Vec::new();
    if !breadcrumb_at(nodes, target_path, &mut trail, 0) {
        return Vec::new();
    }
    trail
        .into_iter()
        .filter(|n| n.in_breadcrumb())
        .map(|mut n| {
            n.set_children(None);
            n
        })
        .collect()
}

fn breadcrumb_at<N: TreeNode>(
    nodes: &[N],
    target_path: &str,
    trail: &mut Vec<N>,
    depth: usize,
) -> bool {
    if depth >= MAX_DEPTH {
        return false;
    }
    for node in nodes {
        trail.push(node.clone());
        if node.path() == Some(target_path) {
            return true;
        }
        if let Some(children) = node.children() {
            if breadcrumb_at(children, target_path, trail, depth + 1) {
                return true;
            }
        }
        trail.pop();
    }
    false
}

/// Merges `incoming` on top of `base`. Key-matched nodes deep-merge
/// (incoming wins on field conflicts, children recurse by key); unmatched
/// incoming nodes are appended. The result is re-sorted ascending by order
/// at every level.
pub fn merge_trees<N: TreeNode>(base: &[N], incoming: &[N]) -> Vec<N> {
    let merged = merge_at(base, incoming, 0);
    sort_tree(&merged, SortDirection::Asc)
}

fn merge_at<N: TreeNode>(base: &[N], incoming: &[N], depth: usize) -> Vec<N> {
    if depth >= MAX_DEPTH {
        return base.to_vec();
    }

    let mut merged: Vec<N> = base.to_vec();
    for inc in incoming {
        if let Some(existing) = merged.iter_mut().find(|b| b.key() == inc.key()) {
            let base_children: Option<Vec<N>> = existing.children().map(|c| c.to_vec());
            existing.absorb(inc);
            let children = match (base_children, inc.children()) {
                (Some(b), Some(i)) => Some(merge_at(&b, i, depth + 1)),
                (None, Some(i)) => Some(i.to_vec()),
                (Some(b), None) => Some(b),
                (None, None) => None,
            };
            existing.set_children(children);
        } else {
            merged.push(inc.clone());
        }
    }
    merged
}

/// Keeps a node when its own text fields match the term or any descendant
/// matches; pruning semantics identical to [`filter_tree`]. A blank term
/// returns the input unchanged.
pub fn search_tree<N: TreeNode>(nodes: &[N], term: &str) -> Vec<N> {
    let term = term.trim();
    if term.is_empty() {
        return nodes.to_vec();
    }
    let needle = term.to_lowercase();
    filter_tree(nodes, &|n: &N| n.matches_text(&needle))
}
