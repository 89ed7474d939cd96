//! UI-facing navigation state: the active entry, which submenus are open,
//! the breadcrumb trail, and sidebar collapse.

use ahash::HashSet;

use portal_nav_config::menu::MenuOptions;

use crate::menu::MenuNode;
use crate::tree::{self, TreeNode};

#[derive(Debug, Default)]
pub struct NavigationState {
    active_key: Option<String>,
    open_keys: HashSet<String>,
    breadcrumb: Vec<MenuNode>,
    collapsed: bool,
}

impl NavigationState {
    pub fn new() -> Self {
        NavigationState::default()
    }

    /// State with the first `default_open_level` levels of `nodes` already
    /// expanded, per the configured options.
    pub fn from_options(options: &MenuOptions, nodes: &[MenuNode]) -> Self {
        let mut state = NavigationState::default();
        state.expand_to_level(nodes, options.default_open_level);
        state
    }

    /// Activates the entry whose path matches, searching the given trees in
    /// order. Opens the entry's ancestor chain (additively, already-open
    /// submenus stay open) and rebuilds the breadcrumb. When no tree contains
    /// the path the previous state is kept and `false` is returned.
    pub fn activate(&mut self, trees: &[&[MenuNode]], path: &str) -> bool {
        for nodes in trees {
            let Some(node) = tree::find_by_path(nodes, path) else {
                continue;
            };
            self.active_key = Some(node.key.clone());
            if !self.collapsed {
                for key in tree::ancestor_keys(nodes, &node.key) {
                    self.open_keys.insert(key);
                }
            }
            self.breadcrumb = tree::breadcrumb_for(nodes, path);
            return true;
        }
        false
    }

    pub fn active_key(&self) -> Option<&str> {
        self.active_key.as_deref()
    }

    pub fn is_open(&self, key: &str) -> bool {
        self.open_keys.contains(key)
    }

    /// Currently open submenu keys, sorted for stable iteration.
    pub fn open_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.open_keys.iter().cloned().collect();
        keys.sort_unstable();
        keys
    }

    pub fn toggle_open(&mut self, key: &str) {
        if !self.open_keys.remove(key) {
            self.open_keys.insert(key.to_string());
        }
    }

    pub fn set_open_keys<I, K>(&mut self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.open_keys = keys.into_iter().map(Into::into).collect();
    }

    /// Opens every node that has children in the first `level` levels of the
    /// tree. Level 0 opens nothing.
    pub fn expand_to_level(&mut self, nodes: &[MenuNode], level: u8) {
        fn walk(nodes: &[MenuNode], remaining: u8, open: &mut HashSet<String>) {
            if remaining == 0 {
                return;
            }
            for node in nodes {
                if let Some(children) = node.children() {
                    open.insert(node.key.clone());
                    walk(children, remaining - 1, open);
                }
            }
        }
        walk(nodes, level, &mut self.open_keys);
    }

    pub fn breadcrumb(&self) -> &[MenuNode] {
        &self.breadcrumb
    }

    pub fn collapsed(&self) -> bool {
        self.collapsed
    }

    /// Collapsing the sidebar closes every submenu; they are reopened by the
    /// next `activate` once expanded again.
    pub fn set_collapsed(&mut self, collapsed: bool) {
        self.collapsed = collapsed;
        if collapsed {
            self.open_keys.clear();
        }
    }

    pub fn toggle_collapsed(&mut self) {
        let collapsed = !self.collapsed;
        self.set_collapsed(collapsed);
    }

    /// Back to the pristine state. Used on logout.
    pub fn reset(&mut self) {
        *self = NavigationState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side() -> Vec<MenuNode> {
        vec![
            MenuNode::item("dashboard", "Dashboard", "/dashboard", 1),
            MenuNode::group(
                "reports",
                "Reports",
                2,
                vec![
                    MenuNode::item("sales", "Sales", "/reports/sales", 1),
                    MenuNode::group(
                        "finance",
                        "Finance",
                        2,
                        vec![MenuNode::item("ledger", "Ledger", "/reports/ledger", 1)],
                    ),
                ],
            ),
        ]
    }

    fn head() -> Vec<MenuNode> {
        vec![MenuNode::item("help", "Help", "/help", 1)]
    }

    #[test]
    fn activate_sets_key_open_chain_and_breadcrumb() {
        let side = side();
        let mut nav = NavigationState::new();

        assert!(nav.activate(&[&side], "/reports/ledger"));
        assert_eq!(nav.active_key(), Some("ledger"));
        assert_eq!(nav.open_keys(), vec!["finance", "reports"]);
        let crumb: Vec<&str> = nav.breadcrumb().iter().map(|n| n.title.as_str()).collect();
        assert_eq!(crumb, vec!["Reports", "Finance", "Ledger"]);
    }

    #[test]
    fn open_keys_accumulate_across_navigations() {
        let side = side();
        let mut nav = NavigationState::new();

        nav.activate(&[&side], "/reports/ledger");
        nav.activate(&[&side], "/dashboard");

        assert_eq!(nav.active_key(), Some("dashboard"));
        // earlier chain stays open
        assert_eq!(nav.open_keys(), vec!["finance", "reports"]);
    }

    #[test]
    fn trees_are_searched_in_order() {
        let side = side();
        let head = head();
        let mut nav = NavigationState::new();

        assert!(nav.activate(&[&side, &head], "/help"));
        assert_eq!(nav.active_key(), Some("help"));
    }

    #[test]
    fn unknown_path_keeps_previous_state() {
        let side = side();
        let mut nav = NavigationState::new();
        nav.activate(&[&side], "/reports/sales");

        assert!(!nav.activate(&[&side], "/nowhere"));
        assert_eq!(nav.active_key(), Some("sales"));
        assert_eq!(nav.open_keys(), vec!["reports"]);
    }

    #[test]
    fn collapsing_clears_open_keys() {
        let side = side();
        let mut nav = NavigationState::new();
        nav.activate(&[&side], "/reports/ledger");

        nav.set_collapsed(true);
        assert!(nav.collapsed());
        assert!(nav.open_keys().is_empty());

        // activation while collapsed tracks the key but opens nothing
        nav.activate(&[&side], "/reports/sales");
        assert_eq!(nav.active_key(), Some("sales"));
        assert!(nav.open_keys().is_empty());
    }

    #[test]
    fn expand_to_level_opens_top_groups_only() {
        let side = side();
        let mut nav = NavigationState::new();

        nav.expand_to_level(&side, 1);
        assert_eq!(nav.open_keys(), vec!["reports"]);

        nav.expand_to_level(&side, 2);
        assert_eq!(nav.open_keys(), vec!["finance", "reports"]);
    }

    #[test]
    fn options_default_open_level_preexpands_the_tree() {
        let side = side();
        // default_open_level defaults to 1: top-level groups only
        let nav = NavigationState::from_options(&MenuOptions::default(), &side);
        assert_eq!(nav.open_keys(), vec!["reports"]);

        let deep = MenuOptions {
            default_open_level: 2,
            ..Default::default()
        };
        let nav = NavigationState::from_options(&deep, &side);
        assert_eq!(nav.open_keys(), vec!["finance", "reports"]);
    }

    #[test]
    fn toggle_and_reset() {
        let mut nav = NavigationState::new();
        nav.toggle_open("reports");
        assert!(nav.is_open("reports"));
        nav.toggle_open("reports");
        assert!(!nav.is_open("reports"));

        nav.set_open_keys(["a", "b"]);
        nav.toggle_collapsed();
        assert!(nav.collapsed());

        nav.reset();
        assert!(!nav.collapsed());
        assert!(nav.active_key().is_none());
        assert!(nav.open_keys().is_empty());
    }
}
