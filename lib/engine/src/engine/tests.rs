use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;

use portal_nav_config::menu::{MenuOptions, SourceMode, ViewCacheConfig};

use super::*;
use crate::access::{AccessRequirement, Role, UserIdentity};
use crate::menu::RawMenuNode;
use crate::provider::ProviderError;

fn report_access() -> AccessRequirement {
    AccessRequirement::role_based(&[Role::Admin, Role::Manager], &["report:read"])
}

fn static_side() -> Vec<MenuNode> {
    vec![
        MenuNode::item("dashboard", "Dashboard", "/dashboard", 1),
        MenuNode::group(
            "components",
            "Components",
            2,
            vec![
                MenuNode::item("table", "Table", "/components/table", 1)
                    .with_access(AccessRequirement::authenticated()),
                MenuNode::item("form", "Form", "/components/form", 2)
                    .with_access(AccessRequirement::authenticated()),
            ],
        )
        .with_access(AccessRequirement::authenticated()),
        // declared out of order on purpose, views must sort
        MenuNode::group(
            "system",
            "System",
            4,
            vec![
                MenuNode::item("users", "Users", "/system/users", 1)
                    .with_access(AccessRequirement::role_based(&[Role::Admin], &["user:read"])),
                MenuNode::item("roles", "Roles", "/system/roles", 2)
                    .with_access(AccessRequirement::role_based(&[Role::Admin], &["role:read"])),
            ],
        )
        .with_access(AccessRequirement::role_based(&[Role::SuperAdmin, Role::Admin], &[])),
        MenuNode::group(
            "reports",
            "Reports",
            3,
            vec![
                MenuNode::item("sales", "Sales Report", "/reports/sales", 1)
                    .with_access(report_access()),
                MenuNode::item("financial", "Financial Report", "/reports/financial", 2)
                    .with_access(report_access()),
            ],
        )
        .with_access(report_access()),
    ]
}

fn options(source: SourceMode) -> MenuOptions {
    MenuOptions {
        source,
        ..Default::default()
    }
}

fn uncached(source: SourceMode) -> MenuOptions {
    MenuOptions {
        source,
        cache: ViewCacheConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn static_engine() -> MenuEngine {
    MenuEngine::with_baselines(
        options(SourceMode::StaticOnly),
        None,
        vec![(SIDE_TREE.to_string(), static_side())],
    )
}

fn manager() -> UserIdentity {
    UserIdentity::new("m-1", &[Role::Manager], &["report:read"])
}

fn admin() -> UserIdentity {
    UserIdentity::new("a-1", &[Role::Admin], &["user:read", "role:read", "report:read"])
}

fn employee() -> UserIdentity {
    UserIdentity::new("e-1", &[Role::Employee], &["dashboard:read"])
}

fn raw(key: &str, title: &str, path: &str, order: i64) -> RawMenuNode {
    RawMenuNode {
        key: Some(key.to_string()),
        title: Some(title.to_string()),
        path: Some(path.to_string()),
        order: Some(order),
        ..Default::default()
    }
}

fn render(nodes: &[MenuNode]) -> String {
    fn walk(nodes: &[MenuNode], depth: usize, out: &mut String) {
        for node in nodes {
            out.push_str(&"  ".repeat(depth));
            out.push_str(&node.key);
            out.push('\n');
            if let Some(children) = &node.children {
                walk(children, depth + 1, out);
            }
        }
    }
    let mut out = String::new();
    walk(nodes, 0, &mut out);
    out.trim_end().to_string()
}

mod views {
    use super::*;

    #[test]
    fn guest_sees_public_entries_only() {
        let engine = static_engine();
        let view = engine.view(SIDE_TREE, None, None);
        insta::assert_snapshot!(render(&view), @"dashboard");
    }

    #[test]
    fn manager_with_report_read_sees_reports() {
        let engine = static_engine();
        let view = engine.view(SIDE_TREE, Some(&manager()), None);
        insta::assert_snapshot!(render(&view), @r"
        dashboard
        components
          table
          form
        reports
          sales
          financial
        ");
    }

    #[test]
    fn admin_sees_everything_sorted_by_order() {
        let engine = static_engine();
        let view = engine.view(SIDE_TREE, Some(&admin()), None);
        insta::assert_snapshot!(render(&view), @r"
        dashboard
        components
          table
          form
        reports
          sales
          financial
        system
          users
          roles
        ");
    }

    #[test]
    fn employee_without_report_permission_loses_reports() {
        let engine = static_engine();
        let view = engine.view(SIDE_TREE, Some(&employee()), None);
        insta::assert_snapshot!(render(&view), @r"
        dashboard
        components
          table
          form
        ");
    }

    #[test]
    fn hidden_nodes_never_render() {
        let mut side = static_side();
        side.push(MenuNode::item("beta", "Beta", "/beta", 9).hidden());
        let engine = MenuEngine::with_baselines(
            options(SourceMode::StaticOnly),
            None,
            vec![(SIDE_TREE.to_string(), side)],
        );
        let view = engine.view(SIDE_TREE, Some(&admin()), None);
        assert!(!view.iter().any(|n| n.key == "beta"));
    }

    #[test]
    fn hidden_group_hides_its_visible_children() {
        let mut side = static_side();
        side.push(
            MenuNode::group(
                "labs",
                "Labs",
                9,
                vec![MenuNode::item("flags", "Feature Flags", "/labs/flags", 1)],
            )
            .hidden(),
        );
        let engine = MenuEngine::with_baselines(
            options(SourceMode::StaticOnly),
            None,
            vec![(SIDE_TREE.to_string(), side)],
        );
        // the visible child must not rescue its hidden parent
        let view = engine.view(SIDE_TREE, Some(&admin()), None);
        assert!(!view.iter().any(|n| n.key == "labs"));
        assert!(!render(&view).contains("flags"));
    }

    #[test]
    fn search_narrows_the_view() {
        let engine = static_engine();
        let view = engine.view(SIDE_TREE, Some(&manager()), Some("financial"));
        insta::assert_snapshot!(render(&view), @r"
        reports
          financial
        ");
    }

    #[test]
    fn search_is_ignored_when_disabled() {
        let opts = MenuOptions {
            search_enabled: false,
            ..options(SourceMode::StaticOnly)
        };
        let engine = MenuEngine::with_baselines(
            opts,
            None,
            vec![(SIDE_TREE.to_string(), static_side())],
        );
        let full = engine.view(SIDE_TREE, Some(&manager()), None);
        let searched = engine.view(SIDE_TREE, Some(&manager()), Some("financial"));
        assert_eq!(*full, *searched);
    }

    #[test]
    fn unknown_tree_yields_empty_view() {
        let engine = static_engine();
        let view = engine.view("footer", Some(&admin()), None);
        assert!(view.is_empty());
    }
}

mod caching {
    use super::*;

    #[test]
    fn repeated_views_share_the_cached_result() {
        let engine = static_engine();
        let identity = manager();
        let first = engine.view(SIDE_TREE, Some(&identity), None);
        let second = engine.view(SIDE_TREE, Some(&identity), None);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn views_are_keyed_per_identity() {
        let engine = static_engine();
        let manager_view = engine.view(SIDE_TREE, Some(&manager()), None);
        let employee_view = engine.view(SIDE_TREE, Some(&employee()), None);
        assert!(!Arc::ptr_eq(&manager_view, &employee_view));
        assert_ne!(*manager_view, *employee_view);
    }

    #[test]
    fn update_node_invalidates_cached_views() {
        let engine = static_engine();
        let identity = manager();
        let before = engine.view(SIDE_TREE, Some(&identity), None);

        let patch = MenuPatch {
            title: Some("Control Panel".to_string()),
            ..Default::default()
        };
        assert!(engine.update_node("dashboard", &patch));
        assert!(!engine.update_node("no-such-key", &patch));

        let after = engine.view(SIDE_TREE, Some(&identity), None);
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after[0].title, "Control Panel");
    }

    #[test]
    fn remove_node_takes_first_match_and_invalidates() {
        let engine = static_engine();
        let identity = manager();

        assert!(engine.remove_node("financial"));
        assert!(!engine.remove_node("financial"));

        let view = engine.view(SIDE_TREE, Some(&identity), None);
        assert!(!view.iter().any(|n| {
            n.children
                .as_ref()
                .is_some_and(|c| c.iter().any(|n| n.key == "financial"))
        }));
    }

    #[test]
    fn added_nodes_land_sorted() {
        let engine = static_engine();
        engine.add_node(
            SIDE_TREE,
            MenuNode::item("inventory", "Inventory Report", "/reports/inventory", 0)
                .with_access(report_access()),
            Some("reports"),
        );
        let view = engine.view(SIDE_TREE, Some(&manager()), None);
        let reports = view.iter().find(|n| n.key == "reports").unwrap();
        let keys: Vec<&str> = reports
            .children
            .as_ref()
            .unwrap()
            .iter()
            .map(|n| n.key.as_str())
            .collect();
        assert_eq!(keys, vec!["inventory", "sales", "financial"]);
    }

    #[test]
    fn add_under_unknown_parent_is_a_noop() {
        let engine = static_engine();
        let before = engine.canonical(SIDE_TREE).unwrap();
        engine.add_node(
            SIDE_TREE,
            MenuNode::item("orphan", "Orphan", "/orphan", 1),
            Some("no-such-parent"),
        );
        assert_eq!(engine.canonical(SIDE_TREE).unwrap(), before);
    }

    #[test]
    fn disabled_cache_still_computes_correct_views() {
        let engine = MenuEngine::with_baselines(
            uncached(SourceMode::StaticOnly),
            None,
            vec![(SIDE_TREE.to_string(), static_side())],
        );
        let first = engine.view(SIDE_TREE, Some(&manager()), None);
        let second = engine.view(SIDE_TREE, Some(&manager()), None);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
    }

    #[test]
    fn cross_tree_duplicate_keys_fail_validation() {
        let engine = MenuEngine::with_baselines(
            options(SourceMode::StaticOnly),
            None,
            vec![
                (SIDE_TREE.to_string(), static_side()),
                (
                    HEAD_TREE.to_string(),
                    vec![MenuNode::item("dashboard", "Dashboard", "/dashboard", 1)],
                ),
            ],
        );
        assert!(engine.validate().is_err());
    }
}

mod loading {
    use super::*;

    struct PayloadProvider {
        side: Vec<RawMenuNode>,
        head: Vec<RawMenuNode>,
    }

    #[async_trait]
    impl MenuProvider for PayloadProvider {
        async fn fetch_menus(
            &self,
            _user_id: &str,
            tree: &str,
        ) -> Result<Vec<RawMenuNode>, ProviderError> {
            match tree {
                SIDE_TREE => Ok(self.side.clone()),
                HEAD_TREE => Ok(self.head.clone()),
                other => Err(ProviderError::Unavailable(format!("no tree '{other}'"))),
            }
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl MenuProvider for FailingProvider {
        async fn fetch_menus(
            &self,
            _user_id: &str,
            _tree: &str,
        ) -> Result<Vec<RawMenuNode>, ProviderError> {
            Err(ProviderError::Unavailable("menu service is down".to_string()))
        }
    }

    /// First call parks on `release` (signalling `started`), later calls
    /// return immediately. Lets a test interleave two loads.
    struct GatedProvider {
        started: Mutex<Option<oneshot::Sender<()>>>,
        release: Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl MenuProvider for GatedProvider {
        async fn fetch_menus(
            &self,
            _user_id: &str,
            _tree: &str,
        ) -> Result<Vec<RawMenuNode>, ProviderError> {
            let release = self.release.lock().unwrap().take();
            if let Some(release) = release {
                if let Some(started) = self.started.lock().unwrap().take() {
                    let _ = started.send(());
                }
                let _ = release.await;
                Ok(vec![raw("from-slow", "Slow", "/slow", 1)])
            } else {
                Ok(vec![raw("from-fast", "Fast", "/fast", 1)])
            }
        }
    }

    fn engine_with(
        source: SourceMode,
        provider: Arc<dyn MenuProvider>,
        baselines: Vec<(String, Vec<MenuNode>)>,
    ) -> MenuEngine {
        MenuEngine::with_baselines(options(source), Some(provider), baselines)
    }

    #[tokio::test]
    async fn merged_load_overlays_the_provider_payload() {
        let provider = Arc::new(PayloadProvider {
            side: vec![
                raw("dashboard", "Home", "/home", 9),
                raw("custom", "Custom Report", "/reports/custom", 5),
            ],
            head: Vec::new(),
        });
        let engine = engine_with(
            SourceMode::Merged,
            provider,
            vec![
                (SIDE_TREE.to_string(), static_side()),
                (HEAD_TREE.to_string(), Vec::new()),
            ],
        );
        let identity = admin();
        engine.load(Some(&identity)).await;

        let view = engine.view(SIDE_TREE, Some(&identity), None);
        insta::assert_snapshot!(render(&view), @r"
        components
          table
          form
        reports
          sales
          financial
        system
          users
          roles
        custom
        dashboard
        ");
        let dashboard = view.iter().find(|n| n.key == "dashboard").unwrap();
        assert_eq!(dashboard.title, "Home");
        assert_eq!(dashboard.path.as_deref(), Some("/home"));
    }

    #[tokio::test]
    async fn dynamic_only_replaces_the_baseline() {
        let provider = Arc::new(PayloadProvider {
            side: vec![raw("remote", "Remote", "/remote", 1)],
            head: Vec::new(),
        });
        let engine = engine_with(
            SourceMode::DynamicOnly,
            provider,
            vec![(SIDE_TREE.to_string(), static_side())],
        );
        let identity = admin();
        engine.load(Some(&identity)).await;

        let view = engine.view(SIDE_TREE, Some(&identity), None);
        insta::assert_snapshot!(render(&view), @"remote");
    }

    #[tokio::test]
    async fn static_only_never_calls_the_provider() {
        let engine = engine_with(
            SourceMode::StaticOnly,
            Arc::new(FailingProvider),
            vec![(SIDE_TREE.to_string(), static_side())],
        );
        let identity = manager();
        engine.load(Some(&identity)).await;

        let view = engine.view(SIDE_TREE, Some(&identity), None);
        assert_eq!(view.len(), 3);
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_static_trees() {
        let engine = engine_with(
            SourceMode::Merged,
            Arc::new(FailingProvider),
            vec![(SIDE_TREE.to_string(), static_side())],
        );
        let identity = manager();
        engine.load(Some(&identity)).await;

        let view = engine.view(SIDE_TREE, Some(&identity), None);
        insta::assert_snapshot!(render(&view), @r"
        dashboard
        components
          table
          form
        reports
          sales
          financial
        ");
    }

    #[tokio::test]
    async fn anonymous_reload_resets_to_the_baseline() {
        let provider = Arc::new(PayloadProvider {
            side: vec![raw("custom", "Custom", "/custom", 5)],
            head: Vec::new(),
        });
        let engine = engine_with(
            SourceMode::Merged,
            provider,
            vec![(SIDE_TREE.to_string(), static_side())],
        );
        let identity = admin();
        engine.load(Some(&identity)).await;
        assert!(engine.canonical(SIDE_TREE).unwrap().iter().any(|n| n.key == "custom"));

        engine.load(None).await;
        assert!(!engine.canonical(SIDE_TREE).unwrap().iter().any(|n| n.key == "custom"));
    }

    #[tokio::test]
    async fn stale_load_never_overwrites_a_newer_one() {
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        let provider = Arc::new(GatedProvider {
            started: Mutex::new(Some(started_tx)),
            release: Mutex::new(Some(release_rx)),
        });
        let engine = Arc::new(engine_with(
            SourceMode::DynamicOnly,
            provider,
            vec![(SIDE_TREE.to_string(), Vec::new())],
        ));
        let first = tokio::spawn({
            let engine = engine.clone();
            async move { engine.load(Some(&manager())).await }
        });
        started_rx.await.unwrap();

        // a different user logs in while the first load is still parked
        let identity = admin();
        engine.load(Some(&identity)).await;

        release_tx.send(()).unwrap();
        first.await.unwrap();

        let view = engine.view(SIDE_TREE, Some(&identity), None);
        insta::assert_snapshot!(render(&view), @"from-fast");
    }
}
