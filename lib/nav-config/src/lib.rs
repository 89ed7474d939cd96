pub mod gate;
pub mod log;
pub mod menu;

use config::{Config, Environment, File, FileFormat};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{gate::GateConfig, log::LoggingConfig, menu::MenuOptions};

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct PortalNavConfig {
    /// Logger configuration. The engine is mostly silent at `info` level and
    /// only reports degraded loads, invalid stored data, and denials.
    #[serde(default)]
    pub log: LoggingConfig,

    /// Menu sourcing, view caching, and search behavior.
    #[serde(default)]
    pub menu: MenuOptions,

    /// Access-gate behavior: allow list and redirect targets.
    #[serde(default)]
    pub gate: GateConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum NavConfigError {
    #[error("Failed to load configuration: {0}")]
    ConfigLoadError(#[from] config::ConfigError),
}

static DEFAULT_FILE_NAMES: &[&str] = &["portal-nav.config.yaml", "portal-nav.config.yml"];

/// Loads the configuration from an explicit path, or from the default file
/// names in the current directory. Values can be overridden via
/// `PORTAL_NAV_*` environment variables (e.g. `PORTAL_NAV_LOG__LEVEL=warn`).
pub fn load_config(override_config_path: Option<&str>) -> Result<PortalNavConfig, NavConfigError> {
    let mut config = Config::builder();

    if let Some(path) = override_config_path {
        config = config.add_source(File::with_name(path).required(true));
    } else {
        for name in DEFAULT_FILE_NAMES {
            config = config.add_source(File::with_name(name).required(false));
        }
    }

    config = config.add_source(Environment::with_prefix("PORTAL_NAV").separator("__"));

    Ok(config.build()?.try_deserialize::<PortalNavConfig>()?)
}

/// Parses a configuration from a raw YAML string. Used by hosts that manage
/// their own configuration storage.
pub fn parse_yaml_config(config_raw: &str) -> Result<PortalNavConfig, NavConfigError> {
    Ok(Config::builder()
        .add_source(File::from_str(config_raw, FileFormat::Yaml))
        .build()?
        .try_deserialize::<PortalNavConfig>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::SourceMode;

    #[test]
    fn defaults_when_empty() {
        let cfg = parse_yaml_config("{}").unwrap();
        assert_eq!(cfg.menu.source, SourceMode::Merged);
        assert!(cfg.menu.cache.enabled);
        assert_eq!(cfg.menu.cache.ttl.as_secs(), 30 * 60);
        assert_eq!(cfg.gate.login_path, "/login");
        assert!(cfg.gate.allow_list.contains(&"/403".to_string()));
    }

    #[test]
    fn parses_overrides() {
        let cfg = parse_yaml_config(
            r#"
            menu:
              source: static_only
              cache:
                enabled: false
                ttl: 5m
            gate:
              allow_list: ["/docs*"]
              home_path: "/home"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.menu.source, SourceMode::StaticOnly);
        assert!(!cfg.menu.cache.enabled);
        assert_eq!(cfg.menu.cache.ttl.as_secs(), 300);
        assert_eq!(cfg.gate.allow_list, vec!["/docs*".to_string()]);
        assert_eq!(cfg.gate.home_path, "/home");
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(parse_yaml_config("menu:\n  no_such_field: 1\n").is_err());
    }
}
