use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the canonical menu trees come from.
#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Only the static, compiled-in menu trees are used.
    StaticOnly,
    /// The static baseline is discarded and replaced by provider data on load.
    DynamicOnly,
    /// Provider data is merged (by node key) on top of the static baseline.
    #[default]
    Merged,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct MenuOptions {
    /// Where menu trees are sourced from on `load`.
    #[serde(default)]
    pub source: SourceMode,

    /// Caching of computed (filtered, searched, sorted) menu views.
    #[serde(default)]
    pub cache: ViewCacheConfig,

    /// Whether text search over menu views is enabled. When disabled, a
    /// search term passed to `view` is ignored.
    #[serde(default = "default_true")]
    pub search_enabled: bool,

    /// How many levels of the navigation tree start expanded.
    #[serde(default = "default_open_level")]
    pub default_open_level: u8,
}

impl Default for MenuOptions {
    fn default() -> Self {
        MenuOptions {
            source: SourceMode::default(),
            cache: ViewCacheConfig::default(),
            search_enabled: true,
            default_open_level: default_open_level(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct ViewCacheConfig {
    /// Set to `false` to recompute every view from scratch.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How long a computed view stays valid. Mutations and identity changes
    /// invalidate earlier, this is only the upper bound.
    #[serde(
        deserialize_with = "humantime_serde::deserialize",
        serialize_with = "humantime_serde::serialize",
        default = "default_view_ttl"
    )]
    #[schemars(with = "String")]
    pub ttl: Duration,

    /// Upper bound on the number of cached views.
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for ViewCacheConfig {
    fn default() -> Self {
        ViewCacheConfig {
            enabled: true,
            ttl: default_view_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_open_level() -> u8 {
    1
}

fn default_view_ttl() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_max_entries() -> u64 {
    64
}
