use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    /// Paths that bypass authorization entirely. An entry ending in `*`
    /// matches any path with that prefix, anything else must match exactly.
    #[serde(default = "default_allow_list")]
    pub allow_list: Vec<String>,

    /// Where unauthenticated users are sent. Also the page an authenticated
    /// user is bounced away from (to `home_path`).
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Landing page for authenticated users.
    #[serde(default = "default_home_path")]
    pub home_path: String,

    /// Page shown when access to a target is denied.
    #[serde(default = "default_forbidden_path")]
    pub forbidden_path: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            allow_list: default_allow_list(),
            login_path: default_login_path(),
            home_path: default_home_path(),
            forbidden_path: default_forbidden_path(),
        }
    }
}

fn default_allow_list() -> Vec<String> {
    ["/login", "/register", "/404", "/403", "/500"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_home_path() -> String {
    "/dashboard".to_string()
}

fn default_forbidden_path() -> String {
    "/403".to_string()
}
