//! The boundary to remote menu sources.

use async_trait::async_trait;

use crate::menu::RawMenuNode;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("menu source unavailable: {0}")]
    Unavailable(String),
    #[error("malformed menu payload: {0}")]
    Malformed(String),
}

/// Fetches the menu payload for one named tree of one user. Failures are
/// reported, not retried; the engine degrades to its static trees.
#[async_trait]
pub trait MenuProvider: Send + Sync {
    async fn fetch_menus(&self, user_id: &str, tree: &str) -> Result<Vec<RawMenuNode>, ProviderError>;
}
