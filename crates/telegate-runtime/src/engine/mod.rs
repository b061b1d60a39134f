//! Browser engine abstraction.
//!
//! The orchestrator only needs a handful of capabilities from the engine:
//! launch with arguments, default headers, init-script injection,
//! navigation, URL watching, script evaluation, and teardown. The traits
//! here capture that seam; [`chromium`] implements it over CDP.

pub mod chromium;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::pattern::UrlPattern;
use crate::Result;

/// Launch-time browser configuration.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Extra process arguments from configuration.
    pub args: Vec<String>,
    pub headless: bool,
}

/// A browser engine that can open sessions.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Launch a browser and open the session's page.
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn Tab>>;

    /// Number of sessions currently holding a live browser.
    fn live_sessions(&self) -> usize;
}

/// The single page driven through the login flow.
#[async_trait]
pub trait Tab: Send {
    /// Default headers sent with every request from this page.
    async fn set_default_headers(&self, headers: &HashMap<String, String>) -> Result<()>;

    /// Install a script that runs in every new document before page code.
    async fn add_init_script(&self, source: &str) -> Result<()>;

    async fn navigate(&self, url: &str) -> Result<()>;

    /// Resolve with the first URL matching `pattern`. Evaluated on every
    /// navigation event, not polled; the caller bounds the wait with a
    /// timeout.
    async fn wait_for_url(&mut self, pattern: &UrlPattern) -> Result<String>;

    /// Evaluate a script in page context and decode the result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    async fn current_url(&self) -> Result<String>;

    /// Tear the session down. Always releases the underlying browser.
    async fn close(self: Box<Self>) -> Result<()>;
}
