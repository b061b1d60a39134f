//! Chromium engine over CDP via chromiumoxide.

use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, EventFrameNavigated,
};
use chromiumoxide::page::Page;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{Engine, LaunchOptions, Tab};
use crate::pattern::UrlPattern;
use crate::{Error, Result};

/// Environment override for the browser binary.
const BROWSER_ENV: &str = "TELEGATE_BROWSER";

/// Find a Chromium/Chrome binary.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(BROWSER_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for candidate in ["google-chrome", "chromium", "chromium-browser", "chrome"] {
        if let Ok(path) = which::which(candidate) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based engine. One launched browser per session.
pub struct ChromiumEngine {
    executable: PathBuf,
    live: Arc<AtomicUsize>,
}

impl ChromiumEngine {
    /// Discover the browser binary or fail with a configuration hint.
    pub fn new() -> Result<Self> {
        let executable = find_chromium().ok_or_else(|| {
            Error::Browser(format!(
                "Chromium not found; install it or set {BROWSER_ENV}"
            ))
        })?;
        Ok(Self::with_executable(executable))
    }

    pub fn with_executable(executable: PathBuf) -> Self {
        Self {
            executable,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn executable(&self) -> &PathBuf {
        &self.executable
    }
}

#[async_trait]
impl Engine for ChromiumEngine {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn Tab>> {
        let mut builder = BrowserConfig::builder().chrome_executable(&self.executable);
        if options.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        for arg in &options.args {
            builder = builder.arg(arg.as_str());
        }
        let config = builder.build().map_err(Error::Browser)?;

        info!(executable = %self.executable.display(), "launching browser");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::Browser(format!("failed to launch browser: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::Browser(format!("failed to open page: {e}")))?;

        // Subscribe before any navigation so fast transitions are not lost.
        let nav_events = page
            .event_listener::<EventFrameNavigated>()
            .await
            .map_err(|e| Error::Browser(format!("failed to listen for navigation: {e}")))?;

        self.live.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumTab {
            browser,
            page,
            handler_task,
            nav_events: Box::pin(nav_events),
            live: Arc::clone(&self.live),
        }))
    }

    fn live_sessions(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }
}

/// One launched browser with its single driven page.
pub struct ChromiumTab {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    nav_events: Pin<Box<dyn Stream<Item = Arc<EventFrameNavigated>> + Send + Sync>>,
    live: Arc<AtomicUsize>,
}

#[async_trait]
impl Tab for ChromiumTab {
    async fn set_default_headers(&self, headers: &HashMap<String, String>) -> Result<()> {
        let map: serde_json::Map<String, Value> = headers
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let params = SetExtraHttpHeadersParams::new(Headers::new(Value::Object(map)));
        self.page
            .execute(params)
            .await
            .map_err(|e| Error::Browser(format!("failed to set headers: {e}")))?;
        Ok(())
    }

    async fn add_init_script(&self, source: &str) -> Result<()> {
        let params = AddScriptToEvaluateOnNewDocumentParams::new(source.to_string());
        self.page
            .execute(params)
            .await
            .map_err(|e| Error::Browser(format!("failed to install init script: {e}")))?;
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| Error::Browser(format!("navigation failed: {e}")))?;
        Ok(())
    }

    async fn wait_for_url(&mut self, pattern: &UrlPattern) -> Result<String> {
        // The current URL may already match after a fast redirect chain.
        let current = self.current_url().await?;
        if pattern.matches(&current) {
            return Ok(current);
        }

        // URLs are not logged here: the start URL carries the auth token.
        while let Some(event) = self.nav_events.next().await {
            let url = &event.frame.url;
            debug!("navigation event observed");
            if pattern.matches(url) {
                return Ok(url.clone());
            }
        }
        Err(Error::Browser(
            "navigation event stream ended before the completion URL was seen".into(),
        ))
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| Error::Browser(format!("evaluation failed: {e}")))?;
        result
            .into_value()
            .map_err(|e| Error::Browser(format!("failed to decode evaluation result: {e}")))
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| Error::Browser(format!("failed to read URL: {e}")))?
            .unwrap_or_default();
        Ok(url)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let _ = self.page.close().await;
        let mut browser = self.browser;
        let close_result = browser.close().await;
        let _ = browser.wait().await;
        self.handler_task.abort();
        self.live.fetch_sub(1, Ordering::Relaxed);
        close_result
            .map(|_| ())
            .map_err(|e| Error::Browser(format!("failed to close browser: {e}")))
    }
}
