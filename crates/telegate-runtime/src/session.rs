//! Navigation orchestrator: sequences bridge, browser, and extraction.
//!
//! One orchestrator drives at most one browser session through
//! `Idle → Launching → AwaitingLogin → Authenticated → Extracting → Done`,
//! with `Failed` terminal on any error. Configuration problems surface
//! before a browser exists; once resources are held, every exit path
//! releases the browser and the bridge listener before the error
//! propagates. A failed session is reported to the caller, which may
//! start a fresh orchestrator — there is no automatic retry.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use telegate_auth::compute_token;
use tracing::{debug, info, warn};

use crate::bridge::{BridgeServer, CallableRegistry};
use crate::callables::{self, SessionContext};
use crate::config::Config;
use crate::engine::{Engine, LaunchOptions, Tab};
use crate::inject;
use crate::pattern::UrlPattern;
use crate::{Error, Result};

/// Session life-cycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Launching,
    AwaitingLogin,
    Authenticated,
    Extracting,
    Done,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Launching => "launching",
            Self::AwaitingLogin => "awaiting-login",
            Self::Authenticated => "authenticated",
            Self::Extracting => "extracting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Host-provided extraction step, run once the completion URL is seen. It
/// may read page state through the tab or values the login script pushed
/// through the bridge context.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, tab: &mut dyn Tab, context: &SessionContext) -> Result<Value>;
}

/// What a finished session hands back to the caller.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// The URL that matched the completion pattern.
    pub end_url: String,
    /// Extracted session data.
    pub data: Value,
}

/// Drives one login session end to end.
pub struct Orchestrator {
    engine: Arc<dyn Engine>,
    config: Config,
    context: SessionContext,
    state: SessionState,
}

impl Orchestrator {
    pub fn new(engine: Arc<dyn Engine>, config: Config) -> Self {
        Self {
            engine,
            config,
            context: SessionContext::new(),
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Run the session. Resources are fully released on every outcome.
    pub async fn run(&mut self, extractor: &dyn Extractor) -> Result<SessionOutcome> {
        let result = self.drive(extractor).await;
        self.state = match &result {
            Ok(_) => SessionState::Done,
            Err(_) => SessionState::Failed,
        };
        result
    }

    async fn drive(&mut self, extractor: &dyn Extractor) -> Result<SessionOutcome> {
        self.state = SessionState::Launching;

        // Everything configuration-derived fails before a browser exists.
        let pattern = UrlPattern::new(&self.config.browser.end_url)?;
        let credential = self.config.credential.to_credential()?;
        let token = compute_token(
            &credential,
            self.config.auth.method,
            self.config.auth.salt.as_deref(),
        )?;
        let start_url = self.config.start_url(&token)?;

        let mut registry = CallableRegistry::new();
        callables::register_stb_callables(&mut registry, &self.config, &self.context)?;
        let registry = Arc::new(registry);

        let bridge = BridgeServer::start(Arc::clone(&registry)).await?;
        let options = LaunchOptions {
            args: self.config.browser.args.clone(),
            headless: self.config.browser.headless,
        };
        let mut tab = match self.engine.launch(&options).await {
            Ok(tab) => tab,
            Err(e) => {
                bridge.shutdown().await;
                return Err(e);
            }
        };

        let result = self
            .attend(tab.as_mut(), &bridge, &registry, &pattern, &start_url, extractor)
            .await;

        let close_result = tab.close().await;
        bridge.shutdown().await;

        let outcome = result?;
        close_result?;
        Ok(outcome)
    }

    /// The resource-holding part of the session: everything here may fail
    /// and rely on `drive` to tear down afterwards.
    async fn attend(
        &mut self,
        tab: &mut dyn Tab,
        bridge: &BridgeServer,
        registry: &CallableRegistry,
        pattern: &UrlPattern,
        start_url: &str,
        extractor: &dyn Extractor,
    ) -> Result<SessionOutcome> {
        if !self.config.browser.headers.is_empty() {
            tab.set_default_headers(&self.config.browser.headers).await?;
        }
        tab.add_init_script(&inject::invoke_stub(bridge.port())).await?;
        let stubs = inject::callable_stubs(registry);
        if !stubs.is_empty() {
            tab.add_init_script(&stubs).await?;
        }

        tab.navigate(start_url).await?;
        self.state = SessionState::AwaitingLogin;
        info!(%pattern, "awaiting the login completion URL");

        let deadline = self.config.timeout();
        let end_url = match tokio::time::timeout(deadline, tab.wait_for_url(pattern)).await {
            Ok(matched) => matched?,
            Err(_) => {
                warn!(%pattern, ?deadline, "session deadline reached");
                return Err(Error::NavigationTimeout {
                    waited: deadline,
                    pattern: pattern.to_string(),
                });
            }
        };
        self.state = SessionState::Authenticated;
        debug!(%end_url, "login flow completed");

        self.state = SessionState::Extracting;
        let data = extractor.extract(tab, &self.context).await?;
        info!(channels = self.context.channel_count(), "session data extracted");

        Ok(SessionOutcome { end_url, data })
    }
}
