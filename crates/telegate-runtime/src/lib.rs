//! # telegate-runtime
//!
//! Drives a real Chromium instance through an ISP set-top-box login flow.
//! The vendor page's script callbacks are bridged into host functions over
//! a loopback HTTP RPC, and the channel/EPG data the flow exposes is
//! captured at the end of the session.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use telegate_runtime::{
//!     callables::ChannelListExtractor, config::Config, engine::chromium::ChromiumEngine,
//!     session::Orchestrator,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> telegate_runtime::Result<()> {
//! let config = Config::load("session.yaml")?;
//! let engine = Arc::new(ChromiumEngine::new()?);
//! let mut orchestrator = Orchestrator::new(engine, config);
//! let outcome = orchestrator.run(&ChannelListExtractor).await?;
//! println!("login finished at {}", outcome.end_url);
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod callables;
pub mod channel;
pub mod config;
pub mod engine;
pub mod inject;
pub mod pattern;
pub mod session;
pub mod store;

pub use bridge::{BridgeServer, CallableRegistry, HandlerError};
pub use config::Config;
pub use pattern::UrlPattern;
pub use session::{Orchestrator, SessionOutcome, SessionState};

use std::time::Duration;

/// Result type for telegate-runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running a login session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("auth error: {0}")]
    Auth(#[from] telegate_auth::AuthError),

    #[error("duplicate callable: {0}")]
    DuplicateCallable(String),

    #[error("channel parse error: {0}")]
    Channel(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("navigation timed out after {waited:?} waiting for {pattern}")]
    NavigationTimeout { waited: Duration, pattern: String },
}
