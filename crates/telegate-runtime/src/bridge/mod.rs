//! Host–script invocation bridge.
//!
//! Page-context script cannot reach host memory, so host functions are
//! exposed through a loopback HTTP endpoint instead. The registry maps a
//! function name to a typed handler; dispatch never reflects over
//! arbitrary host symbols, so the surface is exactly the set of
//! registered callables.

pub mod server;

pub use server::BridgeServer;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::{Error, Result};

/// Error raised by a registered callable. Converted into a
/// `{"status":"fail"}` body by the server, never into a transport fault.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Host-side function invocable from page script: positional args plus
/// named kwargs in, JSON value out.
pub type HandlerFn =
    dyn Fn(Vec<Value>, Map<String, Value>) -> std::result::Result<Value, HandlerError>
        + Send
        + Sync;

/// A registered callable together with its declared parameter names (used
/// to generate the page-side stub) and an optional execution lock.
pub struct Callable {
    handler: Arc<HandlerFn>,
    params: Vec<String>,
    lock: Option<Arc<Mutex<()>>>,
}

impl Callable {
    /// Declared parameter names, in stub order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Run the handler. Serialized callables take their execution lock
    /// first; everything else runs concurrently.
    pub async fn invoke(
        &self,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> std::result::Result<Value, HandlerError> {
        let _guard = match &self.lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };
        (self.handler)(args, kwargs)
    }
}

/// Name → callable map. Built up before navigation starts and frozen
/// behind an `Arc` while the bridge serves, so lookups never race
/// registration.
#[derive(Default)]
pub struct CallableRegistry {
    entries: BTreeMap<String, Callable>,
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callable. Fails if the name is taken; the previous
    /// registration is left intact.
    pub fn register<F>(&mut self, name: &str, params: &[&str], handler: F) -> Result<()>
    where
        F: Fn(Vec<Value>, Map<String, Value>) -> std::result::Result<Value, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.insert(name, params, handler, false)
    }

    /// Register a callable whose executions are mutually exclusive. Use
    /// for handlers that mutate shared session state; the lock covers only
    /// this callable, not the server.
    pub fn register_serialized<F>(&mut self, name: &str, params: &[&str], handler: F) -> Result<()>
    where
        F: Fn(Vec<Value>, Map<String, Value>) -> std::result::Result<Value, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.insert(name, params, handler, true)
    }

    fn insert<F>(&mut self, name: &str, params: &[&str], handler: F, serialized: bool) -> Result<()>
    where
        F: Fn(Vec<Value>, Map<String, Value>) -> std::result::Result<Value, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        if self.entries.contains_key(name) {
            return Err(Error::DuplicateCallable(name.to_string()));
        }
        self.entries.insert(
            name.to_string(),
            Callable {
                handler: Arc::new(handler),
                params: params.iter().map(|p| p.to_string()).collect(),
                lock: serialized.then(|| Arc::new(Mutex::new(()))),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Callable> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Callables in deterministic (name) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Callable)> {
        self.entries.iter().map(|(name, c)| (name.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Body of a `POST /invoke/{name}` request. Both members are optional on
/// the wire.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct InvocationRequest {
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

/// Wire response for an invocation. Handler failures surface here with an
/// HTTP 2xx so the page script can tell "function failed" from "bridge
/// unreachable".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InvocationResult {
    Success { result: Value },
    Fail { detail: String },
}
