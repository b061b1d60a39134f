//! Loopback HTTP server dispatching invocation requests to the registry.
//!
//! The bridge grants page-context script the ability to execute host
//! code, so the listener binds to the loopback interface only and lives
//! exactly as long as its session.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};

use super::{CallableRegistry, InvocationRequest, InvocationResult};
use crate::Result;

/// A running bridge listener. One instance per session; dropped ports are
/// never reused across sessions because binding always asks for an
/// ephemeral port.
pub struct BridgeServer {
    addr: SocketAddr,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl BridgeServer {
    /// Bind `127.0.0.1:0` and start serving the registry.
    pub async fn start(registry: Arc<CallableRegistry>) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        // Page origins differ from the bridge origin, so the browser
        // preflights every invocation.
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = Router::new()
            .route("/invoke/:name", post(invoke))
            .layer(cors)
            .with_state(registry);

        let shutdown = Arc::new(Notify::new());
        let signal = Arc::clone(&shutdown);
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.notified().await });
            if let Err(e) = serve.await {
                error!("bridge server failed: {e}");
            }
        });

        info!(port = addr.port(), "invocation bridge listening on loopback");
        Ok(Self {
            addr,
            shutdown,
            task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop the listener and wait for the serve task to drain.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if self.task.await.is_err() {
            warn!("bridge serve task ended abnormally");
        }
        debug!("invocation bridge stopped");
    }
}

async fn invoke(
    State(registry): State<Arc<CallableRegistry>>,
    Path(name): Path<String>,
    body: Option<Json<InvocationRequest>>,
) -> (StatusCode, Json<InvocationResult>) {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let Some(callable) = registry.get(&name) else {
        debug!(%name, "invocation for unregistered callable");
        return (
            StatusCode::NOT_FOUND,
            Json(InvocationResult::Fail {
                detail: "unknown function".into(),
            }),
        );
    };

    match callable.invoke(request.args, request.kwargs).await {
        Ok(result) => (StatusCode::OK, Json(InvocationResult::Success { result })),
        Err(e) => {
            warn!(%name, error = %e, "callable failed");
            (
                StatusCode::OK,
                Json(InvocationResult::Fail {
                    detail: e.to_string(),
                }),
            )
        }
    }
}
