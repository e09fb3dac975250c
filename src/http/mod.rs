//! axum surface for impersonation.
//!
//! [`router`] serves the impersonation endpoints and `/health`. Upstream
//! authentication must insert an [`AuthenticatedIdentity`] extension before
//! these routes run; layer it over the returned router.
//!
//! | Method | Path | Result |
//! |---|---|---|
//! | `POST` | `/admin/impersonation` | 303 to the tenant view with cookies, or JSON error |
//! | `DELETE` | `/admin/impersonation` | 303 to the admin view, cookies cleared |
//! | `GET` | `/admin/impersonation` | JSON status |
//! | `GET` | `/health` | JSON health |
//!
//! [`AuthenticatedIdentity`]: crate::auth::AuthenticatedIdentity

mod handlers;
mod health;
mod middleware;
mod state;

pub use handlers::StartImpersonationRequest;
pub use health::{HealthResponse, health_handler};
pub use middleware::{MakeRequestUuid, require_unrestricted, resolve_session};
pub use state::AppState;

use crate::config::Config;
use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use std::time::Duration;
use tokio::signal;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/admin/impersonation",
            post(handlers::start_impersonation)
                .delete(handlers::stop_impersonation)
                .get(handlers::impersonation_status),
        )
        .layer(from_fn_with_state(state.clone(), resolve_session))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        // Last layer runs first: the id is set before it is propagated.
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// Serve `app` on the configured address until Ctrl+C or SIGTERM.
pub async fn serve(config: &Config, app: Router) -> std::io::Result<()> {
    let addr = config
        .server
        .addr()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server starting on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Grace period for in-flight requests
    tokio::time::sleep(Duration::from_secs(1)).await;
}
