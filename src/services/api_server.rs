//! HTTP server for the assignment engine.
//!
//! Builds the axum router (public, user and admin route groups plus CORS)
//! and runs it until the shared cancellation token fires.

use axum::http::{header, Method};
use axum::middleware;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::services::api_auth::{admin_middleware, user_middleware};
use crate::services::api_routes::{admin_routes, public_routes, user_routes};
use crate::services::assignment::AssignmentService;

/// Shared state for the API routes.
#[derive(Clone)]
pub struct ApiState {
    pub service: AssignmentService,
    /// Cancelled on shutdown; passed down to bulk rebalances.
    pub cancel: CancellationToken,
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build the full router.
pub fn router(state: ApiState) -> Router {
    let admin = admin_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        admin_middleware,
    ));
    let user = user_routes().route_layer(middleware::from_fn(user_middleware));

    Router::new()
        .merge(public_routes())
        .merge(admin)
        .merge(user)
        .with_state(state)
        .layer(cors_layer())
}

/// Serve the API on `listener` until `state.cancel` is cancelled.
pub async fn serve(listener: TcpListener, state: ApiState) -> std::io::Result<()> {
    let cancel = state.cancel.clone();
    let addr = listener.local_addr()?;
    log::info!("[server] Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await?;

    log::info!("[server] Stopped");
    Ok(())
}
