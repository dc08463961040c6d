//! Caller identification for the REST API.
//!
//! The `Authorization` header carries the caller's user ID, optionally as a
//! bearer token. Admin routes additionally require the ID to be one of the
//! configured admin identities.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::services::api_routes::ErrorResponse;
use crate::services::api_server::ApiState;

/// Identity of the authenticated caller, available to handlers as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

/// Extract the caller ID from the `Authorization` header.
pub fn caller_id(request: &Request) -> Option<String> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .trim_start();
    let id = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!id.is_empty()).then(|| id.to_string())
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("UNAUTHORIZED", message)),
    )
        .into_response()
}

/// Require any caller identity.
pub async fn user_middleware(mut request: Request, next: Next) -> Response {
    match caller_id(&request) {
        Some(id) => {
            request.extensions_mut().insert(Caller(id));
            next.run(request).await
        }
        None => {
            log::warn!("[auth] Missing Authorization header on {}", request.uri().path());
            unauthorized("Missing Authorization header")
        }
    }
}

/// Require an admin identity.
pub async fn admin_middleware(
    State(state): State<ApiState>,
    mut request: Request,
    next: Next,
) -> Response {
    match caller_id(&request) {
        Some(id) if state.service.is_admin(&id) => {
            request.extensions_mut().insert(Caller(id));
            next.run(request).await
        }
        Some(id) => {
            log::warn!("[auth] {} is not an admin ({})", id, request.uri().path());
            unauthorized("Admin identity required")
        }
        None => {
            log::warn!("[auth] Missing Authorization header on {}", request.uri().path());
            unauthorized("Missing Authorization header")
        }
    }
}
