//! External redirect guard middleware.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::HOST, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::request_id;
use crate::security::RedirectGuard;

pub async fn redirect_guard_middleware(
    State(guard): State<Arc<RedirectGuard>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let host = req
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().authority().map(|a| a.to_string()));
    let request_id = request_id(&req);

    let mut response = next.run(req).await;
    match guard.apply(host.as_deref(), &mut response) {
        Ok(()) => response,
        Err(e) => {
            tracing::debug!(request_id = %request_id, error = %e, "Redirect aborted");
            e.into_response()
        }
    }
}
