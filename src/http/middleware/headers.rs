//! Forced SSL and response header middleware.

use std::sync::Arc;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};

use crate::security::{CspHeaders, ForcedSsl, SecurityHeaders};

/// Static headers attached to every response.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaders {
    pub csp: Arc<CspHeaders>,
    pub headers: Arc<SecurityHeaders>,
}

impl ResponseHeaders {
    pub fn is_empty(&self) -> bool {
        self.csp.is_empty() && self.headers.is_empty()
    }
}

pub async fn forced_ssl_middleware(
    State(ssl): State<Arc<ForcedSsl>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(redirect) = ssl.redirect_for(&req) {
        tracing::debug!(path = %req.uri().path(), "Redirecting to HTTPS");
        return redirect;
    }
    let secure = ForcedSsl::is_secure(&req);
    let mut response = next.run(req).await;
    ssl.apply_hsts(secure, response.headers_mut());
    response
}

pub async fn security_headers_middleware(
    State(state): State<ResponseHeaders>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let mut response = next.run(req).await;
    state.csp.apply(response.headers_mut());
    state.headers.apply(&path, response.headers_mut());
    response
}
