//! Cookie protection middleware.
//! Unwraps protected cookies on the way in and protects them on the way out.

use std::sync::Arc;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};

use crate::security::CookieProtector;

pub async fn cookie_protection_middleware(
    State(protector): State<Arc<CookieProtector>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    protector.apply_to_request(req.headers_mut());
    let mut response = next.run(req).await;
    protector.apply_to_response(response.headers_mut());
    response
}
