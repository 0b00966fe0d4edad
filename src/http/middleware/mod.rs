//! Policy middleware.
//!
//! Each enabled policy becomes one `axum::middleware::from_fn_with_state`
//! layer holding its compiled policy in an `Arc`. Disabled policies add
//! no layer at all.

pub mod cookies;
pub mod headers;
pub mod redirect;

pub use cookies::cookie_protection_middleware;
pub use headers::{forced_ssl_middleware, security_headers_middleware, ResponseHeaders};
pub use redirect::redirect_guard_middleware;
