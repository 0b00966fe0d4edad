//! HTTP security gateway.
//!
//! A reverse proxy that puts a fixed set of browser-facing security
//! policies in front of one upstream application:
//!
//! - Content-Security-Policy headers built from per-directive source lists
//! - Signed or encrypted cookies, verified on the way in and protected on
//!   the way out
//! - An external redirect guard that checks `Location` against a domain
//!   whitelist
//! - Clickjacking, nosniff and forced SSL / HSTS headers

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::PolicySet;
