//! Peripheral security headers and forced SSL.
//!
//! # Responsibilities
//! - `X-Frame-Options` per path prefix (clickjacking)
//! - `X-Content-Type-Options: nosniff`
//! - Redirect plain HTTP to HTTPS and add `Strict-Transport-Security`
//!
//! # Design Decisions
//! - Headers are rendered once at startup and inserted on every response
//! - The request scheme comes from `X-Forwarded-Proto` when present, since
//!   the gateway usually sits behind a TLS terminator

use axum::http::{
    header::{HOST, LOCATION, STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
    HeaderMap, HeaderValue, Request, StatusCode, Uri,
};
use axum::response::{IntoResponse, Response};

use crate::config::{ClickjackingConfig, ContentTypeConfig, ForcedSslConfig, FrameAction};

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

#[derive(Debug, Clone)]
struct FrameRule {
    prefix: String,
    value: Option<HeaderValue>,
}

/// Response headers that do not depend on the upstream response.
#[derive(Debug, Clone, Default)]
pub struct SecurityHeaders {
    frame_rules: Vec<FrameRule>,
    nosniff: bool,
}

impl SecurityHeaders {
    pub fn from_config(clickjacking: &ClickjackingConfig, content_type: &ContentTypeConfig) -> Self {
        let frame_rules = if clickjacking.enabled {
            clickjacking
                .paths
                .iter()
                .map(|rule| FrameRule {
                    prefix: rule.prefix.clone(),
                    value: match rule.action {
                        FrameAction::Deny => Some(HeaderValue::from_static("DENY")),
                        FrameAction::SameOrigin => Some(HeaderValue::from_static("SAMEORIGIN")),
                        FrameAction::Allow => None,
                    },
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            frame_rules,
            nosniff: content_type.enabled,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frame_rules.is_empty() && !self.nosniff
    }

    /// First matching prefix wins.
    pub fn frame_option(&self, path: &str) -> Option<&HeaderValue> {
        self.frame_rules
            .iter()
            .find(|rule| path.starts_with(&rule.prefix))
            .and_then(|rule| rule.value.as_ref())
    }

    pub fn apply(&self, path: &str, headers: &mut HeaderMap) {
        if let Some(value) = self.frame_option(path) {
            headers.insert(X_FRAME_OPTIONS, value.clone());
        }
        if self.nosniff {
            headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        }
    }
}

/// HTTP to HTTPS redirection plus HSTS.
#[derive(Debug, Clone)]
pub struct ForcedSsl {
    whitelist: Vec<String>,
    hsts: Option<HeaderValue>,
}

impl ForcedSsl {
    /// `None` when the section is disabled.
    pub fn from_config(config: &ForcedSslConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let hsts = (config.hsts_max_age > 0).then(|| {
            let value = if config.hsts_subdomains {
                format!("max-age={}; includeSubDomains", config.hsts_max_age)
            } else {
                format!("max-age={}", config.hsts_max_age)
            };
            HeaderValue::try_from(value).unwrap_or_else(|_| HeaderValue::from_static("max-age=0"))
        });
        Some(Self {
            whitelist: config.whitelist.clone(),
            hsts,
        })
    }

    pub fn is_secure<B>(request: &Request<B>) -> bool {
        match request.headers().get(X_FORWARDED_PROTO) {
            Some(proto) => proto
                .to_str()
                .ok()
                .and_then(|v| v.split(',').next())
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("https")),
            None => request.uri().scheme_str() == Some("https"),
        }
    }

    fn is_whitelisted(&self, path: &str) -> bool {
        self.whitelist.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// A 301 to the HTTPS equivalent for insecure, non-whitelisted requests.
    pub fn redirect_for<B>(&self, request: &Request<B>) -> Option<Response> {
        if Self::is_secure(request) || self.is_whitelisted(request.uri().path()) {
            return None;
        }

        let host = request
            .headers()
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| request.uri().authority().map(|a| a.as_str()))?;
        let host = without_port(host);

        let path_and_query = request
            .uri()
            .path_and_query()
            .map_or("/", |pq| pq.as_str());
        let target = format!("https://{}{}", host, path_and_query);
        let location = target.parse::<Uri>().ok()?;
        let location = HeaderValue::try_from(location.to_string()).ok()?;

        let mut response = StatusCode::MOVED_PERMANENTLY.into_response();
        response.headers_mut().insert(LOCATION, location);
        Some(response)
    }

    /// HSTS is only meaningful on secure responses.
    pub fn apply_hsts(&self, secure: bool, headers: &mut HeaderMap) {
        if let (true, Some(value)) = (secure, &self.hsts) {
            headers.insert(STRICT_TRANSPORT_SECURITY, value.clone());
        }
    }
}

/// Drop an explicit port; the HTTPS redirect targets the default port.
fn without_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.split_once(']').map_or(host, |(addr, _)| &host[..=addr.len()]);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
