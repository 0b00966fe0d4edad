//! External redirect guard.
//!
//! # Data Flow
//! ```text
//! Upstream 3xx response with Location
//!     → target.rs (extract host; relative targets pass)
//!     → whitelist.rs (exact or label-suffix match)
//!     → disposition: allow | rewrite to interstitial | abort (403)
//! ```
//!
//! # Design Decisions
//! - An empty whitelist means no restriction
//! - Redirects back to the request's own host are same-origin and pass
//! - Unparseable absolute targets are treated as external

pub mod interstitial;
pub mod target;
pub mod whitelist;

use axum::{
    http::{header::LOCATION, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use url::form_urlencoded;

use crate::config::{ExternalRedirectConfig, OverrideSetting};
use crate::observability::metrics;

pub use interstitial::DEFAULT_INTERSTITIAL_PATH;
pub use target::RedirectTarget;
pub use whitelist::RedirectWhitelist;

const DEFAULT_FORWARD_AS: &str = "url";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedirectError {
    #[error("external redirect to {target} blocked")]
    ExternalRedirectBlocked { target: String },

    #[error("invalid whitelist entry {0:?}")]
    InvalidWhitelistEntry(String),

    #[error("override target must be a local path, got {0:?}")]
    InvalidOverride(String),

    #[error("forward_as must be a non-empty query parameter name")]
    InvalidForwardAs,
}

impl IntoResponse for RedirectError {
    fn into_response(self) -> Response {
        match self {
            RedirectError::ExternalRedirectBlocked { .. } => {
                (StatusCode::FORBIDDEN, "External redirect blocked").into_response()
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// What to do with a redirect to a host outside the whitelist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectPolicy {
    /// Local path blocked redirects are rewritten to.
    pub override_target: Option<String>,
    /// Query parameter carrying the original destination on rewrites.
    pub forward_as: Option<String>,
    /// Fail with `ExternalRedirectBlocked` instead of redirecting.
    pub abort: bool,
    /// Log external redirects.
    pub log: bool,
}

impl RedirectPolicy {
    pub fn from_config(config: &ExternalRedirectConfig) -> Result<Self, RedirectError> {
        let override_target = match &config.override_target {
            None | Some(OverrideSetting::Enabled(false)) => None,
            Some(OverrideSetting::Enabled(true)) => Some(DEFAULT_INTERSTITIAL_PATH.to_string()),
            Some(OverrideSetting::Target(path)) => {
                if !path.starts_with('/') || path.starts_with("//") || path.contains('\\') {
                    return Err(RedirectError::InvalidOverride(path.clone()));
                }
                Some(path.clone())
            }
        };

        let forward_as = match (&override_target, config.forward_as.as_deref()) {
            (Some(_), None) => Some(DEFAULT_FORWARD_AS.to_string()),
            (_, Some(name)) if name.trim().is_empty() => return Err(RedirectError::InvalidForwardAs),
            (_, Some(name)) => Some(name.trim().to_string()),
            (None, None) => None,
        };

        Ok(Self {
            override_target,
            forward_as,
            abort: config.abort,
            log: config.log,
        })
    }
}

/// Outcome for one redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    Allow,
    /// Replace `Location` with this value.
    Rewrite(String),
}

#[derive(Debug, Clone, Default)]
pub struct RedirectGuard {
    whitelist: RedirectWhitelist,
    policy: RedirectPolicy,
}

impl RedirectGuard {
    pub fn new(whitelist: RedirectWhitelist, policy: RedirectPolicy) -> Self {
        Self { whitelist, policy }
    }

    pub fn from_config(config: &ExternalRedirectConfig) -> Result<Self, RedirectError> {
        Ok(Self::new(
            RedirectWhitelist::new(&config.whitelist)?,
            RedirectPolicy::from_config(config)?,
        ))
    }

    pub fn policy(&self) -> &RedirectPolicy {
        &self.policy
    }

    /// Whether `location` leaves the allowed set of hosts.
    pub fn is_external(&self, request_host: Option<&str>, location: &str) -> bool {
        if self.whitelist.is_empty() {
            return false;
        }
        match RedirectTarget::parse(location) {
            RedirectTarget::Relative => false,
            RedirectTarget::Malformed => true,
            RedirectTarget::Host(host) => {
                let same_origin = request_host
                    .map(strip_port)
                    .is_some_and(|own| own.eq_ignore_ascii_case(&host));
                !same_origin && !self.whitelist.matches(&host)
            }
        }
    }

    /// Decide what happens to a redirect to `location`.
    pub fn check(&self, request_host: Option<&str>, location: &str) -> Result<RedirectDecision, RedirectError> {
        if !self.is_external(request_host, location) {
            return Ok(RedirectDecision::Allow);
        }

        if self.policy.abort {
            self.record(location, "blocked");
            return Err(RedirectError::ExternalRedirectBlocked {
                target: location.to_string(),
            });
        }

        if let Some(target) = &self.policy.override_target {
            self.record(location, "rewritten");
            return Ok(RedirectDecision::Rewrite(self.rewrite(target, location)));
        }

        self.record(location, "allowed");
        Ok(RedirectDecision::Allow)
    }

    fn rewrite(&self, target: &str, location: &str) -> String {
        let Some(param) = &self.policy.forward_as else {
            return target.to_string();
        };
        let separator = if target.contains('?') { '&' } else { '?' };
        let name: String = form_urlencoded::byte_serialize(param.as_bytes()).collect();
        let value: String = form_urlencoded::byte_serialize(location.as_bytes()).collect();
        format!("{}{}{}={}", target, separator, name, value)
    }

    fn record(&self, location: &str, action: &'static str) {
        metrics::record_redirect(action);
        if self.policy.log {
            tracing::warn!(target_url = %location, action, "External redirect detected");
        }
    }

    /// Apply the guard to a finished response.
    pub fn apply(&self, request_host: Option<&str>, response: &mut Response) -> Result<(), RedirectError> {
        if !response.status().is_redirection() {
            return Ok(());
        }
        let Some(location) = response
            .headers()
            .get(LOCATION)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        else {
            return Ok(());
        };

        if let RedirectDecision::Rewrite(new_location) = self.check(request_host, &location)? {
            let value = HeaderValue::try_from(new_location).map_err(|_| RedirectError::ExternalRedirectBlocked {
                target: location.clone(),
            })?;
            response.headers_mut().insert(LOCATION, value);
        }
        Ok(())
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.split_once(']').map_or(host, |(addr, _)| &host[..=addr.len()]);
    }
    host.rsplit_once(':').map_or(host, |(name, _)| name).trim_end_matches('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(abort: bool, override_target: Option<OverrideSetting>) -> RedirectGuard {
        RedirectGuard::from_config(&ExternalRedirectConfig {
            enabled: true,
            whitelist: vec!["example.com".into()],
            override_target,
            forward_as: Some("next".into()),
            abort,
            log: true,
        })
        .unwrap()
    }

    fn redirect(location: &str) -> Response {
        let mut response = StatusCode::FOUND.into_response();
        response
            .headers_mut()
            .insert(LOCATION, HeaderValue::from_str(location).unwrap());
        response
    }

    #[test]
    fn test_abort_blocks_external_redirect() {
        let guard = guard(true, None);
        assert_eq!(
            guard.check(Some("app.local"), "http://evil.test/"),
            Err(RedirectError::ExternalRedirectBlocked {
                target: "http://evil.test/".into()
            })
        );
    }

    #[test]
    fn test_override_rewrites_to_interstitial() {
        let guard = guard(false, Some(OverrideSetting::Enabled(true)));
        assert_eq!(
            guard.check(Some("app.local"), "http://evil.test/").unwrap(),
            RedirectDecision::Rewrite("/_guard/external-redirect?next=http%3A%2F%2Fevil.test%2F".into())
        );
    }

    #[test]
    fn test_override_path_with_query() {
        let guard = guard(false, Some(OverrideSetting::Target("/leave?lang=en".into())));
        assert_eq!(
            guard.check(None, "https://evil.test/a?b=c&d").unwrap(),
            RedirectDecision::Rewrite("/leave?lang=en&next=https%3A%2F%2Fevil.test%2Fa%3Fb%3Dc%26d".into())
        );
    }

    #[test]
    fn test_neither_abort_nor_override_passes() {
        let guard = guard(false, None);
        assert_eq!(guard.check(None, "http://evil.test/").unwrap(), RedirectDecision::Allow);
    }

    #[test]
    fn test_whitelisted_and_relative_targets_pass() {
        let guard = guard(true, None);
        assert_eq!(guard.check(None, "https://example.com/x").unwrap(), RedirectDecision::Allow);
        assert_eq!(guard.check(None, "https://a.b.example.com/").unwrap(), RedirectDecision::Allow);
        assert_eq!(guard.check(None, "/dashboard").unwrap(), RedirectDecision::Allow);
        assert!(guard.check(None, "https://notexample.com/").is_err());
        assert!(guard.check(None, "https://example.com.evil.net/").is_err());
    }

    #[test]
    fn test_same_host_passes() {
        let guard = guard(true, None);
        assert!(guard.check(Some("App.Local:8080"), "http://app.local/next").is_ok());
        assert!(guard.check(Some("app.local"), "//app.local/next").is_ok());
        assert!(guard.check(Some("app.local"), "//other.local/next").is_err());
    }

    #[test]
    fn test_malformed_target_is_external() {
        let guard = guard(true, None);
        assert!(guard.check(None, "http://exa mple.com/").is_err());
    }

    #[test]
    fn test_empty_whitelist_is_unrestricted() {
        let guard = RedirectGuard::from_config(&ExternalRedirectConfig {
            enabled: true,
            abort: true,
            ..ExternalRedirectConfig::default()
        })
        .unwrap();
        assert_eq!(guard.check(None, "http://anything.test/").unwrap(), RedirectDecision::Allow);
    }

    #[test]
    fn test_apply_to_response() {
        let guard = guard(false, Some(OverrideSetting::Enabled(true)));

        let mut external = redirect("http://evil.test/");
        guard.apply(Some("app.local"), &mut external).unwrap();
        assert_eq!(
            external.headers().get(LOCATION).unwrap(),
            "/_guard/external-redirect?next=http%3A%2F%2Fevil.test%2F"
        );

        let mut internal = redirect("/home");
        guard.apply(Some("app.local"), &mut internal).unwrap();
        assert_eq!(internal.headers().get(LOCATION).unwrap(), "/home");

        let mut not_redirect = StatusCode::OK.into_response();
        not_redirect
            .headers_mut()
            .insert(LOCATION, HeaderValue::from_static("http://evil.test/"));
        guard.apply(None, &mut not_redirect).unwrap();
        assert_eq!(not_redirect.headers().get(LOCATION).unwrap(), "http://evil.test/");
    }

    #[test]
    fn test_blocked_error_is_forbidden() {
        let response = RedirectError::ExternalRedirectBlocked {
            target: "http://evil.test/".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_policy_validation() {
        let invalid_override = ExternalRedirectConfig {
            override_target: Some(OverrideSetting::Target("https://elsewhere.test/".into())),
            ..ExternalRedirectConfig::default()
        };
        assert!(matches!(
            RedirectPolicy::from_config(&invalid_override),
            Err(RedirectError::InvalidOverride(_))
        ));

        let default_param = RedirectPolicy::from_config(&ExternalRedirectConfig {
            override_target: Some(OverrideSetting::Enabled(true)),
            ..ExternalRedirectConfig::default()
        })
        .unwrap();
        assert_eq!(default_param.forward_as.as_deref(), Some("url"));
        assert_eq!(default_param.override_target.as_deref(), Some(DEFAULT_INTERSTITIAL_PATH));
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("example.com:8080"), "example.com");
        assert_eq!(strip_port("example.com"), "example.com");
        assert_eq!(strip_port("[::1]:443"), "[::1]");
    }
}
