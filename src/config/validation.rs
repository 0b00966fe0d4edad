//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges (timeouts > 0)
//! - Compile every enabled security policy once so bad secrets, source
//!   lists or whitelist entries are caught before the listener starts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::security::cookies::{CookieProtector, Encrypter, Signer};
use crate::security::redirect::DEFAULT_INTERSTITIAL_PATH;
use crate::security::{CspPolicy, RedirectGuard};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{section}: {message}")]
pub struct ValidationError {
    pub section: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(section: &'static str, message: impl ToString) -> Self {
        Self {
            section,
            message: message.to_string(),
        }
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener",
            format!("invalid bind address {:?}", config.listener.bind_address),
        ));
    }

    if config.upstream.address.parse::<Authority>().is_err() {
        errors.push(ValidationError::new(
            "upstream",
            format!("invalid upstream address {:?}", config.upstream.address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts", "request_secs must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability",
            format!("invalid metrics address {:?}", config.observability.metrics_address),
        ));
    }

    let security = &config.security;

    if security.csp.enabled {
        match CspPolicy::from_config(&security.csp) {
            Ok(policy) => {
                if let Some(path) = policy.local_report_path() {
                    if path.contains(['{', '}', '*']) || path.starts_with(DEFAULT_INTERSTITIAL_PATH) {
                        errors.push(ValidationError::new(
                            "csp",
                            format!("report_uri {:?} cannot be served locally", path),
                        ));
                    }
                }
            }
            Err(e) => errors.push(ValidationError::new("csp", e)),
        }
    }

    let signer_ok = !security.signed_cookie.enabled
        || match Signer::from_config(&security.signed_cookie) {
            Ok(_) => true,
            Err(e) => {
                errors.push(ValidationError::new("signed_cookie", e));
                false
            }
        };
    let encrypter_ok = !security.encrypted_cookie.enabled
        || match Encrypter::from_config(&security.encrypted_cookie) {
            Ok(_) => true,
            Err(e) => {
                errors.push(ValidationError::new("encrypted_cookie", e));
                false
            }
        };
    if signer_ok && encrypter_ok {
        if let Err(e) = CookieProtector::from_config(&security.signed_cookie, &security.encrypted_cookie) {
            errors.push(ValidationError::new("cookies", e));
        }
    }

    if security.external_redirects.enabled {
        if let Err(e) = RedirectGuard::from_config(&security.external_redirects) {
            errors.push(ValidationError::new("external_redirects", e));
        }
    }

    for rule in &security.clickjacking.paths {
        if !rule.prefix.starts_with('/') {
            errors.push(ValidationError::new(
                "clickjacking",
                format!("path prefix {:?} must start with '/'", rule.prefix),
            ));
        }
    }
    for prefix in &security.forced_ssl.whitelist {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::new(
                "forced_ssl",
                format!("whitelisted path {:?} must start with '/'", prefix),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.request_secs = 0;
        config.security.encrypted_cookie.enabled = true;
        config.security.encrypted_cookie.names = vec!["prefs".into()];
        config.security.encrypted_cookie.secret = "k".into();
        config.security.encrypted_cookie.algorithm = "rijndael-128".into();
        config.security.forced_ssl.whitelist = vec!["healthz".into()];

        let errors = validate_config(&config).unwrap_err();
        let sections: Vec<_> = errors.iter().map(|e| e.section).collect();
        assert_eq!(sections, vec!["listener", "timeouts", "encrypted_cookie", "forced_ssl"]);
    }

    #[test]
    fn test_conflicting_cookie_names() {
        let mut config = GatewayConfig::default();
        let security = &mut config.security;
        security.signed_cookie.enabled = true;
        security.signed_cookie.names = vec!["session".into()];
        security.signed_cookie.secret = "a".into();
        security.encrypted_cookie.enabled = true;
        security.encrypted_cookie.names = vec!["session".into()];
        security.encrypted_cookie.secret = "b".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].section, "cookies");
    }

    #[test]
    fn test_disabled_sections_are_not_checked() {
        let mut config = GatewayConfig::default();
        config.security.signed_cookie.secret = String::new();
        config.security.csp.script = "bad;token".into();
        assert!(validate_config(&config).is_ok());
    }
}
