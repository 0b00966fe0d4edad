//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the security gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The application every request is forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Security policies applied around the upstream.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of the human readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security policy configuration.
///
/// Every section carries an `enabled` flag; disabled sections are never
/// compiled, enabled ones must be valid or startup fails.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    pub csp: CspConfig,
    pub signed_cookie: SignedCookieConfig,
    pub encrypted_cookie: EncryptedCookieConfig,
    pub external_redirects: ExternalRedirectConfig,
    pub clickjacking: ClickjackingConfig,
    pub content_type: ContentTypeConfig,
    pub forced_ssl: ForcedSslConfig,
}

/// Content-Security-Policy configuration.
///
/// Each directive is a raw, whitespace separated source list such as
/// `"'self' *.cdn.example https:"`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CspConfig {
    pub enabled: bool,
    pub default: String,
    pub script: String,
    pub object: String,
    pub style: String,
    pub img: String,
    pub media: String,
    pub frame: String,
    pub font: String,
    pub connect: String,

    /// Where browsers should POST violation reports. A local path (starting
    /// with `/`) is served by the gateway itself.
    pub report_uri: Option<String>,

    /// Send `Content-Security-Policy-Report-Only` instead of enforcing.
    pub report_only: bool,

    /// Also send the legacy `X-Content-Security-Policy` / `X-WebKit-CSP` headers.
    pub compat_headers: bool,
}

/// Signed (integrity protected) cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignedCookieConfig {
    pub enabled: bool,

    /// Names of the cookies to sign.
    pub names: Vec<String>,

    /// HMAC secret.
    pub secret: String,

    /// HMAC hash algorithm (sha256, sha384, sha512).
    pub hash_algo: String,

    /// Previous secrets still accepted when verifying incoming cookies.
    /// Never used for signing.
    pub fallback_secrets: Vec<String>,
}

impl Default for SignedCookieConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            names: Vec::new(),
            secret: String::new(),
            hash_algo: "sha256".to_string(),
            fallback_secrets: Vec::new(),
        }
    }
}

/// Encrypted (confidentiality and integrity protected) cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EncryptedCookieConfig {
    pub enabled: bool,

    /// Names of the cookies to encrypt.
    pub names: Vec<String>,

    /// Secret the cipher key is derived from.
    pub secret: String,

    /// AEAD cipher (aes-256-gcm, aes-128-gcm).
    pub algorithm: String,

    /// Previous secrets still accepted when decrypting incoming cookies.
    /// Never used for encryption.
    pub fallback_secrets: Vec<String>,
}

impl Default for EncryptedCookieConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            names: Vec::new(),
            secret: String::new(),
            algorithm: "aes-256-gcm".to_string(),
            fallback_secrets: Vec::new(),
        }
    }
}

/// External redirect guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExternalRedirectConfig {
    pub enabled: bool,

    /// Domains (and their subdomains) redirects may point to.
    pub whitelist: Vec<String>,

    /// Rewrite blocked redirects to an internal handler. `true` uses the
    /// built-in confirmation page, a string names the path to use instead.
    #[serde(rename = "override")]
    pub override_target: Option<OverrideSetting>,

    /// Query parameter carrying the original destination on rewrites.
    pub forward_as: Option<String>,

    /// Fail the request with 403 instead of redirecting.
    pub abort: bool,

    /// Log external redirects.
    pub log: bool,
}

impl Default for ExternalRedirectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            whitelist: Vec::new(),
            override_target: None,
            forward_as: None,
            abort: false,
            log: true,
        }
    }
}

/// The `override` option accepts either a flag or an explicit path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OverrideSetting {
    Enabled(bool),
    Target(String),
}

/// Clickjacking protection (`X-Frame-Options`) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClickjackingConfig {
    pub enabled: bool,

    /// Path prefix rules; the first matching prefix wins.
    pub paths: Vec<FramePathRule>,
}

impl Default for ClickjackingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            paths: vec![FramePathRule {
                prefix: "/".to_string(),
                action: FrameAction::Deny,
            }],
        }
    }
}

/// A single `X-Frame-Options` rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FramePathRule {
    pub prefix: String,
    pub action: FrameAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FrameAction {
    Deny,
    SameOrigin,
    /// No header is sent.
    Allow,
}

/// Content-type sniffing protection.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ContentTypeConfig {
    /// Send `X-Content-Type-Options: nosniff`.
    pub enabled: bool,
}

/// Forced SSL and HSTS configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ForcedSslConfig {
    pub enabled: bool,

    /// HSTS max-age in seconds; 0 disables the header.
    pub hsts_max_age: u64,

    /// Add `includeSubDomains` to the HSTS header.
    pub hsts_subdomains: bool,

    /// Path prefixes allowed over plain HTTP.
    pub whitelist: Vec<String>,
}
