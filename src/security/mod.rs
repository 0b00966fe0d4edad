//! Security policy subsystem.
//!
//! # Data Flow
//! ```text
//! [security] config
//!     → PolicySet::from_config (parse and compile every enabled policy)
//!
//! Incoming request:
//!     → headers.rs (forced SSL redirect)
//!     → cookies/ (verify or decrypt protected cookies, drop failures)
//!     → upstream
//!
//! Outgoing response:
//!     → cookies/ (sign or encrypt protected Set-Cookie values)
//!     → redirect/ (inspect Location, abort or rewrite)
//!     → csp/ + headers.rs (attach policy headers)
//! ```
//!
//! # Design Decisions
//! - Fail closed: invalid configuration stops startup, invalid cookies are dropped
//! - Policies are immutable once built and shared via Arc

pub mod cookies;
pub mod csp;
pub mod headers;
pub mod redirect;

use std::sync::Arc;

use thiserror::Error;

use crate::config::SecurityConfig;

pub use cookies::{CookieError, CookieProtector};
pub use csp::{CspError, CspHeaders, CspPolicy};
pub use headers::{ForcedSsl, SecurityHeaders};
pub use redirect::{RedirectError, RedirectGuard};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    #[error("{directive}: {source}")]
    Csp {
        directive: &'static str,
        #[source]
        source: CspError,
    },

    #[error(transparent)]
    Cookie(#[from] CookieError),

    #[error(transparent)]
    Redirect(#[from] RedirectError),
}

/// Every enabled policy, compiled and ready to apply.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    pub csp: Option<Arc<CspPolicy>>,
    pub cookies: Option<Arc<CookieProtector>>,
    pub redirects: Option<Arc<RedirectGuard>>,
    pub headers: Arc<SecurityHeaders>,
    pub forced_ssl: Option<Arc<ForcedSsl>>,
}

impl PolicySet {
    pub fn from_config(config: &SecurityConfig) -> Result<Self, SecurityError> {
        let csp = if config.csp.enabled {
            Some(Arc::new(CspPolicy::from_config(&config.csp)?))
        } else {
            None
        };

        let cookies = CookieProtector::from_config(&config.signed_cookie, &config.encrypted_cookie)?.map(Arc::new);

        let redirects = if config.external_redirects.enabled {
            Some(Arc::new(RedirectGuard::from_config(&config.external_redirects)?))
        } else {
            None
        };

        Ok(Self {
            csp,
            cookies,
            redirects,
            headers: Arc::new(SecurityHeaders::from_config(&config.clickjacking, &config.content_type)),
            forced_ssl: ForcedSsl::from_config(&config.forced_ssl).map(Arc::new),
        })
    }

    /// Names of the enabled policies, for startup logging.
    pub fn enabled(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.forced_ssl.is_some() {
            names.push("forced_ssl");
        }
        if self.cookies.is_some() {
            names.push("cookies");
        }
        if self.redirects.is_some() {
            names.push("external_redirects");
        }
        if self.csp.is_some() {
            names.push("csp");
        }
        if !self.headers.is_empty() {
            names.push("headers");
        }
        names
    }
}
