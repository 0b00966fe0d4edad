//! Content-Security-Policy builder.
//!
//! # Data Flow
//! ```text
//! [security.csp] raw source lists
//!     → source_list.rs (tokenize, validate, de-duplicate)   once, at startup
//!     → policy.rs (CspPolicy, fixed directive order)
//!     → header values rendered once, attached to every response
//! ```
//!
//! Violation reports posted by browsers are handled in `report.rs`.

pub mod policy;
pub mod report;
pub mod source_list;

use thiserror::Error;

pub use policy::{CspHeaders, CspPolicy, Directive};
pub use source_list::{Keyword, SourceList, SourceToken};

/// Errors raised while building a policy from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CspError {
    #[error("invalid policy token {token:?}: {reason}")]
    InvalidPolicyToken { token: String, reason: &'static str },
}
