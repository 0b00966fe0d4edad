//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, policy compilation)
//!     → GatewayConfig (validated, immutable)
//!     → PolicySet built once and shared via Arc
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ClickjackingConfig, ContentTypeConfig, CspConfig, EncryptedCookieConfig, ExternalRedirectConfig,
    ForcedSslConfig, FrameAction, FramePathRule, GatewayConfig, ListenerConfig, ObservabilityConfig,
    OverrideSetting, SecurityConfig, SignedCookieConfig, TimeoutConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
