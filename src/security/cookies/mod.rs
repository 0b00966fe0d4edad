//! Cookie protection engine.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     Cookie header bytes → header.rs (split fragments)
//!     → protected names: signer.rs verify / encrypter.rs decrypt
//!     → failures dropped, plaintext forwarded upstream
//!
//! Outbound response:
//!     Set-Cookie headers → protected names signed / encrypted
//!     → attributes preserved
//! ```
//!
//! # Design Decisions
//! - Fail closed: a cookie that does not verify is removed, never forwarded raw
//! - A name belongs to exactly one mode, checked at startup
//! - Fallback secrets verify old cookies but never protect new ones

pub mod encrypter;
pub mod header;
pub mod signer;

use std::collections::HashMap;

use axum::http::{header::COOKIE, header::SET_COOKIE, HeaderMap, HeaderValue};
use thiserror::Error;

use crate::config::{EncryptedCookieConfig, SignedCookieConfig};
use crate::observability::metrics;

pub use encrypter::{CipherAlgorithm, Encrypter};
pub use header::SetCookie;
pub use signer::{HashAlgorithm, Signer};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CookieError {
    #[error("cookie secret must not be empty")]
    EmptySecret,

    #[error("unsupported hash algorithm: {0}")]
    UnsupportedHash(String),

    #[error("unsupported cipher algorithm: {0}")]
    UnsupportedCipher(String),

    #[error("no cookie names configured")]
    NoCookieNames,

    #[error("cookie {0:?} is configured for both signing and encryption")]
    ConflictingRules(String),

    #[error("invalid key material")]
    InvalidKey,

    #[error("cookie signature verification failed")]
    VerificationFailed,

    #[error("cookie decryption failed")]
    DecryptionFailed,

    #[error("cookie encryption failed")]
    EncryptionFailed,

    #[error("malformed cookie header")]
    MalformedHeader,
}

/// How a cookie name is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionMode {
    Signed,
    Encrypted,
}

impl ProtectionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ProtectionMode::Signed => "signed",
            ProtectionMode::Encrypted => "encrypted",
        }
    }
}

/// Applies signing/encryption rules to cookie names.
#[derive(Debug, Clone, Default)]
pub struct CookieProtector {
    modes: HashMap<String, ProtectionMode>,
    signer: Option<Signer>,
    encrypter: Option<Encrypter>,
}

impl CookieProtector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign the named cookies.
    pub fn with_signed<I, S>(self, names: I, signer: Signer) -> Result<Self, CookieError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut this = self.register(names, ProtectionMode::Signed)?;
        this.signer = Some(signer);
        Ok(this)
    }

    /// Encrypt the named cookies.
    pub fn with_encrypted<I, S>(self, names: I, encrypter: Encrypter) -> Result<Self, CookieError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut this = self.register(names, ProtectionMode::Encrypted)?;
        this.encrypter = Some(encrypter);
        Ok(this)
    }

    fn register<I, S>(mut self, names: I, mode: ProtectionMode) -> Result<Self, CookieError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for name in names {
            let name = name.into();
            match self.modes.get(&name) {
                Some(existing) if *existing != mode => {
                    return Err(CookieError::ConflictingRules(name));
                }
                _ => {
                    self.modes.insert(name, mode);
                    added += 1;
                }
            }
        }
        if added == 0 {
            return Err(CookieError::NoCookieNames);
        }
        Ok(self)
    }

    /// Build from the two cookie sections; `None` when neither is enabled.
    pub fn from_config(
        signed: &SignedCookieConfig,
        encrypted: &EncryptedCookieConfig,
    ) -> Result<Option<Self>, CookieError> {
        if !signed.enabled && !encrypted.enabled {
            return Ok(None);
        }

        let mut protector = Self::new();
        if signed.enabled {
            protector = protector.with_signed(signed.names.iter().cloned(), Signer::from_config(signed)?)?;
        }
        if encrypted.enabled {
            protector = protector
                .with_encrypted(encrypted.names.iter().cloned(), Encrypter::from_config(encrypted)?)?;
        }
        Ok(Some(protector))
    }

    pub fn mode_for(&self, name: &str) -> Option<ProtectionMode> {
        self.modes.get(name).copied()
    }

    /// Protect an outbound value. Unprotected names pass through.
    pub fn protect(&self, name: &str, value: &str) -> Result<String, CookieError> {
        match self.mode_for(name) {
            Some(ProtectionMode::Signed) => self.signer()?.sign(value),
            Some(ProtectionMode::Encrypted) => self.encrypter()?.encrypt(name, value),
            None => Ok(value.to_string()),
        }
    }

    /// Recover an inbound value. Unprotected names pass through.
    pub fn unprotect(&self, name: &str, value: &str) -> Result<String, CookieError> {
        match self.mode_for(name) {
            Some(ProtectionMode::Signed) => self.signer()?.verify(value).map(str::to_string),
            Some(ProtectionMode::Encrypted) => self.encrypter()?.decrypt(name, value),
            None => Ok(value.to_string()),
        }
    }

    fn signer(&self) -> Result<&Signer, CookieError> {
        self.signer.as_ref().ok_or(CookieError::InvalidKey)
    }

    fn encrypter(&self) -> Result<&Encrypter, CookieError> {
        self.encrypter.as_ref().ok_or(CookieError::InvalidKey)
    }

    /// Look up a raw cookie name, returning the registered name and mode.
    fn lookup(&self, name: &[u8]) -> Option<(&str, ProtectionMode)> {
        let name = std::str::from_utf8(name).ok()?;
        self.modes
            .get_key_value(name)
            .map(|(name, mode)| (name.as_str(), *mode))
    }

    /// Rewrite the request `Cookie` headers so protected cookies carry
    /// their plaintext, and drop any that fail verification.
    ///
    /// Works on raw header bytes: unprotected fragments are forwarded
    /// byte for byte, and a protected name is only ever forwarded with a
    /// value recovered by [`unprotect`](Self::unprotect).
    pub fn apply_to_request(&self, headers: &mut HeaderMap) {
        if !headers.contains_key(COOKIE) {
            return;
        }

        let lines: Vec<HeaderValue> = headers.get_all(COOKIE).iter().cloned().collect();
        headers.remove(COOKIE);

        let mut kept: Vec<Vec<u8>> = Vec::new();
        for line in &lines {
            for fragment in header::fragments(line.as_bytes()) {
                let Some((name, mode)) = self.lookup(header::fragment_name(fragment)) else {
                    kept.push(fragment.to_vec());
                    continue;
                };
                match self.recover(name, fragment) {
                    Ok(plain) => kept.push(format!("{}={}", name, plain).into_bytes()),
                    Err(e) => {
                        tracing::debug!(
                            cookie = %name,
                            mode = mode.as_str(),
                            error = %e,
                            "Dropping cookie that failed verification"
                        );
                        metrics::record_cookie_rejected(mode.as_str());
                    }
                }
            }
        }
        if kept.is_empty() {
            return;
        }

        match HeaderValue::from_bytes(&kept.join(&b"; "[..])) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Recovered cookies do not form a valid header; dropping all");
            }
        }
    }

    /// Plaintext of one protected request fragment.
    fn recover(&self, name: &str, fragment: &[u8]) -> Result<String, CookieError> {
        let cookie = header::parse_pair(fragment).ok_or(CookieError::MalformedHeader)?;
        let plain = self.unprotect(name, cookie.value())?;
        // Must stay a single cookie value once rejoined.
        if plain.bytes().any(|b| b == b';' || (b.is_ascii_control() && b != b'\t')) {
            return Err(CookieError::MalformedHeader);
        }
        Ok(plain)
    }

    /// Protect every configured cookie in the response `Set-Cookie` headers.
    ///
    /// A protected cookie that cannot be parsed or protected is removed
    /// rather than sent in the clear.
    pub fn apply_to_response(&self, headers: &mut HeaderMap) {
        if !headers.contains_key(SET_COOKIE) {
            return;
        }

        let original: Vec<HeaderValue> = headers.get_all(SET_COOKIE).iter().cloned().collect();
        headers.remove(SET_COOKIE);

        for value in original {
            let Some((name, mode)) = self.lookup(header::set_cookie_name(value.as_bytes())) else {
                headers.append(SET_COOKIE, value);
                continue;
            };
            match self.protect_set_cookie(&value) {
                Ok(Some(protected)) => {
                    headers.append(SET_COOKIE, protected);
                }
                Ok(None) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(e) => {
                    tracing::error!(
                        cookie = %name,
                        mode = mode.as_str(),
                        error = %e,
                        "Failed to protect outgoing cookie; not sending it"
                    );
                }
            }
        }
    }

    /// `Ok(None)` when the header needs no change.
    fn protect_set_cookie(&self, value: &HeaderValue) -> Result<Option<HeaderValue>, CookieError> {
        let text = value.to_str().map_err(|_| CookieError::MalformedHeader)?;
        let cookie = SetCookie::parse(text).ok_or(CookieError::MalformedHeader)?;
        // Deletion cookies carry no value worth protecting.
        if cookie.value.is_empty() {
            return Ok(None);
        }

        let protected = self.protect(cookie.name, cookie.value)?;
        HeaderValue::try_from(cookie.with_value(&protected))
            .map(Some)
            .map_err(|_| CookieError::MalformedHeader)
    }
}
