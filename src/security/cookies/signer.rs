//! HMAC cookie signing.
//!
//! Signed value format: `<value>.<hex hmac(secret, value)>`. Verification
//! splits on the last `.` so values may themselves contain dots.

use std::str::FromStr;

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};

use super::CookieError;
use crate::config::SignedCookieConfig;

pub const SEPARATOR: char = '.';

/// Supported HMAC hash functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl FromStr for HashAlgorithm {
    type Err = CookieError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "sha384" | "sha-384" => Ok(HashAlgorithm::Sha384),
            "sha512" | "sha-512" => Ok(HashAlgorithm::Sha512),
            _ => Err(CookieError::UnsupportedHash(s.to_string())),
        }
    }
}

fn compute<M: Mac + KeyInit>(key: &[u8], message: &[u8]) -> Result<Vec<u8>, CookieError> {
    let mut mac = <M as Mac>::new_from_slice(key).map_err(|_| CookieError::InvalidKey)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Constant-time tag check.
fn matches<M: Mac + KeyInit>(key: &[u8], message: &[u8], tag: &[u8]) -> bool {
    match <M as Mac>::new_from_slice(key) {
        Ok(mut mac) => {
            mac.update(message);
            mac.verify_slice(tag).is_ok()
        }
        Err(_) => false,
    }
}

/// Signs and verifies cookie values with a single active secret.
#[derive(Clone)]
pub struct Signer {
    algorithm: HashAlgorithm,
    secret: Vec<u8>,
    fallbacks: Vec<Vec<u8>>,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("algorithm", &self.algorithm)
            .field("fallbacks", &self.fallbacks.len())
            .finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new(secret: &str, algorithm: HashAlgorithm) -> Result<Self, CookieError> {
        if secret.is_empty() {
            return Err(CookieError::EmptySecret);
        }
        Ok(Self {
            algorithm,
            secret: secret.as_bytes().to_vec(),
            fallbacks: Vec::new(),
        })
    }

    pub fn from_config(config: &SignedCookieConfig) -> Result<Self, CookieError> {
        let algorithm = config.hash_algo.parse()?;
        Self::new(&config.secret, algorithm)?.with_fallbacks(&config.fallback_secrets)
    }

    /// Accept values signed with older secrets during verification.
    pub fn with_fallbacks<S: AsRef<str>>(mut self, secrets: &[S]) -> Result<Self, CookieError> {
        for secret in secrets {
            let secret = secret.as_ref();
            if secret.is_empty() {
                return Err(CookieError::EmptySecret);
            }
            self.fallbacks.push(secret.as_bytes().to_vec());
        }
        Ok(self)
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    fn tag(&self, key: &[u8], value: &str) -> Result<Vec<u8>, CookieError> {
        match self.algorithm {
            HashAlgorithm::Sha256 => compute::<Hmac<Sha256>>(key, value.as_bytes()),
            HashAlgorithm::Sha384 => compute::<Hmac<Sha384>>(key, value.as_bytes()),
            HashAlgorithm::Sha512 => compute::<Hmac<Sha512>>(key, value.as_bytes()),
        }
    }

    fn tag_matches(&self, key: &[u8], value: &str, tag: &[u8]) -> bool {
        match self.algorithm {
            HashAlgorithm::Sha256 => matches::<Hmac<Sha256>>(key, value.as_bytes(), tag),
            HashAlgorithm::Sha384 => matches::<Hmac<Sha384>>(key, value.as_bytes(), tag),
            HashAlgorithm::Sha512 => matches::<Hmac<Sha512>>(key, value.as_bytes(), tag),
        }
    }

    /// Append the signature of `value` using the active secret.
    pub fn sign(&self, value: &str) -> Result<String, CookieError> {
        let tag = self.tag(&self.secret, value)?;
        Ok(format!("{}{}{}", value, SEPARATOR, hex::encode(tag)))
    }

    /// Return the original value if the signature is valid under the
    /// active secret or any fallback.
    pub fn verify<'a>(&self, signed: &'a str) -> Result<&'a str, CookieError> {
        let (value, signature) = signed
            .rsplit_once(SEPARATOR)
            .ok_or(CookieError::VerificationFailed)?;
        let tag = hex::decode(signature).map_err(|_| CookieError::VerificationFailed)?;

        let valid = std::iter::once(&self.secret)
            .chain(self.fallbacks.iter())
            .any(|key| self.tag_matches(key, value, &tag));

        if valid {
            Ok(value)
        } else {
            Err(CookieError::VerificationFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> Signer {
        Signer::new("k1", HashAlgorithm::Sha256).unwrap()
    }

    #[test]
    fn test_sign_then_verify() {
        let signer = signer();
        for value in ["", "abc", "user.42.admin", "a=b&c=d", "ünïcode"] {
            let signed = signer.sign(value).unwrap();
            assert_eq!(signer.verify(&signed).unwrap(), value);
        }
    }

    #[test]
    fn test_signature_is_hex_hmac() {
        let signed = signer().sign("hello").unwrap();
        let (value, sig) = signed.rsplit_once('.').unwrap();
        assert_eq!(value, "hello");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_missing_separator_fails() {
        assert_eq!(
            signer().verify("no-separator-here"),
            Err(CookieError::VerificationFailed)
        );
    }

    #[test]
    fn test_any_bit_flip_in_signature_fails() {
        let signer = signer();
        let signed = signer.sign("session-data").unwrap();
        let (value, sig) = signed.rsplit_once('.').unwrap();
        let tag = hex::decode(sig).unwrap();

        for byte in 0..tag.len() {
            for bit in 0..8 {
                let mut mutated = tag.clone();
                mutated[byte] ^= 1 << bit;
                let forged = format!("{}.{}", value, hex::encode(&mutated));
                assert!(signer.verify(&forged).is_err(), "byte {byte} bit {bit}");
            }
        }
    }

    #[test]
    fn test_tampered_value_fails() {
        let signer = signer();
        let signed = signer.sign("role=user").unwrap();
        let forged = signed.replacen("user", "admin", 1);
        assert!(signer.verify(&forged).is_err());
    }

    #[test]
    fn test_truncated_signature_fails() {
        let signer = signer();
        let signed = signer.sign("value").unwrap();
        assert!(signer.verify(&signed[..signed.len() - 2]).is_err());
        assert!(signer.verify("value.").is_err());
    }

    #[test]
    fn test_other_secret_or_algorithm_fails() {
        let signed = signer().sign("value").unwrap();
        let other_secret = Signer::new("k2", HashAlgorithm::Sha256).unwrap();
        let other_algo = Signer::new("k1", HashAlgorithm::Sha512).unwrap();
        assert!(other_secret.verify(&signed).is_err());
        assert!(other_algo.verify(&signed).is_err());
    }

    #[test]
    fn test_fallback_secret_verifies_but_never_signs() {
        let old = Signer::new("old", HashAlgorithm::Sha256).unwrap();
        let rotated = Signer::new("new", HashAlgorithm::Sha256)
            .unwrap()
            .with_fallbacks(&["old"])
            .unwrap();

        let legacy = old.sign("v").unwrap();
        assert_eq!(rotated.verify(&legacy).unwrap(), "v");

        let fresh = rotated.sign("v").unwrap();
        assert_ne!(fresh, legacy);
        assert!(old.verify(&fresh).is_err());
    }

    #[test]
    fn test_rejects_empty_secret_and_unknown_algorithm() {
        assert_eq!(
            Signer::new("", HashAlgorithm::Sha256).unwrap_err(),
            CookieError::EmptySecret
        );
        assert!(matches!(
            "md5".parse::<HashAlgorithm>(),
            Err(CookieError::UnsupportedHash(_))
        ));
        assert_eq!("SHA512".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
    }
}
