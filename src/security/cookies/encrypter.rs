//! AEAD cookie encryption.
//!
//! Encrypted value format: URL-safe base64 (no padding) of
//! `nonce (12 bytes) || ciphertext || tag (16 bytes)`. The cookie name is
//! bound as associated data, so a value minted for one cookie does not
//! decrypt under another name.

use std::str::FromStr;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::CookieError;
use crate::config::EncryptedCookieConfig;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Supported AEAD ciphers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherAlgorithm {
    Aes128Gcm,
    Aes256Gcm,
}

impl CipherAlgorithm {
    fn key_len(self) -> usize {
        match self {
            CipherAlgorithm::Aes128Gcm => 16,
            CipherAlgorithm::Aes256Gcm => 32,
        }
    }
}

impl FromStr for CipherAlgorithm {
    type Err = CookieError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aes-128-gcm" | "aes128gcm" => Ok(CipherAlgorithm::Aes128Gcm),
            "aes-256-gcm" | "aes256gcm" => Ok(CipherAlgorithm::Aes256Gcm),
            _ => Err(CookieError::UnsupportedCipher(s.to_string())),
        }
    }
}

/// Derive a fixed-size cipher key from an arbitrary secret string.
fn derive_key(secret: &str, algorithm: CipherAlgorithm) -> Vec<u8> {
    let digest = Sha256::digest(secret.as_bytes());
    digest[..algorithm.key_len()].to_vec()
}

/// Encrypts and decrypts cookie values.
#[derive(Clone)]
pub struct Encrypter {
    algorithm: CipherAlgorithm,
    key: Vec<u8>,
    fallbacks: Vec<Vec<u8>>,
}

impl std::fmt::Debug for Encrypter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encrypter")
            .field("algorithm", &self.algorithm)
            .field("fallbacks", &self.fallbacks.len())
            .finish_non_exhaustive()
    }
}

impl Encrypter {
    pub fn new(secret: &str, algorithm: CipherAlgorithm) -> Result<Self, CookieError> {
        if secret.is_empty() {
            return Err(CookieError::EmptySecret);
        }
        Ok(Self {
            algorithm,
            key: derive_key(secret, algorithm),
            fallbacks: Vec::new(),
        })
    }

    pub fn from_config(config: &EncryptedCookieConfig) -> Result<Self, CookieError> {
        let algorithm = config.algorithm.parse()?;
        Self::new(&config.secret, algorithm)?.with_fallbacks(&config.fallback_secrets)
    }

    /// Accept values encrypted under older secrets during decryption.
    pub fn with_fallbacks<S: AsRef<str>>(mut self, secrets: &[S]) -> Result<Self, CookieError> {
        for secret in secrets {
            let secret = secret.as_ref();
            if secret.is_empty() {
                return Err(CookieError::EmptySecret);
            }
            self.fallbacks.push(derive_key(secret, self.algorithm));
        }
        Ok(self)
    }

    pub fn algorithm(&self) -> CipherAlgorithm {
        self.algorithm
    }

    fn seal(&self, nonce: &[u8], name: &str, value: &str) -> Result<Vec<u8>, CookieError> {
        let nonce = Nonce::from_slice(nonce);
        let payload = Payload {
            msg: value.as_bytes(),
            aad: name.as_bytes(),
        };
        let sealed = match self.algorithm {
            CipherAlgorithm::Aes128Gcm => Aes128Gcm::new_from_slice(&self.key)
                .map_err(|_| CookieError::InvalidKey)?
                .encrypt(nonce, payload),
            CipherAlgorithm::Aes256Gcm => Aes256Gcm::new_from_slice(&self.key)
                .map_err(|_| CookieError::InvalidKey)?
                .encrypt(nonce, payload),
        };
        sealed.map_err(|_| CookieError::EncryptionFailed)
    }

    fn open(&self, key: &[u8], nonce: &[u8], name: &str, ciphertext: &[u8]) -> Option<Vec<u8>> {
        let nonce = Nonce::from_slice(nonce);
        let payload = Payload {
            msg: ciphertext,
            aad: name.as_bytes(),
        };
        match self.algorithm {
            CipherAlgorithm::Aes128Gcm => Aes128Gcm::new_from_slice(key).ok()?.decrypt(nonce, payload).ok(),
            CipherAlgorithm::Aes256Gcm => Aes256Gcm::new_from_slice(key).ok()?.decrypt(nonce, payload).ok(),
        }
    }

    /// Encrypt `value` for the cookie called `name` with a fresh random nonce.
    pub fn encrypt(&self, name: &str, value: &str) -> Result<String, CookieError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let sealed = self.seal(&nonce, name, value)?;
        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    /// Authenticate and decrypt; any malformed or forged input fails.
    pub fn decrypt(&self, name: &str, encoded: &str) -> Result<String, CookieError> {
        let raw = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| CookieError::DecryptionFailed)?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(CookieError::DecryptionFailed);
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);

        let plaintext = std::iter::once(&self.key)
            .chain(self.fallbacks.iter())
            .find_map(|key| self.open(key, nonce, name, ciphertext))
            .ok_or(CookieError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CookieError::DecryptionFailed)
    }
}
