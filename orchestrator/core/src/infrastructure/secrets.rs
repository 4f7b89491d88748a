// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Secrets-at-rest encryption for `StorageConfig::secrets`.
//!
//! Replaces the deferred OpenBao/Vault integration (`secrets_manager.rs`)
//! with a self-contained AES-256-GCM envelope: a random 96-bit nonce is
//! prepended to the ciphertext and the whole blob is base64-encoded with an
//! `encrypted:` marker prefix, so callers can tell at a glance whether a
//! `StorageSecrets` value needs decrypting before use.

use crate::domain::errors::{CoreError, CoreResult};
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key};
use base64::{engine::general_purpose::STANDARD, Engine};

const MARKER: &str = "encrypted:";

/// Reads a base64-encoded key out of an environment variable, the same
/// startup convention `CLOUDPASTE_SECRETS_KEY` uses for the AES key above.
/// `CLOUDPASTE_PROXY_SIGNING_KEY` reuses this for the HMAC key `domain::
/// proxy_signature` signs and verifies with — a distinct secret from the
/// at-rest cipher key, since a leaked signing key only forges proxy URLs
/// while a leaked cipher key exposes every stored credential.
pub fn load_key_from_env(var_name: &str) -> CoreResult<Vec<u8>> {
    let encoded = std::env::var(var_name)
        .map_err(|_| CoreError::Internal(format!("{var_name} is not set")))?;
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| CoreError::Internal(format!("{var_name} is not valid base64: {e}")))
}

#[derive(Clone)]
pub struct SecretsCipher {
    key: Key<Aes256Gcm>,
}

impl SecretsCipher {
    /// `key_bytes` must be exactly 32 bytes (AES-256). Operators supply this
    /// via `CLOUDPASTE_SECRETS_KEY`, base64-decoded at startup.
    pub fn new(key_bytes: &[u8]) -> CoreResult<Self> {
        if key_bytes.len() != 32 {
            return Err(CoreError::Internal(format!(
                "secrets key must be 32 bytes, got {}",
                key_bytes.len()
            )));
        }
        Ok(Self { key: *Key::<Aes256Gcm>::from_slice(key_bytes) })
    }

    pub fn encrypt(&self, plaintext: &str) -> CoreResult<String> {
        let cipher = Aes256Gcm::new(&self.key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ct = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CoreError::Internal(format!("encryption failed: {e}")))?;
        let mut blob = Vec::with_capacity(nonce.len() + ct.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ct);
        Ok(format!("{MARKER}{}", STANDARD.encode(blob)))
    }

    pub fn decrypt(&self, encoded: &str) -> CoreResult<String> {
        let Some(b64) = encoded.strip_prefix(MARKER) else {
            return Err(CoreError::Internal("value is not encrypted".into()));
        };
        let blob = STANDARD
            .decode(b64)
            .map_err(|e| CoreError::Internal(format!("invalid ciphertext encoding: {e}")))?;
        if blob.len() < 12 {
            return Err(CoreError::Internal("ciphertext too short".into()));
        }
        let (nonce_bytes, ct) = blob.split_at(12);
        let cipher = Aes256Gcm::new(&self.key);
        let pt = cipher
            .decrypt(nonce_bytes.into(), ct)
            .map_err(|e| CoreError::Internal(format!("decryption failed: {e}")))?;
        String::from_utf8(pt).map_err(|e| CoreError::Internal(format!("decrypted value not utf8: {e}")))
    }

    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> SecretsCipher {
        SecretsCipher::new(&[7u8; 32]).unwrap()
    }

    #[test]
    fn round_trips_plaintext() {
        let cipher = test_cipher();
        let encrypted = cipher.encrypt("s3-secret-key").unwrap();
        assert!(SecretsCipher::is_encrypted(&encrypted));
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), "s3-secret-key");
    }

    #[test]
    fn rejects_wrong_key_length() {
        assert!(SecretsCipher::new(&[0u8; 16]).is_err());
    }

    #[test]
    fn rejects_non_encrypted_input() {
        let cipher = test_cipher();
        assert!(cipher.decrypt("plain-value").is_err());
    }

    #[test]
    fn distinct_ciphertexts_for_same_plaintext() {
        let cipher = test_cipher();
        let a = cipher.encrypt("same").unwrap();
        let b = cipher.encrypt("same").unwrap();
        assert_ne!(a, b, "nonce must be fresh per call");
    }

    #[test]
    fn load_key_from_env_rejects_missing_var() {
        assert!(load_key_from_env("CLOUDPASTE_TEST_KEY_DOES_NOT_EXIST").is_err());
    }

    #[test]
    fn load_key_from_env_decodes_base64() {
        std::env::set_var("CLOUDPASTE_TEST_LOAD_KEY", STANDARD.encode(b"abc"));
        assert_eq!(load_key_from_env("CLOUDPASTE_TEST_LOAD_KEY").unwrap(), b"abc");
        std::env::remove_var("CLOUDPASTE_TEST_LOAD_KEY");
    }
}
