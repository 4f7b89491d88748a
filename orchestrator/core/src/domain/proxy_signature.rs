// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HMAC-bound proxy signatures: `sig =
//! base64(HMAC-SHA256(secret, fsPath + ":" + expireTs)) + ":" + expireTs`.
//!
//! Raw HMAC-SHA256 rather than JWT/RS256: the core has no use for
//! asymmetric keys or claim sets — only a shared signing secret and a
//! bound expiry.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProxySignatureError {
    #[error("malformed signature")]
    Malformed,
    #[error("signature expired")]
    Expired,
    #[error("signature does not match")]
    Mismatch,
}

/// Produces `base64(HMAC-SHA256(secret, fsPath + ":" + expireTs))`, the raw
/// signature half (without the trailing `:expireTs`).
fn mac(secret: &[u8], fs_path: &str, expire_ts: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(fs_path.as_bytes());
    mac.update(b":");
    mac.update(expire_ts.to_string().as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Signs `fs_path` for access until `expire_ts` (ms epoch), returning the
/// full `sig:expireTs` token appended to URLs as `?sign=<sig>&ts=<ts>` is
/// handled by the caller — this returns just the `sign` value plus the
/// embedded expiry, `sig || ":" || expireTs` format.
pub fn sign(secret: &[u8], fs_path: &str, expire_ts: i64) -> String {
    format!("{}:{}", mac(secret, fs_path, expire_ts), expire_ts)
}

/// Verifies a `sig:expireTs` token against `fs_path` and the current time
/// (ms epoch). Fails on mismatch, malformed input, or an expiry in the
/// past — exactly the three failure modes named in 
pub fn verify(secret: &[u8], fs_path: &str, token: &str, now_ms: i64) -> Result<(), ProxySignatureError> {
    let (sig, ts_str) = token.rsplit_once(':').ok_or(ProxySignatureError::Malformed)?;
    let expire_ts: i64 = ts_str.parse().map_err(|_| ProxySignatureError::Malformed)?;

    if expire_ts <= now_ms {
        return Err(ProxySignatureError::Expired);
    }

    let expected = mac(secret, fs_path, expire_ts);
    let matches: bool = expected.as_bytes().ct_eq(sig.as_bytes()).into();
    if !matches {
        return Err(ProxySignatureError::Mismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-signing-secret";

    #[test]
    fn round_trips_when_not_expired() {
        let token = sign(SECRET, "/mnt/a/b.mp4", 2_000_000_000_000);
        assert!(verify(SECRET, "/mnt/a/b.mp4", &token, 1_000_000_000_000).is_ok());
    }

    #[test]
    fn fails_once_expired() {
        let token = sign(SECRET, "/mnt/a/b.mp4", 1_000);
        assert_eq!(verify(SECRET, "/mnt/a/b.mp4", &token, 2_000), Err(ProxySignatureError::Expired));
    }

    #[test]
    fn fails_on_path_mismatch() {
        let token = sign(SECRET, "/mnt/a/b.mp4", 2_000_000_000_000);
        assert_eq!(
            verify(SECRET, "/mnt/a/other.mp4", &token, 1_000_000_000_000),
            Err(ProxySignatureError::Mismatch)
        );
    }

    #[test]
    fn fails_on_malformed_token() {
        assert_eq!(verify(SECRET, "/a", "not-a-token", 0), Err(ProxySignatureError::Malformed));
    }
}
