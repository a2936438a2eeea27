//! HMAC-SHA256 signatures for gate-issued cookies.
//!
//! A signed value is `{value}.{tag}` where `tag` is the base64url HMAC of
//! `value`. Values must be cookie-safe already; the signature is appended,
//! never mixed in.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::digest::{InvalidLength, Key};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Shortest configured secret accepted by [`GateConfig`](crate::GateConfig).
pub const MIN_SECRET_LEN: usize = 32;

/// Signs and verifies cookie values with one process-wide key.
#[derive(Clone)]
pub struct CookieSigner {
    mac: HmacSha256,
}

impl CookieSigner {
    /// Signer keyed by `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidLength`] if the MAC rejects the key.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, InvalidLength> {
        let mac = HmacSha256::new_from_slice(secret.as_ref())?;
        Ok(Self { mac })
    }

    /// Signer with a random block-sized key. Signatures do not survive a restart.
    #[must_use]
    pub fn generate() -> Self {
        let mut key = Key::<HmacSha256>::default();
        rand::rng().fill(key.as_mut_slice());
        Self {
            mac: <HmacSha256 as Mac>::new(&key),
        }
    }

    /// `value` with its signature appended.
    #[must_use]
    pub fn sign(&self, value: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(value.as_bytes());
        let tag = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{value}.{tag}")
    }

    /// The original value if `signed` carries a valid signature.
    #[must_use]
    pub fn verify<'a>(&self, signed: &'a str) -> Option<&'a str> {
        let (value, tag) = signed.rsplit_once('.')?;
        let tag = URL_SAFE_NO_PAD.decode(tag).ok()?;
        let mut mac = self.mac.clone();
        mac.update(value.as_bytes());
        // constant-time comparison
        mac.verify_slice(&tag).ok()?;
        Some(value)
    }
}

impl fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieSigner").finish_non_exhaustive()
    }
}
