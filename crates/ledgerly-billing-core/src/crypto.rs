//! Signature primitives for gateway callbacks
//!
//! The gateway signs client confirmations and webhook bodies with
//! HMAC-SHA256 and sends the MAC hex-encoded. Comparisons run in constant
//! time so a forged signature cannot be recovered byte by byte.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// HMAC-SHA256 signing secret
#[derive(Clone)]
pub struct SigningKey {
    mac: Hmac<Sha256>,
    key_len: usize,
}

impl SigningKey {
    /// Create a signing key from the configured secret.
    ///
    /// # Errors
    /// Returns error if the secret is empty.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, SigningKeyError> {
        let key_bytes = secret.as_ref();
        if key_bytes.is_empty() {
            return Err(SigningKeyError::Empty);
        }
        let mac = Hmac::<Sha256>::new_from_slice(key_bytes)
            .map_err(|_| SigningKeyError::InvalidLength)?;
        Ok(Self {
            mac,
            key_len: key_bytes.len(),
        })
    }

    /// Sign data and return the MAC bytes
    pub fn sign(&self, data: &[u8]) -> [u8; 32] {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.finalize().into_bytes().into()
    }

    /// Sign data and return the lowercase hex MAC, as the gateway sends it
    pub fn sign_hex(&self, data: &[u8]) -> String {
        hex::encode(self.sign(data))
    }

    /// Verify a hex signature in constant time. The signature must match
    /// byte for byte; surrounding whitespace is a mismatch.
    pub fn verify_hex(&self, data: &[u8], signature: &str) -> bool {
        let expected = self.sign_hex(data);
        constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_length", &self.key_len)
            .finish_non_exhaustive()
    }
}

/// Errors that can occur when creating a signing key
#[derive(Debug, Clone, thiserror::Error)]
pub enum SigningKeyError {
    #[error("signing secret is empty")]
    Empty,
    #[error("signing secret has an invalid length")]
    InvalidLength,
}

/// Message signed for a client-side payment confirmation
pub fn confirmation_payload(payment_id: &str, subscription_id: &str) -> String {
    format!("{payment_id}|{subscription_id}")
}

/// Constant-time byte slice comparison.
///
/// Slices of different length compare unequal without inspecting contents.
#[inline]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Constant-time string comparison
#[inline]
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}
