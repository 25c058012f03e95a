use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Result, TexBuilderError};

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies manifest payloads.
///
/// The manifest only needs to know whether a document was produced by a trusted build;
/// any scheme that maps bytes to a printable signature can be plugged in.
pub trait Authenticator {
    fn sign(&self, payload: &[u8]) -> Result<String>;
    fn verify(&self, payload: &[u8], signature: &str) -> bool;
}

/// HMAC-SHA256 of the payload under a secret key, hex encoded.
#[derive(Clone)]
pub struct KeyedDigestAuthenticator {
    key: Vec<u8>,
}

impl KeyedDigestAuthenticator {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    fn mac(&self, payload: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| TexBuilderError::Signing(e.to_string()))?;
        mac.update(payload);
        Ok(mac)
    }
}

impl std::fmt::Debug for KeyedDigestAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedDigestAuthenticator")
            .field("key", &"<redacted>")
            .finish()
    }
}

impl Authenticator for KeyedDigestAuthenticator {
    fn sign(&self, payload: &[u8]) -> Result<String> {
        let tag = self.mac(payload)?.finalize().into_bytes();
        Ok(tag.iter().map(|b| format!("{b:02x}")).collect())
    }

    fn verify(&self, payload: &[u8], signature: &str) -> bool {
        let (Some(tag), Ok(mac)) = (decode_hex(signature), self.mac(payload)) else {
            return false;
        };
        mac.verify_slice(&tag).is_ok()
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
