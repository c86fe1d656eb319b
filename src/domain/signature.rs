//! HMAC signature pair for the emulated forge push event.
//!
//! Receivers verify `X-Hub-Signature-256` (and the legacy `X-Hub-Signature`)
//! against the exact transmitted body bytes, so both digests are computed over
//! the serialized payload as sent.
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

/// `sha256=<hex>` over `body` keyed with `secret`.
pub fn sha256_header(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// `sha1=<hex>` over `body` keyed with `secret`.
pub fn sha1_header(secret: &str, body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha1>::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    format!("sha1={}", hex::encode(mac.finalize().into_bytes()))
}
