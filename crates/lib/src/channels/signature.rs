//! X-Line-Signature: base64(HMAC-SHA256(channel secret, raw body)).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header LINE puts the body signature in.
pub const SIGNATURE_HEADER: &str = "X-Line-Signature";

fn mac_for(secret: &str, body: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    mac
}

/// Compute the base64-encoded signature LINE would send for `body`.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    STANDARD.encode(mac_for(secret, body).finalize().into_bytes())
}

/// Verify a signature header value against the raw body. Constant-time on the digest.
/// An undecodable header never verifies.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(provided) = STANDARD.decode(signature.trim()) else {
        return false;
    };
    mac_for(secret, body).verify_slice(&provided).is_ok()
}
