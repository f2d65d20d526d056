//! Request signing for the executor wire protocol.
//!
//! The executor authenticates callers without a live session: the request
//! body is signed with a shared secret and the remote side recomputes the
//! signature over the exact bytes received.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256 and return hex-encoded result.
///
/// # Panics
///
/// This function will never panic in practice. The `expect` call is guarded
/// by the invariant that HMAC-SHA256 accepts keys of any size per RFC 2104.
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &[u8]) -> String {
    // INVARIANT: HMAC-SHA256 accepts keys of any size per RFC 2104, so
    // `new_from_slice` only fails if the Hmac implementation is broken.
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC-SHA256 accepts any key size");
    mac.update(message);
    let result = mac.finalize();

    hex::encode(result.into_bytes())
}
