//! Digest signing shared by the MD5 / HMAC providers and the order store.

use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use rand::Rng;
use rand::distr::Alphanumeric;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use paygate_types::Params;

type HmacSha256 = Hmac<Sha256>;

pub fn md5_lower(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

pub fn md5_upper(input: &str) -> String {
    md5_lower(input).to_uppercase()
}

pub fn hmac_sha256_upper(input: &str, key: &str) -> String {
    hmac_sha256_hex(input.as_bytes(), key).to_uppercase()
}

fn hmac_sha256_hex(payload: &[u8], key: &str) -> String {
    // HMAC accepts keys of any length, new_from_slice cannot fail here.
    let mut mac = match HmacSha256::new_from_slice(key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// `k=v&k=v` over the (already key-sorted) params, values not url-encoded.
pub fn sorted_query(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Sorted query with `&key=KEY` appended, the most common provider scheme.
pub fn sorted_query_with_key(params: &Params, key: &str) -> String {
    format!("{}&key={}", sorted_query(params), key)
}

/// Case-insensitive constant-time signature comparison.
pub fn sign_matches(expected: &str, given: &str) -> bool {
    let expected = expected.to_ascii_lowercase();
    let given = given.trim().to_ascii_lowercase();
    !given.is_empty() && expected.as_bytes().ct_eq(given.as_bytes()).into()
}

/// Random alphanumeric string for nonces.
pub fn nonce(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Signs a payload forwarded to the merchant's order service.
pub fn sign_payload(payload: &[u8], secret: &str) -> String {
    hmac_sha256_hex(payload, secret)
}

/// Verifies an order-service payload signature using constant-time comparison.
pub fn verify_payload_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    let expected = sign_payload(payload, secret);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}
