//! Request authorization.
//!
//! Two independent checks: a bearer token on the read/stream side, and a
//! shared webhook secret on ingestion. Either may be left unconfigured, in
//! which case that side is open.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const SECRET_HEADER: &str = "x-webhook-secret";

/// Returns true if a read or stream request is authorised.
pub fn read_allowed(token: Option<&str>, headers: &HeaderMap, query_token: Option<&str>) -> bool {
    let Some(expected) = token else {
        return true;
    };
    extract_bearer(headers)
        .or(query_token)
        .map(|t| t == expected)
        .unwrap_or(false)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Check an ingestion request against the configured secret.
///
/// Credentials are taken in order: HMAC signature header, plain secret
/// header, body `secret`, query `secret`. Only the first one present is
/// checked; a wrong credential is not rescued by a later one.
pub fn verify_ingest(
    secret: &str,
    headers: &HeaderMap,
    body: &[u8],
    body_secret: Option<&str>,
    query_secret: Option<&str>,
) -> Result<(), String> {
    if let Some(sig) = header_str(headers, SIGNATURE_HEADER) {
        return verify_signature(secret, sig, body);
    }

    let presented = header_str(headers, SECRET_HEADER)
        .or(body_secret)
        .or(query_secret)
        .ok_or_else(|| "missing webhook secret".to_string())?;

    if presented == secret {
        Ok(())
    } else {
        Err("webhook secret mismatch".to_string())
    }
}

/// `sha256=<hex>` HMAC of the raw body, keyed with the shared secret.
fn verify_signature(secret: &str, header: &str, body: &[u8]) -> Result<(), String> {
    let sig_hex = header
        .strip_prefix("sha256=")
        .ok_or_else(|| "malformed X-Webhook-Signature header".to_string())?;

    let expected =
        hex::decode(sig_hex).map_err(|_| "X-Webhook-Signature is not valid hex".to_string())?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| "invalid HMAC key length".to_string())?;
    mac.update(body);

    mac.verify_slice(&expected)
        .map_err(|_| "HMAC signature mismatch".to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Hex HMAC-SHA256 of `body`, as a PBX would send it.
#[cfg(test)]
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
