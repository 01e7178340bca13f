//! Signed token wire codec.
//!
//! Format: `base64url(claims_json) "." base64url(hmac_sha256(key, claims_b64))`,
//! both segments without padding.

use crate::model::token::IdentityToken;
use crate::token::{TokenError, TokenResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SEGMENT_SEPARATOR: char = '.';

/// Serializes and signs `token`.
pub fn encode_signed(token: &IdentityToken, key: &[u8]) -> TokenResult<String> {
    let claims = serde_json::to_vec(token)
        .map_err(|err| TokenError::Signing(format!("claims serialization failed: {err}")))?;
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims);
    let signature = sign(claims_b64.as_bytes(), key)?;
    Ok(format!(
        "{claims_b64}{SEGMENT_SEPARATOR}{}",
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Verifies the signature of `text` and returns its claims.
///
/// Any structural problem, including a signature mismatch, is `Malformed`.
/// Expiry is not checked here.
pub fn decode_signed(text: &str, key: &[u8]) -> TokenResult<IdentityToken> {
    let (claims_b64, signature_b64) = split_segments(text.trim())
        .ok_or_else(|| TokenError::Malformed("expected two segments".to_string()))?;

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| TokenError::Malformed("signature is not base64url".to_string()))?;

    let mut mac = new_mac(key)?;
    mac.update(claims_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::Malformed("signature mismatch".to_string()))?;

    let claims = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .map_err(|_| TokenError::Malformed("claims are not base64url".to_string()))?;
    serde_json::from_slice::<IdentityToken>(&claims)
        .map_err(|_| TokenError::Malformed("claims are not valid json".to_string()))
}

/// Returns whether `text` has the two-segment signed shape.
///
/// Shape only; nothing is decoded or verified.
pub fn looks_signed(text: &str) -> bool {
    split_segments(text.trim()).is_some_and(|(claims, signature)| {
        is_base64url(claims) && is_base64url(signature)
    })
}

fn split_segments(text: &str) -> Option<(&str, &str)> {
    let (claims, signature) = text.split_once(SEGMENT_SEPARATOR)?;
    if claims.is_empty() || signature.is_empty() || signature.contains(SEGMENT_SEPARATOR) {
        return None;
    }
    Some((claims, signature))
}

fn is_base64url(segment: &str) -> bool {
    segment
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn sign(payload: &[u8], key: &[u8]) -> TokenResult<Vec<u8>> {
    let mut mac = new_mac(key)?;
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn new_mac(key: &[u8]) -> TokenResult<HmacSha256> {
    HmacSha256::new_from_slice(key).map_err(|err| TokenError::Signing(format!("invalid key: {err}")))
}
