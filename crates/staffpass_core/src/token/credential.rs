//! Classification of raw decoded strings.

use crate::model::token::LegacyPayload;
use crate::token::codec::looks_signed;
use crate::token::legacy::decode_legacy;

/// What a raw decoded string looks like to the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCredential {
    /// Two-segment signed token; only the authority can check it.
    Signed(String),
    /// Decodable legacy payload.
    Legacy(LegacyPayload),
    Unrecognized,
}

impl ParsedCredential {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::Unrecognized;
        }
        if looks_signed(raw) {
            return Self::Signed(raw.to_string());
        }
        match decode_legacy(raw) {
            Ok(payload) => Self::Legacy(payload),
            Err(_) => Self::Unrecognized,
        }
    }
}
