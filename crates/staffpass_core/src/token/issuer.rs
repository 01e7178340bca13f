//! Token issuance.
//!
//! # Invariants
//! - Every issued token carries a fresh random nonce.
//! - `expires_at = issued_at + ttl`.

use crate::clock::Clock;
use crate::config::MIN_SECRET_BYTES;
use crate::model::token::IdentityToken;
use crate::token::codec::encode_signed;
use crate::token::{TokenError, TokenResult};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Token together with its rendered wire text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: IdentityToken,
    /// Opaque string encoded into the scannable code.
    pub text: String,
}

/// Mints signed identity tokens.
pub struct TokenIssuer {
    key: Vec<u8>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    /// Creates an issuer signing with `key`.
    ///
    /// # Errors
    /// - `TokenError::Signing` when the key is shorter than 32 bytes or the TTL
    ///   is zero.
    pub fn new(key: impl Into<Vec<u8>>, ttl: Duration, clock: Arc<dyn Clock>) -> TokenResult<Self> {
        let key = key.into();
        if key.len() < MIN_SECRET_BYTES {
            warn!("event=issuer_init module=token status=error error_code=short_key");
            return Err(TokenError::Signing(format!(
                "signing key must be at least {MIN_SECRET_BYTES} bytes"
            )));
        }
        if ttl.is_zero() {
            return Err(TokenError::Signing("token ttl must be positive".to_string()));
        }
        Ok(Self { key, ttl, clock })
    }

    /// Issues a new token for `subject_id`.
    pub fn issue(&self, subject_id: &str) -> TokenResult<IssuedToken> {
        let subject_id = subject_id.trim();
        if subject_id.is_empty() {
            return Err(TokenError::Signing("subject id cannot be empty".to_string()));
        }

        let issued_at = self.clock.now_millis();
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let token = IdentityToken {
            subject_id: subject_id.to_string(),
            issued_at,
            expires_at: issued_at.saturating_add(ttl_ms),
            nonce: Uuid::new_v4().simple().to_string(),
        };
        let text = encode_signed(&token, &self.key)?;

        debug!(
            "event=token_issue module=token status=ok subject_id={} expires_at={}",
            token.subject_id, token.expires_at
        );
        Ok(IssuedToken { token, text })
    }
}
