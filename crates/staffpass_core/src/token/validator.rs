//! Authority-side token validation.
//!
//! # Responsibility
//! - Verify signature, expiry and single use of presented tokens.
//! - Resolve the bound subject on first presentation.
//!
//! # Invariants
//! - Checks run in order: structure, signature, expiry, nonce, subject.
//! - Expired or malformed tokens never touch the nonce ledger.
//! - Nonce consumption is a single atomic ledger operation.

use crate::clock::Clock;
use crate::config::MIN_SECRET_BYTES;
use crate::model::token::Subject;
use crate::repo::attendance_repo::SubjectDirectory;
use crate::repo::nonce_repo::{ConsumeOutcome, NonceLedger};
use crate::token::authority::{TokenAuthority, ValidationResponse};
use crate::token::codec::decode_signed;
use crate::token::{TokenError, TokenResult};
use async_trait::async_trait;
use log::{error, info, warn};
use std::sync::Arc;

/// Validates signed tokens and consumes their nonces.
pub struct TokenValidator {
    key: Vec<u8>,
    ledger: Arc<dyn NonceLedger>,
    directory: Arc<dyn SubjectDirectory>,
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
    pub fn new(
        key: impl Into<Vec<u8>>,
        ledger: Arc<dyn NonceLedger>,
        directory: Arc<dyn SubjectDirectory>,
        clock: Arc<dyn Clock>,
    ) -> TokenResult<Self> {
        let key = key.into();
        if key.len() < MIN_SECRET_BYTES {
            return Err(TokenError::Signing(format!(
                "verification key must be at least {MIN_SECRET_BYTES} bytes"
            )));
        }
        Ok(Self {
            key,
            ledger,
            directory,
            clock,
        })
    }

    /// Validates `token_text` and returns the bound subject.
    ///
    /// # Errors
    /// - `Malformed` for bad structure or signature.
    /// - `Expired` when past `expires_at`.
    /// - `AlreadyUsed` when the nonce was consumed before.
    /// - `SubjectNotFound` when the subject left the directory.
    /// - `Unavailable` when the ledger or directory fails.
    pub async fn verify(&self, token_text: &str) -> TokenResult<Subject> {
        let token = decode_signed(token_text, &self.key).map_err(|err| {
            warn!("event=token_validate module=token status=rejected reason=malformed");
            err
        })?;

        let now_ms = self.clock.now_millis();
        if token.is_expired_at(now_ms) {
            info!(
                "event=token_validate module=token status=rejected reason=expired subject_id={}",
                token.subject_id
            );
            return Err(TokenError::Expired);
        }

        let outcome = self
            .ledger
            .consume(&token.nonce, &token.subject_id, now_ms, token.expires_at)
            .await
            .map_err(|err| {
                error!(
                    "event=token_validate module=token status=error error_code=nonce_ledger_failed error={err}"
                );
                TokenError::Unavailable(err.to_string())
            })?;
        if outcome == ConsumeOutcome::AlreadyConsumed {
            warn!(
                "event=token_validate module=token status=rejected reason=replay subject_id={}",
                token.subject_id
            );
            return Err(TokenError::AlreadyUsed);
        }

        let subject = self
            .directory
            .find_subject(&token.subject_id)
            .await
            .map_err(|err| TokenError::Unavailable(err.to_string()))?
            .ok_or_else(|| TokenError::SubjectNotFound(token.subject_id.clone()))?;

        info!(
            "event=token_validate module=token status=ok subject_id={}",
            subject.id
        );
        Ok(subject)
    }

    /// Drops ledger entries of tokens that can no longer validate anyway.
    pub async fn purge_expired_nonces(&self) -> TokenResult<usize> {
        let removed = self
            .ledger
            .purge_expired(self.clock.now_millis())
            .await
            .map_err(|err| TokenError::Unavailable(err.to_string()))?;
        info!("event=nonce_purge module=token status=ok removed={removed}");
        Ok(removed)
    }
}

#[async_trait]
impl TokenAuthority for TokenValidator {
    async fn validate(&self, token_text: &str) -> ValidationResponse {
        self.verify(token_text).await.into()
    }
}
