//! Legacy unsigned credential support.
//!
//! Older issuers emit `base64(json {id, m, t, n, e})`. The payload is checked
//! client-side for absolute expiry and staleness only; there is no replay
//! protection, so results carry `CredentialTrust::Legacy`.

use crate::clock::Clock;
use crate::model::token::{LegacyPayload, Subject};
use crate::repo::attendance_repo::SubjectDirectory;
use crate::token::{TokenError, TokenResult};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Decodes a legacy payload; any failure is `Malformed`.
pub fn decode_legacy(raw: &str) -> TokenResult<LegacyPayload> {
    let raw = raw.trim();
    let bytes = [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(raw).ok())
        .ok_or_else(|| TokenError::Malformed("legacy payload is not base64".to_string()))?;

    let payload: LegacyPayload = serde_json::from_slice(&bytes)
        .map_err(|_| TokenError::Malformed("legacy payload is not valid json".to_string()))?;
    if payload.id.trim().is_empty() {
        return Err(TokenError::Malformed("legacy payload has empty id".to_string()));
    }
    Ok(payload)
}

/// Checks absolute expiry and staleness of a legacy payload at `now_ms`.
pub fn check_freshness(payload: &LegacyPayload, now_ms: i64, max_age: Duration) -> TokenResult<()> {
    if now_ms > payload.e {
        return Err(TokenError::Expired);
    }
    let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
    if now_ms.saturating_sub(payload.t) > max_age_ms {
        return Err(TokenError::Expired);
    }
    Ok(())
}

/// Client-side verifier for legacy payloads.
pub struct LegacyVerifier {
    directory: Arc<dyn SubjectDirectory>,
    clock: Arc<dyn Clock>,
    max_age: Duration,
}

impl LegacyVerifier {
    pub fn new(directory: Arc<dyn SubjectDirectory>, clock: Arc<dyn Clock>, max_age: Duration) -> Self {
        Self {
            directory,
            clock,
            max_age,
        }
    }

    /// Checks freshness first, then resolves the subject.
    ///
    /// Stale or expired payloads are rejected without a directory lookup.
    pub async fn verify(&self, payload: &LegacyPayload) -> TokenResult<Subject> {
        if let Err(err) = check_freshness(payload, self.clock.now_millis(), self.max_age) {
            info!(
                "event=legacy_validate module=token status=rejected reason=expired subject_id={}",
                payload.id
            );
            return Err(err);
        }

        let subject = self
            .directory
            .find_subject(&payload.id)
            .await
            .map_err(|err| TokenError::Unavailable(err.to_string()))?
            .ok_or_else(|| TokenError::SubjectNotFound(payload.id.clone()))?;

        warn!(
            "event=legacy_validate module=token status=ok trust=legacy subject_id={}",
            subject.id
        );
        Ok(subject)
    }
}
