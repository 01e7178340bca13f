//! Identity token and subject models.
//!
//! # Responsibility
//! - Define the signed token claims and the legacy unsigned payload shape.
//! - Define the resolved subject returned by a successful validation.
//!
//! # Invariants
//! - Timestamps are Unix epoch milliseconds.
//! - `expires_at > issued_at` for every issued token.

use serde::{Deserialize, Serialize};

/// Stable identifier of a staff member.
pub type SubjectId = String;

/// Stable identifier of a school unit (reading site).
pub type UnitId = String;

/// Short-lived, single-use identity credential.
///
/// Serialized with compact claim names because it is embedded in a scannable
/// code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityToken {
    #[serde(rename = "sub")]
    pub subject_id: SubjectId,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
    /// Random value consumed by the validator on first presentation.
    pub nonce: String,
}

impl IdentityToken {
    /// Returns whether the token is past its expiry at `now_ms`.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at
    }
}

/// Staff member resolved from a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub display_name: String,
    pub matricula: String,
    /// Home unit the subject is expected to check in at.
    pub unit_id: UnitId,
}

/// Unsigned payload emitted by older issuers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyPayload {
    /// Subject id.
    pub id: SubjectId,
    /// Matricula.
    pub m: String,
    /// Issue time, epoch milliseconds.
    pub t: i64,
    /// Display name.
    pub n: String,
    /// Absolute expiry, epoch milliseconds.
    pub e: i64,
}

/// Trust level of a validated credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialTrust {
    /// Signed token validated and consumed by the authority.
    Verified,
    /// Legacy payload checked client-side only; no replay protection.
    Legacy,
}
