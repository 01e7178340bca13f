//! Identity token protocol: issuance, validation, legacy fallback, rotation.
//!
//! # Responsibility
//! - Mint signed, time-boxed, single-use credentials for subjects.
//! - Validate credentials with signature, expiry and replay checks.
//! - Decode the unsigned legacy format as a lower-trust fallback.
//!
//! # Invariants
//! - A nonce validates successfully at most once.
//! - Legacy fallback is attempted only after a structural rejection, never
//!   after expiry or replay.
//! - Token text and nonces are never written to logs.

use crate::model::token::SubjectId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod authority;
pub mod codec;
pub mod credential;
pub mod issuer;
pub mod legacy;
pub mod rotation;
pub mod validator;

pub use authority::{TokenAuthority, ValidationResponse};
pub use credential::ParsedCredential;
pub use issuer::{IssuedToken, TokenIssuer};
pub use legacy::LegacyVerifier;
pub use rotation::TokenRotation;
pub use validator::TokenValidator;

pub type TokenResult<T> = Result<T, TokenError>;

/// Credential validation and issuance failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Past absolute expiry, or legacy payload older than the staleness limit.
    Expired,
    /// Structurally invalid input, including signature mismatch.
    Malformed(String),
    /// Nonce already consumed; signals a replay.
    AlreadyUsed,
    /// Credential names a subject that no longer resolves.
    SubjectNotFound(SubjectId),
    /// Validation authority could not answer.
    Unavailable(String),
    /// Issuer could not sign.
    Signing(String),
}

impl TokenError {
    /// Returns whether the failure is structural, allowing legacy fallback.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }

    /// Stable error code used on the validation wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Malformed(_) => "malformed",
            Self::AlreadyUsed => "already_used",
            Self::SubjectNotFound(_) => "subject_not_found",
            Self::Unavailable(_) | Self::Signing(_) => "unavailable",
        }
    }
}

impl Display for TokenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expired => write!(f, "token expired"),
            Self::Malformed(reason) => write!(f, "token malformed: {reason}"),
            Self::AlreadyUsed => write!(f, "token already used"),
            Self::SubjectNotFound(subject_id) => write!(f, "subject not found: {subject_id}"),
            Self::Unavailable(reason) => write!(f, "validation unavailable: {reason}"),
            Self::Signing(reason) => write!(f, "token signing failed: {reason}"),
        }
    }
}

impl Error for TokenError {}
