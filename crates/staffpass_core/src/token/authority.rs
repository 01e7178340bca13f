//! Validation authority seam and its wire response.
//!
//! The reader forwards token text verbatim to an authority and never parses
//! signed tokens itself.

use crate::model::token::Subject;
use crate::token::{TokenError, TokenResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Remote (or in-process) validator of signed tokens.
#[async_trait]
pub trait TokenAuthority: Send + Sync {
    async fn validate(&self, token_text: &str) -> ValidationResponse;
}

/// Response body of the validation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResponse {
    pub fn accepted(subject: Subject) -> Self {
        Self {
            valid: true,
            subject: Some(subject),
            error: None,
        }
    }

    pub fn rejected(error: &TokenError) -> Self {
        Self {
            valid: false,
            subject: None,
            error: Some(error.code().to_string()),
        }
    }

    /// Maps the wire response back into the error taxonomy.
    pub fn into_result(self) -> TokenResult<Subject> {
        if self.valid {
            return self.subject.ok_or_else(|| {
                TokenError::Unavailable("authority accepted without a subject".to_string())
            });
        }

        match self.error.as_deref() {
            Some("expired") => Err(TokenError::Expired),
            Some("malformed") => Err(TokenError::Malformed("rejected by authority".to_string())),
            Some("already_used") => Err(TokenError::AlreadyUsed),
            Some("subject_not_found") => Err(TokenError::SubjectNotFound(
                self.subject.map(|subject| subject.id).unwrap_or_default(),
            )),
            Some(other) => Err(TokenError::Unavailable(format!(
                "authority error `{other}`"
            ))),
            None => Err(TokenError::Unavailable(
                "authority rejected without an error code".to_string(),
            )),
        }
    }
}

impl From<TokenResult<Subject>> for ValidationResponse {
    fn from(value: TokenResult<Subject>) -> Self {
        match value {
            Ok(subject) => Self::accepted(subject),
            Err(err) => Self::rejected(&err),
        }
    }
}
