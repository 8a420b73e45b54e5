//! # Error Taxonomy
//!
//! Every failure the core can report, grouped the way callers react to them:
//!
//! - **Caller input**: the request itself is incomplete (`EmptyMessage`,
//!   `NoFactorsAndNotConfirmed`, `MissingFactor`)
//! - **Capacity**: the container does not fit the carrier (`CapacityExceeded`),
//!   always raised before a single pixel changes
//! - **Structure**: the embedded header points somewhere impossible (`CorruptContainer`)
//! - **Authentication**: a supplied factor is wrong (`WrongPassword`,
//!   `InvalidTotpCode`, `FaceMismatch`); each names its factor so the caller can
//!   re-prompt for that one input only
//!
//! Absence of a container is not an error; see
//! [`HeaderScan::NoContainer`](crate::protocol::HeaderScan).

use thiserror::Error;

use crate::factors::Factor;

/// Errors produced by the embedding and extraction pipeline.
#[derive(Debug, Error)]
pub enum StegoError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("no protection factor selected and unprotected embedding was not confirmed")]
    NoFactorsAndNotConfirmed,

    #[error("container needs {required_bits} bits but the image only has {available_bits}")]
    CapacityExceeded {
        required_bits: usize,
        available_bits: usize,
    },

    #[error("wrong password")]
    WrongPassword,

    #[error("invalid one-time code")]
    InvalidTotpCode,

    #[error("face does not match (similarity {similarity:.3})")]
    FaceMismatch { similarity: f64 },

    #[error("missing required factor: {0}")]
    MissingFactor(Factor),

    #[error("corrupt container: {0}")]
    CorruptContainer(String),

    /// AEAD tag did not verify. Raised by the cipher; the orchestrator reports
    /// it to callers as [`StegoError::WrongPassword`].
    #[error("authentication tag mismatch")]
    AuthenticationFailed,

    #[error("invalid base32 secret")]
    InvalidBase32,

    #[error("camera error: {0}")]
    Camera(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StegoError {
    /// The factor this error is about, if any.
    pub fn factor(&self) -> Option<Factor> {
        match self {
            Self::WrongPassword | Self::AuthenticationFailed => Some(Factor::Password),
            Self::InvalidTotpCode => Some(Factor::Totp),
            Self::FaceMismatch { .. } => Some(Factor::Face),
            Self::MissingFactor(factor) => Some(*factor),
            _ => None,
        }
    }

    /// True for failures caused by a wrong (not missing) factor input.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::WrongPassword
                | Self::AuthenticationFailed
                | Self::InvalidTotpCode
                | Self::FaceMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_attribution() {
        assert_eq!(StegoError::WrongPassword.factor(), Some(Factor::Password));
        assert_eq!(StegoError::InvalidTotpCode.factor(), Some(Factor::Totp));
        assert_eq!(
            StegoError::FaceMismatch { similarity: 0.5 }.factor(),
            Some(Factor::Face)
        );
        assert_eq!(
            StegoError::MissingFactor(Factor::Totp).factor(),
            Some(Factor::Totp)
        );
        assert_eq!(StegoError::EmptyMessage.factor(), None);
    }

    #[test]
    fn test_authentication_classification() {
        assert!(StegoError::WrongPassword.is_authentication_failure());
        assert!(!StegoError::MissingFactor(Factor::Password).is_authentication_failure());
        assert!(!StegoError::CorruptContainer("x".into()).is_authentication_failure());
    }

    #[test]
    fn test_display_mentions_factor() {
        let msg = StegoError::MissingFactor(Factor::Face).to_string();
        assert!(msg.contains("face"));
    }
}
