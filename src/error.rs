#[allow(unused)]
pub use anyhow::{anyhow, bail, ensure, Error};

/// Every failure reported by this crate.
///
/// Functions return `anyhow::Error`; the underlying `JWTError` can always be
/// recovered with `err.downcast_ref::<JWTError>()`.
#[derive(Debug, thiserror::Error)]
pub enum JWTError {
    #[error("Malformed token: {0}")]
    MalformedToken(String),
    #[error("Algorithm not allowed: {0}")]
    AlgorithmConfusion(String),
    #[error("Invalid key: {0}")]
    KeyConstruction(String),
    #[error("Key not found: {0}")]
    KeyNotFound(String),
    #[error("Signature verification failed")]
    SignatureVerification,
    #[error(transparent)]
    Claims(#[from] ClaimsError),
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),
}

/// Claim validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimsError {
    #[error("Invalid payload string: {0}")]
    InvalidPayload(String),
    #[error("Invalid payload string: must be a json object")]
    NotAnObject,
    #[error("Missing claim: {0}")]
    MissingClaim(String),
    #[error("Invalid claim `{claim}`: {reason}")]
    InvalidClaim { claim: String, reason: String },
    #[error("The token is not yet valid (nbf)")]
    NotYetValid,
    #[error("Signature has expired")]
    Expired,
    #[error("Invalid audience")]
    InvalidAudience,
    #[error("Invalid issuer")]
    InvalidIssuer,
    #[error("Invalid subject")]
    InvalidSubject,
    #[error("No at_hash claim in token")]
    MissingAtHash,
    #[error("No access_token provided to compare against at_hash claim")]
    MissingAccessToken,
    #[error("at_hash claim does not match access_token")]
    AtHashMismatch,
    #[error("Unable to calculate at_hash to verify against token claims")]
    AtHashUnavailable,
}

impl ClaimsError {
    pub(crate) fn invalid(claim: &str, reason: &str) -> Self {
        ClaimsError::InvalidClaim {
            claim: claim.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl JWTError {
    pub(crate) fn malformed(reason: impl ToString) -> Self {
        JWTError::MalformedToken(reason.to_string())
    }

    pub(crate) fn key(reason: impl ToString) -> Self {
        JWTError::KeyConstruction(reason.to_string())
    }
}
