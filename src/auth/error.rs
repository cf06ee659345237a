//! Error taxonomy for the authentication core.
//!
//! Business errors (`NotFound`, `AlreadyUsed`, `InvalidCode`, token errors)
//! map to 4xx at the HTTP boundary; infrastructure errors (`Delivery`,
//! `Store`, `Internal`) map to 500 with an opaque message. Hashes and secrets
//! never reach a response body.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user not found")]
    NotFound,

    #[error("OTP has already been used")]
    AlreadyUsed,

    #[error("invalid OTP")]
    InvalidCode,

    #[error("OTP has expired")]
    CodeExpired,

    #[error("invalid email")]
    InvalidEmail,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("notification delivery failed")]
    Delivery(#[source] anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

/// Session token verification failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("malformed token")]
    Malformed,

    #[error("bad token signature")]
    BadSignature,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential store unavailable")]
    Unavailable(#[source] anyhow::Error),
}
