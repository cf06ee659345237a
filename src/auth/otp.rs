//! One-time-password generation and verification.
//!
//! Codes are 6-digit integers drawn uniformly from 100000..=999999. Only the
//! bcrypt hash is ever persisted; the plaintext leaves the process solely
//! through the notification channel. Verification relies on bcrypt's
//! constant-time comparison rather than any plaintext equality check.

use anyhow::{Context, Result};
use rand::Rng;
use thiserror::Error;

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OtpError {
    #[error("OTP has already been used")]
    AlreadyUsed,

    #[error("OTP does not match")]
    Mismatch,
}

/// A freshly generated challenge: the plaintext code for delivery and the
/// hash for storage.
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub code: String,
    pub hash: String,
}

/// Draw a random 6-digit code and hash it at the given bcrypt cost.
///
/// Pure generation: the caller persists the hash and delivers the code.
///
/// # Errors
/// Returns an error if bcrypt hashing fails (e.g. an out-of-range cost).
pub fn issue(cost: u32) -> Result<IssuedOtp> {
    let code = rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX).to_string();
    let hash = bcrypt::hash(&code, cost).context("failed to hash OTP")?;
    Ok(IssuedOtp { code, hash })
}

/// Verify a plaintext code against a stored hash, enforcing single use.
///
/// Fails with `AlreadyUsed` when the challenge was consumed, `Mismatch` when
/// the hash comparison fails. On success the caller must mark the record
/// consumed; verification itself is not idempotent.
///
/// # Errors
/// Returns an error if the stored hash is not a valid bcrypt string.
pub fn verify(code: &str, stored_hash: &str, consumed: bool) -> Result<Result<(), OtpError>> {
    if consumed {
        return Ok(Err(OtpError::AlreadyUsed));
    }
    let matches = bcrypt::verify(code, stored_hash).context("failed to verify OTP hash")?;
    if matches {
        Ok(Ok(()))
    } else {
        Ok(Err(OtpError::Mismatch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // bcrypt's minimum cost (4) keeps the hashing fast enough for unit tests.
    const TEST_COST: u32 = 4;

    #[test]
    fn issue_produces_six_digit_code() {
        let issued = issue(TEST_COST).unwrap();
        assert_eq!(issued.code.len(), 6);
        let value: u32 = issued.code.parse().unwrap();
        assert!((CODE_MIN..=CODE_MAX).contains(&value));
    }

    #[test]
    fn issue_never_stores_plaintext() {
        let issued = issue(TEST_COST).unwrap();
        assert!(!issued.hash.contains(&issued.code));
    }

    #[test]
    fn verify_accepts_issued_code() {
        let issued = issue(TEST_COST).unwrap();
        assert_eq!(verify(&issued.code, &issued.hash, false).unwrap(), Ok(()));
    }

    #[test]
    fn verify_rejects_wrong_code() {
        let issued = issue(TEST_COST).unwrap();
        let wrong = if issued.code == "100000" {
            "100001"
        } else {
            "100000"
        };
        assert_eq!(
            verify(wrong, &issued.hash, false).unwrap(),
            Err(OtpError::Mismatch)
        );
    }

    #[test]
    fn verify_rejects_consumed_challenge() {
        let issued = issue(TEST_COST).unwrap();
        assert_eq!(
            verify(&issued.code, &issued.hash, true).unwrap(),
            Err(OtpError::AlreadyUsed)
        );
    }

    #[test]
    fn verify_errors_on_garbage_hash() {
        assert!(verify("123456", "not-a-bcrypt-hash", false).is_err());
    }
}
