//! Session token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying the identity id (`sub`) and an absolute
//! expiry. Signing is stateless; a token verifies only before its expiry and
//! only against the secret in force at issuance. No revocation list.

use anyhow::{Context, Result};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, get_current_timestamp, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::TokenError;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    iat: u64,
    exp: u64,
}

pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: u64,
}

impl SessionIssuer {
    #[must_use]
    pub fn new(secret: &SecretString, ttl_seconds: u64) -> Self {
        let secret_bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret_bytes),
            decoding: DecodingKey::from_secret(secret_bytes),
            ttl_seconds,
        }
    }

    /// Mint a signed token for the identity, expiring `ttl_seconds` from now.
    ///
    /// # Errors
    /// Returns an error if JWT encoding fails.
    pub fn issue(&self, identity_id: Uuid) -> Result<String> {
        self.issue_at(identity_id, get_current_timestamp())
    }

    fn issue_at(&self, identity_id: Uuid, issued_at: u64) -> Result<String> {
        let claims = Claims {
            sub: identity_id,
            iat: issued_at,
            exp: issued_at + self.ttl_seconds,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("failed to sign session token")
    }

    /// Verify a token and return the embedded identity id.
    ///
    /// # Errors
    /// `Expired` past the embedded expiry, `BadSignature` when the signature
    /// does not match, `Malformed` for anything structurally invalid.
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => Ok(data.claims.sub),
            Err(err) => Err(match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer(ttl_seconds: u64) -> SessionIssuer {
        SessionIssuer::new(&SecretString::from("test-secret"), ttl_seconds)
    }

    #[test]
    fn issue_and_verify_round_trip() {
        let issuer = issuer(3600);
        let id = Uuid::new_v4();
        let token = issuer.issue(id).unwrap();
        assert_eq!(issuer.verify(&token), Ok(id));
    }

    #[test]
    fn expired_token_rejected() {
        let issuer = issuer(60);
        let id = Uuid::new_v4();
        let token = issuer
            .issue_at(id, get_current_timestamp() - 120)
            .unwrap();
        assert_eq!(issuer.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn tampered_signature_rejected() {
        let issuer = issuer(3600);
        let token = issuer.issue(Uuid::new_v4()).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        let tampered_signature = if parts[2].starts_with('A') {
            "B".to_string() + &parts[2][1..]
        } else {
            "A".to_string() + &parts[2][1..]
        };
        parts[2] = &tampered_signature;
        let tampered = parts.join(".");
        assert_eq!(issuer.verify(&tampered), Err(TokenError::BadSignature));
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = issuer(3600).issue(Uuid::new_v4()).unwrap();
        let other = SessionIssuer::new(&SecretString::from("other-secret"), 3600);
        assert_eq!(other.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn garbage_token_malformed() {
        let issuer = issuer(3600);
        assert_eq!(issuer.verify("not-a-jwt"), Err(TokenError::Malformed));
        assert_eq!(issuer.verify(""), Err(TokenError::Malformed));
    }
}
