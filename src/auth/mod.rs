//! Authentication core: OTP lifecycle, session tokens, credential storage.

use secrecy::SecretString;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

pub mod error;
pub mod notify;
pub mod otp;
pub mod service;
pub mod store;
pub mod token;

pub use error::{AuthError, StoreError, TokenError};
pub use notify::{LogNotifier, Notifier};
pub use service::{AuthService, AuthSession, SignupOutcome};
pub use store::{CredentialStore, Identity, InMemoryCredentialStore, PgCredentialStore, Role};
pub use token::SessionIssuer;

const DEFAULT_OTP_EXPIRY_SECONDS: i64 = 10 * 60;
const DEFAULT_TOKEN_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Process-wide authentication configuration, loaded once at startup.
///
/// The signing secret and hashing cost are injected here instead of living in
/// code; see the CLI for the corresponding flags and env vars.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    secret: SecretString,
    otp_expiry_seconds: i64,
    token_ttl_seconds: u64,
    bcrypt_cost: u32,
}

impl AuthConfig {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            otp_expiry_seconds: DEFAULT_OTP_EXPIRY_SECONDS,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    #[must_use]
    pub fn with_otp_expiry_seconds(mut self, seconds: i64) -> Self {
        self.otp_expiry_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: u64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    #[must_use]
    pub fn otp_expiry_seconds(&self) -> i64 {
        self.otp_expiry_seconds
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> u64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }
}

/// Identity view returned to callers: the stored record minus the OTP fields.
#[derive(Clone, Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct PublicIdentity {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub role: Role,
}

impl From<Identity> for PublicIdentity {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email,
            username: identity.username,
            display_name: identity.display_name,
            role: identity.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_and_overrides() {
        let config = AuthConfig::new(SecretString::from("secret"));
        assert_eq!(config.otp_expiry_seconds(), DEFAULT_OTP_EXPIRY_SECONDS);
        assert_eq!(config.token_ttl_seconds(), DEFAULT_TOKEN_TTL_SECONDS);
        assert_eq!(config.bcrypt_cost(), bcrypt::DEFAULT_COST);

        let config = config
            .with_otp_expiry_seconds(120)
            .with_token_ttl_seconds(3600)
            .with_bcrypt_cost(4);
        assert_eq!(config.otp_expiry_seconds(), 120);
        assert_eq!(config.token_ttl_seconds(), 3600);
        assert_eq!(config.bcrypt_cost(), 4);
    }

    #[test]
    fn public_identity_drops_otp_fields() {
        let mut identity = Identity::new("a@x.com".to_string());
        identity.otp_hash = Some("$2b$04$hash".to_string());
        identity.otp_consumed = false;

        let public = PublicIdentity::from(identity.clone());
        let json = serde_json::to_value(&public).unwrap();
        assert!(json.get("otp_hash").is_none());
        assert!(json.get("otp_consumed").is_none());
        assert_eq!(json["email"], "a@x.com");
        assert_eq!(json["role"], "standard");
    }
}
