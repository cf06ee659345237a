//! Credential store: one record per identity.
//!
//! The store is the only shared mutable state in the service. Consumption of
//! a challenge goes through [`CredentialStore::mark_otp_consumed`], an atomic
//! compare-and-set, so two concurrent redemptions can never both observe a
//! live OTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::StoreError;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Standard,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Standard => write!(f, "standard"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "standard" => Ok(Role::Standard),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Stored representation of a registered email-based account.
///
/// Invariant: `otp_consumed == true` whenever no live challenge exists; a
/// record with `otp_consumed == false` has exactly one outstanding OTP hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    /// Unique key, case-sensitive as stored.
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    /// bcrypt hash of the live OTP, if any. Plaintext is never stored.
    pub otp_hash: Option<String>,
    pub otp_consumed: bool,
    /// Epoch seconds of the last challenge issuance.
    pub otp_issued_at: Option<i64>,
}

impl Identity {
    /// A fresh identity for an unseen email: username defaults to the email,
    /// display name to its local part, role to `standard`.
    #[must_use]
    pub fn new(email: String) -> Self {
        let display_name = email
            .split('@')
            .next()
            .unwrap_or(email.as_str())
            .to_string();
        Self {
            id: Uuid::new_v4(),
            username: email.clone(),
            display_name,
            email,
            role: Role::default(),
            otp_hash: None,
            otp_consumed: true,
            otp_issued_at: None,
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;

    async fn create(&self, identity: Identity) -> Result<Identity, StoreError>;

    async fn update(&self, identity: Identity) -> Result<Identity, StoreError>;

    /// Atomically flip `otp_consumed` from `false` to `true`.
    ///
    /// Returns `false` when the flag was already set, which callers must treat
    /// as a lost race (the challenge was consumed elsewhere).
    async fn mark_otp_consumed(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_identity_defaults() {
        let identity = Identity::new("alice@example.com".to_string());
        assert_eq!(identity.email, "alice@example.com");
        assert_eq!(identity.username, "alice@example.com");
        assert_eq!(identity.display_name, "alice");
        assert_eq!(identity.role, Role::Standard);
        assert!(identity.otp_hash.is_none());
        assert!(identity.otp_consumed);
        assert!(identity.otp_issued_at.is_none());
    }

    #[test]
    fn role_round_trips_through_text() {
        assert_eq!("standard".parse::<Role>().unwrap(), Role::Standard);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::Standard.to_string(), "standard");
        assert!("root".parse::<Role>().is_err());
    }
}
