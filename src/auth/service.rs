//! The auth service: signup-or-challenge, challenge redemption, identity
//! lookup by token.
//!
//! State machine per identity:
//! `Unregistered -> Registered(otp_consumed) -> ChallengeIssued -> Registered`
//! in a loop. Issuing a new challenge overwrites any prior live one; a failed
//! hash comparison leaves the challenge live so the caller may retry.

use anyhow::Context;
use regex::Regex;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use uuid::Uuid;

use super::error::AuthError;
use super::notify::Notifier;
use super::otp::{self, IssuedOtp, OtpError};
use super::store::{CredentialStore, Identity};
use super::token::SessionIssuer;
use super::{AuthConfig, PublicIdentity};

/// Distinguishes a first signup (201) from a re-authentication (200).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignupOutcome {
    SignedUp,
    ChallengeSent,
}

/// A successful redemption: the bearer token plus the identity it names.
#[derive(Clone, Debug)]
pub struct AuthSession {
    pub token: String,
    pub user: PublicIdentity,
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
    issuer: SessionIssuer,
    config: AuthConfig,
}

impl AuthService {
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
        config: AuthConfig,
    ) -> Self {
        let issuer = SessionIssuer::new(config.secret(), config.token_ttl_seconds());
        Self {
            store,
            notifier,
            issuer,
            config,
        }
    }

    /// Create the identity if the email is unseen, then issue a fresh OTP and
    /// deliver it out-of-band. An existing identity gets its live challenge
    /// overwritten. The plaintext code never appears in any return value.
    ///
    /// # Errors
    /// `InvalidEmail` for a malformed address, `Store` / `Delivery` when a
    /// collaborator fails.
    pub async fn signup_or_challenge(&self, email: &str) -> Result<SignupOutcome, AuthError> {
        let email = email.trim();
        if !valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }

        let issued = self.hash_new_code().await?;

        match self.store.find_by_email(email).await? {
            Some(mut identity) => {
                identity.otp_hash = Some(issued.hash);
                identity.otp_consumed = false;
                identity.otp_issued_at = Some(now_epoch());
                let identity = self.store.update(identity).await?;

                self.notifier
                    .send(
                        email,
                        "Login OTP",
                        &format!("Your login OTP is: {}", issued.code),
                    )
                    .map_err(AuthError::Delivery)?;

                info!(identity_id = %identity.id, "login challenge issued");
                Ok(SignupOutcome::ChallengeSent)
            }
            None => {
                let mut identity = Identity::new(email.to_string());
                identity.otp_hash = Some(issued.hash);
                identity.otp_consumed = false;
                identity.otp_issued_at = Some(now_epoch());
                let identity = self.store.create(identity).await?;

                self.notifier
                    .send(
                        email,
                        "Welcome to our App",
                        &format!(
                            "Welcome, {email}! Thank you for signing up. Your OTP is: {}",
                            issued.code
                        ),
                    )
                    .map_err(AuthError::Delivery)?;

                info!(identity_id = %identity.id, "identity created, welcome challenge issued");
                Ok(SignupOutcome::SignedUp)
            }
        }
    }

    /// Exchange a live OTP for a session token.
    ///
    /// A hash mismatch leaves the challenge live (`InvalidCode`, retry
    /// permitted); consumption is a compare-and-set on the store, so of two
    /// concurrent redemptions exactly one wins.
    ///
    /// # Errors
    /// `NotFound`, `AlreadyUsed`, `CodeExpired`, `InvalidCode`, or an
    /// infrastructure error.
    pub async fn redeem_challenge(&self, email: &str, code: &str) -> Result<AuthSession, AuthError> {
        let Some(identity) = self.store.find_by_email(email.trim()).await? else {
            return Err(AuthError::NotFound);
        };

        if identity.otp_consumed {
            return Err(AuthError::AlreadyUsed);
        }
        let Some(stored_hash) = identity.otp_hash.clone() else {
            return Err(AuthError::AlreadyUsed);
        };

        if let Some(issued_at) = identity.otp_issued_at {
            if now_epoch() > issued_at + self.config.otp_expiry_seconds() {
                return Err(AuthError::CodeExpired);
            }
        }

        let code = code.trim().to_string();
        let verdict = tokio::task::spawn_blocking(move || otp::verify(&code, &stored_hash, false))
            .await
            .context("OTP verification task failed")
            .map_err(AuthError::Internal)?
            .map_err(AuthError::Internal)?;

        match verdict {
            Ok(()) => {}
            Err(OtpError::Mismatch) => return Err(AuthError::InvalidCode),
            Err(OtpError::AlreadyUsed) => return Err(AuthError::AlreadyUsed),
        }

        // The CAS is the single point deciding which redemption wins.
        if !self.store.mark_otp_consumed(identity.id).await? {
            return Err(AuthError::AlreadyUsed);
        }

        let token = self
            .issuer
            .issue(identity.id)
            .map_err(AuthError::Internal)?;
        info!(identity_id = %identity.id, "challenge redeemed, session issued");

        Ok(AuthSession {
            token,
            user: identity.into(),
        })
    }

    /// Resolve a bearer token back to its identity.
    ///
    /// # Errors
    /// A token error when verification fails, `NotFound` when the referenced
    /// identity no longer exists.
    pub async fn resolve_identity(&self, token: &str) -> Result<PublicIdentity, AuthError> {
        let identity_id: Uuid = self.issuer.verify(token.trim())?;
        match self.store.find_by_id(identity_id).await? {
            Some(identity) => Ok(identity.into()),
            None => Err(AuthError::NotFound),
        }
    }

    /// bcrypt is CPU-bound; run it on the blocking pool so unrelated requests
    /// keep flowing.
    async fn hash_new_code(&self) -> Result<IssuedOtp, AuthError> {
        let cost = self.config.bcrypt_cost();
        tokio::task::spawn_blocking(move || otp::issue(cost))
            .await
            .context("OTP issuance task failed")
            .map_err(AuthError::Internal)?
            .map_err(AuthError::Internal)
    }
}

/// Basic shape check; addresses are otherwise stored as given
/// (case-sensitive).
fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::error::TokenError;
    use crate::auth::store::{InMemoryCredentialStore, Role};
    use anyhow::{anyhow, Result};
    use secrecy::SecretString;
    use std::sync::Mutex;

    struct RecordingNotifier {
        messages: Mutex<Vec<(String, String, String)>>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                messages: Mutex::new(Vec::new()),
            }
        }

        fn last_code(&self) -> String {
            let messages = self.messages.lock().unwrap();
            let (_, _, body) = messages.last().expect("no notification recorded");
            Regex::new(r"\d{6}")
                .unwrap()
                .find(body)
                .expect("no code in notification body")
                .as_str()
                .to_string()
        }

        fn last_subject(&self) -> String {
            let messages = self.messages.lock().unwrap();
            messages.last().expect("no notification recorded").1.clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<()> {
            self.messages.lock().unwrap().push((
                to_email.to_string(),
                subject.to_string(),
                body.to_string(),
            ));
            Ok(())
        }
    }

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn send(&self, _to_email: &str, _subject: &str, _body: &str) -> Result<()> {
            Err(anyhow!("smtp unreachable"))
        }
    }

    fn test_config() -> AuthConfig {
        // bcrypt's minimum cost (4) keeps hashing fast enough for unit tests.
        AuthConfig::new(SecretString::from("test-secret")).with_bcrypt_cost(4)
    }

    fn service_with(
        notifier: Arc<dyn Notifier>,
        config: AuthConfig,
    ) -> (AuthService, Arc<InMemoryCredentialStore>) {
        let store = Arc::new(InMemoryCredentialStore::new());
        let service = AuthService::new(store.clone(), notifier, config);
        (service, store)
    }

    #[tokio::test]
    async fn signup_creates_identity_with_defaults() -> Result<()> {
        let notifier = Arc::new(RecordingNotifier::new());
        let (service, store) = service_with(notifier.clone(), test_config());

        let outcome = service.signup_or_challenge("a@x.com").await?;
        assert_eq!(outcome, SignupOutcome::SignedUp);
        assert_eq!(notifier.last_subject(), "Welcome to our App");

        let identity = store.find_by_email("a@x.com").await?.expect("missing");
        assert_eq!(identity.role, Role::Standard);
        assert_eq!(identity.username, "a@x.com");
        assert_eq!(identity.display_name, "a");
        assert!(!identity.otp_consumed);
        assert!(identity.otp_hash.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn code_is_delivered_out_of_band_only() -> Result<()> {
        let notifier = Arc::new(RecordingNotifier::new());
        let (service, store) = service_with(notifier.clone(), test_config());

        service.signup_or_challenge("a@x.com").await?;
        let code = notifier.last_code();

        // The stored record holds a hash, never the plaintext.
        let identity = store.find_by_email("a@x.com").await?.expect("missing");
        assert_ne!(identity.otp_hash.as_deref(), Some(code.as_str()));
        Ok(())
    }

    #[tokio::test]
    async fn full_scenario_signup_redeem_replay() -> Result<()> {
        let notifier = Arc::new(RecordingNotifier::new());
        let (service, _store) = service_with(notifier.clone(), test_config());

        service.signup_or_challenge("a@x.com").await?;
        let code = notifier.last_code();
        let wrong = if code == "100000" { "100001" } else { "100000" };

        // Wrong code: InvalidCode, challenge stays live.
        assert!(matches!(
            service.redeem_challenge("a@x.com", wrong).await,
            Err(AuthError::InvalidCode)
        ));

        // Correct code redeems exactly once.
        let session = service.redeem_challenge("a@x.com", &code).await?;
        assert_eq!(session.user.email, "a@x.com");
        assert!(!session.token.is_empty());

        // Replay of the same code is rejected.
        assert!(matches!(
            service.redeem_challenge("a@x.com", &code).await,
            Err(AuthError::AlreadyUsed)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn redeem_unknown_email_not_found() {
        let (service, _store) = service_with(Arc::new(RecordingNotifier::new()), test_config());
        assert!(matches!(
            service.redeem_challenge("ghost@x.com", "123456").await,
            Err(AuthError::NotFound)
        ));
    }

    #[tokio::test]
    async fn fresh_challenge_overwrites_previous() -> Result<()> {
        let notifier = Arc::new(RecordingNotifier::new());
        let (service, _store) = service_with(notifier.clone(), test_config());

        service.signup_or_challenge("a@x.com").await?;
        let first_code = notifier.last_code();

        let outcome = service.signup_or_challenge("a@x.com").await?;
        assert_eq!(outcome, SignupOutcome::ChallengeSent);
        assert_eq!(notifier.last_subject(), "Login OTP");
        let second_code = notifier.last_code();

        if first_code != second_code {
            assert!(matches!(
                service.redeem_challenge("a@x.com", &first_code).await,
                Err(AuthError::InvalidCode)
            ));
        }
        let session = service.redeem_challenge("a@x.com", &second_code).await?;
        assert_eq!(session.user.email, "a@x.com");
        Ok(())
    }

    #[tokio::test]
    async fn expired_challenge_rejected() -> Result<()> {
        let notifier = Arc::new(RecordingNotifier::new());
        let (service, store) = service_with(
            notifier.clone(),
            test_config().with_otp_expiry_seconds(600),
        );

        service.signup_or_challenge("a@x.com").await?;
        let code = notifier.last_code();

        let mut identity = store.find_by_email("a@x.com").await?.expect("missing");
        identity.otp_issued_at = Some(now_epoch() - 3600);
        store.update(identity).await?;

        assert!(matches!(
            service.redeem_challenge("a@x.com", &code).await,
            Err(AuthError::CodeExpired)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_redemptions_single_winner() -> Result<()> {
        let notifier = Arc::new(RecordingNotifier::new());
        let (service, _store) = service_with(notifier.clone(), test_config());

        service.signup_or_challenge("a@x.com").await?;
        let code = notifier.last_code();

        let (first, second) = tokio::join!(
            service.redeem_challenge("a@x.com", &code),
            service.redeem_challenge("a@x.com", &code)
        );
        let successes = [&first, &second]
            .iter()
            .filter(|result| result.is_ok())
            .count();
        assert_eq!(successes, 1);
        for result in [first, second] {
            if let Err(err) = result {
                assert!(matches!(err, AuthError::AlreadyUsed));
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn session_token_resolves_same_identity() -> Result<()> {
        let notifier = Arc::new(RecordingNotifier::new());
        let (service, _store) = service_with(notifier.clone(), test_config());

        service.signup_or_challenge("a@x.com").await?;
        let code = notifier.last_code();
        let session = service.redeem_challenge("a@x.com", &code).await?;

        let resolved = service.resolve_identity(&session.token).await?;
        assert_eq!(resolved, session.user);
        Ok(())
    }

    #[tokio::test]
    async fn tampered_token_unauthenticated() -> Result<()> {
        let notifier = Arc::new(RecordingNotifier::new());
        let (service, _store) = service_with(notifier.clone(), test_config());

        service.signup_or_challenge("a@x.com").await?;
        let code = notifier.last_code();
        let session = service.redeem_challenge("a@x.com", &code).await?;

        let mut tampered = session.token.clone();
        tampered.pop();
        let result = service.resolve_identity(&tampered).await;
        assert!(matches!(
            result,
            Err(AuthError::Token(
                TokenError::BadSignature | TokenError::Malformed
            ))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn token_for_missing_identity_not_found() {
        let (service, _store) = service_with(Arc::new(RecordingNotifier::new()), test_config());
        let token = service.issuer.issue(Uuid::new_v4()).unwrap();
        assert!(matches!(
            service.resolve_identity(&token).await,
            Err(AuthError::NotFound)
        ));
    }

    #[tokio::test]
    async fn delivery_failure_surfaces() {
        let (service, store) = service_with(Arc::new(FailingNotifier), test_config());
        let result = service.signup_or_challenge("a@x.com").await;
        assert!(matches!(result, Err(AuthError::Delivery(_))));

        // The record was saved before delivery failed; the challenge stays live.
        let identity = store.find_by_email("a@x.com").await.unwrap();
        assert!(identity.is_some_and(|identity| !identity.otp_consumed));
    }

    #[tokio::test]
    async fn invalid_email_rejected() {
        let (service, _store) = service_with(Arc::new(RecordingNotifier::new()), test_config());
        for email in ["", "not-an-email", "missing@domain", "a b@x.com"] {
            assert!(
                matches!(
                    service.signup_or_challenge(email).await,
                    Err(AuthError::InvalidEmail)
                ),
                "accepted: {email}"
            );
        }
    }

    #[test]
    fn valid_email_shape_check() {
        assert!(valid_email("a@x.com"));
        assert!(valid_email("name.surname@example.co"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
    }
}
