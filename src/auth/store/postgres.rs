//! Postgres-backed credential store.
//!
//! Schema lives in `sql/schema.sql`. Every query runs inside a `db.query`
//! span; `mark_otp_consumed` is a conditional UPDATE so consumption is atomic
//! at the database.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::{CredentialStore, Identity, Role};
use crate::auth::error::StoreError;

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn identity_from_row(row: &PgRow) -> Identity {
    let role: String = row.get("role");
    Identity {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        display_name: row.get("display_name"),
        role: role.parse().unwrap_or(Role::Standard),
        otp_hash: row.get("otp_hash"),
        otp_consumed: row.get("otp_consumed"),
        otp_issued_at: row.get("otp_issued_at"),
    }
}

fn unavailable(err: sqlx::Error, what: &'static str) -> StoreError {
    StoreError::Unavailable(anyhow::Error::new(err).context(what))
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let query = r"
            SELECT id, email, username, display_name, role::text AS role,
                   otp_hash, otp_consumed, otp_issued_at
            FROM identities
            WHERE email = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| unavailable(err, "failed to lookup identity by email"))?;
        Ok(row.as_ref().map(identity_from_row))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let query = r"
            SELECT id, email, username, display_name, role::text AS role,
                   otp_hash, otp_consumed, otp_issued_at
            FROM identities
            WHERE id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| unavailable(err, "failed to lookup identity by id"))?;
        Ok(row.as_ref().map(identity_from_row))
    }

    async fn create(&self, identity: Identity) -> Result<Identity, StoreError> {
        let query = r"
            INSERT INTO identities
                (id, email, username, display_name, role, otp_hash, otp_consumed, otp_issued_at)
            VALUES ($1, $2, $3, $4, $5::identity_role, $6, $7, $8)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(identity.id)
            .bind(&identity.email)
            .bind(&identity.username)
            .bind(&identity.display_name)
            .bind(identity.role.to_string())
            .bind(&identity.otp_hash)
            .bind(identity.otp_consumed)
            .bind(identity.otp_issued_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| unavailable(err, "failed to insert identity"))?;
        Ok(identity)
    }

    async fn update(&self, identity: Identity) -> Result<Identity, StoreError> {
        let query = r"
            UPDATE identities
            SET username = $2,
                display_name = $3,
                role = $4::identity_role,
                otp_hash = $5,
                otp_consumed = $6,
                otp_issued_at = $7,
                updated_at = NOW()
            WHERE id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(identity.id)
            .bind(&identity.username)
            .bind(&identity.display_name)
            .bind(identity.role.to_string())
            .bind(&identity.otp_hash)
            .bind(identity.otp_consumed)
            .bind(identity.otp_issued_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| unavailable(err, "failed to update identity"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Unavailable(
                anyhow::anyhow!("identity {} vanished during update", identity.id)
                    .context("failed to update identity"),
            ));
        }
        Ok(identity)
    }

    async fn mark_otp_consumed(&self, id: Uuid) -> Result<bool, StoreError> {
        let query = r"
            UPDATE identities
            SET otp_consumed = TRUE,
                updated_at = NOW()
            WHERE id = $1
              AND otp_consumed = FALSE
            RETURNING id
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| unavailable(err, "failed to consume OTP"))?;
        Ok(row.is_some())
    }
}

// Connection-dependent behavior is covered by the in-memory store tests plus
// the shared service tests; wiring against a live database happens in
// deployment, not here.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_preserves_context() {
        let err = unavailable(sqlx::Error::RowNotFound, "failed to lookup identity by id");
        let StoreError::Unavailable(inner) = err;
        assert!(format!("{inner:#}").contains("failed to lookup identity by id"));
    }
}
