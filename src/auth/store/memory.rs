//! In-memory credential store for tests and single-node development.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CredentialStore, Identity};
use crate::auth::error::StoreError;

/// All records live behind one mutex, which serializes every mutation.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    records: Mutex<HashMap<Uuid, Identity>>,
}

impl InMemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let records = self.records.lock().await;
        Ok(records.values().find(|record| record.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let records = self.records.lock().await;
        Ok(records.get(&id).cloned())
    }

    async fn create(&self, identity: Identity) -> Result<Identity, StoreError> {
        let mut records = self.records.lock().await;
        records.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn update(&self, identity: Identity) -> Result<Identity, StoreError> {
        let mut records = self.records.lock().await;
        records.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn mark_otp_consumed(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut records = self.records.lock().await;
        match records.get_mut(&id) {
            Some(record) if !record.otp_consumed => {
                record.otp_consumed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
