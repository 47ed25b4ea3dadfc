use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{TokenPatch, TokenRecord, TokenStore};
use crate::error::TokenError;

/// In-memory token store.
#[derive(Default)]
pub struct MemoryTokenStore {
    records: RwLock<HashMap<String, TokenRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing merge rules.
    pub async fn seed(&self, user_id: &str, record: TokenRecord) {
        self.records
            .write()
            .await
            .insert(user_id.to_string(), record);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, user_id: &str) -> Result<Option<TokenRecord>, TokenError> {
        Ok(self.records.read().await.get(user_id).cloned())
    }

    async fn merge(&self, user_id: &str, patch: &TokenPatch) -> Result<TokenRecord, TokenError> {
        let mut records = self.records.write().await;
        let merged = patch.apply(records.get(user_id)).ok_or_else(|| {
            TokenError::Internal("cannot create a token record without an access token".into())
        })?;
        records.insert(user_id.to_string(), merged.clone());
        Ok(merged)
    }

    async fn delete(&self, user_id: &str) -> Result<bool, TokenError> {
        Ok(self.records.write().await.remove(user_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_merge_creates_then_updates() {
        let store = MemoryTokenStore::new();
        let now = Utc::now();

        let created = store
            .merge(
                "uid-1",
                &TokenPatch {
                    access_token: Some("AT1".into()),
                    refresh_token: Some("RT1".into()),
                    obtained_at: Some(now),
                    updated_at: Some(now),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(created.token_type, "Bearer");

        let updated = store
            .merge(
                "uid-1",
                &TokenPatch {
                    access_token: Some("AT2".into()),
                    updated_at: Some(now),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.access_token, "AT2");
        assert_eq!(updated.refresh_token.as_deref(), Some("RT1"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_merge_without_access_token_on_empty_store_fails() {
        let store = MemoryTokenStore::new();
        let err = store
            .merge(
                "uid-1",
                &TokenPatch {
                    updated_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "internal");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let store = MemoryTokenStore::new();
        assert!(!store.delete("uid-1").await.unwrap());

        store
            .merge(
                "uid-1",
                &TokenPatch {
                    access_token: Some("AT1".into()),
                    updated_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(store.delete("uid-1").await.unwrap());
        assert!(store.get("uid-1").await.unwrap().is_none());
    }
}
