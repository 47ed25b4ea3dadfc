//! Token store: one Google token record per user.
//!
//! `PgTokenStore` is the production backend; `MemoryTokenStore` backs tests and
//! local runs without a database.

pub mod db;
pub mod memory;
pub mod record;

pub use db::PgTokenStore;
pub use memory::MemoryTokenStore;
pub use record::{TokenPatch, TokenRecord};

use async_trait::async_trait;

use crate::error::TokenError;

/// Document-store seam keyed by caller identity.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Fetch the record for a user, if one exists.
    async fn get(&self, user_id: &str) -> Result<Option<TokenRecord>, TokenError>;

    /// Merge-upsert a patch into the user's record and return the result.
    ///
    /// No compare-and-swap: concurrent merges for the same user race and the
    /// last write wins.
    async fn merge(&self, user_id: &str, patch: &TokenPatch) -> Result<TokenRecord, TokenError>;

    /// Remove the user's record. Returns whether one existed.
    async fn delete(&self, user_id: &str) -> Result<bool, TokenError>;
}
