// src/store/mod.rs

//! Persistence collaborators of the session engine.
//!
//! The engine only ever talks to these two traits; `PgStore` backs them with
//! Postgres in production and `MemoryStore` keeps everything in process.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{client::ClientProfile, question::Question},
    session::exam::ExamTier,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Fetches one question by its stable index.
    async fn fetch_question(&self, index: i32) -> Result<Question, StoreError>;

    /// Draws `tier.count` distinct questions of the given category and point value.
    /// May return fewer when the bank is too small; the caller decides what that means.
    async fn sample_tier(&self, tier: &ExamTier) -> Result<Vec<Question>, StoreError>;
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn get_client(&self, client_id: Uuid) -> Result<Option<ClientProfile>, StoreError>;

    /// Creates an anonymous account with a fresh practice seed and returns its id.
    async fn create_anonymous_client(&self) -> Result<Uuid, StoreError>;

    /// Persists the practice position. The stored value never decreases.
    async fn set_practice_index(&self, client_id: Uuid, index: i32) -> Result<(), StoreError>;

    /// Appends `index` to the hard list unless already present; returns the resulting list.
    async fn mark_hard_question(&self, client_id: Uuid, index: i32)
    -> Result<Vec<i32>, StoreError>;

    /// Removes `index` from the hard list if present; returns the resulting list.
    async fn unmark_hard_question(
        &self,
        client_id: Uuid,
        index: i32,
    ) -> Result<Vec<i32>, StoreError>;

    /// Hard-deletes an account. Returns false if it did not exist.
    async fn delete_client(&self, client_id: Uuid) -> Result<bool, StoreError>;

    /// Lists anonymous accounts and accounts whose name starts with `test_prefix`.
    async fn list_disposable_clients(
        &self,
        test_prefix: &str,
    ) -> Result<Vec<ClientProfile>, StoreError>;
}
