// src/store/memory.rs

use std::{
    collections::{BTreeMap, HashMap},
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{client::ClientProfile, question::Question},
    session::exam::ExamTier,
    store::{ClientStore, QuestionStore},
};

/// In-process implementation of both store traits.
///
/// Tier samples are deterministic (lowest indexes first). Writes can be made
/// to fail with [`MemoryStore::fail_writes`] to exercise error paths.
#[derive(Default)]
pub struct MemoryStore {
    questions: RwLock<BTreeMap<i32, Question>>,
    clients: RwLock<HashMap<Uuid, ClientProfile>>,
    anonymous_seed: RwLock<Option<i32>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_questions(questions: impl IntoIterator<Item = Question>) -> Self {
        let questions = questions.into_iter().map(|q| (q.index, q)).collect();
        Self {
            questions: RwLock::new(questions),
            ..Self::default()
        }
    }

    /// Every anonymous account created from now on gets this practice seed.
    pub async fn set_anonymous_seed(&self, seed: Option<i32>) {
        *self.anonymous_seed.write().await = seed;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn insert_client(&self, profile: ClientProfile) {
        self.clients.write().await.insert(profile.client_id, profile);
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

fn missing_client(client_id: Uuid) -> StoreError {
    StoreError::NotFound(format!("client {client_id}"))
}

#[async_trait]
impl QuestionStore for MemoryStore {
    async fn fetch_question(&self, index: i32) -> Result<Question, StoreError> {
        self.questions
            .read()
            .await
            .get(&index)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("question {index}")))
    }

    async fn sample_tier(&self, tier: &ExamTier) -> Result<Vec<Question>, StoreError> {
        Ok(self
            .questions
            .read()
            .await
            .values()
            .filter(|q| q.category == tier.category && q.points == tier.points)
            .take(tier.count)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn get_client(&self, client_id: Uuid) -> Result<Option<ClientProfile>, StoreError> {
        Ok(self.clients.read().await.get(&client_id).cloned())
    }

    async fn create_anonymous_client(&self) -> Result<Uuid, StoreError> {
        self.check_writable()?;

        let seed = match *self.anonymous_seed.read().await {
            Some(seed) => seed,
            None => rand::random::<i32>(),
        };
        let profile = ClientProfile::new_anonymous(seed);
        let client_id = profile.client_id;
        self.clients.write().await.insert(client_id, profile);

        Ok(client_id)
    }

    async fn set_practice_index(&self, client_id: Uuid, index: i32) -> Result<(), StoreError> {
        self.check_writable()?;

        let mut clients = self.clients.write().await;
        let profile = clients
            .get_mut(&client_id)
            .ok_or_else(|| missing_client(client_id))?;
        profile.practice_index = profile.practice_index.max(index);
        Ok(())
    }

    async fn mark_hard_question(
        &self,
        client_id: Uuid,
        index: i32,
    ) -> Result<Vec<i32>, StoreError> {
        self.check_writable()?;

        let mut clients = self.clients.write().await;
        let profile = clients
            .get_mut(&client_id)
            .ok_or_else(|| missing_client(client_id))?;
        if !profile.practice_hard_questions.contains(&index) {
            profile.practice_hard_questions.push(index);
        }
        Ok(profile.practice_hard_questions.clone())
    }

    async fn unmark_hard_question(
        &self,
        client_id: Uuid,
        index: i32,
    ) -> Result<Vec<i32>, StoreError> {
        self.check_writable()?;

        let mut clients = self.clients.write().await;
        let profile = clients
            .get_mut(&client_id)
            .ok_or_else(|| missing_client(client_id))?;
        profile.practice_hard_questions.retain(|&q| q != index);
        Ok(profile.practice_hard_questions.clone())
    }

    async fn delete_client(&self, client_id: Uuid) -> Result<bool, StoreError> {
        self.check_writable()?;
        Ok(self.clients.write().await.remove(&client_id).is_some())
    }

    async fn list_disposable_clients(
        &self,
        test_prefix: &str,
    ) -> Result<Vec<ClientProfile>, StoreError> {
        Ok(self
            .clients
            .read()
            .await
            .values()
            .filter(|c| c.is_disposable(test_prefix))
            .cloned()
            .collect())
    }
}
