// src/models/client.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Represents the 'clients' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ClientProfile {
    pub client_id: Uuid,

    /// True for accounts created implicitly by a websocket connection.
    pub is_anon: bool,

    pub name: Option<String>,

    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password_hash: Option<String>,

    #[serde(skip)]
    pub logged_ip_hashes: Vec<String>,

    /// Seed of the client's practice line.
    pub practice_seed: i32,

    /// Position in the practice line. Never decreases.
    pub practice_index: i32,

    /// Questions answered incorrectly, oldest first, no duplicates.
    pub practice_hard_questions: Vec<i32>,

    pub created_at: DateTime<Utc>,
}

impl ClientProfile {
    pub fn new_anonymous(practice_seed: i32) -> Self {
        ClientProfile {
            client_id: Uuid::new_v4(),
            is_anon: true,
            name: None,
            password_hash: None,
            logged_ip_hashes: Vec::new(),
            practice_seed,
            practice_index: 0,
            practice_hard_questions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Anonymous accounts and accounts named with the test prefix may be reaped.
    pub fn is_disposable(&self, test_prefix: &str) -> bool {
        self.is_anon || self.name.as_deref().is_some_and(|n| n.starts_with(test_prefix))
    }
}

/// Response for the practice progress endpoint.
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub client_id: Uuid,
    pub practice_index: i32,
    pub hard_questions: usize,
    pub total_questions: usize,
}
