// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{
        client::ClientProfile,
        question::{Question, QuestionRow},
    },
    session::exam::ExamTier,
    store::{ClientStore, QuestionStore},
};

/// Postgres-backed implementation of both store traits.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const QUESTION_COLUMNS: &str = r#"
    "index",
    question,
    answer_a,
    answer_b,
    answer_c,
    correct_answer,
    media,
    points,
    category
"#;

const CLIENT_COLUMNS: &str = r#"
    client_id,
    is_anon,
    name,
    password_hash,
    logged_ip_hashes,
    practice_seed,
    practice_index,
    practice_hard_questions,
    created_at
"#;

#[async_trait]
impl QuestionStore for PgStore {
    async fn fetch_question(&self, index: i32) -> Result<Question, StoreError> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            r#"SELECT {QUESTION_COLUMNS} FROM questions WHERE "index" = $1"#
        ))
        .bind(index)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch question {}: {:?}", index, e);
            StoreError::from(e)
        })?;

        row.map(Question::from)
            .ok_or_else(|| StoreError::NotFound(format!("question {index}")))
    }

    async fn sample_tier(&self, tier: &ExamTier) -> Result<Vec<Question>, StoreError> {
        let rows = sqlx::query_as::<_, QuestionRow>(&format!(
            r#"
            SELECT {QUESTION_COLUMNS}
            FROM questions
            WHERE category = $1 AND points = $2
            ORDER BY RANDOM()
            LIMIT $3
            "#
        ))
        .bind(tier.category.as_str())
        .bind(tier.points)
        .bind(tier.count as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to sample exam tier {}: {:?}", tier, e);
            StoreError::from(e)
        })?;

        Ok(rows.into_iter().map(Question::from).collect())
    }
}

#[async_trait]
impl ClientStore for PgStore {
    async fn get_client(&self, client_id: Uuid) -> Result<Option<ClientProfile>, StoreError> {
        let profile = sqlx::query_as::<_, ClientProfile>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE client_id = $1"
        ))
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn create_anonymous_client(&self) -> Result<Uuid, StoreError> {
        let profile = ClientProfile::new_anonymous(rand::random::<i32>());

        sqlx::query(
            r#"
            INSERT INTO clients (client_id, is_anon, practice_seed, created_at)
            VALUES ($1, TRUE, $2, $3)
            "#,
        )
        .bind(profile.client_id)
        .bind(profile.practice_seed)
        .bind(profile.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create anonymous client: {:?}", e);
            StoreError::from(e)
        })?;

        Ok(profile.client_id)
    }

    async fn set_practice_index(&self, client_id: Uuid, index: i32) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE clients SET practice_index = GREATEST(practice_index, $2) WHERE client_id = $1",
        )
        .bind(client_id)
        .bind(index)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("client {client_id}")));
        }
        Ok(())
    }

    async fn mark_hard_question(
        &self,
        client_id: Uuid,
        index: i32,
    ) -> Result<Vec<i32>, StoreError> {
        let hard = sqlx::query_scalar::<_, Vec<i32>>(
            r#"
            UPDATE clients SET practice_hard_questions = CASE
                WHEN $2 = ANY(practice_hard_questions) THEN practice_hard_questions
                ELSE array_append(practice_hard_questions, $2)
            END
            WHERE client_id = $1
            RETURNING practice_hard_questions
            "#,
        )
        .bind(client_id)
        .bind(index)
        .fetch_optional(&self.pool)
        .await?;

        hard.ok_or_else(|| StoreError::NotFound(format!("client {client_id}")))
    }

    async fn unmark_hard_question(
        &self,
        client_id: Uuid,
        index: i32,
    ) -> Result<Vec<i32>, StoreError> {
        let hard = sqlx::query_scalar::<_, Vec<i32>>(
            r#"
            UPDATE clients SET practice_hard_questions = array_remove(practice_hard_questions, $2)
            WHERE client_id = $1
            RETURNING practice_hard_questions
            "#,
        )
        .bind(client_id)
        .bind(index)
        .fetch_optional(&self.pool)
        .await?;

        hard.ok_or_else(|| StoreError::NotFound(format!("client {client_id}")))
    }

    async fn delete_client(&self, client_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM clients WHERE client_id = $1")
            .bind(client_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_disposable_clients(
        &self,
        test_prefix: &str,
    ) -> Result<Vec<ClientProfile>, StoreError> {
        let clients = sqlx::query_as::<_, ClientProfile>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE is_anon OR name LIKE $1"
        ))
        .bind(format!("{test_prefix}%"))
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }
}
