// src/session/practice.rs

use std::sync::Arc;

use rand::{SeedableRng, rngs::StdRng};
use uuid::Uuid;

use crate::{
    error::SessionError,
    models::{
        client::ClientProfile,
        event::{Answer, AnswerValidation, ServerEvent},
        question::QuestionData,
    },
    session::{PendingQuestion, hard_queue::HardQueue, sequence::practice_line},
    store::{ClientStore, QuestionStore},
};

/// Adaptive practice: walks the client's fixed line and re-tests missed
/// questions with a probability proportional to the size of the hard queue.
pub struct PracticeManager {
    client_id: Uuid,
    line: Vec<i32>,
    practice_index: i32,
    hard: HardQueue,
    total_questions: usize,
    pending: Option<PendingQuestion>,
    questions: Arc<dyn QuestionStore>,
    clients: Arc<dyn ClientStore>,
    rng: StdRng,
}

impl PracticeManager {
    pub fn new(
        profile: &ClientProfile,
        total_questions: usize,
        questions: Arc<dyn QuestionStore>,
        clients: Arc<dyn ClientStore>,
    ) -> Self {
        let line = practice_line(profile.practice_seed, total_questions);
        tracing::debug!(
            "Shuffled questions for client_id={} with seed={}, line starts with {:?}",
            profile.client_id,
            profile.practice_seed,
            &line[..line.len().min(3)]
        );

        Self {
            client_id: profile.client_id,
            line,
            practice_index: profile.practice_index,
            hard: HardQueue::new(profile.practice_hard_questions.clone()),
            total_questions,
            pending: None,
            questions,
            clients,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replaces the generator behind the hard-question draw.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn practice_index(&self) -> i32 {
        self.practice_index
    }

    pub fn hard_queue(&self) -> &HardQueue {
        &self.hard
    }

    pub fn pending(&self) -> Option<&PendingQuestion> {
        self.pending.as_ref()
    }

    /// Next question of the line; wraps around once the whole line was answered.
    fn line_question(&self) -> Result<i32, SessionError> {
        if self.line.is_empty() {
            return Err(SessionError::InvalidState(
                "practice line is empty".to_string(),
            ));
        }
        let position = self.practice_index.max(0) as usize % self.line.len();
        Ok(self.line[position])
    }

    /// Draws the next question. A pending question that was never answered is replaced.
    pub async fn provide_question(&mut self) -> Result<ServerEvent, SessionError> {
        let head = self.hard.head();
        let is_hard = head.is_some() && self.hard.should_draw(self.total_questions, &mut self.rng);

        let question_index = match head {
            Some(index) if is_hard => {
                tracing::debug!(
                    "Hard question {} inserted to the line for client_id={}",
                    index,
                    self.client_id
                );
                index
            }
            _ => self.line_question()?,
        };

        let question = self.questions.fetch_question(question_index).await?;
        let number = self.practice_index.max(0) as usize;

        let mut data = QuestionData::censored(&question, number);
        data.is_hard = Some(is_hard);
        data.total_hard = Some(self.hard.len());

        tracing::info!(
            "Sending question {} (hard: {}) to client_id={}",
            question_index,
            is_hard,
            self.client_id
        );
        self.pending = Some(PendingQuestion::new(question, number, is_hard));

        Ok(ServerEvent::QuestionData(data))
    }

    /// Evaluates the answer to the pending question.
    ///
    /// * The practice index advances (and is persisted first) only for line questions.
    /// * A wrong line question joins the hard queue; a right hard question leaves it.
    /// * If persisting the index fails, nothing changes and the question stays pending.
    pub async fn handle_answer(&mut self, answer: Answer) -> Result<ServerEvent, SessionError> {
        let pending = self.pending.take().ok_or_else(|| {
            SessionError::InvalidState("no question is awaiting an answer".to_string())
        })?;

        if !pending.is_hard {
            let next = self.practice_index + 1;
            if let Err(e) = self.clients.set_practice_index(self.client_id, next).await {
                tracing::error!(
                    "Failed to persist practice_index={} for client_id={}: {:?}",
                    next,
                    self.client_id,
                    e
                );
                self.pending = Some(pending);
                return Err(e.into());
            }
            self.practice_index = next;
        }

        let question_index = pending.question.index;
        let is_correct = answer.matches(&pending.question);

        match (is_correct, pending.is_hard) {
            (true, true) => {
                let result = self
                    .clients
                    .unmark_hard_question(self.client_id, question_index)
                    .await;
                self.apply_hard_update(result, question_index);
            }
            (false, false) => {
                let result = self
                    .clients
                    .mark_hard_question(self.client_id, question_index)
                    .await;
                self.apply_hard_update(result, question_index);
            }
            // A missed hard question stays at the head and will be retried.
            _ => {}
        }

        tracing::info!(
            "Answer {} for question {} by client_id={} is {}, answering took {} ms",
            answer.as_str(),
            question_index,
            self.client_id,
            if is_correct { "correct" } else { "incorrect" },
            pending.sent_at.elapsed().as_millis()
        );

        Ok(ServerEvent::AnswerValidation(AnswerValidation {
            is_correct,
            correct_answer: pending.question.correct_answer.trim().to_string(),
            given_answer: answer.as_str().to_string(),
        }))
    }

    fn apply_hard_update<E: std::fmt::Debug>(&mut self, result: Result<Vec<i32>, E>, index: i32) {
        match result {
            Ok(hard) => self.hard.replace(hard),
            Err(e) => tracing::error!(
                "Failed to update hard questions with {} for client_id={}: {:?}",
                index,
                self.client_id,
                e
            ),
        }
    }
}
