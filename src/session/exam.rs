// src/session/exam.rs

use std::{fmt, time::Instant};

use uuid::Uuid;

use crate::{
    error::{SessionError, StoreError},
    models::{
        event::{Answer, AnswerReceived, ExamResult, IncorrectAnswer, ServerEvent},
        question::{Question, QuestionCategory, QuestionData},
    },
    session::PendingQuestion,
    store::QuestionStore,
};

/// Number of questions in every exam.
pub const EXAM_LENGTH: usize = 32;

/// Minimum number of points to pass.
pub const PASS_THRESHOLD: i32 = 68;

/// One slice of the exam: `count` questions of a category worth `points` each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamTier {
    pub category: QuestionCategory,
    pub points: i32,
    pub count: usize,
}

impl fmt::Display for ExamTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}p", self.category.as_str(), self.points)
    }
}

/// Fixed composition of an exam, in serving order.
pub const EXAM_TIERS: [ExamTier; 6] = [
    ExamTier { category: QuestionCategory::Basic, points: 3, count: 10 },
    ExamTier { category: QuestionCategory::Basic, points: 2, count: 6 },
    ExamTier { category: QuestionCategory::Basic, points: 1, count: 4 },
    ExamTier { category: QuestionCategory::Specialist, points: 3, count: 6 },
    ExamTier { category: QuestionCategory::Specialist, points: 2, count: 4 },
    ExamTier { category: QuestionCategory::Specialist, points: 1, count: 2 },
];

/// Points available in one exam (74).
pub const MAX_POINTS: i32 = {
    let mut total = 0;
    let mut i = 0;
    while i < EXAM_TIERS.len() {
        total += EXAM_TIERS[i].points * EXAM_TIERS[i].count as i32;
        i += 1;
    }
    total
};

/// Builds exam lines from the question bank.
pub struct ExamComposer;

impl ExamComposer {
    /// Draws every tier in order. Either returns exactly [`EXAM_LENGTH`] questions
    /// or fails; a partially filled exam is never handed out.
    pub async fn compose(store: &dyn QuestionStore) -> Result<Vec<Question>, StoreError> {
        let mut line = Vec::with_capacity(EXAM_LENGTH);

        for tier in &EXAM_TIERS {
            let sample = store.sample_tier(tier).await?;
            if sample.len() < tier.count {
                return Err(StoreError::IncompleteTier {
                    tier: tier.to_string(),
                    expected: tier.count,
                    actual: sample.len(),
                });
            }

            // The tier decides what a question is worth.
            line.extend(sample.into_iter().take(tier.count).map(|mut question| {
                question.points = tier.points;
                question
            }));
        }

        Ok(line)
    }
}

/// Timed exam: every question is served exactly once, in tier order, and the
/// verdict is only revealed by `EXAM_FINISH`.
pub struct ExamManager {
    client_id: Uuid,
    line: Vec<Question>,
    line_index: usize,
    points: i32,
    incorrect: Vec<IncorrectAnswer>,
    started_at: Instant,
    pending: Option<PendingQuestion>,
    result: Option<ExamResult>,
}

impl ExamManager {
    pub async fn new(client_id: Uuid, store: &dyn QuestionStore) -> Result<Self, SessionError> {
        let line = ExamComposer::compose(store).await?;
        tracing::info!("Composed exam of {} questions for client_id={}", line.len(), client_id);
        Ok(Self::from_line(client_id, line))
    }

    pub fn from_line(client_id: Uuid, line: Vec<Question>) -> Self {
        Self {
            client_id,
            line,
            line_index: 0,
            points: 0,
            incorrect: Vec::new(),
            started_at: Instant::now(),
            pending: None,
            result: None,
        }
    }

    pub fn points(&self) -> i32 {
        self.points
    }

    pub fn pending(&self) -> Option<&PendingQuestion> {
        self.pending.as_ref()
    }

    /// Serves the next question, or the final verdict once the line is exhausted.
    /// While a question is pending it is served again instead of skipped.
    pub fn provide_question(&mut self) -> ServerEvent {
        if let Some(pending) = &self.pending {
            return ServerEvent::QuestionData(QuestionData::censored(&pending.question, pending.number));
        }

        if self.line_index >= self.line.len() {
            return ServerEvent::ExamFinish(self.finish());
        }

        let question = self.line[self.line_index].clone();
        self.line_index += 1;
        let number = self.line_index;

        tracing::debug!(
            "Sending exam question {} ({}/{}) to client_id={}",
            question.index,
            number,
            self.line.len(),
            self.client_id
        );
        let data = QuestionData::censored(&question, number);
        self.pending = Some(PendingQuestion::new(question, number, false));

        ServerEvent::QuestionData(data)
    }

    pub fn handle_answer(&mut self, answer: Answer) -> Result<ServerEvent, SessionError> {
        let pending = self.pending.take().ok_or_else(|| {
            SessionError::InvalidState("no question is awaiting an answer".to_string())
        })?;

        if answer.matches(&pending.question) {
            self.points += pending.question.points;
        } else {
            self.incorrect.push(IncorrectAnswer {
                question: pending.question,
                given_answer: answer.as_str().to_string(),
            });
        }

        Ok(ServerEvent::AnswerReceived(AnswerReceived {
            number: pending.number,
        }))
    }

    fn finish(&mut self) -> ExamResult {
        if let Some(result) = &self.result {
            return result.clone();
        }

        let result = ExamResult {
            result: self.points >= PASS_THRESHOLD,
            points: self.points,
            max_points: MAX_POINTS,
            incorrect: self.incorrect.clone(),
            duration_secs: self.started_at.elapsed().as_secs(),
        };
        tracing::info!(
            "Exam finished for client_id={}: {} points, passed: {}",
            self.client_id,
            result.points,
            result.result
        );
        self.result = Some(result.clone());
        result
    }
}
