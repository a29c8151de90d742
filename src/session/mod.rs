// src/session/mod.rs

//! Question delivery and answer evaluation for one connection.

pub mod exam;
pub mod hard_queue;
pub mod practice;
pub mod sequence;

use std::{fmt, str::FromStr, sync::Arc, time::Instant};

use crate::{
    error::SessionError,
    models::{client::ClientProfile, event::{Answer, ServerEvent}, question::Question},
    store::{ClientStore, QuestionStore},
};

use exam::ExamManager;
use practice::PracticeManager;

/// Quiz mode selected by the websocket URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Practice,
    Exam,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Practice => "practice",
            SessionMode::Exam => "exam",
        }
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "practice" => Ok(SessionMode::Practice),
            "exam" => Ok(SessionMode::Exam),
            other => Err(format!("unknown quiz mode '{other}'")),
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The question currently awaiting an answer. At most one per connection.
#[derive(Debug, Clone)]
pub struct PendingQuestion {
    pub question: Question,
    pub number: usize,
    pub is_hard: bool,
    pub sent_at: Instant,
}

impl PendingQuestion {
    pub fn new(question: Question, number: usize, is_hard: bool) -> Self {
        Self {
            question,
            number,
            is_hard,
            sent_at: Instant::now(),
        }
    }
}

/// Mode-specific question source behind one connection.
pub enum QuestionSessionManager {
    Practice(PracticeManager),
    Exam(ExamManager),
}

impl QuestionSessionManager {
    /// Builds the manager for `mode`. Exam construction draws a full exam line
    /// and fails if the bank cannot fill every tier.
    pub async fn create(
        mode: SessionMode,
        profile: &ClientProfile,
        total_questions: usize,
        questions: Arc<dyn QuestionStore>,
        clients: Arc<dyn ClientStore>,
    ) -> Result<Self, SessionError> {
        match mode {
            SessionMode::Practice => Ok(QuestionSessionManager::Practice(PracticeManager::new(
                profile,
                total_questions,
                questions,
                clients,
            ))),
            SessionMode::Exam => Ok(QuestionSessionManager::Exam(
                ExamManager::new(profile.client_id, questions.as_ref()).await?,
            )),
        }
    }

    /// Awaiting-answer state: true while a question is pending.
    pub fn awaiting_answer(&self) -> bool {
        match self {
            QuestionSessionManager::Practice(m) => m.pending().is_some(),
            QuestionSessionManager::Exam(m) => m.pending().is_some(),
        }
    }

    pub async fn provide_question(&mut self) -> Result<ServerEvent, SessionError> {
        match self {
            QuestionSessionManager::Practice(m) => m.provide_question().await,
            QuestionSessionManager::Exam(m) => Ok(m.provide_question()),
        }
    }

    pub async fn handle_answer(&mut self, answer: Answer) -> Result<ServerEvent, SessionError> {
        if !self.awaiting_answer() {
            return Err(SessionError::InvalidState(
                "no question is awaiting an answer".to_string(),
            ));
        }

        match self {
            QuestionSessionManager::Practice(m) => m.handle_answer(answer).await,
            QuestionSessionManager::Exam(m) => m.handle_answer(answer),
        }
    }
}
