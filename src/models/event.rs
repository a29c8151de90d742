// src/models/event.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::SessionError,
    models::question::{Question, QuestionData},
};

/// Raw inbound frame: `{"event": "...", "content": ...}`.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub content: serde_json::Value,
}

/// A validated client request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    GetQuestion,
    CheckAnswer(Answer),
}

impl ClientEvent {
    /// Parses a text frame.
    ///
    /// * Invalid JSON or a frame without `event` is `MalformedFrame`.
    /// * A well-formed frame with an unknown event is `UnknownEvent`.
    /// * `CHECK_ANSWER` with content other than T/N/A/B/C is `InvalidAnswer`.
    pub fn parse(text: &str) -> Result<Self, SessionError> {
        let frame: ClientFrame =
            serde_json::from_str(text).map_err(|e| SessionError::MalformedFrame(e.to_string()))?;

        match frame.event.as_str() {
            "GET_QUESTION" => Ok(ClientEvent::GetQuestion),
            "CHECK_ANSWER" => {
                let raw = frame.content.as_str().unwrap_or_default();
                Answer::parse(raw)
                    .map(ClientEvent::CheckAnswer)
                    .ok_or_else(|| SessionError::InvalidAnswer(frame.content.to_string()))
            }
            other => Err(SessionError::UnknownEvent(other.to_string())),
        }
    }
}

/// Answer given by the client. T/N for yes/no questions, A/B/C for multiple choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    T,
    N,
    A,
    B,
    C,
}

impl Answer {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "T" => Some(Answer::T),
            "N" => Some(Answer::N),
            "A" => Some(Answer::A),
            "B" => Some(Answer::B),
            "C" => Some(Answer::C),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Answer::T => "T",
            Answer::N => "N",
            Answer::A => "A",
            Answer::B => "B",
            Answer::C => "C",
        }
    }

    pub fn matches(&self, question: &Question) -> bool {
        self.as_str() == question.correct_answer.trim()
    }
}

/// Outbound frame, serialized as `{"event": "...", "content": ...}`.
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "content", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEvent {
    SetClientId(Uuid),
    QuestionData(QuestionData),
    AnswerValidation(AnswerValidation),
    AnswerReceived(AnswerReceived),
    ExamFinish(ExamResult),
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::SetClientId(_) => "SET_CLIENT_ID",
            ServerEvent::QuestionData(_) => "QUESTION_DATA",
            ServerEvent::AnswerValidation(_) => "ANSWER_VALIDATION",
            ServerEvent::AnswerReceived(_) => "ANSWER_RECEIVED",
            ServerEvent::ExamFinish(_) => "EXAM_FINISH",
            ServerEvent::Error(_) => "ERROR",
        }
    }
}

impl From<&SessionError> for ServerEvent {
    fn from(err: &SessionError) -> Self {
        ServerEvent::Error(ErrorPayload {
            code: err.code(),
            message: err.to_string(),
        })
    }
}

/// Practice answer verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerValidation {
    pub is_correct: bool,
    pub correct_answer: String,
    pub given_answer: String,
}

/// Exam answer acknowledgement. Correctness stays hidden until the exam ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerReceived {
    pub number: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncorrectAnswer {
    pub question: Question,
    pub given_answer: String,
}

/// Final exam verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamResult {
    pub result: bool,
    pub points: i32,
    pub max_points: i32,
    pub incorrect: Vec<IncorrectAnswer>,
    pub duration_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
}
