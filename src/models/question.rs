// src/models/question.rs

use serde::{Serialize, Serializer, ser::SerializeMap};
use sqlx::FromRow;

/// Knowledge domain of a question. Exam tiers are built per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionCategory {
    Basic,
    Specialist,
}

impl QuestionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionCategory::Basic => "basic",
            QuestionCategory::Specialist => "specialist",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "basic" => Some(QuestionCategory::Basic),
            "specialist" => Some(QuestionCategory::Specialist),
            _ => None,
        }
    }
}

/// Possible answers of a question.
///
/// On the wire a yes/no question is the literal string `"TN"`,
/// a multiple-choice one is an object `{"A": .., "B": .., "C": ..}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answers {
    YesNo,
    Choice { a: String, b: String, c: String },
}

impl Serialize for Answers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Answers::YesNo => serializer.serialize_str("TN"),
            Answers::Choice { a, b, c } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("A", a)?;
                map.serialize_entry("B", b)?;
                map.serialize_entry("C", c)?;
                map.end()
            }
        }
    }
}

/// Immutable question record.
///
/// Serialized in full (including `correct_answer`) only inside exam results;
/// questions in flight are sent as [`QuestionData`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub index: i32,
    pub question: String,
    pub answers: Answers,
    pub correct_answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    /// Exam point value (1, 2 or 3).
    pub points: i32,
    pub category: QuestionCategory,
}

/// Raw row of the 'questions' table.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub index: i32,
    pub question: String,
    pub answer_a: Option<String>,
    pub answer_b: Option<String>,
    pub answer_c: Option<String>,
    pub correct_answer: String,
    pub media: Option<String>,
    pub points: i32,
    pub category: String,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        // Empty first answer marks a yes/no question.
        let answers = match row.answer_a.filter(|a| !a.is_empty()) {
            Some(a) => Answers::Choice {
                a,
                b: row.answer_b.unwrap_or_default(),
                c: row.answer_c.unwrap_or_default(),
            },
            None => Answers::YesNo,
        };

        Question {
            index: row.index,
            question: row.question,
            answers,
            correct_answer: row.correct_answer,
            media: row.media.filter(|m| !m.is_empty()),
            points: row.points,
            category: QuestionCategory::parse(&row.category).unwrap_or(QuestionCategory::Basic),
        }
    }
}

/// DTO for a question sent to the client (never carries the correct answer).
#[derive(Debug, Clone, Serialize)]
pub struct QuestionData {
    pub index: i32,
    pub question: String,
    pub answers: Answers,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    pub number: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hard: Option<bool>,
    #[serde(rename = "_total_hard", skip_serializing_if = "Option::is_none")]
    pub total_hard: Option<usize>,
}

impl QuestionData {
    pub fn censored(question: &Question, number: usize) -> Self {
        QuestionData {
            index: question.index,
            question: question.question.clone(),
            answers: question.answers.clone(),
            media: question.media.clone(),
            number,
            is_hard: None,
            total_hard: None,
        }
    }
}
