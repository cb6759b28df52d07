use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type QuestionId = i64;
pub type TopicId = i64;
pub type UserId = i64;
pub type ReviewId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "EASY",
            Difficulty::Medium => "MEDIUM",
            Difficulty::Hard => "HARD",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EASY" => Ok(Difficulty::Easy),
            "MEDIUM" => Ok(Difficulty::Medium),
            "HARD" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// The two-valued result of answering a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Correct,
    Incorrect,
}

impl Outcome {
    pub fn is_correct(self) -> bool {
        matches!(self, Outcome::Correct)
    }
}

impl From<bool> for Outcome {
    fn from(correct: bool) -> Self {
        if correct {
            Outcome::Correct
        } else {
            Outcome::Incorrect
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub question_text: String,
    pub answer: String,
    pub topic_id: TopicId,
    pub difficulty: Difficulty,
    pub created_at: NaiveDateTime,
}

/// Content for a question that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub question_text: String,
    pub answer: String,
    pub topic_id: TopicId,
    pub difficulty: Difficulty,
}

/// One immutable entry in the review log of a (question, user) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub question_id: QuestionId,
    pub user_id: UserId,
    pub reviewed_at: NaiveDateTime,
    pub was_correct: bool,
    pub ease_factor: f64,
    pub interval_days: i64,
    pub next_review_date: NaiveDate,
}

impl Review {
    pub fn outcome(&self) -> Outcome {
        Outcome::from(self.was_correct)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReview {
    pub question_id: QuestionId,
    pub user_id: UserId,
    pub reviewed_at: NaiveDateTime,
    pub was_correct: bool,
    pub ease_factor: f64,
    pub interval_days: i64,
    pub next_review_date: NaiveDate,
}

impl NewReview {
    pub fn from_result(
        question_id: QuestionId,
        user_id: UserId,
        outcome: Outcome,
        reviewed_at: NaiveDateTime,
        result: &ReviewResult,
    ) -> Self {
        Self {
            question_id,
            user_id,
            reviewed_at,
            was_correct: outcome.is_correct(),
            ease_factor: result.ease_factor,
            interval_days: result.interval_days,
            next_review_date: result.next_review_date,
        }
    }

    pub fn with_id(self, id: ReviewId) -> Review {
        Review {
            id,
            question_id: self.question_id,
            user_id: self.user_id,
            reviewed_at: self.reviewed_at,
            was_correct: self.was_correct,
            ease_factor: self.ease_factor,
            interval_days: self.interval_days,
            next_review_date: self.next_review_date,
        }
    }
}

/// Scheduling state produced by the calculator for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub ease_factor: f64,
    pub interval_days: i64,
    pub repetitions: u32,
    pub next_review_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_reviews: usize,
    pub correct_answers: usize,
    pub due_today: usize,
    /// Percentage in `[0, 100]`.
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub topic: Topic,
    pub total_questions: usize,
    pub due: usize,
    pub unseen: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_parses_case_insensitively() {
        assert_eq!("easy".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert_eq!(" Medium ".parse::<Difficulty>(), Ok(Difficulty::Medium));
        assert_eq!("HARD".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert!("impossible".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_difficulty_serializes_uppercase() {
        let json = serde_json::to_string(&Difficulty::Medium).unwrap();
        assert_eq!(json, "\"MEDIUM\"");
    }

    #[test]
    fn test_outcome_from_bool() {
        assert_eq!(Outcome::from(true), Outcome::Correct);
        assert_eq!(Outcome::from(false), Outcome::Incorrect);
        assert!(Outcome::Correct.is_correct());
        assert!(!Outcome::Incorrect.is_correct());
    }
}
