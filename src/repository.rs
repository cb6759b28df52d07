use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;

use crate::error::Result;
use crate::models::{NewReview, Question, QuestionId, Review, Topic, TopicId, UserId};

/// Storage capability the scheduler runs against.
///
/// Lookups return `Ok(None)` for absent records. Review listings are ordered
/// most-recent-first (`reviewed_at` descending, later inserts first on ties).
#[async_trait]
pub trait Repository: Send + Sync {
    async fn find_question(&self, id: QuestionId) -> Result<Option<Question>>;

    /// All questions in ascending id order.
    async fn list_questions(&self) -> Result<Vec<Question>>;

    async fn list_questions_by_topic(&self, topic_id: TopicId) -> Result<Vec<Question>>;

    async fn list_topics(&self) -> Result<Vec<Topic>>;

    async fn find_latest_review(
        &self,
        question_id: QuestionId,
        user_id: UserId,
    ) -> Result<Option<Review>>;

    async fn list_reviews_for_user(&self, user_id: UserId) -> Result<Vec<Review>>;

    async fn list_reviews_for_question(&self, question_id: QuestionId) -> Result<Vec<Review>>;

    async fn insert_review(&self, review: NewReview) -> Result<Review>;

    /// Questions whose latest review by `user_id` is due on or before `as_of`,
    /// in ascending id order.
    ///
    /// Backends may override this with a query; the result must match.
    async fn list_due_question_ids(&self, user_id: UserId, as_of: NaiveDate) -> Result<Vec<QuestionId>> {
        let reviews = self.list_reviews_for_user(user_id).await?;
        Ok(due_question_ids(&reviews, as_of))
    }
}

/// Picks the latest review per question from a most-recent-first listing and
/// keeps the questions that are due.
pub fn due_question_ids(reviews: &[Review], as_of: NaiveDate) -> Vec<QuestionId> {
    let mut seen = HashSet::new();
    let mut due: Vec<QuestionId> = reviews
        .iter()
        .filter(|r| seen.insert(r.question_id))
        .filter(|r| r.next_review_date <= as_of)
        .map(|r| r.question_id)
        .collect();
    due.sort_unstable();
    due
}
