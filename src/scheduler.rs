use chrono::{Local, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Result, StudyError};
use crate::models::{
    NewReview, Outcome, Question, QuestionId, Review, SessionStats, TopicId, TopicSummary, UserId,
};
use crate::repository::Repository;
use crate::srs;

type PairKey = (QuestionId, UserId);

/// Drives the calculator from review history and selects what to study.
pub struct Scheduler<R> {
    repo: R,
    locks: SubmissionLocks,
}

impl<R: Repository> Scheduler<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            locks: SubmissionLocks::default(),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub async fn due_items(&self, user_id: UserId) -> Result<Vec<Question>> {
        self.due_items_as_of(user_id, today()).await
    }

    /// Questions whose latest review by this user falls due on or before `as_of`.
    /// Reviews pointing at questions that no longer exist are skipped.
    pub async fn due_items_as_of(&self, user_id: UserId, as_of: NaiveDate) -> Result<Vec<Question>> {
        let ids = self.repo.list_due_question_ids(user_id, as_of).await?;
        let mut due = Vec::with_capacity(ids.len());
        for id in ids {
            match self.repo.find_question(id).await? {
                Some(question) => due.push(question),
                None => warn!("user {} has a due review for missing question {}", user_id, id),
            }
        }
        debug!("user {} has {} due questions as of {}", user_id, due.len(), as_of);
        Ok(due)
    }

    /// Up to `limit` questions the user has never reviewed, in ascending id order.
    pub async fn new_items(&self, user_id: UserId, limit: usize) -> Result<Vec<Question>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let seen: HashSet<QuestionId> = self
            .repo
            .list_reviews_for_user(user_id)
            .await?
            .iter()
            .map(|r| r.question_id)
            .collect();

        let fresh: Vec<Question> = self
            .repo
            .list_questions()
            .await?
            .into_iter()
            .filter(|q| !seen.contains(&q.id))
            .take(limit)
            .collect();
        debug!("user {} has {} new questions (limit {})", user_id, fresh.len(), limit);
        Ok(fresh)
    }

    pub async fn submit_answer(
        &self,
        question_id: QuestionId,
        user_id: UserId,
        outcome: Outcome,
    ) -> Result<Review> {
        self.submit_answer_at(question_id, user_id, outcome, Local::now().naive_local())
            .await
    }

    /// Records one answer and returns the stored review.
    ///
    /// Submissions for the same (question, user) pair are serialized so each
    /// one computes from the review written by the one before it.
    pub async fn submit_answer_at(
        &self,
        question_id: QuestionId,
        user_id: UserId,
        outcome: Outcome,
        now: NaiveDateTime,
    ) -> Result<Review> {
        let lease = self.locks.acquire((question_id, user_id));
        let _guard = lease.handle().lock().await;

        let result = self.record(question_id, user_id, outcome, now).await;
        if let Err(StudyError::Persistence(e)) = &result {
            warn!(
                "failed to record review of question {} for user {}: {}",
                question_id, user_id, e
            );
        }
        result
    }

    async fn record(
        &self,
        question_id: QuestionId,
        user_id: UserId,
        outcome: Outcome,
        now: NaiveDateTime,
    ) -> Result<Review> {
        if self.repo.find_question(question_id).await?.is_none() {
            return Err(StudyError::NotFound(format!("question {}", question_id)));
        }

        let today = now.date();
        let result = match self.repo.find_latest_review(question_id, user_id).await? {
            None => srs::compute_first(outcome, today),
            Some(prior) => {
                check_prior(&prior)?;
                let history = self.repo.list_reviews_for_question(question_id).await?;
                let repetitions = trailing_correct(&history, user_id);
                srs::compute_next(
                    outcome,
                    prior.ease_factor,
                    prior.interval_days,
                    repetitions,
                    today,
                )
            }
        };
        debug!(
            "question {} user {}: {:?} -> ease {:.2}, interval {}d, repetitions {}",
            question_id, user_id, outcome, result.ease_factor, result.interval_days, result.repetitions
        );

        let review = self
            .repo
            .insert_review(NewReview::from_result(question_id, user_id, outcome, now, &result))
            .await?;
        info!(
            "recorded review {} (question {}, user {}), next review {}",
            review.id, question_id, user_id, review.next_review_date
        );
        Ok(review)
    }

    pub async fn session_stats(&self, user_id: UserId) -> Result<SessionStats> {
        self.session_stats_as_of(user_id, today()).await
    }

    pub async fn session_stats_as_of(&self, user_id: UserId, as_of: NaiveDate) -> Result<SessionStats> {
        let reviews = self.repo.list_reviews_for_user(user_id).await?;
        let total_reviews = reviews.len();
        let correct_answers = reviews.iter().filter(|r| r.outcome().is_correct()).count();
        let success_rate = if total_reviews > 0 {
            correct_answers as f64 * 100.0 / total_reviews as f64
        } else {
            0.0
        };
        let due_today = self.due_items_as_of(user_id, as_of).await?.len();

        Ok(SessionStats {
            total_reviews,
            correct_answers,
            due_today,
            success_rate,
        })
    }

    pub async fn due_items_by_topic(&self, user_id: UserId, topic_id: TopicId) -> Result<Vec<Question>> {
        self.due_items_by_topic_as_of(user_id, topic_id, today()).await
    }

    pub async fn due_items_by_topic_as_of(
        &self,
        user_id: UserId,
        topic_id: TopicId,
        as_of: NaiveDate,
    ) -> Result<Vec<Question>> {
        let mut due = self.due_items_as_of(user_id, as_of).await?;
        due.retain(|q| q.topic_id == topic_id);
        Ok(due)
    }

    /// Per-topic question counts with how many are due and how many are unseen.
    pub async fn topic_summaries(&self, user_id: UserId, as_of: NaiveDate) -> Result<Vec<TopicSummary>> {
        let topics = self.repo.list_topics().await?;
        let questions = self.repo.list_questions().await?;
        let due: HashSet<QuestionId> = self
            .repo
            .list_due_question_ids(user_id, as_of)
            .await?
            .into_iter()
            .collect();
        let seen: HashSet<QuestionId> = self
            .repo
            .list_reviews_for_user(user_id)
            .await?
            .iter()
            .map(|r| r.question_id)
            .collect();

        Ok(topics
            .into_iter()
            .map(|topic| {
                let in_topic: Vec<&Question> =
                    questions.iter().filter(|q| q.topic_id == topic.id).collect();
                TopicSummary {
                    total_questions: in_topic.len(),
                    due: in_topic.iter().filter(|q| due.contains(&q.id)).count(),
                    unseen: in_topic.iter().filter(|q| !seen.contains(&q.id)).count(),
                    topic,
                }
            })
            .collect())
    }
}

/// Consecutive correct answers by `user_id`, scanning a most-recent-first
/// history until the first incorrect one.
pub fn trailing_correct(history: &[Review], user_id: UserId) -> u32 {
    history
        .iter()
        .filter(|r| r.user_id == user_id)
        .take_while(|r| r.outcome().is_correct())
        .count() as u32
}

fn check_prior(prior: &Review) -> Result<()> {
    if !srs::is_valid_ease(prior.ease_factor) {
        return Err(StudyError::InvalidState(format!(
            "review {} has ease factor {} outside [{}, {}]",
            prior.id,
            prior.ease_factor,
            srs::MIN_EASE,
            srs::MAX_EASE
        )));
    }
    if prior.interval_days < 1 {
        return Err(StudyError::InvalidState(format!(
            "review {} has interval of {} days",
            prior.id, prior.interval_days
        )));
    }
    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// One async mutex per (question, user) pair, created on demand.
#[derive(Default)]
struct SubmissionLocks {
    inner: Mutex<HashMap<PairKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl SubmissionLocks {
    fn acquire(&self, key: PairKey) -> LockLease<'_> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = map.entry(key).or_default().clone();
        LockLease {
            locks: self,
            key,
            handle,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Keeps a pair's mutex alive; the map entry goes away with the last lease.
struct LockLease<'a> {
    locks: &'a SubmissionLocks,
    key: PairKey,
    handle: Arc<tokio::sync::Mutex<()>>,
}

impl LockLease<'_> {
    fn handle(&self) -> &tokio::sync::Mutex<()> {
        &self.handle
    }
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        let mut map = self.locks.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // Release our clone under the map lock; clones are only made under it too,
        // so a count of one means the map holds the last reference.
        drop(std::mem::take(&mut self.handle));
        if map.get(&self.key).is_some_and(|h| Arc::strong_count(h) == 1) {
            map.remove(&self.key);
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
