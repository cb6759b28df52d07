use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::db::Db;
use crate::error::StudyError;
use crate::models::{
    Outcome, Question, QuestionId, Review, SessionStats, Topic, TopicId, TopicSummary, UserId,
};
use crate::repository::Repository;
use crate::scheduler::Scheduler;

#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Arc<Scheduler<Db>>,
    pub new_item_limit: usize,
}

pub fn app_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/users/:user_id/due", get(due_items))
        .route("/api/users/:user_id/new", get(new_items))
        .route("/api/users/:user_id/stats", get(session_stats))
        .route("/api/users/:user_id/topics", get(topic_summaries))
        .route("/api/users/:user_id/topics/:topic_id/due", get(due_items_by_topic))
        .route("/api/submit", post(submit_answer))
        .route("/api/topics", get(list_topics))
        .route("/api/questions", get(list_questions))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl IntoResponse for StudyError {
    fn into_response(self) -> Response {
        let status = match &self {
            StudyError::NotFound(_) => StatusCode::NOT_FOUND,
            StudyError::InvalidState(_) => StatusCode::CONFLICT,
            StudyError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, StudyError>;

#[derive(Deserialize)]
struct AsOfQuery {
    as_of: Option<NaiveDate>,
}

impl AsOfQuery {
    fn date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Local::now().date_naive())
    }
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct QuestionsQuery {
    topic_id: Option<TopicId>,
}

#[derive(Deserialize)]
struct SubmitRequest {
    question_id: QuestionId,
    user_id: UserId,
    correct: bool,
}

async fn due_items(
    State(state): State<ApiState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<AsOfQuery>,
) -> ApiResult<Vec<Question>> {
    Ok(Json(state.scheduler.due_items_as_of(user_id, query.date()).await?))
}

async fn new_items(
    State(state): State<ApiState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<Question>> {
    let limit = query.limit.unwrap_or(state.new_item_limit);
    Ok(Json(state.scheduler.new_items(user_id, limit).await?))
}

async fn session_stats(
    State(state): State<ApiState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<AsOfQuery>,
) -> ApiResult<SessionStats> {
    Ok(Json(state.scheduler.session_stats_as_of(user_id, query.date()).await?))
}

async fn topic_summaries(
    State(state): State<ApiState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<AsOfQuery>,
) -> ApiResult<Vec<TopicSummary>> {
    Ok(Json(state.scheduler.topic_summaries(user_id, query.date()).await?))
}

async fn due_items_by_topic(
    State(state): State<ApiState>,
    Path((user_id, topic_id)): Path<(UserId, TopicId)>,
    Query(query): Query<AsOfQuery>,
) -> ApiResult<Vec<Question>> {
    Ok(Json(
        state
            .scheduler
            .due_items_by_topic_as_of(user_id, topic_id, query.date())
            .await?,
    ))
}

async fn submit_answer(
    State(state): State<ApiState>,
    Json(payload): Json<SubmitRequest>,
) -> ApiResult<Review> {
    let review = state
        .scheduler
        .submit_answer(payload.question_id, payload.user_id, Outcome::from(payload.correct))
        .await?;
    Ok(Json(review))
}

async fn list_topics(State(state): State<ApiState>) -> ApiResult<Vec<Topic>> {
    Ok(Json(state.scheduler.repository().list_topics().await?))
}

async fn list_questions(
    State(state): State<ApiState>,
    Query(query): Query<QuestionsQuery>,
) -> ApiResult<Vec<Question>> {
    let repo = state.scheduler.repository();
    let questions = match query.topic_id {
        Some(topic_id) => repo.list_questions_by_topic(topic_id).await?,
        None => repo.list_questions().await?,
    };
    Ok(Json(questions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn test_router() -> (Router, Db) {
        let db = Db::connect("sqlite::memory:", 1).await.unwrap();
        db.seed_database_if_empty().await.unwrap();
        let state = ApiState {
            scheduler: Arc::new(Scheduler::new(db.clone())),
            new_item_limit: 3,
        };
        (app_router(state), db)
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn submit_req(question_id: i64, user_id: i64, correct: bool) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/submit")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "question_id": question_id, "user_id": user_id, "correct": correct })
                    .to_string(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_new_items_uses_configured_default_limit() {
        let (router, _) = test_router().await;
        let (status, body) = send(&router, get_req("/api/users/1/new")).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<i64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|q| q["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let (_, body) = send(&router, get_req("/api/users/1/new?limit=1")).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_then_stats_and_due() {
        let (router, _) = test_router().await;

        let (status, review) = send(&router, submit_req(1, 1, true)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(review["interval_days"], 1);
        assert_eq!(review["ease_factor"], 2.6);
        assert_eq!(review["was_correct"], true);

        let (_, stats) = send(&router, get_req("/api/users/1/stats")).await;
        assert_eq!(stats["total_reviews"], 1);
        assert_eq!(stats["correct_answers"], 1);
        assert_eq!(stats["success_rate"], 100.0);
        assert_eq!(stats["due_today"], 0);

        // Due tomorrow, so due on any later date.
        let (_, due) = send(&router, get_req("/api/users/1/due?as_of=2999-01-01")).await;
        assert_eq!(due.as_array().unwrap().len(), 1);
        assert_eq!(due[0]["id"], 1);

        let (_, fresh) = send(&router, get_req("/api/users/1/new?limit=2")).await;
        let ids: Vec<i64> = fresh
            .as_array()
            .unwrap()
            .iter()
            .map(|q| q["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_due_by_topic() {
        let (router, db) = test_router().await;
        let first = db.find_question(1).await.unwrap().unwrap();
        send(&router, submit_req(1, 1, false)).await;

        let uri = format!("/api/users/1/topics/{}/due?as_of=2999-01-01", first.topic_id);
        let (_, due) = send(&router, get_req(&uri)).await;
        assert_eq!(due.as_array().unwrap().len(), 1);

        let uri = format!("/api/users/1/topics/{}/due?as_of=2999-01-01", first.topic_id + 1);
        let (_, due) = send(&router, get_req(&uri)).await;
        assert!(due.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_unknown_question_is_404() {
        let (router, _) = test_router().await;
        let (status, body) = send(&router, submit_req(999, 1, true)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("question 999"));
    }

    #[tokio::test]
    async fn test_submit_unknown_user_is_500() {
        let (router, _) = test_router().await;
        let (status, body) = send(&router, submit_req(1, 999, true)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().starts_with("persistence failure"));
    }

    #[tokio::test]
    async fn test_content_listing() {
        let (router, db) = test_router().await;
        let (_, topics) = send(&router, get_req("/api/topics")).await;
        assert_eq!(topics.as_array().unwrap().len() as i64, db.count_topics().await.unwrap());

        let (_, questions) = send(&router, get_req("/api/questions")).await;
        assert_eq!(
            questions.as_array().unwrap().len() as i64,
            db.count_questions().await.unwrap()
        );

        let topic_id = topics[0]["id"].as_i64().unwrap();
        let (_, in_topic) = send(&router, get_req(&format!("/api/questions?topic_id={}", topic_id))).await;
        assert!(in_topic
            .as_array()
            .unwrap()
            .iter()
            .all(|q| q["topic_id"].as_i64() == Some(topic_id)));

        let (_, summaries) = send(&router, get_req("/api/users/1/topics")).await;
        assert_eq!(summaries.as_array().unwrap().len(), topics.as_array().unwrap().len());
        assert_eq!(summaries[0]["due"], 0);
    }
}
