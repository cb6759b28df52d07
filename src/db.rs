use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous},
    ConnectOptions, Pool, Row, Sqlite,
};
use std::str::FromStr;

use crate::data::{DEFAULT_LEARNER, STARTER_TOPICS};
use crate::error::Result;
use crate::models::{
    Difficulty, NewQuestion, NewReview, Question, QuestionId, Review, ReviewId, Topic, TopicId,
    User, UserId,
};
use crate::repository::Repository;

impl<'r> sqlx::FromRow<'r, SqliteRow> for Topic {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Topic {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for User {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for Question {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let difficulty: String = row.try_get("difficulty")?;
        let difficulty = Difficulty::from_str(&difficulty).map_err(|e| sqlx::Error::ColumnDecode {
            index: "difficulty".to_string(),
            source: e.into(),
        })?;

        Ok(Question {
            id: row.try_get("id")?,
            question_text: row.try_get("question_text")?,
            answer: row.try_get("answer")?,
            topic_id: row.try_get("topic_id")?,
            difficulty,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for Review {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Review {
            id: row.try_get("id")?,
            question_id: row.try_get("question_id")?,
            user_id: row.try_get("user_id")?,
            reviewed_at: row.try_get("reviewed_at")?,
            was_correct: row.try_get("was_correct")?,
            ease_factor: row.try_get("ease_factor")?,
            interval_days: row.try_get("interval_days")?,
            next_review_date: row.try_get("next_review_date")?,
        })
    }
}

/// SQLite-backed store for topics, questions, users and the review log.
#[derive(Clone)]
pub struct Db {
    pool: Pool<Sqlite>,
}

impl Db {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .log_statements(log::LevelFilter::Trace);
        if !in_memory {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        // Every connection to an in-memory database is a separate database.
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections.max(1))
                .connect_with(options)
                .await?
        };

        let db = Db { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT,
                created_at DATETIME NOT NULL
            );

            CREATE TABLE IF NOT EXISTS topics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                created_at DATETIME NOT NULL
            );

            CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question_text TEXT NOT NULL,
                answer TEXT NOT NULL,
                topic_id INTEGER NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
                difficulty TEXT NOT NULL CHECK (difficulty IN ('EASY', 'MEDIUM', 'HARD')),
                created_at DATETIME NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reviews (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                reviewed_at DATETIME NOT NULL,
                was_correct BOOLEAN NOT NULL,
                ease_factor REAL NOT NULL,
                interval_days INTEGER NOT NULL,
                next_review_date DATE NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_reviews_user_question
                ON reviews (user_id, question_id, reviewed_at);
            CREATE INDEX IF NOT EXISTS idx_reviews_question
                ON reviews (question_id, reviewed_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Loads the starter topics and a default learner into an empty database.
    pub async fn seed_database_if_empty(&self) -> Result<()> {
        if self.count_users().await? == 0 {
            self.insert_user(DEFAULT_LEARNER, None).await?;
            info!("created default learner '{}'", DEFAULT_LEARNER);
        }

        if self.count_questions().await? == 0 {
            let mut tx = self.pool.begin().await?;
            let now = Local::now().naive_local();
            for seed in STARTER_TOPICS {
                let topic_id = sqlx::query(
                    "INSERT INTO topics (name, description, created_at) VALUES (?, ?, ?)",
                )
                .bind(seed.name)
                .bind(seed.description)
                .bind(now)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();

                for q in seed.questions {
                    sqlx::query(
                        "INSERT INTO questions (question_text, answer, topic_id, difficulty, created_at) VALUES (?, ?, ?, ?, ?)",
                    )
                    .bind(q.question)
                    .bind(q.answer)
                    .bind(topic_id)
                    .bind(q.difficulty.as_str())
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                }
            }
            tx.commit().await?;
            info!("seeded {} starter topics", STARTER_TOPICS.len());
        }
        Ok(())
    }

    // --- Topics ---

    pub async fn insert_topic(&self, name: &str, description: Option<&str>) -> Result<Topic> {
        let created_at = Local::now().naive_local();
        let id = sqlx::query("INSERT INTO topics (name, description, created_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(description)
            .bind(created_at)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(Topic {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at,
        })
    }

    pub async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>> {
        Ok(sqlx::query_as::<_, Topic>("SELECT * FROM topics WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn update_topic(&self, topic: &Topic) -> Result<bool> {
        let result = sqlx::query("UPDATE topics SET name = ?, description = ? WHERE id = ?")
            .bind(&topic.name)
            .bind(&topic.description)
            .bind(topic.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_topic(&self, id: TopicId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM topics WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_topics(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT count(*) FROM topics")
            .fetch_one(&self.pool)
            .await?)
    }

    // --- Questions ---

    pub async fn insert_question(&self, question: &NewQuestion) -> Result<Question> {
        let created_at = Local::now().naive_local();
        let id = sqlx::query(
            "INSERT INTO questions (question_text, answer, topic_id, difficulty, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&question.question_text)
        .bind(&question.answer)
        .bind(question.topic_id)
        .bind(question.difficulty.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Question {
            id,
            question_text: question.question_text.clone(),
            answer: question.answer.clone(),
            topic_id: question.topic_id,
            difficulty: question.difficulty,
            created_at,
        })
    }

    pub async fn list_questions_by_difficulty(&self, difficulty: Difficulty) -> Result<Vec<Question>> {
        Ok(
            sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE difficulty = ? ORDER BY id")
                .bind(difficulty.as_str())
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn update_question(&self, question: &Question) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE questions SET question_text = ?, answer = ?, topic_id = ?, difficulty = ? WHERE id = ?",
        )
        .bind(&question.question_text)
        .bind(&question.answer)
        .bind(question.topic_id)
        .bind(question.difficulty.as_str())
        .bind(question.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_question(&self, id: QuestionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM questions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_questions(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT count(*) FROM questions")
            .fetch_one(&self.pool)
            .await?)
    }

    // --- Users ---

    pub async fn insert_user(&self, username: &str, email: Option<&str>) -> Result<User> {
        let created_at = Local::now().naive_local();
        let id = sqlx::query("INSERT INTO users (username, email, created_at) VALUES (?, ?, ?)")
            .bind(username)
            .bind(email)
            .bind(created_at)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(User {
            id,
            username: username.to_string(),
            email: email.map(str::to_string),
            created_at,
        })
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn update_user(&self, user: &User) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET username = ?, email = ? WHERE id = ?")
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_user(&self, id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_users(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT count(*) FROM users")
            .fetch_one(&self.pool)
            .await?)
    }

    // --- Reviews ---

    pub async fn get_review(&self, id: ReviewId) -> Result<Option<Review>> {
        Ok(sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Every review of every user, most recent first.
    pub async fn list_reviews(&self) -> Result<Vec<Review>> {
        Ok(sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews ORDER BY reviewed_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    /// Manual correction of a stored review. The scheduler never calls this.
    pub async fn update_review(&self, review: &Review) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE reviews SET question_id = ?, user_id = ?, was_correct = ?, ease_factor = ?, interval_days = ?, next_review_date = ? WHERE id = ?",
        )
        .bind(review.question_id)
        .bind(review.user_id)
        .bind(review.was_correct)
        .bind(review.ease_factor)
        .bind(review.interval_days)
        .bind(review.next_review_date)
        .bind(review.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_review(&self, id: ReviewId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_reviews(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT count(*) FROM reviews")
            .fetch_one(&self.pool)
            .await?)
    }
}

#[async_trait]
impl Repository for Db {
    async fn find_question(&self, id: QuestionId) -> Result<Option<Question>> {
        Ok(sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_questions(&self) -> Result<Vec<Question>> {
        Ok(sqlx::query_as::<_, Question>("SELECT * FROM questions ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_questions_by_topic(&self, topic_id: TopicId) -> Result<Vec<Question>> {
        Ok(
            sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE topic_id = ? ORDER BY id")
                .bind(topic_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn list_topics(&self) -> Result<Vec<Topic>> {
        Ok(sqlx::query_as::<_, Topic>("SELECT * FROM topics ORDER BY name")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_latest_review(
        &self,
        question_id: QuestionId,
        user_id: UserId,
    ) -> Result<Option<Review>> {
        Ok(sqlx::query_as::<_, Review>(
            r#"
            SELECT * FROM reviews
            WHERE question_id = ? AND user_id = ?
            ORDER BY reviewed_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(question_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_reviews_for_user(&self, user_id: UserId) -> Result<Vec<Review>> {
        Ok(sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews WHERE user_id = ? ORDER BY reviewed_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_reviews_for_question(&self, question_id: QuestionId) -> Result<Vec<Review>> {
        Ok(sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews WHERE question_id = ? ORDER BY reviewed_at DESC, id DESC",
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_review(&self, review: NewReview) -> Result<Review> {
        let id = sqlx::query(
            r#"
            INSERT INTO reviews (question_id, user_id, reviewed_at, was_correct, ease_factor, interval_days, next_review_date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(review.question_id)
        .bind(review.user_id)
        .bind(review.reviewed_at)
        .bind(review.was_correct)
        .bind(review.ease_factor)
        .bind(review.interval_days)
        .bind(review.next_review_date)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(review.with_id(id))
    }

    async fn list_due_question_ids(&self, user_id: UserId, as_of: NaiveDate) -> Result<Vec<QuestionId>> {
        // Only the latest review of each question decides whether it is due.
        Ok(sqlx::query_scalar(
            r#"
            SELECT r.question_id FROM reviews r
            WHERE r.user_id = ?
                AND r.id = (
                    SELECT latest.id FROM reviews latest
                    WHERE latest.question_id = r.question_id AND latest.user_id = r.user_id
                    ORDER BY latest.reviewed_at DESC, latest.id DESC
                    LIMIT 1
                )
                AND r.next_review_date <= ?
            ORDER BY r.question_id
            "#,
        )
        .bind(user_id)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?)
    }
}
