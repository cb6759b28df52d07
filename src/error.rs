use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudyError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("invalid scheduling state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, StudyError>;
