//! Spaced-repetition study engine: an SM-2 style calculator, a scheduler that
//! drives it from a learner's review history, and a SQLite-backed store.

pub mod api;
pub mod config;
pub mod data;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod srs;

pub use error::{Result, StudyError};
pub use repository::Repository;
pub use scheduler::Scheduler;
