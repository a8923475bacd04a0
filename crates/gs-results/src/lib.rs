//! gs-results: result persistence and run manifests.

pub mod hash;
pub mod store;
pub mod types;

pub use hash::compute_run_id;
pub use store::{FileResultStore, InMemoryResultStore, ResultStore};
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Run manifest not found under {path}")]
    ManifestNotFound { path: String },

    #[error("Invalid path: {message}")]
    InvalidPath { message: String },
}
