//! Error types for cache operations.

use gs_core::GsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Core(#[from] GsError),

    #[error("Time series window exhausted for {key}: requested {requested} periods, {available} available")]
    WindowExhausted {
        key: String,
        requested: usize,
        available: usize,
    },

    #[error("Time series source error for {key}: {message}")]
    Source { key: String, message: String },
}

pub type CacheResult<T> = Result<T, CacheError>;
