use thiserror::Error;

pub type GsResult<T> = Result<T, GsError>;

/// Error taxonomy shared by every gridseq crate.
///
/// Crate-level error enums wrap this with `#[from]` so callers can match on the
/// category regardless of which layer raised it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GsError {
    #[error("Invalid argument: {what}")]
    InvalidArgument { what: String },

    #[error("Key not found: {what}")]
    KeyNotFound { what: String },

    #[error("Consistency error: {what}")]
    Consistency { what: String },
}

impl GsError {
    pub fn invalid_argument(what: impl Into<String>) -> Self {
        GsError::InvalidArgument { what: what.into() }
    }

    pub fn key_not_found(what: impl Into<String>) -> Self {
        GsError::KeyNotFound { what: what.into() }
    }

    pub fn consistency(what: impl Into<String>) -> Self {
        GsError::Consistency { what: what.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let e = GsError::key_not_found("step 4, stage 1");
        assert_eq!(e.to_string(), "Key not found: step 4, stage 1");
    }
}
