use axum::http::StatusCode;
use thiserror::Error;

pub type CrudResult<T> = Result<T, CrudError>;

/// Errors raised by the CRUD service layer.
///
/// Every variant maps to an HTTP-style status via [`CrudError::status`].
/// All variants except `ParseFailure` and `Store` are operational:
/// expected outcomes a caller can recover from.
#[derive(Debug, Error)]
pub enum CrudError {
    /// A uniqueness check matched an existing document.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotCreated(String),

    #[error("{0}")]
    NotUpdated(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    NotFetched(String),

    #[error("{0}")]
    NotDeleted(String),

    /// Malformed filter text after operator-token rewriting.
    #[error("invalid filter: {0}")]
    ParseFailure(#[from] serde_json::Error),

    /// Failure surfaced by the underlying store driver.
    #[error("{0}")]
    Store(#[from] anyhow::Error),
}

impl CrudError {
    pub fn status(&self) -> StatusCode {
        match self {
            CrudError::Conflict(_) => StatusCode::CONFLICT,
            CrudError::NotCreated(_) | CrudError::NotUpdated(_) | CrudError::ParseFailure(_) => {
                StatusCode::BAD_REQUEST
            }
            CrudError::NotFound(_) | CrudError::NotFetched(_) | CrudError::NotDeleted(_) => {
                StatusCode::NOT_FOUND
            }
            CrudError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_operational(&self) -> bool {
        !matches!(self, CrudError::ParseFailure(_) | CrudError::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            CrudError::Conflict("dup".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            CrudError::NotCreated("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            CrudError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            CrudError::Store(anyhow::anyhow!("io")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_errors_are_not_operational() {
        assert!(CrudError::Conflict("dup".into()).is_operational());
        assert!(!CrudError::Store(anyhow::anyhow!("io")).is_operational());
    }
}
