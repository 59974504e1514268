use thiserror::Error;

use stockroom_core::StockroomError;
use stockroom_db::DbError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DbError> for ServiceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(msg) => ServiceError::NotFound(msg),
            DbError::Conflict(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<StockroomError> for ServiceError {
    fn from(e: StockroomError) -> Self {
        match e {
            StockroomError::NotFound(msg) => ServiceError::NotFound(msg),
            StockroomError::InvalidInput(msg) => ServiceError::InvalidInput(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_conflicts_stay_conflicts() {
        let err: ServiceError = DbError::Conflict("provider 1 has linked invoices".into()).into();
        assert!(matches!(err, ServiceError::Conflict(ref m) if m.contains("linked")));

        let err: ServiceError = DbError::Internal("disk full".into()).into();
        assert!(matches!(err, ServiceError::Internal(_)));
    }
}
