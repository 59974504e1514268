use thiserror::Error;

#[derive(Debug, Error)]
pub enum StockroomError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Reject empty or whitespace-only text fields.
pub(crate) fn require_text(field: &str, value: &str) -> Result<(), StockroomError> {
    if value.trim().is_empty() {
        return Err(StockroomError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

pub(crate) fn require_non_negative(field: &str, value: i64) -> Result<(), StockroomError> {
    if value < 0 {
        return Err(StockroomError::InvalidInput(format!(
            "{field} must be zero or greater"
        )));
    }
    Ok(())
}
