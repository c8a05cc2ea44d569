pub mod identity;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Actor is not permitted to perform this operation: {0}")]
    ForbiddenError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
