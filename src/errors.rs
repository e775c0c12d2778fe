use thiserror::Error;

#[derive(Debug, Error)]
pub enum MovieKgError {
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("malformed row: {0}")]
    MalformedRow(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("schema conflict: {0}")]
    SchemaConflict(String),
    #[error("query error: {0}")]
    QueryError(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MovieKgError {
    pub fn invalid_key<T: Into<String>>(msg: T) -> Self {
        MovieKgError::InvalidKey(msg.into())
    }

    pub fn malformed_row<T: Into<String>>(msg: T) -> Self {
        MovieKgError::MalformedRow(msg.into())
    }

    pub fn unavailable<T: Into<String>>(msg: T) -> Self {
        MovieKgError::StoreUnavailable(msg.into())
    }

    pub fn schema_conflict<T: Into<String>>(msg: T) -> Self {
        MovieKgError::SchemaConflict(msg.into())
    }

    pub fn query<T: Into<String>>(msg: T) -> Self {
        MovieKgError::QueryError(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        MovieKgError::InvalidInput(msg.into())
    }

    /// Errors local to a single input row; the row is skipped and the batch continues.
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            MovieKgError::InvalidKey(_)
                | MovieKgError::MalformedRow(_)
                | MovieKgError::InvalidInput(_)
        )
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, MovieKgError::StoreUnavailable(_))
    }
}
