use thiserror::Error;

/// Failure talking to the persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("DynamoDB error: {0}")]
    Dynamo(String),

    #[error("malformed record: {0}")]
    Malformed(String),
}

impl StoreError {
    pub fn dynamo(err: impl std::fmt::Display) -> Self {
        StoreError::Dynamo(err.to_string())
    }
}
