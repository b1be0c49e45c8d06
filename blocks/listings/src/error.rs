use estate_atoms::media::{BatchError, UploadError};
use estate_atoms::StoreError;
use lambda_http::{http::StatusCode, Body, Error, Response};
use thiserror::Error;

use crate::response::error_response;

/// Errors a flow can end in. Each maps to one HTTP status.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    UploadFailed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) | ApiError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::UploadFailed(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_response(self) -> Result<Response<Body>, Error> {
        let status = self.status();
        match &self {
            ApiError::Store(StoreError::NotFound) => error_response(status, "Not found"),
            ApiError::Store(e) => {
                tracing::error!("❌ Persistence failure: {}", e);
                error_response(status, "Something went wrong")
            }
            _ => {
                if status.is_server_error() {
                    tracing::error!("❌ {}", self);
                }
                error_response(status, &self.to_string())
            }
        }
    }
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Empty => ApiError::Validation(err.to_string()),
            BatchError::AllFailed { .. } => ApiError::UploadFailed(err.to_string()),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        ApiError::Validation(err.to_string())
    }
}
