use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    #[error("invalid base64 image data: {0}")]
    Encoding(String),

    #[error("only JPEG, PNG and WebP images are allowed")]
    UnsupportedType,

    #[error("image is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("asset host rejected upload: {0}")]
    Remote(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("failed to delete asset {public_id}: {reason}")]
pub struct DeleteError {
    pub public_id: String,
    pub reason: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("No images provided")]
    Empty,

    #[error("Upload failed")]
    AllFailed { rejected: usize },
}
