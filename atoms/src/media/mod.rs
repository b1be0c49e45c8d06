// Re-export model types and the reconciler
pub mod error;
pub mod model;
pub mod reconcile;
pub mod store;
pub mod validate;

pub use error::{BatchError, DeleteError, UploadError};
pub use model::{ImageBlob, ImageRecord, ImageSlot, ImageUpload, IncomingImage, UploadBatch};
pub use reconcile::{ImageReconciler, UpdatePlan};
pub use store::{AssetStore, S3AssetStore};
pub use validate::{decode_upload, normalize_entries};
