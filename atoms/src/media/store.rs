use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use super::error::{DeleteError, UploadError};
use super::model::{ImageBlob, ImageRecord};

/// Remote host for image assets.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn upload(&self, blob: ImageBlob) -> Result<ImageRecord, UploadError>;

    async fn delete(&self, public_id: &str) -> Result<(), DeleteError>;

    /// Whether `record` names an asset this store issued: its key sits in the
    /// store's folder and its URL is the one the store would serve it from.
    fn owns(&self, record: &ImageRecord) -> bool;
}

/// S3-backed asset store. Objects live under `{folder}/` and are served from
/// `public_base_url` (a CloudFront distribution or the bucket endpoint).
pub struct S3AssetStore {
    client: S3Client,
    bucket: String,
    folder: String,
    public_base_url: String,
}

impl S3AssetStore {
    pub fn new(
        client: S3Client,
        bucket: impl Into<String>,
        folder: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            folder: folder.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn object_key(&self, extension: &str) -> String {
        format!("{}/{}.{}", self.folder, uuid::Uuid::new_v4(), extension)
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn upload(&self, blob: ImageBlob) -> Result<ImageRecord, UploadError> {
        let key = self.object_key(blob.extension);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(&blob.content_type)
            .body(ByteStream::from(blob.bytes))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("S3 put_object failed for key {}: {}", key, e);
                UploadError::Remote(e.to_string())
            })?;

        Ok(ImageRecord {
            url: self.public_url(&key),
            public_id: key,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), DeleteError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(public_id)
            .send()
            .await
            .map_err(|e| DeleteError {
                public_id: public_id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn owns(&self, record: &ImageRecord) -> bool {
        let Some(name) = record
            .public_id
            .strip_prefix(self.folder.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            return false;
        };
        !name.is_empty() && !name.contains('/') && record.url == self.public_url(&record.public_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::{BehaviorVersion, Region};

    fn store() -> S3AssetStore {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        S3AssetStore::new(
            S3Client::from_conf(config),
            "estate-media",
            "listings",
            "https://cdn.estate.app/",
        )
    }

    fn record(url: &str, public_id: &str) -> ImageRecord {
        ImageRecord {
            url: url.to_string(),
            public_id: public_id.to_string(),
        }
    }

    #[test]
    fn test_owns_issued_key() {
        let store = store();
        let key = store.object_key("png");
        assert!(store.owns(&record(&store.public_url(&key), &key)));
    }

    #[test]
    fn test_rejects_foreign_url() {
        let store = store();
        assert!(!store.owns(&record("https://evil.test/listings/a.png", "listings/a.png")));
    }

    #[test]
    fn test_rejects_other_folder_and_nesting() {
        let store = store();
        for key in ["avatars/a.png", "listings/", "listings/x/a.png", "listingsa.png", "a.png"] {
            assert!(!store.owns(&record(&store.public_url(key), key)), "{}", key);
        }
    }
}
