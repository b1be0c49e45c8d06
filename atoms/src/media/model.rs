use serde::{Deserialize, Serialize};

/// A stored remote asset: public address plus the handle used to delete it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub url: String,
    pub public_id: String,
}

/// Raw image bytes waiting to be uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub extension: &'static str,
}

/// Base64 upload payload as sent by the client.
#[derive(Debug, Deserialize, Clone)]
pub struct ImageUpload {
    pub data: String,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

/// One entry of a client-submitted image list, in whatever shape it arrived.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum IncomingImage {
    Stored(ImageRecord),
    Pending(ImageUpload),
    // Blob preview URL left over from the browser; carries nothing we can use
    Preview(String),
}

/// A normalized image entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSlot {
    Stored(ImageRecord),
    Pending(ImageBlob),
}

impl ImageSlot {
    pub fn public_id(&self) -> Option<&str> {
        match self {
            ImageSlot::Stored(record) => Some(record.public_id.as_str()),
            ImageSlot::Pending(_) => None,
        }
    }
}

/// Outcome of a partially successful upload batch.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct UploadBatch {
    pub accepted: Vec<ImageRecord>,
    pub rejected: usize,
}
