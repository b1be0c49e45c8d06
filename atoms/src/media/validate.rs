use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::ImageFormat;

use super::error::UploadError;
use super::model::{ImageBlob, ImageSlot, ImageUpload, IncomingImage};

/// Default per-file ceiling: 5 MiB.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Decode a base64 upload and check it is an allowed image within `max_bytes`.
///
/// The format is sniffed from the bytes; the client's declared content type
/// is not trusted.
pub fn decode_upload(upload: &ImageUpload, max_bytes: usize) -> Result<ImageBlob, UploadError> {
    // Accept both bare base64 and `data:image/png;base64,...` URLs
    let encoded = match upload.data.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
        None => upload.data.as_str(),
    };

    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| UploadError::Encoding(e.to_string()))?;

    if bytes.len() > max_bytes {
        return Err(UploadError::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    let (content_type, extension) = match image::guess_format(&bytes) {
        Ok(ImageFormat::Jpeg) => ("image/jpeg", "jpg"),
        Ok(ImageFormat::Png) => ("image/png", "png"),
        Ok(ImageFormat::WebP) => ("image/webp", "webp"),
        _ => return Err(UploadError::UnsupportedType),
    };

    if let Some(declared) = upload.content_type.as_deref() {
        if declared != content_type {
            tracing::debug!(
                "Declared content type {} differs from sniffed {} ({:?})",
                declared,
                content_type,
                upload.file_name
            );
        }
    }

    Ok(ImageBlob {
        bytes,
        content_type: content_type.to_string(),
        extension,
    })
}

/// Normalize client image entries into slots, decoding pending uploads.
///
/// Bare preview strings are dropped. Any invalid upload fails the whole list
/// so that nothing is sent to the asset host.
pub fn normalize_entries(
    entries: &[IncomingImage],
    max_bytes: usize,
) -> Result<Vec<ImageSlot>, UploadError> {
    let mut slots = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            IncomingImage::Stored(record) => slots.push(ImageSlot::Stored(record.clone())),
            IncomingImage::Pending(upload) => {
                slots.push(ImageSlot::Pending(decode_upload(upload, max_bytes)?))
            }
            IncomingImage::Preview(url) => {
                tracing::warn!("Dropping image entry without public_id or data: {}", url);
            }
        }
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::ImageRecord;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    fn upload(bytes: &[u8]) -> ImageUpload {
        ImageUpload {
            data: STANDARD.encode(bytes),
            content_type: None,
            file_name: None,
        }
    }

    #[test]
    fn test_decode_png() {
        let blob = decode_upload(&upload(PNG_MAGIC), DEFAULT_MAX_IMAGE_BYTES).unwrap();
        assert_eq!(blob.content_type, "image/png");
        assert_eq!(blob.extension, "png");
        assert_eq!(blob.bytes, PNG_MAGIC);
    }

    #[test]
    fn test_decode_data_url() {
        let mut up = upload(JPEG_MAGIC);
        up.data = format!("data:image/jpeg;base64,{}", up.data);
        let blob = decode_upload(&up, DEFAULT_MAX_IMAGE_BYTES).unwrap();
        assert_eq!(blob.content_type, "image/jpeg");
        assert_eq!(blob.extension, "jpg");
    }

    #[test]
    fn test_rejects_unsupported_format() {
        let err = decode_upload(&upload(b"GIF89a\x01\x00\x01\x00"), DEFAULT_MAX_IMAGE_BYTES)
            .unwrap_err();
        assert_eq!(err, UploadError::UnsupportedType);

        let err = decode_upload(&upload(b"plain text"), DEFAULT_MAX_IMAGE_BYTES).unwrap_err();
        assert_eq!(err, UploadError::UnsupportedType);
    }

    #[test]
    fn test_rejects_oversized() {
        let err = decode_upload(&upload(PNG_MAGIC), 4).unwrap_err();
        assert_eq!(
            err,
            UploadError::TooLarge {
                size: PNG_MAGIC.len(),
                limit: 4
            }
        );
    }

    #[test]
    fn test_rejects_bad_base64() {
        let up = ImageUpload {
            data: "not base64!!".to_string(),
            content_type: None,
            file_name: None,
        };
        assert!(matches!(
            decode_upload(&up, DEFAULT_MAX_IMAGE_BYTES),
            Err(UploadError::Encoding(_))
        ));
    }

    #[test]
    fn test_normalize_mixed_entries() {
        let raw = serde_json::json!([
            {"url": "https://cdn/listings/a.jpg", "public_id": "listings/a.jpg"},
            "blob:http://localhost:5173/1f0c",
            {"data": STANDARD.encode(PNG_MAGIC), "content_type": "image/png"}
        ]);
        let entries: Vec<IncomingImage> = serde_json::from_value(raw).unwrap();
        let slots = normalize_entries(&entries, DEFAULT_MAX_IMAGE_BYTES).unwrap();

        assert_eq!(slots.len(), 2);
        assert_eq!(
            slots[0],
            ImageSlot::Stored(ImageRecord {
                url: "https://cdn/listings/a.jpg".to_string(),
                public_id: "listings/a.jpg".to_string(),
            })
        );
        assert!(matches!(slots[1], ImageSlot::Pending(_)));
    }

    #[test]
    fn test_normalize_fails_whole_list_on_invalid_upload() {
        let entries = vec![
            IncomingImage::Pending(upload(PNG_MAGIC)),
            IncomingImage::Pending(upload(b"nope")),
        ];
        assert_eq!(
            normalize_entries(&entries, DEFAULT_MAX_IMAGE_BYTES),
            Err(UploadError::UnsupportedType)
        );
    }
}
