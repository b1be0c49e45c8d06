#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use estate_atoms::listings::{Listing, ListingRepository, ListingType};
use estate_atoms::media::{
    AssetStore, DeleteError, ImageBlob, ImageReconciler, ImageRecord, ImageUpload, UploadError,
};
use estate_atoms::users::{User, UserRepository, DEFAULT_AVATAR};
use estate_atoms::StoreError;

pub const OWNER: &str = "user-owner";
pub const STRANGER: &str = "user-stranger";

/// Asset store that records calls. Uploads whose last byte is in
/// `failing_tags` fail; deletes of ids in `failing_deletes` fail.
#[derive(Default)]
pub struct FakeStore {
    pub uploads: AtomicUsize,
    pub deleted: Mutex<Vec<String>>,
    pub delete_attempts: AtomicUsize,
    pub failing_tags: HashSet<u8>,
    pub failing_deletes: HashSet<String>,
}

impl FakeStore {
    pub fn deleted_sorted(&self) -> Vec<String> {
        let mut deleted = self.deleted.lock().unwrap().clone();
        deleted.sort();
        deleted
    }
}

#[async_trait]
impl AssetStore for FakeStore {
    async fn upload(&self, blob: ImageBlob) -> Result<ImageRecord, UploadError> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        let tag = *blob.bytes.last().unwrap_or(&0);
        if self.failing_tags.contains(&tag) {
            return Err(UploadError::Remote("host said no".to_string()));
        }
        let public_id = format!("listings/tag{}-{}.{}", tag, n, blob.extension);
        Ok(ImageRecord {
            url: format!("https://cdn.test/{}", public_id),
            public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), DeleteError> {
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing_deletes.contains(public_id) {
            return Err(DeleteError {
                public_id: public_id.to_string(),
                reason: "timeout".to_string(),
            });
        }
        self.deleted.lock().unwrap().push(public_id.to_string());
        Ok(())
    }

    fn owns(&self, record: &ImageRecord) -> bool {
        record.public_id.starts_with("listings/")
            && record.url == format!("https://cdn.test/{}", record.public_id)
    }
}

#[derive(Default)]
pub struct MemoryListings {
    pub rows: Mutex<HashMap<String, Listing>>,
    pub fail_writes: AtomicBool,
}

impl MemoryListings {
    pub fn with(listings: Vec<Listing>) -> Self {
        let repo = Self::default();
        for listing in listings {
            repo.rows
                .lock()
                .unwrap()
                .insert(listing.listing_id.clone(), listing);
        }
        repo
    }

    pub fn get(&self, listing_id: &str) -> Option<Listing> {
        self.rows.lock().unwrap().get(listing_id).cloned()
    }
}

#[async_trait]
impl ListingRepository for MemoryListings {
    async fn create(&self, listing: &Listing) -> Result<(), StoreError> {
        self.rows
            .lock()
            .unwrap()
            .insert(listing.listing_id.clone(), listing.clone());
        Ok(())
    }

    async fn find_by_id(&self, listing_id: &str) -> Result<Option<Listing>, StoreError> {
        Ok(self.get(listing_id))
    }

    async fn update_by_id(&self, listing_id: &str, listing: &Listing) -> Result<Listing, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Dynamo("ProvisionedThroughputExceeded".to_string()));
        }
        let mut rows = self.rows.lock().unwrap();
        if !rows.contains_key(listing_id) {
            return Err(StoreError::NotFound);
        }
        rows.insert(listing_id.to_string(), listing.clone());
        Ok(listing.clone())
    }

    async fn delete_by_id(&self, listing_id: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Dynamo("ProvisionedThroughputExceeded".to_string()));
        }
        self.rows.lock().unwrap().remove(listing_id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Listing>, StoreError> {
        Ok(self.rows.lock().unwrap().values().cloned().collect())
    }

    async fn list_by_owner(&self, user_id: &str) -> Result<Vec<Listing>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.user_ref == user_id)
            .cloned()
            .collect())
    }

    async fn find_by_image(&self, image: &ImageRecord) -> Result<Option<Listing>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|l| l.image_urls.contains(image))
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryUsers {
    pub rows: Mutex<HashMap<String, User>>,
}

impl MemoryUsers {
    pub fn with(users: Vec<User>) -> Self {
        let repo = Self::default();
        for user in users {
            repo.rows.lock().unwrap().insert(user.user_id.clone(), user);
        }
        repo
    }

    pub fn get(&self, user_id: &str) -> Option<User> {
        self.rows.lock().unwrap().get(user_id).cloned()
    }
}

#[async_trait]
impl UserRepository for MemoryUsers {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        self.rows
            .lock()
            .unwrap()
            .insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.get(user_id))
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if !rows.contains_key(&user.user_id) {
            return Err(StoreError::NotFound);
        }
        rows.insert(user.user_id.clone(), user.clone());
        Ok(user.clone())
    }

    async fn delete_by_id(&self, user_id: &str) -> Result<(), StoreError> {
        self.rows.lock().unwrap().remove(user_id);
        Ok(())
    }
}

pub fn reconciler(store: &Arc<FakeStore>) -> ImageReconciler {
    ImageReconciler::new(store.clone())
}

pub fn record(id: &str) -> ImageRecord {
    ImageRecord {
        url: format!("https://cdn.test/{}", id),
        public_id: id.to_string(),
    }
}

/// A PNG-looking payload whose last byte is `tag`.
pub fn png_upload(tag: u8) -> ImageUpload {
    let mut bytes = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
    bytes.push(tag);
    ImageUpload {
        data: STANDARD.encode(bytes),
        content_type: Some("image/png".to_string()),
        file_name: Some(format!("photo-{}.png", tag)),
    }
}

pub fn png_json(tag: u8) -> serde_json::Value {
    serde_json::json!({ "data": png_upload(tag).data, "content_type": "image/png" })
}

pub fn listing(listing_id: &str, owner: &str, images: &[&str]) -> Listing {
    Listing {
        listing_id: listing_id.to_string(),
        user_ref: owner.to_string(),
        name: "Seaside cottage".to_string(),
        description: "Two bedrooms by the water".to_string(),
        address: "12 Shore Rd".to_string(),
        listing_type: ListingType::Rent,
        bedrooms: 2,
        bathrooms: 1,
        regular_price: 1800,
        discount_price: 0,
        offer: false,
        parking: true,
        furnished: false,
        image_urls: images.iter().map(|id| record(id)).collect(),
        listing_created_at: "2026-01-01T00:00:00+00:00".to_string(),
        listing_updated_at: "2026-01-01T00:00:00+00:00".to_string(),
    }
}

pub fn user(user_id: &str, avatar_public_id: Option<&str>) -> User {
    User {
        user_id: user_id.to_string(),
        user_name: "ana".to_string(),
        user_email: "ana@example.com".to_string(),
        login_name: "ana@example.com".to_string(),
        avatar: match avatar_public_id {
            Some(id) => format!("https://cdn.test/{}", id),
            None => DEFAULT_AVATAR.to_string(),
        },
        avatar_public_id: avatar_public_id.map(str::to_string),
        user_created_at: "2026-01-01T00:00:00+00:00".to_string(),
    }
}
