use std::collections::{HashMap, HashSet};

use estate_atoms::listings::{
    apply_query, CreateListingPayload, Listing, ListingQuery, ListingRepository,
    UpdateListingPayload,
};
use estate_atoms::media::validate::DEFAULT_MAX_IMAGE_BYTES;
use estate_atoms::media::{
    decode_upload, normalize_entries, ImageBlob, ImageReconciler, ImageRecord, ImageSlot,
    ImageUpload,
};
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::response::{parse_body, respond};

/// Per-listing image ceilings enforced by the flows below.
#[derive(Debug, Clone, Copy)]
pub struct ListingLimits {
    pub max_images: usize,
    pub max_image_bytes: usize,
}

impl Default for ListingLimits {
    fn default() -> Self {
        Self {
            max_images: 6,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadImagesRequest {
    #[serde(default)]
    pub images: Vec<ImageUpload>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct UploadImagesResponse {
    pub success: bool,
    pub image_urls: Vec<ImageRecord>,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

// ---------- flows ----------

/// Upload a batch of listing images ahead of create/update.
pub async fn upload_images(
    reconciler: &ImageReconciler,
    limits: ListingLimits,
    req: UploadImagesRequest,
) -> Result<UploadImagesResponse, ApiError> {
    if req.images.is_empty() {
        return Err(ApiError::Validation("No images provided".to_string()));
    }
    if req.images.len() > limits.max_images {
        return Err(ApiError::Validation(format!(
            "Max {} images allowed",
            limits.max_images
        )));
    }

    let blobs = req
        .images
        .iter()
        .map(|upload| decode_upload(upload, limits.max_image_bytes))
        .collect::<Result<Vec<_>, _>>()?;

    let batch = reconciler.upload_batch(blobs, limits.max_images).await?;
    tracing::info!(
        "📤 Uploaded {} listing image(s), {} rejected",
        batch.accepted.len(),
        batch.rejected
    );

    Ok(UploadImagesResponse {
        success: true,
        image_urls: batch.accepted,
    })
}

pub async fn create_listing(
    repo: &dyn ListingRepository,
    reconciler: &ImageReconciler,
    limits: ListingLimits,
    user_id: &str,
    payload: CreateListingPayload,
) -> Result<Listing, ApiError> {
    let now = chrono::Utc::now().to_rfc3339();
    let mut listing = Listing {
        listing_id: uuid::Uuid::new_v4().to_string(),
        user_ref: user_id.to_string(),
        name: payload.name,
        description: payload.description,
        address: payload.address,
        listing_type: payload.listing_type,
        bedrooms: payload.bedrooms,
        bathrooms: payload.bathrooms,
        regular_price: payload.regular_price,
        discount_price: payload.discount_price,
        offer: payload.offer,
        parking: payload.parking,
        furnished: payload.furnished,
        image_urls: Vec::new(),
        listing_created_at: now.clone(),
        listing_updated_at: now,
    };
    validate_listing(&listing)?;

    let slots = normalize_entries(&payload.image_urls, limits.max_image_bytes)?;
    check_image_count(slots.len(), limits)?;

    // Stored entries come from an earlier upload-images call and must still be unclaimed
    check_stored_unclaimed(repo, reconciler, &slots).await?;

    let uploaded = upload_pending(reconciler, &slots).await?;
    let mut uploaded = uploaded.into_iter();
    let mut seen = HashSet::new();
    for slot in slots {
        match slot {
            ImageSlot::Stored(record) => {
                if seen.insert(record.public_id.clone()) {
                    listing.image_urls.push(record);
                }
            }
            ImageSlot::Pending(_) => listing.image_urls.extend(uploaded.next().flatten()),
        }
    }

    repo.create(&listing).await?;
    tracing::info!(
        "✅ Created listing {} for user {} with {} image(s)",
        listing.listing_id,
        user_id,
        listing.image_urls.len()
    );
    Ok(listing)
}

pub async fn get_listing(repo: &dyn ListingRepository, listing_id: &str) -> Result<Listing, ApiError> {
    repo.find_by_id(listing_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Listing not found!".to_string()))
}

pub async fn search_listings(
    repo: &dyn ListingRepository,
    query: &ListingQuery,
) -> Result<Vec<Listing>, ApiError> {
    // Full scan filtered in memory; fine for a few thousand rows, past that
    // the filters belong in a GSI query
    let listings = repo.list_all().await?;
    Ok(apply_query(listings, query))
}

/// Update a listing owned by `user_id`, reconciling its image set.
///
/// Order matters: pending uploads run first so a total upload failure aborts
/// before anything is deleted. Removed assets are then deleted best-effort
/// and the record is written last. A failed write is reported but the remote
/// changes already made are not rolled back.
pub async fn update_listing(
    repo: &dyn ListingRepository,
    reconciler: &ImageReconciler,
    limits: ListingLimits,
    user_id: &str,
    listing_id: &str,
    payload: UpdateListingPayload,
) -> Result<Listing, ApiError> {
    let mut listing =
        load_owned(repo, listing_id, user_id, "You can only update your own listings!").await?;

    payload.apply_fields(&mut listing);
    validate_listing(&listing)?;

    if let Some(entries) = &payload.image_urls {
        let slots = normalize_entries(entries, limits.max_image_bytes)?;

        let preview = ImageReconciler::plan_update(&listing.image_urls, &slots);
        let pending = slots
            .iter()
            .filter(|slot| matches!(slot, ImageSlot::Pending(_)))
            .count();
        check_image_count(preview.retained.len() + pending, limits)?;

        let uploaded = upload_pending(reconciler, &slots).await?;
        let plan = reconciler
            .reconcile_on_update(&listing.image_urls, &slots)
            .await;

        listing.image_urls = assemble_images(&slots, plan.retained, uploaded);
    }

    listing.listing_updated_at = chrono::Utc::now().to_rfc3339();
    let updated = repo.update_by_id(listing_id, &listing).await?;
    tracing::info!("✅ Updated listing {}", listing_id);
    Ok(updated)
}

/// Delete a listing owned by `user_id` together with its remote images.
pub async fn delete_listing(
    repo: &dyn ListingRepository,
    reconciler: &ImageReconciler,
    user_id: &str,
    listing_id: &str,
) -> Result<(), ApiError> {
    let listing =
        load_owned(repo, listing_id, user_id, "You can only delete your own listings!").await?;

    // Image deletion is best-effort; the record goes regardless
    reconciler.reconcile_on_delete(&listing.image_urls).await;
    repo.delete_by_id(listing_id).await?;

    tracing::info!(
        "🗑️ Deleted listing {} and {} image(s)",
        listing_id,
        listing.image_urls.len()
    );
    Ok(())
}

// ---------- handlers ----------

/// HTTP Handler: POST /listings/upload-images
pub async fn upload_images_handler(
    reconciler: &ImageReconciler,
    limits: ListingLimits,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let result = match parse_body::<UploadImagesRequest>(body) {
        Ok(req) => upload_images(reconciler, limits, req).await,
        Err(e) => Err(e),
    };
    respond(StatusCode::OK, result)
}

/// HTTP Handler: POST /listings
pub async fn create_listing_handler(
    repo: &dyn ListingRepository,
    reconciler: &ImageReconciler,
    limits: ListingLimits,
    user_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let result = match parse_body::<CreateListingPayload>(body) {
        Ok(payload) => create_listing(repo, reconciler, limits, user_id, payload).await,
        Err(e) => Err(e),
    };
    respond(StatusCode::CREATED, result)
}

/// HTTP Handler: GET /listings/{id}
pub async fn get_listing_handler(
    repo: &dyn ListingRepository,
    listing_id: &str,
) -> Result<Response<Body>, Error> {
    respond(StatusCode::OK, get_listing(repo, listing_id).await)
}

/// HTTP Handler: GET /listings
pub async fn search_listings_handler(
    repo: &dyn ListingRepository,
    query: &ListingQuery,
) -> Result<Response<Body>, Error> {
    respond(StatusCode::OK, search_listings(repo, query).await)
}

/// HTTP Handler: PATCH /listings/{id}
pub async fn update_listing_handler(
    repo: &dyn ListingRepository,
    reconciler: &ImageReconciler,
    limits: ListingLimits,
    user_id: &str,
    listing_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let result = match parse_body::<UpdateListingPayload>(body) {
        Ok(payload) => update_listing(repo, reconciler, limits, user_id, listing_id, payload).await,
        Err(e) => Err(e),
    };
    respond(StatusCode::OK, result)
}

/// HTTP Handler: DELETE /listings/{id}
pub async fn delete_listing_handler(
    repo: &dyn ListingRepository,
    reconciler: &ImageReconciler,
    user_id: &str,
    listing_id: &str,
) -> Result<Response<Body>, Error> {
    let result = delete_listing(repo, reconciler, user_id, listing_id)
        .await
        .map(|_| MessageResponse {
            message: "Listing and all images deleted successfully",
        });
    respond(StatusCode::OK, result)
}

// PRIVATE FUNCTIONS

async fn load_owned(
    repo: &dyn ListingRepository,
    listing_id: &str,
    user_id: &str,
    denied: &str,
) -> Result<Listing, ApiError> {
    let listing = get_listing(repo, listing_id).await?;
    if listing.user_ref != user_id {
        tracing::warn!(
            "User {} denied access to listing {} owned by {}",
            user_id,
            listing_id,
            listing.user_ref
        );
        return Err(ApiError::Unauthorized(denied.to_string()));
    }
    Ok(listing)
}

fn validate_listing(listing: &Listing) -> Result<(), ApiError> {
    let required = [
        ("name", &listing.name),
        ("description", &listing.description),
        ("address", &listing.address),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ApiError::Validation(format!("{} is required", field)));
        }
    }
    if listing.bedrooms == 0 || listing.bathrooms == 0 {
        return Err(ApiError::Validation(
            "A listing needs at least one bedroom and one bathroom".to_string(),
        ));
    }
    if listing.offer && listing.discount_price > listing.regular_price {
        return Err(ApiError::Validation(
            "Discount price must be lower than regular price".to_string(),
        ));
    }
    Ok(())
}

/// Stored entries on a new listing must be assets the host issued that no
/// other listing holds, or deleting that listing would delete them too.
async fn check_stored_unclaimed(
    repo: &dyn ListingRepository,
    reconciler: &ImageReconciler,
    slots: &[ImageSlot],
) -> Result<(), ApiError> {
    let mut checked = HashSet::new();
    for slot in slots {
        let ImageSlot::Stored(record) = slot else {
            continue;
        };
        if !checked.insert(record.public_id.as_str()) {
            continue;
        }
        if !reconciler.owns(record) {
            tracing::warn!("⚠️ Rejected foreign image reference {}", record.public_id);
            return Err(ApiError::Validation("Invalid image reference".to_string()));
        }
        if let Some(holder) = repo.find_by_image(record).await? {
            tracing::warn!(
                "⚠️ Image {} already belongs to listing {}",
                record.public_id,
                holder.listing_id
            );
            return Err(ApiError::Validation(
                "Image already belongs to another listing".to_string(),
            ));
        }
    }
    Ok(())
}

fn check_image_count(count: usize, limits: ListingLimits) -> Result<(), ApiError> {
    if count == 0 {
        return Err(ApiError::Validation(
            "You must upload at least one image".to_string(),
        ));
    }
    if count > limits.max_images {
        return Err(ApiError::Validation(format!(
            "Max {} images allowed",
            limits.max_images
        )));
    }
    Ok(())
}

/// Upload the pending slots. One entry per pending slot, in slot order;
/// `None` marks a failed upload. Fails only if every upload failed.
async fn upload_pending(
    reconciler: &ImageReconciler,
    slots: &[ImageSlot],
) -> Result<Vec<Option<ImageRecord>>, ApiError> {
    let blobs: Vec<ImageBlob> = slots
        .iter()
        .filter_map(|slot| match slot {
            ImageSlot::Pending(blob) => Some(blob.clone()),
            ImageSlot::Stored(_) => None,
        })
        .collect();
    if blobs.is_empty() {
        return Ok(Vec::new());
    }

    let results = reconciler.upload_each(blobs).await;
    if results.iter().all(Result::is_err) {
        return Err(ApiError::UploadFailed("Upload failed".to_string()));
    }

    Ok(results
        .into_iter()
        .map(|result| match result {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Dropping image that failed to upload: {}", e);
                None
            }
        })
        .collect())
}

/// Final display order: walk the client's list, placing retained records and
/// fresh uploads where they were asked for. Ids the listing never owned are
/// dropped.
fn assemble_images(
    slots: &[ImageSlot],
    retained: Vec<ImageRecord>,
    uploaded: Vec<Option<ImageRecord>>,
) -> Vec<ImageRecord> {
    let mut retained: HashMap<String, ImageRecord> = retained
        .into_iter()
        .map(|record| (record.public_id.clone(), record))
        .collect();
    let mut uploaded = uploaded.into_iter();

    let mut images = Vec::with_capacity(slots.len());
    for slot in slots {
        match slot {
            ImageSlot::Stored(record) => match retained.remove(&record.public_id) {
                Some(stored) => images.push(stored),
                None => tracing::warn!("Ignoring image {} not held by this listing", record.public_id),
            },
            ImageSlot::Pending(_) => images.extend(uploaded.next().flatten()),
        }
    }
    images
}
