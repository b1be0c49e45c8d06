use estate_atoms::listings::{Listing, ListingRepository};
use estate_atoms::media::{decode_upload, ImageReconciler, ImageRecord, ImageSlot, ImageUpload};
use estate_atoms::users::{UpdateUserPayload, User, UserContact, UserRepository};
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::response::{parse_body, respond};

#[derive(Debug, Deserialize)]
pub struct UploadAvatarRequest {
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub message: &'static str,
    pub avatar_url: String,
    pub user: User,
}

/// Public contact card for a listing's owner.
pub async fn get_contact(repo: &dyn UserRepository, user_id: &str) -> Result<UserContact, ApiError> {
    let user = find_user(repo, user_id).await?;
    Ok(UserContact::from(&user))
}

/// Apply profile changes. Passwords live with the identity provider and are
/// handled by the caller before this runs.
pub async fn update_profile(
    repo: &dyn UserRepository,
    caller_id: &str,
    target_id: &str,
    payload: &UpdateUserPayload,
) -> Result<User, ApiError> {
    ensure_self(caller_id, target_id, "You can only update your own account.")?;
    let mut user = find_user(repo, target_id).await?;

    if let Some(name) = &payload.user_name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("user_name cannot be empty".to_string()));
        }
        user.user_name = name.trim().to_string();
    }
    if let Some(email) = &payload.user_email {
        if !is_valid_email(email) {
            return Err(ApiError::Validation(
                "Please provide a valid email address".to_string(),
            ));
        }
        user.user_email = email.trim().to_string();
    }

    Ok(repo.update(&user).await?)
}

/// Replace the caller's avatar. The new image is stored first; the old asset
/// is deleted only after the record points at the new one.
pub async fn upload_avatar(
    repo: &dyn UserRepository,
    avatars: &ImageReconciler,
    max_image_bytes: usize,
    caller_id: &str,
    req: UploadAvatarRequest,
) -> Result<AvatarResponse, ApiError> {
    let upload = req
        .image
        .ok_or_else(|| ApiError::Validation("No file uploaded".to_string()))?;
    let blob = decode_upload(&upload, max_image_bytes)?;

    let mut user = find_user(repo, caller_id).await?;
    let previous = user.avatar_public_id.clone().map(|public_id| ImageRecord {
        url: user.avatar.clone(),
        public_id,
    });

    let batch = avatars
        .upload_batch(vec![blob], 1)
        .await
        .map_err(|_| ApiError::UploadFailed("Cloud upload failed".to_string()))?;
    let Some(fresh) = batch.accepted.into_iter().next() else {
        return Err(ApiError::UploadFailed("Cloud upload failed".to_string()));
    };

    user.avatar = fresh.url.clone();
    user.avatar_public_id = Some(fresh.public_id.clone());
    let user = repo.update(&user).await?;

    if let Some(previous) = previous {
        avatars
            .reconcile_on_update(&[previous], &[ImageSlot::Stored(fresh.clone())])
            .await;
    }

    Ok(AvatarResponse {
        message: "Avatar updated successfully",
        avatar_url: fresh.url,
        user,
    })
}

/// Remove the caller's profile record and avatar asset. Returns the removed
/// user, if there was one, so the caller can drop the login identity too.
pub async fn delete_account(
    repo: &dyn UserRepository,
    avatars: &ImageReconciler,
    caller_id: &str,
    target_id: &str,
) -> Result<Option<User>, ApiError> {
    ensure_self(caller_id, target_id, "You can only delete your own account!")?;

    let Some(user) = repo.find_by_id(target_id).await? else {
        return Ok(None);
    };

    if let Some(public_id) = &user.avatar_public_id {
        avatars
            .reconcile_on_delete(&[ImageRecord {
                url: user.avatar.clone(),
                public_id: public_id.clone(),
            }])
            .await;
    }
    repo.delete_by_id(target_id).await?;
    tracing::info!("🗑️ Deleted user {}", target_id);

    Ok(Some(user))
}

pub async fn user_listings(
    listings: &dyn ListingRepository,
    caller_id: &str,
    target_id: &str,
) -> Result<Vec<Listing>, ApiError> {
    ensure_self(caller_id, target_id, "You can only view your own listings")?;
    Ok(listings.list_by_owner(target_id).await?)
}

// ---------- handlers ----------

/// HTTP Handler: GET /users/{id}
pub async fn get_contact_handler(
    repo: &dyn UserRepository,
    user_id: &str,
) -> Result<Response<Body>, Error> {
    respond(StatusCode::OK, get_contact(repo, user_id).await)
}

/// HTTP Handler: POST /users/avatar
pub async fn upload_avatar_handler(
    repo: &dyn UserRepository,
    avatars: &ImageReconciler,
    max_image_bytes: usize,
    caller_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let result = match parse_body::<UploadAvatarRequest>(body) {
        Ok(req) => upload_avatar(repo, avatars, max_image_bytes, caller_id, req).await,
        Err(e) => Err(e),
    };
    respond(StatusCode::OK, result)
}

/// HTTP Handler: GET /users/{id}/listings
pub async fn user_listings_handler(
    listings: &dyn ListingRepository,
    caller_id: &str,
    target_id: &str,
) -> Result<Response<Body>, Error> {
    respond(StatusCode::OK, user_listings(listings, caller_id, target_id).await)
}

pub fn ensure_self(caller_id: &str, target_id: &str, denied: &str) -> Result<(), ApiError> {
    if caller_id != target_id {
        return Err(ApiError::Unauthorized(denied.to_string()));
    }
    Ok(())
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}

// PRIVATE FUNCTIONS

async fn find_user(repo: &dyn UserRepository, user_id: &str) -> Result<User, ApiError> {
    repo.find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_check() {
        assert!(is_valid_email("ana@example.com"));
        assert!(is_valid_email(" ana@example.com "));
        assert!(!is_valid_email("ana"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ana@localhost"));
        assert!(!is_valid_email("ana@example."));
    }

    #[test]
    fn test_ensure_self() {
        assert!(ensure_self("u1", "u1", "no").is_ok());
        assert!(matches!(
            ensure_self("u1", "u2", "no"),
            Err(ApiError::Unauthorized(msg)) if msg == "no"
        ));
    }
}
