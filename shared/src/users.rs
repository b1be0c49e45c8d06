use estate_atoms::users::UpdateUserPayload;
use lambda_http::{http::StatusCode, Body, Error, Response};
use listings_block::response::{error_response, json_response, parse_body, respond};
use listings_block::users::{delete_account, ensure_self, update_profile};
use listings_block::ApiError;

use crate::auth::{self, AuthError};
use crate::AppState;

/// HTTP Handler: PATCH /users/{id}
///
/// A new password goes to Cognito first; profile fields are written after.
pub async fn update_user(
    state: &AppState,
    caller_id: &str,
    target_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let payload: UpdateUserPayload = match parse_body(body) {
        Ok(payload) => payload,
        Err(e) => return e.into_response(),
    };
    if let Err(e) = ensure_self(caller_id, target_id, "You can only update your own account.") {
        return e.into_response();
    }

    if let Some(password) = payload.password.as_deref() {
        let user = match state.users.find_by_id(target_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return error_response(StatusCode::NOT_FOUND, "User not found"),
            Err(e) => return ApiError::from(e).into_response(),
        };
        match auth::set_password(&state.cognito_client, &state.config, &user.login_name, password).await {
            Ok(()) => tracing::info!("🔐 Password changed for user {}", target_id),
            Err(AuthError::Invalid(msg)) => return error_response(StatusCode::BAD_REQUEST, &msg),
            Err(e) => {
                tracing::error!("❌ Failed to set password for {}: {}", target_id, e);
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong");
            }
        }
    }

    respond(
        StatusCode::OK,
        update_profile(state.users.as_ref(), caller_id, target_id, &payload).await,
    )
}

/// HTTP Handler: DELETE /users/{id}
pub async fn delete_user(
    state: &AppState,
    caller_id: &str,
    target_id: &str,
) -> Result<Response<Body>, Error> {
    let user = match delete_account(state.users.as_ref(), &state.avatars, caller_id, target_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "User not found"),
        Err(e) => return e.into_response(),
    };

    if let Err(e) = auth::delete_identity(&state.cognito_client, &state.config, &user.login_name).await {
        tracing::warn!("⚠️ Cognito identity {} not removed: {}", user.login_name, e);
    }

    let mut resp = json_response(
        StatusCode::OK,
        &serde_json::json!({ "message": "User has been deleted!!!" }),
    )?;
    for cookie in auth::clear_auth_cookies() {
        if let Ok(v) = cookie.parse() {
            resp.headers_mut().append("Set-Cookie", v);
        }
    }
    Ok(resp)
}
