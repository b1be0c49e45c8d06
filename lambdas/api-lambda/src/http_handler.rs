use std::sync::Arc;

use estate_atoms::listings::ListingQuery;
use estate_shared::{auth, users as account, AppState};
use lambda_http::http::header::{HeaderValue, SET_COOKIE, VARY};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use listings_block::response::{method_not_allowed, not_found};
use listings_block::{listings, users};

fn with_set_cookies(mut resp: Response<Body>, cookies: &[String]) -> Response<Body> {
    let headers = resp.headers_mut();
    for cookie in cookies {
        if let Ok(v) = HeaderValue::from_str(cookie) {
            headers.append(SET_COOKIE, v);
        }
    }
    resp
}

fn with_cors_headers(
    mut resp: Response<Body>,
    allowed_origins: &[String],
    request_origin: Option<&str>,
) -> Response<Body> {
    let cors_origin = auth::get_cors_origin(allowed_origins, request_origin);

    let headers = resp.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&cors_origin) {
        headers.insert("Access-Control-Allow-Origin", v);
    }
    headers.insert("Access-Control-Allow-Credentials", HeaderValue::from_static("true"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET,POST,PATCH,DELETE,OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type,Authorization,Cookie"),
    );
    headers.append(VARY, HeaderValue::from_static("Origin"));

    resp
}

/// Main Lambda handler - routes auth, public and authenticated requests
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    let body: &[u8] = event.body();
    let request_origin = event.headers().get("Origin").and_then(|v| v.to_str().ok());
    let cookie_header = event.headers().get("Cookie").and_then(|v| v.to_str().ok());
    let origins = state.config.allowed_origins.as_slice();
    let limits = state.config.limits;
    tracing::info!("🚀 Estate API invoked - Method: {} Path: {}", method, path);

    let finalize = |resp: Result<Response<Body>, Error>, cookies: &[String]| {
        resp.map(|r| with_cors_headers(with_set_cookies(r, cookies), origins, request_origin))
    };

    // Handle CORS preflight
    if *method == Method::OPTIONS {
        let resp = Response::builder()
            .status(StatusCode::OK)
            .body(Body::Empty)
            .map_err(Box::new)?;
        return Ok(with_cors_headers(resp, origins, request_origin));
    }

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    // Auth endpoints (no session required)
    if let ["signup" | "login" | "refresh" | "logout"] = parts.as_slice() {
        if *method != Method::POST {
            return finalize(method_not_allowed(), &[]);
        }
        let resp = match parts[0] {
            "signup" => auth::signup(&state.cognito_client, state.users.as_ref(), &state.config, body).await,
            "login" => auth::login(&state.cognito_client, state.users.as_ref(), &state.config, body).await,
            "refresh" => auth::refresh_token(&state.cognito_client, &state.config, cookie_header).await,
            _ => auth::logout(),
        };
        return finalize(resp, &[]);
    }

    // Public reads
    match (method, parts.as_slice()) {
        // GET /listings - search
        (&Method::GET, ["listings"]) => {
            let params = event.query_string_parameters_ref();
            let query = ListingQuery::from_lookup(|key| params.and_then(|p| p.first(key)));
            return finalize(
                listings::search_listings_handler(state.listings.as_ref(), &query).await,
                &[],
            );
        }
        // GET /listings/{id}
        (&Method::GET, ["listings", listing_id]) => {
            return finalize(
                listings::get_listing_handler(state.listings.as_ref(), listing_id).await,
                &[],
            );
        }
        // GET /users/{id} - landlord contact card
        (&Method::GET, ["users", user_id]) if *user_id != "avatar" => {
            return finalize(
                users::get_contact_handler(state.users.as_ref(), user_id).await,
                &[],
            );
        }
        _ => {}
    }

    // Everything else requires a session (cookie auth + auto-refresh)
    let auth_ctx = match auth::authenticate_cookie_request(
        &state.cognito_client,
        &state.config,
        cookie_header,
    )
    .await
    {
        Ok(ctx) => ctx,
        Err(resp) => return Ok(with_cors_headers(resp, origins, request_origin)),
    };
    let user_id = auth_ctx.user_id.as_str();

    let resp = match (method, parts.as_slice()) {
        // --- LISTINGS ---
        // POST /listings/upload-images
        (&Method::POST, ["listings", "upload-images"]) => {
            listings::upload_images_handler(&state.listing_images, limits, body).await
        }
        // POST /listings
        (&Method::POST, ["listings"]) => {
            listings::create_listing_handler(
                state.listings.as_ref(),
                &state.listing_images,
                limits,
                user_id,
                body,
            )
            .await
        }
        // PATCH /listings/{id}
        (&Method::PATCH, ["listings", listing_id]) => {
            listings::update_listing_handler(
                state.listings.as_ref(),
                &state.listing_images,
                limits,
                user_id,
                listing_id,
                body,
            )
            .await
        }
        // DELETE /listings/{id}
        (&Method::DELETE, ["listings", listing_id]) => {
            listings::delete_listing_handler(
                state.listings.as_ref(),
                &state.listing_images,
                user_id,
                listing_id,
            )
            .await
        }

        // --- USERS ---
        // POST /users/avatar
        (&Method::POST, ["users", "avatar"]) => {
            users::upload_avatar_handler(
                state.users.as_ref(),
                &state.avatars,
                limits.max_image_bytes,
                user_id,
                body,
            )
            .await
        }
        // PATCH /users/{id}
        (&Method::PATCH, ["users", target_id]) => {
            account::update_user(&state, user_id, target_id, body).await
        }
        // DELETE /users/{id}
        (&Method::DELETE, ["users", target_id]) => {
            account::delete_user(&state, user_id, target_id).await
        }
        // GET /users/{id}/listings
        (&Method::GET, ["users", target_id, "listings"]) => {
            users::user_listings_handler(state.listings.as_ref(), user_id, target_id).await
        }

        (_, ["listings", ..]) | (_, ["users", ..]) => method_not_allowed(),
        _ => {
            tracing::warn!("⚠️ No route matched - Method: {} Path: {}", method, path);
            not_found()
        }
    };

    finalize(resp, &auth_ctx.set_cookies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_and_cookies_are_attached() {
        let origins = vec!["https://estate.app".to_string()];
        let resp = Response::builder().status(200).body(Body::Empty).unwrap();
        let resp = with_set_cookies(resp, &["access_token=new".to_string()]);
        let resp = with_cors_headers(resp, &origins, Some("https://evil.test"));

        assert_eq!(resp.headers()["Access-Control-Allow-Origin"], "https://estate.app");
        assert_eq!(resp.headers()["Access-Control-Allow-Credentials"], "true");
        assert_eq!(resp.headers()[SET_COOKIE], "access_token=new");
    }
}
