use aws_sdk_cognitoidentityprovider::error::ProvideErrorMetadata;
use aws_sdk_cognitoidentityprovider::types::{AttributeType, AuthFlowType};
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use estate_atoms::users::{User, UserRepository, DEFAULT_AVATAR};
use hmac::{Hmac, Mac};
use lambda_http::http::header::{HeaderValue, CONTENT_TYPE, SET_COOKIE};
use lambda_http::{http::StatusCode, Body, Error, Response};
use listings_block::response::error_response;
use listings_block::users::is_valid_email;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::config::Config;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
pub const USERNAME_COOKIE: &str = "username";

const REFRESH_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_ACCESS_MAX_AGE_SECS: i64 = 60 * 60;

/// Who is calling, plus any cookies refreshed while finding out.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub user_id: String,
    pub set_cookies: Vec<String>,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Invalid(String),

    #[error("Wrong credentials!")]
    BadCredentials,

    #[error("User already exists")]
    AlreadyExists,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Cognito error: {0}")]
    Cognito(String),
}

impl AuthError {
    fn status(&self) -> StatusCode {
        match self {
            AuthError::Invalid(_) | AuthError::AlreadyExists => StatusCode::BAD_REQUEST,
            AuthError::BadCredentials | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Cognito(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_response(self) -> Result<Response<Body>, Error> {
        let status = self.status();
        match &self {
            AuthError::Cognito(detail) => {
                tracing::error!("❌ Cognito failure: {}", detail);
                error_response(status, "Something went wrong")
            }
            _ => error_response(status, &self.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub user_name: String,
    pub user_email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_email: String,
    pub password: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// Cognito SECRET_HASH: base64(HMAC-SHA256(client_secret, username + client_id)).
pub fn secret_hash(username: &str, client_id: &str, client_secret: &str) -> Result<String, AuthError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(client_secret.as_bytes())
        .map_err(|e| AuthError::Cognito(e.to_string()))?;
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

pub fn auth_cookie(name: &str, value: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; Secure; SameSite=None; Max-Age={}",
        name, value, max_age_secs
    )
}

pub fn clear_cookie(name: &str) -> String {
    auth_cookie(name, "", 0)
}

pub fn clear_auth_cookies() -> Vec<String> {
    [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, USERNAME_COOKIE]
        .iter()
        .map(|name| clear_cookie(name))
        .collect()
}

/// Find `name` in a `Cookie` header.
pub fn parse_cookie(cookie_header: Option<&str>, name: &str) -> Option<String> {
    cookie_header?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Echo the request origin when it is allowed, otherwise the first allowed one.
pub fn get_cors_origin(allowed_origins: &[String], request_origin: Option<&str>) -> String {
    match request_origin {
        Some(origin) if allowed_origins.iter().any(|o| o == origin) => origin.to_string(),
        _ => allowed_origins
            .first()
            .cloned()
            .unwrap_or_else(|| "http://localhost:5173".to_string()),
    }
}

/// HTTP Handler: POST /signup
pub async fn signup(
    cognito: &CognitoClient,
    users: &dyn UserRepository,
    config: &Config,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: SignupRequest = match parse_request(body) {
        Ok(req) => req,
        Err(e) => return e.into_response(),
    };

    match register(cognito, users, config, req).await {
        Ok(user) => json_with_cookies(StatusCode::CREATED, &user, &[]),
        Err(e) => e.into_response(),
    }
}

/// HTTP Handler: POST /login
pub async fn login(
    cognito: &CognitoClient,
    users: &dyn UserRepository,
    config: &Config,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: LoginRequest = match parse_request(body) {
        Ok(req) => req,
        Err(e) => return e.into_response(),
    };

    let session = match password_login(cognito, config, &req).await {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };

    let user = match users.find_by_id(&session.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "User not found!"),
        Err(e) => {
            tracing::error!("❌ Failed to load user {}: {}", session.user_id, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong");
        }
    };

    tracing::info!("🔑 User {} logged in", user.user_id);
    json_with_cookies(StatusCode::OK, &user, &session.cookies)
}

/// HTTP Handler: POST /refresh
pub async fn refresh_token(
    cognito: &CognitoClient,
    config: &Config,
    cookie_header: Option<&str>,
) -> Result<Response<Body>, Error> {
    let refreshed = match refresh_session(cognito, config, cookie_header).await {
        Ok(ctx) => ctx,
        Err(e) => return e.into_response(),
    };
    json_with_cookies(
        StatusCode::OK,
        &serde_json::json!({ "user_id": refreshed.user_id }),
        &refreshed.set_cookies,
    )
}

/// HTTP Handler: POST /logout
pub fn logout() -> Result<Response<Body>, Error> {
    json_with_cookies(
        StatusCode::OK,
        &MessageResponse {
            message: "User has been logged out!",
        },
        &clear_auth_cookies(),
    )
}

/// Resolve the caller from the access token cookie, refreshing it when it
/// has expired. On failure returns the 401 response to send back.
pub async fn authenticate_cookie_request(
    cognito: &CognitoClient,
    config: &Config,
    cookie_header: Option<&str>,
) -> Result<AuthContext, Response<Body>> {
    if let Some(token) = parse_cookie(cookie_header, ACCESS_TOKEN_COOKIE) {
        match identify(cognito, &token).await {
            Ok((_, user_id)) => {
                return Ok(AuthContext {
                    user_id,
                    set_cookies: Vec::new(),
                })
            }
            Err(e) => tracing::info!("Access token rejected, trying refresh: {}", e),
        }
    }

    match refresh_session(cognito, config, cookie_header).await {
        Ok(ctx) => Ok(ctx),
        Err(e) => {
            tracing::warn!("⚠️ Authentication failed: {}", e);
            Err(unauthorized())
        }
    }
}

/// Set a new permanent password for `login_name`.
pub async fn set_password(
    cognito: &CognitoClient,
    config: &Config,
    login_name: &str,
    password: &str,
) -> Result<(), AuthError> {
    if password.len() < 8 {
        return Err(AuthError::Invalid(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    cognito
        .admin_set_user_password()
        .user_pool_id(&config.cognito_user_pool_id)
        .username(login_name)
        .password(password)
        .permanent(true)
        .send()
        .await
        .map_err(|e| match e.as_service_error() {
            Some(se) if se.is_invalid_password_exception() => {
                AuthError::Invalid(se.message().unwrap_or("Invalid password").to_string())
            }
            _ => AuthError::Cognito(e.to_string()),
        })?;
    Ok(())
}

/// Remove the login identity. Callers treat failure as non-fatal.
pub async fn delete_identity(
    cognito: &CognitoClient,
    config: &Config,
    login_name: &str,
) -> Result<(), AuthError> {
    cognito
        .admin_delete_user()
        .user_pool_id(&config.cognito_user_pool_id)
        .username(login_name)
        .send()
        .await
        .map_err(|e| AuthError::Cognito(e.to_string()))?;
    Ok(())
}

// PRIVATE FUNCTIONS

struct Session {
    user_id: String,
    cookies: Vec<String>,
}

fn parse_request<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, AuthError> {
    serde_json::from_slice(body).map_err(|e| AuthError::Invalid(format!("Invalid request body: {}", e)))
}

async fn register(
    cognito: &CognitoClient,
    users: &dyn UserRepository,
    config: &Config,
    req: SignupRequest,
) -> Result<User, AuthError> {
    let user_name = req.user_name.trim().to_string();
    let user_email = req.user_email.trim().to_lowercase();
    if user_name.is_empty() || req.password.is_empty() {
        return Err(AuthError::Invalid("All fields are required".to_string()));
    }
    if !is_valid_email(&user_email) {
        return Err(AuthError::Invalid(
            "Please provide a valid email address".to_string(),
        ));
    }

    let email_attr = AttributeType::builder()
        .name("email")
        .value(&user_email)
        .build()
        .map_err(|e| AuthError::Cognito(e.to_string()))?;

    let signed_up = cognito
        .sign_up()
        .client_id(&config.cognito_client_id)
        .secret_hash(secret_hash(
            &user_email,
            &config.cognito_client_id,
            &config.cognito_client_secret,
        )?)
        .username(&user_email)
        .password(&req.password)
        .user_attributes(email_attr)
        .send()
        .await
        .map_err(|e| match e.as_service_error() {
            Some(se) if se.is_username_exists_exception() => AuthError::AlreadyExists,
            Some(se) if se.is_invalid_password_exception() => {
                AuthError::Invalid(se.message().unwrap_or("Invalid password").to_string())
            }
            _ => AuthError::Cognito(e.to_string()),
        })?;
    let user_id = signed_up.user_sub().to_string();

    cognito
        .admin_confirm_sign_up()
        .user_pool_id(&config.cognito_user_pool_id)
        .username(&user_email)
        .send()
        .await
        .map_err(|e| AuthError::Cognito(e.to_string()))?;

    let user = User {
        user_id: user_id.clone(),
        user_name,
        user_email: user_email.clone(),
        login_name: user_email.clone(),
        avatar: DEFAULT_AVATAR.to_string(),
        avatar_public_id: None,
        user_created_at: chrono::Utc::now().to_rfc3339(),
    };

    if let Err(e) = users.create(&user).await {
        tracing::error!("❌ Failed to store user {}: {}", user_id, e);
        if let Err(cleanup) = delete_identity(cognito, config, &user_email).await {
            tracing::warn!("Orphaned Cognito identity {}: {}", user_email, cleanup);
        }
        return Err(AuthError::Cognito(format!("user record not stored: {}", e)));
    }

    tracing::info!("✅ Signed up user {}", user_id);
    Ok(user)
}

async fn password_login(
    cognito: &CognitoClient,
    config: &Config,
    req: &LoginRequest,
) -> Result<Session, AuthError> {
    let login_name = req.user_email.trim().to_lowercase();
    if login_name.is_empty() || req.password.is_empty() {
        return Err(AuthError::Invalid("All fields are required".to_string()));
    }

    let result = cognito
        .initiate_auth()
        .auth_flow(AuthFlowType::UserPasswordAuth)
        .client_id(&config.cognito_client_id)
        .auth_parameters("USERNAME", &login_name)
        .auth_parameters("PASSWORD", &req.password)
        .auth_parameters(
            "SECRET_HASH",
            secret_hash(&login_name, &config.cognito_client_id, &config.cognito_client_secret)?,
        )
        .send()
        .await
        .map_err(|e| match e.as_service_error() {
            Some(se) if se.is_not_authorized_exception() || se.is_user_not_found_exception() => {
                AuthError::BadCredentials
            }
            _ => AuthError::Cognito(e.to_string()),
        })?;

    let tokens = result
        .authentication_result()
        .ok_or_else(|| AuthError::Cognito("no authentication result".to_string()))?;
    let access_token = tokens
        .access_token()
        .ok_or_else(|| AuthError::Cognito("no access token".to_string()))?;
    let (username, user_id) = identify(cognito, access_token).await?;

    let mut cookies = vec![
        auth_cookie(ACCESS_TOKEN_COOKIE, access_token, access_max_age(tokens.expires_in())),
        auth_cookie(USERNAME_COOKIE, &username, REFRESH_MAX_AGE_SECS),
    ];
    if let Some(refresh) = tokens.refresh_token() {
        cookies.push(auth_cookie(REFRESH_TOKEN_COOKIE, refresh, REFRESH_MAX_AGE_SECS));
    }

    Ok(Session { user_id, cookies })
}

async fn refresh_session(
    cognito: &CognitoClient,
    config: &Config,
    cookie_header: Option<&str>,
) -> Result<AuthContext, AuthError> {
    let refresh = parse_cookie(cookie_header, REFRESH_TOKEN_COOKIE).ok_or(AuthError::Unauthorized)?;
    let username = parse_cookie(cookie_header, USERNAME_COOKIE).ok_or(AuthError::Unauthorized)?;

    let result = cognito
        .initiate_auth()
        .auth_flow(AuthFlowType::RefreshTokenAuth)
        .client_id(&config.cognito_client_id)
        .auth_parameters("REFRESH_TOKEN", refresh)
        .auth_parameters(
            "SECRET_HASH",
            secret_hash(&username, &config.cognito_client_id, &config.cognito_client_secret)?,
        )
        .send()
        .await
        .map_err(|e| match e.as_service_error() {
            Some(se) if se.is_not_authorized_exception() => AuthError::Unauthorized,
            _ => AuthError::Cognito(e.to_string()),
        })?;

    let tokens = result.authentication_result().ok_or(AuthError::Unauthorized)?;
    let access_token = tokens.access_token().ok_or(AuthError::Unauthorized)?;
    let (_, user_id) = identify(cognito, access_token).await?;

    tracing::info!("🔄 Refreshed session for user {}", user_id);
    Ok(AuthContext {
        user_id,
        set_cookies: vec![auth_cookie(
            ACCESS_TOKEN_COOKIE,
            access_token,
            access_max_age(tokens.expires_in()),
        )],
    })
}

/// Cognito username and `sub` for an access token.
async fn identify(cognito: &CognitoClient, access_token: &str) -> Result<(String, String), AuthError> {
    let out = cognito
        .get_user()
        .access_token(access_token)
        .send()
        .await
        .map_err(|e| match e.as_service_error() {
            Some(se) if se.is_not_authorized_exception() => AuthError::Unauthorized,
            _ => AuthError::Cognito(e.to_string()),
        })?;

    let sub = out
        .user_attributes()
        .iter()
        .find(|attr| attr.name() == "sub")
        .and_then(|attr| attr.value())
        .ok_or_else(|| AuthError::Cognito("user has no sub attribute".to_string()))?;

    Ok((out.username().to_string(), sub.to_string()))
}

fn access_max_age(expires_in: i32) -> i64 {
    if expires_in > 0 {
        i64::from(expires_in)
    } else {
        DEFAULT_ACCESS_MAX_AGE_SECS
    }
}

fn json_with_cookies<T: Serialize>(
    status: StatusCode,
    value: &T,
    cookies: &[String],
) -> Result<Response<Body>, Error> {
    let mut builder = Response::builder()
        .status(status)
        .header("Content-Type", "application/json");
    for cookie in cookies {
        builder = builder.header("Set-Cookie", cookie.as_str());
    }
    Ok(builder
        .body(serde_json::to_string(value)?.into())
        .map_err(Box::new)?)
}

fn unauthorized() -> Response<Body> {
    let mut resp = Response::new(Body::from(
        serde_json::json!({ "error": "Unauthorized" }).to_string(),
    ));
    *resp.status_mut() = StatusCode::UNAUTHORIZED;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for cookie in clear_auth_cookies() {
        if let Ok(v) = HeaderValue::from_str(&cookie) {
            resp.headers_mut().append(SET_COOKIE, v);
        }
    }
    resp
}
