/// Authentication endpoints
///
/// - `POST /v1/auth/register`: create a user account and sign in
/// - `POST /v1/auth/login`: exchange credentials for tokens
/// - `POST /v1/auth/refresh`: exchange a refresh token for an access token
///
/// Tokens carry the account role; `landing` tells the client where the
/// account should go after signing in.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use atelier_shared::{
    account::identity::normalize_name,
    auth::{jwt, password},
    models::user::{CreateUser, User, UserRole},
};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        email(message = "Invalid email format"),
        length(max = 180, message = "Email must be at most 180 characters")
    )]
    pub email: String,

    pub password: String,

    pub first_name: String,

    pub last_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Tokens returned by register and login
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: Uuid,

    pub role: UserRole,

    /// Access token (24h)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,

    /// Client route for this role
    pub landing: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

fn issue_session(user: &User, secret: &str) -> ApiResult<SessionResponse> {
    let access = jwt::Claims::new(user.id, user.role, jwt::TokenType::Access);
    let refresh = jwt::Claims::new(user.id, user.role, jwt::TokenType::Refresh);

    Ok(SessionResponse {
        user_id: user.id,
        role: user.role,
        access_token: jwt::create_token(&access, secret)?,
        refresh_token: jwt::create_token(&refresh, secret)?,
        landing: user.role.landing_path(),
    })
}

/// Registers a `user` account
///
/// # Errors
///
/// - `422`: invalid email, weak password or missing names
/// - `409`: email already registered
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    req.validate()?;

    password::validate_password_strength(&req.password)
        .map_err(|msg| ApiError::invalid_field("password", msg))?;

    let first_name = normalize_name("first_name", &req.first_name)?;
    let last_name = normalize_name("last_name", &req.last_name)?;
    let email = req.email.trim().to_lowercase();

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email,
            password_hash,
            first_name,
            last_name,
            role: UserRole::User,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "account registered");

    Ok((StatusCode::CREATED, Json(issue_session(&user, state.jwt_secret())?)))
}

/// Signs in with email and password
///
/// Unknown email and wrong password answer the same 401.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    req.validate()?;

    let email = req.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "login refused: wrong password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "login");

    Ok(Json(issue_session(&user, state.jwt_secret())?))
}

/// Exchanges a refresh token for an access token
///
/// The account is reloaded: a deleted account gets 401 and the new token
/// carries the role the account has now.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let user = User::find_by_id(&state.db, claims.sub).await?.ok_or_else(|| {
        tracing::warn!(user_id = %claims.sub, "refresh refused: account no longer exists");
        ApiError::Unauthorized("Account no longer exists".to_string())
    })?;

    if user.role != claims.role {
        tracing::info!(user_id = %user.id, role = user.role.as_str(), "role changed since sign-in");
    }

    let access_token = jwt::refresh_access_token(&claims, user.role, state.jwt_secret())?;

    Ok(Json(RefreshResponse { access_token }))
}
