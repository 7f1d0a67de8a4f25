/// The signed-in user's own account
///
/// - `GET  /v1/me`: profile
/// - `GET  /v1/me/dashboard`: document counts
/// - `PUT  /v1/me/identity`: first and last name
/// - `POST /v1/me/password-change`: email a password change link
/// - `POST /v1/me/email-change`: start the double-confirmed email change
///
/// The profile deliberately leaves out any pending email change, so the
/// answer to an email change request cannot be told apart by reading it.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use atelier_shared::{
    account::{self, IDENTITY_UPDATED, PASSWORD_LINK_SENT},
    auth::middleware::AuthContext,
    models::{
        admin_document::AdminDocument,
        document::Document,
        user::{User, UserRole},
    },
};
use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub first_name: String,
    pub documents: i64,
    pub received_documents: i64,
}

#[derive(Debug, Deserialize)]
pub struct IdentityRequest {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub message: &'static str,
    pub profile: ProfileResponse,
}

#[derive(Debug, Deserialize)]
pub struct EmailChangeRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Loads the account behind the token
///
/// A token outliving its account (deleted by an admin) is treated as invalid.
pub async fn current_user(state: &AppState, auth: &AuthContext) -> ApiResult<User> {
    User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ProfileResponse>> {
    let user = current_user(&state, &auth).await?;
    Ok(Json(user.into()))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<DashboardResponse>> {
    let user = current_user(&state, &auth).await?;

    let documents = Document::count_by_owner(&state.db, user.id).await?;
    let received_documents = AdminDocument::count_for_recipient(&state.db, user.id).await?;

    Ok(Json(DashboardResponse {
        first_name: user.first_name,
        documents,
        received_documents,
    }))
}

pub async fn update_identity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<IdentityRequest>,
) -> ApiResult<Json<IdentityResponse>> {
    let user = account::update_identity(&state.db, auth.user_id, &req.first_name, &req.last_name)
        .await?;

    Ok(Json(IdentityResponse {
        message: IDENTITY_UPDATED,
        profile: user.into(),
    }))
}

pub async fn request_password_change(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MessageResponse>> {
    let user = current_user(&state, &auth).await?;

    account::request_password_change(&state.db, state.mailer.as_ref(), &state.links, &user).await?;

    Ok(Json(MessageResponse {
        message: PASSWORD_LINK_SENT,
    }))
}

/// Answers the same message whether or not the address is free
pub async fn request_email_change(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<EmailChangeRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let user = current_user(&state, &auth).await?;

    let outcome = account::request_email_change(
        &state.db,
        state.mailer.as_ref(),
        &state.links,
        &user,
        &req.email,
    )
    .await?;

    Ok(Json(MessageResponse {
        message: outcome.message(),
    }))
}
