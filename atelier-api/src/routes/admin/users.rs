/// Account management
///
/// - `GET    /v1/admin/users?limit=&offset=`
/// - `POST   /v1/admin/users`
/// - `GET    /v1/admin/users/:id`
/// - `PUT    /v1/admin/users/:id`: every field optional, password included
/// - `DELETE /v1/admin/users/:id`
///
/// Deleting an account cascades to its documents and deposits in the
/// database; the matching files are removed from disk afterwards.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use atelier_shared::{
    account::identity::normalize_name,
    auth::{middleware::AuthContext, password},
    models::{
        admin_document::AdminDocument,
        document::Document,
        user::{CreateUser, UpdateUser, User, UserRole},
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    fn bounds(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        email(message = "Invalid email format"),
        length(max = 180, message = "Email must be at most 180 characters")
    )]
    pub email: String,

    pub password: String,

    pub first_name: String,

    pub last_name: String,

    #[serde(default = "default_role")]
    pub role: UserRole,
}

fn default_role() -> UserRole {
    UserRole::User
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(
        email(message = "Invalid email format"),
        length(max = 180, message = "Email must be at most 180 characters")
    )]
    pub email: Option<String>,

    /// Left out or blank keeps the current password
    pub password: Option<String>,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    pub role: Option<UserRole>,
}

impl UpdateUserRequest {
    /// Checks and normalizes the request into a column update
    fn into_update(self) -> ApiResult<UpdateUser> {
        self.validate()?;

        let password_hash = match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(plain) => {
                password::validate_password_strength(plain)
                    .map_err(|msg| ApiError::invalid_field("password", msg))?;
                Some(password::hash_password(plain)?)
            }
            None => None,
        };

        Ok(UpdateUser {
            email: self.email.map(|email| email.trim().to_lowercase()),
            password_hash,
            first_name: self
                .first_name
                .map(|name| normalize_name("first_name", &name))
                .transpose()?,
            last_name: self
                .last_name
                .map(|name| normalize_name("last_name", &name))
                .transpose()?,
            role: self.role,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub message: &'static str,
    pub user: User,
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<UserPage>> {
    let (limit, offset) = page.bounds();

    Ok(Json(UserPage {
        users: User::list(&state.db, limit, offset).await?,
        total: User::count(&state.db).await?,
        limit,
        offset,
    }))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    req.validate()?;

    password::validate_password_strength(&req.password)
        .map_err(|msg| ApiError::invalid_field("password", msg))?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email.trim().to_lowercase(),
            password_hash: password::hash_password(&req.password)?,
            first_name: normalize_name("first_name", &req.first_name)?,
            last_name: normalize_name("last_name", &req.last_name)?,
            role: req.role,
        },
    )
    .await?;

    tracing::info!(admin_id = %auth.user_id, user_id = %user.id, role = user.role.as_str(), "account created by admin");

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: "User created.",
            user,
        }),
    ))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let update = req.into_update()?;
    let password_changed = update.password_hash.is_some();

    let user = User::update(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(admin_id = %auth.user_id, user_id = %id, password_changed, "account updated by admin");

    Ok(Json(UserResponse {
        message: "User updated.",
        user,
    }))
}

/// Deletes an account and its files; an admin cannot delete themselves
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if id == auth.user_id {
        return Err(ApiError::Forbidden(
            "You cannot delete your own account".to_string(),
        ));
    }

    let mut stored_names = Document::stored_names_for_owner(&state.db, id).await?;
    stored_names.extend(AdminDocument::stored_names_for_user(&state.db, id).await?);

    if !User::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    state.documents.remove_all_logged(&stored_names).await;

    tracing::info!(admin_id = %auth.user_id, user_id = %id, files = stored_names.len(), "account deleted by admin");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_bounds() {
        let page = Pagination {
            limit: None,
            offset: None,
        };
        assert_eq!(page.bounds(), (50, 0));

        let page = Pagination {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(page.bounds(), (200, 0));
    }

    #[test]
    fn test_update_without_password_keeps_it() {
        let req = UpdateUserRequest {
            email: None,
            password: Some(String::new()),
            first_name: Some("  Léa ".to_string()),
            last_name: None,
            role: Some(UserRole::Admin),
        };

        let update = req.into_update().unwrap();
        assert!(update.password_hash.is_none());
        assert_eq!(update.first_name.as_deref(), Some("Léa"));
        assert_eq!(update.role, Some(UserRole::Admin));
    }

    #[test]
    fn test_update_rejects_weak_password_and_bad_email() {
        let weak = UpdateUserRequest {
            email: None,
            password: Some("short".to_string()),
            first_name: None,
            last_name: None,
            role: None,
        };
        assert!(matches!(weak.into_update(), Err(ApiError::ValidationError(_))));

        let bad_email = UpdateUserRequest {
            email: Some("not-an-email".to_string()),
            password: None,
            first_name: None,
            last_name: None,
            role: None,
        };
        assert!(matches!(bad_email.into_update(), Err(ApiError::ValidationError(_))));
    }

    #[test]
    fn test_create_request_defaults_to_user_role() {
        let req: CreateUserRequest = serde_json::from_value(serde_json::json!({
            "email": "new@example.com",
            "password": "long enough",
            "first_name": "Nina",
            "last_name": "Roux"
        }))
        .unwrap();

        assert_eq!(req.role, UserRole::User);
    }
}
