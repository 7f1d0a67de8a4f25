/// Confirmation links followed from emails
///
/// These routes take no bearer token: the link itself is the credential.
/// Every unusable link, for whatever reason, answers the same
/// `400 invalid_link`.
///
/// - `GET  /v1/account/password/confirm/:token`
/// - `POST /v1/account/password/confirm/:token`
/// - `GET  /v1/account/email/confirm-current/:token`
/// - `GET  /v1/account/email/confirm-new/:token`

use crate::{app::AppState, error::ApiResult};
use atelier_shared::account::{
    self, CURRENT_EMAIL_CONFIRMED, EMAIL_CHANGED, PASSWORD_CHANGED,
};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

/// Outcome of following a link
#[derive(Debug, Serialize)]
pub struct LinkOutcome {
    pub message: &'static str,
}

/// Link still usable; the client may show the new-password form
#[derive(Debug, Serialize)]
pub struct PasswordLinkStatus {
    pub valid: bool,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct NewPasswordRequest {
    pub password: String,
    pub password_confirmation: String,
}

pub async fn check_password_link(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<PasswordLinkStatus>> {
    let user = account::check_password_link(&state.db, &token).await?;

    Ok(Json(PasswordLinkStatus {
        valid: true,
        email: user.email,
    }))
}

pub async fn confirm_password_change(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<NewPasswordRequest>,
) -> ApiResult<Json<LinkOutcome>> {
    account::confirm_password_change(&state.db, &token, &req.password, &req.password_confirmation)
        .await?;

    Ok(Json(LinkOutcome {
        message: PASSWORD_CHANGED,
    }))
}

pub async fn confirm_current_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<LinkOutcome>> {
    account::confirm_current_email(&state.db, state.mailer.as_ref(), &state.links, &token).await?;

    Ok(Json(LinkOutcome {
        message: CURRENT_EMAIL_CONFIRMED,
    }))
}

pub async fn confirm_new_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<LinkOutcome>> {
    account::confirm_new_email(&state.db, &token).await?;

    Ok(Json(LinkOutcome {
        message: EMAIL_CHANGED,
    }))
}
