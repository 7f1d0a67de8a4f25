/// Deposits and the user document overview
///
/// - `GET    /v1/admin/documents`: deposit log and every user document
/// - `POST   /v1/admin/documents`: multipart `name`, `recipient_id`, `file`
/// - `GET    /v1/admin/documents/:id/download`
/// - `DELETE /v1/admin/documents/:id`: cancel a deposit
/// - `GET    /v1/admin/user-documents/:id/download`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{
        documents::document_name,
        files::{file_response, stored_extension, MultipartForm, NO_STORE},
    },
};
use atelier_shared::{
    auth::middleware::AuthContext,
    models::{
        admin_document::{AdminDocument, CreateAdminDocument, DepositLogEntry},
        document::{Document, DocumentWithOwner},
        user::User,
    },
    storage::UploadPolicy,
};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct DocumentOverview {
    pub deposits: Vec<DepositLogEntry>,
    pub user_documents: Vec<DocumentWithOwner>,
}

#[derive(Debug, Serialize)]
pub struct DepositResponse {
    pub message: &'static str,
    pub document: AdminDocument,
}

pub async fn overview(State(state): State<AppState>) -> ApiResult<Json<DocumentOverview>> {
    Ok(Json(DocumentOverview {
        deposits: AdminDocument::list_log(&state.db).await?,
        user_documents: Document::list_all_with_owner(&state.db).await?,
    }))
}

/// Deposits a file for a user
pub async fn deposit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<DepositResponse>)> {
    let form = MultipartForm::collect(multipart).await?;
    let name = document_name(&form)?;

    let recipient_id = form
        .optional_text("recipient_id")
        .and_then(|raw| Uuid::parse_str(&raw).ok())
        .ok_or_else(|| ApiError::invalid_field("recipient_id", "A valid recipient is required"))?;

    if User::find_by_id(&state.db, recipient_id).await?.is_none() {
        return Err(ApiError::invalid_field("recipient_id", "Unknown recipient"));
    }

    let upload = form
        .file("file")
        .ok_or_else(|| ApiError::invalid_field("file", "A file is required"))?;

    let stored = state
        .documents
        .save(&upload.bytes, &UploadPolicy::documents())
        .await?;

    let created = AdminDocument::create(
        &state.db,
        CreateAdminDocument {
            recipient_id,
            deposited_by: auth.user_id,
            name,
            stored_name: stored.stored_name.clone(),
            mime_type: stored.mime_type().to_string(),
        },
    )
    .await;

    let document = match created {
        Ok(document) => document,
        Err(e) => {
            state.documents.remove_all_logged(&[stored.stored_name]).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        admin_id = %auth.user_id,
        recipient_id = %recipient_id,
        document_id = %document.id,
        "document deposited"
    );

    Ok((
        StatusCode::CREATED,
        Json(DepositResponse {
            message: "Document deposited.",
            document,
        }),
    ))
}

pub async fn download_deposit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let document = AdminDocument::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;

    let bytes = state.documents.read(&document.stored_name).await?;

    Ok(file_response(
        bytes,
        &document.mime_type,
        &document.name,
        stored_extension(&document.stored_name),
        NO_STORE,
    ))
}

pub async fn download_user_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let document = Document::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;

    let bytes = state.documents.read(&document.stored_name).await?;

    Ok(file_response(
        bytes,
        &document.mime_type,
        &document.name,
        stored_extension(&document.stored_name),
        NO_STORE,
    ))
}

/// Cancels a deposit: the row first, then the file
pub async fn cancel_deposit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let deleted = AdminDocument::delete(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;

    state.documents.remove_all_logged(&[deleted.stored_name]).await;

    tracing::info!(admin_id = %auth.user_id, document_id = %id, "deposit cancelled");

    Ok(StatusCode::NO_CONTENT)
}
