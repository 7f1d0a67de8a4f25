/// The signed-in user's document space
///
/// - `GET    /v1/me/documents`: own documents and documents received
/// - `POST   /v1/me/documents`: multipart `name` + `file`
/// - `GET    /v1/me/documents/:id`
/// - `PUT    /v1/me/documents/:id`: multipart `name` + optional `file`
/// - `DELETE /v1/me/documents/:id`
/// - `GET    /v1/me/documents/:id/download`
/// - `GET    /v1/me/received/:id/download`
///
/// Ownership is checked on every request: someone else's document answers
/// 403, an unknown id 404.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::files::{file_response, stored_extension, MultipartForm, NO_STORE},
};
use atelier_shared::{
    auth::{authorization::require_owner, middleware::AuthContext},
    models::{
        admin_document::AdminDocument,
        document::{CreateDocument, Document, ReplacementFile},
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

/// Longest display name, matching the column
pub const MAX_DOCUMENT_NAME_CHARS: usize = 255;

#[derive(Debug, Serialize)]
pub struct DocumentList {
    pub documents: Vec<Document>,
    pub received: Vec<AdminDocument>,
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub message: &'static str,
    pub document: Document,
}

/// Reads and checks the `name` field of a document form
pub(crate) fn document_name(form: &MultipartForm) -> ApiResult<String> {
    let name = form
        .optional_text("name")
        .ok_or_else(|| ApiError::invalid_field("name", "A document name is required"))?;

    if name.chars().count() > MAX_DOCUMENT_NAME_CHARS {
        return Err(ApiError::invalid_field(
            "name",
            format!("Document name must be at most {} characters", MAX_DOCUMENT_NAME_CHARS),
        ));
    }

    Ok(name)
}

async fn owned_document(state: &AppState, auth: &AuthContext, id: Uuid) -> ApiResult<Document> {
    let document = Document::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;

    if let Err(e) = require_owner(auth, document.owner_id) {
        tracing::warn!(user_id = %auth.user_id, document_id = %id, "foreign document access refused");
        return Err(e.into());
    }

    Ok(document)
}

pub async fn list_documents(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<DocumentList>> {
    let documents = Document::list_by_owner(&state.db, auth.user_id).await?;
    let received = AdminDocument::list_for_recipient(&state.db, auth.user_id).await?;

    Ok(Json(DocumentList {
        documents,
        received,
    }))
}

/// Stores the file first, then the row; the file is removed if the insert fails
pub async fn create_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<DocumentResponse>)> {
    let form = MultipartForm::collect(multipart).await?;
    let name = document_name(&form)?;
    let upload = form
        .file("file")
        .ok_or_else(|| ApiError::invalid_field("file", "A file is required"))?;

    let stored = state
        .documents
        .save(&upload.bytes, &UploadPolicy::documents())
        .await?;

    let created = Document::create(
        &state.db,
        CreateDocument {
            owner_id: auth.user_id,
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

    tracing::info!(user_id = %auth.user_id, document_id = %document.id, size = stored.size, "document uploaded");

    Ok((
        StatusCode::CREATED,
        Json(DocumentResponse {
            message: "Document added.",
            document,
        }),
    ))
}

pub async fn get_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Document>> {
    Ok(Json(owned_document(&state, &auth, id).await?))
}

/// Renames a document, optionally replacing its file
///
/// A replacement file is stored before the row is updated; the previous file
/// is removed once the row points at the new one.
pub async fn update_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<Json<DocumentResponse>> {
    let current = owned_document(&state, &auth, id).await?;

    let form = MultipartForm::collect(multipart).await?;
    let name = document_name(&form)?;

    let stored = match form.file("file") {
        Some(upload) => Some(
            state
                .documents
                .save(&upload.bytes, &UploadPolicy::documents())
                .await?,
        ),
        None => None,
    };

    let replacement = stored.as_ref().map(|file| ReplacementFile {
        stored_name: file.stored_name.clone(),
        mime_type: file.mime_type().to_string(),
    });

    let updated = match Document::update(&state.db, id, &name, replacement).await {
        Ok(Some(document)) => document,
        Ok(None) => {
            if let Some(file) = stored {
                state.documents.remove_all_logged(&[file.stored_name]).await;
            }
            return Err(ApiError::NotFound("Document not found".to_string()));
        }
        Err(e) => {
            if let Some(file) = stored {
                state.documents.remove_all_logged(&[file.stored_name]).await;
            }
            return Err(e.into());
        }
    };

    if stored.is_some() {
        state.documents.remove_all_logged(&[current.stored_name]).await;
    }

    tracing::info!(user_id = %auth.user_id, document_id = %id, replaced_file = stored.is_some(), "document updated");

    Ok(Json(DocumentResponse {
        message: "Document updated.",
        document: updated,
    }))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    owned_document(&state, &auth, id).await?;

    let deleted = Document::delete(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;

    state.documents.remove_all_logged(&[deleted.stored_name]).await;

    tracing::info!(user_id = %auth.user_id, document_id = %id, "document deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn download_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let document = owned_document(&state, &auth, id).await?;
    let bytes = state.documents.read(&document.stored_name).await?;

    Ok(file_response(
        bytes,
        &document.mime_type,
        &document.name,
        stored_extension(&document.stored_name),
        NO_STORE,
    ))
}

/// Downloads a document deposited for the caller; recipient only
pub async fn download_received(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let document = AdminDocument::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;

    require_owner(&auth, document.recipient_id)?;

    let bytes = state.documents.read(&document.stored_name).await?;

    Ok(file_response(
        bytes,
        &document.mime_type,
        &document.name,
        stored_extension(&document.stored_name),
        NO_STORE,
    ))
}
