/// Portfolio and gallery management
///
/// - `GET    /v1/admin/projects`
/// - `POST   /v1/admin/projects`: multipart fields + `images[]`
/// - `GET    /v1/admin/projects/:id`
/// - `PUT    /v1/admin/projects/:id`: fields, `delete_images[]`,
///   `cover_image_id`, `images[]`
/// - `DELETE /v1/admin/projects/:id`
/// - `GET    /v1/admin/projects/images/:id`
/// - `DELETE /v1/admin/projects/images/:id`
///
/// New image files are written before the transaction and removed again if
/// it fails. Files of deleted images are unlinked only after commit. Every
/// transaction that touches a gallery ends with `normalize_cover`, so a
/// gallery with images always has exactly one cover.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{
        files::{image_response, MultipartForm, PRIVATE_IMAGE_CACHE},
        projects::group_by_project,
    },
};
use atelier_shared::{
    auth::middleware::AuthContext,
    gallery::GalleryError,
    models::{
        project::{Project, ProjectFields},
        project_image::ProjectImage,
    },
    storage::{FileStore, StorageError, StoredFile, UploadPolicy},
};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

/// Warning attached to a response when an upload was not an image
pub const SKIPPED_IMAGE_WARNING: &str =
    "An uploaded file is not a valid image (JPEG, PNG or WebP) and was ignored.";

/// A project with its full gallery, in display order
#[derive(Debug, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,

    pub cover_image_id: Option<Uuid>,

    pub images: Vec<ProjectImage>,
}

impl ProjectDetail {
    fn new(project: Project, images: Vec<ProjectImage>) -> Self {
        let cover_image_id = images.iter().find(|image| image.is_cover).map(|image| image.id);
        Self {
            project,
            cover_image_id,
            images,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub message: String,

    /// Uploads that were skipped, one entry each
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<&'static str>,

    pub project: ProjectDetail,
}

#[derive(Debug, Serialize)]
pub struct ImageDeleted {
    pub message: &'static str,
    pub cover_image_id: Option<Uuid>,
}

/// Reads the editable project fields from a form
pub(crate) fn project_fields(form: &MultipartForm) -> ApiResult<ProjectFields> {
    let completed_on = match form.optional_text("completed_on") {
        Some(raw) => Some(NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
            ApiError::invalid_field("completed_on", "Completion date must be YYYY-MM-DD")
        })?),
        None => None,
    };

    let fields = ProjectFields {
        title: form.optional_text("title").unwrap_or_default(),
        description: form.optional_text("description"),
        location: form.optional_text("location"),
        completed_on,
        size: form.optional_text("size"),
        client: form.optional_text("client"),
        architect: form.optional_text("architect"),
    };

    fields.validate()?;
    Ok(fields)
}

fn parse_image_id(field: &'static str, raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::invalid_field(field, format!("Invalid image id: {}", raw.trim())))
}

/// Saves every valid image of the form
///
/// Files that are not images are skipped with a warning. Any other storage
/// failure removes what was already written and aborts.
async fn save_images(
    store: &FileStore,
    form: &MultipartForm,
) -> ApiResult<(Vec<StoredFile>, Vec<&'static str>)> {
    let policy = UploadPolicy::project_images();
    let mut saved = Vec::new();
    let mut warnings = Vec::new();

    for upload in form.files("images") {
        match store.save(&upload.bytes, &policy).await {
            Ok(stored) => saved.push(stored),
            Err(StorageError::Rejected(reason)) => {
                tracing::warn!(file_name = %upload.file_name, reason = %reason, "project image skipped");
                warnings.push(SKIPPED_IMAGE_WARNING);
            }
            Err(e) => {
                discard(store, &saved).await;
                return Err(e.into());
            }
        }
    }

    Ok((saved, warnings))
}

async fn discard(store: &FileStore, files: &[StoredFile]) {
    let names: Vec<String> = files.iter().map(|file| file.stored_name.clone()).collect();
    store.remove_all_logged(&names).await;
}

async fn load_detail(state: &AppState, project: Project) -> ApiResult<ProjectDetail> {
    let images = ProjectImage::list_for_project(&state.db, project.id).await?;
    Ok(ProjectDetail::new(project, images))
}

async fn find_project(state: &AppState, id: Uuid) -> ApiResult<Project> {
    Project::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))
}

pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Json<Vec<ProjectDetail>>> {
    let projects = Project::list(&state.db).await?;
    let ids: Vec<Uuid> = projects.iter().map(|project| project.id).collect();
    let mut galleries = group_by_project(ProjectImage::list_for_projects(&state.db, &ids).await?);

    let details = projects
        .into_iter()
        .map(|project| {
            let images = galleries.remove(&project.id).unwrap_or_default();
            ProjectDetail::new(project, images)
        })
        .collect();

    Ok(Json(details))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProjectDetail>> {
    let project = find_project(&state, id).await?;
    Ok(Json(load_detail(&state, project).await?))
}

/// Creates a project; at least one valid image is required, the first one is the cover
pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ProjectResponse>)> {
    let form = MultipartForm::collect(multipart).await?;
    let fields = project_fields(&form)?;

    let (saved, warnings) = save_images(&state.images, &form).await?;
    if saved.is_empty() {
        return Err(GalleryError::NoValidImage.into());
    }

    let project = match insert_project(&state, fields, &saved).await {
        Ok(project) => project,
        Err(e) => {
            discard(&state.images, &saved).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        admin_id = %auth.user_id,
        project_id = %project.id,
        images = saved.len(),
        skipped = warnings.len(),
        "project created"
    );

    let message = format!("Project \"{}\" created.", project.title);
    let detail = load_detail(&state, project).await?;

    Ok((
        StatusCode::CREATED,
        Json(ProjectResponse {
            message,
            warnings,
            project: detail,
        }),
    ))
}

async fn insert_project(
    state: &AppState,
    fields: ProjectFields,
    images: &[StoredFile],
) -> Result<Project, GalleryError> {
    let mut tx = state.db.begin().await?;

    let project = Project::create(&mut tx, fields).await?;
    for image in images {
        ProjectImage::insert(&mut tx, project.id, &image.stored_name, image.mime_type()).await?;
    }
    ProjectImage::normalize_cover(&mut tx, project.id, None).await?;

    tx.commit().await?;
    Ok(project)
}

/// Edits fields and gallery in one transaction
///
/// Order inside the transaction: field update, removals, additions, then the
/// cover rule with the requested cover if it is still part of the gallery.
pub async fn update_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<Json<ProjectResponse>> {
    find_project(&state, id).await?;

    let form = MultipartForm::collect(multipart).await?;
    let fields = project_fields(&form)?;

    let delete_ids = form
        .texts("delete_images")
        .iter()
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| parse_image_id("delete_images", raw))
        .collect::<ApiResult<Vec<Uuid>>>()?;

    let requested_cover = form
        .optional_text("cover_image_id")
        .map(|raw| parse_image_id("cover_image_id", &raw))
        .transpose()?;

    if let Some(cover_id) = requested_cover {
        match ProjectImage::find_by_id(&state.db, cover_id).await? {
            Some(image) if image.project_id == id => {}
            _ => return Err(GalleryError::ForeignImage(cover_id).into()),
        }
    }

    let (saved, warnings) = save_images(&state.images, &form).await?;

    let edit = GalleryEdit {
        project_id: id,
        fields,
        delete_ids: &delete_ids,
        new_images: &saved,
        requested_cover,
    };

    let (project, removed) = match apply_edit(&state, edit).await {
        Ok(outcome) => outcome,
        Err(e) => {
            discard(&state.images, &saved).await;
            return Err(e);
        }
    };

    let removed_names: Vec<String> = removed.iter().map(|image| image.stored_name.clone()).collect();
    state.images.remove_all_logged(&removed_names).await;

    tracing::info!(
        admin_id = %auth.user_id,
        project_id = %id,
        added = saved.len(),
        removed = removed.len(),
        skipped = warnings.len(),
        "project updated"
    );

    let message = format!("Project \"{}\" updated.", project.title);
    let detail = load_detail(&state, project).await?;

    Ok(Json(ProjectResponse {
        message,
        warnings,
        project: detail,
    }))
}

struct GalleryEdit<'a> {
    project_id: Uuid,
    fields: ProjectFields,
    delete_ids: &'a [Uuid],
    new_images: &'a [StoredFile],
    requested_cover: Option<Uuid>,
}

async fn apply_edit(
    state: &AppState,
    edit: GalleryEdit<'_>,
) -> ApiResult<(Project, Vec<ProjectImage>)> {
    let mut tx = state.db.begin().await?;

    let project = Project::update(&mut tx, edit.project_id, edit.fields)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    let removed = ProjectImage::delete_many(&mut tx, edit.project_id, edit.delete_ids).await?;

    for image in edit.new_images {
        ProjectImage::insert(&mut tx, edit.project_id, &image.stored_name, image.mime_type())
            .await?;
    }

    ProjectImage::normalize_cover(&mut tx, edit.project_id, edit.requested_cover).await?;

    tx.commit().await?;
    Ok((project, removed))
}

/// Deletes a project, its image rows and then its image files
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut tx = state.db.begin().await?;

    let stored_names = ProjectImage::stored_names_for_project(&mut tx, id).await?;
    if !Project::delete(&mut tx, id).await? {
        return Err(ApiError::NotFound("Project not found".to_string()));
    }

    tx.commit().await?;

    state.images.remove_all_logged(&stored_names).await;

    tracing::info!(admin_id = %auth.user_id, project_id = %id, images = stored_names.len(), "project deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Removes one image; if it was the cover another image takes over
pub async fn delete_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ImageDeleted>> {
    let mut tx = state.db.begin().await?;

    let image = ProjectImage::delete(&mut tx, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found".to_string()))?;

    let cover_image_id = ProjectImage::normalize_cover(&mut tx, image.project_id, None).await?;
    Project::touch(&mut tx, image.project_id).await?;

    tx.commit().await?;

    state.images.remove_all_logged(std::slice::from_ref(&image.stored_name)).await;

    tracing::info!(
        admin_id = %auth.user_id,
        project_id = %image.project_id,
        image_id = %id,
        was_cover = image.is_cover,
        "project image deleted"
    );

    Ok(Json(ImageDeleted {
        message: "Image deleted.",
        cover_image_id,
    }))
}

pub async fn serve_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let image = ProjectImage::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found".to_string()))?;

    let bytes = state.images.read(&image.stored_name).await?;

    Ok(image_response(bytes, PRIVATE_IMAGE_CACHE))
}
