/// Public portfolio
///
/// - `GET /v1/projects`: every project with its cover and carousel image ids
/// - `GET /v1/projects/images/:id`: image bytes
///
/// Image responses re-detect the content type from the stored bytes and are
/// cacheable by browsers and proxies for a day.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::files::{image_response, PUBLIC_IMAGE_CACHE},
};
use atelier_shared::{
    gallery::{carousel, cover_of, GalleryItem},
    models::{project::Project, project_image::ProjectImage},
};
use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// A project as shown on the public site
#[derive(Debug, Serialize)]
pub struct PortfolioEntry {
    #[serde(flatten)]
    pub project: Project,

    pub cover_image_id: Option<Uuid>,

    /// Remaining images, in display order
    pub carousel_image_ids: Vec<Uuid>,
}

impl PortfolioEntry {
    pub fn new(project: Project, gallery: &[ProjectImage]) -> Self {
        Self {
            project,
            cover_image_id: cover_of(gallery).map(GalleryItem::id),
            carousel_image_ids: carousel(gallery).into_iter().map(GalleryItem::id).collect(),
        }
    }
}

/// Groups images by project, keeping the query order inside each group
pub(crate) fn group_by_project(images: Vec<ProjectImage>) -> HashMap<Uuid, Vec<ProjectImage>> {
    let mut grouped: HashMap<Uuid, Vec<ProjectImage>> = HashMap::new();
    for image in images {
        grouped.entry(image.project_id).or_default().push(image);
    }
    grouped
}

pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Json<Vec<PortfolioEntry>>> {
    let projects = Project::list(&state.db).await?;
    let ids: Vec<Uuid> = projects.iter().map(|project| project.id).collect();
    let mut galleries = group_by_project(ProjectImage::list_for_projects(&state.db, &ids).await?);

    let entries = projects
        .into_iter()
        .map(|project| {
            let gallery = galleries.remove(&project.id).unwrap_or_default();
            PortfolioEntry::new(project, &gallery)
        })
        .collect();

    Ok(Json(entries))
}

pub async fn serve_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let image = ProjectImage::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found".to_string()))?;

    let bytes = state.images.read(&image.stored_name).await?;

    Ok(image_response(bytes, PUBLIC_IMAGE_CACHE))
}
