/// Project gallery images
///
/// # Schema
///
/// ```sql
/// CREATE TABLE project_images (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     project_id UUID NOT NULL REFERENCES projects (id) ON DELETE CASCADE,
///     stored_name VARCHAR(64) NOT NULL UNIQUE,
///     mime_type VARCHAR(128) NOT NULL,
///     is_cover BOOLEAN NOT NULL DEFAULT FALSE,
///     position INTEGER NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Every function that adds or removes rows must be followed by
/// [`ProjectImage::normalize_cover`] on the same connection before commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::gallery::{self, GalleryItem};

const IMAGE_COLUMNS: &str = "id, project_id, stored_name, mime_type, is_cover, position, created_at";

/// An image in a project gallery
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectImage {
    pub id: Uuid,

    pub project_id: Uuid,

    #[serde(skip_serializing)]
    pub stored_name: String,

    pub mime_type: String,

    pub is_cover: bool,

    /// Upload order within the project
    pub position: i32,

    pub created_at: DateTime<Utc>,
}

impl GalleryItem for ProjectImage {
    fn id(&self) -> Uuid {
        self.id
    }

    fn is_cover(&self) -> bool {
        self.is_cover
    }
}

impl ProjectImage {
    /// Appends an image at the end of the gallery, not flagged as cover
    pub async fn insert(
        conn: &mut PgConnection,
        project_id: Uuid,
        stored_name: &str,
        mime_type: &str,
    ) -> Result<Self, sqlx::Error> {
        let image = sqlx::query_as::<_, ProjectImage>(&format!(
            r#"
            INSERT INTO project_images (project_id, stored_name, mime_type, is_cover, position)
            VALUES (
                $1, $2, $3, FALSE,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM project_images WHERE project_id = $1)
            )
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(project_id)
        .bind(stored_name)
        .bind(mime_type)
        .fetch_one(&mut *conn)
        .await?;

        Ok(image)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let image = sqlx::query_as::<_, ProjectImage>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM project_images WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(image)
    }

    /// Gallery in display order: cover first, then upload order
    pub async fn list_for_project(pool: &PgPool, project_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let images = sqlx::query_as::<_, ProjectImage>(&format!(
            r#"
            SELECT {IMAGE_COLUMNS}
            FROM project_images
            WHERE project_id = $1
            ORDER BY is_cover DESC, position ASC
            "#
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await?;

        Ok(images)
    }

    /// Galleries of several projects at once, each in display order
    pub async fn list_for_projects(
        pool: &PgPool,
        project_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        let images = sqlx::query_as::<_, ProjectImage>(&format!(
            r#"
            SELECT {IMAGE_COLUMNS}
            FROM project_images
            WHERE project_id = ANY($1)
            ORDER BY project_id, is_cover DESC, position ASC
            "#
        ))
        .bind(project_ids)
        .fetch_all(pool)
        .await?;

        Ok(images)
    }

    /// Gallery in upload order, locked for the rest of the transaction
    async fn lock_gallery(conn: &mut PgConnection, project_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let images = sqlx::query_as::<_, ProjectImage>(&format!(
            r#"
            SELECT {IMAGE_COLUMNS}
            FROM project_images
            WHERE project_id = $1
            ORDER BY position ASC
            FOR UPDATE
            "#
        ))
        .bind(project_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(images)
    }

    /// Removes one image and returns it so the file can be deleted after commit
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let image = sqlx::query_as::<_, ProjectImage>(&format!(
            "DELETE FROM project_images WHERE id = $1 RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(image)
    }

    /// Removes the listed images of a project; ids from other projects are ignored
    pub async fn delete_many(
        conn: &mut PgConnection,
        project_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let images = sqlx::query_as::<_, ProjectImage>(&format!(
            r#"
            DELETE FROM project_images
            WHERE project_id = $1 AND id = ANY($2)
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(project_id)
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;

        Ok(images)
    }

    /// Stored names of a project's images, read before deleting the project
    pub async fn stored_names_for_project(
        conn: &mut PgConnection,
        project_id: Uuid,
    ) -> Result<Vec<String>, sqlx::Error> {
        let names = sqlx::query_scalar("SELECT stored_name FROM project_images WHERE project_id = $1")
            .bind(project_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(names)
    }

    /// Re-establishes the single-cover rule for a project
    ///
    /// Picks the cover with [`gallery::plan_cover`] and writes the flags of
    /// the whole gallery in one statement.
    ///
    /// # Returns
    ///
    /// The id of the cover, or None if the gallery is empty
    pub async fn normalize_cover(
        conn: &mut PgConnection,
        project_id: Uuid,
        requested: Option<Uuid>,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        let images = Self::lock_gallery(conn, project_id).await?;
        let cover = gallery::plan_cover(&images, requested);

        if let Some(cover_id) = cover {
            let needs_write = images
                .iter()
                .any(|image| image.is_cover != (image.id == cover_id));

            if needs_write {
                sqlx::query("UPDATE project_images SET is_cover = (id = $2) WHERE project_id = $1")
                    .bind(project_id)
                    .bind(cover_id)
                    .execute(&mut *conn)
                    .await?;
            }
        }

        Ok(cover)
    }
}
