/// Database models
///
/// Each model owns its SQL. Reads take a `&PgPool`; writes that must share a
/// transaction with other writes take a `&mut PgConnection`.
///
/// # Models
///
/// - `user`: accounts, roles and pending-change records
/// - `document`: files users keep in their own space
/// - `admin_document`: files administrators deposit for a user
/// - `project`: portfolio projects
/// - `project_image`: gallery images and the cover flag
///
/// # Example
///
/// ```no_run
/// use atelier_shared::models::project::{Project, ProjectFields};
/// use atelier_shared::models::project_image::ProjectImage;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let mut tx = pool.begin().await?;
/// let project = Project::create(&mut tx, ProjectFields {
///     title: "Groupe scolaire".to_string(),
///     ..Default::default()
/// }).await?;
/// ProjectImage::insert(&mut tx, project.id, "0123456789abcdef0123456789abcdef.jpg", "image/jpeg").await?;
/// ProjectImage::normalize_cover(&mut tx, project.id, None).await?;
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

pub mod admin_document;
pub mod document;
pub mod project;
pub mod project_image;
pub mod user;
