/// Portfolio projects
///
/// # Schema
///
/// ```sql
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     location VARCHAR(255),
///     completed_on DATE,
///     size VARCHAR(100),
///     client VARCHAR(255),
///     architect VARCHAR(255),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Writes take a `&mut PgConnection` so they can share a transaction with the
/// gallery changes made in the same request.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

const PROJECT_COLUMNS: &str = "id, title, description, location, completed_on, size, client, \
     architect, created_at, updated_at";

/// A portfolio project
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,

    pub title: String,

    pub description: Option<String>,

    pub location: Option<String>,

    /// Completion date
    pub completed_on: Option<NaiveDate>,

    /// Free-form size ("1 200 m²")
    pub size: Option<String>,

    /// Maître d'ouvrage
    pub client: Option<String>,

    /// Maître d'œuvre
    pub architect: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Editable project fields
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ProjectFields {
    #[validate(length(min = 1, max = 255, message = "Title is required (255 characters max)"))]
    pub title: String,

    pub description: Option<String>,

    #[validate(length(max = 255, message = "Location must be at most 255 characters"))]
    pub location: Option<String>,

    pub completed_on: Option<NaiveDate>,

    #[validate(length(max = 100, message = "Size must be at most 100 characters"))]
    pub size: Option<String>,

    #[validate(length(max = 255, message = "Client must be at most 255 characters"))]
    pub client: Option<String>,

    #[validate(length(max = 255, message = "Architect must be at most 255 characters"))]
    pub architect: Option<String>,
}

impl Project {
    pub async fn create(conn: &mut PgConnection, fields: ProjectFields) -> Result<Self, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(&format!(
            r#"
            INSERT INTO projects (title, description, location, completed_on, size, client, architect)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(fields.title)
        .bind(fields.description)
        .bind(fields.location)
        .bind(fields.completed_on)
        .bind(fields.size)
        .bind(fields.client)
        .bind(fields.architect)
        .fetch_one(&mut *conn)
        .await?;

        Ok(project)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(project)
    }

    /// Lists projects, most recently created first
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let projects = sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await?;

        Ok(projects)
    }

    /// Replaces every editable field and bumps `updated_at`
    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        fields: ProjectFields,
    ) -> Result<Option<Self>, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(&format!(
            r#"
            UPDATE projects
            SET title = $2, description = $3, location = $4, completed_on = $5,
                size = $6, client = $7, architect = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(fields.title)
        .bind(fields.description)
        .bind(fields.location)
        .bind(fields.completed_on)
        .bind(fields.size)
        .bind(fields.client)
        .bind(fields.architect)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(project)
    }

    /// Deletes a project; its image rows go with it (`ON DELETE CASCADE`)
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Bumps `updated_at` after a gallery-only change
    pub async fn touch(conn: &mut PgConnection, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE projects SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}
