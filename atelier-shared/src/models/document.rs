/// Documents users keep in their own space
///
/// The row holds the display name chosen by the user; the file itself lives
/// in the document [`FileStore`](crate::storage::FileStore) under
/// `stored_name`, which is always generated server-side.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE documents (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     owner_id UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     stored_name VARCHAR(64) NOT NULL UNIQUE,
///     mime_type VARCHAR(128) NOT NULL,
///     uploaded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const DOCUMENT_COLUMNS: &str = "id, owner_id, name, stored_name, mime_type, uploaded_at";

/// A user's document
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,

    pub owner_id: Uuid,

    /// Display name, chosen by the owner
    pub name: String,

    /// Generated file name inside the document store
    #[serde(skip_serializing)]
    pub stored_name: String,

    /// Sniffed content type at upload time
    pub mime_type: String,

    pub uploaded_at: DateTime<Utc>,
}

/// Document joined with its owner, for the admin overview
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DocumentWithOwner {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub owner_email: String,
    pub owner_first_name: String,
    pub owner_last_name: String,
}

/// Input for creating a document
#[derive(Debug, Clone)]
pub struct CreateDocument {
    pub owner_id: Uuid,
    pub name: String,
    pub stored_name: String,
    pub mime_type: String,
}

/// Replacement file for an existing document
#[derive(Debug, Clone)]
pub struct ReplacementFile {
    pub stored_name: String,
    pub mime_type: String,
}

impl Document {
    /// Inserts a document row for an already stored file
    pub async fn create(pool: &PgPool, data: CreateDocument) -> Result<Self, sqlx::Error> {
        let document = sqlx::query_as::<_, Document>(&format!(
            r#"
            INSERT INTO documents (owner_id, name, stored_name, mime_type)
            VALUES ($1, $2, $3, $4)
            RETURNING {DOCUMENT_COLUMNS}
            "#
        ))
        .bind(data.owner_id)
        .bind(data.name)
        .bind(data.stored_name)
        .bind(data.mime_type)
        .fetch_one(pool)
        .await?;

        Ok(document)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let document = sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(document)
    }

    /// Lists a user's documents, newest first
    pub async fn list_by_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let documents = sqlx::query_as::<_, Document>(&format!(
            r#"
            SELECT {DOCUMENT_COLUMNS}
            FROM documents
            WHERE owner_id = $1
            ORDER BY uploaded_at DESC
            "#
        ))
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

        Ok(documents)
    }

    /// Lists every user document with its owner, newest first
    pub async fn list_all_with_owner(pool: &PgPool) -> Result<Vec<DocumentWithOwner>, sqlx::Error> {
        let documents = sqlx::query_as::<_, DocumentWithOwner>(
            r#"
            SELECT d.id, d.owner_id, d.name, d.mime_type, d.uploaded_at,
                   u.email AS owner_email,
                   u.first_name AS owner_first_name,
                   u.last_name AS owner_last_name
            FROM documents d
            JOIN users u ON u.id = d.owner_id
            ORDER BY d.uploaded_at DESC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(documents)
    }

    /// Renames a document and optionally points it at a new stored file
    ///
    /// Returns the updated row; the previous `stored_name` must be read by the
    /// caller beforehand if the old file is to be removed.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        name: &str,
        replacement: Option<ReplacementFile>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let document = match replacement {
            Some(file) => {
                sqlx::query_as::<_, Document>(&format!(
                    r#"
                    UPDATE documents
                    SET name = $2, stored_name = $3, mime_type = $4, uploaded_at = NOW()
                    WHERE id = $1
                    RETURNING {DOCUMENT_COLUMNS}
                    "#
                ))
                .bind(id)
                .bind(name)
                .bind(file.stored_name)
                .bind(file.mime_type)
                .fetch_optional(pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Document>(&format!(
                    "UPDATE documents SET name = $2 WHERE id = $1 RETURNING {DOCUMENT_COLUMNS}"
                ))
                .bind(id)
                .bind(name)
                .fetch_optional(pool)
                .await?
            }
        };

        Ok(document)
    }

    /// Deletes a document row and returns it so the file can be removed
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let document = sqlx::query_as::<_, Document>(&format!(
            "DELETE FROM documents WHERE id = $1 RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(document)
    }

    /// Stored file names of every document owned by a user
    pub async fn stored_names_for_owner(
        pool: &PgPool,
        owner_id: Uuid,
    ) -> Result<Vec<String>, sqlx::Error> {
        let names = sqlx::query_scalar("SELECT stored_name FROM documents WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_all(pool)
            .await?;

        Ok(names)
    }

    pub async fn count_by_owner(pool: &PgPool, owner_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}
