/// Documents deposited by an administrator for a user
///
/// # Schema
///
/// ```sql
/// CREATE TABLE admin_documents (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     recipient_id UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
///     deposited_by UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     stored_name VARCHAR(64) NOT NULL UNIQUE,
///     mime_type VARCHAR(128) NOT NULL,
///     deposited_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const ADMIN_DOCUMENT_COLUMNS: &str =
    "id, recipient_id, deposited_by, name, stored_name, mime_type, deposited_at";

/// A deposited document
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdminDocument {
    pub id: Uuid,

    pub recipient_id: Uuid,

    /// Administrator who deposited the file
    pub deposited_by: Uuid,

    pub name: String,

    #[serde(skip_serializing)]
    pub stored_name: String,

    pub mime_type: String,

    pub deposited_at: DateTime<Utc>,
}

/// Deposit log entry with both parties resolved
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DepositLogEntry {
    pub id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub deposited_at: DateTime<Utc>,
    pub recipient_id: Uuid,
    pub recipient_email: String,
    pub recipient_name: String,
    pub deposited_by: Uuid,
    pub depositor_name: String,
}

/// Input for a new deposit
#[derive(Debug, Clone)]
pub struct CreateAdminDocument {
    pub recipient_id: Uuid,
    pub deposited_by: Uuid,
    pub name: String,
    pub stored_name: String,
    pub mime_type: String,
}

impl AdminDocument {
    pub async fn create(pool: &PgPool, data: CreateAdminDocument) -> Result<Self, sqlx::Error> {
        let document = sqlx::query_as::<_, AdminDocument>(&format!(
            r#"
            INSERT INTO admin_documents (recipient_id, deposited_by, name, stored_name, mime_type)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ADMIN_DOCUMENT_COLUMNS}
            "#
        ))
        .bind(data.recipient_id)
        .bind(data.deposited_by)
        .bind(data.name)
        .bind(data.stored_name)
        .bind(data.mime_type)
        .fetch_one(pool)
        .await?;

        Ok(document)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let document = sqlx::query_as::<_, AdminDocument>(&format!(
            "SELECT {ADMIN_DOCUMENT_COLUMNS} FROM admin_documents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(document)
    }

    /// Full deposit log, newest first
    pub async fn list_log(pool: &PgPool) -> Result<Vec<DepositLogEntry>, sqlx::Error> {
        let entries = sqlx::query_as::<_, DepositLogEntry>(
            r#"
            SELECT a.id, a.name, a.mime_type, a.deposited_at,
                   a.recipient_id,
                   r.email AS recipient_email,
                   r.first_name || ' ' || r.last_name AS recipient_name,
                   a.deposited_by,
                   d.first_name || ' ' || d.last_name AS depositor_name
            FROM admin_documents a
            JOIN users r ON r.id = a.recipient_id
            JOIN users d ON d.id = a.deposited_by
            ORDER BY a.deposited_at DESC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(entries)
    }

    /// Documents received by a user, newest first
    pub async fn list_for_recipient(
        pool: &PgPool,
        recipient_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let documents = sqlx::query_as::<_, AdminDocument>(&format!(
            r#"
            SELECT {ADMIN_DOCUMENT_COLUMNS}
            FROM admin_documents
            WHERE recipient_id = $1
            ORDER BY deposited_at DESC
            "#
        ))
        .bind(recipient_id)
        .fetch_all(pool)
        .await?;

        Ok(documents)
    }

    /// Deletes a deposit and returns it so the file can be removed
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let document = sqlx::query_as::<_, AdminDocument>(&format!(
            "DELETE FROM admin_documents WHERE id = $1 RETURNING {ADMIN_DOCUMENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(document)
    }

    /// Stored names of deposits a user deletion would cascade to
    ///
    /// Covers both sides: deposits received by the user and deposits made by them.
    pub async fn stored_names_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<String>, sqlx::Error> {
        let names = sqlx::query_scalar(
            "SELECT stored_name FROM admin_documents WHERE recipient_id = $1 OR deposited_by = $1",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(names)
    }

    pub async fn count_for_recipient(pool: &PgPool, recipient_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM admin_documents WHERE recipient_id = $1")
                .bind(recipient_id)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admin_documents")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}
