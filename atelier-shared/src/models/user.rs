/// User model and database operations
///
/// Besides identity and credentials, a user row carries the two pending-change
/// records used by the confirmation flows: a password-reset token and an
/// email-change token with its pending address and stage. Only SHA-256 hashes
/// of tokens are stored.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(180) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     first_name VARCHAR(100) NOT NULL,
///     last_name VARCHAR(100) NOT NULL,
///     role user_role NOT NULL DEFAULT 'user',
///     password_reset_token_hash CHAR(64),
///     password_reset_expires_at TIMESTAMPTZ,
///     pending_email VARCHAR(180),
///     email_change_token_hash CHAR(64),
///     email_change_expires_at TIMESTAMPTZ,
///     email_change_stage email_change_stage,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use atelier_shared::models::user::{CreateUser, User, UserRole};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(
///     &pool,
///     CreateUser {
///         email: "claire@example.com".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///         first_name: "Claire".to_string(),
///         last_name: "Martin".to_string(),
///         role: UserRole::User,
///     },
/// )
/// .await?;
///
/// let found = User::find_by_email(&pool, "claire@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Columns selected for every `User` query
const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, \
     password_reset_token_hash, password_reset_expires_at, \
     pending_email, email_change_token_hash, email_change_expires_at, email_change_stage, \
     created_at, updated_at";

/// Account role
///
/// Every account implicitly holds `ROLE_USER`; administrators additionally hold
/// `ROLE_ADMIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    /// Role names granted to this account
    pub fn roles(&self) -> Vec<&'static str> {
        match self {
            UserRole::User => vec!["ROLE_USER"],
            UserRole::Admin => vec!["ROLE_USER", "ROLE_ADMIN"],
        }
    }

    /// Where a freshly logged-in account lands
    pub fn landing_path(&self) -> &'static str {
        match self {
            UserRole::User => "/account/dashboard",
            UserRole::Admin => "/admin/dashboard",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

/// Progress of a pending email change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "email_change_stage", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmailChangeStage {
    /// Link sent to the current address, not yet followed
    AwaitingCurrent,

    /// Current address confirmed, link sent to the new address
    AwaitingNew,
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Login identifier, unique
    pub email: String,

    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub first_name: String,

    pub last_name: String,

    pub role: UserRole,

    #[serde(skip_serializing)]
    pub password_reset_token_hash: Option<String>,

    #[serde(skip_serializing)]
    pub password_reset_expires_at: Option<DateTime<Utc>>,

    /// Address waiting for double confirmation
    pub pending_email: Option<String>,

    #[serde(skip_serializing)]
    pub email_change_token_hash: Option<String>,

    #[serde(skip_serializing)]
    pub email_change_expires_at: Option<DateTime<Utc>>,

    pub email_change_stage: Option<EmailChangeStage>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    pub first_name: String,

    pub last_name: String,

    pub role: UserRole,
}

/// Input for updating an existing user
///
/// Only `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub email: Option<String>,

    pub password_hash: Option<String>,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    pub role: Option<UserRole>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password_hash.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.role.is_none()
    }
}

impl User {
    /// Creates a new user in the database
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Email already exists (unique constraint `users_email_key`)
    /// - Database connection fails
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.role)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by exact email address
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Whether an address already belongs to an account, ignoring case
    pub async fn email_taken(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
        let taken: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE lower(email) = lower($1))")
            .bind(email)
            .fetch_one(pool)
            .await?;

        Ok(taken)
    }

    /// Updates an existing user
    ///
    /// Only non-None fields in `data` are written; `updated_at` is always bumped.
    ///
    /// # Returns
    ///
    /// The updated user, or None if the user doesn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if the new email belongs to another account or the
    /// database connection fails
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use atelier_shared::models::user::{UpdateUser, User, UserRole};
    /// # use sqlx::PgPool;
    /// # use uuid::Uuid;
    /// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    /// let update = UpdateUser {
    ///     role: Some(UserRole::Admin),
    ///     ..Default::default()
    /// };
    ///
    /// if let Some(user) = User::update(&pool, user_id, update).await? {
    ///     assert!(user.is_admin());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.email.is_some() {
            bind_count += 1;
            query.push_str(&format!(", email = ${}", bind_count));
        }
        if data.password_hash.is_some() {
            bind_count += 1;
            query.push_str(&format!(", password_hash = ${}", bind_count));
        }
        if data.first_name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", first_name = ${}", bind_count));
        }
        if data.last_name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", last_name = ${}", bind_count));
        }
        if data.role.is_some() {
            bind_count += 1;
            query.push_str(&format!(", role = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {USER_COLUMNS}"));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(email) = data.email {
            q = q.bind(email);
        }
        if let Some(password_hash) = data.password_hash {
            q = q.bind(password_hash);
        }
        if let Some(first_name) = data.first_name {
            q = q.bind(first_name);
        }
        if let Some(last_name) = data.last_name {
            q = q.bind(last_name);
        }
        if let Some(role) = data.role {
            q = q.bind(role);
        }

        let user = q.fetch_optional(pool).await?;

        Ok(user)
    }

    /// Replaces first and last name
    pub async fn update_identity(
        pool: &PgPool,
        id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        Self::update(
            pool,
            id,
            UpdateUser {
                first_name: Some(first_name.to_string()),
                last_name: Some(last_name.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    /// Deletes a user by ID
    ///
    /// Owned documents and received deposits are removed by `ON DELETE CASCADE`;
    /// their files on disk are the caller's responsibility.
    ///
    /// # Returns
    ///
    /// True if the user was deleted, false if it didn't exist
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists users, alphabetically by last then first name
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            ORDER BY last_name ASC, first_name ASC, created_at ASC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(users)
    }

    /// Counts all users
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Stores a password-reset token hash, replacing any previous one
    pub async fn set_password_reset(
        pool: &PgPool,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_reset_token_hash = $2,
                password_reset_expires_at = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Finds the user holding a live (non-expired) password-reset token
    pub async fn find_by_password_reset(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE password_reset_token_hash = $1
              AND password_reset_expires_at > NOW()
            "#
        ))
        .bind(token_hash)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Sets a new password and burns the reset token in one statement
    ///
    /// The `WHERE` clause re-checks hash and expiry, so of two concurrent
    /// submissions with the same token only one can match.
    ///
    /// # Returns
    ///
    /// The updated user, or None if the token is unknown, expired or already used
    pub async fn consume_password_reset(
        pool: &PgPool,
        token_hash: &str,
        new_password_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET password_hash = $2,
                password_reset_token_hash = NULL,
                password_reset_expires_at = NULL,
                updated_at = NOW()
            WHERE password_reset_token_hash = $1
              AND password_reset_expires_at > NOW()
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(token_hash)
        .bind(new_password_hash)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Starts (or restarts) an email change awaiting confirmation from the current address
    pub async fn begin_email_change(
        pool: &PgPool,
        id: Uuid,
        pending_email: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET pending_email = $2,
                email_change_token_hash = $3,
                email_change_expires_at = $4,
                email_change_stage = 'awaiting_current',
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(pending_email)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Marks the current address as confirmed and rotates the token
    ///
    /// Matches only a live token at the `awaiting_current` stage.
    ///
    /// # Returns
    ///
    /// The updated user (stage `awaiting_new`), or None if nothing matched
    pub async fn confirm_current_email(
        pool: &PgPool,
        token_hash: &str,
        next_token_hash: &str,
        next_expires_at: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET email_change_token_hash = $2,
                email_change_expires_at = $3,
                email_change_stage = 'awaiting_new',
                updated_at = NOW()
            WHERE email_change_token_hash = $1
              AND email_change_stage = 'awaiting_current'
              AND email_change_expires_at > NOW()
              AND pending_email IS NOT NULL
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(token_hash)
        .bind(next_token_hash)
        .bind(next_expires_at)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Replaces the email with the pending one and clears the change record
    ///
    /// Matches only a live token at the `awaiting_new` stage.
    ///
    /// # Errors
    ///
    /// Returns a unique-violation database error if the pending address was
    /// registered by someone else in the meantime
    pub async fn apply_email_change(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET email = pending_email,
                pending_email = NULL,
                email_change_token_hash = NULL,
                email_change_expires_at = NULL,
                email_change_stage = NULL,
                updated_at = NOW()
            WHERE email_change_token_hash = $1
              AND email_change_stage = 'awaiting_new'
              AND email_change_expires_at > NOW()
              AND pending_email IS NOT NULL
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(token_hash)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Drops the pending change identified by its token hash
    pub async fn clear_email_change_by_token(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET pending_email = NULL,
                email_change_token_hash = NULL,
                email_change_expires_at = NULL,
                email_change_stage = NULL,
                updated_at = NOW()
            WHERE email_change_token_hash = $1
            "#,
        )
        .bind(token_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_always_include_user() {
        assert_eq!(UserRole::User.roles(), vec!["ROLE_USER"]);
        assert_eq!(UserRole::Admin.roles(), vec!["ROLE_USER", "ROLE_ADMIN"]);
    }

    #[test]
    fn test_landing_path_by_role() {
        assert_eq!(UserRole::Admin.landing_path(), "/admin/dashboard");
        assert_eq!(UserRole::User.landing_path(), "/account/dashboard");
    }

    #[test]
    fn test_role_serde_names() {
        assert_eq!(serde_json::to_string(&UserRole::Admin).unwrap(), "\"admin\"");
        let role: UserRole = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, UserRole::User);
        assert_eq!(
            serde_json::to_string(&EmailChangeStage::AwaitingNew).unwrap(),
            "\"awaiting_new\""
        );
    }

    #[test]
    fn test_update_user_default_is_empty() {
        assert!(UpdateUser::default().is_empty());
        assert!(!UpdateUser {
            role: Some(UserRole::Admin),
            ..Default::default()
        }
        .is_empty());
    }

    #[test]
    fn test_serialized_user_hides_secrets() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            role: UserRole::User,
            password_reset_token_hash: Some("f".repeat(64)),
            password_reset_expires_at: Some(now),
            pending_email: None,
            email_change_token_hash: Some("e".repeat(64)),
            email_change_expires_at: Some(now),
            email_change_stage: Some(EmailChangeStage::AwaitingCurrent),
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains(&"f".repeat(64)));
        assert!(!json.contains(&"e".repeat(64)));
        assert_eq!(user.full_name(), "Ada Lovelace");
    }
}
