/// First and last name edits

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::AccountError;
use crate::models::user::User;

/// Longest accepted name, in characters
pub const MAX_NAME_CHARS: usize = 100;

/// Trims and checks a name: not empty, bounded, letters and `-`/`'`/spaces only
pub fn normalize_name(field: &'static str, value: &str) -> Result<String, AccountError> {
    let value = value.trim();

    if value.is_empty() {
        return Err(AccountError::validation(
            field,
            "First and last name cannot be empty.",
        ));
    }

    if value.chars().count() > MAX_NAME_CHARS {
        return Err(AccountError::validation(
            field,
            format!("First and last name cannot exceed {} characters.", MAX_NAME_CHARS),
        ));
    }

    let allowed = |c: char| c.is_alphabetic() || c.is_whitespace() || c == '-' || c == '\'';
    if !value.chars().all(allowed) {
        return Err(AccountError::validation(
            field,
            "First and last name may only contain letters, spaces, hyphens and apostrophes.",
        ));
    }

    Ok(value.to_string())
}

/// Replaces the account holder's names after validation
pub async fn update_identity(
    pool: &PgPool,
    user_id: Uuid,
    first_name: &str,
    last_name: &str,
) -> Result<User, AccountError> {
    let first_name = normalize_name("first_name", first_name)?;
    let last_name = normalize_name("last_name", last_name)?;

    let user = User::update_identity(pool, user_id, &first_name, &last_name)
        .await?
        .ok_or(AccountError::UnknownAccount)?;

    info!(user_id = %user.id, "Identity updated");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_accented_compound_names() {
        assert_eq!(normalize_name("last_name", "  Le Pévédic ").unwrap(), "Le Pévédic");
        assert_eq!(normalize_name("first_name", "Jean-Noël").unwrap(), "Jean-Noël");
        assert_eq!(normalize_name("last_name", "d'Arc").unwrap(), "d'Arc");
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert!(matches!(
            normalize_name("first_name", "   "),
            Err(AccountError::Validation { field: "first_name", .. })
        ));
    }

    #[test]
    fn test_rejects_digits_and_markup() {
        assert!(normalize_name("last_name", "R2D2").is_err());
        assert!(normalize_name("last_name", "<script>").is_err());
        assert!(normalize_name("last_name", "Smith;").is_err());
    }

    #[test]
    fn test_length_counts_characters() {
        assert!(normalize_name("last_name", &"é".repeat(100)).is_ok());
        assert!(normalize_name("last_name", &"é".repeat(101)).is_err());
    }
}
