/// Emailed password change
///
/// The logged-in user asks for a change, receives a link on their current
/// address, and sets the new password from that link. The token is
/// single-use: the new hash and the token removal are one `UPDATE`.

use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, info};

use super::{AccountError, Links};
use crate::auth::confirmation::{self, ConfirmationToken};
use crate::auth::password::{hash_password, validate_password_strength};
use crate::mail::{templates, Mailer};
use crate::models::user::User;

/// Issues a fresh link (replacing any previous one) and mails it
pub async fn request_password_change(
    pool: &PgPool,
    mailer: &dyn Mailer,
    links: &Links,
    user: &User,
) -> Result<(), AccountError> {
    let token = ConfirmationToken::issue_default();

    let stored = User::set_password_reset(pool, user.id, &token.hash, token.expires_at).await?;
    if !stored {
        return Err(AccountError::UnknownAccount);
    }

    let link = links.password_confirm(&token.raw);
    mailer
        .send(templates::password_change(&user.email, &user.first_name, &link))
        .await?;

    info!(user_id = %user.id, "Password change link sent");
    Ok(())
}

/// Resolves a password link to its account
///
/// Malformed, unknown and expired tokens are indistinguishable to the caller.
pub async fn check_password_link(pool: &PgPool, raw_token: &str) -> Result<User, AccountError> {
    if !confirmation::is_well_formed(raw_token) {
        debug!("Malformed password link");
        return Err(AccountError::InvalidLink);
    }

    let user = User::find_by_password_reset(pool, &confirmation::hash_token(raw_token))
        .await?
        .ok_or(AccountError::InvalidLink)?;

    if confirmation::is_expired(user.password_reset_expires_at, Utc::now()) {
        return Err(AccountError::InvalidLink);
    }

    Ok(user)
}

/// Checks the two password fields against the policy
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), AccountError> {
    validate_password_strength(password)
        .map_err(|message| AccountError::validation("password", message))?;

    if password != confirmation {
        return Err(AccountError::validation(
            "password_confirmation",
            "The passwords do not match.",
        ));
    }

    Ok(())
}

/// Sets the new password and burns the link
pub async fn confirm_password_change(
    pool: &PgPool,
    raw_token: &str,
    password: &str,
    password_confirmation: &str,
) -> Result<User, AccountError> {
    check_password_link(pool, raw_token).await?;
    validate_new_password(password, password_confirmation)?;

    let password_hash = hash_password(password)?;

    // A concurrent submission may have consumed the token since the check
    let user = User::consume_password_reset(pool, &confirmation::hash_token(raw_token), &password_hash)
        .await?
        .ok_or(AccountError::InvalidLink)?;

    info!(user_id = %user.id, "Password changed through emailed link");
    Ok(user)
}
