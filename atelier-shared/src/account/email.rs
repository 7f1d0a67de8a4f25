/// Double-confirmed email change
///
/// ```text
/// None ──request──▶ AwaitingCurrent ──link on old address──▶ AwaitingNew ──link on new address──▶ None (applied)
/// ```
///
/// Each arrow consumes a token and, except the last, issues the next one. The
/// stage is stored next to the token, so a link mailed for one step never
/// satisfies another. A new request at any point overwrites the pending
/// change.
///
/// Requesting an address that already belongs to an account produces exactly
/// the same outcome as requesting a free one; nothing is written or sent.

use sqlx::PgPool;
use tracing::{debug, info, warn};
use validator::ValidateEmail;

use super::{AccountError, Links, EMAIL_CHANGE_REQUESTED};
use crate::auth::confirmation::{self, ConfirmationToken};
use crate::db::{is_unique_violation, USERS_EMAIL_KEY};
use crate::mail::{templates, Mailer};
use crate::models::user::{EmailChangeStage, User};

/// Longest accepted address, matching the column
pub const MAX_EMAIL_CHARS: usize = 180;

/// Where an account stands in the email change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailChangeState {
    None,
    AwaitingCurrent { pending_email: String },
    AwaitingNew { pending_email: String },
}

impl EmailChangeState {
    pub fn of(user: &User) -> Self {
        match (&user.email_change_stage, &user.pending_email) {
            (Some(EmailChangeStage::AwaitingCurrent), Some(pending)) => {
                EmailChangeState::AwaitingCurrent {
                    pending_email: pending.clone(),
                }
            }
            (Some(EmailChangeStage::AwaitingNew), Some(pending)) => EmailChangeState::AwaitingNew {
                pending_email: pending.clone(),
            },
            _ => EmailChangeState::None,
        }
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self, EmailChangeState::None)
    }
}

/// Outcome of a change request, identical for free and taken addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmailChangeRequested;

impl EmailChangeRequested {
    pub fn message(&self) -> &'static str {
        EMAIL_CHANGE_REQUESTED
    }
}

/// Trims, lowercases and checks a requested address against the current one
///
/// Stored addresses are lowercase, the same as registration and login.
pub fn normalize_new_email(current_email: &str, requested: &str) -> Result<String, AccountError> {
    let requested = requested.trim().to_lowercase();

    if !requested.validate_email() {
        return Err(AccountError::validation("email", "Invalid email address."));
    }

    if requested.chars().count() > MAX_EMAIL_CHARS {
        return Err(AccountError::validation(
            "email",
            "The email address is too long.",
        ));
    }

    if requested == current_email.to_lowercase() {
        return Err(AccountError::SameEmail);
    }

    Ok(requested)
}

/// Step one: starts a change and mails the current address
///
/// Mail failures are logged rather than returned, so the response cannot
/// depend on whether a message was actually attempted.
pub async fn request_email_change(
    pool: &PgPool,
    mailer: &dyn Mailer,
    links: &Links,
    user: &User,
    requested: &str,
) -> Result<EmailChangeRequested, AccountError> {
    let new_email = normalize_new_email(&user.email, requested)?;

    if User::email_taken(pool, &new_email).await? {
        debug!(user_id = %user.id, "Email change requested for an address in use");
        return Ok(EmailChangeRequested);
    }

    let token = ConfirmationToken::issue_default();
    User::begin_email_change(pool, user.id, &new_email, &token.hash, token.expires_at)
        .await?
        .ok_or(AccountError::UnknownAccount)?;

    let link = links.email_confirm_current(&token.raw);
    let message = templates::email_change_current(&user.email, &user.first_name, &new_email, &link);

    match mailer.send(message).await {
        Ok(()) => info!(user_id = %user.id, "Email change started"),
        Err(e) => warn!(user_id = %user.id, error = %e, "Email change link could not be sent"),
    }

    Ok(EmailChangeRequested)
}

/// Step two: the current address confirmed; mail the pending one
pub async fn confirm_current_email(
    pool: &PgPool,
    mailer: &dyn Mailer,
    links: &Links,
    raw_token: &str,
) -> Result<User, AccountError> {
    if !confirmation::is_well_formed(raw_token) {
        return Err(AccountError::InvalidLink);
    }

    let next = ConfirmationToken::issue_default();
    let user = User::confirm_current_email(
        pool,
        &confirmation::hash_token(raw_token),
        &next.hash,
        next.expires_at,
    )
    .await?
    .ok_or(AccountError::InvalidLink)?;

    let EmailChangeState::AwaitingNew { pending_email } = EmailChangeState::of(&user) else {
        return Err(AccountError::InvalidLink);
    };

    let link = links.email_confirm_new(&next.raw);
    mailer
        .send(templates::email_change_new(&pending_email, &user.first_name, &link))
        .await?;

    info!(user_id = %user.id, "Current address confirmed for email change");
    Ok(user)
}

/// Step three: the pending address confirmed; apply the change
///
/// If the pending address was registered by another account in the meantime,
/// the change is dropped and the link reported invalid.
pub async fn confirm_new_email(pool: &PgPool, raw_token: &str) -> Result<User, AccountError> {
    if !confirmation::is_well_formed(raw_token) {
        return Err(AccountError::InvalidLink);
    }

    let token_hash = confirmation::hash_token(raw_token);

    match User::apply_email_change(pool, &token_hash).await {
        Ok(Some(user)) => {
            info!(user_id = %user.id, "Email address changed");
            Ok(user)
        }
        Ok(None) => Err(AccountError::InvalidLink),
        Err(e) if is_unique_violation(&e, USERS_EMAIL_KEY) => {
            warn!("Pending email address was taken before confirmation; change dropped");
            User::clear_email_change_by_token(pool, &token_hash).await?;
            Err(AccountError::InvalidLink)
        }
        Err(e) => Err(e.into()),
    }
}
