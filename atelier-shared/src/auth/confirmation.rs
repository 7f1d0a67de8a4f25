/// Single-use confirmation tokens sent by email
///
/// Password changes and email changes are confirmed through a link carrying a
/// random secret. Only the SHA-256 of the secret is stored; the raw value
/// exists in the outgoing email and nowhere else.
///
/// # Format
///
/// 32 random bytes, hex encoded: 64 lowercase hex characters. Anything else is
/// rejected before the database is consulted.
///
/// # Example
///
/// ```
/// use atelier_shared::auth::confirmation::{hash_token, is_well_formed, verify, ConfirmationToken};
///
/// let token = ConfirmationToken::issue_default();
/// assert!(is_well_formed(&token.raw));
/// assert_eq!(hash_token(&token.raw), token.hash);
/// assert!(verify(&token.raw, &token.hash));
/// ```

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes in a token
const TOKEN_BYTES: usize = 32;

/// Length of the hex-encoded raw token
pub const TOKEN_HEX_LENGTH: usize = TOKEN_BYTES * 2;

/// Lifetime of confirmation links
pub fn default_ttl() -> Duration {
    Duration::hours(1)
}

/// A freshly issued token: the raw secret to send and what to persist
#[derive(Debug, Clone)]
pub struct ConfirmationToken {
    /// Raw secret, goes into the emailed link only
    pub raw: String,

    /// SHA-256 hex of `raw`, stored in the database
    pub hash: String,

    pub expires_at: DateTime<Utc>,
}

impl ConfirmationToken {
    /// Issues a token expiring `ttl` from now
    pub fn issue(ttl: Duration) -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);

        let raw = hex::encode(bytes);
        let hash = hash_token(&raw);

        Self {
            raw,
            hash,
            expires_at: Utc::now() + ttl,
        }
    }

    /// Issues a token with the default one hour lifetime
    pub fn issue_default() -> Self {
        Self::issue(default_ttl())
    }
}

/// SHA-256 of a raw token, hex encoded (64 chars)
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Checks the raw token shape: exactly 64 lowercase hex characters
///
/// # Example
///
/// ```
/// use atelier_shared::auth::confirmation::is_well_formed;
///
/// assert!(is_well_formed(&"ab".repeat(32)));
/// assert!(!is_well_formed(&"AB".repeat(32)));
/// assert!(!is_well_formed("../../etc/passwd"));
/// ```
pub fn is_well_formed(raw: &str) -> bool {
    raw.len() == TOKEN_HEX_LENGTH
        && raw
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Verifies a raw token against a stored hash in constant time
pub fn verify(raw: &str, stored_hash: &str) -> bool {
    is_well_formed(raw) && constant_time_compare(&hash_token(raw), stored_hash)
}

/// Whether a stored expiry has passed; a missing expiry counts as expired
pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expires_at {
        Some(expires_at) => expires_at <= now,
        None => true,
    }
}

/// Constant-time string comparison
///
/// Length mismatch returns early; all hashes compared here have a fixed length.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
