/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and the length policy
/// - [`jwt`]: session token creation and validation
/// - [`confirmation`]: emailed single-use tokens (hashed at rest, one hour TTL)
/// - [`middleware`]: bearer token to [`middleware::AuthContext`]
/// - [`authorization`]: admin and ownership checks

pub mod authorization;
pub mod confirmation;
pub mod jwt;
pub mod middleware;
pub mod password;
