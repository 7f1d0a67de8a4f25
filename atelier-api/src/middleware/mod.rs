/// Middleware for the API server
///
/// - `auth`: bearer-token authentication and the admin guard
/// - `rate_limit`: per-IP throttling of mail-sending requests
/// - `security`: response security and cache headers

pub mod auth;
pub mod rate_limit;
pub mod security;
