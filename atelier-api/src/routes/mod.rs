/// API route handlers, one module per resource
///
/// - `health`: liveness and database check
/// - `auth`: registration, login, token refresh
/// - `account`: confirmation links followed from emails
/// - `me`: the signed-in user's profile and account requests
/// - `documents`: the signed-in user's documents
/// - `projects`: public portfolio
/// - `admin`: administration area
/// - `files`: multipart and download helpers shared by the above

pub mod account;
pub mod admin;
pub mod auth;
pub mod documents;
pub mod files;
pub mod health;
pub mod me;
pub mod projects;
