//! # Atelier shared library
//!
//! Domain code used by the Atelier API server.
//!
//! ## Module Organization
//!
//! - `auth`: passwords, session tokens, emailed confirmation tokens, access checks
//! - `account`: self-service flows (identity, password change, email change)
//! - `db`: connection pool and migrations
//! - `models`: tables and their queries
//! - `gallery`: project cover image rules
//! - `storage`: upload sniffing, policies and the on-disk file store
//! - `mail`: outgoing message abstraction and templates

pub mod account;
pub mod auth;
pub mod db;
pub mod gallery;
pub mod mail;
pub mod models;
pub mod storage;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
