//! # Atelier API Server Library
//!
//! HTTP layer of the atelier back office: accounts, document exchange
//! between administrators and users, and the project portfolio.
//!
//! ## Modules
//!
//! - `app`: application state and router builder
//! - `config`: environment configuration
//! - `error`: error to HTTP response mapping
//! - `middleware`: authentication and security headers
//! - `routes`: route handlers
//! - `telemetry`: tracing subscriber with secret redaction

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod telemetry;
