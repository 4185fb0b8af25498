//! CareBook - appointment platform backend
//!
//! - JSON API for patients, doctors, pharmacists and administrators
//! - Document-style query layer (filters, sort, select, populate) over Postgres
//! - Bearer-token authentication with role gating
//! - Prometheus metrics and structured logging with optional OTLP export

// Allow clippy lints that are acceptable for this codebase
#![allow(
    clippy::too_many_arguments,      // Repository writes bind many columns
    clippy::large_enum_variant,      // Large enum variants acceptable; boxing may impact performance
)]

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;
