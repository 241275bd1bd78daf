//! Relay daemon library
//!
//! Components of the `relayd` process:
//! - REST API over the procedure gateway
//! - Configuration loading
//! - Server lifecycle with embedded worker pools

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use server::Server;
