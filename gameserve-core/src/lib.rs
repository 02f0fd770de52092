//! Gameserve Core Library
//!
//! This crate provides the core functionality for the gameserve development
//! server, including configuration, the HTTP serving loop, and error handling.

pub mod config;
pub mod error;
pub mod server;

pub use error::{Error, Result};

/// Gameserve version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
