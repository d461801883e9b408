//! Server module for StepsOS
//!
//! Contains the server initialization and runtime logic.
//!
//! # Module Structure
//!
//! - `config`: Configuration structures for all server components
//! - `loader`: Configuration loading from files and environment
//! - `validation`: Startup configuration validation
//! - `init`: Application state, router and run loop

pub mod config;
mod init;
mod loader;
mod validation;

// Re-export public API
pub use init::{build_router, run, AppState};
pub use loader::load_config;
