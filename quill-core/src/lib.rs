//! Quill Core - shared infrastructure for the Quill blog backend
//!
//! Error handling, logging setup and configuration loading used by every
//! other crate in the workspace.

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
pub use logging::*;

// Re-export commonly used external types
pub use tracing;
