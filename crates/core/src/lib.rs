//! pawtrip core library
//!
//! Foundational pieces shared by every pawtrip crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging setup
//! - Workspace configuration

pub mod config;
pub mod error;
pub mod logging;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
