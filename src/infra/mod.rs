//! Infrastructure layer for cross-cutting concerns.
//!
//! Provides foundational infrastructure including:
//! - Configuration management and validation
//! - Error handling and result types
//! - The injected logger handle

pub mod config;
pub mod error;
pub mod logging;
