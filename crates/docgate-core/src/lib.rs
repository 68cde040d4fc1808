//! Core types shared by the docgate crates
//!
//! This crate provides the error taxonomy every layer reports through and the
//! service configuration.

pub mod config;
pub mod error;

// Re-exports
pub use config::{
    CommandConfig, ConverterConfig, DConfig, LogFormat, ObservabilityConfig, ServerConfig,
    StorageConfig,
};
pub use error::{Error, Result};
