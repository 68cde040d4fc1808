//! HTTP surface for docgate

pub mod error;
pub mod rest;
pub mod types;

pub use error::AppError;
pub use rest::{AppState, DEFAULT_MAX_UPLOAD_BYTES, RouterOptions, create_router};
pub use types::*;
