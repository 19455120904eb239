//! Core utilities shared by the vellum crates.
//!
//! This crate provides:
//! - Error types and result aliases
//! - Logging initialization
//! - Configuration loading
//! - Frame timing statistics

mod config;
mod error;
mod logging;
mod timer;

pub use config::{Config, GpuConfig, LoggingConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::FrameTimer;
