//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the Graph client core:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions and the validated configuration
//! every client is constructed from.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{GraphConfig, GraphConfigBuilder};
pub use error::{Error, Result};
pub use logging::ClientLogger;
