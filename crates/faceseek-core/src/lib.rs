//! Faceseek Core — shared errors, configuration, and vector math.
//!
//! This crate provides the foundational types used across all Faceseek
//! crates. It has no internal Faceseek dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`config`]: Engine configuration with serde defaults
//! - [`vecmath`]: Unit-normalization and inner-product helpers

pub mod config;
pub mod error;
pub mod vecmath;

// Re-export key types at crate root for convenience
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use vecmath::{dot, norm, normalize};
