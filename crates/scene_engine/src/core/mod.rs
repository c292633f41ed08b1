//! # Core Engine Module
//!
//! Shared configuration types used by the scene and render layers.

pub mod config;

pub use config::{BoundingTest, CullConfig, FrustumConfig, PipelineConfig};
