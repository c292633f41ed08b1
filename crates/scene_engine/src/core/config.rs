//! # Pipeline Configuration
//!
//! Runtime knobs for the per-frame pipeline. These replace what would
//! otherwise be compile-time switches: whether frustum culling runs at all,
//! which bounding test is used, and whether survivors are depth sorted.
//!
//! ## Example (TOML)
//!
//! ```toml
//! log_level = "debug"
//! max_lights = 4
//!
//! [culling]
//! frustum_culling = true
//! bounding_test = "OrientedBox"
//! z_sort = true
//!
//! [frustum]
//! vertical_fov_degrees = 70.0
//! front = 0.5
//! back = 500.0
//! aspect = 1.7777
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};
use crate::foundation::math::utils;
use crate::scene::frustum::ViewFrustum;
use crate::scene::light_sorter::MAX_LIGHTS;

/// Bounding volume test used by the cull pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BoundingTest {
    /// Bounding sphere against the six planes (fast, default)
    #[default]
    Sphere,
    /// Eight corners of the model-space box against the six planes (stricter)
    OrientedBox,
}

/// Cull pass configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullConfig {
    /// Run the frustum test; when disabled every enabled visual survives
    pub frustum_culling: bool,
    /// Bounding volume test kind
    pub bounding_test: BoundingTest,
    /// Sort survivors nearest-first by view-space depth
    pub z_sort: bool,
}

impl CullConfig {
    /// Create the default configuration (culling on, sphere test, z-sort on)
    pub const fn new() -> Self {
        Self {
            frustum_culling: true,
            bounding_test: BoundingTest::Sphere,
            z_sort: true,
        }
    }

    /// Enable or disable the cull pass
    pub const fn with_frustum_culling(mut self, enabled: bool) -> Self {
        self.frustum_culling = enabled;
        self
    }

    /// Select the bounding test
    pub const fn with_bounding_test(mut self, test: BoundingTest) -> Self {
        self.bounding_test = test;
        self
    }

    /// Enable or disable the depth sort
    pub const fn with_z_sort(mut self, enabled: bool) -> Self {
        self.z_sort = enabled;
        self
    }
}

impl Default for CullConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Initial frustum parameters for a camera
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrustumConfig {
    /// Vertical field of view in degrees
    pub vertical_fov_degrees: f32,
    /// Near plane distance
    pub front: f32,
    /// Far plane distance
    pub back: f32,
    /// Viewport width / height
    pub aspect: f32,
}

impl FrustumConfig {
    /// Build a validated [`ViewFrustum`] from these parameters
    pub fn build(&self) -> Result<ViewFrustum, ConfigError> {
        ViewFrustum::new(
            utils::deg_to_rad(self.vertical_fov_degrees),
            self.front,
            self.back,
            self.aspect,
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

impl Default for FrustumConfig {
    fn default() -> Self {
        Self {
            vertical_fov_degrees: 60.0,
            front: 0.1,
            back: 1000.0,
            aspect: 4.0 / 3.0,
        }
    }
}

/// # Pipeline Configuration
///
/// Top-level configuration for a camera and its frame pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Log filter used when initialising `env_logger`
    pub log_level: String,
    /// Cull pass knobs
    pub culling: CullConfig,
    /// Initial frustum
    pub frustum: FrustumConfig,
    /// Lights handed to a visual per query (at most `MAX_LIGHTS`)
    pub max_lights: usize,
}

impl PipelineConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            culling: CullConfig::default(),
            frustum: FrustumConfig::default(),
            max_lights: MAX_LIGHTS,
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set cull configuration
    pub const fn with_culling(mut self, culling: CullConfig) -> Self {
        self.culling = culling;
        self
    }

    /// Set frustum parameters
    pub const fn with_frustum(mut self, frustum: FrustumConfig) -> Self {
        self.frustum = frustum;
        self
    }

    /// Set the per-query light limit
    pub const fn with_max_lights(mut self, max_lights: usize) -> Self {
        self.max_lights = max_lights;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_lights == 0 || self.max_lights > MAX_LIGHTS {
            return Err(ConfigError::Invalid(format!(
                "max_lights must be within 1..={MAX_LIGHTS}, got {}",
                self.max_lights
            )));
        }
        self.frustum.build()?;
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for PipelineConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.culling.frustum_culling);
        assert_eq!(config.culling.bounding_test, BoundingTest::Sphere);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
            max_lights = 4

            [culling]
            bounding_test = "OrientedBox"
            z_sort = false
            "#,
        )
        .expect("valid toml");

        assert_eq!(config.max_lights, 4);
        assert_eq!(config.culling.bounding_test, BoundingTest::OrientedBox);
        assert!(!config.culling.z_sort);
        // Untouched sections keep their defaults
        assert!(config.culling.frustum_culling);
        assert_relative_eq!(config.frustum.back, 1000.0);
    }

    #[test]
    fn test_parse_ron() {
        let config = PipelineConfig::from_ron_str(
            "(log_level: \"trace\", culling: (frustum_culling: false), max_lights: 2)",
        )
        .expect("valid ron");

        assert_eq!(config.log_level, "trace");
        assert!(!config.culling.frustum_culling);
        assert_eq!(config.max_lights, 2);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let too_many_lights = PipelineConfig::default().with_max_lights(MAX_LIGHTS + 1);
        assert!(matches!(
            too_many_lights.validate(),
            Err(ConfigError::Invalid(_))
        ));

        let inverted_planes = PipelineConfig::default().with_frustum(FrustumConfig {
            front: 10.0,
            back: 1.0,
            ..FrustumConfig::default()
        });
        assert!(inverted_planes.validate().is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let result = PipelineConfig::default().save_to_file("pipeline.yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
