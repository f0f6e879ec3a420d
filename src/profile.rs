//! Engine tuning profile, loadable from TOML.
//!
//! Per-entity behavior comes from entity properties; the profile carries
//! the handful of engine-level fallbacks and extents that apply when an
//! entity does not override them.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading or parsing a profile
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to read profile file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse profile TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Engine-level tuning values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Rotation snap increment in degrees, used when an entity declares no
    /// increment of its own.
    pub rotation_increment_deg: f64,

    /// Depth-buffer nudge applied to a transient replace match when the
    /// matched entity declares no buffer of its own.
    pub default_depth_buffer: f64,

    /// Half-extent of the neighbor search box used by cascade queries.
    pub neighbor_search_extent: f64,

    /// Minimum travel on an axis before snapping considers it moved.
    pub snap_epsilon: f64,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            rotation_increment_deg: 15.0,
            default_depth_buffer: 0.02,
            neighbor_search_extent: 1.0,
            snap_epsilon: 1e-9,
        }
    }
}

impl Profile {
    /// Load a profile from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load a profile from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ProfileError> {
        Ok(toml::from_str(content)?)
    }

    /// Rotation increment in radians.
    pub fn rotation_increment(&self) -> f64 {
        self.rotation_increment_deg.to_radians()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile() {
        let p = Profile::default();
        assert_eq!(p.rotation_increment_deg, 15.0);
        assert_eq!(p.default_depth_buffer, 0.02);
        assert_eq!(p.neighbor_search_extent, 1.0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let p = Profile::from_toml_str("rotation_increment_deg = 45.0").unwrap();
        assert_eq!(p.rotation_increment_deg, 45.0);
        assert_eq!(p.default_depth_buffer, 0.02);
    }

    #[test]
    fn test_rotation_increment_in_radians() {
        let p = Profile::from_toml_str("rotation_increment_deg = 90.0").unwrap();
        assert!((p.rotation_increment() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_toml_error() {
        assert!(Profile::from_toml_str("not toml {{{{").is_err());
    }
}
