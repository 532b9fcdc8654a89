//! Engine tuning knobs.
//!
//! Defaults mirror the values the interactive editor ships with; hosts can
//! load overrides from a JSON/JSON5 file the same way themes are usually
//! configured.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Stand-off distance between a bound elbow endpoint and the shape
    /// outline.
    pub fixed_binding_distance: f64,
    /// Thickness of the binding highlight drawn by the host, kept in sync so
    /// hover hit-testing matches what the user sees.
    pub highlight_thickness: f64,
    pub highlight_offset: f64,
    /// Snap-to-center tolerance as a fraction of the shape dimension.
    pub mid_snap_tolerance: f64,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            fixed_binding_distance: 5.0,
            highlight_thickness: 10.0,
            highlight_offset: 4.0,
            mid_snap_tolerance: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Corridor padding around bound shapes.
    pub base_padding: f64,
    /// Segments shorter than this are dropped as grid-snap noise.
    pub dedup_threshold: f64,
    /// Coordinates are clamped to ±this during normalization.
    pub max_pos: f64,
    pub binding: BindingConfig,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_padding: 40.0,
            dedup_threshold: 1.0,
            max_pos: 1e6,
            binding: BindingConfig::default(),
        }
    }
}

/// Load a config override file (JSON or JSON5). A missing path yields the
/// defaults.
pub fn load_config(path: Option<&Path>) -> Result<RoutingConfig, EngineError> {
    let Some(path) = path else {
        return Ok(RoutingConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|err| EngineError::Config(format!("{}: {err}", path.display())))?;
    json5::from_str(&raw).map_err(|err| EngineError::Config(format!("{}: {err}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_path() {
        let config = load_config(None).unwrap();
        assert_eq!(config.base_padding, 40.0);
        assert_eq!(config.binding.fixed_binding_distance, 5.0);
    }

    #[test]
    fn config_roundtrips_through_json() {
        let config = RoutingConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: RoutingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dedup_threshold, config.dedup_threshold);
        assert_eq!(back.binding.highlight_offset, config.binding.highlight_offset);
    }
}
