//! Per-run generation and population knobs.
//!
//! Everything here can be overridden from a RON file; tunables that are not meant to
//! vary between runs stay as `pub const` next to the code that uses them.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Smallest map that leaves room for the edge margins agents and relocation keep.
pub const MIN_MAP_SIZE: f32 = 100.0;

/// City generation + population settings.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CityConfig {
    /// Fixed seed for reproducible layouts. `None` draws one from entropy.
    pub seed: Option<u64>,
    /// Side length of the square map in world units.
    pub map_size: f32,
    pub blocks_per_side: u32,
    pub block_size: f32,
    pub local_road_width: f32,
    pub arterial_road_width: f32,
    pub avenue_count: u32,
    /// Chance per block of an extra angled road.
    pub diagonal_road_chance: f64,
    pub office_count: u32,
    pub medium_building_count: u32,
    pub filler_attempts: u32,
    pub container_count: u32,
    pub cover_count: u32,
    /// Chance per building of an exterior roof staircase.
    pub stair_chance: f64,
    /// Rounds of road-overlap correction before residuals are accepted.
    pub correction_rounds: u32,
    pub vehicle_count: u32,
    pub bot_count: u32,
    /// Preferred avatar spawn on the XZ plane.
    pub spawn_point: [f32; 2],
}

impl Default for CityConfig {
    fn default() -> Self {
        Self {
            seed: None,
            map_size: 1200.0,
            blocks_per_side: 10,
            block_size: 96.0,
            local_road_width: 8.0,
            arterial_road_width: 18.0,
            avenue_count: 6,
            diagonal_road_chance: 0.06,
            office_count: 8,
            medium_building_count: 20,
            filler_attempts: 30,
            container_count: 12,
            cover_count: 12,
            stair_chance: 0.3,
            correction_rounds: 8,
            vehicle_count: 100,
            bot_count: 25,
            spawn_point: [0.0, 0.0],
        }
    }
}

impl CityConfig {
    pub fn map_half(&self) -> f32 {
        self.map_size * 0.5
    }

    /// Scale applied to landmark coordinates authored for the default 1200-unit map.
    pub fn layout_scale(&self) -> f32 {
        self.map_size / 1200.0
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn from_ron_str(text: &str) -> Result<Self, String> {
        let config: Self =
            ron::from_str(text).map_err(|e| format!("Failed to parse city config RON: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject sizes and chances generation cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.map_size.is_finite() && self.map_size >= MIN_MAP_SIZE) {
            return Err(format!(
                "Invalid city config: map_size {} (must be at least {})",
                self.map_size, MIN_MAP_SIZE
            ));
        }
        for (name, value) in [
            ("block_size", self.block_size),
            ("local_road_width", self.local_road_width),
            ("arterial_road_width", self.arterial_road_width),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("Invalid city config: {name} {value} (must be positive)"));
            }
        }
        for (name, value) in [
            ("diagonal_road_chance", self.diagonal_road_chance),
            ("stair_chance", self.stair_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("Invalid city config: {name} {value} (must be within 0..=1)"));
            }
        }
        if !self.spawn_point.iter().all(|v| v.is_finite()) {
            return Err(format!("Invalid city config: spawn_point {:?}", self.spawn_point));
        }
        Ok(())
    }
}

/// Load a [`CityConfig`] from a RON file on disk.
pub fn load_city_config_from_file(path: impl AsRef<Path>) -> Result<CityConfig, String> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read city config {}: {e}", path.display()))?;
    CityConfig::from_ron_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = CityConfig::from_ron_str("(seed: Some(7), bot_count: 3)").unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.bot_count, 3);
        assert_eq!(config.map_size, 1200.0);
        assert_eq!(config.blocks_per_side, 10);
    }

    #[test]
    fn test_bad_ron_is_an_error() {
        let err = CityConfig::from_ron_str("(map_size: \"huge\")").unwrap_err();
        assert!(err.contains("city config"));
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = CityConfig::from_ron_str(include_str!("../../config/city.ron")).unwrap();
        assert_eq!(config, CityConfig::default().with_seed(1200));
    }

    #[test]
    fn test_degenerate_sizes_are_rejected() {
        for text in [
            "(map_size: 0.0)",
            "(block_size: 0.0)",
            "(local_road_width: -8.0)",
            "(stair_chance: 1.5)",
        ] {
            let err = CityConfig::from_ron_str(text).unwrap_err();
            assert!(err.contains("Invalid city config"), "{}: {}", text, err);
        }
        assert!(CityConfig::default().validate().is_ok());
        let nan = CityConfig {
            map_size: f32::NAN,
            ..default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_city_config_from_file("/definitely/not/here.ron").is_err());
    }
}
