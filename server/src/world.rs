//! City setup from the environment.
//!
//! `CITYSIM_CONFIG` names a RON file with a `CityConfig`; `CITYSIM_SEED` overrides its seed.

use bevy::prelude::*;
use citysim::{load_city_config_from_file, CityConfig, CitySim};

pub const CONFIG_ENV: &str = "CITYSIM_CONFIG";
pub const SEED_ENV: &str = "CITYSIM_SEED";

/// Resolve the config, falling back to defaults when the file is missing or invalid.
pub fn load_config() -> CityConfig {
    let mut config = match std::env::var(CONFIG_ENV) {
        Ok(path) => match load_city_config_from_file(&path) {
            Ok(config) => {
                info!("Loaded city config from {}", path);
                config
            }
            Err(e) => {
                warn!("{}; using default city config", e);
                CityConfig::default()
            }
        },
        Err(_) => CityConfig::default(),
    };

    if let Ok(raw) = std::env::var(SEED_ENV) {
        match parse_seed(&raw) {
            Ok(seed) => config = config.with_seed(seed),
            Err(e) => warn!("{}", e),
        }
    }

    config
}

fn parse_seed(raw: &str) -> Result<u64, String> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| format!("Ignoring {}={:?}: {}", SEED_ENV, raw, e))
}

/// Generate the city and insert the simulation resource.
pub fn setup_city(mut commands: Commands) {
    let config = load_config();
    let sim = CitySim::new(config);
    info!(
        "City initialized (seed {}, {} volumes, {} residual overlaps)",
        sim.seed,
        sim.registry.len(),
        sim.layout.residual_overlaps
    );
    commands.insert_resource(sim);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed() {
        assert_eq!(parse_seed(" 42 "), Ok(42));
        assert!(parse_seed("forty-two").is_err());
    }
}
