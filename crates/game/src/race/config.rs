use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::PhysicsConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use super::track::TrackConfig;

pub(crate) const RACE_CONFIG_FILE: &str = "race.json";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RaceConfig {
    pub(crate) ai_cars: u32,
    pub(crate) player_car: bool,
    pub(crate) skins: Vec<String>,
    pub(crate) ambient: [f32; 3],
    pub(crate) environment_texture: String,
    pub(crate) floor_texture: String,
    pub(crate) track: TrackConfig,
    pub(crate) physics: PhysicsConfig,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            ai_cars: 1,
            player_car: false,
            skins: vec!["bmw850".to_string()],
            ambient: [0.06; 3],
            environment_texture: "textures/environment/default_reflection.tga".to_string(),
            floor_texture: "textures/floor.tga".to_string(),
            track: TrackConfig::default(),
            physics: PhysicsConfig::default(),
        }
    }
}

impl RaceConfig {
    pub(crate) fn car_count(&self) -> u32 {
        self.ai_cars.saturating_add(u32::from(self.player_car))
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read race config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse race config {path} at {location}: {source}")]
    Parse {
        path: PathBuf,
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid race config {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Reads the race config at `path`. A missing file means defaults.
pub(crate) fn load_race_config(path: &Path) -> Result<RaceConfig, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "race_config_defaults");
            return Ok(RaceConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let config = parse_race_config(&raw, path)?;
    validate_race_config(&config, path)?;
    info!(path = %path.display(), "race_config_loaded");
    Ok(config)
}

fn parse_race_config(raw: &str, path: &Path) -> Result<RaceConfig, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, RaceConfig>(&mut deserializer).map_err(|error| {
        let location = match error.path().to_string() {
            location if location.is_empty() || location == "." => "root".to_string(),
            location => location,
        };
        ConfigError::Parse {
            path: path.to_path_buf(),
            location,
            source: error.into_inner(),
        }
    })
}

fn validate_race_config(config: &RaceConfig, path: &Path) -> Result<(), ConfigError> {
    let invalid = |message: &str| ConfigError::Invalid {
        path: path.to_path_buf(),
        message: message.to_string(),
    };

    if config.skins.is_empty() {
        return Err(invalid("skins must name at least one car skin"));
    }
    if config.skins.iter().any(|skin| skin.trim().is_empty()) {
        return Err(invalid("skin names must not be blank"));
    }
    if config.ambient.iter().any(|channel| !(0.0..=1.0).contains(channel)) {
        return Err(invalid("ambient channels must lie in [0, 1]"));
    }
    Ok(())
}
