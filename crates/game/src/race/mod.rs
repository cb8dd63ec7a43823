mod camera;
mod car;
mod config;
mod scene;
mod textures;
mod track;

pub(crate) use config::{load_race_config, ConfigError, RACE_CONFIG_FILE};
pub(crate) use scene::RacingGame;
pub(crate) use track::track_points;

#[cfg(test)]
mod tests;
