use engine::{
    resolve_app_paths, AppPaths, Application, LoopConfig, Spline, SplineError, StartupError,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::race::{load_race_config, track_points, ConfigError, RacingGame, RACE_CONFIG_FILE};

const WINDOW_TITLE: &str = "Racing Game";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) paths: AppPaths,
    pub(crate) app: Box<dyn Application>,
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid track waypoints: {0}")]
    Track(#[from] SplineError),
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Racing Game Startup ===");

    let paths = resolve_app_paths()?;
    let race = load_race_config(&paths.assets_dir.join(RACE_CONFIG_FILE))?;
    let waypoints = Spline::closed_loop(&track_points(&race.track))?;
    info!(
        waypoints = waypoints.len(),
        ai_cars = race.ai_cars,
        player_car = race.player_car,
        "race_configured"
    );

    let config = LoopConfig {
        window_title: WINDOW_TITLE.to_string(),
        window_width: 1024,
        window_height: 640,
        physics: race.physics,
        ..LoopConfig::default()
    };

    Ok(AppWiring {
        config,
        paths,
        app: Box::new(RacingGame::new(race, waypoints)),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
