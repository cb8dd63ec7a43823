use std::rc::Rc;

use engine::{
    Application, AssetManager, EngineContext, GameObject, Material, ObjectId, Scene, SceneWorld,
    Spline, Vec2, Vec3,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use super::camera::ChaseCamera;
use super::car::{random_tint, CarBehavior, CarDriver, CarSprite, TrackDecor};
use super::config::RaceConfig;
use super::textures::{ensure_fallback_textures, load_skin};

pub(crate) const MAIN_SCENE: &str = "main";
pub(crate) const PLAYER_TAG: &str = "PLAYER";
pub(crate) const AI_TAG: &str = "AI";
pub(crate) const CAMERA_TAG: &str = "CAM";
pub(crate) const TRACK_TAG: &str = "TRACK";

const GRID_SPACING: f32 = 1.4;

/// The race itself: cars lined up behind the start of the loop, the track
/// decor and a chase camera on the player (or the first AI car).
pub(crate) struct RaceScene {
    config: Rc<RaceConfig>,
    waypoints: Rc<[Spline]>,
    rng: StdRng,
}

impl RaceScene {
    pub(crate) fn new(config: Rc<RaceConfig>, waypoints: Rc<[Spline]>, rng: StdRng) -> Self {
        Self {
            config,
            waypoints,
            rng,
        }
    }

    /// Grid slot `index` sits behind the first waypoint, facing along the
    /// track.
    fn grid_slot(&self, index: u32) -> (Vec2, f32) {
        let Some(first) = self.waypoints.first() else {
            return (Vec2::new(-(index as f32) * GRID_SPACING, 0.0), 0.0);
        };
        let start = first.get(0.0);
        let ahead = first.get(0.05) - start;
        let heading = if ahead.norm() > f32::EPSILON {
            ahead.normalize()
        } else {
            Vec2::new(1.0, 0.0)
        };
        (
            start - heading * (index as f32 * GRID_SPACING),
            heading.y.atan2(heading.x),
        )
    }

    fn spawn_car(&mut self, world: &mut SceneWorld, skin: Material, index: u32) -> ObjectId {
        let driver = if self.config.player_car && index == 0 {
            CarDriver::Player
        } else {
            CarDriver::Ai
        };
        let tag = match driver {
            CarDriver::Player => PLAYER_TAG,
            CarDriver::Ai => AI_TAG,
        };
        let (position, rotation) = self.grid_slot(index);

        let car = GameObject::new()
            .with_tag(tag)
            .with_position(Vec3::new(position.x, position.y, 0.0))
            .with_rotation(rotation)
            .with_behavior(CarBehavior::with_random_offset(
                driver,
                Rc::clone(&self.waypoints),
                &mut self.rng,
            ))
            .with_behavior(CarSprite::new(skin, random_tint(&mut self.rng)));
        world.add(car)
    }
}

impl Scene for RaceScene {
    fn create(&mut self, world: &mut SceneWorld, assets: &mut AssetManager) {
        let floor = Material::new(assets.texture(&self.config.floor_texture));
        world.add(
            GameObject::new()
                .with_tag(TRACK_TAG)
                .with_behavior(TrackDecor::new(floor)),
        );

        let skins: Vec<Material> = self
            .config
            .skins
            .iter()
            .map(|skin| load_skin(assets, skin))
            .collect();

        let mut followed = None;
        for index in 0..self.config.car_count() {
            let skin = skins
                .get(index as usize % skins.len().max(1))
                .copied()
                .unwrap_or_default();
            let id = self.spawn_car(world, skin, index);
            followed.get_or_insert(id);
        }

        let (camera_start, _) = self.grid_slot(0);
        world.add(
            GameObject::new()
                .with_tag(CAMERA_TAG)
                .with_position(Vec3::new(camera_start.x, camera_start.y, 0.0))
                .with_behavior(ChaseCamera::new(followed)),
        );

        info!(
            cars = self.config.car_count(),
            waypoints = self.waypoints.len(),
            "race_scene_created"
        );
    }
}

/// Wires the race into the engine: lighting, fallback textures and the
/// main scene.
pub(crate) struct RacingGame {
    config: Rc<RaceConfig>,
    waypoints: Rc<[Spline]>,
    seed: Option<u64>,
}

impl RacingGame {
    pub(crate) fn new(config: RaceConfig, waypoints: Vec<Spline>) -> Self {
        Self {
            config: Rc::new(config),
            waypoints: waypoints.into(),
            seed: None,
        }
    }

    /// Fixes the random offsets and tints, for reproducible runs.
    #[cfg(test)]
    pub(crate) fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

impl Application for RacingGame {
    fn init(&mut self, engine: &mut EngineContext) {
        let config = &self.config;
        match ensure_fallback_textures(&mut engine.assets, &config.skins, &config.floor_texture) {
            Ok(generated) if generated > 0 => info!(generated, "fallback_textures_ready"),
            Ok(_) => {}
            Err(error) => warn!(error = %error, "fallback_textures_failed"),
        }

        engine.render.set_ambient(Vec3::from(config.ambient));
        let environment = engine.assets.texture(&config.environment_texture);
        engine.render.set_environment(environment);

        let scene = RaceScene::new(Rc::clone(config), Rc::clone(&self.waypoints), self.rng());
        engine.scenes.register_scene(MAIN_SCENE, Box::new(scene));
    }

    fn exit(&mut self, engine: &mut EngineContext) {
        let Some(world) = engine.scenes.world() else {
            return;
        };
        for object in world.objects() {
            let Some(car) = object.behavior_info(CarBehavior::KIND) else {
                continue;
            };
            info!(
                object = object.id().0,
                driver = car.label("driver").unwrap_or("unknown"),
                laps = car.count("laps").unwrap_or(0),
                track_progress = car.scalar("track_progress").unwrap_or(0.0),
                "race_standing"
            );
        }
    }
}
