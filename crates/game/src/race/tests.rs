use std::fs;
use std::rc::Rc;

use engine::app::{Batch, FrameUniforms, GeometryUpload, LineVertex};
use engine::{
    Application, AssetManager, Behavior, BehaviorInfo, DebugDraw, EngineContext, GameObject,
    InputAction, InputSnapshot, Mat4, ObjectId, PhysicsConfig, RenderBackend, RenderContext,
    Scene, SceneWorld, Spline, Vec2, Vec3,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

use super::camera::ChaseCamera;
use super::car::{random_tint, CarBehavior, CarDriver, CarSprite, MAX_GUIDE_OFFSET};
use super::config::{load_race_config, ConfigError, RaceConfig};
use super::scene::{RaceScene, RacingGame, CAMERA_TAG, MAIN_SCENE, PLAYER_TAG};
use super::textures::{ensure_fallback_textures, skin_texture_name};
use super::track::{track_points, TrackConfig};

const DT: f32 = 1.0 / 60.0;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 0.001
}

fn default_waypoints() -> Rc<[Spline]> {
    Spline::closed_loop(&track_points(&TrackConfig::default()))
        .expect("default track")
        .into()
}

fn no_waypoints() -> Rc<[Spline]> {
    Vec::new().into()
}

fn world() -> SceneWorld {
    SceneWorld::new(PhysicsConfig::default())
}

fn run_ticks(world: &mut SceneWorld, input: InputSnapshot, ticks: u32) {
    let mut debug = DebugDraw::new(false);
    for _ in 0..ticks {
        world.update(DT, &input, &mut debug);
    }
}

fn car_info(world: &SceneWorld, id: ObjectId) -> BehaviorInfo {
    world
        .object(id)
        .and_then(|object| object.behavior_info(CarBehavior::KIND))
        .expect("car behavior")
}

fn scalar(info: &BehaviorInfo, name: &str) -> f32 {
    info.scalar(name).expect(name)
}

fn velocity_of(world: &SceneWorld, id: ObjectId) -> Vec2 {
    let body = world.object(id).and_then(GameObject::body).expect("body");
    world.physics().linear_velocity(body)
}

#[derive(Default)]
struct CountingBackend {
    batches: usize,
    line_vertices: usize,
}

impl RenderBackend for CountingBackend {
    fn upload_geometry(&mut self, _upload: GeometryUpload<'_>) {}

    fn draw_batch(&mut self, _uniforms: &FrameUniforms<'_>, _batch: &Batch) {
        self.batches += 1;
    }

    fn draw_lines(&mut self, _view_projection: &Mat4, lines: &[LineVertex]) {
        self.line_vertices += lines.len();
    }
}

#[test]
fn default_track_samples_twenty_points() {
    let points = track_points(&TrackConfig::default());

    assert_eq!(points.len(), 20);
    assert!(approx(points[0].x, 10.0) && approx(points[0].y, 0.0));
    // 90 degrees: the wobble term sin(5 * pi / 2) is at its peak.
    assert!(approx(points[5].x, 0.0) && approx(points[5].y, 9.0));
}

#[test]
fn zero_step_track_cannot_form_a_loop() {
    let track = TrackConfig {
        step_degrees: 0,
        ..TrackConfig::default()
    };
    assert!(track_points(&track).is_empty());
    assert!(Spline::closed_loop(&track_points(&track)).is_err());
}

#[test]
fn missing_config_file_uses_defaults() {
    let dir = TempDir::new().expect("tempdir");
    let config = load_race_config(&dir.path().join("race.json")).expect("defaults");

    assert_eq!(config, RaceConfig::default());
    assert_eq!(config.car_count(), 1);
}

#[test]
fn partial_config_overrides_named_fields() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("race.json");
    fs::write(
        &path,
        r#"{ "ai_cars": 3, "player_car": true, "track": { "radius_x": 12.0 } }"#,
    )
    .expect("write");

    let config = load_race_config(&path).expect("config");

    assert_eq!(config.ai_cars, 3);
    assert_eq!(config.car_count(), 4);
    assert!(approx(config.track.radius_x, 12.0));
    assert!(approx(config.track.radius_y, 8.0));
    assert_eq!(config.skins, vec!["bmw850".to_string()]);
}

#[test]
fn unknown_field_reports_its_location() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("race.json");
    fs::write(&path, r#"{ "track": { "radius_z": 1.0 } }"#).expect("write");

    match load_race_config(&path) {
        Err(ConfigError::Parse { location, .. }) => assert!(location.starts_with("track")),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn empty_skin_list_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("race.json");
    fs::write(&path, r#"{ "skins": [] }"#).expect("write");

    assert!(matches!(
        load_race_config(&path),
        Err(ConfigError::Invalid { .. })
    ));
}

#[test]
fn player_commands_follow_input_then_decay() {
    let mut world = world();
    let car = world.add(GameObject::new().with_behavior(CarBehavior::new(
        CarDriver::Player,
        no_waypoints(),
        0.0,
    )));
    let input = InputSnapshot::empty()
        .with_action_down(InputAction::Accelerate, true)
        .with_action_down(InputAction::SteerLeft, true);

    run_ticks(&mut world, input, 1);

    let info = car_info(&world, car);
    assert_eq!(scalar(&info, "acceleration"), 0.0);
    assert!(approx(scalar(&info, "steering"), 0.4));
    assert_eq!(scalar(&info, "braking"), 0.0);
    assert_eq!(info.label("driver"), Some("player"));
}

#[test]
fn throttle_pushes_the_car_forward() {
    let mut world = world();
    let car = world.add(GameObject::new().with_behavior(CarBehavior::new(
        CarDriver::Player,
        no_waypoints(),
        0.0,
    )));
    let input = InputSnapshot::empty().with_action_down(InputAction::Accelerate, true);

    run_ticks(&mut world, input, 30);

    let velocity = velocity_of(&world, car);
    assert!(velocity.x > 0.1, "velocity {velocity:?}");
    assert!(velocity.y.abs() < velocity.x);
    assert!(world.object(car).expect("car").position().x > 0.0);
}

#[test]
fn progress_holds_while_far_from_the_guide() {
    let mut world = world();
    let car = world.add(
        GameObject::new()
            .with_position(Vec3::new(50.0, 50.0, 0.0))
            .with_behavior(CarBehavior::new(CarDriver::Ai, default_waypoints(), 0.0)),
    );

    run_ticks(&mut world, InputSnapshot::empty(), 20);

    let info = car_info(&world, car);
    assert_eq!(scalar(&info, "track_progress"), 0.0);
    assert!((info.vector("guide").expect("guide") - Vec2::new(10.0, 0.0)).norm() < 0.001);
    assert_eq!(info.count("laps"), Some(0));
}

#[test]
fn progress_advances_near_the_guide() {
    let mut world = world();
    let car = world.add(
        GameObject::new()
            .with_position(Vec3::new(10.0, 0.0, 0.0))
            .with_rotation(std::f32::consts::FRAC_PI_2)
            .with_behavior(CarBehavior::new(CarDriver::Ai, default_waypoints(), 0.0)),
    );

    run_ticks(&mut world, InputSnapshot::empty(), 20);

    assert!(scalar(&car_info(&world, car), "track_progress") > 0.0);
}

#[test]
fn ai_steering_follows_guide_side() {
    let mut world = world();
    // Facing -y from the origin, the start guide at (10, 0) lies straight
    // along the car's right axis.
    let car = world.add(
        GameObject::new()
            .with_rotation(-std::f32::consts::FRAC_PI_2)
            .with_behavior(CarBehavior::new(CarDriver::Ai, default_waypoints(), 0.0)),
    );

    run_ticks(&mut world, InputSnapshot::empty(), 1);

    assert!(scalar(&car_info(&world, car), "waypoint_side") > 0.9);
}

#[test]
fn random_offsets_and_tints_stay_in_range() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..100 {
        let car = CarBehavior::with_random_offset(CarDriver::Ai, no_waypoints(), &mut rng);
        assert!(scalar(&car.info(), "offset").abs() <= MAX_GUIDE_OFFSET);

        let tint = random_tint(&mut rng);
        for channel in [tint.x, tint.y, tint.z] {
            assert!((0.2..=1.0).contains(&channel));
        }
        assert_eq!(tint.w, 1.0);
    }
}

#[test]
fn chase_camera_eases_toward_target() {
    let mut world = world();
    let target = world.add(GameObject::new().with_position(Vec3::new(10.0, 0.0, 0.0)));
    let camera = world.add(GameObject::new().with_behavior(ChaseCamera::new(Some(target))));

    run_ticks(&mut world, InputSnapshot::empty(), 1);

    let object = world.object(camera).expect("camera");
    assert!(approx(object.position().x, 2.1));
    let chase = object.behavior_info(ChaseCamera::KIND).expect("chase");
    assert!(approx(scalar(&chase, "zoom"), 1.0));
    assert_eq!(chase.object("target"), Some(target));
}

#[test]
fn chase_camera_sets_view_and_projection() {
    let mut world = world();
    let target = world.add(GameObject::new().with_position(Vec3::new(10.0, 0.0, 0.0)));
    world.add(GameObject::new().with_behavior(ChaseCamera::new(Some(target))));
    run_ticks(&mut world, InputSnapshot::empty(), 1);

    let mut ctx = RenderContext::new();
    ctx.set_viewport(1600, 1000);
    world.render(&mut ctx, &mut DebugDraw::new(false));

    let view = ctx.view();
    assert!(approx(view[(0, 3)], -2.1));
    assert!(approx(view[(2, 3)], -4.0));
    let expected = 1.0 / (1.6 * 25.0_f32.to_radians().tan());
    assert!(approx(ctx.projection()[(0, 0)], expected));
}

#[test]
fn race_scene_lines_up_cars_behind_the_camera_target() {
    let dir = TempDir::new().expect("tempdir");
    let mut assets = AssetManager::new(dir.path());
    let config = RaceConfig {
        ai_cars: 2,
        player_car: true,
        ..RaceConfig::default()
    };
    let mut scene = RaceScene::new(
        Rc::new(config),
        default_waypoints(),
        StdRng::seed_from_u64(5),
    );
    let mut world = world();

    scene.create(&mut world, &mut assets);
    run_ticks(&mut world, InputSnapshot::empty(), 1);

    assert_eq!(world.object_count(), 5);
    let player = world.find_by_tag(PLAYER_TAG).expect("player");
    assert_eq!(
        player
            .behavior_info(CarBehavior::KIND)
            .and_then(|info| info.label("driver")),
        Some(CarDriver::Player.label())
    );
    assert!(player.has_behavior(CarSprite::KIND));
    let camera = world.find_by_tag(CAMERA_TAG).expect("camera");
    assert!(!camera.has_behavior(CarBehavior::KIND));
    assert_eq!(
        camera
            .behavior_info(ChaseCamera::KIND)
            .and_then(|info| info.object("target")),
        Some(player.id())
    );

    let cars: Vec<_> = world
        .objects()
        .iter()
        .filter(|object| object.has_behavior(CarBehavior::KIND))
        .collect();
    assert_eq!(cars.len(), 3);
    let spacing = (cars[0].position() - cars[1].position()).norm();
    assert!(spacing > 1.0, "cars overlap: {spacing}");
}

#[test]
fn fallback_textures_fill_missing_skins_once() {
    let dir = TempDir::new().expect("tempdir");
    let mut assets = AssetManager::new(dir.path());
    let skins = vec!["bmw850".to_string()];

    let generated =
        ensure_fallback_textures(&mut assets, &skins, "textures/floor.tga").expect("fallbacks");
    let again =
        ensure_fallback_textures(&mut assets, &skins, "textures/floor.tga").expect("fallbacks");

    assert_eq!(generated, 2);
    assert_eq!(again, 0);
    assert!(!assets.texture(&skin_texture_name("bmw850", "color")).is_none());
    assert!(!assets.texture("textures/floor.tga").is_none());
}

#[test]
fn racing_game_runs_headless() {
    let dir = TempDir::new().expect("tempdir");
    let mut engine = EngineContext::new(AssetManager::new(dir.path()), PhysicsConfig::default());
    let waypoints = Spline::closed_loop(&track_points(&TrackConfig::default())).expect("track");
    let mut game = RacingGame::new(RaceConfig::default(), waypoints).with_seed(3);
    let mut backend = CountingBackend::default();
    engine.debug.set_enabled(false);

    game.init(&mut engine);
    assert_eq!(engine.scenes.current_scene(), Some(MAIN_SCENE));

    engine.tick(&mut game, DT, InputSnapshot::empty());
    engine.tick(&mut game, DT, InputSnapshot::empty());
    let batches = engine.render_frame(&mut game, &mut backend);

    assert_eq!(engine.scenes.world().expect("world").object_count(), 3);
    // Floor and car use different color textures.
    assert_eq!(batches, 2);
    assert_eq!(backend.batches, 2);
    assert_eq!(backend.line_vertices, 0);
}
