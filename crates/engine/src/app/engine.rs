use tracing::info;

use crate::assets::AssetManager;

use super::input::{InputAction, InputSnapshot};
use super::physics::PhysicsConfig;
use super::rendering::{DebugDraw, RenderBackend, RenderContext, Renderer};
use super::scene::{FrameContext, SceneManager};

/// Game-level hooks driven by the loop. `update` runs before the active
/// scene each tick; `render` draws in its own bracket after the scene.
pub trait Application {
    fn init(&mut self, engine: &mut EngineContext);

    fn update(&mut self, _dt: f32, _engine: &mut EngineContext) {}

    fn render(&mut self, _ctx: &mut RenderContext) {}

    fn exit(&mut self, _engine: &mut EngineContext) {}
}

/// Everything a running game reaches through the engine: scenes, the render
/// context, debug lines and textures.
pub struct EngineContext {
    pub scenes: SceneManager,
    pub render: RenderContext,
    pub debug: DebugDraw,
    pub assets: AssetManager,
    input: InputSnapshot,
    exit_requested: bool,
}

impl EngineContext {
    pub fn new(assets: AssetManager, physics_config: PhysicsConfig) -> Self {
        Self {
            scenes: SceneManager::new(physics_config),
            render: RenderContext::new(),
            debug: DebugDraw::default(),
            assets,
            input: InputSnapshot::empty(),
            exit_requested: false,
        }
    }

    pub fn input(&self) -> &InputSnapshot {
        &self.input
    }

    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Runs one fixed step. Debug lines queued by earlier ticks of the same
    /// frame are dropped so only the latest state is drawn.
    pub fn tick(&mut self, app: &mut dyn Application, dt: f32, input: InputSnapshot) {
        self.input = input;
        self.debug.clear();
        if input.was_pressed(InputAction::ToggleDebugDraw) {
            let enabled = self.debug.toggle();
            info!(enabled, "debug_draw_toggled");
        }

        app.update(dt, self);

        let mut frame = FrameContext {
            input: &self.input,
            debug: &mut self.debug,
            assets: &mut self.assets,
        };
        self.scenes.update(dt, &mut frame);
    }

    /// Draws the scene, then the application, then debug lines. Returns the
    /// number of batches issued.
    pub fn render_frame(&mut self, app: &mut dyn Application, backend: &mut dyn RenderBackend) -> usize {
        draw_frame(&self.scenes, &mut self.render, &mut self.debug, app, backend)
    }

    /// Rasterizes the frame into `renderer` and presents it.
    pub fn present(
        &mut self,
        app: &mut dyn Application,
        renderer: &mut Renderer,
    ) -> Result<usize, pixels::Error> {
        let Self {
            scenes,
            render,
            debug,
            assets,
            ..
        } = self;
        let viewport = renderer.viewport();
        render.set_viewport(viewport.width, viewport.height);

        let mut batches = 0;
        renderer.render_frame(assets.textures(), |target| {
            batches = draw_frame(scenes, render, debug, app, target);
        })?;
        Ok(batches)
    }
}

fn draw_frame(
    scenes: &SceneManager,
    render: &mut RenderContext,
    debug: &mut DebugDraw,
    app: &mut dyn Application,
    backend: &mut dyn RenderBackend,
) -> usize {
    render.begin();
    scenes.render(render, debug);
    let mut batches = render.end(backend);

    render.begin();
    app.render(render);
    batches += render.end(backend);

    let view_projection = render.projection() * render.view();
    debug.flush(backend, &view_projection);
    batches
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::app::object::{Behavior, BehaviorKind, GameObject, ObjectContext, WorldTransform};
    use crate::app::rendering::backend::recording::RecordingBackend;
    use crate::app::rendering::{Material, TextureHandle};
    use crate::app::scene::{Scene, SceneWorld};
    use crate::math::{Vec3, Vec4};

    const DT: f32 = 1.0 / 60.0;

    struct Square;

    impl Behavior for Square {
        fn kind(&self) -> BehaviorKind {
            BehaviorKind("square")
        }

        fn on_render(&self, _object: &GameObject, world: WorldTransform, ctx: &mut RenderContext) {
            ctx.cursor_mut().position(world.position);
            ctx.submit_sprite(Material::new(TextureHandle::NONE), Vec4::new(1.0, 1.0, 1.0, 1.0));
        }
    }

    struct Marker;

    impl Behavior for Marker {
        fn kind(&self) -> BehaviorKind {
            BehaviorKind("marker")
        }

        fn on_update(&mut self, ctx: &mut ObjectContext<'_, '_>, _dt: f32) {
            let position = ctx.position();
            ctx.debug()
                .line(position, position + Vec3::new(1.0, 0.0, 0.0), Vec4::new(1.0, 1.0, 1.0, 1.0));
        }
    }

    struct Markers;

    impl Scene for Markers {
        fn create(&mut self, world: &mut SceneWorld, _assets: &mut AssetManager) {
            world.add(GameObject::new().with_behavior(Marker));
        }
    }

    struct Squares;

    impl Scene for Squares {
        fn create(&mut self, world: &mut SceneWorld, _assets: &mut AssetManager) {
            world.add(GameObject::new().with_behavior(Square));
            world.add(
                GameObject::new()
                    .with_position(Vec3::new(2.0, 0.0, 0.0))
                    .with_behavior(Square),
            );
        }
    }

    #[derive(Default)]
    struct TestApp {
        updates: u32,
        overlay: bool,
    }

    impl Application for TestApp {
        fn init(&mut self, engine: &mut EngineContext) {
            engine.scenes.register_scene("main", Box::new(Squares));
        }

        fn update(&mut self, _dt: f32, engine: &mut EngineContext) {
            self.updates += 1;
            if engine.input().was_pressed(InputAction::Quit) {
                engine.request_exit();
            }
        }

        fn render(&mut self, ctx: &mut RenderContext) {
            if self.overlay {
                ctx.submit_sprite(Material::new(TextureHandle::NONE), Vec4::new(1.0, 0.0, 0.0, 1.0));
            }
        }
    }

    fn engine(dir: &TempDir) -> EngineContext {
        EngineContext::new(AssetManager::new(dir.path()), PhysicsConfig::default())
    }

    #[test]
    fn ticks_run_app_update_then_scene() {
        let dir = TempDir::new().expect("tempdir");
        let mut engine = engine(&dir);
        let mut app = TestApp::default();
        app.init(&mut engine);

        engine.tick(&mut app, DT, InputSnapshot::empty());
        engine.tick(&mut app, DT, InputSnapshot::empty());

        assert_eq!(app.updates, 2);
        assert_eq!(engine.scenes.world().expect("world").object_count(), 2);
    }

    #[test]
    fn scene_and_app_draw_in_separate_brackets() {
        let dir = TempDir::new().expect("tempdir");
        let mut engine = engine(&dir);
        let mut app = TestApp {
            overlay: true,
            ..TestApp::default()
        };
        let mut backend = RecordingBackend::default();
        app.init(&mut engine);
        engine.tick(&mut app, DT, InputSnapshot::empty());
        engine.tick(&mut app, DT, InputSnapshot::empty());

        let batches = engine.render_frame(&mut app, &mut backend);

        assert_eq!(batches, 2);
        assert_eq!(backend.draws[0].length, 12);
        assert_eq!(backend.draws[1].length, 6);
    }

    #[test]
    fn debug_toggle_follows_press_edges() {
        let dir = TempDir::new().expect("tempdir");
        let mut engine = engine(&dir);
        let mut app = TestApp::default();
        let initial = engine.debug.is_enabled();
        let press = InputSnapshot::empty().with_action_pressed(InputAction::ToggleDebugDraw);
        let held = InputSnapshot::empty().with_action_down(InputAction::ToggleDebugDraw, true);

        engine.tick(&mut app, DT, press);
        assert_eq!(engine.debug.is_enabled(), !initial);
        engine.tick(&mut app, DT, held);
        assert_eq!(engine.debug.is_enabled(), !initial);
    }

    #[test]
    fn debug_lines_from_earlier_ticks_are_not_redrawn() {
        let dir = TempDir::new().expect("tempdir");
        let mut engine = engine(&dir);
        let mut app = TestApp::default();
        let mut backend = RecordingBackend::default();
        engine.debug.set_enabled(true);
        engine.scenes.register_scene("markers", Box::new(Markers));

        for _ in 0..4 {
            engine.tick(&mut app, DT, InputSnapshot::empty());
        }
        engine.render_frame(&mut app, &mut backend);

        assert_eq!(backend.line_vertices, 2);
    }

    #[test]
    fn application_can_request_exit() {
        let dir = TempDir::new().expect("tempdir");
        let mut engine = engine(&dir);
        let mut app = TestApp::default();

        engine.tick(&mut app, DT, InputSnapshot::empty());
        assert!(!engine.exit_requested());
        engine.tick(
            &mut app,
            DT,
            InputSnapshot::empty().with_action_pressed(InputAction::Quit),
        );
        assert!(engine.exit_requested());
    }
}
