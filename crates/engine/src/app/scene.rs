use std::collections::HashMap;

use tracing::{info, warn};

use crate::assets::AssetManager;
use crate::math::{Vec3, Vec4};

use super::input::InputSnapshot;
use super::object::{
    Collision, GameObject, ObjectId, ObjectIdAllocator, ObjectServices, Peers, Spawner,
    WorldTransform,
};
use super::physics::{ColliderOutline, PhysicsConfig, PhysicsWorld};
use super::rendering::{DebugDraw, RenderContext};

const COLLIDER_OUTLINE_COLOR: [f32; 4] = [0.3, 1.0, 0.4, 1.0];
const COLLIDER_OUTLINE_Z: f32 = 0.05;

/// Physics world plus the objects living in it. Objects added during a pass
/// wait in a pending queue and join the live set at the next update.
pub struct SceneWorld {
    physics: PhysicsWorld,
    objects: Vec<GameObject>,
    pending: Vec<GameObject>,
    ids: ObjectIdAllocator,
    draw_physics_debug: bool,
}

impl SceneWorld {
    pub fn new(physics_config: PhysicsConfig) -> Self {
        Self {
            physics: PhysicsWorld::new(physics_config),
            objects: Vec::new(),
            pending: Vec::new(),
            ids: ObjectIdAllocator::default(),
            draw_physics_debug: true,
        }
    }

    pub fn add(&mut self, mut object: GameObject) -> ObjectId {
        let id = self.ids.allocate();
        object.assign(id);
        self.pending.push(object);
        id
    }

    pub fn update(&mut self, dt: f32, input: &InputSnapshot, debug: &mut DebugDraw) {
        self.objects.append(&mut self.pending);

        for contact in self.physics.step(dt) {
            let collision = Collision {
                object_a: contact.object_a,
                object_b: contact.object_b,
                normal: contact.normal,
                point: contact.point,
            };
            for participant in [collision.object_a, collision.object_b] {
                let Some(index) = self.index_of(participant) else {
                    continue;
                };
                self.with_object(index, input, debug, |object, services| {
                    object.collide(services, &collision)
                });
            }
        }

        for index in 0..self.objects.len() {
            self.with_object(index, input, debug, |object, services| {
                object.update(services, dt)
            });
        }

        self.objects.retain(|object| !object.is_dead());
    }

    pub fn render(&self, ctx: &mut RenderContext, debug: &mut DebugDraw) {
        for object in &self.objects {
            object.render(&self.objects, ctx);
        }

        if !self.draw_physics_debug || !debug.is_enabled() {
            return;
        }
        let color = Vec4::from(COLLIDER_OUTLINE_COLOR);
        for outline in self.physics.collider_outlines() {
            match outline {
                ColliderOutline::Polygon(points) => {
                    debug.polygon(&points, COLLIDER_OUTLINE_Z, color)
                }
                ColliderOutline::Circle { center, radius } => debug.circle(
                    Vec3::new(center.x, center.y, COLLIDER_OUTLINE_Z),
                    radius,
                    color,
                ),
            }
        }
    }

    /// Drops every object, pending ones included, and their bodies.
    pub fn clear(&mut self) {
        for object in self.objects.drain(..).chain(self.pending.drain(..)) {
            if let Some(body) = object.body() {
                self.physics.remove_body(body);
            }
        }
    }

    pub fn object(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.iter().find(|object| object.id() == id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.iter_mut().find(|object| object.id() == id)
    }

    pub fn objects(&self) -> &[GameObject] {
        &self.objects
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn world_transform(&self, id: ObjectId) -> Option<WorldTransform> {
        self.object(id)
            .map(|object| object.world_transform(&self.objects))
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<&GameObject> {
        self.objects.iter().find(|object| object.tag() == tag)
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.physics
    }

    pub fn set_physics_debug_draw(&mut self, enabled: bool) {
        self.draw_physics_debug = enabled;
    }

    fn index_of(&self, id: ObjectId) -> Option<usize> {
        self.objects.iter().position(|object| object.id() == id)
    }

    fn with_object<F>(&mut self, index: usize, input: &InputSnapshot, debug: &mut DebugDraw, call: F)
    where
        F: FnOnce(&mut GameObject, &mut ObjectServices<'_>),
    {
        let Self {
            physics,
            objects,
            pending,
            ids,
            ..
        } = self;
        let (before, rest) = objects.split_at_mut(index);
        let Some((object, after)) = rest.split_first_mut() else {
            return;
        };
        let mut services = ObjectServices {
            physics,
            peers: Peers::new(before, after),
            input,
            debug,
            spawner: Spawner { ids, pending },
        };
        call(object, &mut services);
    }
}

/// Content of a named scene. `create` runs once per activation against a
/// fresh world.
pub trait Scene {
    fn create(&mut self, world: &mut SceneWorld, assets: &mut AssetManager);

    fn destroy(&mut self, _world: &mut SceneWorld) {}
}

/// Per-tick collaborators handed down to the active scene.
pub struct FrameContext<'a> {
    pub input: &'a InputSnapshot,
    pub debug: &'a mut DebugDraw,
    pub assets: &'a mut AssetManager,
}

/// Named scenes with deferred switching: a requested switch is applied at
/// the start of the next update, which then does nothing else.
pub struct SceneManager {
    scenes: HashMap<String, Box<dyn Scene>>,
    current: Option<String>,
    next: Option<String>,
    world: Option<SceneWorld>,
    switch_pending: bool,
    switched_this_tick: bool,
    physics_config: PhysicsConfig,
}

impl SceneManager {
    pub fn new(physics_config: PhysicsConfig) -> Self {
        Self {
            scenes: HashMap::new(),
            current: None,
            next: None,
            world: None,
            switch_pending: false,
            switched_this_tick: false,
            physics_config,
        }
    }

    /// Returns false, changing nothing, when `name` is taken. The first
    /// registered scene becomes current and is activated on the next update.
    pub fn register_scene(&mut self, name: impl Into<String>, scene: Box<dyn Scene>) -> bool {
        let name = name.into();
        if self.scenes.contains_key(&name) {
            warn!(scene = %name, "scene_already_registered");
            return false;
        }
        self.scenes.insert(name.clone(), scene);
        if self.current.is_none() {
            self.current = Some(name.clone());
            self.next = Some(name);
            self.switch_pending = true;
        }
        true
    }

    pub fn set_scene(&mut self, name: &str) -> bool {
        if !self.scenes.contains_key(name) {
            warn!(scene = name, "scene_switch_unknown_name");
            return false;
        }
        self.next = Some(name.to_string());
        self.switch_pending = true;
        true
    }

    pub fn current_scene(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_switch_pending(&self) -> bool {
        self.switch_pending
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    pub fn world(&self) -> Option<&SceneWorld> {
        self.world.as_ref()
    }

    pub fn world_mut(&mut self) -> Option<&mut SceneWorld> {
        self.world.as_mut()
    }

    pub fn update(&mut self, dt: f32, frame: &mut FrameContext<'_>) {
        self.switched_this_tick = false;
        if self.switch_pending {
            self.apply_switch(frame.assets);
            return;
        }
        if let Some(world) = self.world.as_mut() {
            world.update(dt, frame.input, frame.debug);
        }
    }

    /// Renders the active world. Returns false when rendering is suppressed
    /// because a switch is pending or was applied this tick.
    pub fn render(&self, ctx: &mut RenderContext, debug: &mut DebugDraw) -> bool {
        if self.switch_pending || self.switched_this_tick {
            return false;
        }
        let Some(world) = self.world.as_ref() else {
            return false;
        };
        world.render(ctx, debug);
        true
    }

    pub fn shutdown(&mut self) {
        self.deactivate_current();
        self.switch_pending = false;
    }

    fn apply_switch(&mut self, assets: &mut AssetManager) {
        self.switch_pending = false;
        self.switched_this_tick = true;
        let Some(next) = self.next.take() else {
            return;
        };

        self.deactivate_current();

        let mut world = SceneWorld::new(self.physics_config);
        if let Some(scene) = self.scenes.get_mut(&next) {
            scene.create(&mut world, assets);
        }
        info!(
            scene = %next,
            pending_objects = world.pending_count(),
            "scene_activated"
        );
        self.world = Some(world);
        self.current = Some(next);
    }

    fn deactivate_current(&mut self) {
        let Some(mut world) = self.world.take() else {
            return;
        };
        if let Some(scene) = self
            .current
            .as_ref()
            .and_then(|name| self.scenes.get_mut(name))
        {
            scene.destroy(&mut world);
        }
        world.clear();
        info!(scene = ?self.current, "scene_deactivated");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use tempfile::TempDir;

    use super::*;
    use crate::app::object::{Behavior, BehaviorKind, ObjectContext};
    use crate::app::physics::BodyKind;
    use crate::app::rendering::{Material, TextureHandle};

    const DT: f32 = 1.0 / 60.0;

    #[derive(Default)]
    struct Calls {
        created: Cell<u32>,
        updated: Cell<u32>,
        destroyed: Cell<u32>,
        collided: Cell<u32>,
        rendered: Cell<u32>,
    }

    struct Tracker {
        calls: Rc<Calls>,
        solid: bool,
    }

    impl Tracker {
        fn new(calls: &Rc<Calls>) -> Self {
            Self {
                calls: Rc::clone(calls),
                solid: false,
            }
        }

        fn solid(calls: &Rc<Calls>) -> Self {
            Self {
                calls: Rc::clone(calls),
                solid: true,
            }
        }
    }

    impl Behavior for Tracker {
        fn kind(&self) -> BehaviorKind {
            BehaviorKind("tracker")
        }

        fn on_create(&mut self, ctx: &mut ObjectContext<'_, '_>) {
            self.calls.created.set(self.calls.created.get() + 1);
            if self.solid {
                ctx.set_body_kind(BodyKind::Dynamic);
                ctx.set_box_shape(0.5, 0.5);
            }
        }

        fn on_update(&mut self, _ctx: &mut ObjectContext<'_, '_>, _dt: f32) {
            self.calls.updated.set(self.calls.updated.get() + 1);
        }

        fn on_destroy(&mut self, _ctx: &mut ObjectContext<'_, '_>) {
            self.calls.destroyed.set(self.calls.destroyed.get() + 1);
        }

        fn on_collide(&mut self, _ctx: &mut ObjectContext<'_, '_>, _collision: &Collision) {
            self.calls.collided.set(self.calls.collided.get() + 1);
        }

        fn on_render(&self, _object: &GameObject, _world: WorldTransform, ctx: &mut RenderContext) {
            self.calls.rendered.set(self.calls.rendered.get() + 1);
            ctx.submit_sprite(Material::new(TextureHandle::NONE), Vec4::new(1.0, 1.0, 1.0, 1.0));
        }
    }

    struct Spawning;

    impl Behavior for Spawning {
        fn kind(&self) -> BehaviorKind {
            BehaviorKind("spawning")
        }

        fn on_create(&mut self, ctx: &mut ObjectContext<'_, '_>) {
            ctx.spawn(GameObject::new().with_tag("child"));
        }
    }

    struct Fixture {
        input: InputSnapshot,
        debug: DebugDraw,
        _dir: TempDir,
        assets: AssetManager,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().expect("tempdir");
            let assets = AssetManager::new(dir.path());
            Self {
                input: InputSnapshot::empty(),
                debug: DebugDraw::new(true),
                _dir: dir,
                assets,
            }
        }

        fn frame(&mut self) -> FrameContext<'_> {
            FrameContext {
                input: &self.input,
                debug: &mut self.debug,
                assets: &mut self.assets,
            }
        }
    }

    struct CountingScene {
        creates: Rc<Cell<u32>>,
        destroys: Rc<Cell<u32>>,
        objects: usize,
    }

    impl Scene for CountingScene {
        fn create(&mut self, world: &mut SceneWorld, _assets: &mut AssetManager) {
            self.creates.set(self.creates.get() + 1);
            for _ in 0..self.objects {
                world.add(GameObject::new());
            }
        }

        fn destroy(&mut self, _world: &mut SceneWorld) {
            self.destroys.set(self.destroys.get() + 1);
        }
    }

    fn counting_scene(objects: usize) -> (Box<dyn Scene>, Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let creates = Rc::new(Cell::new(0));
        let destroys = Rc::new(Cell::new(0));
        let scene = CountingScene {
            creates: Rc::clone(&creates),
            destroys: Rc::clone(&destroys),
            objects,
        };
        (Box::new(scene), creates, destroys)
    }

    #[test]
    fn added_objects_join_on_next_update() {
        let mut world = SceneWorld::new(PhysicsConfig::default());
        let mut debug = DebugDraw::new(false);
        let calls = Rc::new(Calls::default());
        let id = world.add(GameObject::new().with_behavior(Tracker::new(&calls)));

        assert_eq!(world.object_count(), 0);
        assert_eq!(world.pending_count(), 1);
        let mut ctx = RenderContext::new();
        world.render(&mut ctx, &mut debug);
        assert_eq!(calls.rendered.get(), 0);

        world.update(DT, &InputSnapshot::empty(), &mut debug);
        assert_eq!(world.object_count(), 1);
        assert!(world.object(id).is_some());
        assert_eq!(calls.updated.get(), 1);
    }

    #[test]
    fn on_create_fires_once_before_first_update() {
        let mut world = SceneWorld::new(PhysicsConfig::default());
        let mut debug = DebugDraw::new(false);
        let calls = Rc::new(Calls::default());
        world.add(GameObject::new().with_behavior(Tracker::new(&calls)));

        for _ in 0..3 {
            world.update(DT, &InputSnapshot::empty(), &mut debug);
        }

        assert_eq!(calls.created.get(), 1);
        assert_eq!(calls.updated.get(), 3);
    }

    #[test]
    fn finite_life_destroys_once_and_removes_object() {
        let mut world = SceneWorld::new(PhysicsConfig::default());
        let mut debug = DebugDraw::new(false);
        let calls = Rc::new(Calls::default());
        let id = world.add(GameObject::new().with_behavior(Tracker::new(&calls)));
        world.update(DT, &InputSnapshot::empty(), &mut debug);
        world.object_mut(id).expect("object").kill(DT * 1.5);

        world.update(DT, &InputSnapshot::empty(), &mut debug);
        assert!(world.object(id).is_some());
        world.update(DT, &InputSnapshot::empty(), &mut debug);

        assert!(world.object(id).is_none());
        assert_eq!(calls.destroyed.get(), 1);
        assert_eq!(calls.updated.get(), 2);
        assert_eq!(world.physics().body_count(), 0);

        world.update(DT, &InputSnapshot::empty(), &mut debug);
        assert_eq!(calls.destroyed.get(), 1);
    }

    #[test]
    fn collisions_reach_behaviors_of_both_objects() {
        let mut world = SceneWorld::new(PhysicsConfig::default());
        let mut debug = DebugDraw::new(false);
        let left = Rc::new(Calls::default());
        let right = Rc::new(Calls::default());
        world.add(GameObject::new().with_behavior(Tracker::solid(&left)));
        world.add(
            GameObject::new()
                .with_position(Vec3::new(0.5, 0.0, 0.0))
                .with_behavior(Tracker::solid(&right)),
        );

        for _ in 0..4 {
            world.update(DT, &InputSnapshot::empty(), &mut debug);
        }

        assert!(left.collided.get() >= 1);
        assert_eq!(left.collided.get(), right.collided.get());
    }

    #[test]
    fn objects_spawned_by_behaviors_wait_for_next_update() {
        let mut world = SceneWorld::new(PhysicsConfig::default());
        let mut debug = DebugDraw::new(false);
        world.add(GameObject::new().with_behavior(Spawning));

        world.update(DT, &InputSnapshot::empty(), &mut debug);
        assert_eq!(world.object_count(), 1);
        assert_eq!(world.pending_count(), 1);

        world.update(DT, &InputSnapshot::empty(), &mut debug);
        assert!(world.find_by_tag("child").is_some());
    }

    #[test]
    fn physics_outlines_are_drawn_only_when_debug_is_enabled() {
        let mut world = SceneWorld::new(PhysicsConfig::default());
        let mut debug = DebugDraw::new(false);
        let calls = Rc::new(Calls::default());
        world.add(GameObject::new().with_behavior(Tracker::solid(&calls)));
        world.update(DT, &InputSnapshot::empty(), &mut debug);
        let mut ctx = RenderContext::new();

        world.render(&mut ctx, &mut debug);
        assert!(debug.lines().is_empty());

        debug.set_enabled(true);
        world.render(&mut ctx, &mut debug);
        assert_eq!(debug.lines().len(), 8);

        world.set_physics_debug_draw(false);
        debug.set_enabled(false);
        debug.set_enabled(true);
        world.render(&mut ctx, &mut debug);
        assert!(debug.lines().is_empty());
    }

    #[test]
    fn first_registered_scene_is_current_and_activates_next_update() {
        let mut fixture = Fixture::new();
        let mut manager = SceneManager::new(PhysicsConfig::default());
        let (scene, creates, _) = counting_scene(2);

        assert!(manager.register_scene("main", scene));
        assert_eq!(manager.current_scene(), Some("main"));
        assert!(manager.is_switch_pending());
        assert!(manager.world().is_none());

        manager.update(DT, &mut fixture.frame());

        assert_eq!(creates.get(), 1);
        let world = manager.world().expect("world");
        assert_eq!(world.object_count(), 0);
        assert_eq!(world.pending_count(), 2);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut manager = SceneManager::new(PhysicsConfig::default());
        let (first, _, _) = counting_scene(0);
        let (second, _, _) = counting_scene(0);

        assert!(manager.register_scene("main", first));
        assert!(!manager.register_scene("main", second));
        assert_eq!(manager.scene_count(), 1);
    }

    #[test]
    fn unknown_scene_name_leaves_current_unchanged() {
        let mut fixture = Fixture::new();
        let mut manager = SceneManager::new(PhysicsConfig::default());
        let (scene, _, _) = counting_scene(0);
        manager.register_scene("main", scene);
        manager.update(DT, &mut fixture.frame());

        assert!(!manager.set_scene("missing"));
        assert_eq!(manager.current_scene(), Some("main"));
        assert!(!manager.is_switch_pending());
    }

    #[test]
    fn render_is_suppressed_on_the_switch_tick() {
        let mut fixture = Fixture::new();
        let mut manager = SceneManager::new(PhysicsConfig::default());
        let (main, _, main_destroys) = counting_scene(1);
        let (other, other_creates, _) = counting_scene(3);
        manager.register_scene("main", main);
        manager.register_scene("other", other);
        let mut ctx = RenderContext::new();

        assert!(!manager.render(&mut ctx, &mut fixture.debug));
        manager.update(DT, &mut fixture.frame());
        assert!(!manager.render(&mut ctx, &mut fixture.debug));
        manager.update(DT, &mut fixture.frame());
        assert!(manager.render(&mut ctx, &mut fixture.debug));

        assert!(manager.set_scene("other"));
        assert!(!manager.render(&mut ctx, &mut fixture.debug));
        assert_eq!(manager.current_scene(), Some("main"));

        manager.update(DT, &mut fixture.frame());
        assert_eq!(manager.current_scene(), Some("other"));
        assert_eq!(main_destroys.get(), 1);
        assert_eq!(other_creates.get(), 1);
        assert!(!manager.render(&mut ctx, &mut fixture.debug));

        manager.update(DT, &mut fixture.frame());
        assert!(manager.render(&mut ctx, &mut fixture.debug));
        assert_eq!(manager.world().expect("world").object_count(), 3);
    }

    #[test]
    fn switching_to_the_same_scene_rebuilds_its_world() {
        let mut fixture = Fixture::new();
        let mut manager = SceneManager::new(PhysicsConfig::default());
        let (scene, creates, destroys) = counting_scene(1);
        manager.register_scene("main", scene);
        manager.update(DT, &mut fixture.frame());
        manager.update(DT, &mut fixture.frame());

        assert!(manager.set_scene("main"));
        manager.update(DT, &mut fixture.frame());

        assert_eq!(creates.get(), 2);
        assert_eq!(destroys.get(), 1);
        let world = manager.world().expect("world");
        assert_eq!(world.object_count() + world.pending_count(), 1);
    }

    #[test]
    fn shutdown_releases_the_active_world() {
        let mut fixture = Fixture::new();
        let mut manager = SceneManager::new(PhysicsConfig::default());
        let (scene, _, destroys) = counting_scene(1);
        manager.register_scene("main", scene);
        manager.update(DT, &mut fixture.frame());

        manager.shutdown();

        assert!(manager.world().is_none());
        assert_eq!(destroys.get(), 1);
    }
}
