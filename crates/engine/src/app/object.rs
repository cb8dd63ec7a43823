use std::fmt;
use std::mem;

use tracing::debug;

use crate::math::{normalize_or_zero, rotate_vec2, Vec2, Vec3};

use super::input::InputSnapshot;
use super::physics::{BodyHandle, BodyKind, PhysicsWorld, RayHit};
use super::rendering::{DebugDraw, RenderContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Id carried by objects that have not been added to a scene yet.
    pub const UNASSIGNED: ObjectId = ObjectId(u64::MAX);
}

#[derive(Debug, Default)]
pub struct ObjectIdAllocator {
    next: u64,
}

impl ObjectIdAllocator {
    pub fn allocate(&mut self) -> ObjectId {
        let id = ObjectId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Registry key for a behavior type. Objects are queried by kind, never by
/// concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BehaviorKind(pub &'static str);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InfoValue {
    Scalar(f32),
    Count(u32),
    Vector(Vec2),
    Object(ObjectId),
    Label(&'static str),
}

impl From<f32> for InfoValue {
    fn from(value: f32) -> Self {
        Self::Scalar(value)
    }
}

impl From<u32> for InfoValue {
    fn from(value: u32) -> Self {
        Self::Count(value)
    }
}

impl From<Vec2> for InfoValue {
    fn from(value: Vec2) -> Self {
        Self::Vector(value)
    }
}

impl From<ObjectId> for InfoValue {
    fn from(value: ObjectId) -> Self {
        Self::Object(value)
    }
}

impl From<&'static str> for InfoValue {
    fn from(value: &'static str) -> Self {
        Self::Label(value)
    }
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(value) => write!(f, "{value:.3}"),
            Self::Count(value) => write!(f, "{value}"),
            Self::Vector(value) => write!(f, "({:.3}, {:.3})", value.x, value.y),
            Self::Object(id) => write!(f, "#{}", id.0),
            Self::Label(label) => f.write_str(label),
        }
    }
}

/// Named values a behavior reports about itself, read by game code and
/// tooling through the owning object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BehaviorInfo {
    entries: Vec<(&'static str, InfoValue)>,
}

impl BehaviorInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces `name`.
    pub fn with(mut self, name: &'static str, value: impl Into<InfoValue>) -> Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<InfoValue> {
        self.entries
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }

    pub fn scalar(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            InfoValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn count(&self, name: &str) -> Option<u32> {
        match self.get(name)? {
            InfoValue::Count(value) => Some(value),
            _ => None,
        }
    }

    pub fn vector(&self, name: &str) -> Option<Vec2> {
        match self.get(name)? {
            InfoValue::Vector(value) => Some(value),
            _ => None,
        }
    }

    pub fn object(&self, name: &str) -> Option<ObjectId> {
        match self.get(name)? {
            InfoValue::Object(id) => Some(id),
            _ => None,
        }
    }

    pub fn label(&self, name: &str) -> Option<&'static str> {
        match self.get(name)? {
            InfoValue::Label(label) => Some(label),
            _ => None,
        }
    }

    pub fn entries(&self) -> &[(&'static str, InfoValue)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for BehaviorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (name, value)) in self.entries.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collision {
    pub object_a: ObjectId,
    pub object_b: ObjectId,
    pub normal: Vec2,
    pub point: Vec2,
}

impl Collision {
    /// The participant that is not `me`.
    pub fn other(&self, me: ObjectId) -> ObjectId {
        if self.object_a == me {
            self.object_b
        } else {
            self.object_a
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldTransform {
    pub position: Vec3,
    pub rotation: f32,
}

impl WorldTransform {
    pub fn forward(&self) -> Vec2 {
        let (sin, cos) = self.rotation.sin_cos();
        Vec2::new(cos, sin)
    }

    pub fn right(&self) -> Vec2 {
        let forward = self.forward();
        Vec2::new(-forward.y, forward.x)
    }
}

/// Script attached to a [`GameObject`]. `on_create` runs on the object's
/// first update, never at attach time.
pub trait Behavior: 'static {
    fn kind(&self) -> BehaviorKind;

    fn info(&self) -> BehaviorInfo {
        BehaviorInfo::default()
    }

    fn on_create(&mut self, _ctx: &mut ObjectContext<'_, '_>) {}

    fn on_destroy(&mut self, _ctx: &mut ObjectContext<'_, '_>) {}

    fn on_update(&mut self, _ctx: &mut ObjectContext<'_, '_>, _dt: f32) {}

    fn on_collide(&mut self, _ctx: &mut ObjectContext<'_, '_>, _collision: &Collision) {}

    fn on_render(&self, _object: &GameObject, _world: WorldTransform, _ctx: &mut RenderContext) {}
}

pub trait ObjectLookup {
    fn find(&self, id: ObjectId) -> Option<&GameObject>;
}

fn find_in(objects: &[GameObject], id: ObjectId) -> Option<&GameObject> {
    objects.iter().find(|object| object.id == id)
}

impl ObjectLookup for Vec<GameObject> {
    fn find(&self, id: ObjectId) -> Option<&GameObject> {
        find_in(self, id)
    }
}

/// Every live object except the one currently being updated.
#[derive(Clone, Copy)]
pub struct Peers<'a> {
    before: &'a [GameObject],
    after: &'a [GameObject],
}

impl<'a> Peers<'a> {
    pub(crate) fn new(before: &'a [GameObject], after: &'a [GameObject]) -> Self {
        Self { before, after }
    }
}

impl ObjectLookup for Peers<'_> {
    fn find(&self, id: ObjectId) -> Option<&GameObject> {
        find_in(self.before, id).or_else(|| find_in(self.after, id))
    }
}

pub(crate) struct Spawner<'a> {
    pub(crate) ids: &'a mut ObjectIdAllocator,
    pub(crate) pending: &'a mut Vec<GameObject>,
}

impl Spawner<'_> {
    pub(crate) fn spawn(&mut self, mut object: GameObject) -> ObjectId {
        let id = self.ids.allocate();
        object.assign(id);
        self.pending.push(object);
        id
    }
}

pub(crate) struct ObjectServices<'s> {
    pub(crate) physics: &'s mut PhysicsWorld,
    pub(crate) peers: Peers<'s>,
    pub(crate) input: &'s InputSnapshot,
    pub(crate) debug: &'s mut DebugDraw,
    pub(crate) spawner: Spawner<'s>,
}

/// What a behavior sees of its owner and the scene during a callback.
pub struct ObjectContext<'a, 's> {
    object: &'a mut GameObject,
    services: &'a mut ObjectServices<'s>,
}

impl ObjectContext<'_, '_> {
    pub fn id(&self) -> ObjectId {
        self.object.id
    }

    pub fn object(&self) -> &GameObject {
        self.object
    }

    pub fn tag(&self) -> &str {
        &self.object.tag
    }

    pub fn position(&self) -> Vec3 {
        self.object.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.object.set_position(self.services.physics, position);
    }

    pub fn rotation(&self) -> f32 {
        self.object.rotation
    }

    pub fn set_rotation(&mut self, rotation: f32) {
        self.object.set_rotation(self.services.physics, rotation);
    }

    pub fn scale(&self) -> Vec2 {
        self.object.scale
    }

    /// World transform of the owner. Parents are resolved among the other
    /// live objects.
    pub fn world_transform(&self) -> WorldTransform {
        self.object.world_transform(&self.services.peers)
    }

    pub fn forward(&self) -> Vec2 {
        self.world_transform().forward()
    }

    pub fn right(&self) -> Vec2 {
        self.world_transform().right()
    }

    pub fn body(&self) -> Option<BodyHandle> {
        self.object.body
    }

    pub fn set_body_kind(&mut self, kind: BodyKind) {
        if let Some(body) = self.object.body {
            self.services.physics.set_body_kind(body, kind);
        }
    }

    /// Attaches a box collider. Extents are half sizes, scaled by the
    /// owner's scale.
    pub fn set_box_shape(&mut self, half_width: f32, half_height: f32) {
        if let Some(body) = self.object.body {
            let scale = self.object.scale;
            self.services
                .physics
                .attach_box(body, half_width * scale.x, half_height * scale.y);
        }
    }

    pub fn set_sensor(&mut self, sensor: bool) {
        if let Some(body) = self.object.body {
            self.services.physics.set_sensor(body, sensor);
        }
    }

    pub fn apply_force(&mut self, force: Vec2) {
        if let Some(body) = self.object.body {
            self.services.physics.apply_force(body, force);
        }
    }

    pub fn apply_torque(&mut self, torque: f32) {
        if let Some(body) = self.object.body {
            self.services.physics.apply_torque(body, torque);
        }
    }

    pub fn linear_velocity(&self) -> Vec2 {
        self.object
            .body
            .map(|body| self.services.physics.linear_velocity(body))
            .unwrap_or_else(Vec2::zeros)
    }

    pub fn angular_velocity(&self) -> f32 {
        self.object
            .body
            .map(|body| self.services.physics.angular_velocity(body))
            .unwrap_or(0.0)
    }

    pub fn relative_vector(&self, local: Vec2) -> Vec2 {
        self.object
            .body
            .map(|body| self.services.physics.world_vector(body, local))
            .unwrap_or_else(Vec2::zeros)
    }

    pub fn local_point(&self, world: Vec2) -> Vec2 {
        self.object
            .body
            .map(|body| self.services.physics.local_point(body, world))
            .unwrap_or_else(Vec2::zeros)
    }

    /// Casts from the owner's world position toward `to`, at most `distance`
    /// long. The owner's own body is ignored.
    pub fn ray_cast(&self, to: Vec2, distance: f32) -> Option<RayHit> {
        let body = self.object.body?;
        let origin = self.world_transform().position.xy();
        let direction = normalize_or_zero(to - origin);
        self.services
            .physics
            .cast_ray(origin, direction, distance, Some(body))
    }

    /// Starts the owner's countdown to destruction.
    pub fn kill(&mut self, life: f32) {
        self.object.kill(life);
    }

    pub fn input(&self) -> &InputSnapshot {
        self.services.input
    }

    pub fn debug(&mut self) -> &mut DebugDraw {
        &mut *self.services.debug
    }

    pub fn find(&self, id: ObjectId) -> Option<&GameObject> {
        self.services.peers.find(id)
    }

    pub fn world_transform_of(&self, id: ObjectId) -> Option<WorldTransform> {
        let peers = self.services.peers;
        peers.find(id).map(|object| object.world_transform(&peers))
    }

    pub fn linear_velocity_of(&self, id: ObjectId) -> Vec2 {
        self.find(id)
            .and_then(GameObject::body)
            .map(|body| self.services.physics.linear_velocity(body))
            .unwrap_or_else(Vec2::zeros)
    }

    /// Queues an object for the owning scene. It joins the live set on the
    /// next update.
    pub fn spawn(&mut self, object: GameObject) -> ObjectId {
        self.services.spawner.spawn(object)
    }
}

pub struct GameObject {
    id: ObjectId,
    position: Vec3,
    rotation: f32,
    scale: Vec2,
    behaviors: Vec<Box<dyn Behavior>>,
    body: Option<BodyHandle>,
    parent: Option<ObjectId>,
    life: Option<f32>,
    tag: String,
    dead: bool,
    first_frame: bool,
}

impl Default for GameObject {
    fn default() -> Self {
        Self {
            id: ObjectId::UNASSIGNED,
            position: Vec3::zeros(),
            rotation: 0.0,
            scale: Vec2::new(1.0, 1.0),
            behaviors: Vec::new(),
            body: None,
            parent: None,
            life: None,
            tag: String::new(),
            dead: false,
            first_frame: true,
        }
    }
}

impl std::fmt::Debug for GameObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameObject")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("position", &self.position)
            .field("rotation", &self.rotation)
            .field("behaviors", &self.behaviors.len())
            .field("body", &self.body)
            .field("dead", &self.dead)
            .finish()
    }
}

impl GameObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_parent(mut self, parent: ObjectId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_behavior(mut self, behavior: impl Behavior) -> Self {
        self.add_behavior(behavior);
        self
    }

    pub fn add_behavior(&mut self, behavior: impl Behavior) {
        self.behaviors.push(Box::new(behavior));
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub fn set_parent(&mut self, parent: Option<ObjectId>) {
        self.parent = parent;
    }

    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }

    pub fn life(&self) -> Option<f32> {
        self.life
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn behavior_count(&self) -> usize {
        self.behaviors.len()
    }

    /// First attached behavior of `kind`.
    pub fn behavior(&self, kind: BehaviorKind) -> Option<&dyn Behavior> {
        self.behaviors
            .iter()
            .find(|behavior| behavior.kind() == kind)
            .map(|behavior| &**behavior)
    }

    pub fn has_behavior(&self, kind: BehaviorKind) -> bool {
        self.behavior(kind).is_some()
    }

    pub fn behavior_info(&self, kind: BehaviorKind) -> Option<BehaviorInfo> {
        self.behavior(kind).map(|behavior| behavior.info())
    }

    /// Sets the local position, moving the body with it when one exists.
    pub fn set_position(&mut self, physics: &mut PhysicsWorld, position: Vec3) {
        self.position = position;
        if let Some(body) = self.body {
            physics.set_body_transform(body, position.xy(), self.rotation);
        }
    }

    pub fn set_rotation(&mut self, physics: &mut PhysicsWorld, rotation: f32) {
        self.rotation = rotation;
        if let Some(body) = self.body {
            physics.set_body_transform(body, self.position.xy(), rotation);
        }
    }

    /// Gives the object `life` more seconds before it is destroyed.
    pub fn kill(&mut self, life: f32) {
        self.life = Some(life.max(0.0));
    }

    /// Walks the parent chain. The chain must be acyclic.
    pub fn world_transform(&self, lookup: &dyn ObjectLookup) -> WorldTransform {
        let local = WorldTransform {
            position: self.position,
            rotation: self.rotation,
        };
        let Some(parent) = self.parent.and_then(|id| lookup.find(id)) else {
            return local;
        };

        let parent_world = parent.world_transform(lookup);
        let rotated = rotate_vec2(self.position.xy(), parent_world.rotation);
        WorldTransform {
            position: Vec3::new(rotated.x, rotated.y, self.position.z) + parent_world.position,
            rotation: self.rotation + parent_world.rotation,
        }
    }

    pub(crate) fn assign(&mut self, id: ObjectId) {
        self.id = id;
    }

    pub fn is_first_frame(&self) -> bool {
        self.first_frame
    }

    pub(crate) fn update(&mut self, services: &mut ObjectServices<'_>, dt: f32) {
        if self.dead {
            return;
        }

        if let Some(life) = self.life.as_mut() {
            *life -= dt;
            if *life <= 0.0 {
                self.destroy(services);
                return;
            }
        }

        if self.first_frame && self.body.is_none() {
            let body = services.physics.create_body(
                self.id,
                BodyKind::Static,
                self.position.xy(),
                self.rotation,
            );
            self.body = Some(body);
        }

        if let Some((position, rotation)) = self
            .body
            .and_then(|body| services.physics.body_transform(body))
        {
            self.position.x = position.x;
            self.position.y = position.y;
            self.rotation = rotation;
        }

        let first_frame = self.first_frame;
        self.with_behaviors(services, |behavior, ctx| {
            if first_frame {
                behavior.on_create(ctx);
            }
            behavior.on_update(ctx, dt);
        });
        self.first_frame = false;
    }

    pub(crate) fn collide(&mut self, services: &mut ObjectServices<'_>, collision: &Collision) {
        if self.dead {
            return;
        }
        self.with_behaviors(services, |behavior, ctx| behavior.on_collide(ctx, collision));
    }

    pub(crate) fn render(&self, lookup: &dyn ObjectLookup, ctx: &mut RenderContext) {
        if self.dead {
            return;
        }
        let world = self.world_transform(lookup);
        for behavior in &self.behaviors {
            behavior.on_render(self, world, ctx);
        }
    }

    fn destroy(&mut self, services: &mut ObjectServices<'_>) {
        self.with_behaviors(services, |behavior, ctx| behavior.on_destroy(ctx));
        if let Some(body) = self.body.take() {
            services.physics.remove_body(body);
        }
        self.dead = true;
        debug!(object = self.id.0, tag = %self.tag, "object_destroyed");
    }

    fn with_behaviors<F>(&mut self, services: &mut ObjectServices<'_>, mut call: F)
    where
        F: FnMut(&mut Box<dyn Behavior>, &mut ObjectContext<'_, '_>),
    {
        let mut behaviors = mem::take(&mut self.behaviors);
        {
            let mut ctx = ObjectContext {
                object: self,
                services,
            };
            for behavior in &mut behaviors {
                call(behavior, &mut ctx);
            }
        }
        behaviors.append(&mut self.behaviors);
        self.behaviors = behaviors;
    }
}
