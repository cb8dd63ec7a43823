use std::sync::Mutex;

use nalgebra::{Isometry2, Point2, Vector2};
use rapier2d::prelude::{
    ActiveEvents, BroadPhase, CCDSolver, ColliderBuilder, ColliderHandle, ColliderSet,
    CollisionEvent, ContactPair, EventHandler, ImpulseJointSet, IntegrationParameters,
    IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline, QueryFilter, QueryPipeline,
    Ray, Real, RigidBodyBuilder, RigidBodyHandle, RigidBodySet, RigidBodyType,
};
use serde::Deserialize;
use tracing::warn;

use crate::math::{normalize_or_zero, Vec2};

use super::object::ObjectId;

pub const BOX_DENSITY: f32 = 1.0;
pub const BOX_FRICTION: f32 = 0.6;
pub const BOX_RESTITUTION: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhysicsConfig {
    pub gravity: [f32; 2],
    pub velocity_iterations: usize,
    pub position_iterations: usize,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, 0.0],
            velocity_iterations: 10,
            position_iterations: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(RigidBodyHandle);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Static,
    Dynamic,
    Kinematic,
}

impl BodyKind {
    fn body_type(self) -> RigidBodyType {
        match self {
            BodyKind::Static => RigidBodyType::Fixed,
            BodyKind::Dynamic => RigidBodyType::Dynamic,
            BodyKind::Kinematic => RigidBodyType::KinematicPositionBased,
        }
    }
}

/// A contact that started during the last step. Normal and point are in the
/// local frame of the first collider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactEvent {
    pub object_a: ObjectId,
    pub object_b: ObjectId,
    pub normal: Vec2,
    pub point: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub object: ObjectId,
    pub point: Vec2,
    pub normal: Vec2,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColliderOutline {
    Polygon(Vec<Vec2>),
    Circle { center: Vec2, radius: f32 },
}

#[derive(Default)]
struct ContactCollector {
    started: Mutex<Vec<ContactEvent>>,
}

impl ContactCollector {
    fn push(&self, event: ContactEvent) {
        match self.started.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => {
                warn!("contact buffer lock poisoned; recovered inner value");
                poisoned.into_inner().push(event);
            }
        }
    }

    fn drain(&self) -> Vec<ContactEvent> {
        match self.started.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        bodies: &RigidBodySet,
        colliders: &ColliderSet,
        event: CollisionEvent,
        contact_pair: Option<&ContactPair>,
    ) {
        if !event.started() {
            return;
        }

        let (first, second) = contact_pair
            .map(|pair| (pair.collider1, pair.collider2))
            .unwrap_or_else(|| (event.collider1(), event.collider2()));
        let (Some(object_a), Some(object_b)) = (
            collider_object(bodies, colliders, first),
            collider_object(bodies, colliders, second),
        ) else {
            return;
        };

        let (normal, point) = contact_pair
            .and_then(local_contact)
            .unwrap_or((Vec2::zeros(), Vec2::zeros()));
        self.push(ContactEvent {
            object_a,
            object_b,
            normal,
            point,
        });
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

fn collider_object(
    bodies: &RigidBodySet,
    colliders: &ColliderSet,
    handle: ColliderHandle,
) -> Option<ObjectId> {
    let parent = colliders.get(handle)?.parent()?;
    let body = bodies.get(parent)?;
    Some(ObjectId(body.user_data as u64))
}

fn local_contact(pair: &ContactPair) -> Option<(Vec2, Vec2)> {
    pair.manifolds.iter().find_map(|manifold| {
        let contact = manifold.points.first()?;
        Some((
            Vec2::new(manifold.local_n1.x, manifold.local_n1.y),
            Vec2::new(contact.local_p1.x, contact.local_p1.y),
        ))
    })
}

/// Owned rigid-body world. Bodies carry the owning object's id as user data.
pub struct PhysicsWorld {
    gravity: Vector2<Real>,
    integration: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    contacts: ContactCollector,
}

impl PhysicsWorld {
    pub fn new(config: PhysicsConfig) -> Self {
        let mut integration = IntegrationParameters::default();
        integration.max_velocity_iterations = config.velocity_iterations.max(1);
        integration.max_stabilization_iterations = config.position_iterations.max(1);

        Self {
            gravity: Vector2::new(config.gravity[0], config.gravity[1]),
            integration,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            contacts: ContactCollector::default(),
        }
    }

    /// Advances the simulation and returns the contacts that began during
    /// the step. Forces applied before the step are consumed by it.
    pub fn step(&mut self, dt: f32) -> Vec<ContactEvent> {
        if dt <= 0.0 {
            return Vec::new();
        }

        self.integration.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &self.contacts,
        );

        for (_, body) in self.bodies.iter_mut() {
            body.reset_forces(false);
            body.reset_torques(false);
        }

        self.contacts.drain()
    }

    pub fn create_body(
        &mut self,
        object: ObjectId,
        kind: BodyKind,
        position: Vec2,
        rotation: f32,
    ) -> BodyHandle {
        let body = RigidBodyBuilder::new(kind.body_type())
            .translation(position)
            .rotation(rotation)
            .user_data(u128::from(object.0))
            .can_sleep(true)
            .ccd_enabled(kind == BodyKind::Dynamic)
            .build();
        BodyHandle(self.bodies.insert(body))
    }

    pub fn remove_body(&mut self, handle: BodyHandle) {
        self.bodies.remove(
            handle.0,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.bodies.contains(handle.0)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    pub fn body_kind(&self, handle: BodyHandle) -> Option<BodyKind> {
        let body = self.bodies.get(handle.0)?;
        Some(match body.body_type() {
            RigidBodyType::Fixed => BodyKind::Static,
            RigidBodyType::Dynamic => BodyKind::Dynamic,
            _ => BodyKind::Kinematic,
        })
    }

    pub fn set_body_kind(&mut self, handle: BodyHandle, kind: BodyKind) {
        if let Some(body) = self.bodies.get_mut(handle.0) {
            body.set_body_type(kind.body_type(), true);
            body.enable_ccd(kind == BodyKind::Dynamic);
        }
    }

    pub fn body_transform(&self, handle: BodyHandle) -> Option<(Vec2, f32)> {
        let body = self.bodies.get(handle.0)?;
        Some((*body.translation(), body.rotation().angle()))
    }

    pub fn set_body_transform(&mut self, handle: BodyHandle, position: Vec2, rotation: f32) {
        if let Some(body) = self.bodies.get_mut(handle.0) {
            body.set_position(Isometry2::new(position, rotation), true);
        }
    }

    pub fn apply_force(&mut self, handle: BodyHandle, force: Vec2) {
        if let Some(body) = self.bodies.get_mut(handle.0) {
            body.add_force(force, true);
        }
    }

    pub fn apply_torque(&mut self, handle: BodyHandle, torque: f32) {
        if let Some(body) = self.bodies.get_mut(handle.0) {
            body.add_torque(torque, true);
        }
    }

    pub fn linear_velocity(&self, handle: BodyHandle) -> Vec2 {
        self.bodies
            .get(handle.0)
            .map(|body| *body.linvel())
            .unwrap_or_else(Vec2::zeros)
    }

    pub fn angular_velocity(&self, handle: BodyHandle) -> f32 {
        self.bodies
            .get(handle.0)
            .map(|body| body.angvel())
            .unwrap_or(0.0)
    }

    pub fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec2) {
        if let Some(body) = self.bodies.get_mut(handle.0) {
            body.set_linvel(velocity, true);
        }
    }

    /// Rotates a body-local vector into world space.
    pub fn world_vector(&self, handle: BodyHandle, local: Vec2) -> Vec2 {
        self.bodies
            .get(handle.0)
            .map(|body| body.position().rotation * local)
            .unwrap_or_else(Vec2::zeros)
    }

    /// Expresses a world-space point in the body's local frame.
    pub fn local_point(&self, handle: BodyHandle, world: Vec2) -> Vec2 {
        self.bodies
            .get(handle.0)
            .map(|body| {
                body.position()
                    .inverse_transform_point(&Point2::new(world.x, world.y))
                    .coords
            })
            .unwrap_or_else(Vec2::zeros)
    }

    pub fn attach_box(&mut self, handle: BodyHandle, half_width: f32, half_height: f32) {
        if !self.bodies.contains(handle.0) {
            return;
        }
        let collider = ColliderBuilder::cuboid(half_width.abs(), half_height.abs())
            .density(BOX_DENSITY)
            .friction(BOX_FRICTION)
            .restitution(BOX_RESTITUTION)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.colliders
            .insert_with_parent(collider, handle.0, &mut self.bodies);
    }

    pub fn set_sensor(&mut self, handle: BodyHandle, sensor: bool) {
        let Some(body) = self.bodies.get(handle.0) else {
            return;
        };
        for collider_handle in body.colliders().to_vec() {
            if let Some(collider) = self.colliders.get_mut(collider_handle) {
                collider.set_sensor(sensor);
            }
        }
    }

    pub fn is_sensor(&self, handle: BodyHandle) -> bool {
        self.bodies.get(handle.0).is_some_and(|body| {
            body.colliders().iter().any(|collider| {
                self.colliders
                    .get(*collider)
                    .is_some_and(|collider| collider.is_sensor())
            })
        })
    }

    /// Casts from `origin` along `direction` up to `max_distance`. The query
    /// structure reflects the colliders as of the last step.
    pub fn cast_ray(
        &self,
        origin: Vec2,
        direction: Vec2,
        max_distance: f32,
        exclude: Option<BodyHandle>,
    ) -> Option<RayHit> {
        let direction = normalize_or_zero(direction);
        if direction == Vec2::zeros() || max_distance <= 0.0 {
            return None;
        }

        let ray = Ray::new(Point2::new(origin.x, origin.y), direction);
        let mut filter = QueryFilter::default();
        if let Some(handle) = exclude {
            filter = filter.exclude_rigid_body(handle.0);
        }

        let (collider_handle, intersection) = self.query_pipeline.cast_ray_and_get_normal(
            &self.bodies,
            &self.colliders,
            &ray,
            max_distance,
            true,
            filter,
        )?;
        let object = collider_object(&self.bodies, &self.colliders, collider_handle)?;
        Some(RayHit {
            object,
            point: ray.point_at(intersection.toi).coords,
            normal: intersection.normal,
            distance: intersection.toi,
        })
    }

    pub fn collider_outlines(&self) -> Vec<ColliderOutline> {
        self.colliders
            .iter()
            .filter_map(|(_, collider)| {
                let position = collider.position();
                let shape = collider.shape();
                if let Some(cuboid) = shape.as_cuboid() {
                    let half = cuboid.half_extents;
                    let corners = [
                        Point2::new(-half.x, -half.y),
                        Point2::new(half.x, -half.y),
                        Point2::new(half.x, half.y),
                        Point2::new(-half.x, half.y),
                    ];
                    return Some(ColliderOutline::Polygon(
                        corners
                            .iter()
                            .map(|corner| (position * corner).coords)
                            .collect(),
                    ));
                }
                shape.as_ball().map(|ball| ColliderOutline::Circle {
                    center: position.translation.vector,
                    radius: ball.radius,
                })
            })
            .collect()
    }
}
