use std::f32::consts::FRAC_PI_2;
use std::rc::Rc;

use engine::math::normalize_or_zero;
use engine::{
    Behavior, BehaviorInfo, BehaviorKind, BodyKind, GameObject, InputAction, InputSnapshot,
    Material, ObjectContext, RenderContext, Spline, Vec2, Vec3, Vec4, WorldTransform,
};
use rand::Rng;
use tracing::debug;

/// Progress along the track only advances while the car is this close to
/// its guide point.
pub(crate) const GUIDE_MAX_DIST: f32 = 2.0;
pub(crate) const MAX_GUIDE_OFFSET: f32 = 1.5;
pub(crate) const CAR_HALF_EXTENTS: (f32, f32) = (0.5, 0.25);

const MIN_BRAKING_SPEED: f32 = 0.0005;
const STEERING_SPEED_SCALE: f32 = 5.0;
const DRIFT_CORRECTION: f32 = 10.0;
const STEERING_DECAY: f32 = 0.2;
const BRAKING_DECAY: f32 = 0.5;

const PLAYER_ACCELERATION: f32 = 100.0;
const PLAYER_REVERSE: f32 = -60.0;
const PLAYER_BRAKING: f32 = 140.0;
const STEERING_LOCK: f32 = 2.0;
const AI_ACCELERATION: f32 = 40.0;
const AI_BRAKING: f32 = 30.0;
const AI_BRAKE_DISTANCE: f32 = 5.0;

const SPLINE_DEBUG_STEPS: u32 = 4;
const TRACK_COLOR: Vec4 = Vec4::new(1.0, 1.0, 1.0, 1.0);
const CONTROL_POINT_COLOR: Vec4 = Vec4::new(1.0, 1.0, 0.0, 1.0);
const GUIDE_COLOR: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);
const HEADING_COLOR: Vec4 = Vec4::new(0.0, 0.0, 1.0, 1.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CarDriver {
    Player,
    Ai,
}

impl CarDriver {
    pub(crate) fn label(self) -> &'static str {
        match self {
            CarDriver::Player => "player",
            CarDriver::Ai => "ai",
        }
    }
}

/// Arcade car handling. The driver sets throttle, steering and brake each
/// tick; forces turn them into motion and the commands then decay.
#[derive(Debug)]
pub(crate) struct CarBehavior {
    driver: CarDriver,
    acceleration: f32,
    steering: f32,
    braking: f32,
    waypoints: Rc<[Spline]>,
    guide: Vec2,
    track_progress: f32,
    laps: u32,
    waypoint_side: f32,
    offset: f32,
}

impl CarBehavior {
    pub(crate) const KIND: BehaviorKind = BehaviorKind("car");

    pub(crate) fn new(driver: CarDriver, waypoints: Rc<[Spline]>, offset: f32) -> Self {
        Self {
            driver,
            acceleration: 0.0,
            steering: 0.0,
            braking: 0.0,
            waypoints,
            guide: Vec2::zeros(),
            track_progress: 0.0,
            laps: 0,
            waypoint_side: 0.0,
            offset: offset.clamp(-MAX_GUIDE_OFFSET, MAX_GUIDE_OFFSET),
        }
    }

    pub(crate) fn with_random_offset(
        driver: CarDriver,
        waypoints: Rc<[Spline]>,
        rng: &mut impl Rng,
    ) -> Self {
        let offset = rng.gen_range(-MAX_GUIDE_OFFSET..=MAX_GUIDE_OFFSET);
        Self::new(driver, waypoints, offset)
    }

    fn read_player_input(&mut self, input: &InputSnapshot) {
        if input.is_down(InputAction::Accelerate) {
            self.acceleration = PLAYER_ACCELERATION;
        } else if input.is_down(InputAction::Reverse) {
            self.acceleration = PLAYER_REVERSE;
        }

        if input.is_down(InputAction::SteerLeft) {
            self.steering = STEERING_LOCK;
        } else if input.is_down(InputAction::SteerRight) {
            self.steering = -STEERING_LOCK;
        }

        if input.is_down(InputAction::Brake) {
            self.braking = PLAYER_BRAKING;
        }
    }

    /// Steers toward the side the guide was on last tick.
    fn plan_ai(&mut self, position: Vec2) {
        if self.waypoint_side < 0.0 {
            self.steering = -STEERING_LOCK;
        } else if self.waypoint_side > 0.0 {
            self.steering = STEERING_LOCK;
        }

        if !self.waypoints.is_empty() {
            self.acceleration = AI_ACCELERATION;
            if (self.guide - position).norm() <= AI_BRAKE_DISTANCE {
                self.braking = AI_BRAKING;
            }
        }
    }

    fn drive(&mut self, ctx: &mut ObjectContext<'_, '_>, dt: f32) {
        let velocity = ctx.linear_velocity();
        let speed = velocity.norm();
        let forward = ctx.forward();

        ctx.apply_force(forward * self.acceleration * dt);
        if speed > MIN_BRAKING_SPEED {
            ctx.apply_force(-(velocity / speed) * self.braking * dt);
        }

        // Steering sets the rotation directly instead of applying torque.
        let heading = velocity.dot(&ctx.relative_vector(Vec2::new(1.0, 0.0)));
        let turn = self.steering * (speed / STEERING_SPEED_SCALE) * dt;
        let rotation = ctx.rotation();
        ctx.set_rotation(if heading >= 0.0 {
            rotation + turn
        } else {
            rotation - turn
        });

        let side = if ctx.angular_velocity() > 0.0 {
            Vec2::new(0.0, -1.0)
        } else {
            Vec2::new(0.0, 1.0)
        };
        let drift = velocity.dot(&ctx.relative_vector(side));
        let correction = ctx.relative_vector(-side * drift * DRIFT_CORRECTION);
        ctx.apply_force(correction);

        if !self.waypoints.is_empty() {
            self.follow_waypoints(ctx, speed, dt);
        }

        self.acceleration = 0.0;
        self.steering *= STEERING_DECAY;
        self.braking *= BRAKING_DECAY;
    }

    fn follow_waypoints(&mut self, ctx: &mut ObjectContext<'_, '_>, speed: f32, dt: f32) {
        let count = self.waypoints.len();
        let segment_index = (self.track_progress.max(0.0) as usize).min(count - 1);
        let segment = self.waypoints[segment_index];
        let t = self.track_progress - segment_index as f32;

        let mut guide = segment.get(t);
        let behind = normalize_or_zero(segment.get(t - dt) - guide);
        guide += Vec2::new(-behind.y, behind.x) * self.offset;
        self.guide = guide;

        let position = ctx.position();
        let to_guide = guide - position.xy();
        if to_guide.norm() <= GUIDE_MAX_DIST {
            self.track_progress += speed * dt;
            if self.track_progress >= count as f32 {
                self.track_progress = 0.0;
                self.laps += 1;
                debug!(object = ctx.id().0, laps = self.laps, "lap_completed");
            }
        }

        let direction = normalize_or_zero(to_guide);
        self.waypoint_side = ctx.right().dot(&direction);

        let debug = ctx.debug();
        if debug.is_enabled() {
            for spline in self.waypoints.iter() {
                draw_spline(debug, spline);
            }
            debug.circle(Vec3::new(guide.x, guide.y, 0.0), 0.2, GUIDE_COLOR);
            debug.line(
                position,
                position + Vec3::new(direction.x, direction.y, 0.0),
                HEADING_COLOR,
            );
        }
    }
}

fn draw_spline(debug: &mut engine::DebugDraw, spline: &Spline) {
    let mut last = spline.p1;
    for step in 1..=SPLINE_DEBUG_STEPS {
        let point = spline.get(step as f32 / SPLINE_DEBUG_STEPS as f32);
        debug.line(
            Vec3::new(last.x, last.y, 0.0),
            Vec3::new(point.x, point.y, 0.0),
            TRACK_COLOR,
        );
        last = point;
    }
    debug.dot(Vec3::new(spline.p1.x, spline.p1.y, 0.0), CONTROL_POINT_COLOR);
}

impl Behavior for CarBehavior {
    fn kind(&self) -> BehaviorKind {
        Self::KIND
    }

    fn info(&self) -> BehaviorInfo {
        BehaviorInfo::new()
            .with("driver", self.driver.label())
            .with("laps", self.laps)
            .with("track_progress", self.track_progress)
            .with("acceleration", self.acceleration)
            .with("steering", self.steering)
            .with("braking", self.braking)
            .with("guide", self.guide)
            .with("waypoint_side", self.waypoint_side)
            .with("offset", self.offset)
    }

    fn on_create(&mut self, ctx: &mut ObjectContext<'_, '_>) {
        ctx.set_body_kind(BodyKind::Dynamic);
        ctx.set_box_shape(CAR_HALF_EXTENTS.0, CAR_HALF_EXTENTS.1);
        self.acceleration = 0.0;
        self.steering = 0.0;
        self.braking = 0.0;
        self.track_progress = 0.0;
    }

    fn on_update(&mut self, ctx: &mut ObjectContext<'_, '_>, dt: f32) {
        match self.driver {
            CarDriver::Player => self.read_player_input(ctx.input()),
            CarDriver::Ai => self.plan_ai(ctx.position().xy()),
        }
        self.drive(ctx, dt);
    }
}

/// Body sprite plus headlight. The texture's long side runs along the car,
/// so the quad is turned a quarter turn from the heading.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CarSprite {
    material: Material,
    tint: Vec4,
}

impl CarSprite {
    pub(crate) const KIND: BehaviorKind = BehaviorKind("car_sprite");

    pub(crate) fn new(material: Material, tint: Vec4) -> Self {
        Self { material, tint }
    }
}

impl Behavior for CarSprite {
    fn kind(&self) -> BehaviorKind {
        Self::KIND
    }

    fn on_render(&self, _object: &GameObject, world: WorldTransform, ctx: &mut RenderContext) {
        ctx.cursor_mut()
            .reset()
            .position(world.position)
            .rotation(world.rotation + FRAC_PI_2);
        ctx.submit_sprite(self.material, self.tint);

        let forward = world.forward();
        let headlight = forward * 0.1 + world.position.xy();
        ctx.submit_spot_light(
            Vec3::new(headlight.x, headlight.y, 0.02),
            Vec3::new(forward.x, forward.y, -0.35),
            Vec3::new(1.0, 0.9, 0.9),
            1.0,
            6.0,
            0.6,
        );
    }
}

pub(crate) fn random_tint(rng: &mut impl Rng) -> Vec4 {
    let mut channel = || (rng.gen::<f32>() + 0.2).min(1.0);
    Vec4::new(channel(), channel(), channel(), 1.0)
}

const FLOOR_TILES: f32 = 32.0;
const DECOR_LIGHTS: u32 = 10;

/// Tiled floor under the track and a wave of colored point lights.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TrackDecor {
    floor: Material,
}

impl TrackDecor {
    pub(crate) const KIND: BehaviorKind = BehaviorKind("track_decor");

    pub(crate) fn new(floor: Material) -> Self {
        Self { floor }
    }
}

impl Behavior for TrackDecor {
    fn kind(&self) -> BehaviorKind {
        Self::KIND
    }

    fn on_render(&self, _object: &GameObject, _world: WorldTransform, ctx: &mut RenderContext) {
        ctx.cursor_mut()
            .reset()
            .region(Vec4::new(0.0, 0.0, FLOOR_TILES, FLOOR_TILES))
            .position(Vec3::new(0.0, 0.0, -0.01))
            .scale(Vec2::new(FLOOR_TILES, FLOOR_TILES));
        ctx.submit_sprite(self.floor, Vec4::new(1.0, 1.0, 1.0, 1.0));
        ctx.cursor_mut().reset();

        let count = DECOR_LIGHTS as f32;
        for index in 0..DECOR_LIGHTS {
            let fraction = index as f32 / count;
            ctx.submit_point_light(
                Vec3::new(
                    index as f32 * 2.0 - count,
                    (fraction * 10.0).sin() * count,
                    1.2,
                ),
                Vec3::new(fraction, 0.6, 1.0 - fraction),
                1.3,
                6.0,
            );
        }
    }
}
