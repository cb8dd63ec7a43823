use engine::math::lerp;
use engine::{
    perspective, Behavior, BehaviorInfo, BehaviorKind, GameObject, Mat4, ObjectContext, ObjectId,
    RenderContext, Vec3, WorldTransform,
};

const FIELD_OF_VIEW_DEGREES: f32 = 50.0;
const NEAR_PLANE: f32 = 0.01;
const FAR_PLANE: f32 = 1000.0;
const ZOOM_EASING: f32 = 0.025;
const ZOOM_PER_SPEED: f32 = 5.0;
const MIN_ZOOM: f32 = 1.0;
const MAX_ZOOM: f32 = 2.0;
const ZOOM_DISTANCE: f32 = 4.0;

/// Trails a target object and pulls back as it speeds up. Owns the view and
/// projection of the frame.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChaseCamera {
    target: Option<ObjectId>,
    smoothing: f32,
    zoom: f32,
}

impl ChaseCamera {
    pub(crate) const KIND: BehaviorKind = BehaviorKind("chase_camera");

    pub(crate) fn new(target: Option<ObjectId>) -> Self {
        Self {
            target,
            smoothing: 0.8,
            zoom: 1.0,
        }
    }

    /// Distance from the camera to the track plane.
    pub(crate) fn height(&self) -> f32 {
        self.zoom.clamp(MIN_ZOOM, MAX_ZOOM) * ZOOM_DISTANCE
    }
}

impl Behavior for ChaseCamera {
    fn kind(&self) -> BehaviorKind {
        Self::KIND
    }

    fn info(&self) -> BehaviorInfo {
        let info = BehaviorInfo::new()
            .with("zoom", self.zoom)
            .with("height", self.height());
        match self.target {
            Some(target) => info.with("target", target),
            None => info,
        }
    }

    fn on_update(&mut self, ctx: &mut ObjectContext<'_, '_>, _dt: f32) {
        let Some(target) = self.target else {
            return;
        };
        let Some(target_world) = ctx.world_transform_of(target) else {
            return;
        };

        let speed = ctx.linear_velocity_of(target).norm();
        self.zoom = lerp(self.zoom, 1.0 + speed * ZOOM_PER_SPEED, ZOOM_EASING);

        let position = ctx.position();
        let step = (target_world.position.xy() - position.xy()) * ((1.0 - self.smoothing) + 0.01);
        ctx.set_position(position + Vec3::new(step.x, step.y, 0.0));
    }

    fn on_render(&self, _object: &GameObject, world: WorldTransform, ctx: &mut RenderContext) {
        let aspect = ctx.aspect_ratio();
        ctx.set_projection(perspective(
            FIELD_OF_VIEW_DEGREES,
            aspect,
            NEAR_PLANE,
            FAR_PLANE,
        ));
        ctx.set_view(Mat4::new_translation(&Vec3::new(
            -world.position.x,
            -world.position.y,
            -self.height(),
        )));
    }
}
