use crate::math::{Mat4, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}

/// Pixel-space position with normalized device depth in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
    pub depth: f32,
}

/// OpenGL-style right-handed perspective; `fov_degrees` is vertical.
pub fn perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::new_perspective(aspect.max(f32::EPSILON), fov_degrees.to_radians(), near, far)
}

/// Projects a world point through `clip_from_world`. Points at or behind the
/// eye plane yield `None`.
pub fn project_to_screen(
    clip_from_world: &Mat4,
    world: Vec3,
    viewport: Viewport,
) -> Option<ScreenPoint> {
    let clip = clip_from_world * world.push(1.0);
    if clip.w <= f32::EPSILON {
        return None;
    }
    let ndc = clip.xyz() / clip.w;
    Some(ScreenPoint {
        x: (ndc.x + 1.0) * 0.5 * viewport.width as f32,
        y: (1.0 - ndc.y) * 0.5 * viewport.height as f32,
        depth: ndc.z,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Viewport = Viewport {
        width: 800,
        height: 600,
    };

    #[test]
    fn origin_maps_to_viewport_center() {
        let point = project_to_screen(&Mat4::identity(), Vec3::zeros(), VIEWPORT).expect("point");
        assert_eq!((point.x, point.y), (400.0, 300.0));
    }

    #[test]
    fn positive_y_points_up_the_screen() {
        let point = project_to_screen(&Mat4::identity(), Vec3::new(0.5, 0.5, 0.0), VIEWPORT)
            .expect("point");
        assert_eq!((point.x, point.y), (600.0, 150.0));
    }

    #[test]
    fn points_behind_the_camera_are_rejected() {
        let clip = perspective(50.0, VIEWPORT.aspect_ratio(), 0.01, 1000.0)
            * Mat4::new_translation(&Vec3::new(0.0, 0.0, -4.0));
        assert!(project_to_screen(&clip, Vec3::zeros(), VIEWPORT).is_some());
        assert!(project_to_screen(&clip, Vec3::new(0.0, 0.0, 5.0), VIEWPORT).is_none());
    }

    #[test]
    fn nearer_points_have_smaller_depth() {
        let clip = perspective(50.0, 1.0, 0.01, 1000.0)
            * Mat4::new_translation(&Vec3::new(0.0, 0.0, -4.0));
        let far = project_to_screen(&clip, Vec3::zeros(), VIEWPORT).expect("far");
        let near = project_to_screen(&clip, Vec3::new(0.0, 0.0, 1.0), VIEWPORT).expect("near");
        assert!(near.depth < far.depth);
    }
}
