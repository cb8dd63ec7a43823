use nalgebra::{Matrix4, Vector2, Vector3, Vector4};

pub type Vec2 = Vector2<f32>;
pub type Vec3 = Vector3<f32>;
pub type Vec4 = Vector4<f32>;
pub type Mat4 = Matrix4<f32>;

const NORMALIZE_EPSILON: f32 = 1.0e-6;

/// Rotates `v` counter-clockwise by `angle` radians.
pub fn rotate_vec2(v: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Unit vector in the direction of `v`, or zero for degenerate input.
pub fn normalize_or_zero(v: Vec2) -> Vec2 {
    v.try_normalize(NORMALIZE_EPSILON).unwrap_or_else(Vec2::zeros)
}

pub fn normalize3_or_zero(v: Vec3) -> Vec3 {
    v.try_normalize(NORMALIZE_EPSILON).unwrap_or_else(Vec3::zeros)
}

pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}
