use engine::Vec2;
use serde::Deserialize;

/// Shape of the generated loop: an ellipse whose radius wobbles with the
/// angle.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct TrackConfig {
    pub(crate) step_degrees: u32,
    pub(crate) radius_x: f32,
    pub(crate) radius_y: f32,
    pub(crate) wobble_frequency: f32,
    pub(crate) wobble_amplitude: f32,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            step_degrees: 18,
            radius_x: 10.0,
            radius_y: 8.0,
            wobble_frequency: 5.0,
            wobble_amplitude: 1.0,
        }
    }
}

/// Waypoints sampled every `step_degrees` around the loop, counter-clockwise
/// from the positive x axis. A zero step yields no points.
pub(crate) fn track_points(track: &TrackConfig) -> Vec<Vec2> {
    if track.step_degrees == 0 {
        return Vec::new();
    }

    (0..360)
        .step_by(track.step_degrees as usize)
        .map(|degrees| {
            let angle = (degrees as f32).to_radians();
            let wobble = (angle * track.wobble_frequency).sin() * track.wobble_amplitude;
            Vec2::new(
                angle.cos() * (track.radius_x + wobble),
                angle.sin() * (track.radius_y + wobble),
            )
        })
        .collect()
}
