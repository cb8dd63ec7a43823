use std::f32::consts::TAU;

use crate::math::{Mat4, Vec2, Vec3, Vec4};

use super::backend::RenderBackend;

const DOT_SEGMENTS: usize = 6;
const CIRCLE_SEGMENTS: usize = 32;
const DOT_RADIUS: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineVertex {
    pub position: Vec3,
    pub color: Vec4,
}

/// Immediate-mode line list, drawn on top of the frame and cleared on flush.
/// Primitives submitted while disabled are dropped.
#[derive(Debug)]
pub struct DebugDraw {
    enabled: bool,
    lines: Vec<LineVertex>,
}

impl Default for DebugDraw {
    fn default() -> Self {
        Self::new(cfg!(debug_assertions))
    }
}

impl DebugDraw {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            lines: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.lines.clear();
        }
    }

    pub fn toggle(&mut self) -> bool {
        self.set_enabled(!self.enabled);
        self.enabled
    }

    pub fn line(&mut self, from: Vec3, to: Vec3, color: Vec4) {
        if !self.enabled {
            return;
        }
        self.lines.push(LineVertex {
            position: from,
            color,
        });
        self.lines.push(LineVertex { position: to, color });
    }

    pub fn dot(&mut self, center: Vec3, color: Vec4) {
        self.ring(center, DOT_RADIUS, DOT_SEGMENTS, color);
    }

    pub fn circle(&mut self, center: Vec3, radius: f32, color: Vec4) {
        self.ring(center, radius, CIRCLE_SEGMENTS, color);
    }

    /// Closed outline through `points` at height `z`.
    pub fn polygon(&mut self, points: &[Vec2], z: f32, color: Vec4) {
        if points.len() < 2 {
            return;
        }
        for (index, from) in points.iter().enumerate() {
            let to = points[(index + 1) % points.len()];
            self.line(
                Vec3::new(from.x, from.y, z),
                Vec3::new(to.x, to.y, z),
                color,
            );
        }
    }

    fn ring(&mut self, center: Vec3, radius: f32, segments: usize, color: Vec4) {
        let step = TAU / segments as f32;
        for segment in 0..segments {
            let a = step * segment as f32;
            let b = step * (segment + 1) as f32;
            self.line(
                center + Vec3::new(a.cos(), a.sin(), 0.0) * radius,
                center + Vec3::new(b.cos(), b.sin(), 0.0) * radius,
                color,
            );
        }
    }

    /// Drops queued lines without drawing them.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[LineVertex] {
        &self.lines
    }

    pub fn flush(&mut self, backend: &mut dyn RenderBackend, view_projection: &Mat4) {
        if !self.lines.is_empty() {
            backend.draw_lines(view_projection, &self.lines);
        }
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::rendering::backend::recording::RecordingBackend;

    fn red() -> Vec4 {
        Vec4::new(1.0, 0.0, 0.0, 1.0)
    }

    #[test]
    fn disabled_draw_drops_primitives() {
        let mut debug = DebugDraw::new(false);
        debug.line(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0), red());
        debug.circle(Vec3::zeros(), 1.0, red());
        assert!(debug.lines().is_empty());
    }

    #[test]
    fn primitives_expand_to_line_pairs() {
        let mut debug = DebugDraw::new(true);
        debug.dot(Vec3::zeros(), red());
        assert_eq!(debug.lines().len(), DOT_SEGMENTS * 2);

        debug.polygon(
            &[Vec2::zeros(), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
            0.0,
            red(),
        );
        assert_eq!(debug.lines().len(), DOT_SEGMENTS * 2 + 6);
    }

    #[test]
    fn flush_hands_lines_to_backend_and_clears() {
        let mut debug = DebugDraw::new(true);
        let mut backend = RecordingBackend::default();
        debug.line(Vec3::zeros(), Vec3::new(1.0, 1.0, 0.0), red());

        debug.flush(&mut backend, &Mat4::identity());

        assert_eq!(backend.line_vertices, 2);
        assert!(debug.lines().is_empty());
    }

    #[test]
    fn toggling_off_discards_queued_lines() {
        let mut debug = DebugDraw::new(true);
        debug.line(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0), red());
        assert!(!debug.toggle());
        assert!(debug.lines().is_empty());
        assert!(debug.toggle());
    }
}
