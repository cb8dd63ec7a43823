use thiserror::Error;

use crate::math::Vec2;

pub const MIN_LOOP_POINTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SplineError {
    #[error("closed spline loop needs at least 4 points, got {actual}")]
    TooFewPoints { actual: usize },
}

/// Catmull-Rom segment. The curve runs from `p1` (t = 0) to `p2` (t = 1);
/// `p0` and `p3` only shape the tangents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spline {
    pub p0: Vec2,
    pub p1: Vec2,
    pub p2: Vec2,
    pub p3: Vec2,
}

impl Spline {
    pub fn new(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2) -> Self {
        Self { p0, p1, p2, p3 }
    }

    /// Evaluates the segment at `t`. Values outside [0, 1] extrapolate.
    pub fn get(&self, t: f32) -> Vec2 {
        let t2 = t * t;
        let t3 = t2 * t;
        let (p0, p1, p2, p3) = (self.p0, self.p1, self.p2, self.p3);

        (p1 * 2.0
            + (p2 - p0) * t
            + (p0 * 2.0 - p1 * 5.0 + p2 * 4.0 - p3) * t2
            + (p1 * 3.0 - p0 - p2 * 3.0 + p3) * t3)
            * 0.5
    }

    /// Builds one segment per point of a closed loop. Segment `i` runs from
    /// `points[i]` to `points[i + 1]`, with neighbours looked up modulo the
    /// point count.
    pub fn closed_loop(points: &[Vec2]) -> Result<Vec<Spline>, SplineError> {
        let count = points.len();
        if count < MIN_LOOP_POINTS {
            return Err(SplineError::TooFewPoints { actual: count });
        }

        let at = |index: usize| points[index % count];
        Ok((0..count)
            .map(|i| Spline::new(at(i + count - 1), at(i), at(i + 1), at(i + 2)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: Vec2, b: Vec2) -> bool {
        (a - b).norm() < 0.0001
    }

    fn square() -> Vec<Vec2> {
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ]
    }

    #[test]
    fn endpoints_hit_inner_control_points() {
        let spline = Spline::new(
            Vec2::new(-1.0, 3.0),
            Vec2::new(0.5, 2.0),
            Vec2::new(4.0, -1.0),
            Vec2::new(7.0, 0.0),
        );

        assert!(approx_eq(spline.get(0.0), spline.p1));
        assert!(approx_eq(spline.get(1.0), spline.p2));
    }

    #[test]
    fn evenly_spaced_colinear_points_interpolate_linearly() {
        let spline = Spline::new(
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(3.0, 3.0),
        );

        for step in 0..=10 {
            let t = step as f32 / 10.0;
            assert!(approx_eq(spline.get(t), Vec2::new(1.0 + t, 1.0 + t)), "t={t}");
        }
    }

    #[test]
    fn closed_loop_wraps_neighbour_indices() {
        let points = square();
        let splines = Spline::closed_loop(&points).expect("loop");

        assert_eq!(splines.len(), points.len());
        assert_eq!(splines[0].p0, points[3]);
        assert_eq!(splines[0].p1, points[0]);
        assert_eq!(splines[0].p2, points[1]);
        assert_eq!(splines[0].p3, points[2]);

        let last = splines[3];
        assert_eq!(last.p0, points[2]);
        assert_eq!(last.p1, points[3]);
        assert_eq!(last.p2, points[0]);
        assert_eq!(last.p3, points[1]);
    }

    #[test]
    fn consecutive_segments_join_without_gaps() {
        let splines = Spline::closed_loop(&square()).expect("loop");
        for (current, next) in splines.iter().zip(splines.iter().cycle().skip(1)) {
            assert!(approx_eq(current.get(1.0), next.get(0.0)));
        }
    }

    #[test]
    fn fewer_than_four_points_is_rejected() {
        let points = &square()[..3];
        assert_eq!(
            Spline::closed_loop(points),
            Err(SplineError::TooFewPoints { actual: 3 })
        );
        assert!(Spline::closed_loop(&[]).is_err());
    }
}
