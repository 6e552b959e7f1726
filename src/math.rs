//! Mathematical structs and functions.

use cgmath::prelude::*;
use cgmath::{Point2, Vector2};

/// A 2D point
pub type Point2d = Point2<f64>;

/// A 2D vector
pub type Vector2d = Vector2<f64>;

/// A straight line segment.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineSegment2d {
    pub start: Point2d,
    pub end: Point2d,
}

impl LineSegment2d {
    /// Creates a line segment from its end points.
    pub fn from_ends(start: Point2d, end: Point2d) -> Self {
        Self { start, end }
    }

    /// The length of the segment.
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    /// Samples the point `pos` units from the start, in the direction of the end.
    pub fn sample(&self, pos: f64) -> Point2d {
        let len = self.length();
        if len <= 0.0 {
            return self.start;
        }
        self.start + (self.end - self.start) * (pos / len)
    }

    /// Finds the point where two segments cross.
    /// Returns the distance along `self` and along `other` at which they meet.
    pub fn intersect(&self, other: &Self) -> Option<(f64, f64)> {
        let r = self.end - self.start;
        let s = other.end - other.start;
        let denom = cross(r, s);
        if denom.abs() < 1e-12 {
            return None;
        }
        let qp = other.start - self.start;
        let t = cross(qp, s) / denom;
        let u = cross(qp, r) / denom;
        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
            Some((t * r.magnitude(), u * s.magnitude()))
        } else {
            None
        }
    }
}

/// The z component of the cross product of two 2D vectors.
fn cross(a: Vector2d, b: Vector2d) -> f64 {
    a.x * b.y - a.y * b.x
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn crossing_segments() {
        let a = LineSegment2d::from_ends(Point2d::new(-10.0, 0.0), Point2d::new(10.0, 0.0));
        let b = LineSegment2d::from_ends(Point2d::new(2.0, 10.0), Point2d::new(2.0, -10.0));
        let (pa, pb) = a.intersect(&b).unwrap();
        assert_approx_eq!(pa, 12.0);
        assert_approx_eq!(pb, 10.0);
    }

    #[test]
    fn parallel_segments_do_not_cross() {
        let a = LineSegment2d::from_ends(Point2d::new(0.0, 0.0), Point2d::new(10.0, 0.0));
        let b = LineSegment2d::from_ends(Point2d::new(0.0, 1.0), Point2d::new(10.0, 1.0));
        assert!(a.intersect(&b).is_none());
    }

    #[test]
    fn sample_along_segment() {
        let a = LineSegment2d::from_ends(Point2d::new(0.0, 0.0), Point2d::new(0.0, 50.0));
        let p = a.sample(20.0);
        assert_approx_eq!(p.y, 20.0);
        assert_approx_eq!(a.length(), 50.0);
    }
}
