use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use super::point::Point3d;
use super::transform::{BoundingBox, Transform};
use super::vector::Vec3;
use super::CurveEval;

/// Analytic curve kinds supported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Curve {
    Line(Line3d),
    Circle(Circle3d),
}

/// An infinite line parametrized by arc length from `origin`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line3d {
    pub origin: Point3d,
    pub direction: Vec3,
}

impl Line3d {
    /// `direction` must be non-zero.
    pub fn new(origin: Point3d, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Line through `a` and `b`, parametrized so that `t = 0` at `a`.
    pub fn from_points(a: Point3d, b: Point3d) -> Option<Self> {
        let direction = (b - a).normalized()?;
        Some(Self { origin: a, direction })
    }

    pub fn evaluate(&self, t: f64) -> Point3d {
        self.origin + self.direction * t
    }

    pub fn closest_point(&self, p: &Point3d) -> (Point3d, f64) {
        let t = (*p - self.origin).dot(&self.direction);
        (self.evaluate(t), t)
    }

    pub fn distance_to_point(&self, p: &Point3d) -> f64 {
        let (closest, _) = self.closest_point(p);
        p.distance_to(&closest)
    }
}

/// A circle in 3D space, parametrized by angle around `normal` starting at
/// `x_axis`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle3d {
    pub center: Point3d,
    pub normal: Vec3,
    pub radius: f64,
    pub x_axis: Vec3,
}

impl Circle3d {
    /// `normal` must be non-zero.
    pub fn new(center: Point3d, normal: Vec3, radius: f64) -> Self {
        let normal = normal.normalize();
        Self {
            center,
            normal,
            radius,
            x_axis: normal.any_perpendicular(),
        }
    }

    pub fn with_axes(center: Point3d, normal: Vec3, x_axis: Vec3, radius: f64) -> Self {
        Self {
            center,
            normal: normal.normalize(),
            x_axis: x_axis.normalize(),
            radius,
        }
    }

    pub fn y_axis(&self) -> Vec3 {
        self.normal.cross(&self.x_axis)
    }

    pub fn evaluate(&self, t: f64) -> Point3d {
        let (s, c) = t.sin_cos();
        self.center + self.x_axis * (self.radius * c) + self.y_axis() * (self.radius * s)
    }

    pub fn derivative(&self, t: f64) -> Vec3 {
        let (s, c) = t.sin_cos();
        self.x_axis * (-self.radius * s) + self.y_axis() * (self.radius * c)
    }

    /// Angle of the point's projection onto the circle plane, in [0, 2PI).
    pub fn parameter_of(&self, p: &Point3d) -> f64 {
        let d = *p - self.center;
        d.dot(&self.y_axis()).atan2(d.dot(&self.x_axis)).rem_euclid(TAU)
    }

    /// Exact distance from `p` to the circle.
    pub fn distance_to_point(&self, p: &Point3d) -> f64 {
        let d = *p - self.center;
        let axial = d.dot(&self.normal);
        let radial = (d - self.normal * axial).length();
        (axial * axial + (radial - self.radius).powi(2)).sqrt()
    }

    /// True when both circles trace the same point set.
    pub fn same_circle(&self, other: &Circle3d, tol: f64, angular_tol: f64) -> bool {
        self.center.distance_to(&other.center) <= tol
            && (self.radius - other.radius).abs() <= tol
            && self.normal.is_parallel_to(&other.normal, angular_tol)
    }
}

/// Map `t` into `[start, start + period)`.
pub fn wrap_parameter(t: f64, start: f64, period: f64) -> f64 {
    start + (t - start).rem_euclid(period)
}

impl CurveEval for Curve {
    fn evaluate(&self, t: f64) -> Point3d {
        match self {
            Curve::Line(l) => l.evaluate(t),
            Curve::Circle(c) => c.evaluate(t),
        }
    }

    fn derivative(&self, t: f64) -> Vec3 {
        match self {
            Curve::Line(l) => l.direction,
            Curve::Circle(c) => c.derivative(t),
        }
    }

    fn project(&self, p: &Point3d) -> f64 {
        match self {
            Curve::Line(l) => l.closest_point(p).1,
            Curve::Circle(c) => c.parameter_of(p),
        }
    }

    fn period(&self) -> Option<f64> {
        match self {
            Curve::Line(_) => None,
            Curve::Circle(_) => Some(TAU),
        }
    }
}

impl Curve {
    pub fn distance_to_point(&self, p: &Point3d) -> f64 {
        match self {
            Curve::Line(l) => l.distance_to_point(p),
            Curve::Circle(c) => c.distance_to_point(p),
        }
    }

    /// Parameter of `p` inside `[t0, t1]` (widened by `ptol`), if the
    /// closest point of the curve falls in that range. Periodic parameters
    /// are wrapped to start at `t0`; a point at the seam of a closed range
    /// reports `t0`.
    pub fn parameter_in_range(&self, p: &Point3d, t0: f64, t1: f64, ptol: f64) -> Option<f64> {
        let raw = self.project(p);
        let t = match self.period() {
            Some(period) => {
                let w = wrap_parameter(raw, t0, period);
                // Just below t0 wraps to near t0 + period.
                if w > t1 + ptol && (t0 + period - w) <= ptol { t0 } else { w }
            }
            None => raw,
        };
        (t >= t0 - ptol && t <= t1 + ptol).then_some(t.clamp(t0, t1))
    }

    /// Unit tangent at `t`.
    pub fn tangent(&self, t: f64) -> Vec3 {
        self.derivative(t).normalized().unwrap_or(Vec3::X)
    }

    /// Number of polyline segments used to approximate `[t0, t1]`.
    pub fn segment_count(&self, t0: f64, t1: f64) -> usize {
        match self {
            Curve::Line(_) => 1,
            Curve::Circle(_) => (((t1 - t0).abs() / TAU) * 128.0).ceil().max(4.0) as usize,
        }
    }

    /// `n + 1` evenly spaced points over `[t0, t1]`, endpoints included.
    pub fn sample(&self, t0: f64, t1: f64, n: usize) -> Vec<Point3d> {
        let n = n.max(1);
        (0..=n)
            .map(|i| self.evaluate(t0 + (t1 - t0) * (i as f64 / n as f64)))
            .collect()
    }

    pub fn bounding_box(&self, t0: f64, t1: f64) -> BoundingBox {
        match self {
            Curve::Line(l) => BoundingBox::from_points(&[l.evaluate(t0), l.evaluate(t1)]),
            Curve::Circle(_) => {
                // Sampled chord polygon plus sagitta margin covers the arc.
                let n = self.segment_count(t0, t1);
                let bb = BoundingBox::from_points(&self.sample(t0, t1, n));
                let sagitta = match self {
                    Curve::Circle(c) => c.radius * (1.0 - (TAU / 256.0).cos()),
                    Curve::Line(_) => 0.0,
                };
                bb.expanded(sagitta)
            }
        }
    }

    pub fn length(&self, t0: f64, t1: f64) -> f64 {
        match self {
            Curve::Line(_) => (t1 - t0).abs(),
            Curve::Circle(c) => c.radius * (t1 - t0).abs(),
        }
    }

    /// Image of the curve under an affine map; parameters are preserved for
    /// rigid motions and scaled by the scale factor for lines.
    pub fn transformed(&self, xf: &Transform) -> Curve {
        match self {
            Curve::Line(l) => Curve::Line(Line3d {
                origin: xf.transform_point(&l.origin),
                direction: xf.transform_vector(&l.direction).normalize(),
            }),
            Curve::Circle(c) => Curve::Circle(Circle3d {
                center: xf.transform_point(&c.center),
                normal: xf.transform_vector(&c.normal).normalize(),
                x_axis: xf.transform_vector(&c.x_axis).normalize(),
                radius: c.radius * xf.scale_factor(),
            }),
        }
    }
}

/// A ray for intersection testing.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Point3d,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Point3d, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn at(&self, t: f64) -> Point3d {
        self.origin + self.direction * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_line_closest_point() {
        let l = Line3d::new(Point3d::ORIGIN, Vec3::X);
        let (closest, t) = l.closest_point(&Point3d::new(5.0, 3.0, 0.0));
        assert!((t - 5.0).abs() < 1e-12);
        assert!(closest.distance_to(&Point3d::new(5.0, 0.0, 0.0)) < 1e-12);
    }

    #[test]
    fn test_line_from_coincident_points() {
        let p = Point3d::new(1.0, 1.0, 1.0);
        assert!(Line3d::from_points(p, p).is_none());
    }

    #[test]
    fn test_circle_parameter_round_trip() {
        let c = Circle3d::new(Point3d::new(1.0, 2.0, 3.0), Vec3::new(0.0, 1.0, 1.0), 2.0);
        for &t in &[0.0, 0.5, PI, 4.0, 6.0] {
            let p = c.evaluate(t);
            assert!((c.parameter_of(&p) - t).abs() < 1e-9, "t={}", t);
            assert!(c.distance_to_point(&p) < 1e-12);
        }
    }

    #[test]
    fn test_circle_distance_off_plane() {
        let c = Circle3d::new(Point3d::ORIGIN, Vec3::Z, 1.0);
        let d = c.distance_to_point(&Point3d::new(2.0, 0.0, 1.0));
        assert!((d - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_parameter_in_range_wraps_periodic() {
        let curve = Curve::Circle(Circle3d::new(Point3d::ORIGIN, Vec3::Z, 1.0));
        let start = 3.0 * PI / 2.0;
        let p = curve.evaluate(0.1);
        let t = curve.parameter_in_range(&p, start, start + PI, 1e-9).unwrap();
        assert!((t - (TAU + 0.1)).abs() < 1e-9);
        let q = curve.evaluate(PI);
        assert!(curve.parameter_in_range(&q, start, start + PI, 1e-9).is_none());
    }

    #[test]
    fn test_parameter_in_range_line_bounds() {
        let curve = Curve::Line(Line3d::new(Point3d::ORIGIN, Vec3::X));
        assert!(curve.parameter_in_range(&Point3d::new(0.5, 0.1, 0.0), 0.0, 1.0, 1e-9).is_some());
        assert!(curve.parameter_in_range(&Point3d::new(1.5, 0.0, 0.0), 0.0, 1.0, 1e-9).is_none());
    }

    #[test]
    fn test_circle_bounding_box_contains_arc() {
        let curve = Curve::Circle(Circle3d::new(Point3d::ORIGIN, Vec3::Z, 1.0));
        let bb = curve.bounding_box(0.0, TAU);
        assert!(bb.contains_point(&Point3d::new(1.0, 0.0, 0.0)));
        assert!(bb.contains_point(&Point3d::new(0.0, -1.0, 0.0)));
        assert!(bb.max.x < 1.01);
    }
}
