pub mod point;
pub mod vector;
pub mod transform;
pub mod curves;
pub mod surfaces;
pub mod intersection;

use point::Point3d;
use vector::Vec3;

/// Evaluation capability the boolean pipeline needs from a curve.
pub trait CurveEval {
    fn evaluate(&self, t: f64) -> Point3d;
    fn derivative(&self, t: f64) -> Vec3;
    /// Parameter of the closest point; periodic curves report one period.
    fn project(&self, p: &Point3d) -> f64;
    fn period(&self) -> Option<f64>;
}

/// Evaluation capability the boolean pipeline needs from a surface.
pub trait SurfaceEval {
    fn evaluate(&self, u: f64, v: f64) -> Point3d;
    fn normal_at(&self, u: f64, v: f64) -> Vec3;
    fn project(&self, p: &Point3d) -> (f64, f64);
    /// Unsigned distance from the point to the surface.
    fn distance_to(&self, p: &Point3d) -> f64;
}
