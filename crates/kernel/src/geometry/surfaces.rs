use serde::{Deserialize, Serialize};

use super::point::Point3d;
use super::transform::{BoundingBox, Transform};
use super::vector::Vec3;
use super::SurfaceEval;

/// Analytic surface kinds supported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Surface {
    Plane(Plane),
    Sphere(Sphere),
}

/// An infinite plane with an orthonormal (u, v, normal) frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub origin: Point3d,
    pub normal: Vec3,
    pub u_axis: Vec3,
    pub v_axis: Vec3,
}

impl Plane {
    /// `normal` must be non-zero.
    pub fn new(origin: Point3d, normal: Vec3) -> Self {
        let normal = normal.normalize();
        let u_axis = normal.any_perpendicular();
        let v_axis = normal.cross(&u_axis);
        Self {
            origin,
            normal,
            u_axis,
            v_axis,
        }
    }

    pub fn xy() -> Self {
        Self {
            origin: Point3d::ORIGIN,
            normal: Vec3::Z,
            u_axis: Vec3::X,
            v_axis: Vec3::Y,
        }
    }

    pub fn evaluate(&self, u: f64, v: f64) -> Point3d {
        self.origin + self.u_axis * u + self.v_axis * v
    }

    /// Signed distance along the plane normal.
    pub fn distance_to_point(&self, p: &Point3d) -> f64 {
        (*p - self.origin).dot(&self.normal)
    }

    /// (u, v) parameters of the point's projection onto the plane.
    pub fn parameters_of(&self, p: &Point3d) -> (f64, f64) {
        let v = *p - self.origin;
        (v.dot(&self.u_axis), v.dot(&self.v_axis))
    }
}

/// A sphere; `u` is longitude in [0, 2PI), `v` latitude in [-PI/2, PI/2].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub center: Point3d,
    pub radius: f64,
}

impl Sphere {
    pub fn new(center: Point3d, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn evaluate(&self, u: f64, v: f64) -> Point3d {
        let cos_v = v.cos();
        Point3d::new(
            self.center.x + self.radius * cos_v * u.cos(),
            self.center.y + self.radius * cos_v * u.sin(),
            self.center.z + self.radius * v.sin(),
        )
    }

    pub fn parameters_of(&self, p: &Point3d) -> (f64, f64) {
        let d = *p - self.center;
        let u = d.y.atan2(d.x).rem_euclid(std::f64::consts::TAU);
        let horizontal = (d.x * d.x + d.y * d.y).sqrt();
        (u, d.z.atan2(horizontal))
    }

    /// Outward unit normal at the point's radial projection.
    pub fn normal_at_point(&self, p: &Point3d) -> Vec3 {
        (*p - self.center).normalized().unwrap_or(Vec3::Z)
    }

    /// Signed radial distance: positive outside the sphere.
    pub fn signed_distance(&self, p: &Point3d) -> f64 {
        p.distance_to(&self.center) - self.radius
    }

    pub fn same_sphere(&self, other: &Sphere, tol: f64) -> bool {
        self.center.distance_to(&other.center) <= tol && (self.radius - other.radius).abs() <= tol
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(self.center, self.center).expanded(self.radius)
    }
}

impl SurfaceEval for Surface {
    fn evaluate(&self, u: f64, v: f64) -> Point3d {
        match self {
            Surface::Plane(p) => p.evaluate(u, v),
            Surface::Sphere(s) => s.evaluate(u, v),
        }
    }

    fn normal_at(&self, u: f64, v: f64) -> Vec3 {
        match self {
            Surface::Plane(p) => p.normal,
            Surface::Sphere(s) => s.normal_at_point(&s.evaluate(u, v)),
        }
    }

    fn project(&self, p: &Point3d) -> (f64, f64) {
        match self {
            Surface::Plane(plane) => plane.parameters_of(p),
            Surface::Sphere(s) => s.parameters_of(p),
        }
    }

    fn distance_to(&self, p: &Point3d) -> f64 {
        match self {
            Surface::Plane(plane) => plane.distance_to_point(p).abs(),
            Surface::Sphere(s) => s.signed_distance(p).abs(),
        }
    }
}

impl Surface {
    pub fn surface_type_name(&self) -> &'static str {
        match self {
            Surface::Plane(_) => "Plane",
            Surface::Sphere(_) => "Sphere",
        }
    }

    /// Surface normal (not face normal) at the projection of `p`.
    pub fn normal_at_point(&self, p: &Point3d) -> Vec3 {
        match self {
            Surface::Plane(plane) => plane.normal,
            Surface::Sphere(s) => s.normal_at_point(p),
        }
    }

    pub fn transformed(&self, xf: &Transform) -> Surface {
        match self {
            Surface::Plane(p) => Surface::Plane(Plane {
                origin: xf.transform_point(&p.origin),
                normal: xf.transform_vector(&p.normal).normalize(),
                u_axis: xf.transform_vector(&p.u_axis).normalize(),
                v_axis: xf.transform_vector(&p.v_axis).normalize(),
            }),
            Surface::Sphere(s) => Surface::Sphere(Sphere {
                center: xf.transform_point(&s.center),
                radius: s.radius * xf.scale_factor(),
            }),
        }
    }
}
