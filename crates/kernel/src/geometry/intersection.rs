use super::curves::{Circle3d, Curve, Line3d, Ray};
use super::point::Point3d;
use super::surfaces::{Plane, Sphere, Surface};
use super::vector::Vec3;
use super::CurveEval;

/// Iteration cap for every Newton refinement in this module.
pub const MAX_REFINE_ITERATIONS: usize = 16;

/// Result of a ray-surface intersection.
#[derive(Debug, Clone)]
pub struct RaySurfaceHit {
    pub point: Point3d,
    pub t: f64,
    pub normal: Vec3,
}

/// Contact between two curves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveCurveHit {
    pub point: Point3d,
    pub t1: f64,
    pub t2: f64,
    pub tangential: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CurveCurve {
    Points(Vec<CurveCurveHit>),
    /// The curves share their whole point set (same line or same circle).
    Coincident,
}

/// Contact between a curve and a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSurfaceHit {
    pub point: Point3d,
    pub t: f64,
    pub tangential: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CurveSurface {
    Points(Vec<CurveSurfaceHit>),
    /// The curve lies in the surface.
    OnSurface,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceSurface {
    None,
    /// Same point set; `same_orientation` compares surface normals.
    Coincident { same_orientation: bool },
    Line(Line3d),
    Circle(Circle3d),
    /// Isolated tangent contact.
    Point(Point3d),
}

// ─── Rays ───────────────────────────────────────────────────────────────────

pub fn ray_plane(ray: &Ray, plane: &Plane) -> Option<RaySurfaceHit> {
    let denom = ray.direction.dot(&plane.normal);
    if denom.abs() < 1e-15 {
        return None;
    }
    let t = (plane.origin - ray.origin).dot(&plane.normal) / denom;
    if t < 0.0 {
        return None;
    }
    Some(RaySurfaceHit {
        point: ray.at(t),
        t,
        normal: if denom < 0.0 { plane.normal } else { -plane.normal },
    })
}

pub fn ray_sphere(ray: &Ray, sphere: &Sphere) -> Vec<RaySurfaceHit> {
    let oc = ray.origin - sphere.center;
    let b = oc.dot(&ray.direction);
    let c = oc.dot(&oc) - sphere.radius * sphere.radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return vec![];
    }
    let root = discriminant.sqrt();
    let mut hits: Vec<RaySurfaceHit> = [-b - root, -b + root]
        .into_iter()
        .filter(|t| *t >= 0.0)
        .map(|t| {
            let point = ray.at(t);
            RaySurfaceHit {
                point,
                t,
                normal: sphere.normal_at_point(&point),
            }
        })
        .collect();
    if discriminant == 0.0 {
        hits.truncate(1);
    }
    hits
}

// ─── Curve / curve ──────────────────────────────────────────────────────────

/// Closest points between two non-parallel lines: `(t1, t2, distance)`.
pub fn line_line_closest(l1: &Line3d, l2: &Line3d) -> Option<(f64, f64, f64)> {
    let w = l1.origin - l2.origin;
    let b = l1.direction.dot(&l2.direction);
    let d = l1.direction.dot(&w);
    let e = l2.direction.dot(&w);
    let denom = 1.0 - b * b;
    if denom.abs() < 1e-15 {
        return None;
    }
    let t1 = (b * e - d) / denom;
    let t2 = (e - b * d) / denom;
    Some((t1, t2, l1.evaluate(t1).distance_to(&l2.evaluate(t2))))
}

pub fn line_line(l1: &Line3d, l2: &Line3d, tol: f64, angular: f64) -> CurveCurve {
    if l1.direction.is_parallel_to(&l2.direction, angular) {
        return if l1.distance_to_point(&l2.origin) <= tol {
            CurveCurve::Coincident
        } else {
            CurveCurve::Points(vec![])
        };
    }
    match line_line_closest(l1, l2) {
        Some((t1, t2, dist)) if dist <= tol => {
            let point = l1.evaluate(t1).midpoint(&l2.evaluate(t2));
            CurveCurve::Points(vec![CurveCurveHit {
                point,
                t1,
                t2,
                tangential: false,
            }])
        }
        _ => CurveCurve::Points(vec![]),
    }
}

/// Line/circle contacts; `t1` on the line, `t2` on the circle.
pub fn line_circle(line: &Line3d, circle: &Circle3d, tol: f64, angular: f64) -> Vec<CurveCurveHit> {
    let along_normal = line.direction.dot(&circle.normal);
    if along_normal.abs() > angular {
        // Transversal to the circle plane: at most one contact.
        let t = (circle.center - line.origin).dot(&circle.normal) / along_normal;
        let p = line.evaluate(t);
        if circle.distance_to_point(&p) > tol {
            return vec![];
        }
        return vec![CurveCurveHit {
            point: p,
            t1: t,
            t2: circle.parameter_of(&p),
            tangential: false,
        }];
    }
    if (line.origin - circle.center).dot(&circle.normal).abs() > tol {
        return vec![];
    }
    let (foot, t0) = line.closest_point(&circle.center);
    let rho = foot.distance_to(&circle.center);
    if rho > circle.radius + tol {
        return vec![];
    }
    if (rho - circle.radius).abs() <= tol {
        return vec![CurveCurveHit {
            point: foot,
            t1: t0,
            t2: circle.parameter_of(&foot),
            tangential: true,
        }];
    }
    let half = (circle.radius * circle.radius - rho * rho).sqrt();
    [t0 - half, t0 + half]
        .into_iter()
        .map(|t| {
            let p = line.evaluate(t);
            CurveCurveHit {
                point: p,
                t1: t,
                t2: circle.parameter_of(&p),
                tangential: false,
            }
        })
        .collect()
}

pub fn circle_circle(c1: &Circle3d, c2: &Circle3d, tol: f64, angular: f64) -> CurveCurve {
    if c1.same_circle(c2, tol, angular) {
        return CurveCurve::Coincident;
    }
    if c1.normal.is_parallel_to(&c2.normal, angular) {
        let offset = c2.center - c1.center;
        if offset.dot(&c1.normal).abs() > tol {
            return CurveCurve::Points(vec![]);
        }
        let d = offset.length();
        let (r1, r2) = (c1.radius, c2.radius);
        if d <= tol || d > r1 + r2 + tol || d < (r1 - r2).abs() - tol {
            return CurveCurve::Points(vec![]);
        }
        let e = offset / d;
        let tangential = (d - (r1 + r2)).abs() <= tol || (d - (r1 - r2).abs()).abs() <= tol;
        let a = (d * d + r1 * r1 - r2 * r2) / (2.0 * d);
        let base = c1.center + e * a;
        let points = if tangential {
            vec![base]
        } else {
            let h = (r1 * r1 - a * a).max(0.0).sqrt();
            let side = c1.normal.cross(&e);
            vec![base + side * h, base - side * h]
        };
        return CurveCurve::Points(
            points
                .into_iter()
                .map(|p| CurveCurveHit {
                    point: p,
                    t1: c1.parameter_of(&p),
                    t2: c2.parameter_of(&p),
                    tangential,
                })
                .collect(),
        );
    }
    let p1 = Plane::new(c1.center, c1.normal);
    let p2 = Plane::new(c2.center, c2.normal);
    let SurfaceSurface::Line(line) = plane_plane(&p1, &p2, tol, angular) else {
        return CurveCurve::Points(vec![]);
    };
    let hits = line_circle(&line, c1, tol, angular)
        .into_iter()
        .filter(|h| c2.distance_to_point(&h.point) <= tol)
        .map(|h| {
            let on_c2 = line_circle(&line, c2, tol, angular);
            let tangent_c2 = on_c2
                .iter()
                .any(|o| o.tangential && o.point.distance_to(&h.point) <= tol);
            CurveCurveHit {
                point: h.point,
                t1: h.t2,
                t2: c2.parameter_of(&h.point),
                tangential: h.tangential || tangent_c2,
            }
        })
        .collect();
    CurveCurve::Points(hits)
}

/// Dispatch on curve kinds. Hits report `t1` on `a` and `t2` on `b`.
pub fn curve_curve(a: &Curve, b: &Curve, tol: f64, angular: f64) -> CurveCurve {
    match (a, b) {
        (Curve::Line(l1), Curve::Line(l2)) => line_line(l1, l2, tol, angular),
        (Curve::Line(l), Curve::Circle(c)) => CurveCurve::Points(line_circle(l, c, tol, angular)),
        (Curve::Circle(c), Curve::Line(l)) => CurveCurve::Points(
            line_circle(l, c, tol, angular)
                .into_iter()
                .map(|h| CurveCurveHit {
                    t1: h.t2,
                    t2: h.t1,
                    ..h
                })
                .collect(),
        ),
        (Curve::Circle(c1), Curve::Circle(c2)) => circle_circle(c1, c2, tol, angular),
    }
}

// ─── Curve / surface ────────────────────────────────────────────────────────

pub fn line_plane(line: &Line3d, plane: &Plane, tol: f64, angular: f64) -> CurveSurface {
    let denom = line.direction.dot(&plane.normal);
    let origin_dist = plane.distance_to_point(&line.origin);
    if denom.abs() <= angular {
        return if origin_dist.abs() <= tol {
            CurveSurface::OnSurface
        } else {
            CurveSurface::Points(vec![])
        };
    }
    let t = -origin_dist / denom;
    CurveSurface::Points(vec![CurveSurfaceHit {
        point: line.evaluate(t),
        t,
        tangential: false,
    }])
}

pub fn line_sphere(line: &Line3d, sphere: &Sphere, tol: f64) -> CurveSurface {
    let (foot, t0) = line.closest_point(&sphere.center);
    let rho = foot.distance_to(&sphere.center);
    if rho > sphere.radius + tol {
        return CurveSurface::Points(vec![]);
    }
    if (rho - sphere.radius).abs() <= tol {
        return CurveSurface::Points(vec![CurveSurfaceHit {
            point: foot,
            t: t0,
            tangential: true,
        }]);
    }
    let half = (sphere.radius * sphere.radius - rho * rho).sqrt();
    CurveSurface::Points(
        [t0 - half, t0 + half]
            .into_iter()
            .map(|t| CurveSurfaceHit {
                point: line.evaluate(t),
                t,
                tangential: false,
            })
            .collect(),
    )
}

pub fn circle_plane(circle: &Circle3d, plane: &Plane, tol: f64, angular: f64) -> CurveSurface {
    if circle.normal.is_parallel_to(&plane.normal, angular) {
        return if plane.distance_to_point(&circle.center).abs() <= tol {
            CurveSurface::OnSurface
        } else {
            CurveSurface::Points(vec![])
        };
    }
    let carrier = Plane::new(circle.center, circle.normal);
    let SurfaceSurface::Line(line) = plane_plane(&carrier, plane, tol, angular) else {
        return CurveSurface::Points(vec![]);
    };
    CurveSurface::Points(
        line_circle(&line, circle, tol, angular)
            .into_iter()
            .map(|h| CurveSurfaceHit {
                point: h.point,
                t: h.t2,
                tangential: h.tangential,
            })
            .collect(),
    )
}

pub fn circle_sphere(circle: &Circle3d, sphere: &Sphere, tol: f64) -> CurveSurface {
    let w = circle.center - sphere.center;
    let r = circle.radius;
    let a = 2.0 * r * w.dot(&circle.x_axis);
    let b = 2.0 * r * w.dot(&circle.y_axis());
    let base = w.length_squared() + r * r;
    let k = sphere.radius * sphere.radius - base;
    let m = (a * a + b * b).sqrt();

    // Distances from the sphere center to the nearest/farthest circle points.
    let far = (base + m).sqrt();
    let near = (base - m).max(0.0).sqrt();
    if m <= 2.0 * r * tol {
        return if (base.sqrt() - sphere.radius).abs() <= tol {
            CurveSurface::OnSurface
        } else {
            CurveSurface::Points(vec![])
        };
    }
    let phi = b.atan2(a);
    let hit = |t: f64, tangential: bool| CurveSurfaceHit {
        point: circle.evaluate(t),
        t: t.rem_euclid(std::f64::consts::TAU),
        tangential,
    };
    if (far - sphere.radius).abs() <= tol {
        return CurveSurface::Points(vec![hit(phi, true)]);
    }
    if (near - sphere.radius).abs() <= tol {
        return CurveSurface::Points(vec![hit(phi + std::f64::consts::PI, true)]);
    }
    if k.abs() > m {
        return CurveSurface::Points(vec![]);
    }
    let delta = (k / m).clamp(-1.0, 1.0).acos();
    CurveSurface::Points(vec![hit(phi - delta, false), hit(phi + delta, false)])
}

pub fn curve_surface(curve: &Curve, surface: &Surface, tol: f64, angular: f64) -> CurveSurface {
    match (curve, surface) {
        (Curve::Line(l), Surface::Plane(p)) => line_plane(l, p, tol, angular),
        (Curve::Line(l), Surface::Sphere(s)) => line_sphere(l, s, tol),
        (Curve::Circle(c), Surface::Plane(p)) => circle_plane(c, p, tol, angular),
        (Curve::Circle(c), Surface::Sphere(s)) => circle_sphere(c, s, tol),
    }
}

// ─── Surface / surface ──────────────────────────────────────────────────────

pub fn plane_plane(p1: &Plane, p2: &Plane, tol: f64, angular: f64) -> SurfaceSurface {
    let u = p1.normal.cross(&p2.normal);
    if u.length() <= angular {
        return if p1.distance_to_point(&p2.origin).abs() <= tol {
            SurfaceSurface::Coincident {
                same_orientation: p1.normal.dot(&p2.normal) > 0.0,
            }
        } else {
            SurfaceSurface::None
        };
    }
    let d1 = p1.normal.dot(&p1.origin.to_vec3());
    let d2 = p2.normal.dot(&p2.origin.to_vec3());
    let origin = (p2.normal * d1 - p1.normal * d2).cross(&u) / u.length_squared();
    SurfaceSurface::Line(Line3d::new(Point3d::ORIGIN + origin, u))
}

pub fn plane_sphere(plane: &Plane, sphere: &Sphere, tol: f64) -> SurfaceSurface {
    let h = plane.distance_to_point(&sphere.center);
    if h.abs() > sphere.radius + tol {
        return SurfaceSurface::None;
    }
    let center = sphere.center - plane.normal * h;
    if (h.abs() - sphere.radius).abs() <= tol {
        return SurfaceSurface::Point(center);
    }
    let radius = (sphere.radius * sphere.radius - h * h).sqrt();
    SurfaceSurface::Circle(Circle3d::with_axes(
        center,
        plane.normal,
        plane.u_axis,
        radius,
    ))
}

pub fn sphere_sphere(s1: &Sphere, s2: &Sphere, tol: f64) -> SurfaceSurface {
    if s1.same_sphere(s2, tol) {
        return SurfaceSurface::Coincident {
            same_orientation: true,
        };
    }
    let offset = s2.center - s1.center;
    let d = offset.length();
    let (r1, r2) = (s1.radius, s2.radius);
    if d <= tol || d > r1 + r2 + tol || d < (r1 - r2).abs() - tol {
        return SurfaceSurface::None;
    }
    let e = offset / d;
    if (d - (r1 + r2)).abs() <= tol {
        return SurfaceSurface::Point(s1.center + e * r1);
    }
    if (d - (r1 - r2).abs()).abs() <= tol {
        let sign = if r1 >= r2 { 1.0 } else { -1.0 };
        return SurfaceSurface::Point(s1.center + e * (r1 * sign));
    }
    let a = (d * d + r1 * r1 - r2 * r2) / (2.0 * d);
    let radius = (r1 * r1 - a * a).max(0.0).sqrt();
    SurfaceSurface::Circle(Circle3d::new(s1.center + e * a, e, radius))
}

pub fn surface_surface(a: &Surface, b: &Surface, tol: f64, angular: f64) -> SurfaceSurface {
    match (a, b) {
        (Surface::Plane(p1), Surface::Plane(p2)) => plane_plane(p1, p2, tol, angular),
        (Surface::Plane(p), Surface::Sphere(s)) | (Surface::Sphere(s), Surface::Plane(p)) => {
            plane_sphere(p, s, tol)
        }
        (Surface::Sphere(s1), Surface::Sphere(s2)) => sphere_sphere(s1, s2, tol),
    }
}

// ─── Refinement ─────────────────────────────────────────────────────────────

/// Gauss-Newton polish of a curve/curve contact seeded at `(t1, t2)`.
///
/// Returns `None` when the residual does not drop below `tol` within
/// [`MAX_REFINE_ITERATIONS`].
pub fn refine_curve_curve<A: CurveEval, B: CurveEval>(
    a: &A,
    b: &B,
    mut t1: f64,
    mut t2: f64,
    tol: f64,
) -> Option<(f64, f64)> {
    for _ in 0..MAX_REFINE_ITERATIONS {
        let r = a.evaluate(t1) - b.evaluate(t2);
        if r.length() <= tol * 1e-3 {
            return Some((t1, t2));
        }
        let da = a.derivative(t1);
        let db = -b.derivative(t2);
        // Normal equations of J = [da, db].
        let (m11, m12, m22) = (da.dot(&da), da.dot(&db), db.dot(&db));
        let (g1, g2) = (da.dot(&r), db.dot(&r));
        let det = m11 * m22 - m12 * m12;
        if det.abs() <= 1e-18 * (m11 * m22).max(1e-300) {
            // Tangent contact: the seed is the best available answer.
            break;
        }
        let s1 = (m22 * g1 - m12 * g2) / det;
        let s2 = (m11 * g2 - m12 * g1) / det;
        t1 -= s1;
        t2 -= s2;
        if s1.abs() + s2.abs() <= 1e-15 {
            break;
        }
    }
    (a.evaluate(t1).distance_to(&b.evaluate(t2)) <= tol).then_some((t1, t2))
}

/// Newton polish of a curve/surface contact seeded at `t`.
pub fn refine_curve_surface<C: CurveEval>(curve: &C, surface: &Surface, mut t: f64, tol: f64) -> Option<f64> {
    let residual = |p: &Point3d| match surface {
        Surface::Plane(plane) => plane.distance_to_point(p),
        Surface::Sphere(s) => s.signed_distance(p),
    };
    for _ in 0..MAX_REFINE_ITERATIONS {
        let p = curve.evaluate(t);
        let f = residual(&p);
        if f.abs() <= tol * 1e-3 {
            return Some(t);
        }
        let grad = surface.normal_at_point(&p);
        let df = grad.dot(&curve.derivative(t));
        if df.abs() <= 1e-12 {
            break;
        }
        let step = f / df;
        t -= step;
        if step.abs() <= 1e-15 {
            break;
        }
    }
    (residual(&curve.evaluate(t)).abs() <= tol).then_some(t)
}
