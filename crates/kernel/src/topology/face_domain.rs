//! Bounded face regions: point-in-face tests, interior points and area
//! integrals for planar and spherical faces.

use std::f64::consts::{PI, TAU};

use super::brep::{EntityStore, FaceId, HalfEdgeId};
use crate::geometry::curves::{Circle3d, Curve};
use crate::geometry::intersection::{curve_curve, CurveCurve};
use crate::geometry::point::{Point2d, Point3d};
use crate::geometry::surfaces::{Plane, Sphere, Surface};
use crate::geometry::vector::Vec3;
use crate::geometry::CurveEval;

/// Where a point lies relative to a closed region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointContainment {
    Inside,
    Boundary,
    Outside,
}

/// A piece of curve traversed from `t_from` to `t_to`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSpan {
    pub curve: Curve,
    pub t_from: f64,
    pub t_to: f64,
}

impl CurveSpan {
    pub fn new(curve: Curve, t_from: f64, t_to: f64) -> Self {
        Self { curve, t_from, t_to }
    }

    pub fn start(&self) -> Point3d {
        self.curve.evaluate(self.t_from)
    }

    pub fn end(&self) -> Point3d {
        self.curve.evaluate(self.t_to)
    }

    pub fn midpoint(&self) -> Point3d {
        self.point_at(0.5)
    }

    pub fn point_at(&self, s: f64) -> Point3d {
        self.curve.evaluate(self.t_from + (self.t_to - self.t_from) * s)
    }

    /// Distance from `p` to the traced piece of curve.
    pub fn distance_to(&self, p: &Point3d) -> f64 {
        let (lo, hi) = (self.t_from.min(self.t_to), self.t_from.max(self.t_to));
        match self.curve.parameter_in_range(p, lo, hi, 0.0) {
            Some(t) => self.curve.evaluate(t).distance_to(p),
            None => p.distance_to(&self.start()).min(p.distance_to(&self.end())),
        }
    }

    fn is_full_turn(&self) -> bool {
        self.curve
            .period()
            .is_some_and(|period| ((self.t_to - self.t_from).abs() - period).abs() < 1e-9)
    }

    /// Unit tangent in traversal direction at fraction `s` of the span.
    pub fn tangent_at(&self, s: f64) -> Vec3 {
        let t = self.t_from + (self.t_to - self.t_from) * s;
        let tangent = self.curve.tangent(t);
        if self.t_to < self.t_from { -tangent } else { tangent }
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.curve, self.t_to, self.t_from)
    }
}

/// Span of a stored half-edge in its traversal order.
pub fn half_edge_span(store: &EntityStore, he_id: HalfEdgeId) -> CurveSpan {
    let (t_from, t_to) = store.half_edge_range(he_id);
    CurveSpan::new(store.edges[store.half_edges[he_id].edge].curve, t_from, t_to)
}

/// Loops of a stored face as spans, outer loop first.
pub fn face_spans(store: &EntityStore, face_id: FaceId) -> Vec<Vec<CurveSpan>> {
    store
        .face_loops(face_id)
        .map(|l| store.loops[l].half_edges.iter().map(|&he| half_edge_span(store, he)).collect())
        .collect()
}

// ─── Planar Regions ─────────────────────────────────────────────────────────

/// Orthonormal frame of a planar face, right-handed about the face normal
/// (not the surface normal).
#[derive(Debug, Clone, Copy)]
pub struct PlaneFrame {
    pub origin: Point3d,
    pub u: Vec3,
    pub v: Vec3,
    pub normal: Vec3,
}

impl PlaneFrame {
    pub fn new(plane: &Plane, same_sense: bool) -> Self {
        if same_sense {
            Self {
                origin: plane.origin,
                u: plane.u_axis,
                v: plane.v_axis,
                normal: plane.normal,
            }
        } else {
            Self {
                origin: plane.origin,
                u: plane.u_axis,
                v: -plane.v_axis,
                normal: -plane.normal,
            }
        }
    }

    pub fn to_2d(&self, p: &Point3d) -> Point2d {
        let d = *p - self.origin;
        Point2d::new(d.dot(&self.u), d.dot(&self.v))
    }

    pub fn dir_to_2d(&self, d: &Vec3) -> Point2d {
        Point2d::new(d.dot(&self.u), d.dot(&self.v))
    }

    pub fn to_3d(&self, p: &Point2d) -> Point3d {
        self.origin + self.u * p.x + self.v * p.y
    }
}

/// A boundary curve piece in a plane frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Edge2d {
    Segment {
        a: Point2d,
        b: Point2d,
    },
    /// `center + radius * (x cos t + y sin t)` for t from `t0` to `t1`.
    Arc {
        center: Point2d,
        radius: f64,
        x: Point2d,
        y: Point2d,
        t0: f64,
        t1: f64,
    },
}

impl Edge2d {
    pub fn from_span(frame: &PlaneFrame, span: &CurveSpan) -> Self {
        match span.curve {
            Curve::Line(_) => Edge2d::Segment {
                a: frame.to_2d(&span.start()),
                b: frame.to_2d(&span.end()),
            },
            Curve::Circle(c) => Edge2d::Arc {
                center: frame.to_2d(&c.center),
                radius: c.radius,
                x: frame.dir_to_2d(&c.x_axis),
                y: frame.dir_to_2d(&c.y_axis()),
                t0: span.t_from,
                t1: span.t_to,
            },
        }
    }

    fn arc_point(center: Point2d, radius: f64, x: Point2d, y: Point2d, t: f64) -> Point2d {
        let (s, c) = t.sin_cos();
        center + (x * c + y * s) * radius
    }

    pub fn point_at(&self, s: f64) -> Point2d {
        match *self {
            Edge2d::Segment { a, b } => a + (b - a) * s,
            Edge2d::Arc { center, radius, x, y, t0, t1 } => Self::arc_point(center, radius, x, y, t0 + (t1 - t0) * s),
        }
    }

    pub fn start(&self) -> Point2d {
        self.point_at(0.0)
    }

    pub fn end(&self) -> Point2d {
        self.point_at(1.0)
    }

    /// Derivative with respect to the fraction `s` (traversal direction).
    pub fn tangent_at(&self, s: f64) -> Point2d {
        match *self {
            Edge2d::Segment { a, b } => b - a,
            Edge2d::Arc { radius, x, y, t0, t1, .. } => {
                let (sin, cos) = (t0 + (t1 - t0) * s).sin_cos();
                (y * cos - x * sin) * (radius * (t1 - t0))
            }
        }
    }

    /// Points along the edge with both ends included; arcs are sampled
    /// densely, with every sample exactly on the arc.
    pub fn polyline(&self) -> Vec<Point2d> {
        match *self {
            Edge2d::Segment { a, b } => vec![a, b],
            Edge2d::Arc { t0, t1, .. } => {
                let n = ((t1 - t0).abs() / TAU * 128.0).ceil().max(4.0) as usize;
                (0..=n).map(|i| self.point_at(i as f64 / n as f64)).collect()
            }
        }
    }

    pub fn distance_to(&self, p: &Point2d) -> f64 {
        match *self {
            Edge2d::Segment { a, b } => segment_distance(p, &a, &b),
            Edge2d::Arc { center, radius, x, y, t0, t1 } => {
                let d = *p - center;
                let phi = d.dot(&y).atan2(d.dot(&x));
                let (lo, hi) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
                let wrapped = lo + (phi - lo).rem_euclid(TAU);
                if wrapped <= hi {
                    (d.length() - radius).abs()
                } else {
                    p.distance_to(&self.start()).min(p.distance_to(&self.end()))
                }
            }
        }
    }

    /// Contribution to the signed area of a closed loop: `1/2 ∮ (x dy - y dx)`.
    pub fn signed_area(&self) -> f64 {
        match *self {
            Edge2d::Segment { a, b } => 0.5 * a.cross(&b),
            Edge2d::Arc { center, radius, x, y, t0, t1 } => {
                let linear = center.cross(&x) * (t1.cos() - t0.cos()) + center.cross(&y) * (t1.sin() - t0.sin());
                0.5 * (radius * linear + radius * radius * x.cross(&y) * (t1 - t0))
            }
        }
    }

    /// Angle swept around `p` while traversing the edge. `p` must not lie
    /// on the edge.
    fn swept_angle(&self, p: &Point2d) -> f64 {
        match *self {
            Edge2d::Segment { a, b } => chord_angle(p, &a, &b),
            Edge2d::Arc { center, radius, x, y, t0, t1 } => {
                let orientation = x.cross(&y).signum() * (t1 - t0).signum();
                let inside_circle = p.distance_to(&center) < radius;
                let pts = self.polyline();
                pts.windows(2)
                    .map(|w| {
                        let chord = chord_angle(p, &w[0], &w[1]);
                        // Between chord and arc the arc passes on the far side of p.
                        let dir = w[1] - w[0];
                        let beyond = dir.cross(&(*p - w[0])) * dir.cross(&(center - w[0])) < 0.0;
                        if inside_circle && beyond { chord + TAU * orientation } else { chord }
                    })
                    .sum()
            }
        }
    }

    /// Parameters `λ` where `origin + λ dir` meets the edge. Collinear
    /// segments report their endpoints.
    pub fn line_crossings(&self, origin: &Point2d, dir: &Point2d, tol: f64) -> Vec<f64> {
        let dd = dir.dot(dir);
        match *self {
            Edge2d::Segment { a, b } => {
                let e = b - a;
                let denom = dir.cross(&e);
                let elen = e.length();
                if denom.abs() <= 1e-12 * elen * dd.sqrt() {
                    let offset = (a - *origin).cross(dir).abs() / dd.sqrt();
                    if offset <= tol {
                        return vec![(a - *origin).dot(dir) / dd, (b - *origin).dot(dir) / dd];
                    }
                    return Vec::new();
                }
                let w = a - *origin;
                let lambda = w.cross(&e) / denom;
                let s = w.cross(dir) / denom;
                let stol = tol / elen.max(1e-300);
                if s >= -stol && s <= 1.0 + stol { vec![lambda] } else { Vec::new() }
            }
            Edge2d::Arc { center, radius, .. } => {
                let w = *origin - center;
                let b = w.dot(dir);
                let c = w.dot(&w) - radius * radius;
                let disc = b * b - dd * c;
                if disc < -tol * radius * dd {
                    return Vec::new();
                }
                let root = disc.max(0.0).sqrt();
                let mut out = Vec::new();
                for lambda in [(-b - root) / dd, (-b + root) / dd] {
                    let q = *origin + *dir * lambda;
                    if self.distance_to(&q) <= tol * 10.0 && !out.iter().any(|&l: &f64| (l - lambda).abs() * dd.sqrt() <= tol) {
                        out.push(lambda);
                    }
                }
                out
            }
        }
    }
}

fn segment_distance(p: &Point2d, a: &Point2d, b: &Point2d) -> f64 {
    let ab = *b - *a;
    let len2 = ab.dot(&ab);
    if len2 < 1e-300 {
        return p.distance_to(a);
    }
    let s = ((*p - *a).dot(&ab) / len2).clamp(0.0, 1.0);
    p.distance_to(&(*a + ab * s))
}

fn chord_angle(p: &Point2d, a: &Point2d, b: &Point2d) -> f64 {
    let pa = *a - *p;
    let pb = *b - *p;
    pa.cross(&pb).atan2(pa.dot(&pb))
}

/// Winding number of closed 2D loops around `p`, which must not lie on them.
pub fn winding_number(loops: &[Vec<Edge2d>], p: &Point2d) -> f64 {
    loops.iter().flatten().map(|e| e.swept_angle(p)).sum::<f64>() / TAU
}

/// True when `p` lies strictly inside one closed 2D loop.
pub fn loop_contains(edges: &[Edge2d], p: &Point2d, tol: f64) -> bool {
    !edges.iter().any(|e| e.distance_to(p) <= tol)
        && edges.iter().map(|e| e.swept_angle(p)).sum::<f64>().abs() > PI
}

fn circumcenter(a: &Point2d, b: &Point2d, c: &Point2d) -> Option<Point2d> {
    let (b, c) = (*b - *a, *c - *a);
    let d = 2.0 * b.cross(&c);
    if d.abs() <= 1e-14 * b.length() * c.length() {
        return None;
    }
    let (bb, cc) = (b.dot(&b), c.dot(&c));
    Some(*a + Point2d::new(c.y * bb - b.y * cc, b.x * cc - c.x * bb) * (1.0 / d))
}

/// A planar face region: loops of 2D edges in the face frame, outer loops
/// counter-clockwise and holes clockwise.
#[derive(Debug, Clone)]
pub struct PlanarDomain {
    pub frame: PlaneFrame,
    pub spans: Vec<Vec<CurveSpan>>,
    pub loops: Vec<Vec<Edge2d>>,
    pub tolerance: f64,
}

impl PlanarDomain {
    pub fn from_spans(plane: &Plane, same_sense: bool, loops: &[Vec<CurveSpan>], tolerance: f64) -> Self {
        let frame = PlaneFrame::new(plane, same_sense);
        let flat = loops
            .iter()
            .map(|l| l.iter().map(|s| Edge2d::from_span(&frame, s)).collect())
            .collect();
        Self {
            frame,
            spans: loops.to_vec(),
            loops: flat,
            tolerance,
        }
    }

    pub fn classify_2d(&self, p: &Point2d) -> PointContainment {
        if self.loops.iter().flatten().any(|e| e.distance_to(p) <= self.tolerance) {
            return PointContainment::Boundary;
        }
        if winding_number(&self.loops, p).abs() > 0.5 {
            PointContainment::Inside
        } else {
            PointContainment::Outside
        }
    }

    /// Signed area; positive for a well-formed face.
    pub fn area(&self) -> f64 {
        self.loops.iter().flatten().map(|e| e.signed_area()).sum()
    }

    /// Sorted parameter intervals where the line `origin + λ dir` (in 2D)
    /// lies in the closed region.
    pub fn line_intervals(&self, origin: &Point2d, dir: &Point2d) -> Vec<(f64, f64)> {
        let step = self.tolerance / dir.length().max(1e-300);
        let mut cuts: Vec<f64> = self
            .loops
            .iter()
            .flatten()
            .flat_map(|e| e.line_crossings(origin, dir, self.tolerance))
            .collect();
        cuts.sort_by(f64::total_cmp);
        cuts.dedup_by(|a, b| (*a - *b).abs() <= step);

        let mut intervals: Vec<(f64, f64)> = Vec::new();
        for w in cuts.windows(2) {
            let mid = *origin + *dir * (0.5 * (w[0] + w[1]));
            if self.classify_2d(&mid) == PointContainment::Outside {
                continue;
            }
            match intervals.last_mut() {
                Some(last) if (last.1 - w[0]).abs() <= step => last.1 = w[1],
                _ => intervals.push((w[0], w[1])),
            }
        }
        intervals
    }

    /// A point well inside the region, found by scanning horizontal lines
    /// and taking the midpoint of the widest interior interval.
    pub fn interior_point_2d(&self) -> Option<Point2d> {
        let pts: Vec<Point2d> = self.loops.iter().flatten().flat_map(|e| e.polyline()).collect();
        let (ymin, ymax) = pts
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
        if ymax - ymin <= self.tolerance {
            return None;
        }
        let segments: Vec<(Point2d, Point2d)> = self
            .loops
            .iter()
            .flatten()
            .flat_map(|e| {
                let poly = e.polyline();
                poly.windows(2).map(|w| (w[0], w[1])).collect::<Vec<_>>()
            })
            .collect();

        let mut candidates: Vec<(f64, Point2d)> = Vec::new();
        for frac in [0.5, 0.3, 0.7, 0.1, 0.9, 0.2, 0.4, 0.6, 0.8, 0.05, 0.95] {
            let y = ymin + (ymax - ymin) * frac;
            let mut xs: Vec<f64> = segments
                .iter()
                .filter(|(a, b)| (a.y > y) != (b.y > y))
                .map(|(a, b)| a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y))
                .collect();
            xs.sort_by(f64::total_cmp);
            for w in xs.windows(2) {
                candidates.push((w[1] - w[0], Point2d::new(0.5 * (w[0] + w[1]), y)));
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
        candidates
            .into_iter()
            .map(|(_, p)| p)
            .find(|p| self.classify_2d(p) == PointContainment::Inside)
    }
}

// ─── Spherical Regions ──────────────────────────────────────────────────────

/// Pole directions tried by [`SphereChart::new`].
const POLE_CANDIDATES: usize = 64;

/// Lattice directions tried when looking for a spherical interior point.
const INTERIOR_CANDIDATES: usize = 200;

/// The six axis directions followed by a Fibonacci lattice of `n` unit
/// vectors.
fn sphere_directions(n: usize) -> Vec<Vec3> {
    let mut dirs = vec![Vec3::Z, -Vec3::Z, Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y];
    let golden = PI * (3.0 - 5f64.sqrt());
    dirs.extend((0..n).map(|i| {
        let z = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
        let rho = (1.0 - z * z).sqrt();
        let theta = golden * i as f64;
        Vec3::new(rho * theta.cos(), rho * theta.sin(), z)
    }));
    dirs
}

/// Stereographic chart of a sphere, projected from the pole
/// `center + radius * pole`. It is conformal, keeps the face normal's
/// orientation, and maps circles that miss the pole to circles.
#[derive(Debug, Clone, Copy)]
pub struct SphereChart {
    pub sphere: Sphere,
    pub pole: Vec3,
    u: Vec3,
    v: Vec3,
}

impl SphereChart {
    /// Chart whose pole stays as far as possible from every circle plane.
    pub fn new(sphere: &Sphere, same_sense: bool, circles: &[Circle3d]) -> Self {
        let clearance = |a: &Vec3| {
            circles
                .iter()
                .map(|c| (a.dot(&c.normal) - (c.center - sphere.center).dot(&c.normal) / sphere.radius).abs())
                .fold(f64::INFINITY, f64::min)
        };
        let mut pole = Vec3::Z;
        let mut best = f64::NEG_INFINITY;
        for a in sphere_directions(POLE_CANDIDATES) {
            let c = clearance(&a);
            if c > best {
                best = c;
                pole = a;
            }
        }
        let u = pole.any_perpendicular();
        let v = if same_sense { u.cross(&pole) } else { pole.cross(&u) };
        Self {
            sphere: *sphere,
            pole,
            u,
            v,
        }
    }

    pub fn pole_point(&self) -> Point3d {
        self.sphere.center + self.pole * self.sphere.radius
    }

    /// True when `p` projects onto the pole, which has no image.
    pub fn at_pole(&self, p: &Point3d) -> bool {
        1.0 - self.sphere.normal_at_point(p).dot(&self.pole) < 1e-12
    }

    pub fn to_2d(&self, p: &Point3d) -> Point2d {
        let w = self.sphere.normal_at_point(p);
        let k = self.sphere.radius / (1.0 - w.dot(&self.pole)).max(1e-300);
        Point2d::new(w.dot(&self.u) * k, w.dot(&self.v) * k)
    }

    pub fn to_3d(&self, q: &Point2d) -> Point3d {
        let r = self.sphere.radius;
        let (x, y) = (q.x / r, q.y / r);
        let s = x * x + y * y;
        let w = (self.u * (2.0 * x) + self.v * (2.0 * y) + self.pole * (s - 1.0)) / (s + 1.0);
        self.sphere.center + w * r
    }

    /// Image of a boundary span. Arcs are fitted through three image
    /// points; the middle one fixes the sweep direction.
    pub fn edge(&self, span: &CurveSpan) -> Edge2d {
        let closed = span.is_full_turn();
        let fractions = if closed { [0.0, 1.0 / 3.0, 2.0 / 3.0] } else { [0.0, 0.5, 1.0] };
        let [p0, pm, p1] = fractions.map(|s| self.to_2d(&span.point_at(s)));
        let (Curve::Circle(_), Some(center)) = (span.curve, circumcenter(&p0, &pm, &p1)) else {
            return Edge2d::Segment {
                a: self.to_2d(&span.start()),
                b: self.to_2d(&span.end()),
            };
        };
        let ccw = (pm - p0).cross(&(p1 - pm)) > 0.0;
        let t0 = (p0 - center).angle();
        let sweep = ((p1 - center).angle() - t0).rem_euclid(TAU);
        let t1 = match (closed, ccw) {
            (true, true) => t0 + TAU,
            (true, false) => t0 - TAU,
            (false, true) => t0 + sweep,
            (false, false) => t0 + sweep - TAU,
        };
        Edge2d::Arc {
            center,
            radius: p0.distance_to(&center),
            x: Point2d::new(1.0, 0.0),
            y: Point2d::new(0.0, 1.0),
            t0,
            t1,
        }
    }
}

/// `∮ (p - origin) × dp` along a span.
fn span_moment(span: &CurveSpan, origin: &Point3d) -> Vec3 {
    match span.curve {
        Curve::Line(_) => (span.start() - *origin).cross(&(span.end() - *origin)),
        Curve::Circle(k) => {
            let (t0, t1) = (span.t_from, span.t_to);
            let chord = k.x_axis * (t1.cos() - t0.cos()) + k.y_axis() * (t1.sin() - t0.sin());
            (k.center - *origin).cross(&chord) * k.radius + k.normal * (k.radius * k.radius * (t1 - t0))
        }
    }
}

/// A region of a sphere bounded by loops of circle arcs (none for the
/// whole sphere). Loops keep the region on their left seen from the face
/// normal. Containment is decided in a stereographic chart: the region is
/// where the winding number of the charted loops plus one for a region
/// holding the pole equals one.
#[derive(Debug, Clone)]
pub struct SphericalDomain {
    pub sphere: Sphere,
    pub same_sense: bool,
    pub spans: Vec<Vec<CurveSpan>>,
    pub chart: SphereChart,
    pub loops: Vec<Vec<Edge2d>>,
    pub contains_pole: bool,
    pub tolerance: f64,
}

impl SphericalDomain {
    pub fn from_spans(sphere: &Sphere, same_sense: bool, loops: &[Vec<CurveSpan>], tolerance: f64) -> Self {
        let circles: Vec<Circle3d> = loops
            .iter()
            .flatten()
            .filter_map(|s| match s.curve {
                Curve::Circle(c) => Some(c),
                Curve::Line(_) => None,
            })
            .collect();
        let chart = SphereChart::new(sphere, same_sense, &circles);
        let flat: Vec<Vec<Edge2d>> = loops.iter().map(|l| l.iter().map(|s| chart.edge(s)).collect()).collect();
        // Seen from the pole the loops run clockwise around a region
        // holding it.
        let signed: f64 = flat.iter().flatten().map(Edge2d::signed_area).sum();
        Self {
            sphere: *sphere,
            same_sense,
            spans: loops.to_vec(),
            chart,
            contains_pole: flat.is_empty() || signed < 0.0,
            loops: flat,
            tolerance,
        }
    }

    fn project(&self, p: &Point3d) -> Point3d {
        self.sphere.center + self.sphere.normal_at_point(p) * self.sphere.radius
    }

    fn face_normal(&self, p: &Point3d) -> Vec3 {
        let n = self.sphere.normal_at_point(p);
        if self.same_sense { n } else { -n }
    }

    fn boundary_distance(&self, q: &Point3d) -> f64 {
        self.spans
            .iter()
            .flatten()
            .map(|s| s.distance_to(q))
            .fold(f64::INFINITY, f64::min)
    }

    /// Containment of a sphere point known to be off the boundary.
    fn encloses(&self, q: &Point3d) -> bool {
        if self.chart.at_pole(q) {
            return self.contains_pole;
        }
        let winding = winding_number(&self.loops, &self.chart.to_2d(q)).round() as i64;
        winding + i64::from(self.contains_pole) == 1
    }

    pub fn classify(&self, p: &Point3d) -> PointContainment {
        let q = self.project(p);
        if self.boundary_distance(&q) <= self.tolerance {
            PointContainment::Boundary
        } else if self.encloses(&q) {
            PointContainment::Inside
        } else {
            PointContainment::Outside
        }
    }

    /// The candidate farthest from the boundary among lattice points, the
    /// pole, and points stepped off each boundary arc to its left.
    pub fn interior_point(&self) -> Option<Point3d> {
        let (c, r) = (self.sphere.center, self.sphere.radius);
        let mut candidates: Vec<Point3d> = Vec::new();
        if self.contains_pole {
            candidates.push(self.chart.pole_point());
        }
        candidates.extend(sphere_directions(INTERIOR_CANDIDATES).into_iter().map(|d| c + d * r));
        for span in self.spans.iter().flatten() {
            for s in [0.25, 0.5, 0.75] {
                let p = span.point_at(s);
                let left = self.face_normal(&p).cross(&span.tangent_at(s));
                for step in [0.3, 0.1, 0.03, 0.01] {
                    candidates.push(self.project(&(p + left * (step * r))));
                }
            }
        }
        candidates
            .into_iter()
            .map(|q| (self.boundary_distance(&q), q))
            .filter(|(d, q)| *d > self.tolerance && self.encloses(q))
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, q)| q)
    }

    /// Unsigned area from Gauss-Bonnet: on a sphere of radius `r` the
    /// boundary turning (geodesic curvature along the arcs plus the corner
    /// angles) equals `2π χ - A / r²`.
    pub fn area(&self) -> f64 {
        let r = self.sphere.radius;
        let mut turning = 0.0;
        for l in &self.spans {
            for (k, span) in l.iter().enumerate() {
                if let Curve::Circle(circle) = span.curve {
                    let p = span.midpoint();
                    let left = self.face_normal(&p).cross(&span.tangent_at(0.5));
                    turning += (circle.center - p).dot(&left) / circle.radius * (span.t_to - span.t_from).abs();
                }
                let next = &l[(k + 1) % l.len()];
                let (t_in, t_out) = (span.tangent_at(1.0), next.tangent_at(0.0));
                let n = self.face_normal(&next.start());
                turning += t_in.cross(&t_out).dot(&n).atan2(t_in.dot(&t_out));
            }
        }
        let euler = 2.0 - self.spans.len() as f64;
        r * r * (TAU * euler - turning)
    }

    /// `∫ N dA` over the region with `N` the outward sphere normal, from
    /// the vector area `1/2 ∮ (p - c) × dp` of the boundary.
    pub fn normal_integral(&self) -> Vec3 {
        let c = self.sphere.center;
        let along_face = self
            .spans
            .iter()
            .flatten()
            .fold(Vec3::ZERO, |acc, s| acc + span_moment(s, &c))
            * 0.5;
        if self.same_sense { along_face } else { -along_face }
    }
}

// ─── Face Domains ───────────────────────────────────────────────────────────

/// Flat image of a face's surface, oriented about the face normal.
#[derive(Debug, Clone, Copy)]
pub enum FaceChart {
    Plane(PlaneFrame),
    Sphere(SphereChart),
}

impl FaceChart {
    pub fn edge(&self, span: &CurveSpan) -> Edge2d {
        match self {
            FaceChart::Plane(frame) => Edge2d::from_span(frame, span),
            FaceChart::Sphere(chart) => chart.edge(span),
        }
    }
}

/// Fold an interval ending at the seam into the one starting there.
/// Intervals are sorted by start, which lies in `[0, 2π)`.
pub(crate) fn join_wrapped(intervals: &mut Vec<(f64, f64)>, step: f64) {
    if intervals.len() < 2 {
        return;
    }
    let (first, last) = (intervals[0], intervals[intervals.len() - 1]);
    if (last.1 - (first.0 + TAU)).abs() <= step {
        intervals.pop();
        intervals[0] = (last.0, first.1 + TAU);
        intervals.rotate_left(1);
    }
}

#[derive(Debug, Clone)]
pub enum FaceDomain {
    Planar(PlanarDomain),
    Spherical(SphericalDomain),
}

impl FaceDomain {
    pub fn from_spans(surface: &Surface, same_sense: bool, loops: &[Vec<CurveSpan>], tolerance: f64) -> Self {
        match surface {
            Surface::Plane(p) => FaceDomain::Planar(PlanarDomain::from_spans(p, same_sense, loops, tolerance)),
            Surface::Sphere(s) => {
                FaceDomain::Spherical(SphericalDomain::from_spans(s, same_sense, loops, tolerance))
            }
        }
    }

    pub fn from_face(store: &EntityStore, face_id: FaceId, tolerance: f64) -> Self {
        let face = &store.faces[face_id];
        Self::from_spans(&face.surface, face.same_sense, &face_spans(store, face_id), tolerance)
    }

    /// Boundary loops in 3D, in the order they were given.
    pub fn spans(&self) -> &[Vec<CurveSpan>] {
        match self {
            FaceDomain::Planar(d) => &d.spans,
            FaceDomain::Spherical(d) => &d.spans,
        }
    }

    pub fn tolerance(&self) -> f64 {
        match self {
            FaceDomain::Planar(d) => d.tolerance,
            FaceDomain::Spherical(d) => d.tolerance,
        }
    }

    /// Angle intervals where a circle lying in the surface stays in the
    /// closed region. Each interval starts in `[0, 2π)` and spans at most
    /// one turn; a circle wholly in the region comes back as one full turn.
    pub fn circle_intervals(&self, circle: &Circle3d, angular: f64) -> Vec<(f64, f64)> {
        let tol = self.tolerance();
        let step = tol / circle.radius.max(1e-300);
        let curve = Curve::Circle(*circle);
        let mut cuts: Vec<f64> = Vec::new();
        for span in self.spans().iter().flatten() {
            let CurveCurve::Points(hits) = curve_curve(&curve, &span.curve, tol, angular) else {
                continue;
            };
            let (lo, hi) = (span.t_from.min(span.t_to), span.t_from.max(span.t_to));
            let ptol = match span.curve {
                Curve::Circle(c) => tol / c.radius.max(1e-300),
                Curve::Line(_) => tol,
            };
            cuts.extend(
                hits.iter()
                    .filter(|h| span.curve.parameter_in_range(&h.point, lo, hi, ptol).is_some())
                    .map(|h| h.t1.rem_euclid(TAU)),
            );
        }
        cuts.sort_by(f64::total_cmp);
        cuts.dedup_by(|a, b| (*a - *b).abs() <= step);
        if cuts.len() > 1 && cuts[0] + TAU - cuts[cuts.len() - 1] <= step {
            cuts.pop();
        }

        let kept = |t: f64| self.classify(&circle.evaluate(t)) != PointContainment::Outside;
        if cuts.is_empty() {
            return if kept(0.0) { vec![(0.0, TAU)] } else { Vec::new() };
        }
        let mut intervals: Vec<(f64, f64)> = Vec::new();
        for (k, &t0) in cuts.iter().enumerate() {
            let t1 = cuts.get(k + 1).copied().unwrap_or(cuts[0] + TAU);
            if !kept(0.5 * (t0 + t1)) {
                continue;
            }
            match intervals.last_mut() {
                Some(last) if (last.1 - t0).abs() <= step => last.1 = t1,
                _ => intervals.push((t0, t1)),
            }
        }
        join_wrapped(&mut intervals, step);
        intervals
    }

    /// Containment of the point's projection onto the surface.
    pub fn classify(&self, p: &Point3d) -> PointContainment {
        match self {
            FaceDomain::Planar(d) => d.classify_2d(&d.frame.to_2d(p)),
            FaceDomain::Spherical(d) => d.classify(p),
        }
    }

    pub fn interior_point(&self) -> Option<Point3d> {
        match self {
            FaceDomain::Planar(d) => d.interior_point_2d().map(|p| d.frame.to_3d(&p)),
            FaceDomain::Spherical(d) => d.interior_point(),
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            FaceDomain::Planar(d) => d.area(),
            FaceDomain::Spherical(d) => d.area(),
        }
    }

    /// `∫ p . n dA` with `n` the face normal; a third of the sum over a
    /// closed shell is its enclosed volume.
    pub fn volume_moment(&self) -> f64 {
        match self {
            FaceDomain::Planar(d) => d.frame.normal.dot(&d.frame.origin.to_vec3()) * d.area(),
            FaceDomain::Spherical(d) => {
                let s = &d.sphere;
                let m = s.center.to_vec3().dot(&d.normal_integral()) + s.radius * d.area();
                if d.same_sense { m } else { -m }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::curves::Line3d;
    use crate::topology::primitives::make_box;

    fn unit_square() -> PlanarDomain {
        let pts = [
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(1.0, 0.0, 0.0),
            Point3d::new(1.0, 1.0, 0.0),
            Point3d::new(0.0, 1.0, 0.0),
        ];
        let spans: Vec<CurveSpan> = (0..4)
            .map(|i| {
                let (a, b) = (pts[i], pts[(i + 1) % 4]);
                let line = Line3d::from_points(a, b).unwrap();
                CurveSpan::new(Curve::Line(line), 0.0, a.distance_to(&b))
            })
            .collect();
        PlanarDomain::from_spans(&Plane::xy(), true, &[spans], 1e-7)
    }

    fn disk(radius: f64, same_sense: bool) -> PlanarDomain {
        let circle = Circle3d::with_axes(Point3d::ORIGIN, Vec3::Z, Vec3::X, radius);
        let span = if same_sense {
            CurveSpan::new(Curve::Circle(circle), 0.0, TAU)
        } else {
            CurveSpan::new(Curve::Circle(circle), TAU, 0.0)
        };
        PlanarDomain::from_spans(&Plane::xy(), same_sense, &[vec![span]], 1e-7)
    }

    #[test]
    fn test_square_classification() {
        let d = unit_square();
        assert_eq!(d.classify_2d(&Point2d::new(0.5, 0.5)), PointContainment::Inside);
        assert_eq!(d.classify_2d(&Point2d::new(1.5, 0.5)), PointContainment::Outside);
        assert_eq!(d.classify_2d(&Point2d::new(1.0, 0.5)), PointContainment::Boundary);
        assert!((d.area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_disk_area_is_exact() {
        let d = disk(2.0, true);
        assert!((d.area() - 4.0 * PI).abs() < 1e-12, "area = {}", d.area());
        let reversed = disk(2.0, false);
        assert!((reversed.area() - 4.0 * PI).abs() < 1e-12, "area = {}", reversed.area());
    }

    #[test]
    fn test_disk_classification_near_arc() {
        let d = disk(1.0, true);
        // Inside the circle but outside the sampled chord polygon.
        let p = Point2d::new((TAU / 256.0).cos() * 0.99999, (TAU / 256.0).sin() * 0.99999);
        assert_eq!(d.classify_2d(&p), PointContainment::Inside);
        assert_eq!(d.classify_2d(&Point2d::new(1.00001, 0.0)), PointContainment::Outside);
    }

    #[test]
    fn test_line_intervals_clip_square() {
        let d = unit_square();
        let iv = d.line_intervals(&Point2d::new(-1.0, 0.5), &Point2d::new(1.0, 0.0));
        assert_eq!(iv.len(), 1);
        assert!((iv[0].0 - 1.0).abs() < 1e-9 && (iv[0].1 - 2.0).abs() < 1e-9);
        let along_edge = d.line_intervals(&Point2d::new(-1.0, 0.0), &Point2d::new(1.0, 0.0));
        assert_eq!(along_edge.len(), 1);
        assert!(d.line_intervals(&Point2d::new(-1.0, 2.0), &Point2d::new(1.0, 0.0)).is_empty());
    }

    #[test]
    fn test_line_intervals_clip_disk() {
        let d = disk(1.0, true);
        let iv = d.line_intervals(&Point2d::new(-2.0, 0.0), &Point2d::new(1.0, 0.0));
        assert_eq!(iv.len(), 1);
        assert!((iv[0].0 - 1.0).abs() < 1e-9 && (iv[0].1 - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_interior_point_is_inside() {
        let d = unit_square();
        let p = d.interior_point_2d().unwrap();
        assert_eq!(d.classify_2d(&p), PointContainment::Inside);
    }

    #[test]
    fn test_box_face_domains_sum_to_volume() {
        let mut store = EntityStore::new();
        let solid = make_box(&mut store, 1.0, 2.0, 3.0, 3.0, 5.0, 7.0).unwrap();
        let moment: f64 = store
            .solid_faces(solid)
            .into_iter()
            .map(|f| FaceDomain::from_face(&store, f, 1e-7).volume_moment())
            .sum();
        assert!((moment / 3.0 - 24.0).abs() < 1e-9, "volume = {}", moment / 3.0);
    }

    #[test]
    fn test_circle_intervals_on_square() {
        let d = FaceDomain::Planar(unit_square());
        let corner = Circle3d::with_axes(Point3d::ORIGIN, Vec3::Z, Vec3::X, 0.5);
        let iv = d.circle_intervals(&corner, 1e-9);
        assert_eq!(iv.len(), 1);
        assert!(iv[0].0.abs() < 1e-9 && (iv[0].1 - PI / 2.0).abs() < 1e-9, "{iv:?}");

        let around = Circle3d::with_axes(Point3d::new(0.5, 0.5, 0.0), Vec3::Z, Vec3::X, 2.0);
        assert!(d.circle_intervals(&around, 1e-9).is_empty());
        let within = Circle3d::with_axes(Point3d::new(0.5, 0.5, 0.0), Vec3::Z, Vec3::X, 0.2);
        assert_eq!(d.circle_intervals(&within, 1e-9), vec![(0.0, TAU)]);
    }

    #[test]
    fn test_circle_intervals_join_across_seam() {
        let d = FaceDomain::Planar(unit_square());
        // The right half of a circle on the left edge, which straddles t = 0.
        let edge_circle = Circle3d::with_axes(Point3d::new(0.0, 0.5, 0.0), Vec3::Z, Vec3::X, 0.25);
        let iv = d.circle_intervals(&edge_circle, 1e-9);
        assert_eq!(iv.len(), 1);
        assert!((iv[0].0 - 1.5 * PI).abs() < 1e-9 && (iv[0].1 - 2.5 * PI).abs() < 1e-9, "{iv:?}");
    }

    #[test]
    fn test_sphere_chart_maps_circles_to_circles() {
        let sphere = Sphere::new(Point3d::new(1.0, -2.0, 0.5), 2.0);
        let circle = Circle3d::new(Point3d::new(1.0, -2.0, 1.5), Vec3::new(0.0, 0.0, 1.0), 3f64.sqrt());
        let chart = SphereChart::new(&sphere, true, &[circle]);
        let span = CurveSpan::new(Curve::Circle(circle), 0.3, 2.9);
        let edge = chart.edge(&span);
        for s in [0.1, 0.25, 0.8] {
            let p = span.point_at(s);
            assert!(edge.distance_to(&chart.to_2d(&p)) < 1e-9);
            assert!(chart.to_3d(&chart.to_2d(&p)).distance_to(&p) < 1e-9);
        }
        assert!(edge.start().distance_to(&chart.to_2d(&span.start())) < 1e-9);
        assert!(edge.end().distance_to(&chart.to_2d(&span.end())) < 1e-9);
    }

    #[test]
    fn test_spherical_cap_area_and_classification() {
        let sphere = Sphere::new(Point3d::ORIGIN, 1.0);
        // Equator traversed counter-clockwise about +Z bounds the northern cap.
        let equator = Circle3d::with_axes(Point3d::ORIGIN, Vec3::Z, Vec3::X, 1.0);
        let span = CurveSpan::new(Curve::Circle(equator), 0.0, TAU);
        let d = SphericalDomain::from_spans(&sphere, true, &[vec![span]], 1e-7);
        assert_eq!(d.classify(&Point3d::new(0.0, 0.0, 1.0)), PointContainment::Inside);
        assert_eq!(d.classify(&Point3d::new(0.0, 0.0, -1.0)), PointContainment::Outside);
        assert_eq!(d.classify(&Point3d::new(1.0, 0.0, 0.0)), PointContainment::Boundary);
        assert!((d.area() - TAU).abs() < 1e-12);
        let p = d.interior_point().unwrap();
        assert!(p.z > 0.0);

        let small = Circle3d::with_axes(Point3d::new(0.0, 0.0, 0.5), Vec3::Z, Vec3::X, 0.75f64.sqrt());
        let cap = SphericalDomain::from_spans(&sphere, true, &[vec![CurveSpan::new(Curve::Circle(small), 0.0, TAU)]], 1e-7);
        assert!((cap.area() - PI).abs() < 1e-12, "area = {}", cap.area());
        assert_eq!(cap.classify(&Point3d::new(0.0, 0.6, 0.8)), PointContainment::Inside);
        assert_eq!(cap.classify(&Point3d::new(0.0, 0.8, 0.6)), PointContainment::Outside);
    }

    /// The quarter `y < 0, z > 0` of the unit sphere, bounded by two half
    /// great circles meeting at right angles.
    fn quarter_sphere_spans() -> Vec<CurveSpan> {
        let equator = Circle3d::with_axes(Point3d::ORIGIN, Vec3::Z, Vec3::X, 1.0);
        let meridian = Circle3d::with_axes(Point3d::ORIGIN, -Vec3::Y, Vec3::X, 1.0);
        vec![
            CurveSpan::new(Curve::Circle(equator), PI, TAU),
            CurveSpan::new(Curve::Circle(meridian), 0.0, PI),
        ]
    }

    #[test]
    fn test_quarter_sphere_region() {
        let sphere = Sphere::new(Point3d::ORIGIN, 1.0);
        let d = SphericalDomain::from_spans(&sphere, true, &[quarter_sphere_spans()], 1e-7);
        assert!((d.area() - PI).abs() < 1e-9, "area = {}", d.area());
        assert_eq!(d.classify(&Point3d::new(0.0, -0.6, 0.8)), PointContainment::Inside);
        assert_eq!(d.classify(&Point3d::new(0.0, 0.6, 0.8)), PointContainment::Outside);
        assert_eq!(d.classify(&Point3d::new(0.0, -0.6, -0.8)), PointContainment::Outside);
        assert_eq!(d.classify(&Point3d::new(1.0, 0.0, 0.0)), PointContainment::Boundary);
        let p = d.interior_point().unwrap();
        assert!(p.y < 0.0 && p.z > 0.0, "{p:?}");
        let n = d.normal_integral();
        assert!(n.x.abs() < 1e-9 && (n.y + PI / 2.0).abs() < 1e-9 && (n.z - PI / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_sphere_minus_quarter_region() {
        let sphere = Sphere::new(Point3d::ORIGIN, 1.0);
        let rest: Vec<CurveSpan> = quarter_sphere_spans().iter().rev().map(CurveSpan::reversed).collect();
        let d = SphericalDomain::from_spans(&sphere, true, &[rest], 1e-7);
        assert!((d.area() - 3.0 * PI).abs() < 1e-9, "area = {}", d.area());
        assert_eq!(d.classify(&Point3d::new(0.0, -0.6, 0.8)), PointContainment::Outside);
        assert_eq!(d.classify(&Point3d::new(0.0, 0.6, -0.8)), PointContainment::Inside);
        let p = d.interior_point().unwrap();
        assert_eq!(d.classify(&p), PointContainment::Inside);
    }

    #[test]
    fn test_full_sphere_moment() {
        let sphere = Sphere::new(Point3d::new(1.0, 1.0, 1.0), 2.0);
        let d = FaceDomain::from_spans(&Surface::Sphere(sphere), true, &[], 1e-7);
        let volume = d.volume_moment() / 3.0;
        assert!((volume - 4.0 / 3.0 * PI * 8.0).abs() < 1e-9);
        assert_eq!(d.classify(&Point3d::new(3.0, 1.0, 1.0)), PointContainment::Inside);
    }
}
