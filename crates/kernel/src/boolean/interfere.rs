use std::collections::{HashMap, HashSet};
use std::f64::consts::TAU;

use tracing::{debug, info, instrument};

use super::context::OperationContext;
use super::error::{BooleanError, Diagnostic, DiagnosticCode};
use super::registry::{EntityRef, Operand, OperandSet, ShapeRegistry};
use crate::geometry::curves::Curve;
use crate::geometry::intersection::{self, CurveCurve, CurveSurface, SurfaceSurface};
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::Surface;
use crate::geometry::{CurveEval, SurfaceEval};
use crate::topology::brep::*;
use crate::topology::face_domain::{join_wrapped, FaceDomain, PointContainment};

/// A bounded piece of a face/face section curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionCurve {
    pub curve: Curve,
    pub t0: f64,
    pub t1: f64,
}

impl SectionCurve {
    pub fn is_closed(&self) -> bool {
        self.curve.period().is_some_and(|p| (self.t1 - self.t0 - p).abs() < 1e-12)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterferenceKind {
    VertexVertex { distance: f64 },
    /// The vertex lies on the interior of the edge at `t`.
    VertexEdge { t: f64 },
    /// The vertex lies strictly inside the face.
    VertexFace,
    EdgeEdge { t1: f64, t2: f64, point: Point3d },
    /// Collinear or co-circular overlap of two edges.
    EdgeOverlap { t1: (f64, f64), t2: (f64, f64) },
    /// The edge pierces the face interior at `t`.
    EdgeFace { t: f64, point: Point3d },
    /// The edge lies in the face's surface.
    EdgeInFace,
    FaceSection { curves: Vec<SectionCurve> },
    FaceCoincident { same_sense: bool },
}

/// A coincidence found between two sub-shapes of different operands.
/// `first` is the lower-dimensional record (lower id for equal dimensions).
#[derive(Debug, Clone, PartialEq)]
pub struct Interference {
    pub first: usize,
    pub second: usize,
    pub kind: InterferenceKind,
    pub tangential: bool,
    pub tolerance: f64,
}

/// Point-in-face domains of every indexed face, keyed by record id.
#[derive(Debug, Clone, Default)]
pub struct FaceDomains {
    domains: HashMap<usize, FaceDomain>,
}

impl FaceDomains {
    pub fn build(ctx: &OperationContext, store: &EntityStore, registry: &ShapeRegistry) -> Self {
        let faces: Vec<(usize, FaceId)> = registry
            .records
            .iter()
            .filter_map(|r| match r.entity {
                EntityRef::Face(f) => Some((r.id, f)),
                _ => None,
            })
            .collect();
        let tol = ctx.tolerance;
        let built = ctx
            .scheduler()
            .map_ordered(&faces, |&(id, f)| (id, FaceDomain::from_face(store, f, tol)));
        Self {
            domains: built.into_iter().collect(),
        }
    }

    pub fn get(&self, face_record: usize) -> Option<&FaceDomain> {
        self.domains.get(&face_record)
    }
}

/// Record ids of the edges and vertices bounding each face and edge.
#[derive(Debug, Default)]
struct Incidence {
    face_edges: HashMap<usize, HashSet<usize>>,
    face_vertices: HashMap<usize, HashSet<usize>>,
    edge_vertices: HashMap<usize, [usize; 2]>,
}

impl Incidence {
    fn build(store: &EntityStore, registry: &ShapeRegistry) -> Self {
        let mut inc = Incidence::default();
        let vid = |v: VertexId| registry.id_of(EntityRef::Vertex(v));
        for r in &registry.records {
            match r.entity {
                EntityRef::Edge(e) => {
                    let edge = &store.edges[e];
                    if let (Some(a), Some(b)) = (vid(edge.start_vertex), vid(edge.end_vertex)) {
                        inc.edge_vertices.insert(r.id, [a, b]);
                    }
                }
                EntityRef::Face(f) => {
                    let mut edges = HashSet::new();
                    let mut verts = HashSet::new();
                    for l in store.face_loops(f) {
                        for &he in &store.loops[l].half_edges {
                            let he = &store.half_edges[he];
                            edges.extend(registry.id_of(EntityRef::Edge(he.edge)));
                            verts.extend(vid(he.start_vertex));
                            verts.extend(vid(he.end_vertex));
                        }
                    }
                    inc.face_edges.insert(r.id, edges);
                    inc.face_vertices.insert(r.id, verts);
                }
                _ => {}
            }
        }
        inc
    }

    fn is_trivial(&self, low: usize, high: usize) -> bool {
        self.edge_vertices.get(&high).is_some_and(|vs| vs.contains(&low))
            || self.face_edges.get(&high).is_some_and(|es| es.contains(&low))
            || self.face_vertices.get(&high).is_some_and(|vs| vs.contains(&low))
    }
}

/// Shared inputs of one pair evaluation.
struct PairEnv<'a> {
    store: &'a EntityStore,
    registry: &'a ShapeRegistry,
    domains: &'a FaceDomains,
    tol: f64,
    angular: f64,
}

#[derive(Default)]
struct PairOutcome {
    interferences: Vec<Interference>,
    diagnostics: Vec<Diagnostic>,
}

/// Find every coincidence between sub-shapes of operand A and operand B.
#[instrument(skip_all)]
pub fn find_interferences(
    ctx: &mut OperationContext,
    store: &EntityStore,
    registry: &ShapeRegistry,
    domains: &FaceDomains,
) -> Result<Vec<Interference>, BooleanError> {
    let pairs = candidate_pairs(registry, &Incidence::build(store, registry), ctx.tolerance);
    debug!(candidates = pairs.len(), "candidate pairs");

    let env = PairEnv {
        store,
        registry,
        domains,
        tol: ctx.tolerance,
        angular: ctx.angular_tolerance,
    };
    let outcomes = {
        let ctx_ref: &OperationContext = ctx;
        ctx_ref.scheduler().map_ordered(&pairs, |&(low, high)| {
            if ctx_ref.is_cancelled() {
                return PairOutcome::default();
            }
            evaluate_pair(&env, low, high)
        })
    };
    ctx.check_cancelled()?;

    let mut interferences = Vec::new();
    for outcome in outcomes {
        ctx.report_all(outcome.diagnostics)?;
        interferences.extend(outcome.interferences);
    }
    interferences.sort_by_key(|i| (i.first, i.second));
    info!(count = interferences.len(), "interferences found");
    Ok(interferences)
}

/// Pairs of records from different operands with overlapping boxes, ordered
/// `(lower dimension, higher dimension)` and sorted.
fn candidate_pairs(registry: &ShapeRegistry, incidence: &Incidence, tol: f64) -> Vec<(usize, usize)> {
    let mut items: Vec<usize> = registry
        .records
        .iter()
        .filter(|r| r.entity.dimension() <= 2 && r.bbox.is_valid())
        .map(|r| r.id)
        .collect();
    items.sort_by(|&a, &b| registry.records[a].bbox.min.x.total_cmp(&registry.records[b].bbox.min.x));

    let mut pairs = Vec::new();
    for (k, &i) in items.iter().enumerate() {
        let ri = &registry.records[i];
        let reach = ri.bbox.max.x + tol;
        for &j in &items[k + 1..] {
            let rj = &registry.records[j];
            if rj.bbox.min.x > reach {
                break;
            }
            let cross = (ri.operands.contains(Operand::A) && rj.operands.contains(Operand::B))
                || (ri.operands.contains(Operand::B) && rj.operands.contains(Operand::A));
            if !cross || (ri.operands == OperandSet::Both && rj.operands == OperandSet::Both) {
                continue;
            }
            if !ri.bbox.expanded(tol).intersects(&rj.bbox) {
                continue;
            }
            let (di, dj) = (ri.entity.dimension(), rj.entity.dimension());
            let (low, high) = if (di, i) <= (dj, j) { (i, j) } else { (j, i) };
            if incidence.is_trivial(low, high) {
                continue;
            }
            pairs.push((low, high));
        }
    }
    pairs.sort_unstable();
    pairs
}

fn evaluate_pair(env: &PairEnv<'_>, low: usize, high: usize) -> PairOutcome {
    let mut out = PairOutcome::default();
    let (el, eh) = (env.registry.records[low].entity, env.registry.records[high].entity);
    match (el, eh) {
        (EntityRef::Vertex(a), EntityRef::Vertex(b)) => vertex_vertex(env, &mut out, low, high, a, b),
        (EntityRef::Vertex(v), EntityRef::Edge(e)) => vertex_edge(env, &mut out, low, high, v, e),
        (EntityRef::Vertex(v), EntityRef::Face(f)) => vertex_face(env, &mut out, low, high, v, f),
        (EntityRef::Edge(a), EntityRef::Edge(b)) => edge_edge(env, &mut out, low, high, a, b),
        (EntityRef::Edge(e), EntityRef::Face(f)) => edge_face(env, &mut out, low, high, e, f),
        (EntityRef::Face(a), EntityRef::Face(b)) => face_face(env, &mut out, low, high, a, b),
        _ => {}
    }
    out
}

fn push(out: &mut PairOutcome, env: &PairEnv<'_>, first: usize, second: usize, kind: InterferenceKind, tangential: bool) {
    out.interferences.push(Interference {
        first,
        second,
        kind,
        tangential,
        tolerance: env.tol,
    });
}

fn ambiguous(out: &mut PairOutcome, first: usize, message: String) {
    out.diagnostics
        .push(Diagnostic::new(DiagnosticCode::AmbiguousInterference, Some(first), message));
}

fn edge_range(edge: &Edge) -> (f64, f64) {
    (edge.t_start.min(edge.t_end), edge.t_start.max(edge.t_end))
}

/// Parameter tolerance equivalent to `tol` along the curve.
pub(crate) fn param_tol(curve: &Curve, tol: f64) -> f64 {
    match curve {
        Curve::Line(_) => tol,
        Curve::Circle(c) => tol / c.radius.max(1e-300),
    }
}

/// The edge parameter of `p` when it lies on the edge, within `tol`.
pub(crate) fn locate_on_edge(edge: &Edge, p: &Point3d, tol: f64) -> Option<f64> {
    let (t0, t1) = edge_range(edge);
    let t = edge.curve.parameter_in_range(p, t0, t1, param_tol(&edge.curve, tol))?;
    (edge.curve.evaluate(t).distance_to(p) <= tol).then_some(t)
}

fn near_edge_end(store: &EntityStore, edge: &Edge, p: &Point3d, tol: f64) -> bool {
    [edge.start_vertex, edge.end_vertex]
        .iter()
        .any(|&v| store.vertices[v].point.distance_to(p) <= tol)
}

fn vertex_vertex(env: &PairEnv<'_>, out: &mut PairOutcome, low: usize, high: usize, a: VertexId, b: VertexId) {
    let distance = env.store.vertices[a].point.distance_to(&env.store.vertices[b].point);
    if distance <= env.tol {
        push(out, env, low, high, InterferenceKind::VertexVertex { distance }, false);
    }
}

fn vertex_edge(env: &PairEnv<'_>, out: &mut PairOutcome, low: usize, high: usize, v: VertexId, e: EdgeId) {
    let p = env.store.vertices[v].point;
    let edge = &env.store.edges[e];
    if near_edge_end(env.store, edge, &p, env.tol) {
        return;
    }
    if let Some(t) = locate_on_edge(edge, &p, env.tol) {
        push(out, env, low, high, InterferenceKind::VertexEdge { t }, false);
    }
}

fn vertex_face(env: &PairEnv<'_>, out: &mut PairOutcome, low: usize, high: usize, v: VertexId, f: FaceId) {
    let p = env.store.vertices[v].point;
    if env.store.faces[f].surface.distance_to(&p) > env.tol {
        return;
    }
    if env.domains.get(high).map(|d| d.classify(&p)) == Some(PointContainment::Inside) {
        push(out, env, low, high, InterferenceKind::VertexFace, false);
    }
}

fn edge_edge(env: &PairEnv<'_>, out: &mut PairOutcome, low: usize, high: usize, a: EdgeId, b: EdgeId) {
    let (ea, eb) = (&env.store.edges[a], &env.store.edges[b]);
    match intersection::curve_curve(&ea.curve, &eb.curve, env.tol, env.angular) {
        CurveCurve::Points(hits) => {
            for hit in hits {
                let refined = match (ea.curve, eb.curve) {
                    (Curve::Line(_), Curve::Line(_)) => Some((hit.t1, hit.t2)),
                    _ => intersection::refine_curve_curve(&ea.curve, &eb.curve, hit.t1, hit.t2, env.tol),
                };
                let Some((t1, t2)) = refined else {
                    ambiguous(out, low, format!("edge/edge contact with record {high} did not converge"));
                    continue;
                };
                let point = ea.curve.evaluate(t1).midpoint(&eb.curve.evaluate(t2));
                if near_edge_end(env.store, ea, &point, env.tol) || near_edge_end(env.store, eb, &point, env.tol) {
                    continue;
                }
                let (Some(t1), Some(t2)) = (
                    locate_on_edge(ea, &point, env.tol),
                    locate_on_edge(eb, &point, env.tol),
                ) else {
                    continue;
                };
                push(out, env, low, high, InterferenceKind::EdgeEdge { t1, t2, point }, hit.tangential);
            }
        }
        CurveCurve::Coincident => {
            if let (Some(r1), Some(r2)) = (overlap_range(env, ea, eb), overlap_range(env, eb, ea)) {
                push(out, env, low, high, InterferenceKind::EdgeOverlap { t1: r1, t2: r2 }, false);
            }
        }
    }
}

/// Range on `a` covered by `b`, for edges on the same carrier curve.
fn overlap_range(env: &PairEnv<'_>, a: &Edge, b: &Edge) -> Option<(f64, f64)> {
    let mut ts: Vec<f64> = Vec::new();
    for v in [a.start_vertex, a.end_vertex] {
        let p = env.store.vertices[v].point;
        if locate_on_edge(b, &p, env.tol).is_some() {
            ts.extend(locate_on_edge(a, &p, env.tol));
        }
    }
    for v in [b.start_vertex, b.end_vertex] {
        ts.extend(locate_on_edge(a, &env.store.vertices[v].point, env.tol));
    }
    let lo = ts.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = ts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (a.curve.length(lo, hi) > env.tol).then_some((lo, hi))
}

fn edge_face(env: &PairEnv<'_>, out: &mut PairOutcome, low: usize, high: usize, e: EdgeId, f: FaceId) {
    let edge = &env.store.edges[e];
    let surface = env.store.faces[f].surface;
    let Some(domain) = env.domains.get(high) else {
        return;
    };
    match intersection::curve_surface(&edge.curve, &surface, env.tol, env.angular) {
        CurveSurface::Points(hits) => {
            for hit in hits {
                let refined = match (edge.curve, surface) {
                    (Curve::Line(_), Surface::Plane(_)) => Some(hit.t),
                    _ => intersection::refine_curve_surface(&edge.curve, &surface, hit.t, env.tol),
                };
                let Some(t) = refined else {
                    ambiguous(out, low, format!("edge/face contact with record {high} did not converge"));
                    continue;
                };
                let point = edge.curve.evaluate(t);
                if near_edge_end(env.store, edge, &point, env.tol) {
                    continue;
                }
                let Some(t) = locate_on_edge(edge, &point, env.tol) else {
                    continue;
                };
                if domain.classify(&point) == PointContainment::Inside {
                    push(out, env, low, high, InterferenceKind::EdgeFace { t, point }, hit.tangential);
                }
            }
        }
        CurveSurface::OnSurface => push(out, env, low, high, InterferenceKind::EdgeInFace, false),
    }
}

fn face_face(env: &PairEnv<'_>, out: &mut PairOutcome, low: usize, high: usize, a: FaceId, b: FaceId) {
    let (fa, fb) = (&env.store.faces[a], &env.store.faces[b]);
    let (Some(da), Some(db)) = (env.domains.get(low), env.domains.get(high)) else {
        return;
    };
    match intersection::surface_surface(&fa.surface, &fb.surface, env.tol, env.angular) {
        SurfaceSurface::None | SurfaceSurface::Point(_) => {}
        SurfaceSurface::Coincident { same_orientation } => {
            let same_sense = same_orientation == (fa.same_sense == fb.same_sense);
            push(out, env, low, high, InterferenceKind::FaceCoincident { same_sense }, false);
        }
        SurfaceSurface::Line(line) => {
            let (FaceDomain::Planar(pa), FaceDomain::Planar(pb)) = (da, db) else {
                return;
            };
            let clip = |d: &crate::topology::face_domain::PlanarDomain| {
                d.line_intervals(&d.frame.to_2d(&line.origin), &d.frame.dir_to_2d(&line.direction))
            };
            let curves: Vec<SectionCurve> = intersect_intervals(&clip(pa), &clip(pb))
                .into_iter()
                .filter(|(t0, t1)| t1 - t0 > env.tol)
                .map(|(t0, t1)| SectionCurve {
                    curve: Curve::Line(line),
                    t0,
                    t1,
                })
                .collect();
            if !curves.is_empty() {
                push(out, env, low, high, InterferenceKind::FaceSection { curves }, false);
            }
        }
        SurfaceSurface::Circle(circle) => {
            let step = env.tol / circle.radius.max(1e-300);
            let arcs = intersect_arcs(
                &da.circle_intervals(&circle, env.angular),
                &db.circle_intervals(&circle, env.angular),
                step,
            );
            let curves: Vec<SectionCurve> = arcs
                .into_iter()
                .map(|(t0, t1)| SectionCurve {
                    curve: Curve::Circle(circle),
                    t0,
                    t1,
                })
                .collect();
            if !curves.is_empty() {
                push(out, env, low, high, InterferenceKind::FaceSection { curves }, false);
            }
        }
    }
}

/// Intersection of two lists of circle angle intervals as produced by
/// [`FaceDomain::circle_intervals`]. Pieces shorter than `step` are dropped
/// and pieces meeting at the seam are joined.
pub fn intersect_arcs(a: &[(f64, f64)], b: &[(f64, f64)], step: f64) -> Vec<(f64, f64)> {
    let mut pieces: Vec<(f64, f64)> = Vec::new();
    for &(a0, a1) in a {
        for &(b0, b1) in b {
            for shift in [-TAU, 0.0, TAU] {
                let (lo, hi) = (a0.max(b0 + shift), a1.min(b1 + shift));
                if hi - lo > step {
                    let base = lo.rem_euclid(TAU) - lo;
                    pieces.push((lo + base, hi + base));
                }
            }
        }
    }
    pieces.sort_by(|x, y| x.0.total_cmp(&y.0));
    let mut out: Vec<(f64, f64)> = Vec::new();
    for p in pieces {
        match out.last_mut() {
            Some(last) if p.0 <= last.1 + step => last.1 = last.1.max(p.1),
            _ => out.push(p),
        }
    }
    join_wrapped(&mut out, step);
    out
}

/// Intersection of two sorted, disjoint interval lists.
pub fn intersect_intervals(a: &[(f64, f64)], b: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let (mut i, mut j) = (0, 0);
    let mut out = Vec::new();
    while i < a.len() && j < b.len() {
        let lo = a[i].0.max(b[j].0);
        let hi = a[i].1.min(b[j].1);
        if lo <= hi {
            out.push((lo, hi));
        }
        if a[i].1 < b[j].1 {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boolean::context::CancellationToken;
    use crate::boolean::options::BooleanOptions;
    use crate::geometry::point::Point3d;
    use crate::topology::primitives::{make_box, make_sphere};

    fn run(store: &EntityStore, a: SolidId, b: SolidId) -> (Vec<Interference>, ShapeRegistry) {
        let registry = ShapeRegistry::index(store, ShapeRef::Solid(a), Some(ShapeRef::Solid(b))).unwrap();
        let mut ctx = OperationContext::new(BooleanOptions::serial(), 1e-7, CancellationToken::new()).unwrap();
        let domains = FaceDomains::build(&ctx, store, &registry);
        let found = find_interferences(&mut ctx, store, &registry, &domains).unwrap();
        (found, registry)
    }

    #[test]
    fn test_intersect_intervals() {
        let a = [(0.0, 2.0), (3.0, 5.0)];
        let b = [(1.0, 4.0)];
        assert_eq!(intersect_intervals(&a, &b), vec![(1.0, 2.0), (3.0, 4.0)]);
        assert!(intersect_intervals(&a, &[]).is_empty());
    }

    #[test]
    fn test_intersect_arcs_across_seam() {
        let full = [(0.0, TAU)];
        assert_eq!(intersect_arcs(&full, &full, 1e-9), vec![(0.0, TAU)]);
        let wrapped = [(6.0, 7.0)];
        let iv = intersect_arcs(&full, &wrapped, 1e-9);
        assert_eq!(iv.len(), 1);
        assert!((iv[0].0 - 6.0).abs() < 1e-12 && (iv[0].1 - 7.0).abs() < 1e-12, "{iv:?}");
        assert!(intersect_arcs(&[(1.0, 2.0)], &[(3.0, 4.0)], 1e-9).is_empty());
        let split = intersect_arcs(&[(0.5, 0.5 + TAU)], &full, 1e-9);
        assert_eq!(split.len(), 1);
        assert!((split[0].1 - split[0].0 - TAU).abs() < 1e-12);
    }

    #[test]
    fn test_disjoint_boxes_have_no_interferences() {
        let mut store = EntityStore::new();
        let a = make_box(&mut store, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0).unwrap();
        let b = make_box(&mut store, 5.0, 5.0, 5.0, 6.0, 6.0, 6.0).unwrap();
        let (found, _) = run(&store, a, b);
        assert!(found.is_empty());
    }

    #[test]
    fn test_face_sharing_cubes() {
        let mut store = EntityStore::new();
        let a = make_box(&mut store, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0).unwrap();
        let b = make_box(&mut store, 1.0, 0.0, 0.0, 2.0, 1.0, 1.0).unwrap();
        let (found, _) = run(&store, a, b);
        let vv = found
            .iter()
            .filter(|i| matches!(i.kind, InterferenceKind::VertexVertex { .. }))
            .count();
        assert_eq!(vv, 4);
        let coincident = found
            .iter()
            .filter(|i| matches!(i.kind, InterferenceKind::FaceCoincident { same_sense: false }))
            .count();
        assert_eq!(coincident, 1);
        assert!(found
            .iter()
            .any(|i| matches!(i.kind, InterferenceKind::EdgeOverlap { .. })));
        assert!(found.windows(2).all(|w| (w[0].first, w[0].second) <= (w[1].first, w[1].second)));
    }

    #[test]
    fn test_overlapping_boxes_produce_sections_and_pierces() {
        let mut store = EntityStore::new();
        let a = make_box(&mut store, 0.0, 0.0, 0.0, 2.0, 2.0, 2.0).unwrap();
        let b = make_box(&mut store, 1.0, 1.0, 1.0, 3.0, 3.0, 3.0).unwrap();
        let (found, _) = run(&store, a, b);
        let sections: Vec<&SectionCurve> = found
            .iter()
            .filter_map(|i| match &i.kind {
                InterferenceKind::FaceSection { curves } => Some(curves),
                _ => None,
            })
            .flatten()
            .collect();
        // Three faces of each box cross three faces of the other.
        assert_eq!(sections.len(), 6);
        for s in &sections {
            assert!((s.t1 - s.t0 - 1.0).abs() < 1e-9, "section length {}", s.t1 - s.t0);
        }
        let pierces = found
            .iter()
            .filter(|i| matches!(i.kind, InterferenceKind::EdgeFace { .. }))
            .count();
        assert_eq!(pierces, 6);
    }

    #[test]
    fn test_sphere_through_box_face() {
        let mut store = EntityStore::new();
        let a = make_box(&mut store, -2.0, -2.0, 0.0, 2.0, 2.0, 2.0).unwrap();
        let b = make_sphere(&mut store, Point3d::ORIGIN, 1.0).unwrap();
        let (found, registry) = run(&store, a, b);
        let circles: Vec<&Interference> = found
            .iter()
            .filter(|i| matches!(i.kind, InterferenceKind::FaceSection { .. }))
            .collect();
        assert_eq!(circles.len(), 1);
        assert!(matches!(registry.records[circles[0].first].entity, EntityRef::Face(_)));
    }

    #[test]
    fn test_section_circle_clipped_to_box_faces() {
        let mut store = EntityStore::new();
        let ball = make_sphere(&mut store, Point3d::ORIGIN, 1.0).unwrap();
        let corner = make_box(&mut store, 0.5, 0.5, -3.0, 3.0, 3.0, 3.0).unwrap();
        let (found, _) = run(&store, ball, corner);
        let arcs: Vec<&SectionCurve> = found
            .iter()
            .filter_map(|i| match &i.kind {
                InterferenceKind::FaceSection { curves } => Some(curves),
                _ => None,
            })
            .flatten()
            .collect();
        // The faces x = 0.5 and y = 0.5 each cut one arc out of the ball.
        assert_eq!(arcs.len(), 2);
        let sweep = 2.0 * (1.0 / 3f64.sqrt()).acos();
        for arc in arcs {
            assert!(!arc.is_closed());
            assert!((arc.t1 - arc.t0 - sweep).abs() < 1e-9, "sweep {}", arc.t1 - arc.t0);
            for end in [arc.curve.evaluate(arc.t0), arc.curve.evaluate(arc.t1)] {
                assert!((end.x - 0.5).abs() < 1e-9 && (end.y - 0.5).abs() < 1e-9, "{end:?}");
                assert!((end.z.abs() - 0.5f64.sqrt()).abs() < 1e-9);
            }
        }
        let pierces = found
            .iter()
            .filter(|i| matches!(i.kind, InterferenceKind::EdgeFace { .. }))
            .count();
        assert_eq!(pierces, 2);
    }
}
