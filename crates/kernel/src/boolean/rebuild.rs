//! Face rebuilding: every face is cut by the pave blocks lying on it and
//! its pieces are traced into closed wires.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::f64::consts::TAU;

use thiserror::Error;
use tracing::{debug, info, instrument};

use super::context::OperationContext;
use super::data::BooleanData;
use super::error::{BooleanError, Diagnostic, DiagnosticCode};
use super::pave::PaveData;
use super::registry::EntityRef;
use crate::geometry::curves::{Circle3d, Curve};
use crate::geometry::point::{Point2d, Point3d};
use crate::geometry::surfaces::Surface;
use crate::topology::brep::*;
use crate::topology::face_domain::{
    loop_contains, CurveSpan, Edge2d, FaceChart, FaceDomain, PlaneFrame, PointContainment, SphereChart,
};

/// Angles closer than this are treated as equal while picking the next edge.
const ANGLE_EPS: f64 = 1e-9;

/// Identity of an output edge: a common block, or a lone pave block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeKey {
    Common(usize),
    Block(usize),
}

impl EdgeKey {
    pub fn of(pave: &PaveData, block: usize) -> Self {
        match pave.blocks[block].common {
            Some(c) => EdgeKey::Common(c),
            None => EdgeKey::Block(block),
        }
    }
}

/// A pave block used in a wire, either along its parameter or against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientedBlock {
    pub block: usize,
    pub forward: bool,
}

impl OrientedBlock {
    pub fn span(&self, pave: &PaveData) -> CurveSpan {
        let b = &pave.blocks[self.block];
        if self.forward {
            CurveSpan::new(b.curve, b.start.t, b.end.t)
        } else {
            CurveSpan::new(b.curve, b.end.t, b.start.t)
        }
    }

    pub fn from_vertex(&self, pave: &PaveData) -> usize {
        let b = &pave.blocks[self.block];
        if self.forward { b.start.vertex } else { b.end.vertex }
    }

    pub fn to_vertex(&self, pave: &PaveData) -> usize {
        let b = &pave.blocks[self.block];
        if self.forward { b.end.vertex } else { b.start.vertex }
    }

    pub fn reversed(self) -> Self {
        Self {
            block: self.block,
            forward: !self.forward,
        }
    }
}

/// One piece of a split face. The first wire is the outer one when the
/// surface needs it.
#[derive(Debug, Clone)]
pub struct FaceFragment {
    /// Registry record of the face this piece came from.
    pub face: usize,
    pub wires: Vec<Vec<OrientedBlock>>,
    pub domain: FaceDomain,
    pub interior: Option<Point3d>,
}

#[derive(Debug, Clone)]
pub struct FaceSplitResult {
    pub face: usize,
    pub fragments: Vec<FaceFragment>,
    /// True when internal blocks cut the face.
    pub split: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FaceRebuildError {
    #[error("face {face}: wire is open at vertex {vertex}")]
    OpenWire { face: usize, vertex: usize },

    #[error("face {face}: {reason}")]
    UnsupportedFaceSplit { face: usize, reason: String },
}

impl FaceRebuildError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            FaceRebuildError::OpenWire { face, .. } => {
                Diagnostic::new(DiagnosticCode::OpenWire, Some(*face), self.to_string())
            }
            FaceRebuildError::UnsupportedFaceSplit { face, .. } => {
                Diagnostic::new(DiagnosticCode::UnsupportedFaceSplit, Some(*face), self.to_string())
            }
        }
    }
}

/// Rebuild every indexed face in parallel. Faces that cannot be rebuilt are
/// reported and left out.
#[instrument(skip_all)]
pub fn rebuild_faces(
    ctx: &mut OperationContext,
    store: &EntityStore,
    data: &BooleanData,
) -> Result<Vec<FaceSplitResult>, BooleanError> {
    let faces: Vec<usize> = data
        .registry
        .records
        .iter()
        .filter(|r| matches!(r.entity, EntityRef::Face(_)))
        .map(|r| r.id)
        .collect();

    let results = {
        let shared: &OperationContext = ctx;
        shared.scheduler().map_ordered(&faces, |&face| {
            (!shared.is_cancelled()).then(|| rebuild_face(shared, store, data, face))
        })
    };
    ctx.check_cancelled()?;

    let mut out = Vec::with_capacity(faces.len());
    for result in results.into_iter().flatten() {
        match result {
            Ok(split) => out.push(split),
            Err(e) => ctx.report(e.to_diagnostic())?,
        }
    }
    info!(
        faces = out.len(),
        split = out.iter().filter(|s| s.split).count(),
        fragments = out.iter().map(|s| s.fragments.len()).sum::<usize>(),
        "faces rebuilt"
    );
    Ok(out)
}

/// Blocks bounding and crossing one face.
struct FaceBlocks {
    boundary: Vec<Vec<OrientedBlock>>,
    internal: Vec<usize>,
}

/// Split one face by its boundary blocks, the section blocks on it and the
/// other operand's edges lying inside it.
pub fn rebuild_face(
    ctx: &OperationContext,
    store: &EntityStore,
    data: &BooleanData,
    face: usize,
) -> Result<FaceSplitResult, FaceRebuildError> {
    let Some(face_id) = data.registry.face_id(face) else {
        return Err(FaceRebuildError::UnsupportedFaceSplit {
            face,
            reason: "record is not a face".into(),
        });
    };
    let f = &store.faces[face_id];
    let blocks = collect_blocks(store, data, face, face_id);
    let split = !blocks.internal.is_empty()
        || blocks.boundary.iter().flatten().count()
            > store.face_loops(face_id).map(|l| store.loops[l].half_edges.len()).sum::<usize>();

    let chart = match &f.surface {
        Surface::Plane(plane) => FaceChart::Plane(PlaneFrame::new(plane, f.same_sense)),
        Surface::Sphere(sphere) => {
            let mut circles: Vec<Circle3d> = Vec::new();
            for b in blocks.boundary.iter().flatten().map(|ob| ob.block).chain(blocks.internal.iter().copied()) {
                match data.pave.blocks[b].curve {
                    Curve::Circle(c) => circles.push(c),
                    Curve::Line(_) => {
                        return Err(FaceRebuildError::UnsupportedFaceSplit {
                            face,
                            reason: "non-circular edge on a spherical face".into(),
                        });
                    }
                }
            }
            FaceChart::Sphere(SphereChart::new(sphere, f.same_sense, &circles))
        }
    };
    let fragments = trace_fragments(ctx, data, face, &f.surface, f.same_sense, &chart, &blocks)?;
    debug!(face, fragments = fragments.len(), split, "face rebuilt");
    Ok(FaceSplitResult { face, fragments, split })
}

fn collect_blocks(store: &EntityStore, data: &BooleanData, face: usize, face_id: FaceId) -> FaceBlocks {
    let pave = &data.pave;
    let mut keys: HashSet<EdgeKey> = HashSet::new();

    let mut boundary = Vec::new();
    for l in store.face_loops(face_id) {
        let mut wire = Vec::new();
        for &he in &store.loops[l].half_edges {
            let edge = store.half_edges[he].edge;
            let Some(record) = data.registry.id_of(EntityRef::Edge(edge)) else {
                continue;
            };
            let (t_from, t_to) = store.half_edge_range(he);
            let ids = pave.blocks_of_edge(record);
            if t_from <= t_to {
                wire.extend(ids.iter().map(|&block| OrientedBlock { block, forward: true }));
            } else {
                wire.extend(ids.iter().rev().map(|&block| OrientedBlock { block, forward: false }));
            }
        }
        keys.extend(wire.iter().map(|ob| EdgeKey::of(pave, ob.block)));
        boundary.push(wire);
    }

    let candidates = pave
        .section_blocks
        .get(&face)
        .into_iter()
        .flatten()
        .copied()
        .chain(
            pave.in_face_edges
                .get(&face)
                .into_iter()
                .flatten()
                .flat_map(|&er| pave.blocks_of_edge(er).iter().copied()),
        );
    let mut internal = Vec::new();
    for b in candidates {
        let inside = data
            .domains
            .get(face)
            .is_some_and(|d| d.classify(&pave.blocks[b].midpoint()) == PointContainment::Inside);
        if inside && keys.insert(EdgeKey::of(pave, b)) {
            internal.push(b);
        }
    }
    FaceBlocks { boundary, internal }
}

// ─── Wire Tracing ───────────────────────────────────────────────────────────

/// One direction of a block in the face's chart.
struct DirectedEdge {
    block: OrientedBlock,
    from: usize,
    to: usize,
    geom: Edge2d,
}

impl DirectedEdge {
    fn new(block: OrientedBlock, chart: &FaceChart, pave: &PaveData) -> Self {
        Self {
            block,
            from: block.from_vertex(pave),
            to: block.to_vertex(pave),
            geom: chart.edge(&block.span(pave)),
        }
    }

    /// Leaving direction at `from`, plus a short chord for tie-breaks.
    fn out_dirs(&self) -> (Point2d, Point2d) {
        (self.geom.tangent_at(0.0), self.geom.point_at(0.05) - self.geom.start())
    }

    /// Direction pointing back along the edge from `to`.
    fn back_dirs(&self) -> (Point2d, Point2d) {
        (self.geom.tangent_at(1.0) * -1.0, self.geom.point_at(0.95) - self.geom.end())
    }

    fn length(&self) -> f64 {
        self.geom.polyline().windows(2).map(|w| w[0].distance_to(&w[1])).sum()
    }
}

/// Clockwise angle from `reference` to `candidate` in (0, 2π].
fn clockwise(reference: &Point2d, candidate: &Point2d) -> f64 {
    let cw = (reference.angle() - candidate.angle()).rem_euclid(TAU);
    if cw < ANGLE_EPS || cw > TAU - ANGLE_EPS { TAU } else { cw }
}

/// Trace the face's blocks into closed wires in its chart and group them
/// into fragments. Counter-clockwise wires are outer loops; clockwise ones
/// are holes of the smallest outer loop around them. On a sphere the holes
/// no outer loop encloses bound the fragment holding the chart's pole.
fn trace_fragments(
    ctx: &OperationContext,
    data: &BooleanData,
    face: usize,
    surface: &Surface,
    same_sense: bool,
    chart: &FaceChart,
    blocks: &FaceBlocks,
) -> Result<Vec<FaceFragment>, FaceRebuildError> {
    let pave = &data.pave;
    let tol = ctx.tolerance;

    let mut edges: Vec<DirectedEdge> = blocks
        .boundary
        .iter()
        .flatten()
        .map(|&ob| DirectedEdge::new(ob, chart, pave))
        .collect();
    for &b in &blocks.internal {
        let ob = OrientedBlock { block: b, forward: true };
        edges.push(DirectedEdge::new(ob, chart, pave));
        edges.push(DirectedEdge::new(ob.reversed(), chart, pave));
    }
    if edges.is_empty() {
        return match chart {
            FaceChart::Sphere(_) => Ok(vec![fragment(face, surface, same_sense, Vec::new(), pave, tol)]),
            FaceChart::Plane(_) => Err(FaceRebuildError::UnsupportedFaceSplit {
                face,
                reason: "planar face without boundary".into(),
            }),
        };
    }

    let mut degree: HashMap<usize, usize> = HashMap::new();
    let undirected = blocks
        .boundary
        .iter()
        .flatten()
        .copied()
        .chain(blocks.internal.iter().map(|&block| OrientedBlock { block, forward: true }));
    for ob in undirected {
        *degree.entry(ob.from_vertex(pave)).or_default() += 1;
        *degree.entry(ob.to_vertex(pave)).or_default() += 1;
    }
    for &b in &blocks.internal {
        let blk = &pave.blocks[b];
        for v in [blk.start.vertex, blk.end.vertex] {
            if degree.get(&v).copied().unwrap_or(0) < 2 {
                return Err(FaceRebuildError::OpenWire { face, vertex: v });
            }
        }
    }

    let mut outgoing: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, e) in edges.iter().enumerate() {
        outgoing.entry(e.from).or_default().push(i);
    }

    // The next edge of each directed edge: the first one clockwise from
    // the reversed incoming direction.
    let mut next = Vec::with_capacity(edges.len());
    for e in &edges {
        let (back, back_chord) = e.back_dirs();
        let choice = outgoing
            .get(&e.to)
            .into_iter()
            .flatten()
            .map(|&j| {
                let (out, out_chord) = edges[j].out_dirs();
                (clockwise(&back, &out), clockwise(&back_chord, &out_chord), j)
            })
            .min_by(|a, b| {
                if (a.0 - b.0).abs() <= ANGLE_EPS {
                    a.1.total_cmp(&b.1).then(a.2.cmp(&b.2))
                } else {
                    a.0.total_cmp(&b.0)
                }
            });
        match choice {
            Some((_, _, j)) => next.push(j),
            None => return Err(FaceRebuildError::OpenWire { face, vertex: e.to }),
        }
    }

    let mut visited = vec![false; edges.len()];
    let mut loops: Vec<Vec<usize>> = Vec::new();
    for start in 0..edges.len() {
        if visited[start] {
            continue;
        }
        let mut wire = Vec::new();
        let mut cur = start;
        loop {
            if visited[cur] || wire.len() > edges.len() {
                return Err(FaceRebuildError::OpenWire { face, vertex: edges[cur].from });
            }
            visited[cur] = true;
            wire.push(cur);
            cur = next[cur];
            if cur == start {
                break;
            }
        }
        loops.push(wire);
    }

    let mut outers: Vec<(Vec<usize>, f64)> = Vec::new();
    let mut holes: Vec<Vec<usize>> = Vec::new();
    for wire in loops {
        let area: f64 = wire.iter().map(|&i| edges[i].geom.signed_area()).sum();
        let perimeter: f64 = wire.iter().map(|&i| edges[i].length()).sum();
        if area.abs() <= tol * perimeter {
            debug!(face, area, "degenerate loop skipped");
        } else if area > 0.0 {
            outers.push((wire, area));
        } else {
            holes.push(wire);
        }
    }

    let outer_edges: Vec<Vec<Edge2d>> = outers
        .iter()
        .map(|(wire, _)| wire.iter().map(|&i| edges[i].geom).collect())
        .collect();
    let mut assigned: Vec<Vec<Vec<usize>>> = vec![Vec::new(); outers.len()];
    let mut unowned: Vec<Vec<usize>> = Vec::new();
    for hole in holes {
        let owner = (0..outers.len())
            .filter(|&k| {
                hole.iter()
                    .any(|&i| loop_contains(&outer_edges[k], &edges[i].geom.point_at(0.5), tol))
            })
            .min_by(|&x, &y| outers[x].1.total_cmp(&outers[y].1));
        match owner {
            Some(k) => assigned[k].push(hole),
            None => unowned.push(hole),
        }
    }
    if !unowned.is_empty() && matches!(chart, FaceChart::Plane(_)) {
        return Err(FaceRebuildError::UnsupportedFaceSplit {
            face,
            reason: "hole loop outside every outer loop".into(),
        });
    }

    let wire_blocks = |w: Vec<usize>| -> Vec<OrientedBlock> { w.into_iter().map(|i| edges[i].block).collect() };
    let mut fragments: Vec<FaceFragment> = outers
        .into_iter()
        .zip(assigned)
        .map(|((outer, _), inner)| {
            let wires: Vec<Vec<OrientedBlock>> = std::iter::once(outer).chain(inner).map(wire_blocks).collect();
            fragment(face, surface, same_sense, wires, pave, tol)
        })
        .collect();
    if !unowned.is_empty() {
        let wires: Vec<Vec<OrientedBlock>> = unowned.into_iter().map(wire_blocks).collect();
        fragments.push(fragment(face, surface, same_sense, wires, pave, tol));
    }
    Ok(fragments)
}

fn fragment(
    face: usize,
    surface: &Surface,
    same_sense: bool,
    wires: Vec<Vec<OrientedBlock>>,
    pave: &PaveData,
    tol: f64,
) -> FaceFragment {
    let spans: Vec<Vec<CurveSpan>> = wires.iter().map(|w| w.iter().map(|ob| ob.span(pave)).collect()).collect();
    let domain = FaceDomain::from_spans(surface, same_sense, &spans, tol);
    let interior = domain.interior_point();
    FaceFragment {
        face,
        wires,
        domain,
        interior,
    }
}
