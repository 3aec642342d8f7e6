//! Vertex pool, paves and pave blocks: splitting edges and section curves at
//! every contact point, and merging geometrically coincident blocks.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info, instrument};

use super::context::OperationContext;
use super::error::BooleanError;
use super::interfere::{param_tol, Interference, InterferenceKind, SectionCurve};
use super::registry::{EntityRef, ShapeRegistry};
use crate::geometry::curves::Curve;
use crate::geometry::point::Point3d;
use crate::geometry::CurveEval;
use crate::topology::brep::*;

/// Sample count for comparing blocks of different curve kinds.
const COMMON_BLOCK_SAMPLES: usize = 5;

// ─── Vertex Pool ────────────────────────────────────────────────────────────

/// Output vertices of the operation: original vertices merged by union-find,
/// plus new contact vertices created on demand.
#[derive(Debug, Clone)]
pub struct VertexPool {
    points: Vec<Point3d>,
    parent: Vec<usize>,
    originals: Vec<Option<VertexId>>,
    by_original: HashMap<VertexId, usize>,
    tolerance: f64,
}

impl VertexPool {
    pub fn new(tolerance: f64) -> Self {
        Self {
            points: Vec::new(),
            parent: Vec::new(),
            originals: Vec::new(),
            by_original: HashMap::new(),
            tolerance,
        }
    }

    pub fn add_original(&mut self, v: VertexId, p: Point3d) -> usize {
        if let Some(&slot) = self.by_original.get(&v) {
            return slot;
        }
        let slot = self.push(p, Some(v));
        self.by_original.insert(v, slot);
        slot
    }

    fn push(&mut self, p: Point3d, original: Option<VertexId>) -> usize {
        let slot = self.points.len();
        self.points.push(p);
        self.parent.push(slot);
        self.originals.push(original);
        slot
    }

    pub fn find(&self, mut slot: usize) -> usize {
        while self.parent[slot] != slot {
            slot = self.parent[slot];
        }
        slot
    }

    /// Merge two pool entries; the lower slot stays the representative.
    pub fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (keep, drop) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[drop] = keep;
        }
    }

    /// Nearest representative within tolerance, or a new entry at `p`.
    pub fn find_or_create(&mut self, p: Point3d) -> usize {
        let nearest = (0..self.points.len())
            .filter(|&i| self.parent[i] == i)
            .map(|i| (self.points[i].distance_to(&p), i))
            .filter(|(d, _)| *d <= self.tolerance)
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        match nearest {
            Some((_, i)) => i,
            None => self.push(p, None),
        }
    }

    pub fn of_original(&self, v: VertexId) -> Option<usize> {
        self.by_original.get(&v).map(|&s| self.find(s))
    }

    pub fn point(&self, slot: usize) -> Point3d {
        self.points[self.find(slot)]
    }

    /// True when any merged member is an input vertex.
    pub fn is_original(&self, slot: usize) -> bool {
        let root = self.find(slot);
        (0..self.points.len()).any(|i| self.originals[i].is_some() && self.find(i) == root)
    }

    /// Representatives in slot order.
    pub fn roots(&self) -> Vec<usize> {
        (0..self.points.len()).filter(|&i| self.parent[i] == i).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ─── Paves and Blocks ───────────────────────────────────────────────────────

/// A split point on a curve: pool vertex plus curve parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pave {
    pub vertex: usize,
    pub t: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockParent {
    /// Split of an input edge (registry record id).
    Edge(usize),
    /// Piece of a face/face section curve: interference index, curve index.
    Section { interference: usize, curve: usize },
}

/// A sub-interval of an edge or section curve between two consecutive paves.
#[derive(Debug, Clone, PartialEq)]
pub struct PaveBlock {
    pub curve: Curve,
    pub start: Pave,
    pub end: Pave,
    pub parent: BlockParent,
    pub common: Option<usize>,
}

impl PaveBlock {
    pub fn is_closed(&self) -> bool {
        self.start.vertex == self.end.vertex
    }

    pub fn midpoint(&self) -> Point3d {
        self.curve.evaluate(0.5 * (self.start.t + self.end.t))
    }

    pub fn point_at(&self, s: f64) -> Point3d {
        self.curve.evaluate(self.start.t + (self.end.t - self.start.t) * s)
    }

    /// True if `p` lies on this block within `tol`.
    pub fn contains_point(&self, p: &Point3d, tol: f64) -> bool {
        let (lo, hi) = (self.start.t.min(self.end.t), self.start.t.max(self.end.t));
        self.curve
            .parameter_in_range(p, lo, hi, param_tol(&self.curve, tol))
            .is_some_and(|t| self.curve.evaluate(t).distance_to(p) <= tol)
    }
}

/// Pave blocks of different parents that share one output edge.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonBlock {
    /// Member block indices, ascending; the first is the representative.
    pub blocks: Vec<usize>,
}

impl CommonBlock {
    pub fn representative(&self) -> usize {
        self.blocks[0]
    }
}

/// Split `[t_start, t_end]` at the given interior paves.
///
/// Paves closer than the parameter tolerance collapse into one; paves near
/// either end collapse into the end pave.
pub fn split(
    curve: Curve,
    start: Pave,
    end: Pave,
    interior: &[Pave],
    parent: BlockParent,
    tol: f64,
) -> Vec<PaveBlock> {
    let ptol = param_tol(&curve, tol);
    let mut paves: Vec<Pave> = interior
        .iter()
        .copied()
        .filter(|p| p.t > start.t + ptol && p.t < end.t - ptol)
        .collect();
    paves.sort_by(|a, b| a.t.total_cmp(&b.t));
    paves.dedup_by(|later, earlier| later.vertex == earlier.vertex || later.t - earlier.t <= ptol);

    let mut all = Vec::with_capacity(paves.len() + 2);
    all.push(start);
    all.extend(paves);
    all.push(end);
    all.windows(2)
        .map(|w| PaveBlock {
            curve,
            start: w[0],
            end: w[1],
            parent,
            common: None,
        })
        .collect()
}

/// Re-merge consecutive blocks into one spanning block. Returns `None` when
/// the blocks are not contiguous.
pub fn merge_adjacent(blocks: &[PaveBlock]) -> Option<PaveBlock> {
    let (first, last) = (blocks.first()?, blocks.last()?);
    let contiguous = blocks
        .windows(2)
        .all(|w| w[0].end.t == w[1].start.t && w[0].end.vertex == w[1].start.vertex && w[0].curve == w[1].curve);
    contiguous.then(|| PaveBlock {
        curve: first.curve,
        start: first.start,
        end: last.end,
        parent: first.parent,
        common: None,
    })
}

/// True when two blocks trace the same point set.
pub fn blocks_coincide(a: &PaveBlock, b: &PaveBlock, tol: f64, angular: f64) -> bool {
    match (&a.curve, &b.curve) {
        (Curve::Line(la), Curve::Line(lb)) => {
            la.direction.is_parallel_to(&lb.direction, angular) && b.contains_point(&a.midpoint(), tol)
        }
        (Curve::Circle(ca), Curve::Circle(cb)) => {
            ca.same_circle(cb, tol, angular) && b.contains_point(&a.midpoint(), tol)
        }
        _ => (1..=COMMON_BLOCK_SAMPLES)
            .map(|k| k as f64 / (COMMON_BLOCK_SAMPLES + 1) as f64)
            .all(|s| b.contains_point(&a.point_at(s), tol)),
    }
}

/// Group blocks sharing an unordered vertex pair into common blocks when
/// their images coincide. Sets `common` on every member.
pub fn merge_common(blocks: &mut [PaveBlock], tol: f64, angular: f64) -> Vec<CommonBlock> {
    let mut groups: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
    for (i, b) in blocks.iter().enumerate() {
        let key = (b.start.vertex.min(b.end.vertex), b.start.vertex.max(b.end.vertex));
        groups.entry(key).or_default().push(i);
    }

    let mut commons = Vec::new();
    for members in groups.values().filter(|m| m.len() > 1) {
        // Union-find over the group.
        let mut link: Vec<usize> = (0..members.len()).collect();
        fn root(link: &mut [usize], mut i: usize) -> usize {
            while link[i] != i {
                link[i] = link[link[i]];
                i = link[i];
            }
            i
        }
        for x in 0..members.len() {
            for y in x + 1..members.len() {
                let (bx, by) = (&blocks[members[x]], &blocks[members[y]]);
                if bx.parent != by.parent && blocks_coincide(bx, by, tol, angular) {
                    let (rx, ry) = (root(&mut link, x), root(&mut link, y));
                    link[rx.max(ry)] = rx.min(ry);
                }
            }
        }
        let mut sets: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for x in 0..members.len() {
            let r = root(&mut link, x);
            sets.entry(r).or_default().push(members[x]);
        }
        for set in sets.into_values().filter(|s| s.len() > 1) {
            let index = commons.len();
            for &b in &set {
                blocks[b].common = Some(index);
            }
            commons.push(CommonBlock { blocks: set });
        }
    }
    commons
}

// ─── Pave Filler ────────────────────────────────────────────────────────────

/// Everything the split stage produced.
#[derive(Debug, Clone)]
pub struct PaveData {
    pub pool: VertexPool,
    pub blocks: Vec<PaveBlock>,
    /// Edge record -> its blocks in parameter order.
    pub edge_blocks: HashMap<usize, Vec<usize>>,
    /// Face record -> section blocks lying on that face.
    pub section_blocks: HashMap<usize, Vec<usize>>,
    /// Face record -> edge records of the other operand in its surface.
    pub in_face_edges: HashMap<usize, Vec<usize>>,
    pub common_blocks: Vec<CommonBlock>,
    /// Face record -> pool vertices on or inside the face.
    pub face_vertices: HashMap<usize, BTreeSet<usize>>,
    /// Pool vertices where the operands touch.
    pub contact_vertices: BTreeSet<usize>,
}

impl PaveData {
    /// Blocks of a face's boundary edge record, in parameter order.
    pub fn blocks_of_edge(&self, edge_record: usize) -> &[usize] {
        self.edge_blocks.get(&edge_record).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A contact point waiting to be turned into a pave.
#[derive(Debug, Clone, Copy)]
struct PendingPave {
    edge: usize,
    pave: Pave,
    tangential: bool,
}

/// Pool roots that justify keeping a tangential contact.
///
/// A tangential pave survives only on an original vertex, or on a vertex
/// that a transversal contact or a section end also lands on.
struct TangentialSupport {
    roots: BTreeSet<usize>,
}

impl TangentialSupport {
    fn new(
        pool: &VertexPool,
        pending: &[PendingPave],
        in_face: &[(usize, usize, bool)],
        section_ends: &[usize],
    ) -> Self {
        let roots = pending
            .iter()
            .filter(|p| !p.tangential)
            .map(|p| pool.find(p.pave.vertex))
            .chain(in_face.iter().filter(|f| !f.2).map(|f| pool.find(f.1)))
            .chain(section_ends.iter().map(|&v| pool.find(v)))
            .collect();
        Self { roots }
    }

    fn keeps(&self, pool: &VertexPool, v: usize, tangential: bool) -> bool {
        !tangential || self.roots.contains(&pool.find(v)) || pool.is_original(v)
    }
}

pub struct PaveFiller<'a> {
    store: &'a EntityStore,
    tol: f64,
    angular: f64,
}

impl<'a> PaveFiller<'a> {
    pub fn new(ctx: &OperationContext, store: &'a EntityStore) -> Self {
        Self {
            store,
            tol: ctx.tolerance,
            angular: ctx.angular_tolerance,
        }
    }

    #[instrument(skip_all)]
    pub fn run(
        &self,
        ctx: &OperationContext,
        registry: &mut ShapeRegistry,
        interferences: &[Interference],
    ) -> Result<PaveData, BooleanError> {
        let mut pool = VertexPool::new(self.tol);
        for r in &registry.records {
            if let EntityRef::Vertex(v) = r.entity {
                pool.add_original(v, self.store.vertices[v].point);
            }
        }
        let vertex_slot = |pool: &VertexPool, record: usize| {
            registry.vertex_id(record).and_then(|v| pool.of_original(v))
        };

        for i in interferences {
            if let InterferenceKind::VertexVertex { .. } = i.kind {
                if let (Some(a), Some(b)) = (vertex_slot(&pool, i.first), vertex_slot(&pool, i.second)) {
                    pool.union(a, b);
                }
            }
        }

        let mut pending: Vec<PendingPave> = Vec::new();
        let mut in_face: Vec<(usize, usize, bool)> = Vec::new();
        let mut in_face_edges: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut contacts: Vec<(usize, bool)> = Vec::new();

        for i in interferences {
            match &i.kind {
                InterferenceKind::VertexVertex { .. } => {
                    contacts.extend(vertex_slot(&pool, i.first).map(|v| (v, false)));
                }
                InterferenceKind::VertexEdge { t } => {
                    if let Some(v) = vertex_slot(&pool, i.first) {
                        pending.push(PendingPave { edge: i.second, pave: Pave { vertex: v, t: *t }, tangential: false });
                        contacts.push((v, false));
                    }
                }
                InterferenceKind::VertexFace => {
                    if let Some(v) = vertex_slot(&pool, i.first) {
                        in_face.push((i.second, v, false));
                        contacts.push((v, false));
                    }
                }
                InterferenceKind::EdgeEdge { t1, t2, point } => {
                    let v = pool.find_or_create(*point);
                    pending.push(PendingPave { edge: i.first, pave: Pave { vertex: v, t: *t1 }, tangential: i.tangential });
                    pending.push(PendingPave { edge: i.second, pave: Pave { vertex: v, t: *t2 }, tangential: i.tangential });
                    contacts.push((v, i.tangential));
                }
                InterferenceKind::EdgeFace { t, point } => {
                    let v = pool.find_or_create(*point);
                    pending.push(PendingPave { edge: i.first, pave: Pave { vertex: v, t: *t }, tangential: i.tangential });
                    in_face.push((i.second, v, i.tangential));
                    contacts.push((v, i.tangential));
                }
                InterferenceKind::EdgeInFace => {
                    in_face_edges.entry(i.second).or_default().push(i.first);
                }
                InterferenceKind::EdgeOverlap { .. }
                | InterferenceKind::FaceSection { .. }
                | InterferenceKind::FaceCoincident { .. } => {}
            }
        }
        ctx.check_cancelled()?;

        // Section ends are known before splitting; their vertices support
        // tangential paves landing on them.
        let mut section_ends: Vec<((usize, usize), [usize; 2])> = Vec::new();
        for (k, i) in interferences.iter().enumerate() {
            if let InterferenceKind::FaceSection { curves } = &i.kind {
                for (c, sc) in curves.iter().enumerate() {
                    let (a, b) = self.section_end_slots(&mut pool, sc);
                    section_ends.push(((k, c), [a, b]));
                }
            }
        }

        let support = TangentialSupport::new(
            &pool,
            &pending,
            &in_face,
            &section_ends.iter().flat_map(|(_, ends)| *ends).collect::<Vec<usize>>(),
        );
        let keep = |pool: &VertexPool, v: usize, tangential: bool| support.keeps(pool, v, tangential);
        let dropped = pending.iter().filter(|p| !keep(&pool, p.pave.vertex, p.tangential)).count();
        if dropped > 0 {
            debug!(dropped, "tangential paves without support dropped");
        }

        // Split every edge record.
        let mut blocks: Vec<PaveBlock> = Vec::new();
        let mut edge_blocks: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut per_edge: BTreeMap<usize, Vec<Pave>> = BTreeMap::new();
        for p in pending.iter().filter(|p| keep(&pool, p.pave.vertex, p.tangential)) {
            per_edge.entry(p.edge).or_default().push(Pave {
                vertex: pool.find(p.pave.vertex),
                t: p.pave.t,
            });
        }
        let edge_records: Vec<(usize, EdgeId)> = registry
            .records
            .iter()
            .filter_map(|r| match r.entity {
                EntityRef::Edge(e) => Some((r.id, e)),
                _ => None,
            })
            .collect();
        for (record, e) in edge_records {
            let edge = &self.store.edges[e];
            let (Some(sv), Some(ev)) = (pool.of_original(edge.start_vertex), pool.of_original(edge.end_vertex))
            else {
                return Err(BooleanError::InvalidTopology(format!("edge {record} has unindexed vertices")));
            };
            let (start, end) = if edge.t_start <= edge.t_end {
                (Pave { vertex: sv, t: edge.t_start }, Pave { vertex: ev, t: edge.t_end })
            } else {
                (Pave { vertex: ev, t: edge.t_end }, Pave { vertex: sv, t: edge.t_start })
            };
            let interior = per_edge.get(&record).map(Vec::as_slice).unwrap_or(&[]);
            let pieces = split(edge.curve, start, end, interior, BlockParent::Edge(record), self.tol);

            let merged = merge_adjacent(&pieces);
            if merged.as_ref().map(|m| (m.start.t, m.end.t)) != Some((start.t, end.t)) {
                return Err(BooleanError::InvalidTopology(format!(
                    "pave blocks of edge {record} do not partition its range"
                )));
            }

            let ids: Vec<usize> = (blocks.len()..blocks.len() + pieces.len()).collect();
            for &b in &ids {
                registry.push_split(record, b);
            }
            blocks.extend(pieces);
            edge_blocks.insert(record, ids);
        }
        ctx.check_cancelled()?;

        // Pool vertices on or inside each face.
        let mut face_vertices: HashMap<usize, BTreeSet<usize>> = HashMap::new();
        for r in &registry.records {
            let EntityRef::Face(f) = r.entity else {
                continue;
            };
            let set = face_vertices.entry(r.id).or_default();
            for l in self.store.face_loops(f) {
                for &he in &self.store.loops[l].half_edges {
                    let Some(er) = registry.id_of(EntityRef::Edge(self.store.half_edges[he].edge)) else {
                        continue;
                    };
                    for &b in edge_blocks.get(&er).map(Vec::as_slice).unwrap_or(&[]) {
                        set.insert(blocks[b].start.vertex);
                        set.insert(blocks[b].end.vertex);
                    }
                }
            }
        }
        for &(face, v, tangential) in &in_face {
            if keep(&pool, v, tangential) {
                face_vertices.entry(face).or_default().insert(pool.find(v));
            }
        }
        for (&face, edges) in &in_face_edges {
            let set = face_vertices.entry(face).or_default();
            for er in edges {
                for &b in edge_blocks.get(er).map(Vec::as_slice).unwrap_or(&[]) {
                    set.insert(blocks[b].start.vertex);
                    set.insert(blocks[b].end.vertex);
                }
            }
        }

        // Section curves, split at the pool vertices of both faces.
        let mut section_blocks: HashMap<usize, Vec<usize>> = HashMap::new();
        for ((k, c), [a, b]) in section_ends {
            let i = &interferences[k];
            let InterferenceKind::FaceSection { curves } = &i.kind else {
                continue;
            };
            let sc = curves[c];
            let candidates: BTreeSet<usize> = [i.first, i.second]
                .iter()
                .filter_map(|f| face_vertices.get(f))
                .flatten()
                .copied()
                .collect();
            let pieces = self.split_section(&pool, &sc, pool.find(a), pool.find(b), &candidates, BlockParent::Section {
                interference: k,
                curve: c,
            });
            let ids: Vec<usize> = (blocks.len()..blocks.len() + pieces.len()).collect();
            for face in [i.first, i.second] {
                section_blocks.entry(face).or_default().extend(ids.iter().copied());
                face_vertices
                    .entry(face)
                    .or_default()
                    .extend(pieces.iter().flat_map(|p| [p.start.vertex, p.end.vertex]));
            }
            blocks.extend(pieces);
        }

        let common_blocks = merge_common(&mut blocks, self.tol, self.angular);
        let contact_vertices = contacts
            .into_iter()
            .filter(|&(v, tangential)| keep(&pool, v, tangential))
            .map(|(v, _)| pool.find(v))
            .collect();

        info!(
            pool = pool.roots().len(),
            blocks = blocks.len(),
            common = common_blocks.len(),
            "edges and sections split"
        );
        Ok(PaveData {
            pool,
            blocks,
            edge_blocks,
            section_blocks,
            in_face_edges,
            common_blocks,
            face_vertices,
            contact_vertices,
        })
    }

    /// Pool vertices at both ends of a section curve (the same for a closed one).
    fn section_end_slots(&self, pool: &mut VertexPool, sc: &SectionCurve) -> (usize, usize) {
        let a = pool.find_or_create(sc.curve.evaluate(sc.t0));
        if sc.is_closed() {
            return (a, a);
        }
        (a, pool.find_or_create(sc.curve.evaluate(sc.t1)))
    }

    fn split_section(
        &self,
        pool: &VertexPool,
        sc: &SectionCurve,
        a: usize,
        b: usize,
        candidates: &BTreeSet<usize>,
        parent: BlockParent,
    ) -> Vec<PaveBlock> {
        let ptol = param_tol(&sc.curve, self.tol);
        let mut interior: Vec<Pave> = candidates
            .iter()
            .filter(|&&v| v != a && v != b)
            .filter_map(|&v| {
                let p = pool.point(v);
                let t = sc.curve.parameter_in_range(&p, sc.t0, sc.t1, ptol)?;
                (sc.curve.evaluate(t).distance_to(&p) <= self.tol).then_some(Pave { vertex: v, t })
            })
            .collect();
        interior.sort_by(|x, y| x.t.total_cmp(&y.t));

        if sc.is_closed() && !interior.is_empty() && !candidates.contains(&a) {
            // Start the closed curve at a real contact instead of the seam.
            let first = interior.remove(0);
            let period = sc.t1 - sc.t0;
            let shifted: Vec<Pave> = interior
                .into_iter()
                .map(|p| Pave { vertex: p.vertex, t: if p.t < first.t { p.t + period } else { p.t } })
                .collect();
            let start = first;
            let end = Pave { vertex: first.vertex, t: first.t + period };
            return split(sc.curve, start, end, &shifted, parent, self.tol);
        }
        split(sc.curve, Pave { vertex: a, t: sc.t0 }, Pave { vertex: b, t: sc.t1 }, &interior, parent, self.tol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::curves::{Circle3d, Line3d};
    use crate::geometry::vector::Vec3;
    use std::f64::consts::TAU;

    fn x_line() -> Curve {
        Curve::Line(Line3d::new(Point3d::ORIGIN, Vec3::X))
    }

    #[test]
    fn test_pool_union_keeps_lowest_slot() {
        let mut pool = VertexPool::new(1e-7);
        let a = pool.find_or_create(Point3d::new(0.0, 0.0, 0.0));
        let b = pool.find_or_create(Point3d::new(1.0, 0.0, 0.0));
        assert_ne!(a, b);
        pool.union(b, a);
        assert_eq!(pool.find(b), a);
        assert_eq!(pool.find_or_create(Point3d::new(1e-8, 0.0, 0.0)), a);
        assert_eq!(pool.roots(), vec![a]);
    }

    fn tangential(edge: usize, vertex: usize) -> PendingPave {
        PendingPave { edge, pave: Pave { vertex, t: 0.5 }, tangential: true }
    }

    #[test]
    fn test_tangential_pave_without_support_is_dropped() {
        let mut pool = VertexPool::new(1e-7);
        let v = pool.find_or_create(Point3d::new(0.0, 0.0, 1.0));
        let pending = [tangential(0, v)];
        let in_face = [(4, v, true)];
        let support = TangentialSupport::new(&pool, &pending, &in_face, &[]);
        assert!(!support.keeps(&pool, v, true));
        assert!(support.keeps(&pool, v, false));
    }

    #[test]
    fn test_tangential_pave_kept_by_transversal_contact() {
        let mut pool = VertexPool::new(1e-7);
        let v = pool.find_or_create(Point3d::new(0.25, 0.0, 0.0));
        let w = pool.find_or_create(Point3d::new(0.25, 0.0, 1e-3));
        pool.union(v, w);

        let transversal = PendingPave { edge: 1, pave: Pave { vertex: w, t: 0.1 }, tangential: false };
        let pending = [tangential(0, v), transversal];
        let support = TangentialSupport::new(&pool, &pending, &[], &[]);
        assert!(support.keeps(&pool, v, true));

        let pending = [tangential(0, v)];
        let support = TangentialSupport::new(&pool, &pending, &[(3, w, false)], &[]);
        assert!(support.keeps(&pool, v, true));

        let support = TangentialSupport::new(&pool, &pending, &[(3, w, true)], &[]);
        assert!(!support.keeps(&pool, v, true));
    }

    #[test]
    fn test_tangential_pave_kept_at_section_end() {
        let mut pool = VertexPool::new(1e-7);
        let v = pool.find_or_create(Point3d::new(0.5, 0.5, 0.0));
        let end = pool.find_or_create(Point3d::new(0.5, 0.5, 0.0));
        assert_eq!(end, v);
        let pending = [tangential(2, v)];
        let support = TangentialSupport::new(&pool, &pending, &[], &[end]);
        assert!(support.keeps(&pool, v, true));
    }

    #[test]
    fn test_tangential_pave_kept_on_original_vertex() {
        let mut pool = VertexPool::new(1e-7);
        let original = pool.add_original(VertexId::default(), Point3d::new(1.0, 0.0, 0.0));
        let v = pool.find_or_create(Point3d::new(1.0, 0.0, 1e-9));
        assert_eq!(v, original);
        let w = pool.find_or_create(Point3d::new(1.0, 0.0, 0.5));
        pool.union(w, original);

        let pending = [tangential(0, v), tangential(1, w)];
        let support = TangentialSupport::new(&pool, &pending, &[], &[]);
        assert!(support.keeps(&pool, v, true));
        assert!(support.keeps(&pool, w, true));
    }

    #[test]
    fn test_split_sorts_and_dedups() {
        let start = Pave { vertex: 0, t: 0.0 };
        let end = Pave { vertex: 1, t: 4.0 };
        let interior = [
            Pave { vertex: 3, t: 3.0 },
            Pave { vertex: 2, t: 1.0 },
            Pave { vertex: 2, t: 1.0 + 1e-9 },
            Pave { vertex: 4, t: 1e-9 },
        ];
        let blocks = split(x_line(), start, end, &interior, BlockParent::Edge(0), 1e-7);
        let ts: Vec<(f64, f64)> = blocks.iter().map(|b| (b.start.t, b.end.t)).collect();
        assert_eq!(ts, vec![(0.0, 1.0), (1.0, 3.0), (3.0, 4.0)]);
        assert_eq!(blocks[1].start.vertex, 2);
    }

    #[test]
    fn test_merge_adjacent_reproduces_range() {
        let start = Pave { vertex: 0, t: 0.25 };
        let end = Pave { vertex: 1, t: 7.5 };
        let interior: Vec<Pave> = (0..10).map(|k| Pave { vertex: 10 + k, t: 0.5 + 0.6 * k as f64 }).collect();
        let blocks = split(x_line(), start, end, &interior, BlockParent::Edge(0), 1e-7);
        assert_eq!(blocks.len(), 11);
        let merged = merge_adjacent(&blocks).unwrap();
        assert_eq!((merged.start.t, merged.end.t), (0.25, 7.5));
        assert!(merge_adjacent(&[blocks[0].clone(), blocks[2].clone()]).is_none());
    }

    #[test]
    fn test_merge_common_links_coincident_lines() {
        let a = Pave { vertex: 0, t: 0.0 };
        let b = Pave { vertex: 1, t: 1.0 };
        let other_line = Curve::Line(Line3d::new(Point3d::new(1.0, 0.0, 0.0), -Vec3::X));
        let mut blocks = vec![
            PaveBlock { curve: x_line(), start: a, end: b, parent: BlockParent::Edge(0), common: None },
            PaveBlock {
                curve: other_line,
                start: Pave { vertex: 1, t: 0.0 },
                end: Pave { vertex: 0, t: 1.0 },
                parent: BlockParent::Edge(5),
                common: None,
            },
        ];
        let commons = merge_common(&mut blocks, 1e-7, 1e-9);
        assert_eq!(commons.len(), 1);
        assert_eq!(commons[0].blocks, vec![0, 1]);
        assert_eq!(blocks[1].common, Some(0));
    }

    #[test]
    fn test_merge_common_keeps_complementary_arcs_apart() {
        let circle = Curve::Circle(Circle3d::with_axes(Point3d::ORIGIN, Vec3::Z, Vec3::X, 1.0));
        let mut blocks = vec![
            PaveBlock {
                curve: circle,
                start: Pave { vertex: 0, t: 0.0 },
                end: Pave { vertex: 1, t: TAU / 2.0 },
                parent: BlockParent::Edge(0),
                common: None,
            },
            PaveBlock {
                curve: circle,
                start: Pave { vertex: 1, t: TAU / 2.0 },
                end: Pave { vertex: 0, t: TAU },
                parent: BlockParent::Edge(1),
                common: None,
            },
        ];
        assert!(merge_common(&mut blocks, 1e-7, 1e-9).is_empty());
    }

    #[test]
    fn test_mixed_kinds_compared_by_samples() {
        let circle = Curve::Circle(Circle3d::with_axes(Point3d::ORIGIN, Vec3::Z, Vec3::X, 1.0));
        let arc = PaveBlock {
            curve: circle,
            start: Pave { vertex: 0, t: 0.0 },
            end: Pave { vertex: 1, t: 1.0 },
            parent: BlockParent::Edge(0),
            common: None,
        };
        let chord = PaveBlock {
            curve: Curve::Line(Line3d::from_points(circle.evaluate(0.0), circle.evaluate(1.0)).unwrap()),
            start: Pave { vertex: 0, t: 0.0 },
            end: Pave { vertex: 1, t: circle.evaluate(0.0).distance_to(&circle.evaluate(1.0)) },
            parent: BlockParent::Edge(1),
            common: None,
        };
        assert!(!blocks_coincide(&arc, &chord, 1e-7, 1e-9));
    }
}
