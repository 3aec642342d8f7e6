use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

use crate::geometry::curves::Curve;
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::Surface;
use crate::geometry::transform::BoundingBox;
use crate::geometry::CurveEval;

// ─── Entity Keys ─────────────────────────────────────────────────────────────

new_key_type! {
    pub struct VertexId;
    pub struct EdgeId;
    pub struct HalfEdgeId;
    pub struct LoopId;
    pub struct FaceId;
    pub struct ShellId;
    pub struct SolidId;
    pub struct CompoundId;
}

// ─── Topological Entities ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub point: Point3d,
    pub tolerance: f64,
}

/// A bounded piece of a curve: `curve(t_start)` is the start vertex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub curve: Curve,
    pub t_start: f64,
    pub t_end: f64,
    pub start_vertex: VertexId,
    pub end_vertex: VertexId,
    pub half_edges: Vec<HalfEdgeId>,
    pub tolerance: f64,
}

impl Edge {
    /// Closed edges (full circles) start and end on the same vertex.
    pub fn is_closed(&self) -> bool {
        self.start_vertex == self.end_vertex
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HalfEdge {
    pub edge: EdgeId,
    pub face: FaceId,
    pub loop_id: LoopId,
    pub start_vertex: VertexId,
    pub end_vertex: VertexId,
    /// true if this half-edge traverses the edge from `t_start` to `t_end`.
    pub forward: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loop {
    pub half_edges: Vec<HalfEdgeId>,
    pub face: FaceId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Face {
    pub surface: Surface,
    /// `None` for a face covering a whole closed surface (e.g. a sphere).
    pub outer_loop: Option<LoopId>,
    pub inner_loops: Vec<LoopId>,
    /// true if the face normal agrees with the surface normal.
    pub same_sense: bool,
    pub shell: Option<ShellId>,
    pub tolerance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShellOrientation {
    /// Outer shell (normals point outward).
    Outward,
    /// Void shell (normals point inward, represents a cavity).
    Inward,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shell {
    pub faces: Vec<FaceId>,
    pub orientation: ShellOrientation,
    pub solid: Option<SolidId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solid {
    pub shells: Vec<ShellId>,
}

/// A heterogeneous collection of top-level shapes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Compound {
    pub solids: Vec<SolidId>,
    pub shells: Vec<ShellId>,
    pub faces: Vec<FaceId>,
    pub edges: Vec<EdgeId>,
    pub vertices: Vec<VertexId>,
}

impl Compound {
    pub fn is_empty(&self) -> bool {
        self.solids.is_empty()
            && self.shells.is_empty()
            && self.faces.is_empty()
            && self.edges.is_empty()
            && self.vertices.is_empty()
    }
}

/// Reference to a top-level shape in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeRef {
    Solid(SolidId),
    Shell(ShellId),
    Face(FaceId),
    Compound(CompoundId),
}

// ─── Entity Store ────────────────────────────────────────────────────────────

/// Arena-based storage for all topological entities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityStore {
    pub vertices: SlotMap<VertexId, Vertex>,
    pub edges: SlotMap<EdgeId, Edge>,
    pub half_edges: SlotMap<HalfEdgeId, HalfEdge>,
    pub loops: SlotMap<LoopId, Loop>,
    pub faces: SlotMap<FaceId, Face>,
    pub shells: SlotMap<ShellId, Shell>,
    pub solids: SlotMap<SolidId, Solid>,
    pub compounds: SlotMap<CompoundId, Compound>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outer loop (if any) followed by the inner loops.
    pub fn face_loops(&self, face_id: FaceId) -> impl Iterator<Item = LoopId> + '_ {
        let face = &self.faces[face_id];
        face.outer_loop.into_iter().chain(face.inner_loops.iter().copied())
    }

    /// Parameters of a half-edge in traversal order.
    pub fn half_edge_range(&self, he_id: HalfEdgeId) -> (f64, f64) {
        let he = &self.half_edges[he_id];
        let edge = &self.edges[he.edge];
        if he.forward {
            (edge.t_start, edge.t_end)
        } else {
            (edge.t_end, edge.t_start)
        }
    }

    pub fn solid_faces(&self, solid_id: SolidId) -> Vec<FaceId> {
        self.solids[solid_id]
            .shells
            .iter()
            .flat_map(|&s| self.shells[s].faces.iter().copied())
            .collect()
    }

    /// Count topological entities for a shell: (vertices, edges, faces, loops).
    pub fn count_topology(&self, shell_id: ShellId) -> (usize, usize, usize, usize) {
        let shell = &self.shells[shell_id];
        let mut edge_set = HashSet::new();
        let mut vertex_set = HashSet::new();
        let mut loop_count = 0;

        for &face_id in &shell.faces {
            for loop_id in self.face_loops(face_id) {
                loop_count += 1;
                for &he_id in &self.loops[loop_id].half_edges {
                    let he = &self.half_edges[he_id];
                    edge_set.insert(he.edge);
                    vertex_set.insert(he.start_vertex);
                    vertex_set.insert(he.end_vertex);
                }
            }
        }

        (vertex_set.len(), edge_set.len(), shell.faces.len(), loop_count)
    }

    /// Edges of `faces` not used exactly as often forward as backward.
    pub fn unbalanced_edges(&self, faces: &[FaceId]) -> Vec<EdgeId> {
        let mut uses: HashMap<EdgeId, (usize, usize)> = HashMap::new();
        let mut order = Vec::new();
        for &face_id in faces {
            for loop_id in self.face_loops(face_id) {
                for &he_id in &self.loops[loop_id].half_edges {
                    let he = &self.half_edges[he_id];
                    let entry = uses.entry(he.edge).or_insert_with(|| {
                        order.push(he.edge);
                        (0, 0)
                    });
                    if he.forward {
                        entry.0 += 1;
                    } else {
                        entry.1 += 1;
                    }
                }
            }
        }
        order.into_iter().filter(|e| uses[e].0 != uses[e].1).collect()
    }

    pub fn edge_bounding_box(&self, edge_id: EdgeId) -> BoundingBox {
        let edge = &self.edges[edge_id];
        edge.curve
            .bounding_box(edge.t_start, edge.t_end)
            .expanded(edge.tolerance)
    }

    pub fn face_bounding_box(&self, face_id: FaceId) -> BoundingBox {
        let face = &self.faces[face_id];
        if let Surface::Sphere(s) = &face.surface {
            return s.bounding_box().expanded(face.tolerance);
        }
        let mut bb = BoundingBox::empty();
        for loop_id in self.face_loops(face_id) {
            for &he_id in &self.loops[loop_id].half_edges {
                bb = bb.union(&self.edge_bounding_box(self.half_edges[he_id].edge));
            }
        }
        bb.expanded(face.tolerance)
    }

    /// Compute axis-aligned bounding box for a solid.
    pub fn solid_bounding_box(&self, solid_id: SolidId) -> BoundingBox {
        self.solid_faces(solid_id)
            .into_iter()
            .fold(BoundingBox::empty(), |bb, f| bb.union(&self.face_bounding_box(f)))
    }
}

// ─── Topology Audit ─────────────────────────────────────────────────────────

/// Result of a topological consistency check.
#[derive(Debug, Clone)]
pub struct TopologyAudit {
    pub euler_valid: bool,
    pub all_edges_two_faced: bool,
    pub all_faces_closed: bool,
    pub vertices_on_curves: bool,
    pub errors: Vec<TopologyError>,
}

#[derive(Debug, Clone)]
pub enum TopologyError {
    EulerViolation {
        shell: ShellId,
        v: usize,
        e: usize,
        f: usize,
        loops: usize,
    },
    OpenLoop {
        loop_id: LoopId,
    },
    UnbalancedEdge {
        shell: ShellId,
        edge: EdgeId,
    },
    VertexPositionMismatch {
        vertex: VertexId,
        edge: EdgeId,
        distance: f64,
    },
}

impl TopologyAudit {
    pub fn all_valid(&self) -> bool {
        self.euler_valid && self.all_edges_two_faced && self.all_faces_closed && self.vertices_on_curves
    }
}

/// Perform a full topology audit on a solid.
///
/// The Euler check assumes genus-0 shells: `V - E + 2F - L = 2`, where `L`
/// counts all loops (a loop-free sphere face contributes `2F`).
pub fn audit_solid(store: &EntityStore, solid_id: SolidId) -> TopologyAudit {
    let solid = &store.solids[solid_id];
    let mut errors = Vec::new();

    for &shell_id in &solid.shells {
        let (v, e, f, loops) = store.count_topology(shell_id);
        let chi = v as i64 - e as i64 + 2 * f as i64 - loops as i64;
        if chi != 2 {
            errors.push(TopologyError::EulerViolation { shell: shell_id, v, e, f, loops });
        }

        let shell = &store.shells[shell_id];
        for &face_id in &shell.faces {
            for loop_id in store.face_loops(face_id) {
                if !is_loop_closed(store, loop_id) {
                    errors.push(TopologyError::OpenLoop { loop_id });
                }
            }
        }
        for edge in store.unbalanced_edges(&shell.faces) {
            errors.push(TopologyError::UnbalancedEdge { shell: shell_id, edge });
        }
    }

    for face_id in store.solid_faces(solid_id) {
        for loop_id in store.face_loops(face_id) {
            for &he_id in &store.loops[loop_id].half_edges {
                let edge_id = store.half_edges[he_id].edge;
                let edge = &store.edges[edge_id];
                for (vertex, t) in [(edge.start_vertex, edge.t_start), (edge.end_vertex, edge.t_end)] {
                    let v = &store.vertices[vertex];
                    let distance = edge.curve.evaluate(t).distance_to(&v.point);
                    if distance > v.tolerance.max(edge.tolerance) * 10.0 {
                        errors.push(TopologyError::VertexPositionMismatch { vertex, edge: edge_id, distance });
                    }
                }
            }
        }
    }

    TopologyAudit {
        euler_valid: !errors.iter().any(|e| matches!(e, TopologyError::EulerViolation { .. })),
        all_edges_two_faced: !errors.iter().any(|e| matches!(e, TopologyError::UnbalancedEdge { .. })),
        all_faces_closed: !errors.iter().any(|e| matches!(e, TopologyError::OpenLoop { .. })),
        vertices_on_curves: !errors
            .iter()
            .any(|e| matches!(e, TopologyError::VertexPositionMismatch { .. })),
        errors,
    }
}

/// Consecutive half-edges chain end-to-start, and the last closes on the first.
pub fn is_loop_closed(store: &EntityStore, loop_id: LoopId) -> bool {
    let hes = &store.loops[loop_id].half_edges;
    let (Some(first), Some(last)) = (hes.first(), hes.last()) else {
        return false;
    };
    let chained = hes.windows(2).all(|w| {
        store.half_edges[w[0]].end_vertex == store.half_edges[w[1]].start_vertex
    });
    chained && store.half_edges[*last].end_vertex == store.half_edges[*first].start_vertex
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::primitives::{make_box, make_sphere};

    #[test]
    fn test_entity_store_creation() {
        let store = EntityStore::new();
        assert_eq!(store.vertices.len(), 0);
        assert_eq!(store.compounds.len(), 0);
    }

    #[test]
    fn test_box_audit_is_clean() {
        let mut store = EntityStore::new();
        let solid = make_box(&mut store, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0).unwrap();
        let audit = audit_solid(&store, solid);
        assert!(audit.all_valid(), "errors: {:?}", audit.errors);
        let shell = store.solids[solid].shells[0];
        assert_eq!(store.count_topology(shell), (8, 12, 6, 6));
    }

    #[test]
    fn test_sphere_audit_is_clean() {
        let mut store = EntityStore::new();
        let solid = make_sphere(&mut store, Point3d::ORIGIN, 1.0).unwrap();
        let audit = audit_solid(&store, solid);
        assert!(audit.all_valid(), "errors: {:?}", audit.errors);
    }

    #[test]
    fn test_open_shell_has_unbalanced_edges() {
        let mut store = EntityStore::new();
        let solid = make_box(&mut store, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0).unwrap();
        let shell = store.solids[solid].shells[0];
        let faces: Vec<FaceId> = store.shells[shell].faces[1..].to_vec();
        assert_eq!(store.unbalanced_edges(&faces).len(), 4);
        assert!(store.unbalanced_edges(&store.shells[shell].faces).is_empty());
    }

    #[test]
    fn test_solid_bounding_box() {
        let mut store = EntityStore::new();
        let solid = make_box(&mut store, -1.0, 0.0, 2.0, 1.0, 3.0, 4.0).unwrap();
        let bb = store.solid_bounding_box(solid);
        assert!((bb.min.x + 1.0).abs() < 1e-6);
        assert!((bb.max.y - 3.0).abs() < 1e-6);
    }
}
