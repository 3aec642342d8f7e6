use super::brep::*;
use crate::geometry::curves::Curve;
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::Surface;

/// Construction capability for B-Rep entities.
///
/// Implementors keep the back-references (half-edge to edge, loop to face,
/// face to shell, shell to solid) consistent as entities are created.
pub trait ShapeBuilder {
    fn make_vertex(&mut self, point: Point3d, tolerance: f64) -> VertexId;

    /// An edge over `[t_start, t_end]` of `curve` with no face uses yet.
    fn make_edge(
        &mut self,
        curve: Curve,
        t_start: f64,
        t_end: f64,
        start: VertexId,
        end: VertexId,
        tolerance: f64,
    ) -> EdgeId;

    /// A face with no loops; see [`ShapeBuilder::add_loop`].
    fn make_face(&mut self, surface: Surface, same_sense: bool, tolerance: f64) -> FaceId;

    /// Append a loop of `(edge, forward)` uses to a face. The first loop
    /// flagged `outer` becomes the outer loop; all others are inner loops.
    fn add_loop(&mut self, face: FaceId, uses: &[(EdgeId, bool)], outer: bool) -> LoopId;

    fn make_shell(&mut self, faces: &[FaceId], orientation: ShellOrientation) -> ShellId;

    fn make_solid(&mut self, shells: &[ShellId]) -> SolidId;

    fn make_compound(&mut self, contents: Compound) -> CompoundId;
}

impl ShapeBuilder for EntityStore {
    fn make_vertex(&mut self, point: Point3d, tolerance: f64) -> VertexId {
        self.vertices.insert(Vertex { point, tolerance })
    }

    fn make_edge(
        &mut self,
        curve: Curve,
        t_start: f64,
        t_end: f64,
        start: VertexId,
        end: VertexId,
        tolerance: f64,
    ) -> EdgeId {
        self.edges.insert(Edge {
            curve,
            t_start,
            t_end,
            start_vertex: start,
            end_vertex: end,
            half_edges: Vec::new(),
            tolerance,
        })
    }

    fn make_face(&mut self, surface: Surface, same_sense: bool, tolerance: f64) -> FaceId {
        self.faces.insert(Face {
            surface,
            outer_loop: None,
            inner_loops: Vec::new(),
            same_sense,
            shell: None,
            tolerance,
        })
    }

    fn add_loop(&mut self, face: FaceId, uses: &[(EdgeId, bool)], outer: bool) -> LoopId {
        let loop_id = self.loops.insert(Loop {
            half_edges: Vec::with_capacity(uses.len()),
            face,
        });
        for &(edge_id, forward) in uses {
            let edge = &self.edges[edge_id];
            let (start_vertex, end_vertex) = if forward {
                (edge.start_vertex, edge.end_vertex)
            } else {
                (edge.end_vertex, edge.start_vertex)
            };
            let he_id = self.half_edges.insert(HalfEdge {
                edge: edge_id,
                face,
                loop_id,
                start_vertex,
                end_vertex,
                forward,
            });
            self.edges[edge_id].half_edges.push(he_id);
            self.loops[loop_id].half_edges.push(he_id);
        }
        let face_entry = &mut self.faces[face];
        if outer && face_entry.outer_loop.is_none() {
            face_entry.outer_loop = Some(loop_id);
        } else {
            face_entry.inner_loops.push(loop_id);
        }
        loop_id
    }

    fn make_shell(&mut self, faces: &[FaceId], orientation: ShellOrientation) -> ShellId {
        let shell_id = self.shells.insert(Shell {
            faces: faces.to_vec(),
            orientation,
            solid: None,
        });
        for &f in faces {
            self.faces[f].shell = Some(shell_id);
        }
        shell_id
    }

    fn make_solid(&mut self, shells: &[ShellId]) -> SolidId {
        let solid_id = self.solids.insert(Solid {
            shells: shells.to_vec(),
        });
        for &s in shells {
            self.shells[s].solid = Some(solid_id);
        }
        solid_id
    }

    fn make_compound(&mut self, contents: Compound) -> CompoundId {
        self.compounds.insert(contents)
    }
}
