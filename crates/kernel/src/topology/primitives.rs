use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, instrument};

use super::brep::*;
use super::builder::ShapeBuilder;
use crate::geometry::curves::{Curve, Line3d};
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::{Plane, Sphere, Surface};
use crate::geometry::transform::Transform;
use crate::geometry::vector::Vec3;

#[derive(Debug, Error)]
pub enum PrimitiveError {
    #[error("face {face} has fewer than three vertices")]
    TooFewVertices { face: usize },
    #[error("face {face} references vertex index {index} out of range")]
    IndexOutOfRange { face: usize, index: usize },
    #[error("face {face} is degenerate (zero area or coincident vertices)")]
    DegenerateFace { face: usize },
    #[error("face {face} is not planar (deviation {deviation:.3e})")]
    NonPlanarFace { face: usize, deviation: f64 },
    #[error("radius must be positive, got {0}")]
    NonPositiveRadius(f64),
    #[error("box extent is zero along at least one axis")]
    DegenerateBox,
}

/// Build a closed polyhedral shell from points and faces given as vertex
/// index lists, wound counter-clockwise around the outward normal.
///
/// Each edge is a line running from its lower-indexed vertex to its
/// higher-indexed one, parametrized by arc length.
#[instrument(skip(store, points, faces), fields(points = points.len(), faces = faces.len()))]
pub fn make_polyhedral_shell(
    store: &mut EntityStore,
    points: &[Point3d],
    faces: &[Vec<usize>],
) -> Result<ShellId, PrimitiveError> {
    let tol = crate::default_tolerance().coincidence;
    let vertex_ids: Vec<VertexId> = points.iter().map(|p| store.make_vertex(*p, tol)).collect();
    let mut edge_map: HashMap<(usize, usize), EdgeId> = HashMap::new();
    let mut face_ids = Vec::with_capacity(faces.len());

    for (fi, indices) in faces.iter().enumerate() {
        if indices.len() < 3 {
            return Err(PrimitiveError::TooFewVertices { face: fi });
        }
        if let Some(&index) = indices.iter().find(|&&i| i >= points.len()) {
            return Err(PrimitiveError::IndexOutOfRange { face: fi, index });
        }
        let corners: Vec<Point3d> = indices.iter().map(|&i| points[i]).collect();
        let plane = polygon_plane(&corners).ok_or(PrimitiveError::DegenerateFace { face: fi })?;
        let deviation = corners
            .iter()
            .map(|p| plane.distance_to_point(p).abs())
            .fold(0.0, f64::max);
        if deviation > tol * 10.0 {
            return Err(PrimitiveError::NonPlanarFace { face: fi, deviation });
        }

        let mut uses = Vec::with_capacity(indices.len());
        for k in 0..indices.len() {
            let from = indices[k];
            let to = indices[(k + 1) % indices.len()];
            let key = (from.min(to), from.max(to));
            let edge_id = match edge_map.get(&key) {
                Some(&e) => e,
                None => {
                    let (lo, hi) = key;
                    let line = Line3d::from_points(points[lo], points[hi])
                        .ok_or(PrimitiveError::DegenerateFace { face: fi })?;
                    let length = points[lo].distance_to(&points[hi]);
                    let e = store.make_edge(Curve::Line(line), 0.0, length, vertex_ids[lo], vertex_ids[hi], tol);
                    edge_map.insert(key, e);
                    e
                }
            };
            uses.push((edge_id, from < to));
        }

        let face_id = store.make_face(Surface::Plane(plane), true, tol);
        store.add_loop(face_id, &uses, true);
        face_ids.push(face_id);
    }

    debug!(edges = edge_map.len(), "polyhedral shell assembled");
    Ok(store.make_shell(&face_ids, ShellOrientation::Outward))
}

/// Build a polyhedral solid; see [`make_polyhedral_shell`] for the input layout.
pub fn make_polyhedron(
    store: &mut EntityStore,
    points: &[Point3d],
    faces: &[Vec<usize>],
) -> Result<SolidId, PrimitiveError> {
    let shell = make_polyhedral_shell(store, points, faces)?;
    Ok(store.make_solid(&[shell]))
}

/// Build a box solid directly from corner coordinates.
/// The box is axis-aligned with one corner at (x0,y0,z0) and opposite at (x1,y1,z1).
#[instrument(skip(store))]
pub fn make_box(
    store: &mut EntityStore,
    x0: f64,
    y0: f64,
    z0: f64,
    x1: f64,
    y1: f64,
    z1: f64,
) -> Result<SolidId, PrimitiveError> {
    info!(min = ?[x0, y0, z0], max = ?[x1, y1, z1], "creating box primitive");
    let (x0, x1) = (x0.min(x1), x0.max(x1));
    let (y0, y1) = (y0.min(y1), y0.max(y1));
    let (z0, z1) = (z0.min(z1), z0.max(z1));
    let tol = crate::default_tolerance().coincidence;
    if x1 - x0 <= tol || y1 - y0 <= tol || z1 - z0 <= tol {
        return Err(PrimitiveError::DegenerateBox);
    }

    let points = [
        Point3d::new(x0, y0, z0),
        Point3d::new(x1, y0, z0),
        Point3d::new(x1, y1, z0),
        Point3d::new(x0, y1, z0),
        Point3d::new(x0, y0, z1),
        Point3d::new(x1, y0, z1),
        Point3d::new(x1, y1, z1),
        Point3d::new(x0, y1, z1),
    ];
    let faces = vec![
        vec![0, 3, 2, 1], // z = z0
        vec![4, 5, 6, 7], // z = z1
        vec![0, 1, 5, 4], // y = y0
        vec![3, 7, 6, 2], // y = y1
        vec![0, 4, 7, 3], // x = x0
        vec![1, 2, 6, 5], // x = x1
    ];
    make_polyhedron(store, &points, &faces)
}

/// Build a sphere solid: one analytic face covering the whole surface.
#[instrument(skip(store), fields(center = ?[center.x, center.y, center.z]))]
pub fn make_sphere(store: &mut EntityStore, center: Point3d, radius: f64) -> Result<SolidId, PrimitiveError> {
    if radius <= 0.0 || !radius.is_finite() {
        return Err(PrimitiveError::NonPositiveRadius(radius));
    }
    info!(radius, "creating sphere primitive");
    let tol = crate::default_tolerance().coincidence;
    let face = store.make_face(Surface::Sphere(Sphere::new(center, radius)), true, tol);
    let shell = store.make_shell(&[face], ShellOrientation::Outward);
    Ok(store.make_solid(&[shell]))
}

/// Deep copy of a solid under a rigid motion with optional uniform scaling.
#[instrument(skip(store, xf))]
pub fn transformed_copy(store: &mut EntityStore, solid_id: SolidId, xf: &Transform) -> SolidId {
    let scale = xf.scale_factor();
    let mut vertex_map: HashMap<VertexId, VertexId> = HashMap::new();
    let mut edge_map: HashMap<EdgeId, EdgeId> = HashMap::new();
    let mut new_shells = Vec::new();

    for shell_id in store.solids[solid_id].shells.clone() {
        let orientation = store.shells[shell_id].orientation;
        let mut new_faces = Vec::new();
        for face_id in store.shells[shell_id].faces.clone() {
            let face = store.faces[face_id].clone();
            let new_face = store.make_face(face.surface.transformed(xf), face.same_sense, face.tolerance);
            let loops: Vec<LoopId> = store.face_loops(face_id).collect();
            for loop_id in loops {
                let mut uses = Vec::new();
                for he_id in store.loops[loop_id].half_edges.clone() {
                    let he = store.half_edges[he_id];
                    let new_edge = match edge_map.get(&he.edge) {
                        Some(&e) => e,
                        None => {
                            let edge = store.edges[he.edge].clone();
                            let sv = copy_vertex(store, &mut vertex_map, edge.start_vertex, xf);
                            let ev = copy_vertex(store, &mut vertex_map, edge.end_vertex, xf);
                            let (t0, t1) = match edge.curve {
                                Curve::Line(_) => (edge.t_start * scale, edge.t_end * scale),
                                Curve::Circle(_) => (edge.t_start, edge.t_end),
                            };
                            let e = store.make_edge(edge.curve.transformed(xf), t0, t1, sv, ev, edge.tolerance);
                            edge_map.insert(he.edge, e);
                            e
                        }
                    };
                    uses.push((new_edge, he.forward));
                }
                let outer = face.outer_loop == Some(loop_id);
                store.add_loop(new_face, &uses, outer);
            }
            new_faces.push(new_face);
        }
        new_shells.push(store.make_shell(&new_faces, orientation));
    }

    store.make_solid(&new_shells)
}

fn copy_vertex(
    store: &mut EntityStore,
    map: &mut HashMap<VertexId, VertexId>,
    v: VertexId,
    xf: &Transform,
) -> VertexId {
    if let Some(&nv) = map.get(&v) {
        return nv;
    }
    let vertex = store.vertices[v].clone();
    let nv = store.make_vertex(xf.transform_point(&vertex.point), vertex.tolerance);
    map.insert(v, nv);
    nv
}

/// Plane through a polygon's centroid with its Newell normal.
fn polygon_plane(corners: &[Point3d]) -> Option<Plane> {
    let mut normal = Vec3::ZERO;
    for (i, p) in corners.iter().enumerate() {
        let q = corners[(i + 1) % corners.len()];
        normal = normal + p.to_vec3().cross(&q.to_vec3());
    }
    let normal = normal.normalized()?;
    let centroid = Point3d::centroid(corners)?;
    Some(Plane::new(centroid, normal))
}
