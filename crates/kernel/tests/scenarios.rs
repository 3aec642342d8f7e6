//! End-to-end Boolean scenarios on boxes and spheres.

use approx::assert_relative_eq;
use std::f64::consts::PI;

use cad_booleans::boolean::DiagnosticCode;
use cad_booleans::geometry::point::Point3d;
use cad_booleans::topology::brep::{audit_solid, EntityStore, ShapeRef, ShellOrientation};
use cad_booleans::topology::primitives::{make_box, make_polyhedral_shell, make_sphere};
use cad_booleans::validation::{audit_output, output_volume};
use cad_booleans::{
    perform, BoolOp, BooleanEngine, BooleanError, BooleanOptions, CancellationToken, DefaultBooleanEngine,
    ShapeBuilder,
};

fn face_sharing_cubes(store: &mut EntityStore) -> (ShapeRef, ShapeRef) {
    let a = make_box(store, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0).unwrap();
    let b = make_box(store, 1.0, 0.0, 0.0, 2.0, 1.0, 1.0).unwrap();
    (ShapeRef::Solid(a), ShapeRef::Solid(b))
}

fn concentric_spheres(store: &mut EntityStore) -> (ShapeRef, ShapeRef) {
    let big = make_sphere(store, Point3d::ORIGIN, 2.0).unwrap();
    let small = make_sphere(store, Point3d::ORIGIN, 1.0).unwrap();
    (ShapeRef::Solid(big), ShapeRef::Solid(small))
}

fn run(op: BoolOp, store: &EntityStore, a: ShapeRef, b: ShapeRef) -> cad_booleans::BooleanOutput {
    perform(op, store, a, Some(b), &BooleanOptions::serial()).unwrap()
}

#[test]
fn face_sharing_cubes_union_is_one_closed_solid() {
    let mut store = EntityStore::new();
    let (a, b) = face_sharing_cubes(&mut store);
    let out = run(BoolOp::Union, &store, a, b);

    assert_eq!(out.compound().solids.len(), 1);
    let solid = out.compound().solids[0];
    assert_eq!(out.store.solid_faces(solid).len(), 10);
    assert!(audit_solid(&out.store, solid).all_valid());
    assert_relative_eq!(output_volume(&out), 2.0, epsilon = 1e-9);
}

#[test]
fn face_sharing_cubes_intersection_is_empty() {
    let mut store = EntityStore::new();
    let (a, b) = face_sharing_cubes(&mut store);
    let out = run(BoolOp::Intersection, &store, a, b);
    assert!(out.is_empty());
}

#[test]
fn face_sharing_cubes_section_is_the_shared_square() {
    let mut store = EntityStore::new();
    let (a, b) = face_sharing_cubes(&mut store);
    let out = run(BoolOp::Section, &store, a, b);

    let compound = out.compound();
    assert!(compound.solids.is_empty());
    assert_eq!(compound.faces.len(), 1);
    let face = &out.store.faces[compound.faces[0]];
    let outer = face.outer_loop.unwrap();
    assert_eq!(out.store.loops[outer].half_edges.len(), 4);
}

#[test]
fn concentric_spheres_difference_has_a_void() {
    let mut store = EntityStore::new();
    let (big, small) = concentric_spheres(&mut store);
    let out = run(BoolOp::Difference, &store, big, small);

    assert_eq!(out.compound().solids.len(), 1);
    let solid = &out.store.solids[out.compound().solids[0]];
    assert_eq!(solid.shells.len(), 2);
    assert_eq!(out.store.shells[solid.shells[0]].orientation, ShellOrientation::Outward);
    assert_eq!(out.store.shells[solid.shells[1]].orientation, ShellOrientation::Inward);
    assert_relative_eq!(output_volume(&out), 4.0 / 3.0 * PI * 7.0, epsilon = 1e-6);
}

#[test]
fn concentric_spheres_intersection_is_the_small_sphere() {
    let mut store = EntityStore::new();
    let (big, small) = concentric_spheres(&mut store);
    let out = run(BoolOp::Intersection, &store, big, small);

    assert_eq!(out.compound().solids.len(), 1);
    assert_eq!(out.store.faces.len(), 1);
    assert_relative_eq!(output_volume(&out), 4.0 / 3.0 * PI, epsilon = 1e-6);
}

#[test]
fn union_with_itself_is_identity() {
    let mut store = EntityStore::new();
    let a = ShapeRef::Solid(make_box(&mut store, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0).unwrap());
    let out = run(BoolOp::Union, &store, a, a);

    assert_eq!(out.compound().solids.len(), 1);
    assert_eq!(out.store.faces.len(), 6);
    assert_eq!(out.store.edges.len(), 12);
    assert_eq!(out.store.vertices.len(), 8);
    assert_relative_eq!(output_volume(&out), 6.0, epsilon = 1e-9);
}

#[test]
fn union_with_nothing_is_identity() {
    let mut store = EntityStore::new();
    let a = ShapeRef::Solid(make_box(&mut store, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0).unwrap());
    let out = perform(BoolOp::Union, &store, a, None, &BooleanOptions::default()).unwrap();

    assert_eq!(out.compound().solids.len(), 1);
    assert_eq!(out.store.faces.len(), 6);
    assert!(audit_output(&out).iter().all(|(_, audit)| audit.all_valid()));
}

#[test]
fn sphere_through_box_difference_volume() {
    let mut store = EntityStore::new();
    let block = make_box(&mut store, -2.0, -2.0, 0.0, 2.0, 2.0, 4.0).unwrap();
    let ball = make_sphere(&mut store, Point3d::ORIGIN, 1.0).unwrap();
    let out = run(BoolOp::Difference, &store, ShapeRef::Solid(block), ShapeRef::Solid(ball));

    assert_eq!(out.compound().solids.len(), 1);
    // The upper hemisphere is carved out of the block.
    assert_relative_eq!(output_volume(&out), 64.0 - 2.0 / 3.0 * PI, epsilon = 1e-6);
    assert!(out.report.is_empty(), "{:?}", out.report);
}

#[test]
fn disjoint_section_is_empty() {
    let mut store = EntityStore::new();
    let a = make_box(&mut store, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0).unwrap();
    let b = make_box(&mut store, 3.0, 3.0, 3.0, 4.0, 4.0, 4.0).unwrap();
    let out = run(BoolOp::Section, &store, ShapeRef::Solid(a), ShapeRef::Solid(b));
    assert!(out.is_empty());
}

fn quarter_ball_operands(store: &mut EntityStore) -> (ShapeRef, ShapeRef) {
    let block = make_box(store, -3.0, -3.0, 0.0, 3.0, 0.0, 3.0).unwrap();
    let ball = make_sphere(store, Point3d::ORIGIN, 1.0).unwrap();
    (ShapeRef::Solid(block), ShapeRef::Solid(ball))
}

/// Volume of the unit ball inside the wedge `x > 0.5, y > 0.5`.
const CORNER_WEDGE_VOLUME: f64 = 0.0627838418108;

fn corner_operands(store: &mut EntityStore) -> (ShapeRef, ShapeRef) {
    let ball = make_sphere(store, Point3d::ORIGIN, 1.0).unwrap();
    let corner = make_box(store, 0.5, 0.5, -3.0, 3.0, 3.0, 3.0).unwrap();
    (ShapeRef::Solid(ball), ShapeRef::Solid(corner))
}

fn assert_clean(out: &cad_booleans::BooleanOutput) {
    assert!(out.report.is_empty(), "{:?}", out.report);
    assert!(audit_output(out).iter().all(|(_, audit)| audit.all_valid()));
}

#[test]
fn quarter_ball_intersection() {
    let mut store = EntityStore::new();
    let (block, ball) = quarter_ball_operands(&mut store);
    let out = perform(BoolOp::Intersection, &store, block, Some(ball), &BooleanOptions::strict()).unwrap();

    assert_eq!(out.compound().solids.len(), 1);
    // Two half-disc caps and the spherical quarter.
    assert_eq!(out.store.solid_faces(out.compound().solids[0]).len(), 3);
    assert_relative_eq!(output_volume(&out), PI / 3.0, epsilon = 1e-6);
    assert_clean(&out);
}

#[test]
fn quarter_ball_union_and_differences() {
    let mut store = EntityStore::new();
    let (block, ball) = quarter_ball_operands(&mut store);

    let union = run(BoolOp::Union, &store, block, ball);
    assert_eq!(union.compound().solids.len(), 1);
    assert_relative_eq!(output_volume(&union), 54.0 + PI, epsilon = 1e-6);
    assert_clean(&union);

    let ball_minus_block = run(BoolOp::Difference, &store, ball, block);
    assert_eq!(ball_minus_block.compound().solids.len(), 1);
    assert_relative_eq!(output_volume(&ball_minus_block), PI, epsilon = 1e-6);
    assert_clean(&ball_minus_block);

    let block_minus_ball = run(BoolOp::Difference, &store, block, ball);
    assert_eq!(block_minus_ball.compound().solids.len(), 1);
    assert_relative_eq!(output_volume(&block_minus_ball), 54.0 - PI / 3.0, epsilon = 1e-6);
    assert_clean(&block_minus_ball);
}

#[test]
fn ball_clipped_by_box_corner() {
    let mut store = EntityStore::new();
    let (ball, corner) = corner_operands(&mut store);

    let union = perform(BoolOp::Union, &store, ball, Some(corner), &BooleanOptions::strict()).unwrap();
    assert_eq!(union.compound().solids.len(), 1);
    assert_relative_eq!(
        output_volume(&union),
        4.0 / 3.0 * PI + 37.5 - CORNER_WEDGE_VOLUME,
        epsilon = 1e-6
    );
    assert_clean(&union);

    let common = run(BoolOp::Intersection, &store, ball, corner);
    assert_eq!(common.compound().solids.len(), 1);
    assert_relative_eq!(output_volume(&common), CORNER_WEDGE_VOLUME, epsilon = 1e-6);
    assert_clean(&common);
}

#[test]
fn ball_minus_box_corner() {
    let mut store = EntityStore::new();
    let (ball, corner) = corner_operands(&mut store);
    let out = run(BoolOp::Difference, &store, ball, corner);

    assert_eq!(out.compound().solids.len(), 1);
    assert_relative_eq!(output_volume(&out), 4.0 / 3.0 * PI - CORNER_WEDGE_VOLUME, epsilon = 1e-6);
    assert_clean(&out);
}

#[test]
fn box_edge_tangent_to_ball_leaves_edges_whole() {
    let mut store = EntityStore::new();
    // The edge x = 0, z = 1 touches the ball at its top point only.
    let block = make_box(&mut store, 0.0, -2.0, 1.0, 2.0, 2.0, 3.0).unwrap();
    let ball = make_sphere(&mut store, Point3d::ORIGIN, 1.0).unwrap();
    let out = run(BoolOp::Union, &store, ShapeRef::Solid(block), ShapeRef::Solid(ball));

    assert_eq!(out.compound().solids.len(), 2);
    assert_eq!(out.store.faces.len(), 7);
    assert_eq!(out.store.edges.len(), 12);
    assert_relative_eq!(output_volume(&out), 16.0 + 4.0 / 3.0 * PI, epsilon = 1e-6);
    assert_clean(&out);
    assert!(!out.report.has(DiagnosticCode::AmbiguousInterference));
}

#[test]
fn open_solid_operand_is_rejected() {
    let mut store = EntityStore::new();
    let pts = [
        Point3d::new(0.0, 0.0, 0.0),
        Point3d::new(1.0, 0.0, 0.0),
        Point3d::new(0.0, 1.0, 0.0),
        Point3d::new(0.0, 0.0, 1.0),
    ];
    let faces = vec![vec![0, 2, 1], vec![0, 1, 3], vec![1, 2, 3]];
    let shell = make_polyhedral_shell(&mut store, &pts, &faces).unwrap();
    let solid = store.make_solid(&[shell]);
    let tool = make_box(&mut store, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0).unwrap();

    let err = DefaultBooleanEngine::new()
        .union(&store, ShapeRef::Solid(solid), ShapeRef::Solid(tool))
        .unwrap_err();
    assert!(matches!(err, BooleanError::InvalidTopology(_)));
}

#[test]
fn cancellation_stops_the_operation() {
    let mut store = EntityStore::new();
    let (a, b) = concentric_spheres(&mut store);
    let token = CancellationToken::new();
    token.cancel();
    let engine = DefaultBooleanEngine::with_cancellation(token);
    assert!(matches!(engine.subtract(&store, a, b), Err(BooleanError::OperationCancelled)));
}

#[test]
fn options_from_json() {
    let options = BooleanOptions::from_json_str(r#"{ "strict": true, "max_threads": 2 }"#).unwrap();
    assert!(options.strict);
    assert!(options.parallel);
    assert_eq!(options.max_threads, Some(2));

    let err = BooleanOptions::from_json_str(r#"{ "fuzzy_value": -1.0 }"#).unwrap_err();
    assert!(matches!(err, BooleanError::InvalidOptions(_)));
}

#[test]
fn fuzzy_value_widens_the_operation_tolerance() {
    let mut store = EntityStore::new();
    let a = make_box(&mut store, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0).unwrap();
    // A hair's gap that a fuzzy value of 1e-4 closes.
    let b = make_box(&mut store, 1.00001, 0.0, 0.0, 2.0, 1.0, 1.0).unwrap();
    let (a, b) = (ShapeRef::Solid(a), ShapeRef::Solid(b));

    let exact = perform(BoolOp::Section, &store, a, Some(b), &BooleanOptions::serial()).unwrap();
    assert!(exact.is_empty());

    let fuzzy = BooleanOptions::serial().with_fuzzy_value(1e-4);
    let out = perform(BoolOp::Section, &store, a, Some(b), &fuzzy).unwrap();
    assert_eq!(out.compound().faces.len(), 1);
}

#[test]
fn parallel_and_serial_agree() {
    let mut store = EntityStore::new();
    let a = make_box(&mut store, 0.0, 0.0, 0.0, 2.0, 2.0, 2.0).unwrap();
    let b = make_sphere(&mut store, Point3d::new(2.0, 1.0, 1.0), 0.75).unwrap();
    let (a, b) = (ShapeRef::Solid(a), ShapeRef::Solid(b));

    let serial = perform(BoolOp::Difference, &store, a, Some(b), &BooleanOptions::serial()).unwrap();
    let parallel =
        perform(BoolOp::Difference, &store, a, Some(b), &BooleanOptions::default().with_max_threads(4)).unwrap();
    assert_eq!(serial.store.faces.len(), parallel.store.faces.len());
    assert_relative_eq!(output_volume(&serial), output_volume(&parallel), epsilon = 1e-9);
    assert_relative_eq!(output_volume(&serial), 8.0 - 2.0 / 3.0 * PI * 0.421875, epsilon = 1e-6);
}
