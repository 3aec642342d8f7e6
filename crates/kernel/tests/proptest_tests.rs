//! Property-based tests for Boolean invariants using the `proptest` crate.

use proptest::prelude::*;

use cad_booleans::boolean::pave::{merge_adjacent, split, BlockParent, Pave};
use cad_booleans::geometry::curves::{Curve, Line3d};
use cad_booleans::geometry::point::Point3d;
use cad_booleans::geometry::transform::Transform;
use cad_booleans::topology::brep::{EntityStore, ShapeRef, SolidId};
use cad_booleans::topology::primitives::make_box;
use cad_booleans::validation::{output_volume, verify_boolean_volume_identity};
use cad_booleans::{perform, BoolOp, BooleanOptions};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

/// Arbitrary 3D coordinate tuple in a reasonable floating-point range.
fn arb_point() -> impl Strategy<Value = (f64, f64, f64)> {
    (-1000.0f64..1000.0, -1000.0f64..1000.0, -1000.0f64..1000.0)
}

/// Arbitrary translation offsets.
fn arb_translation() -> impl Strategy<Value = (f64, f64, f64)> {
    (-1000.0f64..1000.0, -1000.0f64..1000.0, -1000.0f64..1000.0)
}

/// Offsets and extents of a tool box against the fixed box `[0, 2]^3`.
/// No tool face is coplanar with a face of the fixed box.
fn arb_tool_axis() -> impl Strategy<Value = (f64, f64)> {
    (
        prop::sample::select(vec![-0.7, -0.3, 0.4, 1.3]),
        prop::sample::select(vec![0.9, 1.55, 3.05]),
    )
}

fn arb_tool_box() -> impl Strategy<Value = [(f64, f64); 3]> {
    [arb_tool_axis(), arb_tool_axis(), arb_tool_axis()]
}

const TOL: f64 = 1e-6;

fn operands(tool: &[(f64, f64); 3]) -> (EntityStore, SolidId, SolidId) {
    let mut store = EntityStore::new();
    let a = make_box(&mut store, 0.0, 0.0, 0.0, 2.0, 2.0, 2.0).unwrap();
    let [(x, dx), (y, dy), (z, dz)] = *tool;
    let b = make_box(&mut store, x, y, z, x + dx, y + dy, z + dz).unwrap();
    (store, a, b)
}

/// Analytic overlap volume of the tool box with `[0, 2]^3`.
fn overlap_volume(tool: &[(f64, f64); 3]) -> f64 {
    tool.iter()
        .map(|&(o, d)| ((o + d).min(2.0) - o.max(0.0)).max(0.0))
        .product()
}

// ---------------------------------------------------------------------------
// 1. Point distance symmetry: distance(a, b) == distance(b, a)
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn point_distance_symmetry(
        (ax, ay, az) in arb_point(),
        (bx, by, bz) in arb_point(),
    ) {
        let a = Point3d::new(ax, ay, az);
        let b = Point3d::new(bx, by, bz);
        let d_ab = a.distance_to(&b);
        let d_ba = b.distance_to(&a);
        prop_assert!((d_ab - d_ba).abs() < TOL,
            "distance(a,b)={} != distance(b,a)={}", d_ab, d_ba);
    }
}

// ---------------------------------------------------------------------------
// 2. Translation preserves distance: d(T*a, T*b) == d(a, b)
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn translation_preserves_distance(
        (ax, ay, az) in arb_point(),
        (bx, by, bz) in arb_point(),
        (tx, ty, tz) in arb_translation(),
    ) {
        let a = Point3d::new(ax, ay, az);
        let b = Point3d::new(bx, by, bz);
        let t = Transform::translation(tx, ty, tz);

        let ta = t.transform_point(&a);
        let tb = t.transform_point(&b);

        let d_orig = a.distance_to(&b);
        let d_trans = ta.distance_to(&tb);
        prop_assert!((d_orig - d_trans).abs() < TOL,
            "translation changed distance: {} -> {}", d_orig, d_trans);
    }
}

// ---------------------------------------------------------------------------
// 3. Splitting a block and merging the pieces restores the exact range
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn split_then_merge_restores_range(
        length in 1.0f64..100.0,
        fractions in prop::collection::vec(0.01f64..0.99, 0..8),
    ) {
        let line = Line3d::from_points(Point3d::ORIGIN, Point3d::new(length, 0.0, 0.0)).unwrap();
        let start = Pave { vertex: 0, t: 0.0 };
        let end = Pave { vertex: 1, t: length };
        let interior: Vec<Pave> = fractions
            .iter()
            .enumerate()
            .map(|(i, f)| Pave { vertex: i + 2, t: f * length })
            .collect();

        let blocks = split(Curve::Line(line), start, end, &interior, BlockParent::Edge(0), 1e-7);
        prop_assert!(!blocks.is_empty());
        prop_assert!(blocks.iter().all(|b| b.end.t > b.start.t));

        let merged = merge_adjacent(&blocks).unwrap();
        prop_assert_eq!(merged.start, start);
        prop_assert_eq!(merged.end, end);
    }
}

// ---------------------------------------------------------------------------
// 4. Union and Intersection are commutative
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn union_and_intersection_commute(tool in arb_tool_box()) {
        let (store, a, b) = operands(&tool);
        let options = BooleanOptions::serial();
        for op in [BoolOp::Union, BoolOp::Intersection] {
            let ab = perform(op, &store, ShapeRef::Solid(a), Some(ShapeRef::Solid(b)), &options).unwrap();
            let ba = perform(op, &store, ShapeRef::Solid(b), Some(ShapeRef::Solid(a)), &options).unwrap();
            prop_assert_eq!(ab.store.faces.len(), ba.store.faces.len(), "{:?} face counts differ", op);
            let (vab, vba) = (output_volume(&ab), output_volume(&ba));
            prop_assert!((vab - vba).abs() < TOL, "{:?} volumes differ: {} vs {}", op, vab, vba);
        }
    }
}

// ---------------------------------------------------------------------------
// 5. Differences and intersection partition the union
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn differences_and_intersection_partition_union(tool in arb_tool_box()) {
        let (store, a, b) = operands(&tool);
        let check = verify_boolean_volume_identity(&store, a, b, &BooleanOptions::serial()).unwrap();
        prop_assert!(check.is_valid(TOL), "{:?}", check);
        prop_assert!((check.vol_intersection - overlap_volume(&tool)).abs() < TOL,
            "intersection {} != analytic {}", check.vol_intersection, overlap_volume(&tool));
    }
}

// ---------------------------------------------------------------------------
// 6. Section of two solids never produces a solid
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn section_has_no_solids(tool in arb_tool_box()) {
        let (store, a, b) = operands(&tool);
        let out = perform(
            BoolOp::Section,
            &store,
            ShapeRef::Solid(a),
            Some(ShapeRef::Solid(b)),
            &BooleanOptions::serial(),
        )
        .unwrap();
        prop_assert!(out.compound().solids.is_empty());
        prop_assert!(out.compound().shells.is_empty());
    }
}
