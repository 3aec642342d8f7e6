use tracing::{debug, instrument};

use crate::boolean::classify::{classify_point, PointClassification};
use crate::boolean::{perform, BoolOp, BooleanError, BooleanOptions, BooleanOutput};
use crate::geometry::point::Point3d;
use crate::topology::brep::*;
use crate::topology::face_domain::FaceDomain;

/// Exact signed volume of a solid bounded by planar and spherical faces.
///
/// Inward shells contribute negatively through their face orientation.
pub fn solid_volume(store: &EntityStore, solid_id: SolidId) -> f64 {
    let tol = crate::default_tolerance().coincidence;
    store
        .solid_faces(solid_id)
        .into_iter()
        .map(|f| FaceDomain::from_face(store, f, tol).volume_moment())
        .sum::<f64>()
        / 3.0
}

/// Total volume of the solids of a compound.
pub fn compound_volume(store: &EntityStore, compound: CompoundId) -> f64 {
    store.compounds[compound].solids.iter().map(|&s| solid_volume(store, s)).sum()
}

pub fn output_volume(output: &BooleanOutput) -> f64 {
    compound_volume(&output.store, output.shape)
}

/// Monte-Carlo volume estimate, for shapes whose exact volume is in doubt.
pub fn estimate_volume(store: &EntityStore, solid_id: SolidId, num_samples: usize) -> f64 {
    let bb = store.solid_bounding_box(solid_id);
    if !bb.is_valid() || num_samples == 0 {
        return 0.0;
    }

    let margin = 0.01;
    let bb = bb.expanded(margin);
    let bb_volume = bb.volume();

    let mut inside_count = 0;

    // Fixed seed keeps the estimate reproducible.
    let mut rng_state: u64 = 12345;
    let mut next = || {
        rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (rng_state >> 33) as f64 / (u32::MAX as f64)
    };

    for _ in 0..num_samples {
        let (rx, ry, rz) = (next(), next(), next());
        let point = Point3d::new(
            bb.min.x + rx * (bb.max.x - bb.min.x),
            bb.min.y + ry * (bb.max.y - bb.min.y),
            bb.min.z + rz * (bb.max.z - bb.min.z),
        );

        if classify_point(store, solid_id, &point, 1e-7) == PointClassification::Inside {
            inside_count += 1;
        }
    }

    bb_volume * (inside_count as f64 / num_samples as f64)
}

/// Run all four solid operations on `a` and `b` and compare their volumes:
///
/// - vol(A ∪ B) = vol(A) + vol(B) - vol(A ∩ B)
/// - vol(A) = vol(A - B) + vol(A ∩ B)
/// - vol(B) = vol(B - A) + vol(A ∩ B)
#[instrument(skip(store, options))]
pub fn verify_boolean_volume_identity(
    store: &EntityStore,
    solid_a: SolidId,
    solid_b: SolidId,
    options: &BooleanOptions,
) -> Result<VolumeVerification, BooleanError> {
    let (a, b) = (ShapeRef::Solid(solid_a), ShapeRef::Solid(solid_b));
    let run = |op, first, second| perform(op, store, first, Some(second), options).map(|out| output_volume(&out));

    let vol_a = solid_volume(store, solid_a);
    let vol_b = solid_volume(store, solid_b);
    let vol_union = run(BoolOp::Union, a, b)?;
    let vol_intersection = run(BoolOp::Intersection, a, b)?;
    let vol_a_minus_b = run(BoolOp::Difference, a, b)?;
    let vol_b_minus_a = run(BoolOp::Difference, b, a)?;

    let expected_union = vol_a + vol_b - vol_intersection;
    let scale = expected_union.abs().max(f64::EPSILON);
    let relative_error = [
        vol_union - expected_union,
        vol_a - vol_a_minus_b - vol_intersection,
        vol_b - vol_b_minus_a - vol_intersection,
    ]
    .into_iter()
    .map(f64::abs)
    .fold(0.0, f64::max)
        / scale;
    debug!(vol_union, vol_intersection, relative_error, "volume identity checked");

    Ok(VolumeVerification {
        vol_a,
        vol_b,
        vol_union,
        vol_intersection,
        vol_a_minus_b,
        vol_b_minus_a,
        expected_union,
        relative_error,
    })
}

#[derive(Debug)]
pub struct VolumeVerification {
    pub vol_a: f64,
    pub vol_b: f64,
    pub vol_union: f64,
    pub vol_intersection: f64,
    pub vol_a_minus_b: f64,
    pub vol_b_minus_a: f64,
    pub expected_union: f64,
    pub relative_error: f64,
}

impl VolumeVerification {
    pub fn is_valid(&self, max_relative_error: f64) -> bool {
        self.relative_error < max_relative_error
    }
}
