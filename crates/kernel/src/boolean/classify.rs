use std::collections::BTreeMap;

use tracing::{info, instrument};

use super::context::OperationContext;
use super::data::BooleanData;
use super::error::{BooleanError, Diagnostic, DiagnosticCode};
use super::rebuild::{FaceFragment, FaceSplitResult};
use super::registry::{EntityRef, Operand, OperandSet};
use crate::geometry::curves::Ray;
use crate::geometry::intersection;
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::Surface;
use crate::geometry::vector::Vec3;
use crate::geometry::SurfaceEval;
use crate::topology::brep::*;
use crate::topology::face_domain::{FaceDomain, PointContainment};

/// Classification of a point relative to a solid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointClassification {
    Inside,
    Outside,
    OnBoundary,
}

/// Orientation of a coincident fragment relative to the face it lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Same,
    Opposite,
}

/// State of a face fragment relative to the other operand. Every state
/// other than `Unknown` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FragmentState {
    #[default]
    Unknown,
    In,
    Out,
    On(Sense),
}

/// Skewed directions keep rays off the edges of axis-aligned input.
const RAY_DIRECTIONS: [(f64, f64, f64); 5] = [
    (1.0, 0.0123, 0.0371),
    (0.0213, 1.0, 0.0297),
    (0.0311, 0.0173, 1.0),
    (1.0, 1.0, 1.0),
    (-1.0, 0.5, 0.3),
];

/// Point-in-solid oracle over a fixed set of bounded faces.
#[derive(Debug, Clone)]
pub struct SolidClassifier {
    faces: Vec<(Surface, FaceDomain)>,
    tolerance: f64,
}

impl SolidClassifier {
    pub fn new(faces: Vec<(Surface, FaceDomain)>, tolerance: f64) -> Self {
        Self { faces, tolerance }
    }

    pub fn from_solid(store: &EntityStore, solid_id: SolidId, tolerance: f64) -> Self {
        let faces = store
            .solid_faces(solid_id)
            .into_iter()
            .map(|f| (store.faces[f].surface, FaceDomain::from_face(store, f, tolerance)))
            .collect();
        Self::new(faces, tolerance)
    }

    /// Shoots several rays and takes the majority vote of crossing parity.
    pub fn classify(&self, point: &Point3d) -> PointClassification {
        let on_face = self.faces.iter().any(|(surface, domain)| {
            surface.distance_to(point) <= self.tolerance && domain.classify(point) != PointContainment::Outside
        });
        if on_face {
            return PointClassification::OnBoundary;
        }

        let mut inside_votes = 0;
        let mut outside_votes = 0;
        for (x, y, z) in RAY_DIRECTIONS {
            let ray = Ray::new(*point, Vec3::new(x, y, z).normalize());
            if self.count_ray_crossings(&ray) % 2 == 1 {
                inside_votes += 1;
            } else {
                outside_votes += 1;
            }
        }

        if inside_votes > outside_votes {
            PointClassification::Inside
        } else {
            PointClassification::Outside
        }
    }

    /// Count the number of times a ray crosses the boundary. Hits closer
    /// than the tolerance along the ray count once.
    fn count_ray_crossings(&self, ray: &Ray) -> usize {
        let mut hit_ts: Vec<f64> = Vec::new();
        for (surface, domain) in &self.faces {
            match surface {
                Surface::Plane(plane) => {
                    if let Some(hit) = intersection::ray_plane(ray, plane) {
                        if hit.t > self.tolerance && domain.classify(&hit.point) != PointContainment::Outside {
                            hit_ts.push(hit.t);
                        }
                    }
                }
                Surface::Sphere(sphere) => {
                    let hits = intersection::ray_sphere(ray, sphere);
                    // A grazing ray touches without crossing.
                    if hits.len() == 2 && (hits[1].t - hits[0].t).abs() <= self.tolerance {
                        continue;
                    }
                    for hit in hits {
                        if hit.t > self.tolerance && domain.classify(&hit.point) != PointContainment::Outside {
                            hit_ts.push(hit.t);
                        }
                    }
                }
            }
        }
        deduplicate_crossings(&mut hit_ts, self.tolerance)
    }
}

/// Classify a point relative to a solid using ray casting.
pub fn classify_point(store: &EntityStore, solid_id: SolidId, point: &Point3d, tolerance: f64) -> PointClassification {
    SolidClassifier::from_solid(store, solid_id, tolerance).classify(point)
}

/// Sort hit parameters and merge clusters within `tolerance` of each other.
/// Returns the number of distinct crossings.
fn deduplicate_crossings(ts: &mut [f64], tolerance: f64) -> usize {
    if ts.is_empty() {
        return 0;
    }
    ts.sort_by(f64::total_cmp);

    let mut count = 1;
    let mut last = ts[0];
    for &t in ts.iter().skip(1) {
        if (t - last).abs() > tolerance {
            count += 1;
        }
        last = t;
    }
    count
}

// ─── Fragment Classification ────────────────────────────────────────────────

/// Solid oracle of each operand, when that operand is made of solids.
fn operand_classifier(ctx: &OperationContext, store: &EntityStore, data: &BooleanData, op: Operand) -> Option<SolidClassifier> {
    let shapes = data.registry.operand(op);
    if !shapes.is_solid() {
        return None;
    }
    let faces = shapes
        .solids
        .iter()
        .flat_map(|&s| store.solid_faces(s))
        .filter_map(|f| {
            let record = data.registry.id_of(EntityRef::Face(f))?;
            Some((store.faces[f].surface, data.domains.get(record)?.clone()))
        })
        .collect();
    Some(SolidClassifier::new(faces, ctx.tolerance))
}

/// Points to try after the fragment's interior point lands on the other
/// operand's boundary.
fn alternate_points(fragment: &FaceFragment, data: &BooleanData) -> Vec<Point3d> {
    let Some(center) = fragment.interior else {
        return Vec::new();
    };
    fragment
        .wires
        .iter()
        .flatten()
        .map(|ob| ob.span(&data.pave).midpoint())
        .flat_map(|m| [0.5, 0.25, 0.75].map(|s| center + (m - center) * s))
        .filter(|p| fragment.domain.classify(p) == PointContainment::Inside)
        .collect()
}

struct FaceClassification {
    states: Vec<FragmentState>,
    diagnostics: Vec<Diagnostic>,
}

fn classify_face(
    data: &BooleanData,
    split: &FaceSplitResult,
    classifiers: &[Option<SolidClassifier>; 2],
) -> FaceClassification {
    let record = data.registry.record(split.face);
    let mut diagnostics = Vec::new();
    let op = match record.operands {
        OperandSet::Both => {
            return FaceClassification {
                states: vec![FragmentState::On(Sense::Same); split.fragments.len()],
                diagnostics,
            };
        }
        OperandSet::A => Operand::A,
        OperandSet::B => Operand::B,
    };
    let coincident = data.coincident_faces(split.face);
    let oracle = classifiers[op.other().index()].as_ref();

    let states = split
        .fragments
        .iter()
        .map(|fragment| {
            let Some(interior) = fragment.interior else {
                diagnostics.push(Diagnostic::new(
                    DiagnosticCode::UnresolvedClassification,
                    Some(split.face),
                    "fragment has no interior point",
                ));
                return FragmentState::Out;
            };
            for &(other, same_sense) in &coincident {
                if data.domains.get(other).is_some_and(|d| d.classify(&interior) == PointContainment::Inside) {
                    return FragmentState::On(if same_sense { Sense::Same } else { Sense::Opposite });
                }
            }
            let Some(oracle) = oracle else {
                return FragmentState::Out;
            };
            let candidates = std::iter::once(interior).chain(alternate_points(fragment, data));
            for p in candidates {
                match oracle.classify(&p) {
                    PointClassification::Inside => return FragmentState::In,
                    PointClassification::Outside => return FragmentState::Out,
                    PointClassification::OnBoundary => continue,
                }
            }
            diagnostics.push(Diagnostic::new(
                DiagnosticCode::UnresolvedClassification,
                Some(split.face),
                format!("every sample of the fragment near {interior:?} lies on the other operand"),
            ));
            FragmentState::Out
        })
        .collect();
    FaceClassification { states, diagnostics }
}

/// Classify every fragment against the other operand. The result is
/// parallel to `splits`.
#[instrument(skip_all)]
pub fn classify_fragments(
    ctx: &mut OperationContext,
    store: &EntityStore,
    data: &BooleanData,
    splits: &[FaceSplitResult],
) -> Result<Vec<Vec<FragmentState>>, BooleanError> {
    let classifiers = [
        operand_classifier(ctx, store, data, Operand::A),
        operand_classifier(ctx, store, data, Operand::B),
    ];

    // A shell none of whose sub-shapes interferes lies wholly on one side:
    // its first fragment decides for all of it.
    let touched = data.touched_records();
    let mut untouched: BTreeMap<ShellId, Vec<usize>> = BTreeMap::new();
    let mut shell_touched: BTreeMap<ShellId, bool> = BTreeMap::new();
    for (k, split) in splits.iter().enumerate() {
        let Some(face_id) = data.registry.face_id(split.face) else {
            continue;
        };
        let Some(shell) = store.faces[face_id].shell else {
            continue;
        };
        let hit = touched[split.face] || face_sub_records(store, data, face_id).any(|r| touched[r]);
        *shell_touched.entry(shell).or_default() |= hit;
        untouched.entry(shell).or_default().push(k);
    }
    untouched.retain(|shell, _| !shell_touched.get(shell).copied().unwrap_or(true));

    let mut representative: Vec<Option<usize>> = vec![None; splits.len()];
    let mut work: Vec<usize> = Vec::new();
    let mut delegated = vec![false; splits.len()];
    for members in untouched.values() {
        let lead = members[0];
        for &k in &members[1..] {
            representative[k] = Some(lead);
            delegated[k] = true;
        }
    }
    work.extend((0..splits.len()).filter(|&k| !delegated[k]));

    let results = {
        let shared: &OperationContext = ctx;
        shared.scheduler().map_ordered(&work, |&k| {
            (!shared.is_cancelled()).then(|| classify_face(data, &splits[k], &classifiers))
        })
    };
    ctx.check_cancelled()?;

    let mut states: Vec<Vec<FragmentState>> = vec![Vec::new(); splits.len()];
    for (&k, result) in work.iter().zip(results.into_iter().flatten()) {
        ctx.report_all(result.diagnostics)?;
        states[k] = result.states;
    }
    for (k, lead) in representative.iter().enumerate() {
        if let Some(lead) = *lead {
            let state = states[lead].first().copied().unwrap_or(FragmentState::Out);
            states[k] = vec![state; splits[k].fragments.len()];
        }
    }

    let count = |want: fn(&FragmentState) -> bool| states.iter().flatten().filter(|s| want(s)).count();
    info!(
        inside = count(|s| *s == FragmentState::In),
        outside = count(|s| *s == FragmentState::Out),
        on = count(|s| matches!(s, FragmentState::On(_))),
        shortcut = delegated.iter().filter(|d| **d).count(),
        "fragments classified"
    );
    debug_assert!(states.iter().flatten().all(|s| *s != FragmentState::Unknown));
    Ok(states)
}

/// Edge and vertex records of a face.
fn face_sub_records<'a>(store: &'a EntityStore, data: &'a BooleanData, face_id: FaceId) -> impl Iterator<Item = usize> + 'a {
    store.face_loops(face_id).flat_map(move |l| {
        store.loops[l].half_edges.iter().flat_map(move |&he| {
            let h = &store.half_edges[he];
            [
                data.registry.id_of(EntityRef::Edge(h.edge)),
                data.registry.id_of(EntityRef::Vertex(h.start_vertex)),
            ]
            .into_iter()
            .flatten()
        })
    })
}
