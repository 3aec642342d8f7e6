//! Selection of classified fragments and construction of the result shape
//! in a fresh entity store.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info, instrument};

use super::classify::{FragmentState, PointClassification, Sense, SolidClassifier};
use super::context::OperationContext;
use super::data::BooleanData;
use super::error::{BooleanError, Diagnostic, DiagnosticCode};
use super::pave::{BlockParent, PaveData};
use super::rebuild::{EdgeKey, FaceSplitResult, OrientedBlock};
use super::registry::{Operand, OperandSet};
use super::BoolOp;
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::Surface;
use crate::geometry::vector::Vec3;
use crate::geometry::CurveEval;
use crate::topology::brep::*;
use crate::topology::builder::ShapeBuilder;
use crate::topology::face_domain::FaceDomain;

/// The result hierarchy in its own store.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub store: EntityStore,
    pub compound: CompoundId,
}

/// Whether a fragment of `operands` in `state` is kept, and if so whether
/// it is reversed.
pub fn select(op: BoolOp, operands: OperandSet, state: FragmentState) -> Option<bool> {
    use FragmentState::*;
    let from_a = operands.contains(Operand::A);
    match (op, state) {
        (_, Unknown) => None,
        (BoolOp::Union, Out) => Some(false),
        (BoolOp::Union, On(Sense::Same)) if from_a => Some(false),
        (BoolOp::Intersection, In) => Some(false),
        (BoolOp::Intersection, On(Sense::Same)) if from_a => Some(false),
        (BoolOp::Difference, Out) if operands == OperandSet::A => Some(false),
        (BoolOp::Difference, On(Sense::Opposite)) if operands == OperandSet::A => Some(false),
        (BoolOp::Difference, In) if operands == OperandSet::B => Some(true),
        (BoolOp::Section, On(_)) if from_a => Some(false),
        _ => None,
    }
}

/// A kept fragment, oriented as it will appear in the result.
struct OutFace<'a> {
    surface: Surface,
    same_sense: bool,
    wires: Vec<Vec<OrientedBlock>>,
    domain: &'a FaceDomain,
    interior: Option<Point3d>,
    /// Sign applied to the fragment's own orientation.
    reversed: bool,
}

impl OutFace<'_> {
    fn normal_at(&self, p: &Point3d) -> Vec3 {
        let n = self.surface.normal_at_point(p);
        if self.same_sense { n } else { -n }
    }

    fn volume_moment(&self) -> f64 {
        let m = self.domain.volume_moment();
        if self.reversed { -m } else { m }
    }
}

/// True when `block` runs the same way as the block that defines its edge.
fn runs_with_representative(pave: &PaveData, block: usize) -> bool {
    let rep = match pave.blocks[block].common {
        Some(c) => pave.common_blocks[c].representative(),
        None => return true,
    };
    if rep == block {
        return true;
    }
    let (b, r) = (&pave.blocks[block], &pave.blocks[rep]);
    if !b.is_closed() {
        return b.start.vertex == r.start.vertex;
    }
    let t = 0.5 * (b.start.t + b.end.t);
    let p = b.curve.evaluate(t);
    let along = r.curve.tangent(r.curve.project(&p)) * (r.end.t - r.start.t).signum();
    b.curve.tangent(t).dot(&along) * (b.end.t - b.start.t).signum() > 0.0
}

/// Writes output vertices and edges once per pool vertex and edge key.
struct OutputBuilder<'a> {
    out: EntityStore,
    pave: &'a PaveData,
    vertices: HashMap<usize, VertexId>,
    edges: BTreeMap<EdgeKey, EdgeId>,
    tolerance: f64,
}

impl<'a> OutputBuilder<'a> {
    fn new(pave: &'a PaveData, tolerance: f64) -> Self {
        Self {
            out: EntityStore::new(),
            pave,
            vertices: HashMap::new(),
            edges: BTreeMap::new(),
            tolerance,
        }
    }

    fn vertex(&mut self, root: usize) -> VertexId {
        if let Some(&v) = self.vertices.get(&root) {
            return v;
        }
        let v = self.out.make_vertex(self.pave.pool.point(root), self.tolerance);
        self.vertices.insert(root, v);
        v
    }

    fn edge(&mut self, key: EdgeKey) -> EdgeId {
        if let Some(&e) = self.edges.get(&key) {
            return e;
        }
        let rep = match key {
            EdgeKey::Common(c) => self.pave.common_blocks[c].representative(),
            EdgeKey::Block(b) => b,
        };
        let block = self.pave.blocks[rep].clone();
        let start = self.vertex(block.start.vertex);
        let end = self.vertex(block.end.vertex);
        let e = self
            .out
            .make_edge(block.curve, block.start.t, block.end.t, start, end, self.tolerance);
        self.edges.insert(key, e);
        e
    }

    fn face(&mut self, face: &OutFace<'_>) -> FaceId {
        let f = self.out.make_face(face.surface, face.same_sense, self.tolerance);
        for (i, wire) in face.wires.iter().enumerate() {
            let uses: Vec<(EdgeId, bool)> = wire
                .iter()
                .map(|ob| {
                    let e = self.edge(EdgeKey::of(self.pave, ob.block));
                    (e, ob.forward == runs_with_representative(self.pave, ob.block))
                })
                .collect();
            self.out.add_loop(f, &uses, i == 0);
        }
        f
    }
}

/// Group faces connected through shared edges; groups come out ordered by
/// their first face.
fn group_shells(pave: &PaveData, faces: &[OutFace<'_>]) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..faces.len()).collect();
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }
    let mut owner: HashMap<EdgeKey, usize> = HashMap::new();
    for (i, f) in faces.iter().enumerate() {
        for ob in f.wires.iter().flatten() {
            let key = EdgeKey::of(pave, ob.block);
            match owner.get(&key) {
                Some(&j) => {
                    let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                    parent[ri.max(rj)] = ri.min(rj);
                }
                None => {
                    owner.insert(key, i);
                }
            }
        }
    }
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..faces.len() {
        let r = find(&mut parent, i);
        groups.entry(r).or_default().push(i);
    }
    groups.into_values().collect()
}

/// Edge keys not used equally often in both directions.
fn unbalanced_keys(pave: &PaveData, faces: &[OutFace<'_>], group: &[usize]) -> Vec<EdgeKey> {
    let mut balance: BTreeMap<EdgeKey, i64> = BTreeMap::new();
    for &i in group {
        for ob in faces[i].wires.iter().flatten() {
            let along = ob.forward == runs_with_representative(pave, ob.block);
            *balance.entry(EdgeKey::of(pave, ob.block)).or_default() += if along { 1 } else { -1 };
        }
    }
    balance.into_iter().filter(|(_, b)| *b != 0).map(|(k, _)| k).collect()
}

fn classifier_of(faces: &[OutFace<'_>], group: &[usize], tolerance: f64) -> SolidClassifier {
    SolidClassifier::new(
        group.iter().map(|&i| (faces[i].surface, faces[i].domain.clone())).collect(),
        tolerance,
    )
}

/// Offset-point test: step off a face along its normal and classify the
/// point against the shell itself. Falls back to the enclosed volume sign.
fn is_outward(faces: &[OutFace<'_>], group: &[usize], tolerance: f64) -> bool {
    let classifier = classifier_of(faces, group, tolerance);
    for &i in group {
        let f = &faces[i];
        let Some(p) = f.interior else {
            continue;
        };
        let step = (f.domain.area().abs().sqrt() * 1e-3).max(tolerance * 10.0);
        match classifier.classify(&(p + f.normal_at(&p) * step)) {
            PointClassification::Outside => return true,
            PointClassification::Inside => return false,
            PointClassification::OnBoundary => continue,
        }
    }
    group.iter().map(|&i| faces[i].volume_moment()).sum::<f64>() >= 0.0
}

/// Build the result of `op` from classified fragments.
#[instrument(skip_all, fields(op = ?op))]
pub fn assemble(
    ctx: &mut OperationContext,
    store: &EntityStore,
    data: &BooleanData,
    splits: &[FaceSplitResult],
    states: &[Vec<FragmentState>],
    op: BoolOp,
) -> Result<Assembled, BooleanError> {
    let pave = &data.pave;
    let tol = ctx.tolerance;
    let tool = data.registry.operand(Operand::B);
    let solids = data.registry.operand(Operand::A).is_solid() && (tool.is_solid() || tool.is_empty());

    let mut faces: Vec<OutFace<'_>> = Vec::new();
    let mut origins: Vec<usize> = Vec::new();
    for (split, fragment_states) in splits.iter().zip(states) {
        let operands = data.registry.record(split.face).operands;
        let Some(face_id) = data.registry.face_id(split.face) else {
            continue;
        };
        let original = &store.faces[face_id];
        for (fragment, &state) in split.fragments.iter().zip(fragment_states) {
            let Some(reversed) = select(op, operands, state) else {
                continue;
            };
            let wires = if reversed {
                fragment
                    .wires
                    .iter()
                    .map(|w| w.iter().rev().map(|ob| ob.reversed()).collect())
                    .collect()
            } else {
                fragment.wires.clone()
            };
            faces.push(OutFace {
                surface: original.surface,
                same_sense: original.same_sense != reversed,
                wires,
                domain: &fragment.domain,
                interior: fragment.interior,
                reversed,
            });
            origins.push(split.face);
        }
    }
    debug!(kept = faces.len(), "fragments selected");

    let mut builder = OutputBuilder::new(pave, tol);
    let mut compound = Compound::default();
    let groups = group_shells(pave, &faces);

    if op == BoolOp::Section || !solids {
        for group in groups {
            let ids: Vec<FaceId> = group.iter().map(|&i| builder.face(&faces[i])).collect();
            if op == BoolOp::Section || ids.len() == 1 {
                compound.faces.extend(ids);
            } else {
                let shell = builder.out.make_shell(&ids, ShellOrientation::Outward);
                compound.shells.push(shell);
            }
        }
    } else {
        let mut closed: Vec<Vec<usize>> = Vec::new();
        for group in groups {
            let open = unbalanced_keys(pave, &faces, &group);
            if open.is_empty() {
                closed.push(group);
            } else {
                ctx.report(Diagnostic::new(
                    DiagnosticCode::InconsistentShell,
                    Some(origins[group[0]]),
                    format!("shell of {} faces has {} unmatched edges", group.len(), open.len()),
                ))?;
            }
        }
        ctx.check_cancelled()?;

        let outward: Vec<bool> = closed.iter().map(|g| is_outward(&faces, g, tol)).collect();
        let volume = |g: &[usize]| g.iter().map(|&i| faces[i].volume_moment()).sum::<f64>().abs() / 3.0;

        // Voids go to the smallest outward shell that contains them.
        let mut voids: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut flipped: BTreeSet<usize> = BTreeSet::new();
        let outer_classifiers: Vec<Option<SolidClassifier>> = closed
            .iter()
            .zip(&outward)
            .map(|(g, &out)| out.then(|| classifier_of(&faces, g, tol)))
            .collect();
        for (k, g) in closed.iter().enumerate() {
            if outward[k] {
                continue;
            }
            let sample = g.iter().find_map(|&i| faces[i].interior);
            let owner = sample.and_then(|p| {
                (0..closed.len())
                    .filter(|&o| {
                        outer_classifiers[o]
                            .as_ref()
                            .is_some_and(|c| c.classify(&p) == PointClassification::Inside)
                    })
                    .min_by(|&x, &y| volume(&closed[x]).total_cmp(&volume(&closed[y])))
            });
            match owner {
                Some(o) => voids.entry(o).or_default().push(k),
                None => {
                    flipped.insert(k);
                }
            }
        }

        for k in &flipped {
            for &i in &closed[*k] {
                let f = &mut faces[i];
                f.same_sense = !f.same_sense;
                f.reversed = !f.reversed;
                f.wires = f
                    .wires
                    .iter()
                    .map(|w| w.iter().rev().map(|ob| ob.reversed()).collect())
                    .collect();
            }
        }

        for (k, g) in closed.iter().enumerate() {
            if !(outward[k] || flipped.contains(&k)) {
                continue;
            }
            let ids: Vec<FaceId> = g.iter().map(|&i| builder.face(&faces[i])).collect();
            let mut shells = vec![builder.out.make_shell(&ids, ShellOrientation::Outward)];
            for &v in voids.get(&k).into_iter().flatten() {
                let ids: Vec<FaceId> = closed[v].iter().map(|&i| builder.face(&faces[i])).collect();
                shells.push(builder.out.make_shell(&ids, ShellOrientation::Inward));
            }
            compound.solids.push(builder.out.make_solid(&shells));
        }
        if !flipped.is_empty() {
            debug!(flipped = flipped.len(), "unenclosed inward shells flipped");
        }
    }

    if op == BoolOp::Section {
        let used: BTreeSet<EdgeKey> = builder.edges.keys().copied().collect();
        let section_keys: BTreeSet<EdgeKey> = pave
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| matches!(b.parent, BlockParent::Section { .. }))
            .map(|(i, _)| EdgeKey::of(pave, i))
            .filter(|k| !used.contains(k))
            .collect();
        for key in section_keys {
            compound.edges.push(builder.edge(key));
        }
        for &v in &pave.contact_vertices {
            if !builder.vertices.contains_key(&v) {
                compound.vertices.push(builder.vertex(v));
            }
        }
    }

    info!(
        solids = compound.solids.len(),
        shells = compound.shells.len(),
        faces = builder.out.faces.len(),
        edges = builder.out.edges.len(),
        "result assembled"
    );
    let mut out = builder.out;
    let compound = out.make_compound(compound);
    Ok(Assembled { store: out, compound })
}
