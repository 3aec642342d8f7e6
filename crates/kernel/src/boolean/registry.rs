use std::collections::HashMap;

use tracing::{debug, info, instrument};

use super::error::BooleanError;
use crate::geometry::transform::BoundingBox;
use crate::topology::brep::*;

/// Which argument of the operation a sub-shape came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    A,
    B,
}

impl Operand {
    pub fn other(self) -> Operand {
        match self {
            Operand::A => Operand::B,
            Operand::B => Operand::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Operand::A => 0,
            Operand::B => 1,
        }
    }
}

/// Operands owning a sub-shape; `Both` when the same arena key is reachable
/// from A and from B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSet {
    A,
    B,
    Both,
}

impl OperandSet {
    pub fn single(op: Operand) -> Self {
        match op {
            Operand::A => OperandSet::A,
            Operand::B => OperandSet::B,
        }
    }

    pub fn contains(self, op: Operand) -> bool {
        matches!(
            (self, op),
            (OperandSet::Both, _) | (OperandSet::A, Operand::A) | (OperandSet::B, Operand::B)
        )
    }

    fn with(self, op: Operand) -> Self {
        if self.contains(op) { self } else { OperandSet::Both }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Vertex(VertexId),
    Edge(EdgeId),
    Face(FaceId),
    Shell(ShellId),
    Solid(SolidId),
}

impl EntityRef {
    /// Topological dimension; shells and solids report 3.
    pub fn dimension(&self) -> u8 {
        match self {
            EntityRef::Vertex(_) => 0,
            EntityRef::Edge(_) => 1,
            EntityRef::Face(_) => 2,
            EntityRef::Shell(_) | EntityRef::Solid(_) => 3,
        }
    }
}

/// One indexed sub-shape of the operands.
#[derive(Debug, Clone)]
pub struct SubShapeRecord {
    pub id: usize,
    pub entity: EntityRef,
    pub operands: OperandSet,
    /// Bounding box inflated by the entity tolerance.
    pub bbox: BoundingBox,
    pub tolerance: f64,
    /// Split products (pave block or fragment indices), appended only.
    pub splits: Vec<usize>,
}

/// Per-operand summary of what was flattened.
#[derive(Debug, Clone, Default)]
pub struct OperandShapes {
    pub solids: Vec<SolidId>,
    /// Shells that belong to no solid in the operand.
    pub free_shells: Vec<ShellId>,
    /// Faces that belong to no shell in the operand.
    pub free_faces: Vec<FaceId>,
}

impl OperandShapes {
    /// True for an operand made only of solids.
    pub fn is_solid(&self) -> bool {
        !self.solids.is_empty() && self.free_shells.is_empty() && self.free_faces.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.solids.is_empty() && self.free_shells.is_empty() && self.free_faces.is_empty()
    }
}

/// Flat, indexed view of both operands.
#[derive(Debug, Clone, Default)]
pub struct ShapeRegistry {
    pub records: Vec<SubShapeRecord>,
    index: HashMap<EntityRef, usize>,
    operands: [OperandShapes; 2],
}

impl ShapeRegistry {
    /// Walk operand A then operand B and index every sub-shape.
    #[instrument(skip(store))]
    pub fn index(store: &EntityStore, a: ShapeRef, b: Option<ShapeRef>) -> Result<Self, BooleanError> {
        let mut registry = ShapeRegistry::default();
        registry.add_operand(store, a, Operand::A)?;
        if let Some(b) = b {
            registry.add_operand(store, b, Operand::B)?;
        }
        info!(
            records = registry.records.len(),
            shared = registry.records.iter().filter(|r| r.operands == OperandSet::Both).count(),
            "operands indexed"
        );
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn id_of(&self, entity: EntityRef) -> Option<usize> {
        self.index.get(&entity).copied()
    }

    pub fn record(&self, id: usize) -> &SubShapeRecord {
        &self.records[id]
    }

    pub fn operand(&self, op: Operand) -> &OperandShapes {
        &self.operands[op.index()]
    }

    pub fn push_split(&mut self, id: usize, product: usize) {
        self.records[id].splits.push(product);
    }

    pub fn max_tolerance(&self) -> f64 {
        self.records.iter().map(|r| r.tolerance).fold(0.0, f64::max)
    }

    /// Faces of one operand (shared faces included), in index order.
    pub fn faces_of(&self, op: Operand) -> Vec<usize> {
        self.records
            .iter()
            .filter(|r| matches!(r.entity, EntityRef::Face(_)) && r.operands.contains(op))
            .map(|r| r.id)
            .collect()
    }

    pub fn face_id(&self, id: usize) -> Option<FaceId> {
        match self.records[id].entity {
            EntityRef::Face(f) => Some(f),
            _ => None,
        }
    }

    pub fn edge_id(&self, id: usize) -> Option<EdgeId> {
        match self.records[id].entity {
            EntityRef::Edge(e) => Some(e),
            _ => None,
        }
    }

    pub fn vertex_id(&self, id: usize) -> Option<VertexId> {
        match self.records[id].entity {
            EntityRef::Vertex(v) => Some(v),
            _ => None,
        }
    }

    fn add_operand(&mut self, store: &EntityStore, shape: ShapeRef, op: Operand) -> Result<(), BooleanError> {
        match shape {
            ShapeRef::Solid(s) => self.add_solid(store, s, op),
            ShapeRef::Shell(s) => {
                self.operands[op.index()].free_shells.push(s);
                self.add_shell(store, s, op, false).map(|_| ())
            }
            ShapeRef::Face(f) => {
                self.operands[op.index()].free_faces.push(f);
                self.add_face(store, f, op).map(|_| ())
            }
            ShapeRef::Compound(c) => {
                let compound = store
                    .compounds
                    .get(c)
                    .ok_or_else(|| dangling("compound"))?
                    .clone();
                for s in compound.solids {
                    self.add_solid(store, s, op)?;
                }
                for s in compound.shells {
                    self.operands[op.index()].free_shells.push(s);
                    self.add_shell(store, s, op, false)?;
                }
                for f in compound.faces {
                    self.operands[op.index()].free_faces.push(f);
                    self.add_face(store, f, op)?;
                }
                Ok(())
            }
        }
    }

    fn add_solid(&mut self, store: &EntityStore, solid_id: SolidId, op: Operand) -> Result<(), BooleanError> {
        let solid = store.solids.get(solid_id).ok_or_else(|| dangling("solid"))?;
        self.operands[op.index()].solids.push(solid_id);
        let id = self.insert(EntityRef::Solid(solid_id), op, BoundingBox::empty(), 0.0);
        let mut bbox = BoundingBox::empty();
        for &shell_id in &solid.shells {
            bbox = bbox.union(&self.add_shell(store, shell_id, op, true)?);
        }
        self.records[id].bbox = bbox;
        Ok(())
    }

    fn add_shell(
        &mut self,
        store: &EntityStore,
        shell_id: ShellId,
        op: Operand,
        closed: bool,
    ) -> Result<BoundingBox, BooleanError> {
        let shell = store.shells.get(shell_id).ok_or_else(|| dangling("shell"))?;
        let id = self.insert(EntityRef::Shell(shell_id), op, BoundingBox::empty(), 0.0);
        let mut bbox = BoundingBox::empty();
        for &face_id in &shell.faces {
            bbox = bbox.union(&self.add_face(store, face_id, op)?);
        }
        if closed {
            let unbalanced = store.unbalanced_edges(&shell.faces);
            if !unbalanced.is_empty() {
                return Err(BooleanError::InvalidTopology(format!(
                    "solid shell is open or inconsistently oriented ({} unbalanced edges)",
                    unbalanced.len()
                )));
            }
        }
        self.records[id].bbox = bbox;
        Ok(bbox)
    }

    fn add_face(&mut self, store: &EntityStore, face_id: FaceId, op: Operand) -> Result<BoundingBox, BooleanError> {
        let face = store.faces.get(face_id).ok_or_else(|| dangling("face"))?;
        let seen = self.index.contains_key(&EntityRef::Face(face_id));
        let id = self.insert(EntityRef::Face(face_id), op, BoundingBox::empty(), face.tolerance);

        let loops: Vec<LoopId> = store.face_loops(face_id).collect();
        for loop_id in loops {
            let lp = store.loops.get(loop_id).ok_or_else(|| dangling("loop"))?;
            for &he_id in &lp.half_edges {
                let he = store.half_edges.get(he_id).ok_or_else(|| dangling("half-edge"))?;
                self.add_edge(store, he.edge, op)?;
            }
            if !is_loop_closed(store, loop_id) {
                return Err(BooleanError::InvalidTopology(format!(
                    "loop of face {} is not a closed chain",
                    id
                )));
            }
        }

        if seen {
            return Ok(self.records[id].bbox);
        }
        let bbox = store.face_bounding_box(face_id);
        self.records[id].bbox = bbox;
        debug!(face = id, surface = face.surface.surface_type_name(), "face indexed");
        Ok(bbox)
    }

    fn add_edge(&mut self, store: &EntityStore, edge_id: EdgeId, op: Operand) -> Result<(), BooleanError> {
        let edge = store.edges.get(edge_id).ok_or_else(|| dangling("edge"))?;
        if let Some(&id) = self.index.get(&EntityRef::Edge(edge_id)) {
            self.records[id].operands = self.records[id].operands.with(op);
        } else {
            let bbox = store.edge_bounding_box(edge_id);
            self.insert(EntityRef::Edge(edge_id), op, bbox, edge.tolerance);
        }
        for v in [edge.start_vertex, edge.end_vertex] {
            let vertex = store.vertices.get(v).ok_or_else(|| dangling("vertex"))?;
            let bbox = BoundingBox::new(vertex.point, vertex.point).expanded(vertex.tolerance);
            self.insert(EntityRef::Vertex(v), op, bbox, vertex.tolerance);
        }
        Ok(())
    }

    /// Index an entity, or widen the operand set of an existing record.
    fn insert(&mut self, entity: EntityRef, op: Operand, bbox: BoundingBox, tolerance: f64) -> usize {
        if let Some(&id) = self.index.get(&entity) {
            self.records[id].operands = self.records[id].operands.with(op);
            return id;
        }
        let id = self.records.len();
        self.records.push(SubShapeRecord {
            id,
            entity,
            operands: OperandSet::single(op),
            bbox,
            tolerance,
            splits: Vec::new(),
        });
        self.index.insert(entity, id);
        id
    }
}

fn dangling(kind: &str) -> BooleanError {
    BooleanError::InvalidTopology(format!("dangling {} reference", kind))
}
