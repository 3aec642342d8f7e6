use super::interfere::{FaceDomains, Interference, InterferenceKind};
use super::pave::PaveData;
use super::registry::ShapeRegistry;

/// Intermediate results shared by the rebuild, classify and assemble stages.
#[derive(Debug, Clone)]
pub struct BooleanData {
    pub registry: ShapeRegistry,
    pub domains: FaceDomains,
    pub interferences: Vec<Interference>,
    pub pave: PaveData,
}

impl BooleanData {
    /// Faces of the other operand lying on the same surface as `face`,
    /// with `true` when their normals agree.
    pub fn coincident_faces(&self, face: usize) -> Vec<(usize, bool)> {
        self.interferences
            .iter()
            .filter_map(|i| match i.kind {
                InterferenceKind::FaceCoincident { same_sense } if i.first == face => Some((i.second, same_sense)),
                InterferenceKind::FaceCoincident { same_sense } if i.second == face => Some((i.first, same_sense)),
                _ => None,
            })
            .collect()
    }

    /// Record ids that take part in at least one interference.
    pub fn touched_records(&self) -> Vec<bool> {
        let mut touched = vec![false; self.registry.len()];
        for i in &self.interferences {
            touched[i.first] = true;
            touched[i.second] = true;
        }
        touched
    }
}
