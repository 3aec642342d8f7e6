pub mod assemble;
pub mod classify;
pub mod context;
pub mod data;
pub mod engine;
pub mod error;
pub mod interfere;
pub mod options;
pub mod pave;
pub mod rebuild;
pub mod registry;
pub mod scheduler;

use serde::{Deserialize, Serialize};

use crate::topology::brep::{EntityStore, ShapeRef};

pub use context::CancellationToken;
pub use engine::{perform, perform_cancellable, BooleanOutput};
pub use error::{BooleanError, Diagnostic, DiagnosticCode, DiagnosticReport};
pub use options::BooleanOptions;

/// The four Boolean operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoolOp {
    /// Material of either operand.
    Union,
    /// Material common to both operands.
    Intersection,
    /// Material of the first operand not in the second.
    Difference,
    /// Faces, edges and vertices where the operand boundaries meet.
    Section,
}

/// Trait for Boolean operations on B-Rep shapes.
///
/// Provides `union`, `subtract`, `intersect` and `section` on top of a
/// single `perform`. Implement this trait to provide alternative Boolean
/// backends or mock implementations.
pub trait BooleanEngine {
    /// Run `op` with explicit options. A missing `b` means the single
    /// operand form of the operation.
    fn perform(
        &self,
        op: BoolOp,
        store: &EntityStore,
        a: ShapeRef,
        b: Option<ShapeRef>,
        options: &BooleanOptions,
    ) -> Result<BooleanOutput, BooleanError>;

    /// Compute the union of two shapes.
    fn union(&self, store: &EntityStore, a: ShapeRef, b: ShapeRef) -> Result<BooleanOutput, BooleanError> {
        self.perform(BoolOp::Union, store, a, Some(b), &BooleanOptions::default())
    }

    /// Subtract shape `b` from shape `a`.
    fn subtract(&self, store: &EntityStore, a: ShapeRef, b: ShapeRef) -> Result<BooleanOutput, BooleanError> {
        self.perform(BoolOp::Difference, store, a, Some(b), &BooleanOptions::default())
    }

    /// Compute the intersection of two shapes.
    fn intersect(&self, store: &EntityStore, a: ShapeRef, b: ShapeRef) -> Result<BooleanOutput, BooleanError> {
        self.perform(BoolOp::Intersection, store, a, Some(b), &BooleanOptions::default())
    }

    /// Compute where the boundaries of two shapes meet.
    fn section(&self, store: &EntityStore, a: ShapeRef, b: ShapeRef) -> Result<BooleanOutput, BooleanError> {
        self.perform(BoolOp::Section, store, a, Some(b), &BooleanOptions::default())
    }
}

/// Default Boolean engine backed by [`engine::perform`], with an optional
/// cancellation token shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct DefaultBooleanEngine {
    cancel: CancellationToken,
}

impl DefaultBooleanEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

impl BooleanEngine for DefaultBooleanEngine {
    fn perform(
        &self,
        op: BoolOp,
        store: &EntityStore,
        a: ShapeRef,
        b: Option<ShapeRef>,
        options: &BooleanOptions,
    ) -> Result<BooleanOutput, BooleanError> {
        engine::perform_cancellable(op, store, a, b, options, &self.cancel)
    }
}

#[cfg(test)]
mod trait_tests {
    use super::*;
    use crate::topology::primitives::make_box;

    fn overlapping(store: &mut EntityStore) -> (ShapeRef, ShapeRef) {
        let a = make_box(store, 0.0, 0.0, 0.0, 2.0, 2.0, 2.0).unwrap();
        let b = make_box(store, 1.0, 1.0, 1.0, 3.0, 3.0, 3.0).unwrap();
        (ShapeRef::Solid(a), ShapeRef::Solid(b))
    }

    #[test]
    fn test_boolean_engine_trait_union() {
        let engine = DefaultBooleanEngine::new();
        let mut store = EntityStore::new();
        let a = make_box(&mut store, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0).unwrap();
        let b = make_box(&mut store, 5.0, 5.0, 5.0, 6.0, 6.0, 6.0).unwrap();
        let result = engine.union(&store, ShapeRef::Solid(a), ShapeRef::Solid(b));
        assert!(result.is_ok());
    }

    #[test]
    fn test_boolean_engine_trait_subtract() {
        let engine = DefaultBooleanEngine::new();
        let mut store = EntityStore::new();
        let (a, b) = overlapping(&mut store);
        let result = engine.subtract(&store, a, b).unwrap();
        assert_eq!(result.compound().solids.len(), 1);
    }

    #[test]
    fn test_boolean_engine_trait_intersect() {
        let engine = DefaultBooleanEngine::new();
        let mut store = EntityStore::new();
        let (a, b) = overlapping(&mut store);
        let result = engine.intersect(&store, a, b).unwrap();
        assert_eq!(result.compound().solids.len(), 1);
    }

    #[test]
    fn test_boolean_engine_cancelled() {
        let token = CancellationToken::new();
        let engine = DefaultBooleanEngine::with_cancellation(token.clone());
        let mut store = EntityStore::new();
        let (a, b) = overlapping(&mut store);
        token.cancel();
        assert!(matches!(engine.section(&store, a, b), Err(BooleanError::OperationCancelled)));
    }

    #[test]
    fn test_bool_op_serde_names() {
        assert_eq!(serde_json::to_string(&BoolOp::Section).unwrap(), "\"Section\"");
    }
}
