use serde::Serialize;
use tracing::{info, instrument};

use super::assemble::assemble;
use super::classify::classify_fragments;
use super::context::{CancellationToken, OperationContext};
use super::data::BooleanData;
use super::error::{BooleanError, DiagnosticReport};
use super::interfere::{find_interferences, FaceDomains};
use super::options::BooleanOptions;
use super::pave::PaveFiller;
use super::rebuild::rebuild_faces;
use super::registry::ShapeRegistry;
use super::BoolOp;
use crate::topology::brep::*;
use crate::topology::builder::ShapeBuilder;

/// Result of a Boolean operation: a new store holding only the result
/// hierarchy, rooted at `shape`.
#[derive(Debug, Clone, Serialize)]
pub struct BooleanOutput {
    pub store: EntityStore,
    pub shape: CompoundId,
    pub report: DiagnosticReport,
}

impl BooleanOutput {
    pub fn compound(&self) -> &Compound {
        &self.store.compounds[self.shape]
    }

    pub fn is_empty(&self) -> bool {
        self.compound().is_empty()
    }
}

/// Run `op` on operand `a` and optional operand `b`.
pub fn perform(
    op: BoolOp,
    store: &EntityStore,
    a: ShapeRef,
    b: Option<ShapeRef>,
    options: &BooleanOptions,
) -> Result<BooleanOutput, BooleanError> {
    perform_cancellable(op, store, a, b, options, &CancellationToken::new())
}

/// [`perform`] with a token another thread may use to stop the operation.
#[instrument(skip(store, options, cancel))]
pub fn perform_cancellable(
    op: BoolOp,
    store: &EntityStore,
    a: ShapeRef,
    b: Option<ShapeRef>,
    options: &BooleanOptions,
    cancel: &CancellationToken,
) -> Result<BooleanOutput, BooleanError> {
    options.validate()?;
    let registry = ShapeRegistry::index(store, a, b)?;
    let tolerance = options.operation_tolerance(registry.max_tolerance());
    let mut ctx = OperationContext::new(options.clone(), tolerance, cancel.clone())?;
    ctx.check_cancelled()?;

    if b.is_none() && matches!(op, BoolOp::Intersection | BoolOp::Section) {
        let mut out = EntityStore::new();
        let shape = out.make_compound(Compound::default());
        return Ok(BooleanOutput {
            store: out,
            shape,
            report: ctx.into_report(),
        });
    }

    let data = fill(&mut ctx, store, registry)?;
    ctx.check_cancelled()?;
    let splits = rebuild_faces(&mut ctx, store, &data)?;
    ctx.check_cancelled()?;
    let states = classify_fragments(&mut ctx, store, &data, &splits)?;
    ctx.check_cancelled()?;
    let assembled = assemble(&mut ctx, store, &data, &splits, &states, op)?;
    ctx.check_cancelled()?;

    let report = ctx.into_report();
    info!(
        tolerance,
        warnings = report.len(),
        empty = assembled.store.compounds[assembled.compound].is_empty(),
        "boolean operation complete"
    );
    Ok(BooleanOutput {
        store: assembled.store,
        shape: assembled.compound,
        report,
    })
}

/// Index the operands and run the intersection and split stages.
pub fn build_data(
    ctx: &mut OperationContext,
    store: &EntityStore,
    a: ShapeRef,
    b: Option<ShapeRef>,
) -> Result<BooleanData, BooleanError> {
    let registry = ShapeRegistry::index(store, a, b)?;
    fill(ctx, store, registry)
}

fn fill(ctx: &mut OperationContext, store: &EntityStore, mut registry: ShapeRegistry) -> Result<BooleanData, BooleanError> {
    let domains = FaceDomains::build(ctx, store, &registry);
    ctx.check_cancelled()?;
    let interferences = find_interferences(ctx, store, &registry, &domains)?;
    ctx.check_cancelled()?;
    let pave = PaveFiller::new(ctx, store).run(ctx, &mut registry, &interferences)?;
    Ok(BooleanData {
        registry,
        domains,
        interferences,
        pave,
    })
}
