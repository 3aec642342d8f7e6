pub mod volume;

pub use volume::*;

use tracing::{info, instrument, warn};

use crate::boolean::BooleanOutput;
use crate::topology::brep::{audit_solid, SolidId, TopologyAudit};

/// Audit every solid of a Boolean result.
#[instrument(skip_all)]
pub fn audit_output(output: &BooleanOutput) -> Vec<(SolidId, TopologyAudit)> {
    let audits: Vec<(SolidId, TopologyAudit)> = output
        .compound()
        .solids
        .iter()
        .map(|&s| (s, audit_solid(&output.store, s)))
        .collect();
    let failed = audits.iter().filter(|(_, a)| !a.all_valid()).count();
    if failed > 0 {
        warn!(failed, "result solids failed the topology audit");
    }
    info!(solids = audits.len(), failed, "result audited");
    audits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boolean::{perform, BoolOp, BooleanOptions};
    use crate::topology::brep::{EntityStore, ShapeRef};
    use crate::topology::primitives::make_box;

    #[test]
    fn test_difference_result_passes_audit() {
        let mut store = EntityStore::new();
        let a = make_box(&mut store, 0.0, 0.0, 0.0, 2.0, 2.0, 2.0).unwrap();
        let b = make_box(&mut store, 1.0, 1.0, 1.0, 3.0, 3.0, 3.0).unwrap();
        let out = perform(
            BoolOp::Difference,
            &store,
            ShapeRef::Solid(a),
            Some(ShapeRef::Solid(b)),
            &BooleanOptions::serial(),
        )
        .unwrap();
        let audits = audit_output(&out);
        assert_eq!(audits.len(), 1);
        assert!(audits.iter().all(|(_, a)| a.all_valid()), "{audits:?}");
    }
}
