pub mod geometry;
pub mod topology;
pub mod boolean;
pub mod validation;

// Re-export key traits at crate root for convenience.
pub use boolean::{
    perform, BoolOp, BooleanEngine, BooleanError, BooleanOptions, BooleanOutput, CancellationToken,
    DefaultBooleanEngine, DiagnosticReport,
};
pub use geometry::{CurveEval, SurfaceEval};
pub use topology::builder::ShapeBuilder;

/// Floor tolerances below which no operation tolerance may drop.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Points closer than this are one vertex.
    pub coincidence: f64,
    /// Directions within this angle (radians) are parallel.
    pub angular: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            coincidence: 1e-7,
            angular: 1e-10,
        }
    }
}

/// Kernel-wide default tolerance.
pub fn default_tolerance() -> Tolerance {
    Tolerance::default()
}
