use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use super::error::{BooleanError, Diagnostic, DiagnosticReport};
use super::options::BooleanOptions;
use super::scheduler::TaskScheduler;

/// Shared flag a caller can flip from another thread to stop an operation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-operation state handed to every stage.
#[derive(Debug)]
pub struct OperationContext {
    /// Distance tolerance for all comparisons in this operation.
    pub tolerance: f64,
    pub angular_tolerance: f64,
    pub options: BooleanOptions,
    scheduler: TaskScheduler,
    cancel: CancellationToken,
    diagnostics: Vec<Diagnostic>,
}

impl OperationContext {
    pub fn new(options: BooleanOptions, tolerance: f64, cancel: CancellationToken) -> Result<Self, BooleanError> {
        options.validate()?;
        let scheduler = TaskScheduler::new(options.parallel, options.max_threads)?;
        Ok(Self {
            tolerance,
            angular_tolerance: crate::default_tolerance().angular.max(1e-9),
            options,
            scheduler,
            cancel,
            diagnostics: Vec::new(),
        })
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn check_cancelled(&self) -> Result<(), BooleanError> {
        if self.is_cancelled() {
            Err(BooleanError::OperationCancelled)
        } else {
            Ok(())
        }
    }

    /// Record a recoverable problem; fails instead in strict mode.
    pub fn report(&mut self, diagnostic: Diagnostic) -> Result<(), BooleanError> {
        if self.options.strict {
            return Err(BooleanError::from_diagnostic(&diagnostic));
        }
        warn!(code = %diagnostic.code, entity = ?diagnostic.entity, "{}", diagnostic.message);
        self.diagnostics.push(diagnostic);
        Ok(())
    }

    pub fn report_all(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) -> Result<(), BooleanError> {
        diagnostics.into_iter().try_for_each(|d| self.report(d))
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_report(self) -> DiagnosticReport {
        DiagnosticReport {
            warnings: self.diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boolean::error::DiagnosticCode;

    #[test]
    fn test_cancellation_is_shared() {
        let token = CancellationToken::new();
        let ctx = OperationContext::new(BooleanOptions::serial(), 1e-7, token.clone()).unwrap();
        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert!(matches!(ctx.check_cancelled(), Err(BooleanError::OperationCancelled)));
    }

    #[test]
    fn test_report_collects_in_lenient_mode() {
        let mut ctx = OperationContext::new(BooleanOptions::serial(), 1e-7, CancellationToken::new()).unwrap();
        ctx.report(Diagnostic::new(DiagnosticCode::OpenWire, Some(3), "gap")).unwrap();
        let report = ctx.into_report();
        assert_eq!(report.len(), 1);
        assert!(report.has(DiagnosticCode::OpenWire));
    }

    #[test]
    fn test_report_fails_in_strict_mode() {
        let options = BooleanOptions {
            parallel: false,
            ..BooleanOptions::strict()
        };
        let mut ctx = OperationContext::new(options, 1e-7, CancellationToken::new()).unwrap();
        let err = ctx
            .report(Diagnostic::new(DiagnosticCode::AmbiguousInterference, None, "no convergence"))
            .unwrap_err();
        assert!(matches!(err, BooleanError::AmbiguousInterference { .. }));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = BooleanOptions::default().with_fuzzy_value(f64::NAN);
        assert!(matches!(
            OperationContext::new(options, 1e-7, CancellationToken::new()),
            Err(BooleanError::InvalidOptions(_))
        ));
    }
}
