//! Supervision policy for per-item failures.
//!
//! Every stage boundary funnels its failures through [`classify`] instead
//! of handling them ad hoc. Malformed input and a single remote rejection
//! are expected, recoverable, per-item conditions; anything else means the
//! pipeline itself is unhealthy and must stop rather than silently lose
//! data while appearing to succeed.

use crate::error::PipelineError;

/// What to do with a failed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Drop the failing item and continue the run.
    Resume,
    /// Terminate the entire run, discarding accumulated results.
    Abort,
}

/// Classify a failure into a recovery directive.
pub fn classify(error: &PipelineError) -> Directive {
    match error {
        PipelineError::Parse { .. } => Directive::Resume,
        PipelineError::Create { .. } => Directive::Resume,
        _ => Directive::Abort,
    }
}
