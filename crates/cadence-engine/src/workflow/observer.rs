use super::state::WorkflowState;
use crate::error::AutomationError;
use crate::frames::FrameResolution;
use crate::report::ReportRow;
use crate::strategy::LogicalTarget;
use std::time::Duration;

/// Receives progress events from the state machine. All methods default to
/// no-ops.
pub trait StepObserver: Send + Sync {
    fn step_started(&self, _step: WorkflowState) {}

    fn step_succeeded(&self, _step: WorkflowState, _elapsed: Duration) {}

    fn step_failed(&self, _step: WorkflowState, _elapsed: Duration, _error: &AutomationError) {}

    fn frame_resolved(
        &self,
        _step: WorkflowState,
        _target: LogicalTarget,
        _resolution: &FrameResolution,
    ) {
    }

    fn row_matched(&self, _report_name: &str, _row: &ReportRow) {}

    /// A schedule field was written. Never called for credential fields.
    fn field_updated(&self, _target: LogicalTarget, _previous: Option<&str>, _value: &str) {}
}

/// Emits every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl StepObserver for TracingObserver {
    fn step_started(&self, step: WorkflowState) {
        tracing::info!(step = step.name(), "Step started");
    }

    fn step_succeeded(&self, step: WorkflowState, elapsed: Duration) {
        tracing::info!(
            step = step.name(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Step succeeded"
        );
    }

    fn step_failed(&self, step: WorkflowState, elapsed: Duration, error: &AutomationError) {
        tracing::error!(
            step = step.name(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Step failed: {}",
            error
        );
    }

    fn frame_resolved(&self, step: WorkflowState, target: LogicalTarget, resolution: &FrameResolution) {
        if let Some(note) = &resolution.exhausted {
            tracing::warn!(step = step.name(), element = %target, "{}", note);
        } else {
            tracing::info!(
                step = step.name(),
                element = %target,
                frame = resolution.document.label(),
                "Using frame"
            );
        }
    }

    fn row_matched(&self, report_name: &str, row: &ReportRow) {
        tracing::info!(report = report_name, row = row.index, tier = %row.tier, "Matched report row");
    }

    fn field_updated(&self, target: LogicalTarget, previous: Option<&str>, value: &str) {
        tracing::info!(element = %target, previous = previous.unwrap_or(""), value, "Field updated");
    }
}
