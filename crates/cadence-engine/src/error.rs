use crate::driver::DriverError;
use std::time::Duration;
use thiserror::Error;

/// No frame satisfied a probe; the root document was used instead.
///
/// Not fatal on its own. It becomes the source of an [`AutomationError::ElementNotFound`]
/// or [`AutomationError::ReportNotFound`] when the caller then fails to find its
/// target in the root document.
#[derive(Debug, Clone, Error)]
#[error("No frame matched '{probe}' after scanning {candidates} candidate(s); fell back to the root document")]
pub struct FrameResolutionExhausted {
    pub probe: String,
    pub candidates: usize,
    pub failures: Vec<String>,
}

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Timed out after {elapsed:?} waiting for {what}")]
    Timeout { what: String, elapsed: Duration },

    #[error("Element not found for '{target}' (attempted: {})", attempted.join("; "))]
    ElementNotFound {
        target: String,
        attempted: Vec<String>,
        #[source]
        frame: Option<FrameResolutionExhausted>,
    },

    #[error("Report '{name}' not found ({rows_scanned} row(s) scanned)")]
    ReportNotFound {
        name: String,
        rows_scanned: usize,
        #[source]
        frame: Option<FrameResolutionExhausted>,
    },

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}

impl AutomationError {
    /// Attach a frame fallback note to a lookup that came up empty; other
    /// variants are returned unchanged.
    pub fn after_frame_fallback(self, note: Option<FrameResolutionExhausted>) -> Self {
        match self {
            AutomationError::ElementNotFound {
                target,
                attempted,
                frame: None,
            } => AutomationError::ElementNotFound {
                target,
                attempted,
                frame: note,
            },
            AutomationError::ReportNotFound {
                name,
                rows_scanned,
                frame: None,
            } => AutomationError::ReportNotFound {
                name,
                rows_scanned,
                frame: note,
            },
            other => other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AutomationError::Timeout { .. })
    }
}
