pub mod machine;
pub mod observer;
pub mod state;

pub use machine::NavigationStateMachine;
pub use observer::{StepObserver, TracingObserver};
pub use state::WorkflowState;

use crate::config::{CadenceConfig, ConfigError, Credentials, TimingConfig};
use crate::config::loader::today;
use crate::error::AutomationError;
use crate::strategy::StrategyTable;
use std::time::Duration;
use thiserror::Error;

/// What to change and where.
#[derive(Debug, Clone)]
pub struct ScheduleJob {
    pub url: String,
    pub credentials: Credentials,
    pub report_name: String,
    /// Already formatted for the portal's date field.
    pub start_date: String,
}

/// Everything a run needs besides the driver.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub job: ScheduleJob,
    pub table: StrategyTable,
    pub timing: TimingConfig,
}

impl RunPlan {
    /// Build a plan for today from loaded configuration.
    pub fn for_today(
        config: &CadenceConfig,
        credentials: Credentials,
        table: StrategyTable,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            job: ScheduleJob {
                url: config.portal.url.clone(),
                credentials,
                report_name: config.portal.report_name.clone(),
                start_date: today(&config.portal.date_format)?,
            },
            table,
            timing: config.timing.clone(),
        })
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct ScheduleUpdate {
    pub final_state: WorkflowState,
    pub report_name: String,
    pub report_row: usize,
    pub start_date: String,
    /// Interval as read before the change; empty when unreadable.
    pub previous_interval: String,
    pub interval: String,
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
#[error("Step '{step}' failed: {source}")]
pub struct WorkflowError {
    pub step: WorkflowState,
    #[source]
    pub source: AutomationError,
}

impl WorkflowError {
    pub fn final_state(&self) -> WorkflowState {
        WorkflowState::Failed
    }

    /// Logical target the step could not find, if that is why it failed.
    pub fn target(&self) -> Option<&str> {
        match &self.source {
            AutomationError::ElementNotFound { target, .. } => Some(target),
            _ => None,
        }
    }
}
