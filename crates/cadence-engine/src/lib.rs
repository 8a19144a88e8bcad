pub mod config;
pub mod driver;
pub mod error;
pub mod frames;
pub mod locator;
pub mod report;
pub mod session;
pub mod strategy;
pub mod toggle;
pub mod wait;
pub mod workflow;

pub use driver::{Driver, DriverError};
pub use error::{AutomationError, FrameResolutionExhausted};
pub use session::{RunError, RunReport, Session, execute, execute_until};
pub use strategy::{LogicalTarget, SelectorStrategy, StrategyTable};
pub use workflow::{NavigationStateMachine, RunPlan, ScheduleJob, WorkflowError, WorkflowState};
