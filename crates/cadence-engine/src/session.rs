//! Ownership of the browser for one run.

use crate::driver::{Driver, DriverError};
use crate::workflow::{
    NavigationStateMachine, RunPlan, ScheduleUpdate, StepObserver, WorkflowError, WorkflowState,
};
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to launch browser: {0}")]
    Launch(#[source] DriverError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Run cancelled before completion")]
    Cancelled,
}

impl RunError {
    pub fn final_state(&self) -> WorkflowState {
        WorkflowState::Failed
    }
}

/// Exclusively owns one driver. [`Session::release`] consumes the session,
/// so a released browser cannot be used again.
pub struct Session<D: Driver> {
    driver: D,
    launched: bool,
}

impl<D: Driver> Session<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            launched: false,
        }
    }

    pub async fn launch(&mut self) -> Result<(), DriverError> {
        // A launch that fails halfway can still leave a browser process behind.
        self.launched = true;
        self.driver.launch().await
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Close the browser if it was launched and hand the driver back.
    pub async fn release(mut self) -> (D, Result<(), DriverError>) {
        let closed = if self.launched {
            self.driver.close().await
        } else {
            Ok(())
        };
        match &closed {
            Ok(()) => tracing::info!("Session released"),
            Err(e) => tracing::warn!("Error while releasing session: {}", e),
        }
        (self.driver, closed)
    }
}

/// Outcome of [`execute`]. The driver is returned already closed.
pub struct RunReport<D> {
    pub driver: D,
    pub outcome: Result<ScheduleUpdate, RunError>,
    pub released: Result<(), DriverError>,
}

impl<D> RunReport<D> {
    pub fn final_state(&self) -> WorkflowState {
        match &self.outcome {
            Ok(update) => update.final_state,
            Err(e) => e.final_state(),
        }
    }
}

/// Launch, run the workflow, and release the browser whatever happened.
pub async fn execute<D, O>(driver: D, plan: &RunPlan, observer: &O) -> RunReport<D>
where
    D: Driver,
    O: StepObserver + ?Sized,
{
    execute_until(driver, plan, observer, std::future::pending::<()>()).await
}

/// As [`execute`], but stops early when `cancel` completes. The browser is
/// released in that case too.
pub async fn execute_until<D, O, C>(
    driver: D,
    plan: &RunPlan,
    observer: &O,
    cancel: C,
) -> RunReport<D>
where
    D: Driver,
    O: StepObserver + ?Sized,
    C: Future<Output = ()>,
{
    let mut session = Session::new(driver);

    let outcome = match session.launch().await {
        Ok(()) => {
            let machine = NavigationStateMachine::new(session.driver_mut(), plan, observer);
            tokio::select! {
                result = machine.run() => result.map_err(RunError::from),
                _ = cancel => Err(RunError::Cancelled),
            }
        }
        Err(e) => Err(RunError::Launch(e)),
    };

    let (driver, released) = session.release().await;
    RunReport {
        driver,
        outcome,
        released,
    }
}
