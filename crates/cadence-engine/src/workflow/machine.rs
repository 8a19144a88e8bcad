//! The end-to-end schedule update, one linear step at a time.
//!
//! Every step follows the same shape: find the document (window root or a
//! resolved frame), resolve the control through its fallback chain, act on
//! it, then wait for the page to settle before the next step starts.
//! Documents are looked up again in each step because the portal re-renders
//! between steps.

use super::observer::StepObserver;
use super::state::WorkflowState;
use super::{RunPlan, ScheduleUpdate, WorkflowError};
use crate::driver::{DocumentNode, Driver, DriverError, ElementHandle, WindowExpectation, WindowId};
use crate::error::AutomationError;
use crate::frames::{FrameResolution, FrameResolver};
use crate::locator::FallbackLocator;
use crate::report::ReportRowFinder;
use crate::strategy::LogicalTarget;
use crate::toggle::ToggleEngine;
use crate::wait::{LoadState, Waiter};
use std::time::Duration;
use tokio::time::Instant;

pub struct NavigationStateMachine<'a, D: Driver + ?Sized, O: StepObserver + ?Sized> {
    driver: &'a mut D,
    plan: &'a RunPlan,
    observer: &'a O,
    waiter: Waiter,
    locator: FallbackLocator,
    frames: FrameResolver,
    rows: ReportRowFinder,
    state: WorkflowState,
    window: Option<WindowId>,
    pending_window: Option<WindowExpectation>,
    report_row: Option<usize>,
    interval: Option<(String, &'static str)>,
}

impl<'a, D: Driver + ?Sized, O: StepObserver + ?Sized> NavigationStateMachine<'a, D, O> {
    pub fn new(driver: &'a mut D, plan: &'a RunPlan, observer: &'a O) -> Self {
        let timing = &plan.timing;
        let waiter = Waiter::new(timing.poll_interval(), timing.network_idle_quiet());
        let frames = FrameResolver::new(waiter.clone(), timing.default_timeout(), timing.frame_settle());

        Self {
            driver,
            plan,
            observer,
            locator: FallbackLocator::new(waiter.clone()),
            frames,
            waiter,
            rows: ReportRowFinder,
            state: WorkflowState::LoggedOut,
            window: None,
            pending_window: None,
            report_row: None,
            interval: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Walk every step until `Saved`. The first failing step moves the
    /// machine to `Failed` and is returned; nothing is retried.
    pub async fn run(mut self) -> Result<ScheduleUpdate, WorkflowError> {
        let started = Instant::now();

        while let Some(step) = self.state.next() {
            self.observer.step_started(step);
            let step_started = Instant::now();

            match self.enter(step).await {
                Ok(()) => {
                    self.observer.step_succeeded(step, step_started.elapsed());
                    self.state = step;
                }
                Err(source) => {
                    self.observer.step_failed(step, step_started.elapsed(), &source);
                    self.state = WorkflowState::Failed;
                    return Err(WorkflowError { step, source });
                }
            }
        }

        let (previous_interval, interval) = self.interval.take().unwrap_or_default();
        Ok(ScheduleUpdate {
            final_state: self.state,
            report_name: self.plan.job.report_name.clone(),
            report_row: self.report_row.unwrap_or_default(),
            start_date: self.plan.job.start_date.clone(),
            previous_interval,
            interval: interval.to_string(),
            elapsed: started.elapsed(),
        })
    }

    async fn enter(&mut self, step: WorkflowState) -> Result<(), AutomationError> {
        let plan = self.plan;
        let timing = &plan.timing;
        match step {
            WorkflowState::Authenticating => {
                let job = &plan.job;
                let nav = self.driver.navigate(&job.url).await?;
                tracing::debug!(url = %nav.url, title = %nav.title, "Login page loaded");

                let root = self.root_document().await?;
                self.load_state(&root, LoadState::DomContentLoaded).await?;
                self.fill(LogicalTarget::UsernameInput, &root, &job.credentials.username)
                    .await?;
                self.click(LogicalTarget::NextButton, &root, None).await?;
                self.load_state(&root, LoadState::NetworkIdle).await
            }

            WorkflowState::Authenticated => {
                let root = self.root_document().await?;
                self.fill(
                    LogicalTarget::PasswordInput,
                    &root,
                    &plan.job.credentials.password,
                )
                .await?;
                self.click(LogicalTarget::LoginButton, &root, None).await?;
                self.load_state(&root, LoadState::NetworkIdle).await
            }

            WorkflowState::SuiteTileClicked => {
                let root = self.root_document().await?;
                self.load_state(&root, LoadState::DomContentLoaded).await?;
                self.load_state(&root, LoadState::NetworkIdle).await?;

                // The tile opens the suite in a new window; register before clicking.
                self.pending_window = Some(self.driver.expect_window().await?);
                self.click(LogicalTarget::SuiteTile, &root, None).await
            }

            WorkflowState::SuiteWindowOpen => {
                let expectation = self
                    .pending_window
                    .take()
                    .ok_or_else(|| DriverError::WindowNotFound("no window was expected".into()))?;
                let window = self
                    .driver
                    .wait_for_window(&expectation, timing.default_timeout())
                    .await?;
                self.driver.switch_to_window(&window).await?;
                tracing::info!(%window, "Switched to suite window");
                self.window = Some(window);

                let root = self.root_document().await?;
                self.load_state(&root, LoadState::DomContentLoaded).await?;
                self.load_state(&root, LoadState::Load).await?;
                self.settle(timing.suite_settle_ms).await;
                Ok(())
            }

            WorkflowState::FavoritesMenuOpen => {
                let root = self.root_document().await?;
                self.click(LogicalTarget::FavoritesMenu, &root, None).await?;

                let table = &plan.table;
                self.locator
                    .await_present(
                        self.driver,
                        LogicalTarget::FavoritesDropdown,
                        &table.strategy(LogicalTarget::FavoritesDropdown),
                        &root,
                        timing.default_timeout(),
                    )
                    .await?;
                self.settle(timing.favorites_settle_ms).await;
                Ok(())
            }

            WorkflowState::ReportsListLoaded => {
                let root = self.root_document().await?;
                self.click(LogicalTarget::ReportsMenuItem, &root, None).await?;
                self.load_state(&root, LoadState::DomContentLoaded).await?;
                self.load_state(&root, LoadState::Load).await?;
                self.settle(timing.reports_settle_ms).await;
                Ok(())
            }

            WorkflowState::ScheduleFormOpen => {
                let frame = self.resolve_frame(step, LogicalTarget::ReportRows).await?;
                let document = &frame.document;
                self.settle(timing.table_settle_ms).await;

                let table = &plan.table;
                self.locator
                    .await_present(
                        self.driver,
                        LogicalTarget::ReportRows,
                        &table.strategy(LogicalTarget::ReportRows),
                        document,
                        timing.default_timeout(),
                    )
                    .await
                    .map_err(|e| e.after_frame_fallback(frame.exhausted.clone()))?;

                let report_name = &plan.job.report_name;
                let row = self
                    .rows
                    .find_row(
                        self.driver,
                        document,
                        &table.strategy(LogicalTarget::ReportRows),
                        &table.strategy(LogicalTarget::ReportNameCell),
                        report_name,
                    )
                    .await
                    .map_err(|e| e.after_frame_fallback(frame.exhausted.clone()))?;
                self.observer.row_matched(report_name, &row);
                self.report_row = Some(row.index);

                self.click(LogicalTarget::ScheduleLink, document, Some(&row.element))
                    .await?;
                self.load_state(document, LoadState::NetworkIdle).await
            }

            WorkflowState::FieldsUpdated => {
                self.settle(timing.form_settle_ms).await;
                let frame = self.resolve_frame(step, LogicalTarget::StartDateInput).await?;
                let document = &frame.document;
                self.settle(timing.form_frame_settle_ms).await;

                let start_date = &plan.job.start_date;
                self.fill(LogicalTarget::StartDateInput, document, start_date)
                    .await
                    .map_err(|e| e.after_frame_fallback(frame.exhausted.clone()))?;
                self.observer
                    .field_updated(LogicalTarget::StartDateInput, None, start_date);

                let field = self
                    .locate(LogicalTarget::IntervalInput, document, None)
                    .await
                    .map_err(|e| e.after_frame_fallback(frame.exhausted.clone()))?;
                let current =
                    ToggleEngine::read_current(self.driver, &field, timing.value_read_timeout())
                        .await;
                let next = ToggleEngine::compute_next(&current);
                self.driver.write_value(&field, next).await?;
                self.observer
                    .field_updated(LogicalTarget::IntervalInput, Some(&current), next);
                self.interval = Some((current, next));
                Ok(())
            }

            WorkflowState::Saved => {
                let frame = self.resolve_frame(step, LogicalTarget::StartDateInput).await?;
                let document = &frame.document;
                self.click(LogicalTarget::SaveButton, document, None)
                    .await
                    .map_err(|e| e.after_frame_fallback(frame.exhausted.clone()))?;
                self.load_state(document, LoadState::NetworkIdle).await
            }

            WorkflowState::LoggedOut | WorkflowState::Failed => Ok(()),
        }
    }

    async fn active_window(&self) -> Result<WindowId, AutomationError> {
        match &self.window {
            Some(window) => Ok(window.clone()),
            None => Ok(self.driver.current_window().await?),
        }
    }

    async fn root_document(&mut self) -> Result<DocumentNode, AutomationError> {
        let window = self.active_window().await?;
        Ok(self.driver.frame_tree(&window).await?.document)
    }

    async fn resolve_frame(
        &mut self,
        step: WorkflowState,
        probe: LogicalTarget,
    ) -> Result<FrameResolution, AutomationError> {
        let window = self.active_window().await?;
        let resolution = self
            .frames
            .resolve_frame(
                self.driver,
                &window,
                probe,
                &self.plan.table.strategy(probe),
                self.plan.timing.frame_timeout(),
            )
            .await?;
        self.observer.frame_resolved(step, probe, &resolution);
        Ok(resolution)
    }

    async fn locate(
        &mut self,
        target: LogicalTarget,
        document: &DocumentNode,
        scope: Option<&ElementHandle>,
    ) -> Result<ElementHandle, AutomationError> {
        self.locator
            .resolve(
                self.driver,
                target,
                &self.plan.table.strategy(target),
                document,
                scope,
                self.plan.timing.default_timeout(),
            )
            .await
    }

    async fn click(
        &mut self,
        target: LogicalTarget,
        document: &DocumentNode,
        scope: Option<&ElementHandle>,
    ) -> Result<(), AutomationError> {
        let element = self.locate(target, document, scope).await?;
        self.driver.click(&element).await?;
        tracing::debug!(element = %target, "Clicked");
        Ok(())
    }

    async fn fill(
        &mut self,
        target: LogicalTarget,
        document: &DocumentNode,
        value: &str,
    ) -> Result<(), AutomationError> {
        let element = self.locate(target, document, None).await?;
        self.driver.write_value(&element, value).await?;
        Ok(())
    }

    async fn load_state(
        &mut self,
        document: &DocumentNode,
        state: LoadState,
    ) -> Result<(), AutomationError> {
        self.waiter
            .await_load_state(self.driver, document, state, self.plan.timing.default_timeout())
            .await
    }

    async fn settle(&self, millis: u64) {
        self.waiter
            .await_fixed_delay(Duration::from_millis(millis))
            .await;
    }
}
