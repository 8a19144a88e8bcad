use crate::driver::{DocumentNode, Driver, ElementHandle};
use crate::error::AutomationError;
use crate::strategy::{LogicalTarget, SelectorStrategy};
use crate::wait::{Probe, Waiter};
use async_trait::async_trait;
use std::time::Duration;

/// Resolves a logical target through its fallback chain.
///
/// A selector wins only when exactly one visible, enabled element matches.
/// Zero or several matches, or a driver error for that selector, move on to
/// the next selector. Full passes repeat until the timeout.
#[derive(Debug, Clone, Default)]
pub struct FallbackLocator {
    waiter: Waiter,
}

impl FallbackLocator {
    pub fn new(waiter: Waiter) -> Self {
        Self { waiter }
    }

    pub async fn resolve<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        target: LogicalTarget,
        strategy: &SelectorStrategy,
        document: &DocumentNode,
        scope: Option<&ElementHandle>,
        timeout: Duration,
    ) -> Result<ElementHandle, AutomationError> {
        let mut probe = UniqueMatchProbe {
            target,
            strategy,
            document,
            scope,
            outcomes: vec![None; strategy.len()],
        };

        match self.waiter.await_condition(driver, &mut probe, timeout).await {
            Ok((index, element)) => {
                tracing::debug!(
                    element = %target,
                    strategy = index,
                    selector = %strategy.selectors()[index],
                    document = document.label(),
                    "Resolved element"
                );
                Ok(element)
            }
            Err(e) if e.is_timeout() => Err(probe.exhausted()),
            Err(e) => Err(e),
        }
    }

    /// Wait until some selector matches at least one element, visible or not,
    /// and return all its matches in document order.
    pub async fn await_present<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        target: LogicalTarget,
        strategy: &SelectorStrategy,
        document: &DocumentNode,
        timeout: Duration,
    ) -> Result<Vec<ElementHandle>, AutomationError> {
        let mut probe = PresenceProbe {
            target,
            strategy,
            document,
            outcomes: vec![None; strategy.len()],
        };

        match self.waiter.await_condition(driver, &mut probe, timeout).await {
            Ok(elements) => Ok(elements),
            Err(e) if e.is_timeout() => Err(not_found(target, strategy, &probe.outcomes)),
            Err(e) => Err(e),
        }
    }
}

fn not_found(
    target: LogicalTarget,
    strategy: &SelectorStrategy,
    outcomes: &[Option<String>],
) -> AutomationError {
    let attempted = strategy
        .iter()
        .zip(outcomes)
        .map(|(selector, outcome)| match outcome {
            Some(outcome) => format!("{} -> {}", selector, outcome),
            None => format!("{} -> not evaluated", selector),
        })
        .collect();

    AutomationError::ElementNotFound {
        target: target.to_string(),
        attempted,
        frame: None,
    }
}

struct UniqueMatchProbe<'a> {
    target: LogicalTarget,
    strategy: &'a SelectorStrategy,
    document: &'a DocumentNode,
    scope: Option<&'a ElementHandle>,
    outcomes: Vec<Option<String>>,
}

impl UniqueMatchProbe<'_> {
    fn exhausted(&self) -> AutomationError {
        not_found(self.target, self.strategy, &self.outcomes)
    }
}

#[async_trait]
impl<'a, D: Driver + ?Sized> Probe<D> for UniqueMatchProbe<'a> {
    type Output = (usize, ElementHandle);

    fn describe(&self) -> String {
        format!("a unique match for {}", self.target)
    }

    async fn probe(&mut self, driver: &mut D) -> Result<Option<Self::Output>, AutomationError> {
        for (index, selector) in self.strategy.iter().enumerate() {
            match driver.query(self.document, self.scope, selector).await {
                Ok(found) => {
                    let total = found.len();
                    let mut actionable: Vec<ElementHandle> =
                        found.into_iter().filter(ElementHandle::is_actionable).collect();
                    if actionable.len() == 1 {
                        return Ok(actionable.pop().map(|element| (index, element)));
                    }
                    self.outcomes[index] = Some(format!(
                        "{} actionable of {} match(es)",
                        actionable.len(),
                        total
                    ));
                }
                Err(e) => {
                    tracing::debug!(element = %self.target, %selector, "query failed: {}", e);
                    self.outcomes[index] = Some(format!("error: {}", e));
                }
            }
        }
        Ok(None)
    }
}

struct PresenceProbe<'a> {
    target: LogicalTarget,
    strategy: &'a SelectorStrategy,
    document: &'a DocumentNode,
    outcomes: Vec<Option<String>>,
}

#[async_trait]
impl<'a, D: Driver + ?Sized> Probe<D> for PresenceProbe<'a> {
    type Output = Vec<ElementHandle>;

    fn describe(&self) -> String {
        format!("{} to be present", self.target)
    }

    async fn probe(&mut self, driver: &mut D) -> Result<Option<Self::Output>, AutomationError> {
        for (index, selector) in self.strategy.iter().enumerate() {
            match driver.query(self.document, None, selector).await {
                Ok(found) if !found.is_empty() => return Ok(Some(found)),
                Ok(_) => self.outcomes[index] = Some("0 match(es)".to_string()),
                Err(e) => self.outcomes[index] = Some(format!("error: {}", e)),
            }
        }
        Ok(None)
    }
}
