use crate::driver::{DocumentNode, Driver, DriverError, FrameTree, WindowId};
use crate::error::{AutomationError, FrameResolutionExhausted};
use crate::strategy::{LogicalTarget, SelectorStrategy};
use crate::wait::{LoadState, Waiter, deadline_after};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of a frame search. `exhausted` is set when nothing matched and
/// `document` is the window's root.
#[derive(Debug, Clone)]
pub struct FrameResolution {
    pub document: DocumentNode,
    pub exhausted: Option<FrameResolutionExhausted>,
}

impl FrameResolution {
    pub fn is_fallback(&self) -> bool {
        self.exhausted.is_some()
    }
}

/// Finds the document in a window's frame tree that contains a target.
#[derive(Debug, Clone)]
pub struct FrameResolver {
    waiter: Waiter,
    candidate_load_timeout: Duration,
    settle: Duration,
}

impl FrameResolver {
    pub fn new(waiter: Waiter, candidate_load_timeout: Duration, settle: Duration) -> Self {
        Self {
            waiter,
            candidate_load_timeout,
            settle,
        }
    }

    /// Scan the frame tree breadth-first (root, then named frames in document
    /// order) for a document where any selector of `probe` matches.
    ///
    /// The tree is re-enumerated on every pass since frames attach late. When
    /// the timeout passes with no match the root document is returned along
    /// with a [`FrameResolutionExhausted`] note. Only a failure to enumerate the
    /// tree at all is an error.
    pub async fn resolve_frame<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        window: &WindowId,
        target: LogicalTarget,
        probe: &SelectorStrategy,
        timeout: Duration,
    ) -> Result<FrameResolution, AutomationError> {
        let deadline = deadline_after(timeout);
        let mut root: Option<DocumentNode> = None;
        let mut last_error: Option<DriverError> = None;
        let mut failures = Vec::new();
        let mut candidates = 0;

        loop {
            match driver.frame_tree(window).await {
                Ok(tree) => {
                    root = Some(tree.document.clone());
                    let queue = breadth_first_candidates(&tree);
                    candidates = queue.len();

                    for candidate in queue {
                        match self.check_candidate(driver, &candidate, probe, deadline).await {
                            Ok(true) => {
                                tracing::info!(
                                    element = %target,
                                    frame = candidate.label(),
                                    url = %candidate.url,
                                    "Resolved frame"
                                );
                                return Ok(FrameResolution {
                                    document: candidate,
                                    exhausted: None,
                                });
                            }
                            Ok(false) => {}
                            Err(e) => {
                                tracing::debug!(frame = candidate.label(), "Skipping frame: {}", e);
                                failures.push(format!("{}: {}", candidate.label(), e));
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(%window, "Frame tree unavailable: {}", e);
                    last_error = Some(e);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(self.waiter.poll_interval().min(deadline - now)).await;
        }

        let Some(document) = root else {
            return Err(last_error
                .unwrap_or_else(|| DriverError::WindowNotFound(window.to_string()))
                .into());
        };

        let note = FrameResolutionExhausted {
            probe: target.to_string(),
            candidates,
            failures,
        };
        tracing::warn!(element = %target, "{}", note);

        Ok(FrameResolution {
            document,
            exhausted: Some(note),
        })
    }

    async fn check_candidate<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        candidate: &DocumentNode,
        probe: &SelectorStrategy,
        deadline: Instant,
    ) -> Result<bool, AutomationError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.waiter
            .await_load_state(
                driver,
                candidate,
                LoadState::DomContentLoaded,
                self.candidate_load_timeout.min(remaining),
            )
            .await?;
        self.waiter.await_fixed_delay(self.settle).await;

        for selector in probe.iter() {
            if !driver.query(candidate, None, selector).await?.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Root first, then named frames level by level. Unnamed frames are not
/// candidates themselves but their subtrees are still scanned.
fn breadth_first_candidates(tree: &FrameTree) -> Vec<DocumentNode> {
    let mut out = vec![tree.document.clone()];
    let mut queue: VecDeque<&FrameTree> = tree.children.iter().collect();

    while let Some(node) = queue.pop_front() {
        if !node.document.name.is_empty() {
            out.push(node.document.clone());
        }
        queue.extend(node.children.iter());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, is_root: bool) -> DocumentNode {
        DocumentNode {
            window: WindowId("w".into()),
            frame_id: format!("f-{}", name),
            name: name.to_string(),
            url: String::new(),
            is_root,
        }
    }

    fn leaf(name: &str) -> FrameTree {
        FrameTree {
            document: doc(name, false),
            children: vec![],
        }
    }

    #[test]
    fn candidates_are_breadth_first_and_named_only() {
        let tree = FrameTree {
            document: doc("", true),
            children: vec![
                FrameTree {
                    document: doc("", false),
                    children: vec![leaf("deep")],
                },
                FrameTree {
                    document: doc("nav", false),
                    children: vec![leaf("inner")],
                },
                leaf("main"),
            ],
        };

        let labels: Vec<String> = breadth_first_candidates(&tree)
            .iter()
            .map(|d| d.label().to_string())
            .collect();
        assert_eq!(labels, vec!["<root>", "nav", "main", "deep", "inner"]);
    }
}
