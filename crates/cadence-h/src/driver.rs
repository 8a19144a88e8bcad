use crate::cdp::CdpClient;
use crate::network::NetworkTracker;
use crate::script::{
    CONTEXT_RETRY_DELAY, EvalError, MAX_CONTEXT_RETRIES, STALE_MARKER, Script, evaluate_in,
};
use async_trait::async_trait;
use cadence_engine::config::BrowserConfig;
use cadence_engine::driver::{
    DocumentNode, Driver, DriverError, ElementHandle, FrameTree, NavigationResult, ReadyState,
    Selector, WindowExpectation, WindowId,
};
use cadence_engine::wait::deadline_after;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
use chromiumoxide::cdp::browser_protocol::page::{
    BringToFrontParams, CreateIsolatedWorldParams, FrameTree as CdpFrameTree, GetFrameTreeParams,
};
use chromiumoxide::cdp::js_protocol::runtime::ExecutionContextId;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const WORLD_NAME: &str = "cadence";
const WINDOW_POLL: Duration = Duration::from_millis(100);

/// [`Driver`] over a local Chromium via the DevTools protocol.
pub struct ChromiumDriver {
    config: BrowserConfig,
    client: Option<CdpClient>,
    active: Option<WindowId>,
    /// Isolated world per frame id.
    contexts: HashMap<String, ExecutionContextId>,
    networks: HashMap<WindowId, Arc<NetworkTracker>>,
}

#[derive(Deserialize)]
struct TaggedElement {
    id: String,
    visible: bool,
    enabled: bool,
}

impl ChromiumDriver {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            client: None,
            active: None,
            contexts: HashMap::new(),
            networks: HashMap::new(),
        }
    }

    pub fn client(&self) -> Option<&CdpClient> {
        self.client.as_ref()
    }

    fn window_of(page: &Page) -> WindowId {
        WindowId(page.target_id().inner().clone())
    }

    async fn pages(&self) -> Result<Vec<Page>, DriverError> {
        let client = self.client.as_ref().ok_or(DriverError::NotReady)?;
        client
            .browser
            .pages()
            .await
            .map_err(|e| DriverError::Other(format!("Failed to list pages: {}", e)))
    }

    async fn page(&self, window: &WindowId) -> Result<Page, DriverError> {
        let client = self.client.as_ref().ok_or(DriverError::NotReady)?;
        if Self::window_of(&client.page) == *window {
            return Ok(client.page.clone());
        }
        self.pages()
            .await?
            .into_iter()
            .find(|page| Self::window_of(page) == *window)
            .ok_or_else(|| DriverError::WindowNotFound(window.to_string()))
    }

    async fn active_page(&self) -> Result<Page, DriverError> {
        let window = self.active.as_ref().ok_or(DriverError::NotReady)?;
        self.page(window).await
    }

    /// Request tracker for `window`, attached on first use.
    async fn network(&mut self, window: &WindowId) -> Result<Arc<NetworkTracker>, DriverError> {
        if let Some(tracker) = self.networks.get(window) {
            return Ok(Arc::clone(tracker));
        }
        let page = self.page(window).await?;
        let tracker = NetworkTracker::attach(&page)
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?;
        self.networks.insert(window.clone(), Arc::clone(&tracker));
        Ok(tracker)
    }

    async fn context(
        &mut self,
        page: &Page,
        frame_id: &str,
    ) -> Result<ExecutionContextId, DriverError> {
        if let Some(context) = self.contexts.get(frame_id) {
            return Ok(context.clone());
        }

        let params = CreateIsolatedWorldParams::builder()
            .frame_id(frame_id.to_string())
            .world_name(WORLD_NAME)
            .build()
            .map_err(DriverError::Script)?;
        let context = page
            .execute(params)
            .await
            .map_err(|e| {
                tracing::debug!(frame = frame_id, "Isolated world unavailable: {}", e);
                DriverError::FrameDetached(frame_id.to_string())
            })?
            .result
            .execution_context_id;

        self.contexts.insert(frame_id.to_string(), context.clone());
        Ok(context)
    }

    /// Run a script in `document`, recreating the isolated world when the
    /// frame navigated underneath it.
    async fn run(
        &mut self,
        document: &DocumentNode,
        script: Script,
        args: Value,
    ) -> Result<Value, DriverError> {
        let page = self.page(&document.window).await?;
        let expression = script.expression(&args);
        let mut last_error = None;

        for attempt in 0..MAX_CONTEXT_RETRIES {
            let context = self.context(&page, &document.frame_id).await?;
            match evaluate_in(&page, context, expression.clone()).await {
                Ok(value) => return Ok(value),
                Err(EvalError::Context(e)) => {
                    tracing::debug!(
                        "{:?} context lost (attempt {}/{}), retrying",
                        script,
                        attempt + 1,
                        MAX_CONTEXT_RETRIES
                    );
                    self.contexts.remove(&document.frame_id);
                    last_error = Some(e);
                    tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
                }
                Err(EvalError::Exception(message)) => {
                    return Err(match message.split_once(STALE_MARKER) {
                        Some((_, rest)) => DriverError::ElementStale(
                            rest.split_whitespace().next().unwrap_or_default().to_string(),
                        ),
                        None => DriverError::Script(message),
                    });
                }
                Err(EvalError::Timeout) => {
                    return Err(DriverError::Script(
                        "Evaluation timed out, possibly blocked by a dialog".into(),
                    ));
                }
                Err(EvalError::Other(e)) => return Err(DriverError::Script(e)),
            }
        }

        Err(DriverError::FrameDetached(last_error.unwrap_or_else(|| {
            format!("{} after {} retries", document.frame_id, MAX_CONTEXT_RETRIES)
        })))
    }

    async fn run_on(
        &mut self,
        element: &ElementHandle,
        script: Script,
        mut args: Value,
    ) -> Result<Value, DriverError> {
        args["id"] = json!(element.id);
        self.run(&element.document, script, args).await
    }
}

fn convert_tree(window: &WindowId, tree: CdpFrameTree, is_root: bool) -> FrameTree {
    let frame = tree.frame;
    FrameTree {
        document: DocumentNode {
            window: window.clone(),
            frame_id: frame.id.inner().clone(),
            name: if is_root {
                String::new()
            } else {
                frame.name.unwrap_or_default()
            },
            url: frame.url,
            is_root,
        },
        children: tree
            .child_frames
            .unwrap_or_default()
            .into_iter()
            .map(|child| convert_tree(window, child, false))
            .collect(),
    }
}

fn as_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Driver for ChromiumDriver {
    async fn launch(&mut self) -> Result<(), DriverError> {
        tracing::info!("Launching Chromium");
        let client = CdpClient::launch(&self.config)
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?;
        let window = Self::window_of(&client.page);
        self.active = Some(window.clone());
        self.client = Some(client);
        if let Err(e) = self.network(&window).await {
            tracing::warn!(%window, "Network tracking unavailable: {}", e);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.active = None;
        self.contexts.clear();
        self.networks.clear();
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| DriverError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, DriverError> {
        let page = self.active_page().await?;
        tracing::info!("Navigating to: {}", url);
        page.goto(url)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        self.contexts.clear();

        let title = page
            .get_title()
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        let url = page
            .url()
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?
            .unwrap_or_default();
        Ok(NavigationResult { url, title })
    }

    async fn current_window(&self) -> Result<WindowId, DriverError> {
        self.active.clone().ok_or(DriverError::NotReady)
    }

    async fn switch_to_window(&mut self, window: &WindowId) -> Result<(), DriverError> {
        let page = self.page(window).await?;
        if let Err(e) = page.execute(BringToFrontParams::default()).await {
            tracing::debug!(%window, "Could not bring window to front: {}", e);
        }
        if let Err(e) = crate::cdp::accept_dialogs(&page).await {
            tracing::warn!(%window, "{}", e);
        }
        if let Err(e) = self.network(window).await {
            tracing::warn!(%window, "Network tracking unavailable: {}", e);
        }
        self.active = Some(window.clone());
        Ok(())
    }

    async fn frame_tree(&mut self, window: &WindowId) -> Result<FrameTree, DriverError> {
        let page = self.page(window).await?;
        let tree = page
            .execute(GetFrameTreeParams::default())
            .await
            .map_err(|e| DriverError::Other(format!("Failed to read frame tree: {}", e)))?
            .result
            .frame_tree;
        Ok(convert_tree(window, tree, true))
    }

    async fn query(
        &mut self,
        document: &DocumentNode,
        scope: Option<&ElementHandle>,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let args = json!({
            "selector": selector,
            "scope": scope.map(|s| s.id.as_str()),
        });
        let value = self.run(document, Script::Query, args).await?;
        let tagged: Vec<TaggedElement> = serde_json::from_value(value)?;

        Ok(tagged
            .into_iter()
            .map(|t| ElementHandle {
                id: t.id,
                document: document.clone(),
                visible: t.visible,
                enabled: t.enabled,
            })
            .collect())
    }

    async fn read_value(&mut self, element: &ElementHandle) -> Result<String, DriverError> {
        let value = self.run_on(element, Script::ReadValue, json!({})).await?;
        Ok(as_string(value))
    }

    /// Types `value` into the focused, emptied field so the page sees real
    /// text input. Fields that cannot take focus get the value assigned.
    async fn write_value(&mut self, element: &ElementHandle, value: &str) -> Result<(), DriverError> {
        let focused = self.run_on(element, Script::ClearValue, json!({})).await?;
        if focused == Value::Bool(true) && !value.is_empty() {
            let page = self.page(&element.document.window).await?;
            if let Err(e) = page.execute(InsertTextParams::new(value)).await {
                tracing::debug!(element = %element.id, "Typing failed, assigning instead: {}", e);
            }
        }
        self.run_on(element, Script::CommitValue, json!({ "value": value }))
            .await?;
        Ok(())
    }

    async fn inner_text(&mut self, element: &ElementHandle) -> Result<String, DriverError> {
        let value = self.run_on(element, Script::InnerText, json!({})).await?;
        Ok(as_string(value))
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), DriverError> {
        self.run_on(element, Script::Click, json!({})).await?;
        Ok(())
    }

    async fn expect_window(&mut self) -> Result<WindowExpectation, DriverError> {
        let known = self.pages().await?.iter().map(Self::window_of).collect();
        Ok(WindowExpectation { known })
    }

    async fn wait_for_window(
        &mut self,
        expectation: &WindowExpectation,
        timeout: Duration,
    ) -> Result<WindowId, DriverError> {
        let deadline = deadline_after(timeout);
        loop {
            let opened = self
                .pages()
                .await?
                .iter()
                .map(Self::window_of)
                .find(|window| expectation.is_new(window));
            if let Some(window) = opened {
                return Ok(window);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(DriverError::WindowTimeout);
            }
            tokio::time::sleep(WINDOW_POLL.min(deadline - now)).await;
        }
    }

    async fn ready_state(&mut self, document: &DocumentNode) -> Result<ReadyState, DriverError> {
        let value = self.run(document, Script::ReadyState, json!({})).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn resource_count(&mut self, document: &DocumentNode) -> Result<usize, DriverError> {
        Ok(self.network(&document.window).await?.events())
    }

    async fn pending_requests(&mut self, document: &DocumentNode) -> Result<usize, DriverError> {
        Ok(self.network(&document.window).await?.in_flight())
    }
}
