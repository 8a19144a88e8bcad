use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Frame '{0}' is detached or not yet attached")]
    FrameDetached(String),

    #[error("Element {0} is stale (removed from DOM)")]
    ElementStale(String),

    #[error("Window not found: {0}")]
    WindowNotFound(String),

    #[error("Timed out waiting for a new window")]
    WindowTimeout,

    #[error("Not ready")]
    NotReady,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Other: {0}")]
    Other(String),
}

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
}

/// Identifier of one top-level browsing context (tab or popup window).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(pub String);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document in a window's frame tree: the window's root document or an
/// embedded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNode {
    pub window: WindowId,
    pub frame_id: String,
    /// Frame name attribute; empty for the root document and unnamed frames.
    pub name: String,
    pub url: String,
    pub is_root: bool,
}

impl DocumentNode {
    /// Label used in logs: the frame name, or `<root>`/`<unnamed>`.
    pub fn label(&self) -> &str {
        if self.is_root {
            "<root>"
        } else if self.name.is_empty() {
            "<unnamed>"
        } else {
            &self.name
        }
    }
}

/// Frame tree of one window, children in document order.
#[derive(Debug, Clone)]
pub struct FrameTree {
    pub document: DocumentNode,
    pub children: Vec<FrameTree>,
}

/// Handle to an element found by [`Driver::query`]. Visibility and enablement
/// are sampled at query time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub id: String,
    pub document: DocumentNode,
    pub visible: bool,
    pub enabled: bool,
}

impl ElementHandle {
    pub fn is_actionable(&self) -> bool {
        self.visible && self.enabled
    }
}

/// A single query expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selector {
    /// Plain CSS selector.
    Css { css: String },
    /// Elements matching `css` whose visible text equals `text` (trimmed,
    /// case-sensitive) when `exact`, or contains it case-insensitively.
    Text {
        css: String,
        text: String,
        #[serde(default)]
        exact: bool,
    },
    /// Elements matching `css` that have a descendant matching `inner`.
    Has { css: String, inner: Box<Selector> },
}

impl Selector {
    pub fn css(css: impl Into<String>) -> Self {
        Selector::Css { css: css.into() }
    }

    pub fn text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Selector::Text {
            css: css.into(),
            text: text.into(),
            exact: false,
        }
    }

    pub fn exact_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Selector::Text {
            css: css.into(),
            text: text.into(),
            exact: true,
        }
    }

    pub fn has(css: impl Into<String>, inner: Selector) -> Self {
        Selector::Has {
            css: css.into(),
            inner: Box::new(inner),
        }
    }

    /// The CSS part that decides which elements are candidates.
    pub fn base_css(&self) -> &str {
        match self {
            Selector::Css { css } | Selector::Text { css, .. } | Selector::Has { css, .. } => css,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css { css } => write!(f, "{}", css),
            Selector::Text { css, text, exact } => {
                let op = if *exact { "text-is" } else { "has-text" };
                write!(f, "{}:{}('{}')", css, op, text)
            }
            Selector::Has { css, inner } => write!(f, "{}:has({})", css, inner),
        }
    }
}

/// `document.readyState` as reported by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// Opaque token registered before an action that opens a new window.
#[derive(Debug, Clone)]
pub struct WindowExpectation {
    pub known: Vec<WindowId>,
}

impl WindowExpectation {
    pub fn is_new(&self, window: &WindowId) -> bool {
        !self.known.contains(window)
    }
}

/// Capability interface to a remote-controlled browser. Everything the
/// workflow does to the portal goes through this trait.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Launch the browser (or connect to it).
    async fn launch(&mut self) -> Result<(), DriverError>;

    /// Close the browser and release every window it owns.
    async fn close(&mut self) -> Result<(), DriverError>;

    async fn is_ready(&self) -> bool;

    /// Navigate the active window.
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, DriverError>;

    /// Window subsequent operations default to.
    async fn current_window(&self) -> Result<WindowId, DriverError>;

    /// Make `window` the active window.
    async fn switch_to_window(&mut self, window: &WindowId) -> Result<(), DriverError>;

    /// Enumerate the frame tree of a window.
    async fn frame_tree(&mut self, window: &WindowId) -> Result<FrameTree, DriverError>;

    /// Query a document, optionally scoped to descendants of `scope`.
    /// Results are in document order.
    async fn query(
        &mut self,
        document: &DocumentNode,
        scope: Option<&ElementHandle>,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>, DriverError>;

    async fn read_value(&mut self, element: &ElementHandle) -> Result<String, DriverError>;

    /// Replace the element's value, firing input/change events.
    async fn write_value(&mut self, element: &ElementHandle, value: &str)
    -> Result<(), DriverError>;

    /// Full visible text of the element.
    async fn inner_text(&mut self, element: &ElementHandle) -> Result<String, DriverError>;

    async fn click(&mut self, element: &ElementHandle) -> Result<(), DriverError>;

    /// Snapshot open windows so a window opened afterwards can be recognised.
    /// Must be called before the action that opens it.
    async fn expect_window(&mut self) -> Result<WindowExpectation, DriverError>;

    /// Wait for a window not present when `expectation` was taken.
    async fn wait_for_window(
        &mut self,
        expectation: &WindowExpectation,
        timeout: Duration,
    ) -> Result<WindowId, DriverError>;

    async fn ready_state(&mut self, document: &DocumentNode) -> Result<ReadyState, DriverError>;

    /// Number of resources the document has fetched so far. Used to detect
    /// network quiescence.
    async fn resource_count(&mut self, document: &DocumentNode) -> Result<usize, DriverError>;

    /// Requests started by the document's window that have not finished or
    /// failed yet. Drivers that cannot observe the network report none.
    async fn pending_requests(&mut self, _document: &DocumentNode) -> Result<usize, DriverError> {
        Ok(0)
    }
}
