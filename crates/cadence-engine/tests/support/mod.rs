#![allow(dead_code)]

use async_trait::async_trait;
use cadence_engine::config::{Credentials, TimingConfig};
use cadence_engine::driver::{
    DocumentNode, Driver, DriverError, ElementHandle, FrameTree, NavigationResult, ReadyState,
    Selector, WindowExpectation, WindowId,
};
use cadence_engine::error::AutomationError;
use cadence_engine::frames::FrameResolution;
use cadence_engine::report::ReportRow;
use cadence_engine::strategy::{LogicalTarget, StrategyTable};
use cadence_engine::workflow::{RunPlan, ScheduleJob, StepObserver, WorkflowState};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const REPORT: &str = "1. STYL Variance Report (Custom/MagTech Monthly Financials)";

#[derive(Debug, Clone)]
pub enum ClickEffect {
    /// Make a window that was registered hidden appear.
    OpenWindow(&'static str),
    /// Attach elements that were not yet rendered.
    Show(Vec<&'static str>),
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub id: String,
    pub parent: Option<String>,
    /// CSS selectors this element answers to.
    pub matches: Vec<String>,
    pub text: String,
    pub value: String,
    pub visible: bool,
    pub enabled: bool,
    pub attached: bool,
    /// Renders by itself once this instant passes.
    pub appears_at: Option<Instant>,
    pub text_error: bool,
    pub value_error: bool,
    pub on_click: Vec<ClickEffect>,
}

impl FakeElement {
    pub fn new(id: &str, matches: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            parent: None,
            matches: matches.iter().map(|m| m.to_string()).collect(),
            text: String::new(),
            value: String::new(),
            visible: true,
            enabled: true,
            attached: true,
            appears_at: None,
            text_error: false,
            value_error: false,
            on_click: Vec::new(),
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn detached(mut self) -> Self {
        self.attached = false;
        self
    }

    pub fn appears_after(mut self, delay: Duration) -> Self {
        self.attached = false;
        self.appears_at = Some(Instant::now() + delay);
        self
    }

    pub fn is_attached(&self) -> bool {
        self.attached || self.appears_at.is_some_and(|at| Instant::now() >= at)
    }

    pub fn unreadable_text(mut self) -> Self {
        self.text_error = true;
        self
    }

    pub fn unreadable_value(mut self) -> Self {
        self.value_error = true;
        self
    }

    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click.push(effect);
        self
    }
}

struct FakeDocument {
    node: DocumentNode,
    ready: ReadyState,
    elements: Vec<FakeElement>,
    children: Vec<String>,
}

/// In-memory portal: windows, frame trees, and elements that answer to
/// literal CSS strings.
#[derive(Default)]
pub struct FakePortal {
    documents: HashMap<String, FakeDocument>,
    roots: HashMap<WindowId, String>,
    open: Vec<WindowId>,
    hidden: HashSet<WindowId>,
    active: Option<WindowId>,
    failing_selectors: HashSet<String>,
    pub fail_launch: bool,
    /// Reported as in-flight requests for every document.
    pub pending_requests: usize,
    pub launched: bool,
    pub closed: bool,
    pub navigations: Vec<String>,
    pub clicks: Vec<String>,
    pub writes: Vec<(String, String)>,
}

impl FakePortal {
    pub fn new(window: &str) -> Self {
        let mut portal = Self::default();
        portal.add_window(window, false);
        portal.active = Some(WindowId(window.to_string()));
        portal
    }

    pub fn root_frame(window: &str) -> String {
        format!("{}-root", window)
    }

    pub fn add_window(&mut self, window: &str, hidden: bool) -> &mut Self {
        let id = WindowId(window.to_string());
        let frame_id = Self::root_frame(window);
        self.documents.insert(
            frame_id.clone(),
            FakeDocument {
                node: DocumentNode {
                    window: id.clone(),
                    frame_id: frame_id.clone(),
                    name: String::new(),
                    url: format!("https://portal.test/{}", window),
                    is_root: true,
                },
                ready: ReadyState::Complete,
                elements: Vec::new(),
                children: Vec::new(),
            },
        );
        self.roots.insert(id.clone(), frame_id);
        if hidden {
            self.hidden.insert(id);
        } else {
            self.open.push(id);
        }
        self
    }

    /// Add a child frame under `parent_frame`; `name` may be empty.
    pub fn add_frame(&mut self, parent_frame: &str, frame_id: &str, name: &str) -> &mut Self {
        let Some(window) = self
            .documents
            .get(parent_frame)
            .map(|d| d.node.window.clone())
        else {
            panic!("unknown parent frame {}", parent_frame);
        };
        self.documents.insert(
            frame_id.to_string(),
            FakeDocument {
                node: DocumentNode {
                    window,
                    frame_id: frame_id.to_string(),
                    name: name.to_string(),
                    url: format!("https://portal.test/frames/{}", frame_id),
                    is_root: false,
                },
                ready: ReadyState::Complete,
                elements: Vec::new(),
                children: Vec::new(),
            },
        );
        if let Some(parent) = self.documents.get_mut(parent_frame) {
            parent.children.push(frame_id.to_string());
        }
        self
    }

    pub fn set_ready(&mut self, frame_id: &str, ready: ReadyState) -> &mut Self {
        if let Some(doc) = self.documents.get_mut(frame_id) {
            doc.ready = ready;
        }
        self
    }

    pub fn add(&mut self, frame_id: &str, element: FakeElement) -> &mut Self {
        match self.documents.get_mut(frame_id) {
            Some(doc) => doc.elements.push(element),
            None => panic!("unknown frame {}", frame_id),
        }
        self
    }

    /// Queries using this CSS (as the base of any selector) fail.
    pub fn fail_selector(&mut self, css: &str) -> &mut Self {
        self.failing_selectors.insert(css.to_string());
        self
    }

    pub fn document(&self, frame_id: &str) -> DocumentNode {
        self.documents[frame_id].node.clone()
    }

    pub fn update(&mut self, element_id: &str, change: impl FnOnce(&mut FakeElement)) -> &mut Self {
        match self.find_mut(element_id) {
            Some(el) => change(el),
            None => panic!("unknown element {}", element_id),
        }
        self
    }

    pub fn attach(&mut self, element_id: &str) {
        if let Some(el) = self.find_mut(element_id) {
            el.attached = true;
        }
    }

    pub async fn query_all(&mut self, document: &DocumentNode, selector: &Selector) -> Vec<ElementHandle> {
        Driver::query(self, document, None, selector).await.unwrap()
    }

    pub fn value_of(&self, element_id: &str) -> Option<String> {
        self.find(element_id).map(|(_, el)| el.value.clone())
    }

    fn find(&self, element_id: &str) -> Option<(&FakeDocument, &FakeElement)> {
        self.documents
            .values()
            .find_map(|doc| doc.elements.iter().find(|e| e.id == element_id).map(|e| (doc, e)))
    }

    fn find_mut(&mut self, element_id: &str) -> Option<&mut FakeElement> {
        self.documents
            .values_mut()
            .find_map(|doc| doc.elements.iter_mut().find(|e| e.id == element_id))
    }

    fn tree(&self, frame_id: &str) -> FrameTree {
        let doc = &self.documents[frame_id];
        FrameTree {
            document: doc.node.clone(),
            children: doc.children.iter().map(|c| self.tree(c)).collect(),
        }
    }

    fn handle(doc: &FakeDocument, el: &FakeElement) -> ElementHandle {
        ElementHandle {
            id: el.id.clone(),
            document: doc.node.clone(),
            visible: el.visible,
            enabled: el.enabled,
        }
    }

    fn is_descendant(doc: &FakeDocument, el: &FakeElement, ancestor: &str) -> bool {
        let mut current = el.parent.clone();
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = doc
                .elements
                .iter()
                .find(|e| e.id == id)
                .and_then(|e| e.parent.clone());
        }
        false
    }

    fn matches(doc: &FakeDocument, el: &FakeElement, selector: &Selector) -> bool {
        if !el.is_attached() || !el.matches.iter().any(|m| m == selector.base_css()) {
            return false;
        }
        match selector {
            Selector::Css { .. } => true,
            Selector::Text { text, exact, .. } => {
                if *exact {
                    el.text.trim() == text
                } else {
                    el.text.to_lowercase().contains(&text.to_lowercase())
                }
            }
            Selector::Has { inner, .. } => doc.elements.iter().any(|other| {
                Self::is_descendant(doc, other, &el.id) && Self::matches(doc, other, inner)
            }),
        }
    }

    fn element_for(&self, handle: &ElementHandle) -> Result<&FakeElement, DriverError> {
        self.find(&handle.id)
            .map(|(_, el)| el)
            .filter(|el| el.is_attached())
            .ok_or_else(|| DriverError::ElementStale(handle.id.clone()))
    }
}

#[async_trait]
impl Driver for FakePortal {
    async fn launch(&mut self) -> Result<(), DriverError> {
        if self.fail_launch {
            return Err(DriverError::Other("browser binary not found".into()));
        }
        self.launched = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.closed = true;
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.launched && !self.closed
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, DriverError> {
        self.navigations.push(url.to_string());
        Ok(NavigationResult {
            url: url.to_string(),
            title: "Sign In".to_string(),
        })
    }

    async fn current_window(&self) -> Result<WindowId, DriverError> {
        self.active.clone().ok_or(DriverError::NotReady)
    }

    async fn switch_to_window(&mut self, window: &WindowId) -> Result<(), DriverError> {
        if !self.open.contains(window) {
            return Err(DriverError::WindowNotFound(window.to_string()));
        }
        self.active = Some(window.clone());
        Ok(())
    }

    async fn frame_tree(&mut self, window: &WindowId) -> Result<FrameTree, DriverError> {
        if !self.open.contains(window) {
            return Err(DriverError::WindowNotFound(window.to_string()));
        }
        Ok(self.tree(&self.roots[window]))
    }

    async fn query(
        &mut self,
        document: &DocumentNode,
        scope: Option<&ElementHandle>,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        if self.failing_selectors.contains(selector.base_css()) {
            return Err(DriverError::Script(format!("invalid selector {}", selector)));
        }
        let doc = self
            .documents
            .get(&document.frame_id)
            .ok_or_else(|| DriverError::FrameDetached(document.frame_id.clone()))?;

        Ok(doc
            .elements
            .iter()
            .filter(|el| match scope {
                Some(scope) => Self::is_descendant(doc, el, &scope.id),
                None => true,
            })
            .filter(|el| Self::matches(doc, el, selector))
            .map(|el| Self::handle(doc, el))
            .collect())
    }

    async fn read_value(&mut self, element: &ElementHandle) -> Result<String, DriverError> {
        let el = self.element_for(element)?;
        if el.value_error {
            return Err(DriverError::Script("value unavailable".into()));
        }
        Ok(el.value.clone())
    }

    async fn write_value(&mut self, element: &ElementHandle, value: &str) -> Result<(), DriverError> {
        self.element_for(element)?;
        self.writes.push((element.id.clone(), value.to_string()));
        if let Some(el) = self.find_mut(&element.id) {
            el.value = value.to_string();
        }
        Ok(())
    }

    async fn inner_text(&mut self, element: &ElementHandle) -> Result<String, DriverError> {
        let el = self.element_for(element)?;
        if el.text_error {
            return Err(DriverError::ElementStale(el.id.clone()));
        }
        Ok(el.text.clone())
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), DriverError> {
        let effects = self.element_for(element)?.on_click.clone();
        self.clicks.push(element.id.clone());

        for effect in effects {
            match effect {
                ClickEffect::OpenWindow(window) => {
                    let id = WindowId(window.to_string());
                    if self.hidden.remove(&id) {
                        self.open.push(id);
                    }
                }
                ClickEffect::Show(ids) => {
                    for id in ids {
                        if let Some(el) = self.find_mut(id) {
                            el.attached = true;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn expect_window(&mut self) -> Result<WindowExpectation, DriverError> {
        Ok(WindowExpectation {
            known: self.open.clone(),
        })
    }

    async fn wait_for_window(
        &mut self,
        expectation: &WindowExpectation,
        _timeout: Duration,
    ) -> Result<WindowId, DriverError> {
        self.open
            .iter()
            .find(|w| expectation.is_new(w))
            .cloned()
            .ok_or(DriverError::WindowTimeout)
    }

    async fn ready_state(&mut self, document: &DocumentNode) -> Result<ReadyState, DriverError> {
        self.documents
            .get(&document.frame_id)
            .map(|d| d.ready)
            .ok_or_else(|| DriverError::FrameDetached(document.frame_id.clone()))
    }

    async fn resource_count(&mut self, _document: &DocumentNode) -> Result<usize, DriverError> {
        Ok(12)
    }

    async fn pending_requests(&mut self, _document: &DocumentNode) -> Result<usize, DriverError> {
        Ok(self.pending_requests)
    }
}

/// Login window, a suite window opened by the tile, and a reports frame
/// holding one row per entry in `reports`. The schedule form frame renders
/// when a schedule link is clicked.
pub fn standard_portal(reports: &[&str], interval: &str) -> FakePortal {
    let mut portal = FakePortal::new("login");
    let login = FakePortal::root_frame("login");
    portal
        .add(&login, FakeElement::new("username", &["input[name='username']"]))
        .add(
            &login,
            FakeElement::new("next", &["button", "button[type='submit']"]).text("Next"),
        )
        .add(&login, FakeElement::new("password", &["input[type='password']"]))
        .add(
            &login,
            FakeElement::new("login-btn", &["button", "button[type='submit']"]).text("Login"),
        )
        .add(
            &login,
            FakeElement::new("suite-tile", &["a"])
                .text("Financial Suite")
                .on_click(ClickEffect::OpenWindow("suite")),
        )
        .add(
            &login,
            FakeElement::new("suite-icon", &["raul-icon[title='Financial Suite']"])
                .parent("suite-tile"),
        );

    portal.add_window("suite", true);
    let suite = FakePortal::root_frame("suite");
    portal
        .add(
            &suite,
            FakeElement::new("favorites", &["#favorites-menu"])
                .on_click(ClickEffect::Show(vec!["fav-dropdown", "reports-link"])),
        )
        .add(
            &suite,
            FakeElement::new("fav-dropdown", &[".qx-siamenu-favorites.active"]).detached(),
        )
        .add(
            &suite,
            FakeElement::new(
                "reports-link",
                &[".qx-siamenu-favorites.active a.qx-nav-name"],
            )
            .text("Financial reports")
            .detached(),
        )
        .add_frame(&suite, "nav", "navframe")
        .add_frame(&suite, "main", "mainframe")
        .add_frame(&suite, "form", "formframe");

    add_report_rows(&mut portal, "main", reports);
    add_schedule_form(&mut portal, "form", interval);
    portal
}

pub fn add_report_rows(portal: &mut FakePortal, frame: &str, reports: &[&str]) {
    for (i, name) in reports.iter().enumerate() {
        let row_id = &format!("row-{}", i);
        portal
            .add(
                frame,
                FakeElement::new(row_id, &["#listcontent tbody tr"])
                    .text(&format!("{}  Monthly  Schedule", name)),
            )
            .add(
                frame,
                FakeElement::new(&format!("cell-{}", i), &["td font", "td"])
                    .text(name)
                    .parent(row_id),
            )
            .add(
                frame,
                FakeElement::new(
                    &format!("schedule-{}", i),
                    &["td a[href*='editor.phtml']", "td a"],
                )
                .text("Schedule")
                .parent(row_id)
                .on_click(ClickEffect::Show(vec!["start-date", "interval", "save"])),
            );
    }
}

pub fn add_schedule_form(portal: &mut FakePortal, frame: &str, interval: &str) {
    portal
        .add(
            frame,
            FakeElement::new("start-date", &["#_obj__STARTDATE"])
                .value("01/01/2020")
                .detached(),
        )
        .add(
            frame,
            FakeElement::new("interval", &["input[name*='INTERVAL']"])
                .value(interval)
                .detached(),
        )
        .add(
            frame,
            FakeElement::new("save", &["button"]).text("Save").detached(),
        );
}

pub fn plan(report_name: &str, start_date: &str, table: StrategyTable, timeout_ms: u64) -> RunPlan {
    RunPlan {
        job: ScheduleJob {
            url: "https://portal.test/login".to_string(),
            credentials: Credentials {
                username: "ops@example.com".to_string(),
                password: "correct horse".to_string(),
            },
            report_name: report_name.to_string(),
            start_date: start_date.to_string(),
        },
        table,
        timing: TimingConfig::immediate(timeout_ms),
    }
}

/// Observer that records events as strings.
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl StepObserver for RecordingObserver {
    fn step_started(&self, step: WorkflowState) {
        self.push(format!("start:{}", step));
    }

    fn step_succeeded(&self, step: WorkflowState, _elapsed: Duration) {
        self.push(format!("ok:{}", step));
    }

    fn step_failed(&self, step: WorkflowState, _elapsed: Duration, _error: &AutomationError) {
        self.push(format!("failed:{}", step));
    }

    fn frame_resolved(&self, _step: WorkflowState, target: LogicalTarget, resolution: &FrameResolution) {
        let kind = if resolution.is_fallback() { "fallback" } else { "frame" };
        self.push(format!("{}:{}:{}", kind, target, resolution.document.label()));
    }

    fn row_matched(&self, _report_name: &str, row: &ReportRow) {
        self.push(format!("row:{}:{}", row.index, row.tier));
    }

    fn field_updated(&self, target: LogicalTarget, previous: Option<&str>, value: &str) {
        self.push(format!("field:{}:{}->{}", target, previous.unwrap_or("-"), value));
    }
}
