mod support;

use cadence_engine::driver::{ReadyState, Selector, WindowId};
use cadence_engine::error::AutomationError;
use cadence_engine::frames::FrameResolver;
use cadence_engine::strategy::{LogicalTarget, SelectorStrategy};
use cadence_engine::wait::Waiter;
use std::time::Duration;
use support::{FakeElement, FakePortal};

fn resolver(candidate_timeout_ms: u64) -> FrameResolver {
    FrameResolver::new(
        Waiter::new(Duration::from_millis(5), Duration::ZERO),
        Duration::from_millis(candidate_timeout_ms),
        Duration::ZERO,
    )
}

fn rows_probe() -> SelectorStrategy {
    SelectorStrategy::new(
        LogicalTarget::ReportRows,
        vec![Selector::css("#listcontent tbody tr")],
    )
    .unwrap()
}

fn window() -> WindowId {
    WindowId("suite".into())
}

#[tokio::test]
async fn finds_the_named_frame_holding_the_target() {
    let mut portal = FakePortal::new("suite");
    let root = FakePortal::root_frame("suite");
    portal
        .add_frame(&root, "nav", "navframe")
        .add_frame(&root, "main", "mainframe")
        .add("main", FakeElement::new("row", &["#listcontent tbody tr"]));

    let resolution = resolver(50)
        .resolve_frame(
            &mut portal,
            &window(),
            LogicalTarget::ReportRows,
            &rows_probe(),
            Duration::from_millis(100),
        )
        .await
        .unwrap();

    assert!(!resolution.is_fallback());
    assert_eq!(resolution.document.name, "mainframe");
}

#[tokio::test]
async fn root_document_is_checked_first() {
    let mut portal = FakePortal::new("suite");
    let root = FakePortal::root_frame("suite");
    portal
        .add(&root, FakeElement::new("top-row", &["#listcontent tbody tr"]))
        .add_frame(&root, "main", "mainframe")
        .add("main", FakeElement::new("row", &["#listcontent tbody tr"]));

    let resolution = resolver(50)
        .resolve_frame(
            &mut portal,
            &window(),
            LogicalTarget::ReportRows,
            &rows_probe(),
            Duration::from_millis(100),
        )
        .await
        .unwrap();

    assert!(resolution.document.is_root);
}

#[tokio::test]
async fn named_frames_inside_unnamed_ones_are_reached() {
    let mut portal = FakePortal::new("suite");
    let root = FakePortal::root_frame("suite");
    portal
        .add_frame(&root, "wrapper", "")
        .add_frame("wrapper", "inner", "innerframe")
        .add("wrapper", FakeElement::new("decoy", &["#listcontent tbody tr"]))
        .add("inner", FakeElement::new("row", &["#listcontent tbody tr"]));

    let resolution = resolver(50)
        .resolve_frame(
            &mut portal,
            &window(),
            LogicalTarget::ReportRows,
            &rows_probe(),
            Duration::from_millis(100),
        )
        .await
        .unwrap();

    assert_eq!(resolution.document.name, "innerframe");
}

#[tokio::test]
async fn a_frame_that_never_loads_is_skipped() {
    let mut portal = FakePortal::new("suite");
    let root = FakePortal::root_frame("suite");
    portal
        .add_frame(&root, "stuck", "stuckframe")
        .set_ready("stuck", ReadyState::Loading)
        .add_frame(&root, "main", "mainframe")
        .add("main", FakeElement::new("row", &["#listcontent tbody tr"]));

    let resolution = resolver(10)
        .resolve_frame(
            &mut portal,
            &window(),
            LogicalTarget::ReportRows,
            &rows_probe(),
            Duration::from_millis(200),
        )
        .await
        .unwrap();

    assert_eq!(resolution.document.name, "mainframe");
}

#[tokio::test]
async fn no_match_falls_back_to_root_with_a_note() {
    let mut portal = FakePortal::new("suite");
    let root = FakePortal::root_frame("suite");
    portal
        .add_frame(&root, "nav", "navframe")
        .add_frame(&root, "stuck", "stuckframe")
        .set_ready("stuck", ReadyState::Loading);

    let resolution = resolver(5)
        .resolve_frame(
            &mut portal,
            &window(),
            LogicalTarget::ReportRows,
            &rows_probe(),
            Duration::from_millis(30),
        )
        .await
        .unwrap();

    assert!(resolution.document.is_root);
    let note = resolution.exhausted.expect("fallback note");
    assert_eq!(note.probe, "report rows");
    assert_eq!(note.candidates, 3);
    assert!(note.failures.iter().any(|f| f.starts_with("stuckframe")));
}

#[tokio::test]
async fn unknown_window_is_an_error() {
    let mut portal = FakePortal::new("login");

    let err = resolver(5)
        .resolve_frame(
            &mut portal,
            &window(),
            LogicalTarget::ReportRows,
            &rows_probe(),
            Duration::from_millis(10),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AutomationError::Driver(_)));
}

#[tokio::test]
async fn unbounded_timeouts_do_not_overflow() {
    let mut portal = FakePortal::new("suite");
    let root = FakePortal::root_frame("suite");
    portal
        .add_frame(&root, "main", "mainframe")
        .add("main", FakeElement::new("row", &["#listcontent tbody tr"]));
    let resolver = FrameResolver::new(
        Waiter::new(Duration::from_millis(5), Duration::ZERO),
        Duration::MAX,
        Duration::ZERO,
    );

    let resolution = resolver
        .resolve_frame(
            &mut portal,
            &window(),
            LogicalTarget::ReportRows,
            &rows_probe(),
            Duration::MAX,
        )
        .await
        .unwrap();

    assert_eq!(resolution.document.name, "mainframe");
}
