//! Smart capture: settle-all fan-out over every strategy

use rfbake::driver::{DriverEvent, RecordingDriver, SceneNode};
use rfbake::mutation::MutationRequest;
use rfbake::{CaptureRequest, DirectoryAllocator, Error, RenderSession, SessionOptions, Strategy, StrategyContext};
use std::io::Write;

fn document() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".html").tempfile().unwrap();
    file.write_all(b"<html><body></body></html>").unwrap();
    file
}

fn session(recording: &RecordingDriver) -> RenderSession {
    let options = SessionOptions {
        settle_timeout_ms: 20,
        ..Default::default()
    };
    RenderSession::new(options, recording.launcher())
}

#[tokio::test]
async fn smart_returns_every_variant() {
    let recording = RecordingDriver::new().with_node("card", SceneNode::new(10.0, 10.0, 30.0, 30.0));
    let session = session(&recording);
    let out = tempfile::tempdir().unwrap();
    let allocator = DirectoryAllocator::new(out.path());
    let doc = document();

    let ctx = StrategyContext::new(&session, &allocator);
    let variants = Strategy::Smart.run(&CaptureRequest::new("card", doc.path()), &ctx).await.unwrap();

    let mut ids: Vec<_> = variants.iter().map(|v| v.id.clone()).collect();
    ids.sort();
    assert_eq!(
        ids,
        vec!["card-auto", "card-context", "card-gamma", "card-original", "card-padded", "card-vivid"]
    );
    assert!(variants.iter().all(|v| v.image_path.as_ref().is_some_and(|p| p.exists())));
    assert_eq!(recording.artifacts(), 0);
    assert_eq!(recording.count(|e| matches!(e, DriverEvent::Navigate(_))), 1);
    assert_eq!(recording.count(|e| matches!(e, DriverEvent::Launch)), 1);
}

#[tokio::test]
async fn one_surviving_strategy_is_enough() {
    // Clone, padding-expand and color correction all fail; in-place survives.
    let recording = RecordingDriver::new()
        .with_node("card", SceneNode::new(0.0, 0.0, 30.0, 30.0))
        .fail_mutation("isolate-clone")
        .fail_mutation("set-filter");
    let session = session(&recording);
    let out = tempfile::tempdir().unwrap();
    let allocator = DirectoryAllocator::new(out.path());
    let doc = document();

    let ctx = StrategyContext::new(&session, &allocator);
    let variants = Strategy::Smart.run(&CaptureRequest::new("card", doc.path()), &ctx).await.unwrap();

    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].id, "card-context");
    assert_eq!(recording.artifacts(), 0);
}

#[tokio::test]
async fn all_failures_are_aggregated() {
    let recording = RecordingDriver::new();
    let session = session(&recording);
    let out = tempfile::tempdir().unwrap();
    let allocator = DirectoryAllocator::new(out.path());
    let doc = document();

    let ctx = StrategyContext::new(&session, &allocator);
    let err = Strategy::Smart.run(&CaptureRequest::new("ghost", doc.path()), &ctx).await.unwrap_err();

    match err {
        Error::AggregateStrategyFailure(messages) => {
            assert_eq!(messages.len(), 4);
            for name in ["clone", "padding-expand", "in-place", "color-correction"] {
                assert!(messages.iter().any(|m| m.starts_with(name)), "missing {} in {:?}", name, messages);
            }
        }
        other => panic!("expected an aggregate failure, got {:?}", other),
    }
}

#[tokio::test]
async fn components_run_one_capture_at_a_time() {
    let recording = RecordingDriver::new().with_node("card", SceneNode::new(0.0, 0.0, 30.0, 30.0));
    let session = session(&recording);
    let out = tempfile::tempdir().unwrap();
    let allocator = DirectoryAllocator::new(out.path());
    let doc = document();

    let ctx = StrategyContext::new(&session, &allocator);
    Strategy::Smart.run(&CaptureRequest::new("card", doc.path()), &ctx).await.unwrap();

    let mut depth = 0;
    for m in recording.mutations() {
        match m {
            MutationRequest::IsolateClone(_) | MutationRequest::IsolateInPlace(_) => {
                depth += 1;
                assert_eq!(depth, 1, "two isolations were live at once");
            }
            MutationRequest::Cleanup => depth = 0,
            MutationRequest::SetFilter { .. } => assert_eq!(depth, 1),
        }
    }
}
