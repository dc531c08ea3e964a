//! Plan-and-bake pipeline

use rfbake::driver::{RecordingDriver, SceneNode};
use rfbake::mutation::MutationRequest;
use rfbake::pipeline::REPORT_FILE;
use rfbake::rules::trace::{PLAN_FILE, TRACE_FILE};
use rfbake::rules::{AnalyzedNode, AuditWriter, NodeStyle, NodeTree, Rect, RuleName, Technique};
use rfbake::{BakeReport, Baker, DirectoryAllocator, Error, RenderSession, RuleEngine, RuleToggles, SessionOptions, Viewport};
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

/// body > [badge (50% opacity), panel (painted) > [note (low alpha) > text]]
fn tree() -> NodeTree {
    let text = AnalyzedNode::new("text", "p", Rect::new(120.0, 120.0, 100.0, 20.0));
    let note = AnalyzedNode::new("note", "div", Rect::new(110.0, 110.0, 200.0, 80.0))
        .with_style(NodeStyle {
            background_alpha: 0.15,
            border_width: 1.0,
            border_alpha: 0.1,
            ..Default::default()
        })
        .with_children(vec![text]);
    let panel = AnalyzedNode::new("panel", "section", Rect::new(100.0, 100.0, 400.0, 300.0))
        .with_style(NodeStyle {
            background_alpha: 1.0,
            ..Default::default()
        })
        .with_children(vec![note]);
    let badge = AnalyzedNode::new("badge", "span", Rect::new(10.0, 10.0, 40.0, 20.0)).with_style(NodeStyle {
        opacity: 0.5,
        ..Default::default()
    });
    let body = AnalyzedNode::new("body", "body", Rect::new(0.0, 0.0, 1280.0, 720.0)).with_children(vec![badge, panel]);
    NodeTree {
        document: None,
        viewport: Viewport::default(),
        root: body,
    }
}

fn scene() -> RecordingDriver {
    RecordingDriver::new()
        .with_node("body", SceneNode::new(0.0, 0.0, 1280.0, 720.0))
        .with_node("badge", SceneNode::new(10.0, 10.0, 40.0, 20.0))
        .with_node("panel", SceneNode::new(100.0, 100.0, 400.0, 300.0))
        .with_node("note", SceneNode::new(110.0, 110.0, 200.0, 80.0))
        .with_node("text", SceneNode::new(120.0, 120.0, 100.0, 20.0))
}

#[test]
fn plan_picks_techniques_and_traces_rules() {
    let plan = RuleEngine::default().plan(&tree());
    let order: Vec<_> = plan.entries.iter().map(|e| e.node_id.as_str()).collect();
    assert_eq!(order, vec!["body", "badge", "panel", "note", "text"]);

    assert_eq!(plan.entry("note").unwrap().technique, Technique::InPlace);
    assert!(plan.entry("note").unwrap().adjustments.suppress_faint_border);
    assert_eq!(
        plan.fired("note"),
        vec![RuleName::LowAlphaContextCapture, RuleName::UnderlayFaintBorderSuppressed]
    );
    assert_eq!(plan.fired("badge"), vec![RuleName::OpacityDecoupled]);
    assert_eq!(plan.traces.len(), 3);
}

#[test]
fn disabling_every_rule_restores_plain_clones() {
    let plan = RuleEngine::new(RuleToggles::none()).plan(&tree());
    assert!(plan.entries.iter().all(|e| e.technique == Technique::Clone));
    assert!(plan.entries.iter().all(|e| !e.adjustments.full_opacity && !e.adjustments.suppress_faint_border));
    assert!(plan.traces.is_empty());
}

#[test]
fn audit_files_round_trip() {
    let out = tempfile::tempdir().unwrap();
    let plan = RuleEngine::default().plan(&tree());
    let files = AuditWriter::new(out.path()).write(&plan).unwrap();

    assert_eq!(files.plan, out.path().join(PLAN_FILE));
    let traces = AuditWriter::read_traces(&files.trace).unwrap();
    assert_eq!(traces, plan.traces);

    let reloaded: rfbake::rules::BakePlan = serde_json::from_slice(&std::fs::read(&files.plan).unwrap()).unwrap();
    assert_eq!(reloaded.entries, plan.entries);
}

#[tokio::test]
async fn bake_captures_every_entry() {
    let recording = scene();
    let session = session(&recording);
    let out = tempfile::tempdir().unwrap();
    let allocator = DirectoryAllocator::new(out.path());
    let doc = document();

    let baker = Baker::new(&session, &allocator, RuleEngine::default(), out.path());
    let report = baker.bake(doc.path(), &tree()).await.unwrap();

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.nodes.len(), 5);
    assert_eq!(report.variant_count(), 5);
    let note = report.nodes.iter().find(|n| n.node_id == "note").unwrap();
    assert_eq!(note.variants[0].id, "note-context");
    let badge = report.nodes.iter().find(|n| n.node_id == "badge").unwrap();
    assert_eq!(badge.metadata.opacity, Some(0.5));

    for file in [PLAN_FILE, TRACE_FILE, REPORT_FILE] {
        assert!(out.path().join(file).exists(), "{} missing", file);
    }
    let saved = BakeReport::load(&out.path().join(REPORT_FILE)).unwrap();
    assert_eq!(saved, report);

    let full_opacity = recording.mutations().into_iter().any(|m| match m {
        MutationRequest::IsolateClone(spec) => spec.node_id == "badge" && spec.full_opacity,
        _ => false,
    });
    assert!(full_opacity);
    assert_eq!(recording.artifacts(), 0);
}

#[tokio::test]
async fn low_alpha_panel_keeps_its_backdrop() {
    let recording = scene();
    let session = session(&recording);
    let out = tempfile::tempdir().unwrap();
    let allocator = DirectoryAllocator::new(out.path());
    let doc = document();

    let baker = Baker::new(&session, &allocator, RuleEngine::default(), out.path());
    baker.bake(doc.path(), &tree()).await.unwrap();

    let spec = recording
        .mutations()
        .into_iter()
        .find_map(|m| match m {
            MutationRequest::IsolateInPlace(spec) if spec.node_id == "note" => Some(spec),
            _ => None,
        })
        .unwrap();
    assert!(!spec.isolate, "in-place isolation would hide the painted panel behind the note");
    assert!(spec.hide_children);
    assert!(spec.suppress_faint_border);

    let script = rfbake::script::render(&MutationRequest::IsolateInPlace(spec));
    assert!(script.contains(r#""isolate":false"#));
}

#[tokio::test]
async fn node_failures_do_not_stop_the_bake() {
    let recording = scene().fail_captures_for("panel");
    let session = session(&recording);
    let out = tempfile::tempdir().unwrap();
    let allocator = DirectoryAllocator::new(out.path());
    let doc = document();

    let baker = Baker::new(&session, &allocator, RuleEngine::default(), out.path());
    let report = baker.bake(doc.path(), &tree()).await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].node_id, "panel");
    assert_eq!(report.nodes.len(), 4);
}

#[tokio::test]
async fn missing_document_aborts() {
    let recording = scene();
    let session = session(&recording);
    let out = tempfile::tempdir().unwrap();
    let allocator = DirectoryAllocator::new(out.path());

    let baker = Baker::new(&session, &allocator, RuleEngine::default(), out.path());
    let err = baker.bake(&out.path().join("gone.html"), &tree()).await.unwrap_err();
    assert!(matches!(err, Error::FileMissing(_)));
    assert!(!out.path().join(REPORT_FILE).exists());
}
