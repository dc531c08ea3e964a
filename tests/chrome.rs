//! End-to-end captures through headless Chrome

#![cfg(feature = "cdp")]

use rfbake::{CaptureHints, CaptureRequest, DirectoryAllocator, RenderSession, SessionOptions, Strategy, StrategyContext};
use std::io::Write;

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><style>body { margin: 0; background: #fafafa; } #card { position: absolute; left: 20px; top: 30px; width: 100px; height: 50px; background: rgb(30, 90, 200); color: white; }</style></head>
<body>
<div id="card" data-bake-id="card">Hello <b>world</b></div>
</body>
</html>"#;

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn strip_text_clone_has_the_node_size() {
    let mut doc = tempfile::Builder::new().suffix(".html").tempfile().unwrap();
    doc.write_all(PAGE.as_bytes()).unwrap();
    let out = tempfile::tempdir().unwrap();

    let session = RenderSession::chrome(SessionOptions::default());
    let allocator = DirectoryAllocator::new(out.path());
    let hints = CaptureHints {
        hide_children: Some(false),
        strip_text: Some(true),
        ..Default::default()
    };
    let ctx = StrategyContext::new(&session, &allocator).with_hints(hints);

    let variants = Strategy::Clone.run(&CaptureRequest::new("card", doc.path()), &ctx).await.unwrap();
    let img = image::open(variants[0].image_path.as_ref().unwrap()).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (100, 50));
    // Text was stripped, so every pixel carries the background fill.
    assert!(img.pixels().all(|p| p.0 == [30, 90, 200, 255]));

    session.close().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn repeated_captures_reuse_the_page() {
    let mut doc = tempfile::Builder::new().suffix(".html").tempfile().unwrap();
    doc.write_all(PAGE.as_bytes()).unwrap();
    let out = tempfile::tempdir().unwrap();

    let session = RenderSession::chrome(SessionOptions::default());
    let allocator = DirectoryAllocator::new(out.path());
    let ctx = StrategyContext::new(&session, &allocator);
    let request = CaptureRequest::new("card", doc.path());

    Strategy::InPlace.run(&request, &ctx).await.unwrap();
    Strategy::Smart.run(&request, &ctx).await.unwrap();

    let stats = session.stats().await;
    assert_eq!(stats.launches, 1);
    assert_eq!(stats.navigations, 1);
    session.close().await.unwrap();
}

const BADGE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><style>body { margin: 0; } #card { position: absolute; left: 10px; top: 10px; width: 160px; height: 40px; background: rgb(30, 90, 200); font: 16px sans-serif; } .badge { background: rgb(220, 20, 60); padding: 2px 6px; }</style></head>
<body>
<div id="card" data-bake-id="card">New <span class="badge">beta</span></div>
</body>
</html>"#;

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn strip_text_keeps_painted_inline_boxes() {
    let mut doc = tempfile::Builder::new().suffix(".html").tempfile().unwrap();
    doc.write_all(BADGE_PAGE.as_bytes()).unwrap();
    let out = tempfile::tempdir().unwrap();

    let session = RenderSession::chrome(SessionOptions::default());
    let allocator = DirectoryAllocator::new(out.path());
    let hints = CaptureHints {
        hide_children: Some(false),
        strip_text: Some(true),
        ..Default::default()
    };
    let ctx = StrategyContext::new(&session, &allocator).with_hints(hints);

    let variants = Strategy::Clone.run(&CaptureRequest::new("card", doc.path()), &ctx).await.unwrap();
    let img = image::open(variants[0].image_path.as_ref().unwrap()).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (160, 40));
    let badge_pixels = img.pixels().filter(|p| p.0 == [220, 20, 60, 255]).count();
    // The badge's text is gone but its padded background survives.
    assert!(badge_pixels > 100, "only {} badge pixels left", badge_pixels);

    session.close().await.unwrap();
}
