//! The render session: one persistent page behind two exclusive sections
//!
//! The page section is held for the whole of a caller's page operation, so no
//! two operations ever touch the page at the same time. The session section
//! only guards bootstrap bookkeeping (launch, viewport, navigation cache) and is
//! released before the caller's operation runs.

use crate::driver::DriverLauncher;
use crate::exclusive::ExclusiveSection;
use crate::page::PageHandle;
use crate::{Error, Result, SessionOptions, Viewport};
use log::{debug, info};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// What the session did to get the page ready for an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContext {
    /// The page already showed this document; no navigation happened
    pub reused: bool,
    pub current_url: String,
    /// Absolute path of the document
    pub path: PathBuf,
}

/// Counters describing the work the session has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub launches: usize,
    pub navigations: usize,
    pub viewport_changes: usize,
}

#[derive(Default)]
struct SessionState {
    page: Option<PageHandle>,
    current_url: Option<String>,
    current_viewport: Option<Viewport>,
    stats: SessionStats,
}

/// Serialized access to a single rendering-engine page.
///
/// Construct one per pipeline and pass it by reference to every strategy.
pub struct RenderSession {
    options: SessionOptions,
    launcher: DriverLauncher,
    state: ExclusiveSection<SessionState>,
    page_section: ExclusiveSection,
}

impl RenderSession {
    pub fn new(options: SessionOptions, launcher: DriverLauncher) -> Self {
        Self {
            options,
            launcher,
            state: ExclusiveSection::new("session", SessionState::default()),
            page_section: ExclusiveSection::unit("page"),
        }
    }

    /// Session backed by headless Chrome.
    #[cfg(feature = "cdp")]
    pub fn chrome(options: SessionOptions) -> Self {
        let launcher = crate::driver::cdp::CdpDriver::launcher(&options);
        Self::new(options, launcher)
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Run `operation` against the live page showing `path`.
    ///
    /// The page is launched on first use, resized only when `viewport` (or the
    /// default viewport) differs from the current one, and navigated only when
    /// the document differs from the one already loaded.
    pub async fn execute<T, F, Fut>(&self, path: impl AsRef<Path>, viewport: Option<Viewport>, operation: F) -> Result<T>
    where
        F: FnOnce(PageHandle, PageContext) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidArgument("document path is empty".into()));
        }

        let _page_guard = self.page_section.acquire().await;
        let (page, ctx) = self.ensure_ready(path, viewport).await?;
        operation(page, ctx).await
    }

    async fn ensure_ready(&self, path: &Path, viewport: Option<Viewport>) -> Result<(PageHandle, PageContext)> {
        let absolute = resolve_document(path)?;
        let url = Url::from_file_path(&absolute)
            .map_err(|_| Error::InvalidArgument(format!("cannot build a file URL for {}", absolute.display())))?
            .to_string();

        let mut state = self.state.acquire().await;

        let page = if let Some(page) = state.page.clone() {
            page
        } else {
            let page = PageHandle::spawn(self.launcher.clone()).await?;
            state.page = Some(page.clone());
            state.current_url = None;
            state.current_viewport = None;
            state.stats.launches += 1;
            info!("render session launched");
            page
        };

        let target = viewport.unwrap_or(self.options.default_viewport);
        if state.current_viewport != Some(target) {
            page.set_viewport(target).await?;
            debug!("viewport set to {}x{}@{}", target.width, target.height, target.device_scale_factor);
            state.current_viewport = Some(target);
            state.stats.viewport_changes += 1;
        }

        let reused = state.current_url.as_deref() == Some(url.as_str());
        if !reused {
            // Forget the old document first so a failed navigation is retried next time.
            state.current_url = None;
            let timeout = Duration::from_millis(self.options.navigation_timeout_ms);
            page.navigate(&url, timeout).await?;
            debug!("navigated to {}", url);
            state.current_url = Some(url.clone());
            state.stats.navigations += 1;
        }

        Ok((
            page,
            PageContext {
                reused,
                current_url: url,
                path: absolute,
            },
        ))
    }

    pub async fn stats(&self) -> SessionStats {
        self.state.acquire().await.stats
    }

    /// Close the page then the engine and forget cached state. Idempotent.
    pub async fn close(&self) -> Result<()> {
        let _page_guard = self.page_section.acquire().await;
        let mut state = self.state.acquire().await;
        let page = state.page.take();
        state.current_url = None;
        state.current_viewport = None;
        if let Some(page) = page {
            page.close().await?;
            info!("render session closed");
        }
        Ok(())
    }
}

fn resolve_document(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(Error::FileMissing(path.to_path_buf()));
    }
    Ok(std::fs::canonicalize(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverEvent, RecordingDriver};

    fn document() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".html").tempfile().unwrap();
        std::io::Write::write_all(&mut file, b"<html><body></body></html>").unwrap();
        file
    }

    #[tokio::test]
    async fn second_execute_reuses_the_page() {
        let recording = RecordingDriver::new();
        let session = RenderSession::new(SessionOptions::default(), recording.launcher());
        let doc = document();

        let first = session.execute(doc.path(), None, |_, ctx| async move { Ok(ctx) }).await.unwrap();
        let second = session.execute(doc.path(), None, |_, ctx| async move { Ok(ctx) }).await.unwrap();

        assert!(!first.reused);
        assert!(second.reused);
        assert_eq!(first.current_url, second.current_url);
        assert_eq!(recording.count(|e| matches!(e, DriverEvent::Navigate(_))), 1);
        assert_eq!(session.stats().await, SessionStats { launches: 1, navigations: 1, viewport_changes: 1 });
    }

    #[tokio::test]
    async fn viewport_is_applied_once_per_change() {
        let recording = RecordingDriver::new();
        let session = RenderSession::new(SessionOptions::default(), recording.launcher());
        let doc = document();
        let small = Some(Viewport::new(320, 240));

        for vp in [small, small, None, None, small] {
            session.execute(doc.path(), vp, |_, _| async { Ok(()) }).await.unwrap();
        }
        assert_eq!(recording.count(|e| matches!(e, DriverEvent::SetViewport(_))), 3);
    }

    #[tokio::test]
    async fn missing_document_fails_before_launch() {
        let recording = RecordingDriver::new();
        let session = RenderSession::new(SessionOptions::default(), recording.launcher());
        let err = session
            .execute("/definitely/not/here.html", None, |_, _| async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileMissing(_)));
        assert!(recording.events().is_empty());
    }

    #[tokio::test]
    async fn empty_path_is_an_argument_error() {
        let session = RenderSession::new(SessionOptions::default(), RecordingDriver::new().launcher());
        let err = session.execute("", None, |_, _| async { Ok(()) }).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn failed_navigation_is_retried() {
        let recording = RecordingDriver::new().fail_navigation(true);
        let session = RenderSession::new(SessionOptions::default(), recording.launcher());
        let doc = document();

        assert!(session.execute(doc.path(), None, |_, _| async { Ok(()) }).await.is_err());
        let recording = recording.fail_navigation(false);
        let ctx = session.execute(doc.path(), None, |_, ctx| async move { Ok(ctx) }).await.unwrap();
        assert!(!ctx.reused);
        assert_eq!(recording.count(|e| matches!(e, DriverEvent::Navigate(_))), 2);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_relaunches_on_demand() {
        let recording = RecordingDriver::new();
        let session = RenderSession::new(SessionOptions::default(), recording.launcher());
        let doc = document();

        session.close().await.unwrap();
        session.execute(doc.path(), None, |_, _| async { Ok(()) }).await.unwrap();
        session.close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(recording.count(|e| matches!(e, DriverEvent::Close)), 1);

        let ctx = session.execute(doc.path(), None, |_, ctx| async move { Ok(ctx) }).await.unwrap();
        assert!(!ctx.reused);
        assert_eq!(session.stats().await.launches, 2);
    }
}
