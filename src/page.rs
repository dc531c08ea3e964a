use crate::clip::Clip;
use crate::driver::{DriverLauncher, PageDriver};
use crate::mutation::MutationRequest;
use crate::{Error, Result, Viewport};
use log::warn;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

enum Command {
    Navigate(String, Duration, oneshot::Sender<Result<()>>),
    SetViewport(Viewport, oneshot::Sender<Result<()>>),
    Mutate(MutationRequest, oneshot::Sender<Result<serde_json::Value>>),
    Evaluate(String, oneshot::Sender<Result<serde_json::Value>>),
    Capture(Clip, Option<PathBuf>, oneshot::Sender<Result<Vec<u8>>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async handle to the live page, backed by a dedicated worker thread.
///
/// The worker thread owns the synchronous driver and executes commands sent
/// from async tasks one at a time, so callers get an async interface without
/// requiring the driver to be `Send`. Cloning the handle does not create a new
/// page; every clone talks to the same worker.
#[derive(Clone)]
pub struct PageHandle {
    cmd_tx: Sender<Command>,
}

impl PageHandle {
    /// Spawn the worker thread and launch the driver on it.
    pub async fn spawn(launch: DriverLauncher) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::Builder::new()
            .name("rfbake-page".into())
            .spawn(move || {
                // Initialize driver on the worker thread
                let mut driver: Box<dyn PageDriver> = match launch() {
                    Ok(d) => d,
                    Err(err) => {
                        let _ = init_tx.send(Err(err));
                        return;
                    }
                };
                let _ = init_tx.send(Ok(()));

                // Command loop
                while let Ok(cmd) = cmd_rx.recv() {
                    match cmd {
                        Command::Navigate(url, timeout, resp) => {
                            let _ = resp.send(driver.navigate(&url, timeout));
                        }
                        Command::SetViewport(viewport, resp) => {
                            let _ = resp.send(driver.set_viewport(&viewport));
                        }
                        Command::Mutate(request, resp) => {
                            let _ = resp.send(driver.mutate(&request));
                        }
                        Command::Evaluate(expression, resp) => {
                            let _ = resp.send(driver.evaluate(&expression));
                        }
                        Command::Capture(clip, path, resp) => {
                            let res = driver.capture(&clip).and_then(|data| {
                                // If a path is provided, the bytes land on disk before we reply
                                if let Some(path) = path {
                                    if let Some(parent) = path.parent() {
                                        std::fs::create_dir_all(parent)?;
                                    }
                                    std::fs::write(&path, &data)?;
                                }
                                Ok(data)
                            });
                            let _ = resp.send(res);
                        }
                        Command::Close(resp) => {
                            let _ = resp.send(driver.close());
                            break;
                        }
                    }
                }
            })
            .map_err(|e| Error::Initialization(format!("Failed to spawn page worker: {}", e)))?;

        // Wait for the worker to report initialization success or failure
        let init_res = init_rx
            .await
            .map_err(|e| Error::Initialization(format!("Page worker init canceled: {}", e)))?;
        init_res?;

        Ok(Self { cmd_tx })
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx.send(make(tx)).map_err(|_| Error::SessionClosed)?;
        rx.await.map_err(|_| Error::SessionClosed)?
    }

    /// Navigate and wait for the document to be parsed.
    pub async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        let url = url.to_string();
        self.request(|tx| Command::Navigate(url, timeout, tx)).await
    }

    pub async fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        self.request(|tx| Command::SetViewport(viewport, tx)).await
    }

    /// Send a render mutation and return its JSON reply.
    pub async fn mutate(&self, request: MutationRequest) -> Result<serde_json::Value> {
        self.request(|tx| Command::Mutate(request, tx)).await
    }

    /// Evaluate an expression in the page and return its JSON value.
    pub async fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        let expression = expression.to_string();
        self.request(|tx| Command::Evaluate(expression, tx)).await
    }

    /// Capture `clip` and return the PNG bytes.
    pub async fn capture(&self, clip: Clip) -> Result<Vec<u8>> {
        self.request(|tx| Command::Capture(clip, None, tx)).await
    }

    /// Capture `clip` and write it to `path`; returns once the file is written.
    pub async fn capture_to(&self, clip: Clip, path: PathBuf) -> Result<Vec<u8>> {
        self.request(|tx| Command::Capture(clip, Some(path), tx)).await
    }

    /// Close the page and engine and stop the worker.
    pub async fn close(&self) -> Result<()> {
        match self.request(Command::Close).await {
            Err(Error::SessionClosed) => {
                warn!("page worker already stopped");
                Ok(())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverEvent, RecordingDriver};

    #[tokio::test]
    async fn commands_reach_the_driver_in_order() {
        let recording = RecordingDriver::new();
        let page = PageHandle::spawn(recording.launcher()).await.unwrap();
        page.navigate("file:///a.html", Duration::from_secs(1)).await.unwrap();
        page.mutate(MutationRequest::Cleanup).await.unwrap();
        page.close().await.unwrap();

        assert_eq!(
            recording.events(),
            vec![
                DriverEvent::Launch,
                DriverEvent::Navigate("file:///a.html".into()),
                DriverEvent::Mutate(MutationRequest::Cleanup),
                DriverEvent::Close,
            ]
        );
    }

    #[tokio::test]
    async fn closed_worker_reports_session_closed() {
        let page = PageHandle::spawn(RecordingDriver::new().launcher()).await.unwrap();
        page.close().await.unwrap();
        let err = page.mutate(MutationRequest::Cleanup).await.unwrap_err();
        assert!(matches!(err, Error::SessionClosed));
        // Closing twice is harmless.
        page.close().await.unwrap();
    }

    #[tokio::test]
    async fn launch_failure_is_reported() {
        let failing = crate::driver::launcher(|| Err(Error::Initialization("no chrome".into())));
        let err = PageHandle::spawn(failing).await.err().unwrap();
        assert!(matches!(err, Error::Initialization(_)));
    }
}
