//! Best-effort full-load wait
//!
//! The session only waits for the document to be parsed. Captures that need
//! images and fonts settled call [`wait_for_settle`] after a fresh navigation;
//! running out of time is logged and the capture proceeds.

use crate::page::PageHandle;
use crate::Result;
use log::{debug, warn};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Expression that is `true` once the page and its fonts have finished loading.
pub const SETTLED_SCRIPT: &str =
    "document.readyState === 'complete' && (!document.fonts || document.fonts.status === 'loaded')";

/// Wait until the page reports it has fully loaded, for at most `timeout`.
///
/// Returns `Ok(true)` when the page settled and `Ok(false)` when the wait was
/// abandoned. Only transport failures are errors.
pub async fn wait_for_settle(page: &PageHandle, timeout: Duration) -> Result<bool> {
    let poll = async {
        loop {
            if page.evaluate(SETTLED_SCRIPT).await? == serde_json::Value::Bool(true) {
                return Ok::<(), crate::Error>(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    };

    match tokio::time::timeout(timeout, poll).await {
        Ok(res) => {
            res?;
            debug!("page settled");
            Ok(true)
        }
        Err(_) => {
            warn!("page did not settle within {}ms; capturing anyway", timeout.as_millis());
            Ok(false)
        }
    }
}
