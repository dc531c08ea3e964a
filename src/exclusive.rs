//! FIFO-fair exclusive sections
//!
//! An `ExclusiveSection` is a named mutual-exclusion cell. Callers that find it
//! held are queued and resumed in arrival order when the holder releases it.
//! The section is not reentrant: awaiting `acquire` while already holding the
//! guard deadlocks the caller.

use log::trace;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, MutexGuard};

/// Guard returned by [`ExclusiveSection::acquire`]; dropping it releases the section.
pub type SectionGuard<'a, T> = MutexGuard<'a, T>;

/// Single-owner, FIFO-fair mutual exclusion around a value.
pub struct ExclusiveSection<T = ()> {
    name: &'static str,
    inner: Mutex<T>,
    waiting: AtomicUsize,
}

// Keeps the waiter count honest when an acquiring future is dropped mid-wait.
struct WaitTicket<'a>(&'a AtomicUsize);

impl Drop for WaitTicket<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ExclusiveSection<()> {
    /// Create a section that guards no data.
    pub fn unit(name: &'static str) -> Self {
        Self::new(name, ())
    }
}

impl<T> ExclusiveSection<T> {
    pub fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            inner: Mutex::new(value),
            waiting: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Acquire the section, waiting in FIFO order if it is held.
    pub async fn acquire(&self) -> SectionGuard<'_, T> {
        if let Ok(guard) = self.inner.try_lock() {
            trace!("section '{}' acquired uncontended", self.name);
            return guard;
        }

        self.waiting.fetch_add(1, Ordering::SeqCst);
        let _ticket = WaitTicket(&self.waiting);
        trace!("section '{}' busy, queued", self.name);
        let guard = self.inner.lock().await;
        trace!("section '{}' handed over", self.name);
        guard
    }

    /// Run `op` while holding the section. The section is released when `op`
    /// settles, whether it returned an error, panicked or was cancelled.
    pub async fn run_exclusive<F, Fut, R>(&self, op: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let _guard = self.acquire().await;
        op().await
    }

    /// Whether some caller currently holds the section.
    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }

    /// Number of callers queued behind the current holder.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn free_section_is_acquired_immediately() {
        let section = ExclusiveSection::unit("free");
        assert!(!section.is_held());
        let guard = section.acquire().await;
        assert!(section.is_held());
        drop(guard);
        assert!(!section.is_held());
    }

    #[tokio::test]
    async fn waiters_are_resumed_in_arrival_order() {
        let section = Arc::new(ExclusiveSection::new("fifo", Vec::<usize>::new()));
        let holder = section.acquire().await;

        let mut handles = Vec::new();
        for i in 0..5 {
            let s = section.clone();
            handles.push(tokio::spawn(async move {
                let mut order = s.acquire().await;
                order.push(i);
            }));
            // Let the task reach the queue before spawning the next one.
            while section.waiting() < i + 1 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }

        drop(holder);
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*section.acquire().await, vec![0, 1, 2, 3, 4]);
        assert_eq!(section.waiting(), 0);
    }

    #[tokio::test]
    async fn run_exclusive_releases_after_error() {
        let section = ExclusiveSection::unit("release");
        let res: std::result::Result<(), &str> = section.run_exclusive(|| async { Err("boom") }).await;
        assert!(res.is_err());
        assert!(!section.is_held());
    }

    #[tokio::test]
    async fn run_exclusive_serializes_overlapping_callers() {
        let section = Arc::new(ExclusiveSection::unit("serial"));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let (s, a, p) = (section.clone(), active.clone(), peak.clone());
            handles.push(tokio::spawn(async move {
                s.run_exclusive(|| async {
                    let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    a.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
