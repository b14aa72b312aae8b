//! Test doubles for pool users.
//!
//! [`MockFactory`] dials [`MockHandle`]s whose state is shared through an
//! `Arc<MockState>`, so a test can keep observing (and poking) a handle after
//! it has been moved into the pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::error::BoxError;
use crate::handle::{Factory, Handle};

type MonitorFn = Box<dyn FnOnce() + Send>;

/// Shared, observable state of a [`MockHandle`].
pub struct MockState {
    id: u64,
    closed: AtomicBool,
    reusable: AtomicBool,
    close_calls: AtomicU32,
    close_delay: Mutex<Option<Duration>>,
    monitor: Mutex<Option<MonitorFn>>,
}

impl MockState {
    /// Identifier assigned at creation.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the handle reports closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Simulate the peer closing the connection.
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Control what [`Handle::is_reusable`] reports.
    pub fn set_reusable(&self, reusable: bool) {
        self.reusable.store(reusable, Ordering::SeqCst);
    }

    /// How many times [`Handle::close`] ran.
    pub fn close_calls(&self) -> u32 {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Sleep for `delay` inside [`Handle::close`] before closing.
    pub fn set_close_delay(&self, delay: Duration) {
        *self.close_delay.lock() = Some(delay);
    }

    /// Body of the monitor task the pool should spawn for this handle.
    pub fn set_monitor(&self, f: impl FnOnce() + Send + 'static) {
        *self.monitor.lock() = Some(Box::new(f));
    }
}

impl std::fmt::Debug for MockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockState")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("close_calls", &self.close_calls())
            .finish()
    }
}

/// In-memory handle.
#[derive(Debug)]
pub struct MockHandle {
    state: Arc<MockState>,
}

impl MockHandle {
    /// Open, reusable handle with the given identifier.
    pub fn new(id: u64) -> Self {
        Self {
            state: Arc::new(MockState {
                id,
                closed: AtomicBool::new(false),
                reusable: AtomicBool::new(true),
                close_calls: AtomicU32::new(0),
                close_delay: Mutex::new(None),
                monitor: Mutex::new(None),
            }),
        }
    }

    /// Identifier assigned at creation.
    pub fn id(&self) -> u64 {
        self.state.id
    }

    /// Shared state, usable after the handle is handed to the pool.
    pub fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }
}

impl Handle for MockHandle {
    async fn close(self) -> Result<(), BoxError> {
        let delay = *self.state.close_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state.close_calls.fetch_add(1, Ordering::SeqCst);
        self.state.mark_closed();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    fn is_reusable(&self) -> bool {
        self.state.reusable.load(Ordering::SeqCst)
    }

    fn monitor(&self) -> Option<BoxFuture<'static, ()>> {
        let f = self.state.monitor.lock().take()?;
        Some(Box::pin(async move { f() }))
    }
}

#[derive(Default)]
struct FactoryState {
    next_id: AtomicU64,
    created: AtomicU64,
    failures: AtomicU32,
    delay: Mutex<Option<Duration>>,
    handles: Mutex<Vec<Arc<MockState>>>,
}

/// Factory dialing [`MockHandle`]s with sequential ids starting at 0.
#[derive(Clone, Default)]
pub struct MockFactory {
    inner: Arc<FactoryState>,
}

impl MockFactory {
    /// Create a factory that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` dials fail.
    pub fn fail_next(&self, count: u32) {
        self.inner.failures.store(count, Ordering::SeqCst);
    }

    /// Sleep for `delay` inside every dial.
    pub fn set_delay(&self, delay: Duration) {
        *self.inner.delay.lock() = Some(delay);
    }

    /// Number of successful dials.
    pub fn created(&self) -> u64 {
        self.inner.created.load(Ordering::SeqCst)
    }

    /// State of every handle dialed so far, in dial order.
    pub fn handles(&self) -> Vec<Arc<MockState>> {
        self.inner.handles.lock().clone()
    }
}

impl std::fmt::Debug for MockFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockFactory")
            .field("created", &self.created())
            .finish()
    }
}

impl Factory for MockFactory {
    type Handle = MockHandle;
    type Param = ();

    async fn create(&self, _param: &()) -> Result<MockHandle, BoxError> {
        let delay = *self.inner.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .inner
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err("mock dial refused".into());
        }

        let handle = MockHandle::new(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        self.inner.handles.lock().push(handle.state());
        self.inner.created.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }
}
