//! Bounded handle pool.
//!
//! `Pool<F>` dials handles through a [`Factory`], hands them out, takes them
//! back and keeps a bounded number of them idle for reuse. All bookkeeping
//! (active count, idle list, closed flag, wait stats) sits behind one mutex
//! that is only held for short, non-blocking sections: factory dials and
//! handle closes always run with the lock released.
//!
//! When `wait` is set and `max_active` is non-zero, checkouts are admitted
//! through a semaphore with `max_active` permits. A checkout holds its permit
//! until the handle comes back through [`Pool::put`] or [`Pool::discard`].

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::context::{Abort, Context};
use crate::error::{Error, Result};
use crate::handle::{Factory, Handle};
use crate::idle::IdleList;

pub use config::{Config, Limits};

/// Pool statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Handles dialed and not yet closed, idle or checked out.
    pub active: usize,
    /// Handles currently sitting in the idle list.
    pub idle: usize,
    /// Checkouts that had to wait for an admission slot.
    pub wait_count: u64,
    /// Total time spent waiting for admission slots.
    pub wait_duration: Duration,
    /// Handles successfully dialed by the factory.
    pub created: u64,
    /// Handles the pool discarded or closed.
    pub destroyed: u64,
}

/// Mutable pool state, guarded by `PoolInner::state`.
struct State<H> {
    closed: bool,
    active: usize,
    idle: IdleList<H>,
    wait_count: u64,
    wait_duration: Duration,
    created: u64,
    destroyed: u64,
}

impl<H> State<H> {
    fn new() -> Self {
        Self {
            closed: false,
            active: 0,
            idle: IdleList::new(),
            wait_count: 0,
            wait_duration: Duration::ZERO,
            created: 0,
            destroyed: 0,
        }
    }

    fn forget(&mut self, count: usize) {
        self.active = self.active.saturating_sub(count);
        self.destroyed += count as u64;
    }
}

/// Inner shared state for the pool.
struct PoolInner<F: Factory> {
    id: String,
    factory: Option<F>,
    param: F::Param,
    limits: Limits,
    state: Mutex<State<F::Handle>>,
    /// Present only when `wait && max_active > 0`.
    admission: Option<Semaphore>,
}

/// Generic handle pool.
///
/// Cheap to clone; clones share the same handles and limits.
pub struct Pool<F: Factory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: Factory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: Factory> std::fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.inner.id)
            .field("limits", &self.inner.limits)
            .field("closed", &self.is_closed())
            .field("stats", &self.stats())
            .finish()
    }
}

impl<F: Factory> Pool<F> {
    /// Create a new pool identified by `id`.
    ///
    /// Never fails; a missing factory is reported by the first dial.
    pub fn new(id: impl Into<String>, config: Config<F>) -> Self {
        let Config {
            factory,
            param,
            limits,
        } = config;
        let admission = limits
            .bounded_wait()
            .then(|| Semaphore::new(limits.max_active));

        Self {
            inner: Arc::new(PoolInner {
                id: id.into(),
                factory,
                param,
                limits,
                state: Mutex::new(State::new()),
                admission,
            }),
        }
    }

    /// The pool identifier, also its key in a [`Registry`](crate::Registry).
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The limits the pool was built with.
    pub fn limits(&self) -> Limits {
        self.inner.limits
    }

    /// Check out a handle, waiting as long as it takes for admission.
    pub async fn get(&self) -> Result<F::Handle> {
        self.get_with(&Context::background()).await
    }

    /// Check out a handle.
    ///
    /// The most recently returned idle handle is preferred. Idle handles
    /// that report closed or not reusable are discarded along the way; if
    /// none is usable a new handle is dialed.
    ///
    /// `ctx` bounds only the wait for an admission slot. A cancelled or
    /// expired context fails with [`Error::Cancelled`] or
    /// [`Error::DeadlineExceeded`] and leaves the slot count untouched. The
    /// factory call itself is not cancelled.
    pub async fn get_with(&self, ctx: &Context) -> Result<F::Handle> {
        let (mut checkout, waited) = self.admit(ctx).await?;
        self.prune_stale(waited);

        loop {
            let next = self.inner.state.lock().idle.pop_front();
            let Some(handle) = next else { break };
            if handle.is_reusable() && !handle.is_closed() {
                tracing::trace!(pool_id = %self.inner.id, "Reusing idle handle");
                checkout.complete();
                return Ok(handle);
            }
            self.drop_unusable(handle).await;
        }

        self.reserve(&mut checkout)?;
        let handle = self.dial().await?;
        checkout.complete();
        Ok(handle)
    }

    /// Return a checked-out handle.
    ///
    /// The handle goes to the front of the idle list. If that pushes the
    /// list past `max_idle`, the oldest idle handle is closed instead. On a
    /// closed pool the handle is closed right away.
    ///
    /// Each handle must be returned exactly once, either here or through
    /// [`discard`](Self::discard).
    pub async fn put(&self, handle: F::Handle) -> Result<()> {
        let evicted = {
            let mut state = self.inner.state.lock();
            let evicted = if state.closed {
                Some(handle)
            } else {
                state.idle.push_front(handle);
                if state.idle.len() > self.inner.limits.max_idle {
                    state.idle.pop_back()
                } else {
                    None
                }
            };
            if evicted.is_some() {
                state.forget(1);
            }
            self.release_slot(&state);
            evicted
        };

        if let Some(handle) = evicted {
            tracing::trace!(pool_id = %self.inner.id, "Evicting handle on return");
            self.close_handle(handle).await;
        }
        Ok(())
    }

    /// Close a checked-out handle instead of returning it.
    ///
    /// Use this when the caller knows the handle is broken. Frees the
    /// handle's admission slot like [`put`](Self::put) does.
    pub async fn discard(&self, handle: F::Handle) {
        {
            let mut state = self.inner.state.lock();
            state.forget(1);
            self.release_slot(&state);
        }
        if !handle.is_closed() {
            self.close_handle(handle).await;
        }
    }

    /// Close the pool.
    ///
    /// Idle handles are closed and every later checkout fails with
    /// [`Error::PoolClosed`], including checkouts already waiting for a
    /// slot. Checked-out handles are left alone; they are closed when they
    /// come back through [`put`](Self::put). Calling `close` again is a
    /// no-op.
    pub async fn close(&self) {
        let drained = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let drained = state.idle.drain();
            state.forget(drained.len());
            if let Some(semaphore) = &self.inner.admission {
                semaphore.close();
            }
            drained
        };

        tracing::debug!(
            pool_id = %self.inner.id,
            idle = drained.len(),
            "Closing pool"
        );
        for handle in drained {
            self.close_handle(handle).await;
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            active: state.active,
            idle: state.idle.len(),
            wait_count: state.wait_count,
            wait_duration: state.wait_duration,
            created: state.created,
            destroyed: state.destroyed,
        }
    }

    /// Admission slots currently free, or `None` for pools that do not wait.
    pub fn available_permits(&self) -> Option<usize> {
        self.inner
            .admission
            .as_ref()
            .map(Semaphore::available_permits)
    }

    /// Wait for an admission slot if this pool bounds waiting checkouts.
    ///
    /// Returns the checkout owning the slot, and how long the caller waited
    /// when no slot was free on entry.
    async fn admit(&self, ctx: &Context) -> Result<(Checkout<'_, F>, Option<Duration>)> {
        let Some(semaphore) = &self.inner.admission else {
            return Ok((Checkout::new(self, false), None));
        };

        // Approximate: another caller may free or take a slot before we
        // poll, but it is good enough for stats.
        let started = (semaphore.available_permits() == 0).then(Instant::now);

        let permit = tokio::select! {
            biased;
            abort = ctx.done() => return Err(self.aborted(abort)),
            permit = semaphore.acquire() => {
                permit.map_err(|_| Error::closed(&self.inner.id))?
            }
        };

        // The context may have fired while the permit was being granted.
        // Dropping the permit hands it back.
        if let Some(abort) = ctx.check() {
            drop(permit);
            return Err(self.aborted(abort));
        }

        // Held until the handle is returned through put/discard, or handed
        // back by the checkout if it never produces a handle.
        permit.forget();
        Ok((Checkout::new(self, true), started.map(|at| at.elapsed())))
    }

    /// Record wait stats and drop idle handles at the back that report
    /// closed.
    fn prune_stale(&self, waited: Option<Duration>) {
        let mut stale = Vec::new();
        let mut state = self.inner.state.lock();
        if let Some(waited) = waited {
            state.wait_count += 1;
            state.wait_duration += waited;
        }

        // Bounded by the entry count so concurrent churn cannot keep us here.
        for _ in 0..state.idle.len() {
            if !state.idle.back().is_some_and(|h| h.is_closed()) {
                break;
            }
            if let Some(handle) = state.idle.pop_back() {
                stale.push(handle);
            }
        }
        state.forget(stale.len());
        drop(state);

        if !stale.is_empty() {
            tracing::trace!(
                pool_id = %self.inner.id,
                pruned = stale.len(),
                "Pruned closed idle handles"
            );
        }
    }

    /// Account for an idle handle that failed the reuse checks.
    async fn drop_unusable(&self, handle: F::Handle) {
        self.inner.state.lock().forget(1);
        if !handle.is_closed() {
            self.close_handle(handle).await;
        }
    }

    /// Reserve room for a new handle, counting it as active before the dial.
    fn reserve(&self, checkout: &mut Checkout<'_, F>) -> Result<()> {
        let limits = &self.inner.limits;
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(Error::closed(&self.inner.id));
        }
        if !limits.wait && limits.max_active > 0 && state.active >= limits.max_active {
            tracing::debug!(
                pool_id = %self.inner.id,
                active = state.active,
                max_active = limits.max_active,
                "Pool exhausted"
            );
            return Err(Error::exhausted(
                &self.inner.id,
                state.active,
                limits.max_active,
            ));
        }
        state.active += 1;
        checkout.counted = true;
        Ok(())
    }

    /// Dial a new handle for a reservation made by [`reserve`](Self::reserve).
    ///
    /// A failed dial leaves the reservation to be undone by the checkout.
    async fn dial(&self) -> Result<F::Handle> {
        let inner = &self.inner;
        let dialed = match &inner.factory {
            Some(factory) => factory
                .create(&inner.param)
                .await
                .map_err(|source| Error::factory(&inner.id, source)),
            None => Err(Error::FactoryNotConfigured {
                pool_id: inner.id.clone(),
            }),
        };

        match dialed {
            Ok(handle) => {
                let active = {
                    let mut state = inner.state.lock();
                    state.created += 1;
                    state.active
                };
                if let Some(monitor) = handle.monitor() {
                    // Detached: the task ends with the handle, not the pool.
                    drop(tokio::spawn(monitor));
                }
                tracing::debug!(pool_id = %inner.id, active, "Dialed new handle");
                Ok(handle)
            }
            Err(error) => {
                tracing::debug!(pool_id = %inner.id, %error, "Dial failed");
                Err(error)
            }
        }
    }

    /// Hand an admission slot back, unless the pool is closed.
    fn release_slot(&self, state: &State<F::Handle>) {
        if state.closed {
            return;
        }
        if let Some(semaphore) = &self.inner.admission {
            semaphore.add_permits(1);
        }
    }

    fn aborted(&self, abort: Abort) -> Error {
        let pool_id = self.inner.id.clone();
        match abort {
            Abort::Cancelled => Error::Cancelled { pool_id },
            Abort::DeadlineExceeded => Error::DeadlineExceeded { pool_id },
        }
    }

    async fn close_handle(&self, handle: F::Handle) {
        if let Err(error) = handle.close().await {
            tracing::warn!(pool_id = %self.inner.id, %error, "Failed to close handle");
        }
    }
}

/// Bookkeeping owned by a checkout that has not produced a handle yet.
///
/// Dropping it, whether on an error or because the caller dropped the
/// `get` future mid-dial, undoes the `active` reservation and hands the
/// admission slot back.
struct Checkout<'a, F: Factory> {
    pool: &'a Pool<F>,
    permit: bool,
    counted: bool,
}

impl<'a, F: Factory> Checkout<'a, F> {
    fn new(pool: &'a Pool<F>, permit: bool) -> Self {
        Self {
            pool,
            permit,
            counted: false,
        }
    }

    /// The handle reached the caller; slot and count now travel with it.
    fn complete(mut self) {
        self.permit = false;
        self.counted = false;
    }
}

impl<F: Factory> Drop for Checkout<'_, F> {
    fn drop(&mut self) {
        if !self.permit && !self.counted {
            return;
        }
        let mut state = self.pool.inner.state.lock();
        if self.counted {
            state.active = state.active.saturating_sub(1);
        }
        if self.permit {
            self.pool.release_slot(&state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::factory_fn;
    use crate::testing::{MockFactory, MockHandle};

    fn pool(limits: Limits) -> (Pool<MockFactory>, MockFactory) {
        let factory = MockFactory::new();
        let pool = Pool::new("test", Config::new(factory.clone(), ()).limits(limits));
        (pool, factory)
    }

    #[tokio::test]
    async fn get_dials_then_reuses() {
        let (pool, factory) = pool(Limits::default());

        let h = pool.get().await.unwrap();
        let first = h.id();
        pool.put(h).await.unwrap();

        let h = pool.get().await.unwrap();
        assert_eq!(h.id(), first);
        assert_eq!(factory.created(), 1);
        assert_eq!(pool.stats().active, 1);
        assert_eq!(pool.stats().idle, 0);
    }

    #[tokio::test]
    async fn unbounded_pool_has_no_semaphore() {
        let (pool, _) = pool(Limits {
            max_active: 0,
            wait: true,
            ..Limits::default()
        });
        assert_eq!(pool.available_permits(), None);

        let mut held = Vec::new();
        for _ in 0..32 {
            held.push(pool.get().await.unwrap());
        }
        assert_eq!(pool.stats().active, 32);
    }

    #[tokio::test]
    async fn stale_idle_handles_are_pruned_from_the_back() {
        let (pool, _) = pool(Limits::default());
        let a = pool.get().await.unwrap();
        let b = pool.get().await.unwrap();
        let a_state = a.state();
        pool.put(a).await.unwrap();
        pool.put(b).await.unwrap();

        // `a` is the oldest idle handle; the peer drops it.
        a_state.mark_closed();

        let h = pool.get().await.unwrap();
        let stats = pool.stats();
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.destroyed, 1);
        assert!(!h.is_closed());
    }

    #[tokio::test]
    async fn unreusable_idle_handle_is_closed_and_replaced() {
        let (pool, factory) = pool(Limits::default());
        let h = pool.get().await.unwrap();
        let state = h.state();
        pool.put(h).await.unwrap();

        state.set_reusable(false);

        let fresh = pool.get().await.unwrap();
        assert_ne!(fresh.id(), state.id());
        assert!(state.is_closed(), "open but unreusable handle gets closed");
        assert_eq!(factory.created(), 2);
        assert_eq!(pool.stats().active, 1);
    }

    #[tokio::test]
    async fn missing_factory_is_reported() {
        let pool: Pool<MockFactory> = Pool::new(
            "no-factory",
            Config::without_factory(()).max_active(1).wait(true),
        );
        let err = pool.get().await.unwrap_err();
        assert!(matches!(err, Error::FactoryNotConfigured { .. }));
        assert_eq!(pool.stats().active, 0);
        assert_eq!(pool.available_permits(), Some(1), "slot released");
    }

    #[tokio::test]
    async fn monitor_is_spawned_after_dial() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let factory = factory_fn(move |()| {
            let tx = Arc::clone(&tx);
            async move {
                let handle = MockHandle::new(0);
                let tx = tx.lock().take();
                handle.state().set_monitor(move || {
                    if let Some(tx) = tx {
                        let _ = tx.send(());
                    }
                });
                Ok::<_, crate::BoxError>(handle)
            }
        });
        let pool = Pool::new("monitored", Config::new(factory, ()));
        let _h = pool.get().await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .expect("monitor should run")
            .unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (pool, _) = pool(Limits::default());
        let h = pool.get().await.unwrap();
        pool.put(h).await.unwrap();

        pool.close().await;
        pool.close().await;
        assert!(pool.is_closed());
        assert_eq!(pool.stats().active, 0);
        assert_eq!(pool.stats().destroyed, 1);
    }

    #[tokio::test]
    async fn discard_frees_the_slot() {
        let (pool, _) = pool(Limits {
            max_active: 1,
            wait: true,
            ..Limits::default()
        });
        let h = pool.get().await.unwrap();
        assert_eq!(pool.available_permits(), Some(0));
        let state = h.state();

        pool.discard(h).await;
        assert!(state.is_closed());
        assert_eq!(pool.available_permits(), Some(1));
        assert_eq!(pool.stats().active, 0);
    }
}
