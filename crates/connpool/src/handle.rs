//! Handle and factory contracts.
//!
//! The pool only talks to what it manages through these two traits: a
//! [`Factory`] dials new handles from a configured parameter, and every
//! [`Handle`] reports whether it can still be used and knows how to close
//! itself.

use std::future::Future;
use std::marker::PhantomData;

use futures::future::BoxFuture;

use crate::error::BoxError;

/// A reusable resource managed by a [`Pool`](crate::Pool), typically a
/// network connection.
pub trait Handle: Send + 'static {
    /// Release the underlying resource.
    ///
    /// Consumes the handle, so a handle can only ever be closed once.
    fn close(self) -> impl Future<Output = Result<(), BoxError>> + Send;

    /// `true` once the handle can no longer be used (e.g. the peer reset
    /// the connection).
    fn is_closed(&self) -> bool;

    /// `true` if protocol state allows the handle to serve another caller
    /// (e.g. no partial request in flight).
    fn is_reusable(&self) -> bool {
        true
    }

    /// Background task started right after the handle is created.
    ///
    /// The pool spawns the returned future detached and never joins or
    /// cancels it. The task belongs to the handle: it is expected to finish
    /// on its own once the handle closes, and its outcome is invisible to
    /// the pool.
    ///
    /// Monitors are started with `tokio::spawn`, so a handle that returns
    /// one must be checked out from within a Tokio runtime.
    fn monitor(&self) -> Option<BoxFuture<'static, ()>> {
        None
    }
}

/// Produces new handles for a pool.
pub trait Factory: Send + Sync + 'static {
    /// The handle type this factory dials.
    type Handle: Handle;

    /// Opaque parameter passed to every [`create`](Factory::create) call.
    type Param: Send + Sync + 'static;

    /// Dial a new handle.
    ///
    /// Retry and backoff policy, if any, belongs here; the pool never
    /// retries a failed dial.
    fn create(
        &self,
        param: &Self::Param,
    ) -> impl Future<Output = Result<Self::Handle, BoxError>> + Send;
}

/// [`Factory`] backed by a closure that receives a clone of the parameter.
pub struct FnFactory<H, P, F> {
    f: F,
    _marker: PhantomData<fn(P) -> H>,
}

impl<H, P, F> std::fmt::Debug for FnFactory<H, P, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnFactory")
            .field("handle", &std::any::type_name::<H>())
            .field("param", &std::any::type_name::<P>())
            .finish()
    }
}

/// Build a [`Factory`] from an async closure.
///
/// ```rust,ignore
/// let factory = factory_fn(|addr: String| async move {
///     TcpHandle::connect(&addr).await.map_err(Into::into)
/// });
/// ```
pub fn factory_fn<H, P, F, Fut>(f: F) -> FnFactory<H, P, F>
where
    H: Handle,
    P: Clone + Send + Sync + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<H, BoxError>> + Send,
{
    FnFactory {
        f,
        _marker: PhantomData,
    }
}

impl<H, P, F, Fut> Factory for FnFactory<H, P, F>
where
    H: Handle,
    P: Clone + Send + Sync + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<H, BoxError>> + Send,
{
    type Handle = H;
    type Param = P;

    fn create(&self, param: &P) -> impl Future<Output = Result<H, BoxError>> + Send {
        (self.f)(param.clone())
    }
}
