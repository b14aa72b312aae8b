//! # connpool
//!
//! Bounded, concurrency-safe pool for expensive reusable handles such as
//! network connections.
//!
//! A [`Pool`] dials handles through a [`Factory`], hands them out with
//! [`Pool::get`], takes them back with [`Pool::put`] and keeps up to
//! `max_idle` of them for reuse. `max_active` caps how many handles exist at
//! once; with `wait` set, checkouts queue for a free slot instead of failing.
//! A [`Registry`] shares pools by name.

pub mod context;
pub mod error;
pub mod handle;
pub mod idle;
pub mod pool;
pub mod registry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use context::{Abort, Context};
pub use error::{BoxError, Error, Result};
pub use handle::{Factory, FnFactory, Handle, factory_fn};
pub use pool::{Config, Limits, Pool, PoolStats};
pub use registry::Registry;
