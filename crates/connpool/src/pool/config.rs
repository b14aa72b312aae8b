//! Pool configuration types

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::handle::Factory;

/// Capacity limits for a pool.
///
/// This is the part of the configuration that can live in a config file;
/// the factory and its parameter are supplied in code through [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Limits {
    /// Maximum number of idle handles kept. `0` keeps none: every returned
    /// handle is closed.
    pub max_idle: usize,
    /// Maximum number of handles allocated at a time. `0` means unbounded.
    pub max_active: usize,
    /// When `true` and the pool is at `max_active`, checkout waits for a
    /// handle to be returned instead of failing.
    pub wait: bool,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_idle: 10,
            max_active: 0,
            wait: false,
        }
    }
}

impl Limits {
    /// Whether checkouts go through the admission semaphore.
    pub(crate) fn bounded_wait(&self) -> bool {
        self.wait && self.max_active > 0
    }
}

/// Full configuration for a [`Pool`](crate::Pool).
pub struct Config<F: Factory> {
    /// Dials new handles. A pool without one fails every dial with
    /// [`Error::FactoryNotConfigured`](crate::Error::FactoryNotConfigured).
    pub factory: Option<F>,
    /// Parameter handed to every [`Factory::create`] call.
    pub param: F::Param,
    /// Capacity limits.
    pub limits: Limits,
}

impl<F: Factory> Config<F> {
    /// Configuration with default [`Limits`].
    pub fn new(factory: F, param: F::Param) -> Self {
        Self {
            factory: Some(factory),
            param,
            limits: Limits::default(),
        }
    }

    /// Configuration without a factory; only useful for pools that are
    /// filled by [`Pool::put`](crate::Pool::put).
    pub fn without_factory(param: F::Param) -> Self {
        Self {
            factory: None,
            param,
            limits: Limits::default(),
        }
    }

    /// Replace all limits at once, e.g. with values read from a config file.
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the maximum number of idle handles.
    pub fn max_idle(mut self, max_idle: usize) -> Self {
        self.limits.max_idle = max_idle;
        self
    }

    /// Set the maximum number of active handles (`0` = unbounded).
    pub fn max_active(mut self, max_active: usize) -> Self {
        self.limits.max_active = max_active;
        self
    }

    /// Wait for a free slot instead of failing when exhausted.
    pub fn wait(mut self, wait: bool) -> Self {
        self.limits.wait = wait;
        self
    }
}

impl<F: Factory> std::fmt::Debug for Config<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("factory", &self.factory.is_some())
            .field("limits", &self.limits)
            .finish()
    }
}
