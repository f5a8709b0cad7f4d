//! Typed, validated configuration for the pool.

use std::time::Duration;

use crate::error::{Error, Result};

/// Bound on the acquisition retry loop (§4.1). Not user-configurable: it
/// bounds crash-induced retries, not a tuning knob.
pub(crate) const MAX_ATTEMPTS: u32 = 10;

/// Construction-time and live-reconfigurable pool knobs.
///
/// `Pool::new` and every `set_*` setter validate through [`PoolConfig::validate`]
/// (or the equivalent single-field check), rejecting bad values synchronously
/// rather than admitting an inconsistent pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Global cap on live Containers (`count`). Must be non-zero.
    pub max: usize,
    /// Per-Domain cap on Containers. `0` means unlimited.
    pub max_per_app: usize,
    /// Whether overflow blocks callers (`true`) instead of piling additional
    /// sessions onto an already-active Container (`false`).
    pub use_global_queue: bool,
    /// How long a Container may sit idle before the sweeper retires it.
    /// `Duration::ZERO` disables expiry.
    pub max_idle_time: Duration,
    /// Sweeper wake interval. Must be non-zero.
    pub clean_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max: 6,
            max_per_app: 0,
            use_global_queue: false,
            max_idle_time: Duration::from_secs(5 * 60),
            clean_interval: Duration::from_secs(60),
        }
    }
}

impl PoolConfig {
    /// Validate this configuration, returning a [`Error::ConfigurationError`]
    /// describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.max == 0 {
            return Err(Error::configuration("max must be greater than zero"));
        }
        if self.clean_interval.is_zero() {
            return Err(Error::configuration(
                "clean_interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Per-call options recognised by `get`.
///
/// `max_requests` is consulted only the first time a Domain is created for a
/// given application root; later callers' values are ignored until that
/// Domain is destroyed (see SPEC_FULL.md §9).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquireOptions {
    /// Number of successful releases after which a Container is retired.
    /// `0` means unbounded.
    pub max_requests: u64,
}

impl AcquireOptions {
    /// Convenience constructor for the common case of a bounded request cap.
    #[must_use]
    pub fn with_max_requests(max_requests: u64) -> Self {
        Self { max_requests }
    }
}
