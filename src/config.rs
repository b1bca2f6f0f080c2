//! Runtime configuration
//!
//! All knobs have working defaults. Constructors replace zero values with the
//! default and log a warning, so a misconfigured flag degrades instead of
//! disabling locking or batching outright.

use std::time::Duration;
use tracing::warn;

/// Lock acquisition and lease settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockConfig {
    /// How long `acquire` keeps retrying before `LockTimeout`
    pub acquire_timeout: Duration,
    /// Lease written with the lock; the store drops the lock after this
    pub hold_timeout: Duration,
    /// Pause between acquisition attempts
    pub retry_interval: Duration,
    /// Upper bound on a single lock-store call
    pub store_call_timeout: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(1),
            hold_timeout: Duration::from_secs(15),
            retry_interval: Duration::from_millis(50),
            store_call_timeout: Duration::from_millis(500),
        }
    }
}

impl LockConfig {
    /// Create a new LockConfig, falling back to defaults for zero durations
    pub fn new(
        acquire_timeout: Duration,
        hold_timeout: Duration,
        retry_interval: Duration,
        store_call_timeout: Duration,
    ) -> Self {
        let default = Self::default();
        Self {
            acquire_timeout: non_zero("acquire_timeout", acquire_timeout, default.acquire_timeout),
            hold_timeout: non_zero("hold_timeout", hold_timeout, default.hold_timeout),
            retry_interval: non_zero("retry_interval", retry_interval, default.retry_interval),
            store_call_timeout: non_zero(
                "store_call_timeout",
                store_call_timeout,
                default.store_call_timeout,
            ),
        }
    }

    /// Cap a pause taken inside the lock so it ends well before the lease
    ///
    /// A pause of half the hold timeout or more is cut to half of it, so the
    /// lock cannot expire while its holder is still sleeping.
    pub fn bound_use_delay(&self, use_delay: Duration) -> Duration {
        let limit = self.hold_timeout / 2;
        if use_delay >= limit {
            warn!(
                use_delay_ms = use_delay.as_millis() as u64,
                hold_timeout_ms = self.hold_timeout.as_millis() as u64,
                limit_ms = limit.as_millis() as u64,
                "use_delay too close to the lock lease, clamping"
            );
            limit
        } else {
            use_delay
        }
    }

    /// Upper bound on acquisition attempts for a given wait budget
    pub fn max_attempts(&self, acquire_timeout: Duration) -> u32 {
        let interval = self.retry_interval.as_millis().max(1);
        let attempts = acquire_timeout.as_millis() / interval + 1;
        u32::try_from(attempts).unwrap_or(u32::MAX)
    }
}

fn non_zero(name: &str, value: Duration, default: Duration) -> Duration {
    if value.is_zero() {
        warn!(
            setting = name,
            default_ms = default.as_millis() as u64,
            "Invalid zero duration, using default"
        );
        default
    } else {
        value
    }
}

/// How strictly a cancel is checked against its original transaction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CancelPolicy {
    /// Transaction exists, account exists, amount matches
    #[default]
    Lenient,
    /// Additionally: same account, original is a successful use, not cancelled before
    Strict,
}

/// Configuration for batch replay of operation files
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of operations read per batch
    pub batch_size: usize,
    /// Maximum number of accounts processed concurrently
    pub max_concurrent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig with custom values
    pub fn new(batch_size: usize, max_concurrent: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "Invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent = if max_concurrent == 0 {
            warn!(
                max_concurrent,
                default = default.max_concurrent,
                "Invalid max_concurrent, using default"
            );
            default.max_concurrent
        } else {
            max_concurrent
        };

        Self {
            batch_size,
            max_concurrent,
        }
    }
}

/// Top-level configuration for the engine and its driver
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub lock: LockConfig,
    /// Pause inside the locked region of every use, zero by default
    pub use_delay: Duration,
    pub cancel_policy: CancelPolicy,
    pub batch: BatchConfig,
}

impl EngineConfig {
    /// Create a new EngineConfig; `use_delay` is bounded by the lock lease
    pub fn new(
        lock: LockConfig,
        use_delay: Duration,
        cancel_policy: CancelPolicy,
        batch: BatchConfig,
    ) -> Self {
        let use_delay = lock.bound_use_delay(use_delay);
        Self {
            lock,
            use_delay,
            cancel_policy,
            batch,
        }
    }
}
