use super::{Limits, RelayError, redact};
use std::sync::{Mutex, MutexGuard};

#[cfg(feature = "ahash")]
use ahash::AHashMap as HashMap;
#[cfg(not(feature = "ahash"))]
use std::collections::HashMap;

#[cfg(test)]
mod tests;

// Configuration constants
const DEFAULT_CAPACITY: usize = 1000;
const CAPACITY_OVERHEAD_FACTOR: f64 = 1.3;
/// Upper bound on the slots allocated up front; the map grows past it on demand
pub const MAX_PREALLOCATED_ENTRIES: usize = 1 << 20;

/// What [`LimitsCache::decrement_limits`] does when an account has no
/// messages left
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecrementPolicy {
    /// Clamp `remaining` at zero and report success
    #[default]
    Lenient,
    /// Report [`RelayError::QuotaExhausted`] once `remaining` is zero
    Strict,
}

/// Last known message quota per account
///
/// Entries are keyed by the account token (case-sensitive) and created by
/// the first [`set_limits`](Self::set_limits). They never expire: the remote
/// API refreshes them on every successful delivery.
///
/// One mutex covers the whole map. Every operation is O(1) and holds the lock
/// only for the map access, so a request never waits on another request's
/// remote call.
///
/// # Example
///
/// ```
/// use pushrelay::{DecrementPolicy, Limits, LimitsCache};
///
/// let cache = LimitsCache::builder()
///     .capacity(10_000)
///     .policy(DecrementPolicy::Strict)
///     .build();
///
/// cache.set_limits("app-token", Limits::new(7500, 1, 1_700_000_000)).unwrap();
/// cache.decrement_limits("app-token").unwrap();
/// assert!(cache.decrement_limits("app-token").is_err());
/// ```
pub struct LimitsCache {
    entries: Mutex<HashMap<String, Limits>>,
    policy: DecrementPolicy,
}

/// Builder for configuring a LimitsCache
pub struct LimitsCacheBuilder {
    capacity: usize,
    policy: DecrementPolicy,
}

impl LimitsCache {
    /// Create an empty cache with the default capacity
    pub fn new(policy: DecrementPolicy) -> Self {
        Self::builder().policy(policy).build()
    }

    /// Create a builder for configuring the cache
    pub fn builder() -> LimitsCacheBuilder {
        LimitsCacheBuilder {
            capacity: DEFAULT_CAPACITY,
            policy: DecrementPolicy::default(),
        }
    }

    /// The policy applied when decrementing an exhausted account
    pub fn policy(&self) -> DecrementPolicy {
        self.policy
    }

    /// Store the limits reported by the remote API for an account
    ///
    /// Overwrites any previous value unconditionally.
    pub fn set_limits(&self, token: &str, limits: Limits) -> Result<(), RelayError> {
        let mut entries = self.lock()?;
        match entries.get_mut(token) {
            Some(entry) => *entry = limits,
            None => {
                entries.insert(token.to_string(), limits);
            }
        }
        Ok(())
    }

    /// Spend one message of the account's quota
    ///
    /// Accounts without an entry are not limited locally and always succeed.
    /// `remaining` never drops below zero.
    ///
    /// # Errors
    ///
    /// - [`RelayError::QuotaExhausted`]: `remaining` was already zero and the
    ///   policy is [`DecrementPolicy::Strict`]
    /// - [`RelayError::CachePoisoned`]: the lock was poisoned
    pub fn decrement_limits(&self, token: &str) -> Result<(), RelayError> {
        let mut entries = self.lock()?;
        let Some(limits) = entries.get_mut(token) else {
            return Ok(());
        };

        if !limits.is_exhausted() {
            limits.remaining -= 1;
            return Ok(());
        }

        tracing::warn!(
            account = %redact(token),
            policy = ?self.policy,
            "account quota exhausted"
        );
        match self.policy {
            DecrementPolicy::Lenient => Ok(()),
            DecrementPolicy::Strict => Err(RelayError::QuotaExhausted {
                token: token.to_string(),
            }),
        }
    }

    /// Snapshot of the account's limits, `None` if the account is unknown
    pub fn get_limits(&self, token: &str) -> Result<Option<Limits>, RelayError> {
        Ok(self.lock()?.get(token).copied())
    }

    /// Number of accounts with known limits
    pub fn len(&self) -> Result<usize, RelayError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, RelayError> {
        Ok(self.len()? == 0)
    }

    /// Poison the lock, as a thread panicking mid-update would
    #[cfg(any(test, feature = "test-util"))]
    #[doc(hidden)]
    pub fn poison(&self) {
        std::thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = self.entries.lock();
                    panic!("limits cache poisoned on purpose");
                })
                .join();
        });
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Limits>>, RelayError> {
        self.entries.lock().map_err(|_| {
            tracing::error!("limits cache lock poisoned");
            RelayError::CachePoisoned
        })
    }
}

impl Default for LimitsCache {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for LimitsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let accounts = self.entries.lock().map(|e| e.len()).ok();
        f.debug_struct("LimitsCache")
            .field("accounts", &accounts)
            .field("policy", &self.policy)
            .finish()
    }
}

impl LimitsCacheBuilder {
    /// Expected number of accounts
    ///
    /// The map allocates 30% more space to reduce rehashing, up to
    /// [`MAX_PREALLOCATED_ENTRIES`].
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Behaviour when decrementing an exhausted account
    pub fn policy(mut self, policy: DecrementPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> LimitsCache {
        tracing::debug!(
            capacity = self.capacity,
            policy = ?self.policy,
            "creating limits cache"
        );
        LimitsCache {
            entries: Mutex::new(HashMap::with_capacity(preallocated_entries(self.capacity))),
            policy: self.policy,
        }
    }
}

fn preallocated_entries(capacity: usize) -> usize {
    let capacity = capacity.min(MAX_PREALLOCATED_ENTRIES);
    (capacity as f64 * CAPACITY_OVERHEAD_FACTOR) as usize
}
