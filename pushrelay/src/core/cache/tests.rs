use super::{DecrementPolicy, LimitsCache, MAX_PREALLOCATED_ENTRIES, preallocated_entries};
use crate::core::{Limits, RelayError};
use std::sync::Arc;
use std::thread;

fn limits(limit: u64, remaining: u64, reset_at: i64) -> Limits {
    Limits::new(limit, remaining, reset_at)
}

#[test]
fn test_uncached_account_is_unknown() {
    let cache = LimitsCache::default();

    assert_eq!(cache.get_limits("uncachedaccount").unwrap(), None);
    assert!(cache.is_empty().unwrap());
}

#[test]
fn test_set_then_get_returns_same_values() {
    let cache = LimitsCache::default();
    cache
        .set_limits("accountA", limits(1000, 500, 123456789))
        .unwrap();

    assert_eq!(
        cache.get_limits("accountA").unwrap(),
        Some(limits(1000, 500, 123456789))
    );
}

#[test]
fn test_set_overwrites_previous_value() {
    let cache = LimitsCache::default();
    cache.set_limits("accountA", limits(1000, 500, 1)).unwrap();
    cache.set_limits("accountA", limits(2000, 1999, 2)).unwrap();

    assert_eq!(cache.get_limits("accountA").unwrap(), Some(limits(2000, 1999, 2)));
    assert_eq!(cache.len().unwrap(), 1);
}

#[test]
fn test_keys_are_case_sensitive() {
    let cache = LimitsCache::default();
    cache.set_limits("accountA", limits(10, 5, 0)).unwrap();

    assert_eq!(cache.get_limits("accounta").unwrap(), None);
}

#[test]
fn test_decrement_cached_account() {
    let cache = LimitsCache::default();
    cache
        .set_limits("accountA", limits(1000, 500, 123456789))
        .unwrap();

    cache.decrement_limits("accountA").unwrap();

    assert_eq!(
        cache.get_limits("accountA").unwrap(),
        Some(limits(1000, 499, 123456789))
    );
}

#[test]
fn test_decrement_unknown_account_is_noop() {
    for policy in [DecrementPolicy::Lenient, DecrementPolicy::Strict] {
        let cache = LimitsCache::new(policy);

        assert!(cache.decrement_limits("unknown").is_ok());
        assert_eq!(cache.get_limits("unknown").unwrap(), None);
    }
}

#[test]
fn test_lenient_decrement_floors_at_zero() {
    let cache = LimitsCache::new(DecrementPolicy::Lenient);
    cache.set_limits("accountA", limits(3, 3, 0)).unwrap();

    for expected in [2, 1, 0] {
        cache.decrement_limits("accountA").unwrap();
        assert_eq!(cache.get_limits("accountA").unwrap().unwrap().remaining, expected);
    }

    // Further decrements succeed and leave the quota at zero
    for _ in 0..3 {
        assert!(cache.decrement_limits("accountA").is_ok());
    }
    assert_eq!(cache.get_limits("accountA").unwrap().unwrap().remaining, 0);
}

#[test]
fn test_strict_decrement_reports_exhaustion() {
    let cache = LimitsCache::new(DecrementPolicy::Strict);
    cache.set_limits("accountA", limits(2, 1, 0)).unwrap();

    assert!(cache.decrement_limits("accountA").is_ok());
    assert_eq!(cache.get_limits("accountA").unwrap().unwrap().remaining, 0);

    let err = cache.decrement_limits("accountA").unwrap_err();
    assert_eq!(
        err,
        RelayError::QuotaExhausted {
            token: "accountA".to_string()
        }
    );
    assert_eq!(cache.get_limits("accountA").unwrap().unwrap().remaining, 0);
}

#[test]
fn test_decrement_does_not_touch_other_accounts() {
    let cache = LimitsCache::default();
    cache.set_limits("accountA", limits(10, 10, 0)).unwrap();
    cache.set_limits("accountB", limits(10, 10, 0)).unwrap();

    cache.decrement_limits("accountA").unwrap();

    assert_eq!(cache.get_limits("accountA").unwrap().unwrap().remaining, 9);
    assert_eq!(cache.get_limits("accountB").unwrap().unwrap().remaining, 10);
}

#[test]
fn test_builder() {
    let cache = LimitsCache::builder()
        .capacity(50_000)
        .policy(DecrementPolicy::Strict)
        .build();

    assert_eq!(cache.policy(), DecrementPolicy::Strict);
    assert!(cache.is_empty().unwrap());
}

#[test]
fn test_builder_huge_capacity_is_capped() {
    let cache = LimitsCache::builder().capacity(usize::MAX).build();
    cache.set_limits("accountA", limits(10, 10, 0)).unwrap();

    assert_eq!(cache.len().unwrap(), 1);
    assert_eq!(
        preallocated_entries(usize::MAX),
        preallocated_entries(MAX_PREALLOCATED_ENTRIES)
    );
    assert_eq!(preallocated_entries(1000), 1300);
}

#[test]
fn test_concurrent_decrements_settle_at_zero() {
    const N: u64 = 64;

    for policy in [DecrementPolicy::Lenient, DecrementPolicy::Strict] {
        let cache = LimitsCache::new(policy);
        cache.set_limits("shared", limits(N, N, 0)).unwrap();

        thread::scope(|s| {
            for _ in 0..N {
                s.spawn(|| cache.decrement_limits("shared").unwrap());
            }
        });

        assert_eq!(cache.get_limits("shared").unwrap().unwrap().remaining, 0);
    }
}

#[test]
fn test_concurrent_over_decrement_never_goes_below_zero() {
    const N: u64 = 16;
    let cache = LimitsCache::new(DecrementPolicy::Strict);
    cache.set_limits("shared", limits(N, N, 0)).unwrap();

    let exhausted = thread::scope(|s| {
        let handles: Vec<_> = (0..N * 2)
            .map(|_| s.spawn(|| cache.decrement_limits("shared").is_err()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|failed| *failed)
            .count()
    });

    // Exactly N decrements found quota, the rest were refused
    assert_eq!(exhausted as u64, N);
    assert_eq!(cache.get_limits("shared").unwrap().unwrap().remaining, 0);
}

#[test]
fn test_poisoned_lock_is_reported() {
    let cache = Arc::new(LimitsCache::default());
    cache.set_limits("accountA", limits(10, 10, 0)).unwrap();

    let poisoner = cache.clone();
    let _ = thread::spawn(move || {
        let _guard = poisoner.entries.lock().unwrap();
        panic!("poison the cache");
    })
    .join();

    assert_eq!(
        cache.get_limits("accountA").unwrap_err(),
        RelayError::CachePoisoned
    );
    assert_eq!(
        cache.decrement_limits("accountA").unwrap_err(),
        RelayError::CachePoisoned
    );
}

#[test]
fn test_poison_helper_poisons_every_operation() {
    let cache = LimitsCache::default();
    cache.poison();

    assert_eq!(
        cache.set_limits("accountA", limits(10, 10, 0)).unwrap_err(),
        RelayError::CachePoisoned
    );
    assert_eq!(cache.len().unwrap_err(), RelayError::CachePoisoned);
}
