/// Message quota of an account as last reported by the remote API
///
/// The remote API is the source of truth. `remaining <= limit` is expected
/// but not enforced; the relay only remembers what it was told and spends
/// from `remaining` locally, never below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Limits {
    /// Total number of messages granted for the period
    pub limit: u64,
    /// Number of messages left in the period
    pub remaining: u64,
    /// When the quota resets (epoch seconds, opaque to the relay)
    pub reset_at: i64,
}

impl Limits {
    pub fn new(limit: u64, remaining: u64, reset_at: i64) -> Self {
        Limits {
            limit,
            remaining,
            reset_at,
        }
    }

    /// Whether no messages are left
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}
