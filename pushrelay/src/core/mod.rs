//! Core components of the pushrelay decision pipeline
//!
//! This module contains the fundamental building blocks:
//! - [`notification`]: The message a client asked to relay
//! - [`limits`]: The account's message quota as reported by the remote API
//! - [`cache`]: Concurrency-safe store of the last known quota per account
//! - [`processor`]: Forwards a notification and classifies the outcome

pub mod cache;
pub mod limits;
pub mod notification;
pub mod processor;

pub use cache::{DecrementPolicy, LimitsCache};
pub use limits::Limits;
pub use notification::Notification;
pub use processor::{
    Disposition, HandlingBody, HandlingResult, Processor, SendError, SendOutcome, Sender,
};

use std::error::Error;
use std::fmt;

/// Errors produced by the relay core
///
/// # Variants
///
/// - [`InvalidNotification`](RelayError::InvalidNotification): A notification field failed validation
/// - [`QuotaExhausted`](RelayError::QuotaExhausted): The account has no messages left (strict policy only)
/// - [`CachePoisoned`](RelayError::CachePoisoned): The limits cache lock was poisoned by a panicking thread
///
/// # Example
///
/// ```
/// use pushrelay::{Notification, RelayError};
///
/// match Notification::new("", "user-key", "Hello") {
///     Err(RelayError::InvalidNotification(reason)) => println!("rejected: {reason}"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// A notification field failed validation
    InvalidNotification(&'static str),
    /// The account has no messages left in its quota
    QuotaExhausted { token: String },
    /// The limits cache can no longer be trusted
    CachePoisoned,
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::InvalidNotification(reason) => write!(f, "invalid notification: {reason}"),
            RelayError::QuotaExhausted { token } => {
                write!(f, "message quota exhausted for account {}", redact(token))
            }
            RelayError::CachePoisoned => write!(f, "limits cache lock poisoned"),
        }
    }
}

impl Error for RelayError {}

/// Shortens an account token for logs and error messages
///
/// Tokens are credentials; only the first four characters are kept.
pub(crate) fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("{prefix}…")
}
