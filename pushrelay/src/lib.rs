//! # pushrelay
//!
//! The decision pipeline of a push notification relay.
//!
//! ## Overview
//!
//! A relay accepts notification requests, forwards each one to a remote
//! notification API and decides what to tell the caller:
//! - **Delivered**: the remote API accepted the message (2xx)
//! - **Queued**: the remote API failed transiently, the relay accepts the
//!   message for a later retry (202) while spending one message of the
//!   account's locally tracked quota
//! - **Rejected**: the remote API refused the message, or the account has no
//!   quota left for a retry
//!
//! ## Quick Start
//!
//! ```
//! use pushrelay::{
//!     DecrementPolicy, Limits, LimitsCache, Notification, Processor, SendError, SendOutcome,
//!     Sender,
//! };
//! use std::sync::Arc;
//!
//! struct AlwaysOk;
//!
//! #[async_trait::async_trait]
//! impl Sender for AlwaysOk {
//!     async fn post(&self, _notification: &Notification) -> Result<SendOutcome, SendError> {
//!         Ok(SendOutcome {
//!             status: 200,
//!             limits: Some(Limits::new(7500, 7499, 1_700_000_000)),
//!             body: r#"{"status":1}"#.to_string(),
//!         })
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let cache = Arc::new(LimitsCache::new(DecrementPolicy::Lenient));
//! let processor = Processor::new(AlwaysOk, cache.clone());
//!
//! let notification = Notification::new("app-token", "user-key", "Hello").unwrap();
//! let result = processor.handle_message(&notification).await.unwrap();
//!
//! assert_eq!(result.response_code, 200);
//! assert_eq!(cache.get_limits("app-token").unwrap().unwrap().remaining, 7499);
//! # });
//! ```
//!
//! ## Outcome Classification
//!
//! | Remote outcome                          | Disposition | Caller sees          |
//! |-----------------------------------------|-------------|----------------------|
//! | `100..=299`                             | Success     | remote code + limits |
//! | `500`, `504`, `598`, `599`, no response | Retryable   | `202` or `403`       |
//! | anything else                           | Permanent   | remote code          |
//!
//! ## Thread Safety
//!
//! [`LimitsCache`] guards its map with a single mutex and is shared between
//! requests through an [`Arc`](std::sync::Arc). The lock is held only for
//! the map operation itself, never across the call to the remote API.
//!
//! ## Features
//!
//! - `ahash` (default): Use AHash for faster hashing
//! - `test-util`: Failure injection helpers for downstream tests

pub mod core;

pub use core::{
    DecrementPolicy, Disposition, HandlingBody, HandlingResult, Limits, LimitsCache,
    Notification, Processor, RelayError, SendError, SendOutcome, Sender,
};
