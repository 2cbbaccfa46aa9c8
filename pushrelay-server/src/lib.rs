//! # pushrelay server
//!
//! A small HTTP relay in front of the Pushover-style notification API.
//!
//! ## Purpose
//!
//! Services that send push notifications usually call the remote API
//! directly and lose the message whenever the API has a bad moment. Point
//! them at the relay instead: it forwards every notification and, when the
//! remote API fails transiently, accepts the message for a later retry as
//! long as the account still has message quota left.
//!
//! ## Quick Start
//!
//! ```bash
//! # Show all available options
//! pushrelay --help
//!
//! # Listen on all interfaces, refuse retries once a quota is spent
//! pushrelay --http-host 0.0.0.0 --http-port 8499 --decrement-policy strict
//!
//! # List all available environment variables
//! pushrelay --list-env-vars
//! ```
//!
//! ## How It Works
//!
//! Each request is relayed to the remote API and the outcome is classified:
//!
//! - **Success** (1xx, 2xx): the remote answer is returned as is and the
//!   account's quota reported in the `X-Limit-App-*` headers is remembered
//! - **Retryable** (500, 504, 598, 599 or no answer at all): one message is
//!   taken from the remembered quota and the client gets `202 Accepted`
//! - **Permanent** (anything else): the remote answer is returned as is
//!
//! ```text
//! client ──form──▶ ┌───────────┐ ──form──▶ remote API
//!                  │ Processor │
//! client ◀──────── └─────┬─────┘ ◀──status, X-Limit-App-*
//!                        │
//!                  ┌─────▼─────┐
//!                  │  Limits   │
//!                  │  Cache    │
//!                  └───────────┘
//! ```
//!
//! ### Client Example
//!
//! ```bash
//! curl -X POST http://localhost:8499/1/messages.json \
//!   --data-urlencode "token=azGDORePK8gMaC0QOYAMyEEuzJnyUi" \
//!   --data-urlencode "user=uQiRzpo4DXghDmr9QzzfQu27cmVRsG" \
//!   --data-urlencode "message=Backup finished"
//! ```
//!
//! TLS is expected to be terminated by a fronting proxy.

pub mod config;
pub mod metrics;
pub mod relay;
pub mod transport;
pub mod types;
pub mod upstream;
