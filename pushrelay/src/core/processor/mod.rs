//! Forwarding a notification and deciding what the caller is told
//!
//! The [`Processor`] hands each [`Notification`] to a [`Sender`], sorts the
//! outcome into a [`Disposition`] and turns it into a [`HandlingResult`]:
//!
//! ```text
//!               Sender::post
//!                    │
//!        ┌───────────┼──────────────┐
//!        ▼           ▼              ▼
//!     Success    Retryable      Permanent
//!   set_limits   decrement      pass through
//!        │       ┌───┴────┐         │
//!        ▼       ▼        ▼         ▼
//!      2xx      202      403     4xx/other
//! ```

use super::{Limits, LimitsCache, Notification, RelayError, redact};
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::sync::Arc;


/// Status returned when a message is accepted for a later retry
pub const ACCEPTED: u16 = 202;
/// Status returned when a retry is refused because the quota is spent
pub const FORBIDDEN: u16 = 403;

/// Response of the remote notification API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    /// HTTP status code returned by the remote API
    pub status: u16,
    /// Quota reported with the response; only expected on 2xx
    pub limits: Option<Limits>,
    /// Raw response payload
    pub body: String,
}

/// The remote API could not be reached or did not answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// No response within the sender's deadline
    Timeout,
    /// Connection or protocol failure
    Transport(String),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Timeout => write!(f, "remote API timed out"),
            SendError::Transport(msg) => write!(f, "remote API unreachable: {msg}"),
        }
    }
}

impl Error for SendError {}

/// Delivers notifications to the remote API
///
/// Implementations own the transport, including its timeout. Any response
/// the remote API produced, whatever its status, is an `Ok`; `Err` means no
/// response was obtained.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn post(&self, notification: &Notification) -> Result<SendOutcome, SendError>;
}

#[async_trait]
impl<T: Sender + ?Sized> Sender for Arc<T> {
    async fn post(&self, notification: &Notification) -> Result<SendOutcome, SendError> {
        (**self).post(notification).await
    }
}

/// Classification of a forwarding attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// The remote API accepted the message
    Success,
    /// A transient failure; resending later is expected to succeed
    Retryable,
    /// The request itself is invalid or forbidden
    Permanent,
}

impl Disposition {
    /// Internal Server Error, Gateway Timeout, Network Read Timeout and
    /// Network Connect Timeout
    pub const RETRYABLE_STATUSES: [u16; 4] = [500, 504, 598, 599];

    /// Classify a status code returned by the remote API
    ///
    /// Total over all codes: `100..=299` succeed, the
    /// [`RETRYABLE_STATUSES`](Self::RETRYABLE_STATUSES) are retryable and
    /// everything else is permanent.
    pub fn from_status(status: u16) -> Self {
        match status {
            100..=299 => Disposition::Success,
            s if Self::RETRYABLE_STATUSES.contains(&s) => Disposition::Retryable,
            _ => Disposition::Permanent,
        }
    }

    /// Classify the result of [`Sender::post`]
    pub fn classify(outcome: &Result<SendOutcome, SendError>) -> Self {
        match outcome {
            Ok(outcome) => Self::from_status(outcome.status),
            Err(_) => Disposition::Retryable,
        }
    }
}

/// Payload of a [`HandlingResult`]
///
/// The core does not format bodies; the transport renders these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlingBody {
    /// Payload returned by the remote API, passed through unchanged
    Remote(String),
    /// The message was accepted for a later retry
    Queued,
    /// The retry was refused; carries the reason
    Rejected(String),
}

/// What the caller is told about one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlingResult {
    /// Status code with HTTP semantics
    pub response_code: u16,
    /// Account quota to report, if known
    pub limits: Option<Limits>,
    pub body: HandlingBody,
    /// How the forwarding attempt was classified
    pub disposition: Disposition,
    /// The remote API could not be reached at all
    pub transport_error: bool,
}

/// Drives notifications through a [`Sender`] and the shared [`LimitsCache`]
///
/// The processor holds no per-request state; one instance serves all
/// concurrent requests. The cache is only locked for individual operations,
/// never while the remote call is in flight.
pub struct Processor<S> {
    sender: S,
    cache: Arc<LimitsCache>,
}

impl<S: Sender> Processor<S> {
    pub fn new(sender: S, cache: Arc<LimitsCache>) -> Self {
        Processor { sender, cache }
    }

    /// The cache shared with other processors or observers
    pub fn cache(&self) -> &Arc<LimitsCache> {
        &self.cache
    }

    /// Forward one notification and decide the externally visible outcome
    ///
    /// Transport errors and remote failures are reported through the
    /// returned [`HandlingResult`], never as an error.
    ///
    /// # Errors
    ///
    /// Only [`RelayError::CachePoisoned`], when the cache can no longer be
    /// trusted.
    pub async fn handle_message(
        &self,
        notification: &Notification,
    ) -> Result<HandlingResult, RelayError> {
        let token = notification.token();
        let outcome = self.sender.post(notification).await;
        let disposition = Disposition::classify(&outcome);

        match (disposition, outcome) {
            (Disposition::Success, Ok(outcome)) => {
                tracing::debug!(
                    account = %redact(token),
                    status = outcome.status,
                    "notification delivered"
                );
                if let Some(limits) = outcome.limits {
                    self.cache.set_limits(token, limits)?;
                }
                Ok(HandlingResult {
                    response_code: outcome.status,
                    limits: outcome.limits,
                    body: HandlingBody::Remote(outcome.body),
                    disposition,
                    transport_error: false,
                })
            }
            (Disposition::Permanent, Ok(outcome)) => {
                tracing::info!(
                    account = %redact(token),
                    status = outcome.status,
                    "notification refused by remote API"
                );
                Ok(HandlingResult {
                    response_code: outcome.status,
                    limits: None,
                    body: HandlingBody::Remote(outcome.body),
                    disposition,
                    transport_error: false,
                })
            }
            (_, outcome) => {
                let transport_error = outcome.is_err();
                match &outcome {
                    Ok(outcome) => tracing::warn!(
                        account = %redact(token),
                        status = outcome.status,
                        "remote API failed transiently"
                    ),
                    Err(e) => tracing::warn!(
                        account = %redact(token),
                        error = %e,
                        "remote API unreachable"
                    ),
                }
                self.admit_retry(token, transport_error)
            }
        }
    }

    /// Spend one message of the account's quota on a later retry
    fn admit_retry(
        &self,
        token: &str,
        transport_error: bool,
    ) -> Result<HandlingResult, RelayError> {
        match self.cache.decrement_limits(token) {
            Ok(()) => {
                tracing::info!(account = %redact(token), "notification queued for retry");
                Ok(HandlingResult {
                    response_code: ACCEPTED,
                    limits: self.cache.get_limits(token)?,
                    body: HandlingBody::Queued,
                    disposition: Disposition::Retryable,
                    transport_error,
                })
            }
            Err(RelayError::QuotaExhausted { .. }) => Ok(HandlingResult {
                response_code: FORBIDDEN,
                limits: self.cache.get_limits(token)?,
                body: HandlingBody::Rejected(
                    "message quota exhausted, the notification was not accepted for retry"
                        .to_string(),
                ),
                disposition: Disposition::Retryable,
                transport_error,
            }),
            Err(e) => Err(e),
        }
    }
}
