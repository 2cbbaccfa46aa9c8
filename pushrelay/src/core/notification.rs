//! The notification a client asked the relay to deliver

use super::{RelayError, redact};
use std::fmt;

/// One requested push message
///
/// A notification is validated on construction and immutable afterwards.
/// The account token and the recipient must be non-empty; the message body
/// may be empty.
///
/// # Example
///
/// ```
/// use pushrelay::Notification;
///
/// let notification = Notification::new("app-token", "user-key", "Backup finished").unwrap();
/// assert_eq!(notification.token(), "app-token");
/// assert!(Notification::new("app-token", "", "Backup finished").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Notification {
    token: String,
    recipient: String,
    body: String,
}

impl Notification {
    /// Create a validated notification
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidNotification`] if the token or the
    /// recipient is empty.
    pub fn new(
        token: impl Into<String>,
        recipient: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Self, RelayError> {
        let notification = Notification {
            token: token.into(),
            recipient: recipient.into(),
            body: body.into(),
        };

        if notification.token.is_empty() {
            return Err(RelayError::InvalidNotification(
                "push notification token value cannot be empty",
            ));
        }
        if notification.recipient.is_empty() {
            return Err(RelayError::InvalidNotification(
                "push notification user value cannot be empty",
            ));
        }

        Ok(notification)
    }

    /// Account token, also the key of the limits cache
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Recipient (user or group key)
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Message content
    pub fn body(&self) -> &str {
        &self.body
    }
}

// Keeps the credential out of logs.
impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("token", &redact(&self.token))
            .field("recipient", &self.recipient)
            .field("body", &self.body)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_notification() {
        let n = Notification::new("token", "user", "message").unwrap();
        assert_eq!(n.token(), "token");
        assert_eq!(n.recipient(), "user");
        assert_eq!(n.body(), "message");
    }

    #[test]
    fn test_empty_body_is_allowed() {
        let n = Notification::new("token", "user", "").unwrap();
        assert_eq!(n.body(), "");
    }

    #[test]
    fn test_empty_token_rejected() {
        let err = Notification::new("", "user", "message").unwrap_err();
        assert!(matches!(err, RelayError::InvalidNotification(_)));
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn test_empty_recipient_rejected() {
        let err = Notification::new("token", "", "message").unwrap_err();
        assert!(err.to_string().contains("user"));
    }

    #[test]
    fn test_structural_equality() {
        let a = Notification::new("token", "user", "message").unwrap();
        let b = Notification::new("token", "user", "message").unwrap();
        let c = Notification::new("token", "user", "other").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_debug_redacts_token() {
        let n = Notification::new("azGDORePK8gMaC0QOYAMyEEuzJnyUi", "user", "hi").unwrap();
        let debug = format!("{n:?}");
        assert!(!debug.contains("azGDORePK8gMaC0QOYAMyEEuzJnyUi"));
        assert!(debug.contains("azGD"));
    }
}
