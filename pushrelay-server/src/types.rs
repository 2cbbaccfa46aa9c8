//! Wire types of the HTTP API
//!
//! The relay mimics the remote notification API: clients post the same form
//! they would post upstream and receive the same kind of JSON status body.

use pushrelay::{Notification, RelayError};
use serde::{Deserialize, Serialize};

/// Form posted to `/1/messages.json`
///
/// Missing fields decode as empty strings and are then refused by
/// validation. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageForm {
    /// Application token of the sending account
    #[serde(default)]
    pub token: String,
    /// Recipient user or group key
    #[serde(default)]
    pub user: String,
    /// Message text
    #[serde(default)]
    pub message: String,
}

impl TryFrom<MessageForm> for Notification {
    type Error = RelayError;

    fn try_from(form: MessageForm) -> Result<Self, Self::Error> {
        Notification::new(form.token, form.user, form.message)
    }
}

/// JSON status body
///
/// ```json
/// { "status": 0, "errors": ["push notification user value cannot be empty"] }
/// ```
///
/// `status` is `1` when the message was delivered or accepted, `0` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl StatusBody {
    pub fn ok() -> Self {
        StatusBody {
            status: 1,
            errors: Vec::new(),
        }
    }

    pub fn failed() -> Self {
        StatusBody {
            status: 0,
            errors: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StatusBody {
            status: 0,
            errors: vec![message.into()],
        }
    }
}
