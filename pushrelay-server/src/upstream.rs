//! Client of the remote notification API
//!
//! [`PushoverSender`] posts each notification as a form to the configured
//! endpoint and reports whatever the remote API answered. On successful
//! responses the account's quota is read from the `X-Limit-App-*` headers.

use async_trait::async_trait;
use pushrelay::{Limits, Notification, SendError, SendOutcome, Sender};
use reqwest::header::HeaderMap;
use std::time::Duration;
use thiserror::Error;

pub const LIMIT_HEADER: &str = "x-limit-app-limit";
pub const REMAINING_HEADER: &str = "x-limit-app-remaining";
pub const RESET_HEADER: &str = "x-limit-app-reset";

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Timeout")]
    Timeout,

    #[error("Invalid {name} header: {value:?}")]
    InvalidHeader { name: &'static str, value: String },

    #[error("Incomplete limit headers, {0} missing")]
    MissingHeader(&'static str),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Request(e)
        }
    }
}

impl From<UpstreamError> for SendError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::Timeout => SendError::Timeout,
            other => SendError::Transport(other.to_string()),
        }
    }
}

/// [`Sender`] backed by the remote notification API
#[derive(Debug, Clone)]
pub struct PushoverSender {
    client: reqwest::Client,
    url: String,
}

impl PushoverSender {
    /// Create a sender posting to `url`, giving up on calls after `timeout`
    pub fn new(url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UpstreamError::Client)?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    async fn send(&self, notification: &Notification) -> Result<SendOutcome, UpstreamError> {
        let form = [
            ("token", notification.token()),
            ("user", notification.recipient()),
            ("message", notification.body()),
        ];

        let response = self.client.post(&self.url).form(&form).send().await?;
        let status = response.status();

        let limits = if status.is_success() {
            match limits_from_headers(response.headers()) {
                Ok(limits) => limits,
                Err(e) => {
                    tracing::warn!("Ignoring limits reported by remote API: {}", e);
                    None
                }
            }
        } else {
            None
        };

        // The status is what matters; a truncated body is not worth a retry
        let body = response.text().await.unwrap_or_else(|e| {
            tracing::warn!("Failed to read remote API response body: {}", e);
            String::new()
        });

        Ok(SendOutcome {
            status: status.as_u16(),
            limits,
            body,
        })
    }
}

#[async_trait]
impl Sender for PushoverSender {
    async fn post(&self, notification: &Notification) -> Result<SendOutcome, SendError> {
        tracing::debug!(url = %self.url, ?notification, "Posting notification");
        Ok(self.send(notification).await?)
    }
}

/// Read the account's quota from the `X-Limit-App-*` response headers
///
/// Returns `Ok(None)` when none of the headers are present.
///
/// # Errors
///
/// Returns an error if only some of the headers are present or a value is
/// not a number.
pub fn limits_from_headers(headers: &HeaderMap) -> Result<Option<Limits>, UpstreamError> {
    let limit = header_value(headers, LIMIT_HEADER)?;
    let remaining = header_value(headers, REMAINING_HEADER)?;
    let reset = header_value(headers, RESET_HEADER)?;

    match (limit, remaining, reset) {
        (None, None, None) => Ok(None),
        (Some(limit), Some(remaining), Some(reset)) => Ok(Some(Limits::new(
            parse_header(LIMIT_HEADER, limit)?,
            parse_header(REMAINING_HEADER, remaining)?,
            parse_header(RESET_HEADER, reset)?,
        ))),
        (None, _, _) => Err(UpstreamError::MissingHeader(LIMIT_HEADER)),
        (_, None, _) => Err(UpstreamError::MissingHeader(REMAINING_HEADER)),
        (_, _, None) => Err(UpstreamError::MissingHeader(RESET_HEADER)),
    }
}

fn header_value<'a>(
    headers: &'a HeaderMap,
    name: &'static str,
) -> Result<Option<&'a str>, UpstreamError> {
    headers
        .get(name)
        .map(|value| {
            value.to_str().map_err(|_| UpstreamError::InvalidHeader {
                name,
                value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            })
        })
        .transpose()
}

fn parse_header<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, UpstreamError> {
    value.trim().parse().map_err(|_| UpstreamError::InvalidHeader {
        name,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, response::IntoResponse, routing::post};
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn notification() -> Notification {
        Notification::new("app-token", "user-key", "Hello").unwrap()
    }

    /// Serve `app` on an ephemeral port, returning its messages URL
    async fn spawn_upstream(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/1/messages.json")
    }

    #[test]
    fn test_limits_from_headers() {
        let map = headers(&[
            (LIMIT_HEADER, "7500"),
            (REMAINING_HEADER, "7496"),
            (RESET_HEADER, "1393653600"),
        ]);

        assert_eq!(
            limits_from_headers(&map).unwrap(),
            Some(Limits::new(7500, 7496, 1393653600))
        );
    }

    #[test]
    fn test_no_limit_headers() {
        assert_eq!(limits_from_headers(&HeaderMap::new()).unwrap(), None);
    }

    #[test]
    fn test_partial_limit_headers() {
        let map = headers(&[(LIMIT_HEADER, "7500"), (RESET_HEADER, "1393653600")]);

        assert!(matches!(
            limits_from_headers(&map),
            Err(UpstreamError::MissingHeader(REMAINING_HEADER))
        ));
    }

    #[test]
    fn test_malformed_limit_header() {
        let map = headers(&[
            (LIMIT_HEADER, "7500"),
            (REMAINING_HEADER, "-1"),
            (RESET_HEADER, "1393653600"),
        ]);

        assert!(matches!(
            limits_from_headers(&map),
            Err(UpstreamError::InvalidHeader {
                name: REMAINING_HEADER,
                ..
            })
        ));
    }

    #[test]
    fn test_timeout_maps_to_send_timeout() {
        assert_eq!(SendError::from(UpstreamError::Timeout), SendError::Timeout);
        assert!(matches!(
            SendError::from(UpstreamError::MissingHeader(LIMIT_HEADER)),
            SendError::Transport(_)
        ));
    }

    #[tokio::test]
    async fn test_post_success_reads_limits() {
        let app = Router::new().route(
            "/1/messages.json",
            post(|body: String| async move {
                assert!(body.contains("token=app-token"));
                assert!(body.contains("user=user-key"));
                assert!(body.contains("message=Hello"));
                (
                    [
                        (LIMIT_HEADER, "10000"),
                        (REMAINING_HEADER, "10"),
                        (RESET_HEADER, "12345"),
                    ],
                    r#"{"status":1,"request":"647d2300-702c-4b38-8b2f-d56326ae460b"}"#,
                )
            }),
        );
        let url = spawn_upstream(app).await;
        let sender = PushoverSender::new(&url, Duration::from_secs(5)).unwrap();

        let outcome = sender.post(&notification()).await.unwrap();

        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.limits, Some(Limits::new(10000, 10, 12345)));
        assert!(outcome.body.contains("647d2300"));
    }

    #[tokio::test]
    async fn test_post_failure_ignores_limits() {
        let app = Router::new().route(
            "/1/messages.json",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    [
                        (LIMIT_HEADER, "10000"),
                        (REMAINING_HEADER, "10"),
                        (RESET_HEADER, "12345"),
                    ],
                    r#"{"status":0,"errors":["user identifier is invalid"]}"#,
                )
                    .into_response()
            }),
        );
        let url = spawn_upstream(app).await;
        let sender = PushoverSender::new(&url, Duration::from_secs(5)).unwrap();

        let outcome = sender.post(&notification()).await.unwrap();

        assert_eq!(outcome.status, 400);
        assert_eq!(outcome.limits, None);
        assert!(outcome.body.contains("user identifier is invalid"));
    }

    #[tokio::test]
    async fn test_post_to_closed_port_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sender = PushoverSender::new(
            &format!("http://{addr}/1/messages.json"),
            Duration::from_secs(5),
        )
        .unwrap();

        assert!(matches!(
            sender.post(&notification()).await,
            Err(SendError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_post_timeout() {
        let app = Router::new().route(
            "/1/messages.json",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let url = spawn_upstream(app).await;
        let sender = PushoverSender::new(&url, Duration::from_millis(100)).unwrap();

        assert_eq!(
            sender.post(&notification()).await,
            Err(SendError::Timeout)
        );
    }
}
