//! HTTP transport mimicking the remote notification API
//!
//! Clients point their notification library at the relay instead of the
//! remote API and keep posting the same form.
//!
//! # API Endpoints
//!
//! ## POST /1/messages.json
//!
//! ```text
//! token=azGDORePK8gMaC0QOYAMyEEuzJnyUi&user=uQiRzpo4DXghDmr9QzzfQu27cmVRsG&message=Hello
//! ```
//!
//! The response carries the relay's decision: the remote API's status and
//! body when it answered, `202` with `{"status":1}` when the message was
//! accepted for a later retry, or `403` when the account's quota is spent.
//! Known limits are reported in the `X-Limit-App-Limit`,
//! `X-Limit-App-Remaining` and `X-Limit-App-Reset` headers.
//!
//! Malformed requests get `400` with an error body:
//!
//! ```json
//! { "status": 0, "errors": ["push notification user value cannot be empty"] }
//! ```
//!
//! ## GET /health
//!
//! Health check endpoint. Returns "OK" with 200 status.
//!
//! ## GET /metrics
//!
//! Prometheus text exposition of the server metrics.

use super::Transport;
use crate::relay::RelayHandle;
use crate::types::{MessageForm, StatusBody};
use crate::upstream::{LIMIT_HEADER, REMAINING_HEADER, RESET_HEADER};
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    Router,
    extract::{Form, State, rejection::FormRejection},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use pushrelay::{HandlingBody, HandlingResult, Limits, Notification};
use std::net::SocketAddr;

pub const MESSAGES_PATH: &str = "/1/messages.json";

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// HTTP transport implementation
pub struct HttpTransport {
    addr: SocketAddr,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns an error if `host:port` is not a valid socket address.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("Invalid HTTP address: {host}:{port}"))?;
        Ok(Self { addr })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start(self, relay: RelayHandle) -> Result<()> {
        let app = router(relay);

        tracing::info!("HTTP server listening on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Routes of the relay API
pub fn router(relay: RelayHandle) -> Router {
    Router::new()
        .route(MESSAGES_PATH, post(handle_message))
        .route("/health", get(|| async { "OK" }))
        .route("/metrics", get(handle_metrics))
        .with_state(relay)
}

async fn handle_message(
    State(relay): State<RelayHandle>,
    form: Result<Form<MessageForm>, FormRejection>,
) -> Response {
    let notification = match form {
        Ok(Form(form)) => Notification::try_from(form).map_err(|e| e.to_string()),
        Err(rejection) => Err(rejection.body_text()),
    };

    let notification = match notification {
        Ok(notification) => notification,
        Err(reason) => {
            tracing::debug!("Refusing request: {}", reason);
            relay.metrics().record_invalid();
            return (StatusCode::BAD_REQUEST, Json(StatusBody::error(reason))).into_response();
        }
    };

    match relay.handle(&notification).await {
        Ok(result) => render(result),
        Err(e) => {
            tracing::error!("Relay error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusBody::error(format!("Internal server error: {e}"))),
            )
                .into_response()
        }
    }
}

async fn handle_metrics(State(relay): State<RelayHandle>) -> String {
    if let Ok(accounts) = relay.cache().len() {
        relay.metrics().update_known_accounts(accounts);
    }
    relay.metrics().export_prometheus()
}

/// Turn a relay decision into the client's response
fn render(result: HandlingResult) -> Response {
    let status = match StatusCode::from_u16(result.response_code) {
        // A final response cannot be informational; the message was delivered
        Ok(status) if status.is_informational() => StatusCode::OK,
        Ok(status) => status,
        Err(_) => {
            tracing::warn!(
                "Remote API answered with unusable status {}",
                result.response_code
            );
            StatusCode::BAD_GATEWAY
        }
    };

    let mut response = match result.body {
        HandlingBody::Remote(body) if is_json(&body) => body.into_response(),
        HandlingBody::Remote(_) if status.is_success() => Json(StatusBody::ok()).into_response(),
        HandlingBody::Remote(_) => Json(StatusBody::failed()).into_response(),
        HandlingBody::Queued => Json(StatusBody::ok()).into_response(),
        HandlingBody::Rejected(reason) => Json(StatusBody::error(reason)).into_response(),
    };

    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    if let Some(limits) = result.limits {
        insert_limit_headers(headers, &limits);
    }

    response
}

fn insert_limit_headers(headers: &mut HeaderMap, limits: &Limits) {
    headers.insert(
        HeaderName::from_static(LIMIT_HEADER),
        HeaderValue::from(limits.limit),
    );
    headers.insert(
        HeaderName::from_static(REMAINING_HEADER),
        HeaderValue::from(limits.remaining),
    );
    headers.insert(
        HeaderName::from_static(RESET_HEADER),
        HeaderValue::from(limits.reset_at),
    );
}

fn is_json(body: &str) -> bool {
    serde_json::from_str::<serde::de::IgnoredAny>(body).is_ok()
}
