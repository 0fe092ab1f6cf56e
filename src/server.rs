//! HTTP surface of the bridge.
//!
//! # Routes
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | `GET` | `/` | Health probe, `{"status":"ok"}` |
//! | `GET` | `callback_path` | Hub intent verification |
//! | `POST` | `callback_path` | Content notification |
//!
//! Every request gets a random request id, echoed in `x-request-id` and
//! attached to the tracing span that wraps the request.
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{to_bytes, Body};
use axum::extract::{Query, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tracing::Instrument;

use crate::websub::signature::SIGNATURE_HEADER;
use crate::websub::{CallbackHandler, Notification, VerificationOutcome};

/// Header naming the feed topic when the hub sends no `Link` header.
const HUB_TOPIC_HEADER: &str = "x-hub-topic";

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Builds the router for `handler`'s callback path.
pub fn router(handler: Arc<CallbackHandler>) -> Router {
    let callback_path = handler.config().callback_path.clone();

    Router::new()
        .route("/", get(health))
        .route(&callback_path, get(verify).post(notify))
        .layer(middleware::from_fn(trace_requests))
        .with_state(handler)
}

/// Binds `addr` and serves until `shutdown` resolves.
pub async fn serve<F>(handler: Arc<CallbackHandler>, addr: &str, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        callback_path = %handler.config().callback_path,
        "Listening for WebSub callbacks"
    );
    axum::serve(listener, router(handler))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn verify(
    State(handler): State<Arc<CallbackHandler>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match handler.verify(&params).await {
        VerificationOutcome::Confirmed { challenge } => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            challenge,
        )
            .into_response(),
        VerificationOutcome::UnknownTopic { .. } => StatusCode::NOT_FOUND.into_response(),
        VerificationOutcome::Denied { .. } | VerificationOutcome::Rejected(_) => {
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// Always answers 200 with an empty body once the payload is parsed.
/// Entries are published from a spawned task.
///
/// Bodies over `max_body_bytes` are not read past the limit; they are
/// dropped and still acknowledged.
async fn notify(
    State(handler): State<Arc<CallbackHandler>>,
    headers: HeaderMap,
    body: Body,
) -> StatusCode {
    let max_body_bytes = handler.config().max_body_bytes;
    let body = match to_bytes(body, max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(
                error = %e,
                max_body_bytes,
                "Discarding notification body over the size limit"
            );
            return StatusCode::OK;
        }
    };

    let link_headers: Vec<&str> = headers
        .get_all(header::LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    let notification = Notification {
        body: &body,
        link_headers: &link_headers,
        hub_topic: header_str(&headers, HUB_TOPIC_HEADER),
        signature: header_str(&headers, SIGNATURE_HEADER),
    };

    // Signature failures are logged by the handler and still acknowledged
    if let Ok(delivery) = handler.accept(&notification) {
        if !delivery.entries.is_empty() {
            let handler = Arc::clone(&handler);
            tokio::spawn(
                async move {
                    let report = handler.deliver(delivery).await;
                    tracing::debug!(
                        published = report.published.len(),
                        duplicates = report.duplicates.len(),
                        failed = report.failed.len(),
                        "Delivery finished"
                    );
                }
                .instrument(tracing::Span::current()),
            );
        }
    }

    StatusCode::OK
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Request-id span plus a completion log line with status and latency.
async fn trace_requests(request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().simple().to_string();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let started = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    span.in_scope(|| {
        let status = response.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), latency_ms, "Request failed");
        } else {
            tracing::info!(status = status.as_u16(), latency_ms, "Request completed");
        }
    });

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
