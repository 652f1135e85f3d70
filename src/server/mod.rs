//! HTTP front end
//!
//! | Route | Method | Response |
//! |-------|--------|----------|
//! | `/api/rag` | POST `{"query": "..."}` | retrieved documentation as `text/plain` |
//! | `/health` | GET | `{"status","version","root","model","mode"}` |
//! | `/metrics` | GET | Prometheus text format |
//!
//! Failures on `/api/rag` are JSON `{"error": "..."}` bodies: 400 for a
//! missing query, 429 when the rate limiter rejects, 502 when the model
//! fails and 504 when the run exceeds the request timeout.

pub mod rate_limit;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::agent::{AgentController, AgentError};
use crate::metrics::{self, RAG_REQUESTS, REQUESTS_IN_FLIGHT};

pub use rate_limit::RateLimiter;

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<AgentController>,
    pub rate_limiter: Arc<RateLimiter>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        agent: Arc<AgentController>,
        rate_limiter: Arc<RateLimiter>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            agent,
            rate_limiter,
            request_timeout,
        }
    }
}

/// Build the router with every route
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/rag", post(rag))
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl+C
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl+C");
            }
            info!("Shutting down");
        })
        .await
}

/// Extract a non-empty string `query` from a JSON body
fn parse_query(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let query = value.get("query")?.as_str()?;
    if query.trim().is_empty() {
        None
    } else {
        Some(query.to_string())
    }
}

/// Holds one slot of `docscout_requests_in_flight`.
///
/// Released on drop, so a query whose handler is cancelled (client gone,
/// server shutting down) is still counted out.
struct InFlight;

impl InFlight {
    fn enter() -> Self {
        REQUESTS_IN_FLIGHT.inc();
        InFlight
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        REQUESTS_IN_FLIGHT.dec();
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn rag(State(state): State<AppState>, body: Bytes) -> Response {
    let Some(query) = parse_query(&body) else {
        RAG_REQUESTS.with_label_values(&["bad_request"]).inc();
        return error_response(StatusCode::BAD_REQUEST, "query is required");
    };

    if !state.rate_limiter.try_acquire() {
        RAG_REQUESTS.with_label_values(&["rate_limited"]).inc();
        warn!("Rate limit exceeded on /api/rag");
        return error_response(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded");
    }

    info!(query = %query, "POST /api/rag");

    let in_flight = InFlight::enter();
    let outcome = tokio::time::timeout(state.request_timeout, state.agent.run(&query)).await;
    drop(in_flight);

    match outcome {
        Ok(Ok(result)) => {
            RAG_REQUESTS.with_label_values(&["ok"]).inc();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                result.answer,
            )
                .into_response()
        }
        Ok(Err(AgentError::EmptyQuery)) => {
            RAG_REQUESTS.with_label_values(&["bad_request"]).inc();
            error_response(StatusCode::BAD_REQUEST, "query is required")
        }
        Ok(Err(e)) => {
            RAG_REQUESTS.with_label_values(&["model_error"]).inc();
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
        Err(_) => {
            RAG_REQUESTS.with_label_values(&["timeout"]).inc();
            warn!(timeout_secs = state.request_timeout.as_secs(), "Query timed out");
            error_response(StatusCode::GATEWAY_TIMEOUT, "query timed out")
        }
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.agent.config();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "root": state.agent.registry().corpus().root().display().to_string(),
        "model": config.model,
        "mode": format!("{:?}", config.mode).to_lowercase(),
    }))
}

async fn metrics_text() -> Response {
    match metrics::gather_text() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        assert_eq!(parse_query(br#"{"query":"caching"}"#), Some("caching".to_string()));
        assert_eq!(parse_query(br#"{"query":""}"#), None);
        assert_eq!(parse_query(br#"{"query":"   "}"#), None);
        assert_eq!(parse_query(br#"{"query":42}"#), None);
        assert_eq!(parse_query(br#"{"q":"caching"}"#), None);
        assert_eq!(parse_query(b"not json"), None);
        assert_eq!(parse_query(b""), None);
    }

    #[test]
    fn test_in_flight_released_on_drop() {
        let before = REQUESTS_IN_FLIGHT.get();
        {
            let _first = InFlight::enter();
            let _second = InFlight::enter();
            assert!(REQUESTS_IN_FLIGHT.get() >= before + 2);
        }
        assert_eq!(REQUESTS_IN_FLIGHT.get(), before);
    }
}
