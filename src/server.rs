//! HTTP surface of the relay.
//!
//! | Route | Description |
//! |-------|-------------|
//! | `POST /api/getanswer` | Streamed answer as `text/event-stream` frames |
//! | `POST /api/chat` | Whole answer as JSON (non-streaming fallback) |
//! | `GET /health` | Liveness probe |

use crate::relay::StreamRelay;
use crate::types::request::ChatRequest;
use crate::Error;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::Serialize;
use std::convert::Infallible;
use tower_http::cors::CorsLayer;
use tracing::warn;

/// Message returned to the client when the provider cannot be reached.
pub const UPSTREAM_FAILURE_MESSAGE: &str = "Failed to get response from upstream provider";

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct AnswerBody {
    answer: String,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Map a pre-stream failure to a client response. Upstream details stay in the logs.
fn relay_error_response(err: &Error) -> Response {
    if err.is_client_error() {
        error_response(StatusCode::BAD_REQUEST, err.to_string())
    } else {
        error_response(StatusCode::INTERNAL_SERVER_ERROR, UPSTREAM_FAILURE_MESSAGE)
    }
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn get_answer(
    State(relay): State<StreamRelay>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let stream = match relay.open(&request).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "relay could not open stream");
            return relay_error_response(&e);
        }
    };

    let body = Body::from_stream(stream.into_frames().map(Ok::<_, Infallible>));

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream")),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-transform"),
            ),
            (header::CONNECTION, HeaderValue::from_static("keep-alive")),
        ],
        body,
    )
        .into_response()
}

async fn chat(
    State(relay): State<StreamRelay>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    match relay.complete(&request).await {
        Ok(answer) => Json(AnswerBody { answer }).into_response(),
        Err(e) => {
            warn!(error = %e, "fallback completion failed");
            relay_error_response(&e)
        }
    }
}

/// Build the application router.
pub fn router(relay: StreamRelay) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(health))
        .route("/api/getanswer", post(get_answer))
        .route("/api/chat", post(chat))
        .layer(cors)
        .with_state(relay)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(relay: StreamRelay, addr: &str) -> crate::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr, "stream relay listening");
    axum::serve(listener, router(relay)).await?;
    Ok(())
}
