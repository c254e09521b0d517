//! HTTP request handlers

use super::AppState;
use crate::slack::events::Envelope;
use crate::slack::signature::{self, SignatureError};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const SIGNATURE_HEADER: &str = "x-slack-signature";
const RETRY_HEADER: &str = "x-slack-retry-num";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn status() -> &'static str {
    "pong"
}

#[derive(Debug, Serialize)]
struct ChallengeResponse {
    challenge: String,
}

async fn slack_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    if let Some(secret) = state.signing_secret.as_deref() {
        verify_request(secret, &headers, &body)?;
    }

    // Slack redelivers when we answer slowly; the first copy is already queued
    if let Some(retry) = header(&headers, RETRY_HEADER) {
        tracing::debug!(retry = %retry, "Ignoring Slack retry");
        return Ok(StatusCode::OK.into_response());
    }

    let envelope: Envelope = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid event payload: {e}")))?;

    match envelope {
        Envelope::UrlVerification { challenge } => {
            Ok(Json(ChallengeResponse { challenge }).into_response())
        }
        Envelope::EventCallback { event } => {
            if let Some(msg) = event.into_inbound(&state.bot_user_id) {
                let (sender, channel) = (msg.sender.clone(), msg.channel.clone());
                state.queue.submit(msg).map_err(|e| {
                    tracing::error!(sender = %sender, channel = %channel, error = %e, "Dropping message");
                    AppError::Unavailable(e.to_string())
                })?;
            }
            Ok(StatusCode::OK.into_response())
        }
        Envelope::Other => Ok(StatusCode::OK.into_response()),
    }
}

fn verify_request(secret: &str, headers: &HeaderMap, body: &[u8]) -> Result<(), AppError> {
    let (Some(timestamp), Some(sig)) = (
        header(headers, TIMESTAMP_HEADER),
        header(headers, SIGNATURE_HEADER),
    ) else {
        return Err(AppError::Unauthorized(SignatureError::Missing));
    };
    signature::verify(secret, timestamp, body, sig, chrono::Utc::now().timestamp())
        .map_err(AppError::Unauthorized)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unauthorized(SignatureError),
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(e) => {
                tracing::warn!(error = %e, "Rejected unsigned or forged request");
                (StatusCode::UNAUTHORIZED, e.to_string())
            }
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::poll::render;
    use crate::runtime::testing::{RecordingTransport, StaticRoster};
    use crate::runtime::{DatabaseStorage, Engine, MessageQueue, WorkerPool};
    use axum::body::Body;
    use axum::http::Request;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;
    use std::fmt::Write;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const SECRET: &str = "signing-secret";

    fn started(transport: Arc<RecordingTransport>) -> (WorkerPool, MessageQueue) {
        let db = Database::open_in_memory().unwrap();
        let engine =
            Engine::new(DatabaseStorage::new(db), transport, StaticRoster::new()).unwrap();
        WorkerPool::start(Arc::new(engine), 1, 4)
    }

    fn sign(timestamp: &str, body: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("v0:{timestamp}:{body}").as_bytes());
        let mut out = String::from("v0=");
        for byte in mac.finalize().into_bytes() {
            write!(out, "{byte:02x}").unwrap();
        }
        out
    }

    fn event_request(body: &str) -> Request<Body> {
        Request::post("/slack/events")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_status() {
        let (pool, queue) = started(Arc::new(RecordingTransport::new()));
        let app = create_router(AppState::new(queue, "UBOT", None));

        let response = app
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "pong");
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_url_verification_echoes_challenge() {
        let (pool, queue) = started(Arc::new(RecordingTransport::new()));
        let app = create_router(AppState::new(queue, "UBOT", None));

        let response = app
            .oneshot(event_request(r#"{"type":"url_verification","challenge":"abc123"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["challenge"], "abc123");
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_message_event_reaches_engine() {
        let transport = Arc::new(RecordingTransport::new());
        let (pool, queue) = started(transport.clone());
        let app = create_router(AppState::new(queue, "UBOT", None));

        let body = r#"{"type":"event_callback","event":{"type":"message","user":"U1","channel":"D1","channel_type":"im","text":"help"}}"#;
        let response = app.oneshot(event_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        for _ in 0..100 {
            if !transport.sent().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        pool.shutdown().await;
        assert_eq!(transport.last_text("D1").as_deref(), Some(render::HELP));
    }

    #[tokio::test]
    async fn test_channel_mention_creates_one_poll() {
        let transport = Arc::new(RecordingTransport::new());
        let (pool, queue) = started(transport.clone());
        let app = create_router(AppState::new(queue, "UBOT", None));

        for kind in ["app_mention", "message"] {
            let body = serde_json::json!({
                "type": "event_callback",
                "event": {
                    "type": kind,
                    "user": "U1",
                    "channel": "C1",
                    "channel_type": "channel",
                    "text": "<@UBOT> create response poll",
                },
            });
            let response = app
                .clone()
                .oneshot(event_request(&body.to_string()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        pool.shutdown().await;

        let replies = transport.sent_to("C1");
        assert_eq!(replies.len(), 1);
        assert!(replies[0].text().starts_with("Creating a response poll"));
    }

    #[tokio::test]
    async fn test_retries_are_acknowledged_without_processing() {
        let transport = Arc::new(RecordingTransport::new());
        let (pool, queue) = started(transport.clone());
        let app = create_router(AppState::new(queue, "UBOT", None));

        let body = r#"{"type":"event_callback","event":{"type":"message","user":"U1","channel":"D1","text":"help"}}"#;
        let mut request = event_request(body);
        request
            .headers_mut()
            .insert(RETRY_HEADER, "1".parse().unwrap());
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        pool.shutdown().await;
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_signature_is_enforced_when_configured() {
        let (pool, queue) = started(Arc::new(RecordingTransport::new()));
        let app = create_router(AppState::new(queue, "UBOT", Some(SECRET)));
        let body = r#"{"type":"url_verification","challenge":"abc123"}"#;

        let unsigned = app.clone().oneshot(event_request(body)).await.unwrap();
        assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let mut forged = event_request(body);
        forged
            .headers_mut()
            .insert(TIMESTAMP_HEADER, timestamp.parse().unwrap());
        forged
            .headers_mut()
            .insert(SIGNATURE_HEADER, sign(&timestamp, "{}").parse().unwrap());
        let response = app.clone().oneshot(forged).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut signed = event_request(body);
        signed
            .headers_mut()
            .insert(TIMESTAMP_HEADER, timestamp.parse().unwrap());
        signed
            .headers_mut()
            .insert(SIGNATURE_HEADER, sign(&timestamp, body).parse().unwrap());
        let response = app.oneshot(signed).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_closed_queue_is_unavailable() {
        let (pool, queue) = started(Arc::new(RecordingTransport::new()));
        pool.shutdown().await;
        let app = create_router(AppState::new(queue, "UBOT", None));

        let body = r#"{"type":"event_callback","event":{"type":"message","user":"U1","channel":"D1","text":"help"}}"#;
        let response = app.oneshot(event_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let (pool, queue) = started(Arc::new(RecordingTransport::new()));
        let app = create_router(AppState::new(queue, "UBOT", None));

        let response = app.oneshot(event_request("not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        pool.shutdown().await;
    }
}
