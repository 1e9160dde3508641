//! HTTP surface: chat, conversation lifecycle, health and triage trigger.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use feedback_relay_conversation::{ChatContext, Message};
use feedback_relay_core::SessionId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

/// Body of `POST /chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
    #[serde(default)]
    pub context: Option<ChatContext>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Body of the `/conversation/*` lifecycle endpoints.
///
/// `action` and `timestamp` are sent by the widget but carry no meaning
/// beyond the route itself.
#[derive(Debug, Deserialize)]
pub struct ConversationRequest {
    #[serde(default)]
    pub action: Option<String>,
    pub session_id: String,
    #[serde(default)]
    pub context: Option<ChatContext>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub welcome_message: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_pipeline_available: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProcessingResponse {
    pub status: &'static str,
}

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/conversation/start", post(start_conversation))
        .route("/conversation/end", post(end_conversation))
        .route("/conversation/clear", post(clear_conversation))
        .route("/conversation/history/{session_id}", get(history))
        .route("/health", get(health))
        .route("/process-sentry-logs", post(process_sentry_logs))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Records a user message and returns the assistant reply.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session_id = SessionId::new(request.session_id);
    let reply = state
        .conversations
        .message(&session_id, request.message, request.context)
        .await?;

    Ok(Json(ChatResponse {
        response: reply.content,
        session_id: session_id.as_str().to_string(),
        timestamp: Utc::now(),
    }))
}

/// Starts (or restarts) a conversation and returns its welcome message.
pub async fn start_conversation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConversationRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    debug!(action = ?request.action, "Start requested");
    let session_id = SessionId::new(request.session_id);
    let welcome = state
        .conversations
        .start(&session_id, request.context.as_ref())
        .await?;

    Ok(Json(StartResponse {
        welcome_message: welcome.content,
        session_id: session_id.as_str().to_string(),
        timestamp: welcome.timestamp,
    }))
}

pub async fn end_conversation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConversationRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    debug!(action = ?request.action, client_timestamp = ?request.timestamp, "End requested");
    state
        .conversations
        .end(&SessionId::new(request.session_id))
        .await?;

    Ok(Json(StatusResponse {
        status: "success",
        message: "Conversation ended",
    }))
}

pub async fn clear_conversation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConversationRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    state
        .conversations
        .clear(&SessionId::new(request.session_id))
        .await?;

    Ok(Json(StatusResponse {
        status: "success",
        message: "Conversation cleared",
    }))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let messages = state
        .conversations
        .history(&SessionId::new(session_id))
        .await?;
    Ok(Json(HistoryResponse { messages }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model_pipeline_available: state.conversations.is_model_backed(),
        timestamp: Utc::now(),
    })
}

/// Spawns a triage run and returns without waiting for it.
pub async fn process_sentry_logs(State(state): State<Arc<AppState>>) -> Json<ProcessingResponse> {
    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        match pipeline.run().await {
            Ok(report) => info!(run_id = %report.run_id, "On-demand triage run finished"),
            Err(e) => warn!(error = %e, "On-demand triage run failed"),
        }
    });

    Json(ProcessingResponse {
        status: "processing started",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use feedback_relay_conversation::{
        ConversationManager, FallbackResponder, InMemorySessionStore,
    };
    use feedback_relay_integration::{Event, IssueTracker, LogNotifier, TrackerError};
    use feedback_relay_triage::{Tagger, TriagePipeline};
    use rootcause::prelude::Report;
    use serde_json::{Value, json};
    use tokio::sync::Notify;
    use tower::ServiceExt;

    #[derive(Default)]
    struct SignallingTracker {
        fetched: Notify,
    }

    #[async_trait]
    impl IssueTracker for SignallingTracker {
        async fn fetch_events(&self) -> Result<Vec<Event>, Report<TrackerError>> {
            self.fetched.notify_one();
            Ok(Vec::new())
        }

        async fn update_issue_tags(
            &self,
            _issue_id: &str,
            _tags: &[(String, String)],
        ) -> Result<(), Report<TrackerError>> {
            Ok(())
        }
    }

    fn app_with_tracker(tracker: Arc<SignallingTracker>) -> Router {
        let conversations = ConversationManager::new(
            Arc::new(InMemorySessionStore::default()),
            Arc::new(FallbackResponder),
        );
        let pipeline = TriagePipeline::new(tracker, Tagger::unavailable(), Arc::new(LogNotifier));
        router(Arc::new(AppState::new(conversations, pipeline)))
    }

    fn app() -> Router {
        app_with_tracker(Arc::new(SignallingTracker::default()))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.expect("request");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = serde_json::from_slice(&body).expect("json body");
        (status, value)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    #[tokio::test]
    async fn payment_conversation_end_to_end() {
        let app = app();

        let (status, started) = send(
            &app,
            post_json(
                "/conversation/start",
                json!({"action": "start", "session_id": "s1", "context": {"pageType": "payment"}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            started["welcome_message"],
            "Hello! I'm here to help with your payment experience. How can I assist you today?"
        );
        assert_eq!(started["session_id"], "s1");

        let (status, chat) = send(
            &app,
            post_json(
                "/chat",
                json!({"message": "My payment failed", "session_id": "s1", "context": {"pageType": "payment"}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            chat["response"]
                .as_str()
                .is_some_and(|text| text.starts_with("I understand you're having payment issues"))
        );
        assert!(chat["timestamp"].is_string());

        let (status, history) = send(&app, get_request("/conversation/history/s1")).await;
        assert_eq!(status, StatusCode::OK);
        let messages = history["messages"].as_array().expect("messages array");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "assistant");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "My payment failed");
        assert_eq!(messages[1]["context"]["pageType"], "payment");
        assert_eq!(messages[2]["role"], "assistant");
        assert!(messages[2].get("context").is_none());
    }

    #[tokio::test]
    async fn clear_then_end_lifecycle() {
        let app = app();
        send(
            &app,
            post_json("/chat", json!({"message": "hello", "session_id": "s2"})),
        )
        .await;

        let (status, cleared) = send(
            &app,
            post_json("/conversation/clear", json!({"action": "clear", "session_id": "s2"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cleared, json!({"status": "success", "message": "Conversation cleared"}));

        let (_, history) = send(&app, get_request("/conversation/history/s2")).await;
        assert_eq!(history, json!({"messages": []}));

        let (_, chat) = send(
            &app,
            post_json("/chat", json!({"message": "still there?", "session_id": "s2"})),
        )
        .await;
        assert!(chat["response"].is_string());

        let (status, ended) = send(
            &app,
            post_json(
                "/conversation/end",
                json!({"action": "end", "session_id": "s2", "timestamp": "2025-01-01T00:00:00Z"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ended, json!({"status": "success", "message": "Conversation ended"}));

        let (_, history) = send(&app, get_request("/conversation/history/s2")).await;
        assert_eq!(history, json!({"messages": []}));
    }

    #[tokio::test]
    async fn history_of_unknown_session_is_empty() {
        let (status, history) = send(&app(), get_request("/conversation/history/nobody")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history, json!({"messages": []}));
    }

    #[tokio::test]
    async fn health_reports_fallback_mode() {
        let (status, health) = send(&app(), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["model_pipeline_available"], false);
        assert!(health["timestamp"].is_string());
    }

    #[tokio::test]
    async fn process_sentry_logs_spawns_a_run() {
        let tracker = Arc::new(SignallingTracker::default());
        let app = app_with_tracker(tracker.clone());

        let (status, body) = send(&app, post_json("/process-sentry-logs", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "processing started"}));

        tokio::time::timeout(std::time::Duration::from_secs(5), tracker.fetched.notified())
            .await
            .expect("triage run should fetch events");
    }
}
