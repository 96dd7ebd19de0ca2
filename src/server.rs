//! HTTP surface: the Telegram webhook plus a few inspection endpoints.
//!
//! The webhook always answers 200 so Telegram never retries on our account; repeated
//! deliveries are caught by the engine's dedup log instead.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use teloxide::types::Update;
use tracing::{info, warn};

use crate::chatbot::engine::BotEngine;

/// Recent chats shown on `/user/{id}`.
const USER_RECENT_CHATS: usize = 10;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BotEngine>,
}

#[derive(Deserialize)]
struct MessageRequest {
    message: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/webhook", post(webhook))
        .route("/user/{user_id}", get(user_info))
        .route("/test-intent", post(test_intent))
        .route("/test-function", post(test_function))
        .route("/capabilities", get(capabilities))
        .with_state(state)
}

/// Bind and serve until the process stops.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 Listening on {}", addr);
    axum::serve(listener, router(state)).await
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let store = state.engine.store();
    let functions = state.engine.dispatcher().registry().function_names();
    let database = if store.is_connected() { "connected" } else { "disconnected" };

    let mut body = json!({
        "status": "running",
        "service": "Ballu Chatbot",
        "database": database,
        "functions_available": functions.len(),
        "functions": functions,
    });
    if let Some(stats) = store.stats() {
        body["stats"] = json!({ "users": stats.users, "total_chats": stats.total_chats });
    }
    Json(body)
}

async fn webhook(State(state): State<AppState>, body: Bytes) -> Json<Value> {
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Unreadable webhook payload: {e}");
            return Json(json!({ "status": "ignored" }));
        }
    };

    let outcome = state.engine.handle_update(update).await;
    Json(json!({ "status": outcome.as_str() }))
}

async fn user_info(State(state): State<AppState>, Path(user_id): Path<i64>) -> Response {
    let store = state.engine.store();
    if !store.is_connected() {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "Database not connected" }))).into_response();
    }
    let Some(profile) = store.get_user(user_id) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "User not found" }))).into_response();
    };

    let recent = store.get_recent_chats(user_id, USER_RECENT_CHATS);
    let mut usage: BTreeMap<&str, usize> = BTreeMap::new();
    for chat in &recent {
        if let Some(function) = chat.function_used.as_deref() {
            *usage.entry(function).or_default() += 1;
        }
    }

    Json(json!({
        "user": profile,
        "recent_chats": recent,
        "function_usage": usage,
    }))
    .into_response()
}

async fn test_intent(State(state): State<AppState>, Json(req): Json<MessageRequest>) -> Json<Value> {
    let result = state.engine.dispatcher().extract(&req.message).await;
    Json(json!({
        "message": req.message,
        "intent": result.intent,
        "parameters": result.parameters,
    }))
}

/// Run the dispatcher without sending anything.
async fn test_function(State(state): State<AppState>, Json(req): Json<MessageRequest>) -> Json<Value> {
    let reply = state.engine.dispatcher().respond(&req.message, None).await;
    let media: Vec<String> = reply.media.iter().map(|m| m.describe()).collect();
    Json(json!({
        "message": req.message,
        "response": reply.text,
        "function_used": reply.function_used,
        "success": reply.success,
        "message_type": reply.message_type,
        "request_location": reply.request_location,
        "media": media,
    }))
}

async fn capabilities(State(state): State<AppState>) -> Json<Value> {
    Json(Value::Array(state.engine.dispatcher().registry().declarations()))
}
