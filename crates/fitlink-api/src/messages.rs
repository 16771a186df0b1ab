use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, warn};
use uuid::Uuid;

use fitlink_db::models::MessageRow;
use fitlink_types::api::{EditMessageRequest, MarkReadRequest, SendMessageRequest};
use fitlink_types::events::ChatEvent;
use fitlink_types::models::{EDIT_WINDOW_SECS, Message};

use crate::auth::AppStateInner;
use crate::middleware::Claims;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor-based pagination — pass the `sent_at` timestamp of the oldest
    /// message from the previous page to fetch older messages.
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    50
}

/// Conversation snapshot for the {caller, peer} pair, ascending by sent time.
pub async fn get_conversation_messages(
    State(state): State<Arc<AppStateInner>>,
    Path(peer_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    // Run blocking DB queries off the async runtime
    let db = state.clone();
    let viewer = claims.sub.to_string();
    let peer = peer_id.to_string();
    let limit = query.limit.min(200);
    let before = query.before;

    let rows = tokio::task::spawn_blocking(move || {
        db.db
            .get_conversation(&viewer, &peer, limit, before.as_deref())
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    let messages: Vec<Message> = rows.into_iter().map(row_to_message).collect();
    Ok(Json(messages))
}

/// Stores a message and returns the full row synchronously, so the client
/// can build its optimistic entry under the server-assigned id.
pub async fn send_message(
    State(state): State<Arc<AppStateInner>>,
    Path(peer_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.body.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if peer_id == claims.sub {
        return Err(StatusCode::BAD_REQUEST);
    }

    let message_id = Uuid::new_v4();
    let sent_at = Utc::now();

    // Receiver must exist; then insert off the async runtime
    let db = state.clone();
    let sender = claims.sub.to_string();
    let receiver = peer_id.to_string();
    let body = req.body.clone();
    let mid = message_id.to_string();
    let ts = sent_at.to_rfc3339();
    tokio::task::spawn_blocking(move || {
        let receiver_exists = db
            .db
            .get_user_by_id(&receiver)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .is_some();
        if !receiver_exists {
            return Err(StatusCode::NOT_FOUND);
        }
        db.db
            .insert_message(&mid, &sender, &receiver, &body, &ts)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    let message = Message {
        id: message_id,
        sender_id: claims.sub,
        receiver_id: peer_id,
        body: req.body,
        original_body: None,
        sent_at,
        read_at: None,
        edited_at: None,
    };

    // Push to both participants' event feeds
    state
        .dispatcher
        .publish(ChatEvent::MessageCreate {
            message: message.clone(),
        })
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Rewrites a message body. Sender only, and only within the edit window —
/// the client rejects these cases before calling, but the server re-checks.
pub async fn edit_message(
    State(state): State<Arc<AppStateInner>>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<EditMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.body.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let db = state.clone();
    let mid = message_id.to_string();
    let row = tokio::task::spawn_blocking(move || {
        db.db.get_message(&mid).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })??
    .ok_or(StatusCode::NOT_FOUND)?;

    if row.sender_id != claims.sub.to_string() {
        return Err(StatusCode::FORBIDDEN);
    }

    let sent_at = parse_timestamp(&row.sent_at, &row.id);
    let now = Utc::now();
    if now.signed_duration_since(sent_at).num_seconds() > EDIT_WINDOW_SECS {
        return Err(StatusCode::FORBIDDEN);
    }

    let db = state.clone();
    let mid = message_id.to_string();
    let sender = claims.sub.to_string();
    let body = req.body.clone();
    let edited_ts = now.to_rfc3339();
    let updated = tokio::task::spawn_blocking(move || {
        let changed = db
            .db
            .edit_message(&mid, &sender, &body, &edited_ts)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        if !changed {
            return Err(StatusCode::NOT_FOUND);
        }
        db.db.get_message(&mid).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })??
    .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    let message = row_to_message(updated);

    state
        .dispatcher
        .publish(ChatEvent::MessageUpdate {
            message: message.clone(),
        })
        .await;

    Ok(Json(message))
}

/// Batched mark-read write. Only the caller's own inbound, still-unread
/// messages are touched; everything else in the batch drops out silently.
pub async fn mark_read(
    State(state): State<Arc<AppStateInner>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MarkReadRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.message_ids.is_empty() {
        return Ok(StatusCode::NO_CONTENT);
    }

    let db = state.clone();
    let receiver = claims.sub.to_string();
    let ids: Vec<String> = req.message_ids.iter().map(Uuid::to_string).collect();
    let read_ts = Utc::now().to_rfc3339();
    let marked = tokio::task::spawn_blocking(move || {
        db.db
            .mark_read(&ids, &receiver, &read_ts)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    for row in marked {
        let message = row_to_message(row);
        state
            .dispatcher
            .publish(ChatEvent::MessageUpdate { message })
            .await;
    }

    Ok(StatusCode::NO_CONTENT)
}

fn row_to_message(row: MessageRow) -> Message {
    Message {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt message id '{}': {}", row.id, e);
            Uuid::default()
        }),
        sender_id: row.sender_id.parse().unwrap_or_else(|e| {
            warn!("Corrupt sender_id '{}' on message '{}': {}", row.sender_id, row.id, e);
            Uuid::default()
        }),
        receiver_id: row.receiver_id.parse().unwrap_or_else(|e| {
            warn!("Corrupt receiver_id '{}' on message '{}': {}", row.receiver_id, row.id, e);
            Uuid::default()
        }),
        sent_at: parse_timestamp(&row.sent_at, &row.id),
        read_at: row.read_at.as_deref().map(|ts| parse_timestamp(ts, &row.id)),
        edited_at: row.edited_at.as_deref().map(|ts| parse_timestamp(ts, &row.id)),
        body: row.body,
        original_body: row.original_body,
    }
}

fn parse_timestamp(ts: &str, message_id: &str) -> DateTime<Utc> {
    ts.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') stores "YYYY-MM-DD HH:MM:SS" without
            // timezone. Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on message '{}': {}", ts, message_id, e);
            DateTime::default()
        })
}
