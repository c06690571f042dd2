//! Query handlers.
//!
//! Provides:
//! - `GET /?q=`: HTML page with frequencies and matching messages
//! - `GET /api/query?q=`: the same result as JSON

use crate::api::ApiError;
use crate::render::{render_index, IndexPage};
use crate::AppState;
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use mqwatch_store::{Message, QueryResult, MATCH_ALL};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Query parameters shared by the query endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct QueryParams {
    /// The raw query; absent means "show all".
    #[serde(default)]
    pub q: String,
}

/// A buffered message as exposed over JSON.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageView {
    pub seq: i64,
    pub routing_key: String,
    pub received_at: DateTime<Utc>,
    pub sender: String,
    pub headers: Map<String, Value>,
    /// The body as JSON, or as a string if it is not valid JSON.
    pub body: Value,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        let body = serde_json::from_slice(&message.body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&message.body).into_owned()));
        Self {
            seq: message.seq,
            routing_key: message.routing_key.clone(),
            received_at: message.received_at,
            sender: message.sender.clone(),
            headers: message.headers.clone(),
            body,
        }
    }
}

/// Response body for `GET /api/query`.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub messages: Vec<MessageView>,
    pub frequencies: BTreeMap<String, usize>,
    pub total_received: i64,
    pub buffered: usize,
}

/// Rejects non-empty queries shorter than `min_length` characters.
///
/// The empty query and `*` are always accepted.
pub fn check_query_length(raw: &str, min_length: usize) -> Result<(), ApiError> {
    if raw.is_empty() || raw == MATCH_ALL || raw.chars().count() >= min_length {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "query must be at least {min_length} characters (or \"{MATCH_ALL}\")"
        )))
    }
}

async fn run_query(state: &AppState, raw: &str) -> Result<QueryResult, ApiError> {
    check_query_length(raw, state.config.query.min_length)?;
    let result = state.store.query(raw).await?;
    tracing::debug!(
        query = raw,
        matched = result.messages.len(),
        "processed query"
    );
    Ok(result)
}

/// Handler for `GET /`.
///
/// Renders the query form, the routing-key frequencies of the result and
/// the matching messages. Rejected or failed queries render the page with
/// a notice and no messages.
pub async fn index_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Response {
    let raw = params.q.as_str();
    tracing::info!(query = raw, "processing query");

    let (status, notice, result) = match run_query(&state, raw).await {
        Ok(result) => (StatusCode::OK, None, result),
        Err(e) => {
            tracing::info!(query = raw, error = %e, "query rejected");
            let notice = e.to_string();
            (e.into_response().status(), Some(notice), QueryResult::default())
        }
    };
    let frequencies = result.frequencies();

    let html = render_index(&IndexPage {
        created: Utc::now(),
        query: raw,
        notice,
        total_received: result.total_received,
        frequencies: &frequencies,
        messages: &result.messages,
        class_header: &state.config.ingest.class_header,
        indent_json: state.config.ingest.indent_json,
    });
    (status, Html(html)).into_response()
}

/// Handler for `GET /api/query`.
pub async fn query_json_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Result<Json<QueryResponse>, ApiError> {
    let result = run_query(&state, &params.q).await?;

    let frequencies = result.frequencies().into_iter().collect();
    let messages = result
        .messages
        .iter()
        .map(|m| MessageView::from(m.as_ref()))
        .collect();

    Ok(Json(QueryResponse {
        messages,
        frequencies,
        total_received: result.total_received,
        buffered: result.buffered,
    }))
}
