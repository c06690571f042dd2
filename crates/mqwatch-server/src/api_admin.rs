//! Buffer administration handlers: bulk export and control commands.

use crate::{api::ApiError, AppState};
use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Control commands understood by `POST /api/control/{command}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Empty the message buffer.
    Clear,
}

impl std::str::FromStr for ControlCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clear" => Ok(Self::Clear),
            other => Err(other.to_string()),
        }
    }
}

/// Handler for `GET /api/dump`.
///
/// Returns every buffered message body, oldest first, as one JSON array.
/// Bodies are already compact JSON, so they are spliced in verbatim.
pub async fn dump_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let messages = state.store.dump().await?;

    let size = messages.iter().map(|m| m.body.len() + 1).sum::<usize>() + 2;
    let mut body = Vec::with_capacity(size);
    body.push(b'[');
    for (i, message) in messages.iter().enumerate() {
        if i > 0 {
            body.push(b',');
        }
        body.extend_from_slice(&message.body);
    }
    body.push(b']');

    tracing::info!(count = messages.len(), bytes = body.len(), "dumped message buffer");
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// Handler for `POST /api/control/{command}`.
///
/// `clear` empties the buffer and answers `204 No Content`. Unknown commands
/// are logged and answered `202 Accepted` without further effect.
pub async fn control_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(command): Path<String>,
) -> Result<StatusCode, ApiError> {
    match command.parse::<ControlCommand>() {
        Ok(ControlCommand::Clear) => {
            state.store.clear().await?;
            Ok(StatusCode::NO_CONTENT)
        }
        Err(unknown) => {
            tracing::warn!(command = %unknown, "ignoring unknown control command");
            Ok(StatusCode::ACCEPTED)
        }
    }
}
