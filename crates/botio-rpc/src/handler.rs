//! Gateway request handlers.

use crate::gateway::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use botio_core::{BotCommand, BotCommands, BotioError, CallContext, Command, Empty, ErrorKind};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Error body returned by every failing route.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: ErrorKind,
    pub message: String,
}

/// A [`BotioError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub BotioError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Canceled => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BotioError> for ApiError {
    fn from(err: BotioError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(BotioError::invalid_argument("body", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.0.kind(),
            message: self.0.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn call_context(state: &AppState) -> CallContext {
    CallContext::with_token(state.shutdown.child_token())
}

/// Health check, open to unauthenticated callers.
pub async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

pub async fn list_commands(State(state): State<Arc<AppState>>) -> ApiResult<BotCommands> {
    let commands = state.service.list_commands(&call_context(&state)).await?;
    Ok(Json(BotCommands::from(commands)))
}

pub async fn get_command(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<BotCommand> {
    let command = state.service.get_command(&call_context(&state), &name).await?;
    Ok(Json(command.into()))
}

pub async fn add_command(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BotCommand>, JsonRejection>,
) -> ApiResult<Empty> {
    let Json(body) = body?;
    state
        .service
        .add_command(&call_context(&state), Command::from(body))
        .await?;
    Ok(Json(Empty {}))
}

pub async fn update_command(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BotCommand>, JsonRejection>,
) -> ApiResult<Empty> {
    let Json(body) = body?;
    state
        .service
        .update_command(&call_context(&state), Command::from(body))
        .await?;
    Ok(Json(Empty {}))
}

/// `PUT /api/commands/{command}`: the path names the command.
pub async fn update_named_command(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Result<Json<BotCommand>, JsonRejection>,
) -> ApiResult<Empty> {
    let Json(body) = body?;
    state
        .service
        .update_command(&call_context(&state), Command::new(name, body.resp.text))
        .await?;
    Ok(Json(Empty {}))
}

pub async fn delete_command(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Empty> {
    state
        .service
        .delete_command(&call_context(&state), &name)
        .await?;
    Ok(Json(Empty {}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (BotioError::NotFound { name: "x".into() }, StatusCode::NOT_FOUND),
            (BotioError::invalid_argument("name", "empty"), StatusCode::BAD_REQUEST),
            (
                BotioError::Unauthenticated {
                    message: "missing token".into(),
                },
                StatusCode::UNAUTHORIZED,
            ),
            (BotioError::Canceled, StatusCode::SERVICE_UNAVAILABLE),
            (BotioError::Other("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[test]
    fn test_wrapped_error_keeps_status() {
        let err = BotioError::NotFound { name: "x".into() }.context("while getting command");
        assert_eq!(ApiError(err).status(), StatusCode::NOT_FOUND);
    }
}
