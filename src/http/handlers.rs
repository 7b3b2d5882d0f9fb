//! Axum HTTP handlers for the tool endpoints
//!
//! Each handler validates its input, makes one dispatcher call and maps the
//! outcome onto a JSON response.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    Json,
};
use serde_json::Value;
use tracing::error;

use crate::dispatcher::ToolArguments;
use crate::errors::AppError;
use crate::AppState;

#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocationRequest {
    pub name: String,
    pub arguments: ToolArguments,
}

impl ToolInvocationRequest {
    pub fn from_body(body: &[u8]) -> Result<Self, AppError> {
        let payload: Value = serde_json::from_slice(body)
            .map_err(|_| AppError::bad_request("invalid_json", "Invalid JSON body"))?;

        let name = payload
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::bad_request("missing_tool_name", "Tool name is required"))?
            .to_string();

        let arguments = match payload.get("arguments") {
            None | Some(Value::Null) => ToolArguments::new(),
            Some(Value::Object(arguments)) => arguments.clone(),
            Some(_) => {
                return Err(AppError::bad_request(
                    "invalid_arguments",
                    "arguments must be an object",
                ))
            }
        };

        Ok(Self { name, arguments })
    }
}

pub async fn call_tool(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Vec<Value>>, AppError> {
    let body = body.map_err(AppError::from_body_rejection)?;
    let request = ToolInvocationRequest::from_body(&body)?;

    let results = state
        .dispatcher
        .invoke(&request.name, request.arguments)
        .await
        .map_err(|err| {
            error!(tool = %request.name, error = %err, "tool invocation failed");
            AppError::from_invocation(err)
        })?;

    Ok(Json(flatten_records(results.as_slice(), "tool result")?))
}

pub async fn list_tools(State(state): State<AppState>) -> Result<Json<Vec<Value>>, AppError> {
    let tools = state.dispatcher.list().await.map_err(|err| {
        error!(error = %err, "tool listing failed");
        AppError::from_listing(err)
    })?;

    Ok(Json(flatten_records(tools.as_slice(), "tool descriptor")?))
}

fn flatten_records<T: serde::Serialize>(
    records: &[T],
    kind: &'static str,
) -> Result<Vec<Value>, AppError> {
    records
        .iter()
        .map(|record| {
            serde_json::to_value(record).map_err(|err| {
                error!(record = kind, error = %err, "failed to serialize dispatcher record");
                AppError::internal("serialization_failed", format!("failed to serialize {kind}"))
            })
        })
        .collect()
}
