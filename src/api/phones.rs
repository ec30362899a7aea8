//! Pass-through routes to the external product API.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tracing::{error, warn};

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::phones::{is_valid_product_id, ProxyMethod, UpstreamResponse};

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/phones", get(list_phones).post(create_phone))
        .route(
            "/api/phones/:id",
            get(get_phone).put(update_phone).delete(delete_phone),
        )
}

fn upstream(status: StatusCode, message: &str) -> ApiError {
    ApiError::Upstream {
        status,
        message: message.to_string(),
    }
}

/// Translate an upstream reply into the proxy's response.
///
/// 404 and 405 pass through, any other failure is a 500, an empty success is
/// 204, and a JSON success is relayed untouched.
pub fn map_upstream(reply: UpstreamResponse) -> ApiResult<Response> {
    match reply.status {
        404 => Err(upstream(StatusCode::NOT_FOUND, "Product not found")),
        405 => Err(upstream(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")),
        _ if !reply.is_success() => Err(upstream(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
        )),
        _ if reply.body.trim().is_empty() => Ok(StatusCode::NO_CONTENT.into_response()),
        _ => {
            let value: Value = serde_json::from_str(&reply.body).map_err(|err| {
                warn!(?err, "phones API returned a non-JSON body");
                upstream(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            })?;
            Ok((StatusCode::OK, Json(value)).into_response())
        }
    }
}

async fn forward(
    state: &AppState,
    method: ProxyMethod,
    id: Option<&str>,
    body: Option<&Value>,
) -> ApiResult<Response> {
    let Some(client) = state.phones.as_ref() else {
        return Err(upstream(
            StatusCode::INTERNAL_SERVER_ERROR,
            "API URL not defined",
        ));
    };
    if let Some(id) = id {
        if !is_valid_product_id(id) {
            return Err(ApiError::Parse("Invalid product id.".into()));
        }
    }
    let reply = client.forward(method, id, body).await.map_err(|err| {
        error!(?err, method = method.as_str(), "phones API request failed");
        upstream(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    })?;
    map_upstream(reply)
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> ApiResult<Value> {
    body.map(|Json(v)| v)
        .map_err(|_| ApiError::Parse("Invalid request body.".into()))
}

async fn list_phones(State(state): State<AppState>) -> ApiResult<Response> {
    forward(&state, ProxyMethod::Get, None, None).await
}

async fn create_phone(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Response> {
    let body = json_body(body)?;
    forward(&state, ProxyMethod::Post, None, Some(&body)).await
}

async fn get_phone(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Response> {
    forward(&state, ProxyMethod::Get, Some(&id), None).await
}

async fn update_phone(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Response> {
    let body = json_body(body)?;
    forward(&state, ProxyMethod::Put, Some(&id), Some(&body)).await
}

async fn delete_phone(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    forward(&state, ProxyMethod::Delete, Some(&id), None).await
}
