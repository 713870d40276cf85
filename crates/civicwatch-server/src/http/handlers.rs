use crate::AppState;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use civicwatch_api::{responses, status_for, ApiError};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;

pub(crate) fn make_request_id(state: &AppState) -> String {
    let id = state.request_id_seed.fetch_add(1, Ordering::Relaxed);
    format!("req-{id:016x}")
}

pub(crate) fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(v) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert("x-request-id", v);
    }
    response
}

pub(crate) fn envelope(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

pub(crate) fn failure(error: &ApiError) -> Response {
    let status =
        StatusCode::from_u16(status_for(error)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    envelope(status, responses::failure_response(error))
}

pub(crate) async fn root_handler() -> Response {
    envelope(
        StatusCode::OK,
        json!({
            "success": true,
            "message": "CivicWatch issue reporting API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "auth": "/api/auth",
                "issues": "/api/issues"
            }
        }),
    )
}

pub(crate) async fn healthz_handler() -> Response {
    (StatusCode::OK, "ok").into_response()
}
