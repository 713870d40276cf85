// SPDX-License-Identifier: Apache-2.0

//! The `success` envelope every response carries, success or failure,
//! so callers never infer outcome from the status code alone.

use crate::ApiError;
use serde::Serialize;
use serde_json::{json, Value};

#[must_use]
pub fn data_response(data: impl Serialize) -> Value {
    json!({
        "success": true,
        "data": serde_json::to_value(data).unwrap_or(Value::Null),
    })
}

#[must_use]
pub fn message_response(message: &str) -> Value {
    json!({
        "success": true,
        "message": message,
    })
}

/// Unpaginated collection envelope (`count` = returned items).
#[must_use]
pub fn list_response(data: impl Serialize, count: usize) -> Value {
    json!({
        "success": true,
        "count": count,
        "data": serde_json::to_value(data).unwrap_or(Value::Array(Vec::new())),
    })
}

/// Paginated collection envelope. `total` is the filtered set size, not
/// the page size.
#[must_use]
pub fn page_response(
    data: impl Serialize,
    count: usize,
    total: u64,
    page_size: u64,
    current_page: u64,
) -> Value {
    let total_pages = if page_size == 0 {
        0
    } else {
        total.div_ceil(page_size)
    };
    json!({
        "success": true,
        "count": count,
        "total": total,
        "totalPages": total_pages,
        "currentPage": current_page,
        "data": serde_json::to_value(data).unwrap_or(Value::Array(Vec::new())),
    })
}

#[must_use]
pub fn failure_response(error: &ApiError) -> Value {
    json!({
        "success": false,
        "message": error.message,
    })
}
