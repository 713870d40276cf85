// SPDX-License-Identifier: Apache-2.0

use crate::{ApiError, ApiErrorCode};

/// HTTP status for an error. Kept as a plain `u16` so this crate stays
/// free of any HTTP framework types.
#[must_use]
pub fn status_for(error: &ApiError) -> u16 {
    match error.code {
        ApiErrorCode::Validation => 400,
        ApiErrorCode::Unauthenticated => 401,
        ApiErrorCode::Forbidden => 403,
        ApiErrorCode::NotFound => 404,
        ApiErrorCode::Internal => 500,
    }
}
