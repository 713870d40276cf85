// SPDX-License-Identifier: Apache-2.0

use crate::ApiError;
use civicwatch_model::{Category, GeoPoint, Priority, Status};
use civicwatch_store::IssueFilter;
use std::collections::HashMap;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct ListIssuesParams {
    pub filter: IssueFilter,
    pub page: u64,
    pub page_size: u64,
}

/// Parses the list query string. Unknown values for the enum filters and
/// non-numeric `page`/`limit` are rejected rather than coerced.
pub fn parse_list_params(query: &HashMap<String, String>) -> Result<ListIssuesParams, ApiError> {
    let status = query
        .get("status")
        .map(|raw| Status::parse(raw).map_err(|_| ApiError::invalid_param("status")))
        .transpose()?;
    let category = query
        .get("category")
        .map(|raw| Category::parse(raw).map_err(|_| ApiError::invalid_param("category")))
        .transpose()?;
    let priority = query
        .get("priority")
        .map(|raw| Priority::parse(raw).map_err(|_| ApiError::invalid_param("priority")))
        .transpose()?;

    let page = match query.get("page") {
        Some(raw) => {
            let value = raw
                .parse::<u64>()
                .map_err(|_| ApiError::invalid_param("page"))?;
            if value == 0 {
                return Err(ApiError::invalid_param("page"));
            }
            value
        }
        None => 1,
    };
    let page_size = match query.get("limit") {
        Some(raw) => {
            let value = raw
                .parse::<u64>()
                .map_err(|_| ApiError::invalid_param("limit"))?;
            if value == 0 || value > MAX_PAGE_SIZE {
                return Err(ApiError::invalid_param("limit"));
            }
            value
        }
        None => DEFAULT_PAGE_SIZE,
    };

    Ok(ListIssuesParams {
        filter: IssueFilter {
            status,
            category,
            priority,
            reported_by: None,
        },
        page,
        page_size,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyParams {
    pub center: GeoPoint,
    pub radius_km: f64,
}

/// Parses the `/nearby/:longitude/:latitude/:distance` path segments.
pub fn parse_nearby_params(
    longitude: &str,
    latitude: &str,
    distance: &str,
) -> Result<NearbyParams, ApiError> {
    let longitude = longitude
        .parse::<f64>()
        .map_err(|_| ApiError::invalid_param("longitude"))?;
    let latitude = latitude
        .parse::<f64>()
        .map_err(|_| ApiError::invalid_param("latitude"))?;
    let center = GeoPoint::new(longitude, latitude)
        .map_err(|e| ApiError::validation(e.to_string()))?;
    let radius_km = distance
        .parse::<f64>()
        .map_err(|_| ApiError::invalid_param("distance"))?;
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(ApiError::invalid_param("distance"));
    }
    Ok(NearbyParams { center, radius_km })
}

/// Parses the multipart `coordinates` field: a JSON array of exactly two
/// finite numbers, `[longitude, latitude]`.
pub fn parse_coordinates(raw: &str) -> Result<GeoPoint, ApiError> {
    let values: Vec<f64> = serde_json::from_str(raw)
        .map_err(|_| ApiError::validation("invalid coordinates format"))?;
    if values.len() != 2 {
        return Err(ApiError::validation(
            "coordinates must be [longitude, latitude]",
        ));
    }
    GeoPoint::new(values[0], values[1]).map_err(|e| ApiError::validation(e.to_string()))
}
