use crate::access::{ensure_admin, ensure_owner_or_admin, scope_filter};
use crate::auth::authenticate;
use crate::http::handlers::{envelope, failure, make_request_id, with_request_id};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use civicwatch_api::dto::{IssueDto, UpdateStatusBody};
use civicwatch_api::{params, responses, ApiError};
use civicwatch_model::{Category, IssueId, NewIssue, Priority};
use std::collections::HashMap;
use tracing::{info, warn};

struct CreateFields {
    title: String,
    description: String,
    category: String,
    coordinates: String,
    address: String,
    priority: Option<String>,
    image_name: String,
    image_bytes: Vec<u8>,
}

async fn collect_create_fields(mut multipart: Multipart) -> Result<CreateFields, ApiError> {
    let mut title = None;
    let mut description = None;
    let mut category = None;
    let mut coordinates = None;
    let mut address = None;
    let mut priority = None;
    let mut image: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => title = Some(read_text(field).await?),
            "description" => description = Some(read_text(field).await?),
            "category" => category = Some(read_text(field).await?),
            "coordinates" => coordinates = Some(read_text(field).await?),
            "address" => address = Some(read_text(field).await?),
            "priority" => priority = Some(read_text(field).await?),
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("invalid multipart body: {e}")))?;
                image = Some((file_name, bytes.to_vec()));
            }
            _ => {
                // Unknown parts are drained and ignored.
                let _ = field.bytes().await;
            }
        }
    }

    let (image_name, image_bytes) =
        image.ok_or_else(|| ApiError::validation("an image upload is required"))?;
    Ok(CreateFields {
        title: title.ok_or_else(|| ApiError::validation("title is required"))?,
        description: description
            .ok_or_else(|| ApiError::validation("description is required"))?,
        category: category.ok_or_else(|| ApiError::validation("category is required"))?,
        coordinates: coordinates
            .ok_or_else(|| ApiError::validation("coordinates are required"))?,
        address: address.ok_or_else(|| ApiError::validation("address is required"))?,
        priority: priority.filter(|raw| !raw.is_empty()),
        image_name,
        image_bytes,
    })
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::validation(format!("invalid multipart body: {e}")))
}

pub(crate) async fn create_issue_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let request_id = make_request_id(&state);
    let identity = match authenticate(&headers, &state.keys) {
        Ok(v) => v,
        Err(e) => return with_request_id(failure(&e), &request_id),
    };

    let fields = match collect_create_fields(multipart).await {
        Ok(v) => v,
        Err(e) => return with_request_id(failure(&e), &request_id),
    };
    if fields.image_bytes.len() > state.config.max_upload_bytes {
        let err = ApiError::validation("image exceeds the upload size limit");
        return with_request_id(failure(&err), &request_id);
    }
    let category = match Category::parse(&fields.category) {
        Ok(v) => v,
        Err(_) => {
            return with_request_id(failure(&ApiError::invalid_param("category")), &request_id);
        }
    };
    let location = match params::parse_coordinates(&fields.coordinates) {
        Ok(v) => v,
        Err(e) => return with_request_id(failure(&e), &request_id),
    };
    let priority = match fields.priority.as_deref().map(Priority::parse).transpose() {
        Ok(v) => v,
        Err(_) => {
            return with_request_id(failure(&ApiError::invalid_param("priority")), &request_id);
        }
    };

    // The image is on disk from here on; every failure before the record
    // exists must take it back out.
    let image = match state.images.save(&fields.image_name, &fields.image_bytes) {
        Ok(v) => v,
        Err(e) => return with_request_id(failure(&e), &request_id),
    };
    let new_issue = NewIssue {
        title: fields.title,
        description: fields.description,
        category,
        location,
        address: fields.address,
        priority,
        image: image.clone(),
        reported_by: identity.user,
    };
    match state.store.create_issue(new_issue).await {
        Ok(issue) => {
            info!(request_id = %request_id, issue_id = %issue.id.as_str(), "issue created");
            let payload = responses::data_response(IssueDto::from_issue(issue));
            with_request_id(envelope(StatusCode::CREATED, payload), &request_id)
        }
        Err(e) => {
            if let Err(cleanup) = state.images.delete(&image) {
                warn!(request_id = %request_id, image = %image, error = %cleanup,
                    "failed to remove orphaned image after create failure");
            }
            with_request_id(failure(&ApiError::from(e)), &request_id)
        }
    }
}

pub(crate) async fn list_issues_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let request_id = make_request_id(&state);
    let identity = match authenticate(&headers, &state.keys) {
        Ok(v) => v,
        Err(e) => return with_request_id(failure(&e), &request_id),
    };
    let list_params = match params::parse_list_params(&query) {
        Ok(v) => v,
        Err(e) => return with_request_id(failure(&e), &request_id),
    };
    let filter = scope_filter(&identity, list_params.filter);

    match state
        .store
        .list_issues(&filter, list_params.page, list_params.page_size)
        .await
    {
        Ok((rows, total)) => {
            let items: Vec<IssueDto> = rows.into_iter().map(IssueDto::from_row).collect();
            let payload = responses::page_response(
                &items,
                items.len(),
                total,
                list_params.page_size,
                list_params.page,
            );
            with_request_id(envelope(StatusCode::OK, payload), &request_id)
        }
        Err(e) => with_request_id(failure(&ApiError::from(e)), &request_id),
    }
}

pub(crate) async fn nearby_issues_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((longitude, latitude, distance)): Path<(String, String, String)>,
) -> Response {
    let request_id = make_request_id(&state);
    if let Err(e) = authenticate(&headers, &state.keys) {
        return with_request_id(failure(&e), &request_id);
    }
    let nearby = match params::parse_nearby_params(&longitude, &latitude, &distance) {
        Ok(v) => v,
        Err(e) => return with_request_id(failure(&e), &request_id),
    };

    match state
        .store
        .nearby_issues(nearby.center, nearby.radius_km)
        .await
    {
        Ok(hits) => {
            let items: Vec<IssueDto> = hits
                .into_iter()
                .map(|hit| IssueDto::from_row(hit.row))
                .collect();
            let payload = responses::list_response(&items, items.len());
            with_request_id(envelope(StatusCode::OK, payload), &request_id)
        }
        Err(e) => with_request_id(failure(&ApiError::from(e)), &request_id),
    }
}

pub(crate) async fn issue_stats_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let request_id = make_request_id(&state);
    let identity = match authenticate(&headers, &state.keys) {
        Ok(v) => v,
        Err(e) => return with_request_id(failure(&e), &request_id),
    };
    if let Err(e) = ensure_admin(&identity) {
        return with_request_id(failure(&e), &request_id);
    }

    match state.store.issue_stats().await {
        Ok(stats) => with_request_id(
            envelope(StatusCode::OK, responses::data_response(stats)),
            &request_id,
        ),
        Err(e) => with_request_id(failure(&ApiError::from(e)), &request_id),
    }
}

pub(crate) async fn update_status_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusBody>, JsonRejection>,
) -> Response {
    let request_id = make_request_id(&state);
    let identity = match authenticate(&headers, &state.keys) {
        Ok(v) => v,
        Err(e) => return with_request_id(failure(&e), &request_id),
    };
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => {
            let err = ApiError::validation(rejection.body_text());
            return with_request_id(failure(&err), &request_id);
        }
    };
    let update = match body.parse() {
        Ok(v) => v,
        Err(e) => return with_request_id(failure(&e), &request_id),
    };
    let issue_id = match IssueId::parse(&id) {
        Ok(v) => v,
        Err(_) => return with_request_id(failure(&ApiError::invalid_param("id")), &request_id),
    };

    // Existence before authorization: a missing issue is not-found for
    // everyone, admin or not.
    match state.store.get_issue(&issue_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return with_request_id(failure(&ApiError::not_found("Issue not found")), &request_id);
        }
        Err(e) => return with_request_id(failure(&ApiError::from(e)), &request_id),
    }
    if let Err(e) = ensure_admin(&identity) {
        return with_request_id(failure(&e), &request_id);
    }

    match state.store.update_issue_status(&issue_id, &update).await {
        Ok(Some(issue)) => {
            info!(request_id = %request_id, issue_id = %issue.id.as_str(),
                status = issue.status.as_str(), "issue status updated");
            let payload = responses::data_response(IssueDto::from_issue(issue));
            with_request_id(envelope(StatusCode::OK, payload), &request_id)
        }
        Ok(None) => with_request_id(failure(&ApiError::not_found("Issue not found")), &request_id),
        Err(e) => with_request_id(failure(&ApiError::from(e)), &request_id),
    }
}

pub(crate) async fn get_issue_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let request_id = make_request_id(&state);
    let identity = match authenticate(&headers, &state.keys) {
        Ok(v) => v,
        Err(e) => return with_request_id(failure(&e), &request_id),
    };
    let issue_id = match IssueId::parse(&id) {
        Ok(v) => v,
        Err(_) => return with_request_id(failure(&ApiError::invalid_param("id")), &request_id),
    };

    let row = match state.store.get_issue(&issue_id).await {
        Ok(Some(row)) => row,
        Ok(None) => {
            return with_request_id(failure(&ApiError::not_found("Issue not found")), &request_id);
        }
        Err(e) => return with_request_id(failure(&ApiError::from(e)), &request_id),
    };
    if let Err(e) = ensure_owner_or_admin(&identity, &row.issue.reported_by) {
        return with_request_id(failure(&e), &request_id);
    }

    let payload = responses::data_response(IssueDto::from_row(row));
    with_request_id(envelope(StatusCode::OK, payload), &request_id)
}

pub(crate) async fn delete_issue_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let request_id = make_request_id(&state);
    let identity = match authenticate(&headers, &state.keys) {
        Ok(v) => v,
        Err(e) => return with_request_id(failure(&e), &request_id),
    };
    let issue_id = match IssueId::parse(&id) {
        Ok(v) => v,
        Err(_) => return with_request_id(failure(&ApiError::invalid_param("id")), &request_id),
    };

    let row = match state.store.get_issue(&issue_id).await {
        Ok(Some(row)) => row,
        Ok(None) => {
            return with_request_id(failure(&ApiError::not_found("Issue not found")), &request_id);
        }
        Err(e) => return with_request_id(failure(&ApiError::from(e)), &request_id),
    };
    if let Err(e) = ensure_owner_or_admin(&identity, &row.issue.reported_by) {
        return with_request_id(failure(&e), &request_id);
    }

    // Image first, record second; a failed image removal is surfaced in
    // the log but never blocks the record deletion.
    if let Err(e) = state.images.delete(&row.issue.image) {
        warn!(request_id = %request_id, image = %row.issue.image, error = %e,
            "failed to remove image for deleted issue");
    }
    match state.store.delete_issue(&issue_id).await {
        Ok(true) => {
            info!(request_id = %request_id, issue_id = %issue_id.as_str(), "issue deleted");
            with_request_id(
                envelope(
                    StatusCode::OK,
                    responses::message_response("Issue deleted successfully"),
                ),
                &request_id,
            )
        }
        Ok(false) => {
            with_request_id(failure(&ApiError::not_found("Issue not found")), &request_id)
        }
        Err(e) => with_request_id(failure(&ApiError::from(e)), &request_id),
    }
}
