use crate::auth::{authenticate, hash_password, verify_password};
use crate::http::handlers::{envelope, failure, make_request_id, with_request_id};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use civicwatch_api::dto::{LoginBody, RegisterBody, UserDto};
use civicwatch_api::{responses, ApiError};
use civicwatch_model::{NewUser, Role};
use serde_json::json;
use tracing::info;

const MIN_PASSWORD_LEN: usize = 6;

pub(crate) async fn register_handler(
    State(state): State<AppState>,
    body: Result<Json<RegisterBody>, JsonRejection>,
) -> Response {
    let request_id = make_request_id(&state);
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => {
            let err = ApiError::validation(rejection.body_text());
            return with_request_id(failure(&err), &request_id);
        }
    };

    if body.name.trim().is_empty() {
        return with_request_id(failure(&ApiError::validation("name is required")), &request_id);
    }
    if !body.email.contains('@') {
        return with_request_id(
            failure(&ApiError::validation("a valid email is required")),
            &request_id,
        );
    }
    if body.password.chars().count() < MIN_PASSWORD_LEN {
        return with_request_id(
            failure(&ApiError::validation("password must be at least 6 characters")),
            &request_id,
        );
    }

    let password_hash = match hash_password(&body.password) {
        Ok(v) => v,
        Err(e) => return with_request_id(failure(&e), &request_id),
    };
    let created = state
        .store
        .create_user(NewUser {
            name: body.name.trim().to_string(),
            email: body.email.trim().to_string(),
            phone: body.phone.trim().to_string(),
            role: Role::Citizen,
            password_hash,
        })
        .await;
    let user = match created {
        Ok(v) => v,
        Err(e) => return with_request_id(failure(&ApiError::from(e)), &request_id),
    };

    let token = match state.keys.issue(&user, state.config.token_ttl) {
        Ok(v) => v,
        Err(e) => return with_request_id(failure(&e), &request_id),
    };
    info!(request_id = %request_id, email = %user.email, "user registered");
    let payload = responses::data_response(json!({
        "token": token,
        "user": UserDto::from(user),
    }));
    with_request_id(envelope(StatusCode::CREATED, payload), &request_id)
}

pub(crate) async fn login_handler(
    State(state): State<AppState>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Response {
    let request_id = make_request_id(&state);
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => {
            let err = ApiError::validation(rejection.body_text());
            return with_request_id(failure(&err), &request_id);
        }
    };

    let user = match state.store.find_user_by_email(&body.email).await {
        Ok(Some(user)) if verify_password(&body.password, &user.password_hash) => user,
        Ok(_) => {
            return with_request_id(
                failure(&ApiError::unauthenticated("invalid credentials")),
                &request_id,
            );
        }
        Err(e) => return with_request_id(failure(&ApiError::from(e)), &request_id),
    };

    let token = match state.keys.issue(&user, state.config.token_ttl) {
        Ok(v) => v,
        Err(e) => return with_request_id(failure(&e), &request_id),
    };
    info!(request_id = %request_id, email = %user.email, "user logged in");
    let payload = responses::data_response(json!({
        "token": token,
        "user": UserDto::from(user),
    }));
    with_request_id(envelope(StatusCode::OK, payload), &request_id)
}

pub(crate) async fn me_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let request_id = make_request_id(&state);
    let identity = match authenticate(&headers, &state.keys) {
        Ok(v) => v,
        Err(e) => return with_request_id(failure(&e), &request_id),
    };
    match state.store.find_user_by_id(&identity.user).await {
        Ok(Some(user)) => with_request_id(
            envelope(
                StatusCode::OK,
                responses::data_response(UserDto::from(user)),
            ),
            &request_id,
        ),
        Ok(None) => with_request_id(
            failure(&ApiError::unauthenticated("account no longer exists")),
            &request_id,
        ),
        Err(e) => with_request_id(failure(&ApiError::from(e)), &request_id),
    }
}
