//! Authentication endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        response::{ApiResponse, LoginEnvelope, UserEnvelope},
        user::{LoginRequest, LoginResponse, RegisterRequest, UserInfo},
    },
    AppState,
};

use super::{invalid_input, AuthenticatedUser};

/// Register a new account
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = UserEnvelope),
        (status = 400, description = "Invalid request body"),
        (status = 409, description = "Username already exists")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserInfo>>)> {
    let Json(req) = body.map_err(|e| invalid_input("Invalid request body", e))?;

    let user = state.services.users.register(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("User registered successfully", user)),
    ))
}

/// Log in and obtain a bearer token
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginEnvelope),
        (status = 401, description = "Invalid username or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let Json(req) = body.map_err(|e| invalid_input("Invalid request body", e))?;

    let response = state.services.users.login(req).await?;
    Ok(Json(ApiResponse::ok("Login successful", response)))
}

/// Profile of the authenticated user
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserEnvelope),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ApiResponse<UserInfo>>> {
    let user = state.services.users.get_by_id(claims.user_id).await?;
    Ok(Json(ApiResponse::ok("User retrieved successfully", user)))
}
