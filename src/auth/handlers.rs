use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            ChangePasswordRequest, DetailResponse, ListQuery, LoginRequest, LoginResponse, Page,
            ProfileUpdateRequest, RefreshRequest, RefreshResponse, RegisterRequest,
            RegisterResponse, StatusUpdateRequest, UserListItem, UserResponse,
        },
        extractors::{AdminUser, CurrentUser},
        services::AccountService,
    },
    error::ApiResult,
    extract::JsonBody,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/token/refresh", post(refresh))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/auth/profile",
            get(get_profile).put(put_profile).patch(patch_profile),
        )
        .route("/auth/change-password", post(change_password))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/admin/users", get(list_users))
        .route("/auth/admin/users/:id/status", patch(update_user_status))
}

#[instrument(skip(svc, payload))]
pub async fn register(
    State(svc): State<AccountService>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let res = svc.register(payload).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(svc, payload))]
pub async fn login(
    State(svc): State<AccountService>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    svc.login(payload).await.map(Json)
}

#[instrument(skip(svc, payload))]
pub async fn refresh(
    State(svc): State<AccountService>,
    JsonBody(payload): JsonBody<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    svc.refresh(payload).map(Json)
}

#[instrument(skip(user), fields(user_id = %user.id))]
pub async fn get_profile(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

#[instrument(skip(svc, user, payload), fields(user_id = %user.id))]
pub async fn put_profile(
    State(svc): State<AccountService>,
    CurrentUser(user): CurrentUser,
    JsonBody(payload): JsonBody<ProfileUpdateRequest>,
) -> ApiResult<Json<UserResponse>> {
    svc.update_profile(&user, payload, false).await.map(Json)
}

#[instrument(skip(svc, user, payload), fields(user_id = %user.id))]
pub async fn patch_profile(
    State(svc): State<AccountService>,
    CurrentUser(user): CurrentUser,
    JsonBody(payload): JsonBody<ProfileUpdateRequest>,
) -> ApiResult<Json<UserResponse>> {
    svc.update_profile(&user, payload, true).await.map(Json)
}

#[instrument(skip(svc, user, payload), fields(user_id = %user.id))]
pub async fn change_password(
    State(svc): State<AccountService>,
    CurrentUser(user): CurrentUser,
    JsonBody(payload): JsonBody<ChangePasswordRequest>,
) -> ApiResult<Json<DetailResponse>> {
    svc.change_password(&user, payload).await.map(Json)
}

#[instrument(skip(svc, admin), fields(admin_id = %admin.id))]
pub async fn list_users(
    State(svc): State<AccountService>,
    AdminUser(admin): AdminUser,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Page<UserListItem>>> {
    svc.list_users(q.page).await.map(Json)
}

#[instrument(skip(svc, admin, payload), fields(admin_id = %admin.id))]
pub async fn update_user_status(
    State(svc): State<AccountService>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<StatusUpdateRequest>,
) -> ApiResult<Json<UserListItem>> {
    svc.set_user_status(&admin, id, payload.is_active)
        .await
        .map(Json)
}
