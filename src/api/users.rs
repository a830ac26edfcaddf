//! Admin-only account management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{self, CreateUserRequest, UpdateUserRequest, UserResponse, UserRole};
use crate::AppState;

use super::auth::{create_account, AdminUser};
use super::error::{ApiError, DbResultExt, ValidationErrorBuilder};
use super::extract::JsonBody;
use super::validation::{validate_email, validate_password, validate_text, MAX_NAME_LEN};

const DUPLICATE_EMAIL: &str = "User already exists";

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = db::list_users(&state.db)
        .await
        .db_context("list_users", "*")?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    JsonBody(req): JsonBody<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_text(&req.name, "Name", MAX_NAME_LEN));
    errors.check("email", validate_email(&req.email));
    errors.check("password", validate_password(&req.password));
    errors.finish()?;

    if db::find_user_by_email(&state.db, &req.email).await?.is_some() {
        return Err(ApiError::conflict(DUPLICATE_EMAIL));
    }

    let role = req.role.unwrap_or(UserRole::User);
    let user = create_account(&state.db, req.name.trim(), &req.email, &req.password, role)
        .await
        .map_err(|e| e.on_conflict(DUPLICATE_EMAIL))?;

    tracing::info!(
        user_id = %user.id,
        role = %user.role,
        created_by = %admin.id,
        "User created by admin"
    );
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if let Some(name) = req.name.as_deref() {
        validate_text(name, "Name", MAX_NAME_LEN)
            .map_err(|msg| ApiError::validation_field("name", msg))?;
    }

    // No way back in once the last admin has demoted themselves
    if id == admin.id && matches!(req.role, Some(role) if !role.is_admin()) {
        return Err(ApiError::bad_request("You cannot remove your own admin role"));
    }

    let updated = db::update_user(&state.db, &id, req.name.as_deref().map(str::trim), req.role)
        .await
        .db_context("update_user", &id)?;
    if updated == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    let user = db::find_user_by_id(&state.db, &id)
        .await
        .db_context("load_user", &id)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!(user_id = %user.id, role = %user.role, updated_by = %admin.id, "User updated");
    Ok(Json(UserResponse::from(user)))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if id == admin.id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let deleted = db::delete_user(&state.db, &id)
        .await
        .db_context("delete_user", &id)?;
    if deleted == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(user_id = %id, deleted_by = %admin.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
