//! Category endpoints, scoped to the caller or an impersonated user.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::db::{self, Category, CreateCategoryRequest, IdRequest, UpdateCategoryRequest, User};
use crate::AppState;

use super::error::{ApiError, DbResultExt, ValidationErrorBuilder};
use super::extract::{JsonBody, QueryParams};
use super::scope::{effective_owner_id, ScopeQuery};
use super::validation::{validate_text, MAX_NAME_LEN};

const DUPLICATE_NAME: &str = "Category name must be unique per user";

fn validate_name(name: &str) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_text(name, "Name", MAX_NAME_LEN));
    errors.finish()
}

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    user: User,
    QueryParams(scope): QueryParams<ScopeQuery>,
) -> Result<Json<Vec<Category>>, ApiError> {
    let owner_id = effective_owner_id(&user, scope.as_user_id.as_deref());
    let categories = db::list_categories(&state.db, &owner_id)
        .await
        .db_context("list_categories", &owner_id)?;
    Ok(Json(categories))
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    user: User,
    QueryParams(scope): QueryParams<ScopeQuery>,
    JsonBody(req): JsonBody<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    validate_name(&req.name)?;
    let owner_id = effective_owner_id(&user, scope.as_user_id.as_deref());

    let category = db::insert_category(&state.db, &owner_id, req.name.trim())
        .await
        .db_context("create_category", &owner_id)
        .map_err(|e| e.on_conflict(DUPLICATE_NAME))?;

    tracing::info!(category_id = %category.id, owner_id = %owner_id, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<Arc<AppState>>,
    user: User,
    QueryParams(scope): QueryParams<ScopeQuery>,
    JsonBody(req): JsonBody<UpdateCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    if req.id.is_empty() {
        return Err(ApiError::bad_request("ID and name are required"));
    }
    validate_name(&req.name)?;
    let owner_id = effective_owner_id(&user, scope.as_user_id.as_deref());

    let category = db::update_category(&state.db, &owner_id, &req.id, req.name.trim())
        .await
        .db_context("update_category", &req.id)
        .map_err(|e| e.on_conflict(DUPLICATE_NAME))?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    user: User,
    QueryParams(scope): QueryParams<ScopeQuery>,
    JsonBody(req): JsonBody<IdRequest>,
) -> Result<StatusCode, ApiError> {
    let owner_id = effective_owner_id(&user, scope.as_user_id.as_deref());

    let deleted = db::delete_category(&state.db, &owner_id, &req.id)
        .await
        .db_context("delete_category", &req.id)?;
    if !deleted {
        return Err(ApiError::not_found("Category not found"));
    }

    tracing::info!(category_id = %req.id, owner_id = %owner_id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}
