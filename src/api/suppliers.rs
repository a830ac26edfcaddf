//! Supplier endpoints, scoped to the caller or an impersonated user.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::db::{self, Supplier, CreateSupplierRequest, IdRequest, UpdateSupplierRequest, User};
use crate::AppState;

use super::error::{ApiError, DbResultExt, ValidationErrorBuilder};
use super::extract::{JsonBody, QueryParams};
use super::scope::{effective_owner_id, ScopeQuery};
use super::validation::{validate_text, MAX_NAME_LEN};

const DUPLICATE_NAME: &str = "Supplier name must be unique per user";

fn validate_name(name: &str) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_text(name, "Name", MAX_NAME_LEN));
    errors.finish()
}

pub async fn list_suppliers(
    State(state): State<Arc<AppState>>,
    user: User,
    QueryParams(scope): QueryParams<ScopeQuery>,
) -> Result<Json<Vec<Supplier>>, ApiError> {
    let owner_id = effective_owner_id(&user, scope.as_user_id.as_deref());
    let suppliers = db::list_suppliers(&state.db, &owner_id)
        .await
        .db_context("list_suppliers", &owner_id)?;
    Ok(Json(suppliers))
}

pub async fn create_supplier(
    State(state): State<Arc<AppState>>,
    user: User,
    QueryParams(scope): QueryParams<ScopeQuery>,
    JsonBody(req): JsonBody<CreateSupplierRequest>,
) -> Result<(StatusCode, Json<Supplier>), ApiError> {
    validate_name(&req.name)?;
    let owner_id = effective_owner_id(&user, scope.as_user_id.as_deref());

    let supplier = db::insert_supplier(&state.db, &owner_id, req.name.trim())
        .await
        .db_context("create_supplier", &owner_id)
        .map_err(|e| e.on_conflict(DUPLICATE_NAME))?;

    tracing::info!(supplier_id = %supplier.id, owner_id = %owner_id, "Supplier created");
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn update_supplier(
    State(state): State<Arc<AppState>>,
    user: User,
    QueryParams(scope): QueryParams<ScopeQuery>,
    JsonBody(req): JsonBody<UpdateSupplierRequest>,
) -> Result<Json<Supplier>, ApiError> {
    if req.id.is_empty() {
        return Err(ApiError::bad_request("ID and name are required"));
    }
    validate_name(&req.name)?;
    let owner_id = effective_owner_id(&user, scope.as_user_id.as_deref());

    let supplier = db::update_supplier(&state.db, &owner_id, &req.id, req.name.trim())
        .await
        .db_context("update_supplier", &req.id)
        .map_err(|e| e.on_conflict(DUPLICATE_NAME))?
        .ok_or_else(|| ApiError::not_found("Supplier not found"))?;

    Ok(Json(supplier))
}

pub async fn delete_supplier(
    State(state): State<Arc<AppState>>,
    user: User,
    QueryParams(scope): QueryParams<ScopeQuery>,
    JsonBody(req): JsonBody<IdRequest>,
) -> Result<StatusCode, ApiError> {
    let owner_id = effective_owner_id(&user, scope.as_user_id.as_deref());

    let deleted = db::delete_supplier(&state.db, &owner_id, &req.id)
        .await
        .db_context("delete_supplier", &req.id)?;
    if !deleted {
        return Err(ApiError::not_found("Supplier not found"));
    }

    tracing::info!(supplier_id = %req.id, owner_id = %owner_id, "Supplier deleted");
    Ok(StatusCode::NO_CONTENT)
}
