//! Replenishment request endpoints.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::db::{self, CreateRequestError, CreateRequestRequest, RequestDetail, User};
use crate::AppState;

use super::error::{ApiError, DbResultExt, ValidationErrorBuilder};
use super::extract::{JsonBody, QueryParams};
use super::scope::{effective_owner_id, ScopeQuery};
use super::validation::{
    validate_optional_text, validate_positive_quantity, validate_text, validate_uuid,
    MAX_ITEM_NOTES_LEN, MAX_NOTES_LEN, MAX_TITLE_LEN,
};

fn validate_create_request(req: &CreateRequestRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(title) = req.title.as_deref() {
        errors.check("title", validate_text(title, "Title", MAX_TITLE_LEN));
    }
    errors.check("notes", validate_optional_text(req.notes.as_deref(), "Notes", MAX_NOTES_LEN));

    if req.items.is_empty() {
        errors.add("items", "At least one item is required");
    }

    for (i, item) in req.items.iter().enumerate() {
        errors.check(
            &format!("items[{}].productId", i),
            validate_uuid(&item.product_id, "productId"),
        );
        errors.check(
            &format!("items[{}].quantity", i),
            validate_positive_quantity(item.quantity),
        );
        errors.check(
            &format!("items[{}].notes", i),
            validate_optional_text(item.notes.as_deref(), "Item notes", MAX_ITEM_NOTES_LEN),
        );
    }

    errors.finish()
}

pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    user: User,
    QueryParams(scope): QueryParams<ScopeQuery>,
) -> Result<Json<Vec<RequestDetail>>, ApiError> {
    let owner_id = effective_owner_id(&user, scope.as_user_id.as_deref());
    let requests = db::list_requests(&state.db, &owner_id)
        .await
        .db_context("list_requests", &owner_id)?;
    Ok(Json(requests))
}

/// Create a request with its items. Either every item is stored or none.
pub async fn create_request(
    State(state): State<Arc<AppState>>,
    user: User,
    QueryParams(scope): QueryParams<ScopeQuery>,
    JsonBody(req): JsonBody<CreateRequestRequest>,
) -> Result<(StatusCode, Json<RequestDetail>), ApiError> {
    validate_create_request(&req)?;

    let target = req.as_user_id.as_deref().or(scope.as_user_id.as_deref());
    let owner_id = effective_owner_id(&user, target);

    let request_id = db::create_request(
        &state.db,
        &owner_id,
        &user.id,
        req.title.as_deref().map(str::trim),
        req.notes.as_deref(),
        &req.items,
    )
    .await
    .map_err(|e| match e {
        CreateRequestError::ProductNotFound => ApiError::not_found("One or more products were not found"),
        CreateRequestError::Database(err) => ApiError::from_db(err, "create_request", &owner_id),
    })?;

    let detail = db::find_request(&state.db, &owner_id, &request_id)
        .await
        .db_context("load_request", &request_id)?
        .ok_or_else(|| ApiError::internal("Request vanished after creation"))?;

    tracing::info!(
        request_id = %request_id,
        owner_id = %owner_id,
        created_by = %user.id,
        items = detail.items.len(),
        "Request submitted"
    );
    Ok((StatusCode::CREATED, Json(detail)))
}
