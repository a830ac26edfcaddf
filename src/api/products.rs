//! Product endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    self, CreateProductRequest, IdRequest, Product, ProductFields, UpdateProductRequest, User,
    DEFAULT_PRODUCT_STATUS,
};
use crate::AppState;

use super::error::{ApiError, DbResultExt, ValidationErrorBuilder};
use super::extract::{JsonBody, QueryParams};
use super::scope::{effective_owner_id, ScopeQuery};
use super::validation::{
    validate_amount, validate_optional_text, validate_stock_quantity, validate_text,
    MAX_PRODUCT_NAME_LEN, MAX_SKU_LEN, MAX_STATUS_LEN,
};

const DUPLICATE_SKU: &str = "SKU must be unique";

/// Borrowed view over the create and update bodies
struct ProductInput<'a> {
    name: &'a str,
    sku: &'a str,
    price: f64,
    quantity: i64,
    status: Option<&'a str>,
    category_id: Option<&'a str>,
    supplier_id: Option<&'a str>,
}

impl<'a> From<&'a CreateProductRequest> for ProductInput<'a> {
    fn from(req: &'a CreateProductRequest) -> Self {
        Self {
            name: &req.name,
            sku: &req.sku,
            price: req.price,
            quantity: req.quantity,
            status: req.status.as_deref(),
            category_id: req.category_id.as_deref(),
            supplier_id: req.supplier_id.as_deref(),
        }
    }
}

impl<'a> From<&'a UpdateProductRequest> for ProductInput<'a> {
    fn from(req: &'a UpdateProductRequest) -> Self {
        Self {
            name: &req.name,
            sku: &req.sku,
            price: req.price,
            quantity: req.quantity,
            status: req.status.as_deref(),
            category_id: req.category_id.as_deref(),
            supplier_id: req.supplier_id.as_deref(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validate the input and check that referenced category and supplier
/// belong to the same owner as the product.
async fn resolve_fields<'a>(
    state: &AppState,
    owner_id: &str,
    input: &ProductInput<'a>,
) -> Result<ProductFields<'a>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_text(input.name, "Name", MAX_PRODUCT_NAME_LEN));
    errors.check("sku", validate_text(input.sku, "SKU", MAX_SKU_LEN));
    errors.check("price", validate_amount(input.price, "Price"));
    errors.check("quantity", validate_stock_quantity(input.quantity));
    errors.check("status", validate_optional_text(input.status, "Status", MAX_STATUS_LEN));
    errors.finish()?;

    let category_id = non_empty(input.category_id);
    if let Some(id) = category_id {
        if !db::category_owned_by(&state.db, owner_id, id).await? {
            return Err(ApiError::not_found("Category not found"));
        }
    }

    let supplier_id = non_empty(input.supplier_id);
    if let Some(id) = supplier_id {
        if !db::supplier_owned_by(&state.db, owner_id, id).await? {
            return Err(ApiError::not_found("Supplier not found"));
        }
    }

    Ok(ProductFields {
        name: input.name.trim(),
        sku: input.sku.trim(),
        price: input.price,
        quantity: input.quantity,
        status: non_empty(input.status).unwrap_or(DEFAULT_PRODUCT_STATUS),
        category_id,
        supplier_id,
    })
}

pub async fn list_products(
    State(state): State<Arc<AppState>>,
    user: User,
    QueryParams(scope): QueryParams<ScopeQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let owner_id = effective_owner_id(&user, scope.as_user_id.as_deref());
    let products = db::list_products(&state.db, &owner_id)
        .await
        .db_context("list_products", &owner_id)?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    QueryParams(scope): QueryParams<ScopeQuery>,
) -> Result<Json<Product>, ApiError> {
    let owner_id = effective_owner_id(&user, scope.as_user_id.as_deref());
    let product = db::find_product(&state.db, &owner_id, &id)
        .await
        .db_context("get_product", &id)?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    Ok(Json(product))
}

/// Create a product. The unique index on `sku` is the only duplicate check,
/// so two concurrent creates with one SKU yield exactly one product.
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    user: User,
    QueryParams(scope): QueryParams<ScopeQuery>,
    JsonBody(req): JsonBody<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let owner_id = effective_owner_id(&user, scope.as_user_id.as_deref());
    let input = ProductInput::from(&req);
    let fields = resolve_fields(&state, &owner_id, &input).await?;

    let product = db::insert_product(&state.db, &owner_id, &fields)
        .await
        .db_context("create_product", &owner_id)
        .map_err(|e| e.on_conflict(DUPLICATE_SKU))?;

    tracing::info!(
        product_id = %product.id,
        owner_id = %owner_id,
        acting_user = %user.id,
        "Product created"
    );
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<Arc<AppState>>,
    user: User,
    QueryParams(scope): QueryParams<ScopeQuery>,
    JsonBody(req): JsonBody<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    if req.id.is_empty() {
        return Err(ApiError::validation_field("id", "Product id is required"));
    }
    let owner_id = effective_owner_id(&user, scope.as_user_id.as_deref());
    let input = ProductInput::from(&req);
    let fields = resolve_fields(&state, &owner_id, &input).await?;

    let product = db::update_product(&state.db, &owner_id, &req.id, &fields)
        .await
        .db_context("update_product", &req.id)
        .map_err(|e| e.on_conflict(DUPLICATE_SKU))?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    user: User,
    QueryParams(scope): QueryParams<ScopeQuery>,
    JsonBody(req): JsonBody<IdRequest>,
) -> Result<StatusCode, ApiError> {
    let owner_id = effective_owner_id(&user, scope.as_user_id.as_deref());

    let deleted = db::delete_product(&state.db, &owner_id, &req.id)
        .await
        .db_context("delete_product", &req.id)?;
    if !deleted {
        return Err(ApiError::not_found("Product not found"));
    }

    tracing::info!(product_id = %req.id, owner_id = %owner_id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}
