//! Product invoice endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{self, CreateInvoiceRequest, Invoice, NewInvoice, User};
use crate::AppState;

use super::error::{ApiError, DbResultExt, ValidationErrorBuilder};
use super::extract::{JsonBody, QueryParams};
use super::scope::{effective_owner_id, ScopeQuery};
use super::validation::{
    validate_amount, validate_optional_text, validate_positive_quantity, validate_text,
    validate_timestamp, MAX_INVOICE_NUMBER_LEN, MAX_NOTES_LEN,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceListQuery {
    pub product_id: Option<String>,
    pub as_user_id: Option<String>,
}

pub async fn list_invoices(
    State(state): State<Arc<AppState>>,
    user: User,
    QueryParams(query): QueryParams<InvoiceListQuery>,
) -> Result<Json<Vec<Invoice>>, ApiError> {
    let product_id = query
        .product_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::validation_field("productId", "productId is required"))?;
    let owner_id = effective_owner_id(&user, query.as_user_id.as_deref());

    if db::find_product(&state.db, &owner_id, &product_id).await?.is_none() {
        return Err(ApiError::not_found("Product not found"));
    }

    let invoices = db::list_invoices_for_product(&state.db, &owner_id, &product_id)
        .await
        .db_context("list_invoices", &product_id)?;
    Ok(Json(invoices))
}

pub async fn create_invoice(
    State(state): State<Arc<AppState>>,
    user: User,
    QueryParams(scope): QueryParams<ScopeQuery>,
    JsonBody(req): JsonBody<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check(
        "invoiceNumber",
        validate_text(&req.invoice_number, "Invoice number", MAX_INVOICE_NUMBER_LEN),
    );
    errors.check("quantity", validate_positive_quantity(req.quantity));
    errors.check("unitPrice", validate_amount(req.unit_price, "Unit price"));
    errors.check("notes", validate_optional_text(req.notes.as_deref(), "Notes", MAX_NOTES_LEN));
    if let Some(issued_at) = req.issued_at.as_deref() {
        errors.check("issuedAt", validate_timestamp(issued_at, "issuedAt"));
    }
    errors.finish()?;

    let target = req.as_user_id.as_deref().or(scope.as_user_id.as_deref());
    let owner_id = effective_owner_id(&user, target);

    if db::find_product(&state.db, &owner_id, &req.product_id).await?.is_none() {
        return Err(ApiError::not_found("Product not found"));
    }

    let request_id = req.request_id.as_deref().filter(|id| !id.is_empty());
    if let Some(request_id) = request_id {
        if !db::request_owned_by(&state.db, &owner_id, request_id).await? {
            return Err(ApiError::not_found("Request not found"));
        }
    }

    // Normalise to UTC so issue dates sort correctly as text
    let issued_at = match req.issued_at.as_deref() {
        Some(value) => chrono::DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&chrono::Utc).to_rfc3339())
            .map_err(|_| ApiError::validation_field("issuedAt", "issuedAt must be an RFC 3339 timestamp"))?,
        None => chrono::Utc::now().to_rfc3339(),
    };

    let invoice = db::insert_invoice(
        &state.db,
        &owner_id,
        &NewInvoice {
            product_id: &req.product_id,
            request_id,
            invoice_number: req.invoice_number.trim(),
            issued_at: &issued_at,
            quantity: req.quantity,
            unit_price: req.unit_price,
            notes: req.notes.as_deref(),
        },
    )
    .await
    .db_context("create_invoice", &req.product_id)?;

    tracing::info!(
        invoice_id = %invoice.id,
        product_id = %invoice.product_id,
        owner_id = %owner_id,
        "Invoice recorded"
    );
    Ok((StatusCode::CREATED, Json(invoice)))
}
