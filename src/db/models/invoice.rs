//! Product invoices, optionally tied to the request that triggered them.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::request::RequestStatus;
use super::user::UserSummary;

const SELECT_INVOICE: &str = r#"
    SELECT i.*,
        r.title AS request_title,
        r.status AS request_status,
        r.created_at AS request_created_at,
        ru.id AS requester_id,
        ru.name AS requester_name,
        ru.email AS requester_email
    FROM product_invoices i
    LEFT JOIN requests r ON r.id = i.request_id
    LEFT JOIN users ru ON ru.id = r.user_id
"#;

#[derive(Debug, Clone, FromRow)]
pub struct InvoiceRow {
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    pub request_id: Option<String>,
    pub invoice_number: String,
    pub issued_at: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub request_title: Option<String>,
    pub request_status: Option<RequestStatus>,
    pub request_created_at: Option<String>,
    pub requester_id: Option<String>,
    pub requester_name: Option<String>,
    pub requester_email: Option<String>,
}

/// Snapshot of the request an invoice was raised against
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequestSummary {
    pub id: String,
    pub title: Option<String>,
    pub status: RequestStatus,
    pub created_at: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    pub request_id: Option<String>,
    pub invoice_number: String,
    pub issued_at: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub request: Option<InvoiceRequestSummary>,
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        // The request may have been deleted; request_id is then NULL already
        let request = match (
            row.request_id.clone(),
            row.request_status,
            row.request_created_at,
            row.requester_id,
        ) {
            (Some(id), Some(status), Some(created_at), Some(user_id)) => Some(InvoiceRequestSummary {
                id,
                title: row.request_title,
                status,
                created_at,
                user: UserSummary {
                    id: user_id,
                    name: row.requester_name.unwrap_or_default(),
                    email: row.requester_email.unwrap_or_default(),
                },
            }),
            _ => None,
        };

        Self {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            request_id: row.request_id,
            invoice_number: row.invoice_number,
            issued_at: row.issued_at,
            quantity: row.quantity,
            unit_price: row.unit_price,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            request,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub as_user_id: Option<String>,
    pub product_id: String,
    pub request_id: Option<String>,
    pub invoice_number: String,
    pub issued_at: Option<String>,
    pub quantity: i64,
    pub unit_price: f64,
    pub notes: Option<String>,
}

#[derive(Debug)]
pub struct NewInvoice<'a> {
    pub product_id: &'a str,
    pub request_id: Option<&'a str>,
    pub invoice_number: &'a str,
    pub issued_at: &'a str,
    pub quantity: i64,
    pub unit_price: f64,
    pub notes: Option<&'a str>,
}

/// Invoices for one product, newest issue date first
pub async fn list_invoices_for_product(
    db: &SqlitePool,
    owner_id: &str,
    product_id: &str,
) -> Result<Vec<Invoice>, sqlx::Error> {
    let sql = format!(
        "{} WHERE i.product_id = ? AND i.user_id = ? ORDER BY i.issued_at DESC, i.created_at DESC",
        SELECT_INVOICE
    );
    let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
        .bind(product_id)
        .bind(owner_id)
        .fetch_all(db)
        .await?;
    Ok(rows.into_iter().map(Invoice::from).collect())
}

pub async fn insert_invoice(
    db: &SqlitePool,
    owner_id: &str,
    invoice: &NewInvoice<'_>,
) -> Result<Invoice, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO product_invoices (id, user_id, product_id, request_id, invoice_number, issued_at, quantity, unit_price, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(owner_id)
    .bind(invoice.product_id)
    .bind(invoice.request_id)
    .bind(invoice.invoice_number)
    .bind(invoice.issued_at)
    .bind(invoice.quantity)
    .bind(invoice.unit_price)
    .bind(invoice.notes)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    let sql = format!("{} WHERE i.id = ?", SELECT_INVOICE);
    let row = sqlx::query_as::<_, InvoiceRow>(&sql)
        .bind(&id)
        .fetch_one(db)
        .await?;
    Ok(row.into())
}

pub async fn invoice_owned_by(db: &SqlitePool, owner_id: &str, id: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT id FROM product_invoices WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(db)
            .await?;
    Ok(row.is_some())
}
