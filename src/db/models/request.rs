//! Replenishment requests and their line items.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashSet;
use thiserror::Error;

use super::product::ProductSummary;
use super::user::UserSummary;

/// Lifecycle of a request. Only SUBMITTED is assigned today; the other
/// states are stored and rendered but nothing transitions into them yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum RequestStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Fulfilled,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "DRAFT"),
            Self::Submitted => write!(f, "SUBMITTED"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Fulfilled => write!(f, "FULFILLED"),
        }
    }
}

const SELECT_REQUEST: &str = r#"
    SELECT r.*,
        u.name AS user_name, u.email AS user_email,
        cb.name AS created_by_name, cb.email AS created_by_email
    FROM requests r
    JOIN users u ON u.id = r.user_id
    JOIN users cb ON cb.id = r.created_by_user_id
"#;

#[derive(Debug, Clone, FromRow)]
pub struct RequestRow {
    pub id: String,
    pub user_id: String,
    pub created_by_user_id: String,
    pub status: RequestStatus,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub user_name: String,
    pub user_email: String,
    pub created_by_name: String,
    pub created_by_email: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct RequestItemRow {
    pub id: String,
    pub request_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub notes: Option<String>,
    pub position: i64,
    pub created_at: String,
    pub updated_at: String,
    pub product_name: String,
    pub product_sku: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestItem {
    pub id: String,
    pub request_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub product: ProductSummary,
}

impl From<RequestItemRow> for RequestItem {
    fn from(row: RequestItemRow) -> Self {
        Self {
            product: ProductSummary {
                id: row.product_id.clone(),
                name: row.product_name,
                sku: row.product_sku,
            },
            id: row.id,
            request_id: row.request_id,
            product_id: row.product_id,
            quantity: row.quantity,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Invoice reference listed under a request
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RequestInvoiceSummary {
    pub id: String,
    pub invoice_number: String,
    pub issued_at: String,
    pub product_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetail {
    pub id: String,
    pub user_id: String,
    pub created_by_user_id: String,
    pub status: RequestStatus,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub user: UserSummary,
    pub created_by: UserSummary,
    pub items: Vec<RequestItem>,
    pub invoices: Vec<RequestInvoiceSummary>,
}

impl RequestDetail {
    fn from_parts(
        row: RequestRow,
        items: Vec<RequestItem>,
        invoices: Vec<RequestInvoiceSummary>,
    ) -> Self {
        Self {
            user: UserSummary {
                id: row.user_id.clone(),
                name: row.user_name,
                email: row.user_email,
            },
            created_by: UserSummary {
                id: row.created_by_user_id.clone(),
                name: row.created_by_name,
                email: row.created_by_email,
            },
            id: row.id,
            user_id: row.user_id,
            created_by_user_id: row.created_by_user_id,
            status: row.status,
            title: row.title,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            items,
            invoices,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestRequest {
    pub as_user_id: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<CreateRequestItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestItem {
    pub product_id: String,
    pub quantity: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Error)]
pub enum CreateRequestError {
    #[error("One or more products were not found")]
    ProductNotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Create a request and all of its items in one transaction.
///
/// Every referenced product must belong to `owner_id`; otherwise nothing is
/// written. Returns the new request id.
pub async fn create_request(
    db: &SqlitePool,
    owner_id: &str,
    created_by: &str,
    title: Option<&str>,
    notes: Option<&str>,
    items: &[CreateRequestItem],
) -> Result<String, CreateRequestError> {
    let mut tx = db.begin().await?;

    let wanted: HashSet<&str> = items.iter().map(|i| i.product_id.as_str()).collect();

    let mut lookup: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT id FROM products WHERE user_id = ");
    lookup.push_bind(owner_id).push(" AND id IN (");
    let mut separated = lookup.separated(", ");
    for id in &wanted {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let found: Vec<(String,)> = lookup.build_query_as().fetch_all(&mut *tx).await?;
    let allowed: HashSet<String> = found.into_iter().map(|(id,)| id).collect();

    if wanted.iter().any(|id| !allowed.contains(*id)) {
        // Dropping the transaction rolls it back
        return Err(CreateRequestError::ProductNotFound);
    }

    let request_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO requests (id, user_id, created_by_user_id, status, title, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&request_id)
    .bind(owner_id)
    .bind(created_by)
    .bind(RequestStatus::Submitted)
    .bind(title)
    .bind(notes)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO request_items (id, request_id, product_id, quantity, notes, position, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&request_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(&item.notes)
        .bind(position as i64)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::debug!(
        request_id = %request_id,
        owner_id = owner_id,
        items = items.len(),
        "Request created"
    );

    Ok(request_id)
}

async fn load_items(db: &SqlitePool, request_id: &str) -> Result<Vec<RequestItem>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RequestItemRow>(
        r#"
        SELECT ri.*, p.name AS product_name, p.sku AS product_sku
        FROM request_items ri
        JOIN products p ON p.id = ri.product_id
        WHERE ri.request_id = ?
        ORDER BY ri.position ASC
        "#,
    )
    .bind(request_id)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(RequestItem::from).collect())
}

async fn load_invoices(
    db: &SqlitePool,
    request_id: &str,
) -> Result<Vec<RequestInvoiceSummary>, sqlx::Error> {
    sqlx::query_as::<_, RequestInvoiceSummary>(
        r#"
        SELECT id, invoice_number, issued_at, product_id
        FROM product_invoices
        WHERE request_id = ?
        ORDER BY issued_at DESC
        "#,
    )
    .bind(request_id)
    .fetch_all(db)
    .await
}

pub async fn list_requests(db: &SqlitePool, owner_id: &str) -> Result<Vec<RequestDetail>, sqlx::Error> {
    let sql = format!("{} WHERE r.user_id = ? ORDER BY r.created_at DESC", SELECT_REQUEST);
    let rows = sqlx::query_as::<_, RequestRow>(&sql)
        .bind(owner_id)
        .fetch_all(db)
        .await?;

    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        let items = load_items(db, &row.id).await?;
        let invoices = load_invoices(db, &row.id).await?;
        results.push(RequestDetail::from_parts(row, items, invoices));
    }
    Ok(results)
}

pub async fn find_request(
    db: &SqlitePool,
    owner_id: &str,
    id: &str,
) -> Result<Option<RequestDetail>, sqlx::Error> {
    let sql = format!("{} WHERE r.id = ? AND r.user_id = ?", SELECT_REQUEST);
    let Some(row) = sqlx::query_as::<_, RequestRow>(&sql)
        .bind(id)
        .bind(owner_id)
        .fetch_optional(db)
        .await?
    else {
        return Ok(None);
    };

    let items = load_items(db, &row.id).await?;
    let invoices = load_invoices(db, &row.id).await?;
    Ok(Some(RequestDetail::from_parts(row, items, invoices)))
}

pub async fn request_owned_by(db: &SqlitePool, owner_id: &str, id: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT id FROM requests WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(owner_id)
        .fetch_optional(db)
        .await?;
    Ok(row.is_some())
}
