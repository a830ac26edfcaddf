//! Product models and queries.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Label used when a product's category or supplier cannot be resolved
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Status given to products created without one
pub const DEFAULT_PRODUCT_STATUS: &str = "ACTIVE";

const SELECT_PRODUCT: &str = r#"
    SELECT p.*, c.name AS category_name, s.name AS supplier_name
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id AND c.user_id = p.user_id
    LEFT JOIN suppliers s ON s.id = p.supplier_id AND s.user_id = p.user_id
"#;

/// A product row joined with its category and supplier names
#[derive(Debug, Clone, FromRow)]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub sku: String,
    pub price: f64,
    pub quantity: i64,
    pub status: String,
    pub user_id: String,
    pub category_id: Option<String>,
    pub supplier_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub category_name: Option<String>,
    pub supplier_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub sku: String,
    pub price: f64,
    pub quantity: i64,
    pub status: String,
    pub user_id: String,
    pub category_id: Option<String>,
    pub supplier_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Category name, or "Unknown" when unset or dangling
    pub category: String,
    /// Supplier name, or "Unknown" when unset or dangling
    pub supplier: String,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            sku: row.sku,
            price: row.price,
            quantity: row.quantity,
            status: row.status,
            user_id: row.user_id,
            category_id: row.category_id,
            supplier_id: row.supplier_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            category: row.category_name.unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
            supplier: row.supplier_name.unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        }
    }
}

/// Compact product reference embedded in request items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub sku: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub sku: String,
    pub price: f64,
    pub quantity: i64,
    pub status: Option<String>,
    pub category_id: Option<String>,
    pub supplier_id: Option<String>,
}

/// Full replacement of a product's editable fields
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub id: String,
    pub name: String,
    pub sku: String,
    pub price: f64,
    pub quantity: i64,
    pub status: Option<String>,
    pub category_id: Option<String>,
    pub supplier_id: Option<String>,
}

/// Column values shared by insert and update
#[derive(Debug)]
pub struct ProductFields<'a> {
    pub name: &'a str,
    pub sku: &'a str,
    pub price: f64,
    pub quantity: i64,
    pub status: &'a str,
    pub category_id: Option<&'a str>,
    pub supplier_id: Option<&'a str>,
}

pub async fn list_products(db: &SqlitePool, owner_id: &str) -> Result<Vec<Product>, sqlx::Error> {
    let sql = format!("{} WHERE p.user_id = ? ORDER BY p.created_at DESC", SELECT_PRODUCT);
    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(owner_id)
        .fetch_all(db)
        .await?;
    Ok(rows.into_iter().map(Product::from).collect())
}

pub async fn find_product(
    db: &SqlitePool,
    owner_id: &str,
    id: &str,
) -> Result<Option<Product>, sqlx::Error> {
    let sql = format!("{} WHERE p.id = ? AND p.user_id = ?", SELECT_PRODUCT);
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .bind(owner_id)
        .fetch_optional(db)
        .await?;
    Ok(row.map(Product::from))
}

/// Insert a product in a single statement; the global UNIQUE index on `sku`
/// decides concurrent duplicates.
pub async fn insert_product(
    db: &SqlitePool,
    owner_id: &str,
    fields: &ProductFields<'_>,
) -> Result<Product, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO products (id, name, sku, price, quantity, status, user_id, category_id, supplier_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(fields.name)
    .bind(fields.sku)
    .bind(fields.price)
    .bind(fields.quantity)
    .bind(fields.status)
    .bind(owner_id)
    .bind(fields.category_id)
    .bind(fields.supplier_id)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    let sql = format!("{} WHERE p.id = ?", SELECT_PRODUCT);
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(&id)
        .fetch_one(db)
        .await?;
    Ok(row.into())
}

/// Replace a product's fields. `None` when no row matches both id and owner.
pub async fn update_product(
    db: &SqlitePool,
    owner_id: &str,
    id: &str,
    fields: &ProductFields<'_>,
) -> Result<Option<Product>, sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"
        UPDATE products SET
            name = ?,
            sku = ?,
            price = ?,
            quantity = ?,
            status = ?,
            category_id = ?,
            supplier_id = ?,
            updated_at = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(fields.name)
    .bind(fields.sku)
    .bind(fields.price)
    .bind(fields.quantity)
    .bind(fields.status)
    .bind(fields.category_id)
    .bind(fields.supplier_id)
    .bind(&now)
    .bind(id)
    .bind(owner_id)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    find_product(db, owner_id, id).await
}

pub async fn delete_product(db: &SqlitePool, owner_id: &str, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM products WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(owner_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
