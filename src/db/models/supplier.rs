//! Suppliers a product can be sourced from, unique by name per owner.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSupplierRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSupplierRequest {
    pub id: String,
    pub name: String,
}

pub async fn list_suppliers(db: &SqlitePool, owner_id: &str) -> Result<Vec<Supplier>, sqlx::Error> {
    sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE user_id = ? ORDER BY name")
        .bind(owner_id)
        .fetch_all(db)
        .await
}

/// Insert a supplier. A duplicate name for the same owner surfaces as a
/// unique-constraint error from the database.
pub async fn insert_supplier(
    db: &SqlitePool,
    owner_id: &str,
    name: &str,
) -> Result<Supplier, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO suppliers (id, name, user_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(owner_id)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await
}

/// Rename a supplier. `None` when no row matches both id and owner.
pub async fn update_supplier(
    db: &SqlitePool,
    owner_id: &str,
    id: &str,
    name: &str,
) -> Result<Option<Supplier>, sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        "UPDATE suppliers SET name = ?, updated_at = ? WHERE id = ? AND user_id = ?",
    )
    .bind(name)
    .bind(&now)
    .bind(id)
    .bind(owner_id)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(owner_id)
        .fetch_optional(db)
        .await
}

pub async fn delete_supplier(db: &SqlitePool, owner_id: &str, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM suppliers WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(owner_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn supplier_owned_by(db: &SqlitePool, owner_id: &str, id: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT id FROM suppliers WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(db)
            .await?;
    Ok(row.is_some())
}
