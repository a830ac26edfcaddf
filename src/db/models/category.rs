//! Product categories, unique by name within an owner.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub id: String,
    pub name: String,
}

pub async fn list_categories(db: &SqlitePool, owner_id: &str) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE user_id = ? ORDER BY name")
        .bind(owner_id)
        .fetch_all(db)
        .await
}

/// Insert a category. A duplicate name for the same owner surfaces as a
/// unique-constraint error from the database.
pub async fn insert_category(
    db: &SqlitePool,
    owner_id: &str,
    name: &str,
) -> Result<Category, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO categories (id, name, user_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(owner_id)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await
}

/// Rename a category. `None` when no row matches both id and owner.
pub async fn update_category(
    db: &SqlitePool,
    owner_id: &str,
    id: &str,
    name: &str,
) -> Result<Option<Category>, sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        "UPDATE categories SET name = ?, updated_at = ? WHERE id = ? AND user_id = ?",
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

    sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(owner_id)
        .fetch_optional(db)
        .await
}

pub async fn delete_category(db: &SqlitePool, owner_id: &str, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM categories WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(owner_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn category_owned_by(db: &SqlitePool, owner_id: &str, id: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT id FROM categories WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(db)
            .await?;
    Ok(row.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::seed_user;

    #[tokio::test]
    async fn test_name_unique_per_owner_only() {
        let db = crate::db::init_in_memory().await.unwrap();
        let alice = seed_user(&db, "alice@example.com").await;
        let bob = seed_user(&db, "bob@example.com").await;

        insert_category(&db, &alice.id, "Tools").await.unwrap();
        insert_category(&db, &bob.id, "Tools").await.unwrap();

        let err = insert_category(&db, &alice.id, "Tools").await.unwrap_err();
        assert!(err.to_string().contains("UNIQUE constraint failed"));
    }

    #[tokio::test]
    async fn test_update_scoped_to_owner() {
        let db = crate::db::init_in_memory().await.unwrap();
        let alice = seed_user(&db, "alice@example.com").await;
        let bob = seed_user(&db, "bob@example.com").await;
        let category = insert_category(&db, &bob.id, "Paint").await.unwrap();

        let foreign = update_category(&db, &alice.id, &category.id, "Mine").await.unwrap();
        assert!(foreign.is_none());
        assert!(!delete_category(&db, &alice.id, &category.id).await.unwrap());

        let own = update_category(&db, &bob.id, &category.id, "Coatings").await.unwrap();
        assert_eq!(own.unwrap().name, "Coatings");
        assert!(category_owned_by(&db, &bob.id, &category.id).await.unwrap());
        assert!(!category_owned_by(&db, &alice.id, &category.id).await.unwrap());
    }
}
